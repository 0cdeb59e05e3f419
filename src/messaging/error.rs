//! Error types for encoding, transport, publishing, handling, and
//! registration.
//!
//! Uses `thiserror` for typed variants that callers can inspect. Domain
//! construction and envelope errors live in [`super::domain`].

use super::codec::RAW_EXCERPT_LIMIT;
use super::domain::{HandlerId, MessagingDomainError, Subject, TypeValidationError};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Failure to encode a payload.
#[derive(Debug, Clone, Error)]
#[error("failed to encode {type_name}: {cause}")]
pub struct SerializationError {
    /// Fully qualified name of the payload type.
    pub type_name: String,
    /// Underlying encoder error.
    pub cause: Arc<dyn std::error::Error + Send + Sync>,
    /// Time spent before the failure.
    pub elapsed: Duration,
}

impl SerializationError {
    /// Wraps an encoder error for the given payload type.
    #[must_use]
    pub fn new(
        type_name: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
        elapsed: Duration,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            cause: Arc::new(cause),
            elapsed,
        }
    }
}

/// Failure to decode a message body into a payload.
///
/// Only the first [`RAW_EXCERPT_LIMIT`] bytes of the body are retained.
#[derive(Debug, Clone, Error)]
#[error("failed to decode {type_name} from {payload_len}-byte payload `{excerpt}`: {cause}")]
pub struct DeserializationError {
    /// Fully qualified name of the target payload type.
    pub type_name: String,
    /// Bounded, lossily UTF-8 decoded prefix of the body.
    pub excerpt: String,
    /// Length of the full body in bytes.
    pub payload_len: usize,
    /// Underlying decoder error.
    pub cause: Arc<dyn std::error::Error + Send + Sync>,
    /// Time spent before the failure.
    pub elapsed: Duration,
}

impl DeserializationError {
    /// Wraps a decoder error, keeping a bounded excerpt of `data`.
    #[must_use]
    pub fn new(
        type_name: impl Into<String>,
        data: &[u8],
        cause: impl std::error::Error + Send + Sync + 'static,
        elapsed: Duration,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            excerpt: excerpt(data),
            payload_len: data.len(),
            cause: Arc::new(cause),
            elapsed,
        }
    }
}

fn excerpt(data: &[u8]) -> String {
    let bounded = data.get(..RAW_EXCERPT_LIMIT).unwrap_or(data);
    String::from_utf8_lossy(bounded).into_owned()
}

/// Errors reported by transport adapters.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The underlying connection is not usable.
    #[error("transport is not connected")]
    NotConnected,

    /// The consumer for a subject has been closed.
    #[error("consumer for subject {0} is closed")]
    ConsumerClosed(Subject),

    /// Generic adapter failure.
    #[error("transport error: {0}")]
    Runtime(Arc<dyn std::error::Error + Send + Sync>),
}

impl TransportError {
    /// Wraps an adapter error.
    #[must_use]
    pub fn runtime(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Runtime(Arc::new(err))
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors surfaced synchronously to `publish` callers.
#[derive(Debug, Clone, Error)]
pub enum PublishError {
    /// The payload could not be encoded; nothing was sent.
    #[error(transparent)]
    Serialization(#[from] SerializationError),

    /// The transport refused or failed to send the message.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Error returned by a message handler.
///
/// Any handler error causes the message to be negatively acknowledged.
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    /// The handler rejected the payload with a message.
    #[error("{0}")]
    Rejected(String),

    /// The handler failed with an underlying error.
    #[error("{0}")]
    Failed(Arc<dyn std::error::Error + Send + Sync>),

    /// The handler panicked.
    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    /// Creates a rejection with a message.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    /// Wraps an underlying error.
    #[must_use]
    pub fn failed(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Failed(Arc::new(err))
    }

    /// Builds a panic error from a task panic payload.
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|message| (*message).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_owned());
        Self::Panicked(message)
    }
}

/// Errors raised while registering publishers and subscriptions.
#[derive(Debug, Clone, Error)]
pub enum RegistrationError {
    /// A subject or handler identifier failed validation.
    #[error(transparent)]
    Domain(#[from] MessagingDomainError),

    /// The payload type was rejected.
    #[error(transparent)]
    InvalidType(#[from] TypeValidationError),

    /// A publisher for the same subject and payload type already exists.
    #[error("a publisher for {type_name} on subject {subject} is already registered")]
    DuplicatePublisher {
        /// Subject of the existing publisher.
        subject: Subject,
        /// Payload type of the existing publisher.
        type_name: String,
    },

    /// The handler is already subscribed to the subject.
    #[error("handler {handler} is already subscribed to subject {subject}")]
    DuplicateSubscription {
        /// Subject of the existing subscription.
        subject: Subject,
        /// Handler of the existing subscription.
        handler: HandlerId,
    },

    /// No subscription matches the given subject and handler.
    #[error("no subscription for handler {handler} on subject {subject}")]
    SubscriptionNotFound {
        /// Requested subject.
        subject: Subject,
        /// Requested handler.
        handler: HandlerId,
    },

    /// The transport could not create the consumer.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The subscription task ended abnormally.
    #[error("subscription task for handler {handler} on subject {subject} failed: {reason}")]
    TaskFailed {
        /// Subject of the subscription.
        subject: Subject,
        /// Handler of the subscription.
        handler: HandlerId,
        /// Description of the task failure.
        reason: String,
    },
}
