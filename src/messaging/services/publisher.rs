//! Typed publisher: encode, wrap, send.

use crate::messaging::codec::{MessageCodec, MessageType, Payload};
use crate::messaging::domain::{
    EventAttributes, EventEnvelope, EventHints, Subject, TypeValidationError, default_source,
};
use crate::messaging::error::PublishError;
use crate::messaging::ports::{OutboundMessage, Transport};
use mockable::Clock;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Publishes values of one validated payload type to one subject.
///
/// Each call to [`Self::publish`] produces exactly one outbound message.
/// Failures are returned to the caller; nothing is buffered or retried.
pub struct Publisher<T, Tr, C>
where
    Tr: Transport,
    C: Clock + Send + Sync,
{
    subject: Subject,
    message_type: MessageType<T>,
    transport: Arc<Tr>,
    clock: Arc<C>,
    source: String,
    hints: EventHints,
}

impl<T, Tr, C> Publisher<T, Tr, C>
where
    T: Payload,
    Tr: Transport,
    C: Clock + Send + Sync,
{
    /// Validates `T` and creates a publisher for `subject`.
    ///
    /// The `ce-source` defaults to one derived from the host name.
    ///
    /// # Errors
    ///
    /// Returns [`TypeValidationError`] when `T` cannot be used as a payload.
    pub fn new(
        subject: Subject,
        codec: Arc<MessageCodec>,
        transport: Arc<Tr>,
        clock: Arc<C>,
    ) -> Result<Self, TypeValidationError> {
        let message_type = MessageType::new(codec)?;
        Ok(Self::from_message_type(
            subject,
            message_type,
            transport,
            clock,
        ))
    }

    /// Creates a publisher from an already validated message type.
    #[must_use]
    pub fn from_message_type(
        subject: Subject,
        message_type: MessageType<T>,
        transport: Arc<Tr>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            subject,
            message_type,
            transport,
            clock,
            source: default_source(),
            hints: EventHints::new(),
        }
    }

    /// Sets the fallback `ce-source` used when no hint supplies one.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Sets hints applied to every message this publisher sends.
    #[must_use]
    pub fn with_hints(mut self, hints: EventHints) -> Self {
        self.hints = hints;
        self
    }

    /// Publishes a value using the publisher-level hints.
    ///
    /// Returns the attributes of the sent event.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Serialization`] when the value cannot be
    /// encoded (nothing is sent) and [`PublishError::Transport`] when the
    /// transport fails to send.
    pub async fn publish(&self, value: &T) -> Result<EventAttributes, PublishError> {
        self.publish_with(value, &EventHints::new()).await
    }

    /// Publishes a value with per-call hints, which take precedence over the
    /// publisher-level hints.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Serialization`] when the value cannot be
    /// encoded (nothing is sent) and [`PublishError::Transport`] when the
    /// transport fails to send.
    pub async fn publish_with(
        &self,
        value: &T,
        hints: &EventHints,
    ) -> Result<EventAttributes, PublishError> {
        let body = self.message_type.encode(value)?;
        let envelope = EventEnvelope::wrap(
            body,
            self.message_type.type_name(),
            &hints.or(&self.hints),
            &self.source,
            &*self.clock,
        );
        let attributes = envelope.attributes().clone();
        let (headers, encoded) = envelope.into_parts();

        self.transport
            .send(&self.subject, OutboundMessage::new(headers, encoded))
            .await?;

        debug!(
            subject = %self.subject,
            type_name = self.message_type.type_name(),
            ce_id = attributes.id(),
            ce_type = attributes.event_type(),
            "message published"
        );
        Ok(attributes)
    }
}

impl<T, Tr, C> Publisher<T, Tr, C>
where
    Tr: Transport,
    C: Clock + Send + Sync,
{
    /// Returns the subject messages are sent to.
    #[must_use]
    pub const fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Returns the fully qualified payload type name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.message_type.type_name()
    }

    /// Returns the fallback `ce-source`.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the validated message type.
    #[must_use]
    pub const fn message_type(&self) -> &MessageType<T> {
        &self.message_type
    }
}

impl<T, Tr, C> Clone for Publisher<T, Tr, C>
where
    Tr: Transport,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            subject: self.subject.clone(),
            message_type: self.message_type.clone(),
            transport: Arc::clone(&self.transport),
            clock: Arc::clone(&self.clock),
            source: self.source.clone(),
            hints: self.hints.clone(),
        }
    }
}

impl<T, Tr, C> fmt::Debug for Publisher<T, Tr, C>
where
    Tr: Transport,
    C: Clock + Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("subject", &self.subject)
            .field("type_name", &self.type_name())
            .field("source", &self.source)
            .field("hints", &self.hints)
            .finish_non_exhaustive()
    }
}
