//! Transport port: send, subscribe, and per-message resolution.

use crate::messaging::domain::{Headers, Subject};
use crate::messaging::error::TransportResult;
use async_trait::async_trait;
use std::fmt;

/// A message ready to be handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    headers: Headers,
    body: Vec<u8>,
}

impl OutboundMessage {
    /// Creates an outbound message.
    #[must_use]
    pub const fn new(headers: Headers, body: Vec<u8>) -> Self {
        Self { headers, body }
    }

    /// Returns the message headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the message body.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Splits the message into headers and body.
    #[must_use]
    pub fn into_parts(self) -> (Headers, Vec<u8>) {
        (self.headers, self.body)
    }
}

/// Resolves one delivered message with the transport.
#[async_trait]
pub trait AckHandle: Send + Sync {
    /// Acknowledges successful processing.
    async fn ack(&mut self) -> TransportResult<()>;

    /// Negatively acknowledges, making the message eligible for redelivery
    /// under the transport's own policy.
    async fn nak(&mut self) -> TransportResult<()>;
}

/// A message received from a consumer, resolved exactly once.
pub struct Delivery {
    headers: Headers,
    body: Vec<u8>,
    attempt: u32,
    handle: Box<dyn AckHandle>,
}

impl Delivery {
    /// Creates a delivery; `attempt` starts at 1.
    #[must_use]
    pub fn new(headers: Headers, body: Vec<u8>, attempt: u32, handle: Box<dyn AckHandle>) -> Self {
        Self {
            headers,
            body,
            attempt,
            handle,
        }
    }

    /// Returns the message headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the message body.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns how many times this message has been delivered.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Acknowledges the message.
    ///
    /// # Errors
    ///
    /// Returns transport errors from the underlying handle.
    pub async fn ack(mut self) -> TransportResult<()> {
        self.handle.ack().await
    }

    /// Negatively acknowledges the message.
    ///
    /// # Errors
    ///
    /// Returns transport errors from the underlying handle.
    pub async fn nak(mut self) -> TransportResult<()> {
        self.handle.nak().await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .field("attempt", &self.attempt)
            .finish_non_exhaustive()
    }
}

/// A consumer owned by exactly one subscription.
#[async_trait]
pub trait Consumer: Send {
    /// Waits for the next delivery; returns `None` once the consumer closes.
    ///
    /// Must be cancel-safe: a subscription loop drops a pending call when it
    /// is asked to stop.
    async fn next(&mut self) -> Option<Delivery>;

    /// Detaches the consumer from its subject.
    ///
    /// # Errors
    ///
    /// Returns transport errors when the unsubscribe request fails.
    async fn unsubscribe(&mut self) -> TransportResult<()>;
}

/// Transport client contract consumed by publishers and subscriptions.
///
/// Connection lifecycle, reconnection, and credentials belong to the
/// implementation.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one message to a subject.
    ///
    /// # Errors
    ///
    /// Returns [`crate::messaging::error::TransportError`] when the message
    /// could not be sent.
    async fn send(&self, subject: &Subject, message: OutboundMessage) -> TransportResult<()>;

    /// Creates a new consumer for a subject. Every call yields an
    /// independent consumer.
    ///
    /// # Errors
    ///
    /// Returns [`crate::messaging::error::TransportError`] when the consumer
    /// cannot be created.
    async fn subscribe(&self, subject: &Subject) -> TransportResult<Box<dyn Consumer>>;

    /// Reports whether the underlying connection is usable.
    fn is_connected(&self) -> bool;
}
