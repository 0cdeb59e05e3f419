//! Per-call encode and decode contexts.

use super::MessageType;
use std::time::{Duration, Instant};

/// Context for encoding one outgoing payload.
#[derive(Debug)]
pub struct SerializationContext<'a, T> {
    message_type: &'a MessageType<T>,
    value: &'a T,
    started_at: Instant,
}

impl<'a, T> SerializationContext<'a, T> {
    /// Starts an encode context now.
    #[must_use]
    pub fn new(message_type: &'a MessageType<T>, value: &'a T) -> Self {
        Self {
            message_type,
            value,
            started_at: Instant::now(),
        }
    }

    /// Returns the message type being encoded.
    #[must_use]
    pub const fn message_type(&self) -> &MessageType<T> {
        self.message_type
    }

    /// Returns the value being encoded.
    #[must_use]
    pub const fn value(&self) -> &T {
        self.value
    }

    /// Returns the payload type name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.message_type.type_name()
    }

    /// Returns the time elapsed since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Context for decoding one received body.
#[derive(Debug)]
pub struct DeserializationContext<'a, T> {
    message_type: &'a MessageType<T>,
    data: &'a [u8],
    started_at: Instant,
}

impl<'a, T> DeserializationContext<'a, T> {
    /// Starts a decode context now.
    #[must_use]
    pub fn new(message_type: &'a MessageType<T>, data: &'a [u8]) -> Self {
        Self {
            message_type,
            data,
            started_at: Instant::now(),
        }
    }

    /// Returns the target message type.
    #[must_use]
    pub const fn message_type(&self) -> &MessageType<T> {
        self.message_type
    }

    /// Returns the raw bytes being decoded.
    #[must_use]
    pub const fn data(&self) -> &[u8] {
        self.data
    }

    /// Returns the payload type name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.message_type.type_name()
    }

    /// Returns the time elapsed since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}
