//! JSON implementation of the shared codec.

use super::{DeserializationContext, SerializationContext};
use crate::messaging::domain::DATA_CONTENT_TYPE;
use crate::messaging::error::{DeserializationError, SerializationError};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Number of raw body bytes kept in decode diagnostics.
pub const RAW_EXCERPT_LIMIT: usize = 1000;

/// Stateless structural encoder/decoder shared by all message types.
///
/// The codec holds no per-call state and is safe to use concurrently.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageCodec;

impl MessageCodec {
    /// Creates the codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Returns the media type of encoded bodies.
    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        DATA_CONTENT_TYPE
    }

    /// Encodes the context's value into a complete byte buffer.
    ///
    /// # Errors
    ///
    /// Returns [`SerializationError`] naming the payload type when the value
    /// cannot be encoded. No partial buffer is returned.
    pub fn encode<T: Serialize>(
        &self,
        context: &SerializationContext<'_, T>,
    ) -> Result<Vec<u8>, SerializationError> {
        serde_json::to_vec(context.value()).map_err(|err| {
            SerializationError::new(context.type_name(), err, context.elapsed())
        })
    }

    /// Decodes the context's bytes into the target payload type.
    ///
    /// # Errors
    ///
    /// Returns [`DeserializationError`] with the type name, a bounded excerpt
    /// of the input, and the decoder cause.
    pub fn decode<T: DeserializeOwned>(
        &self,
        context: &DeserializationContext<'_, T>,
    ) -> Result<T, DeserializationError> {
        serde_json::from_slice(context.data()).map_err(|err| {
            DeserializationError::new(context.type_name(), context.data(), err, context.elapsed())
        })
    }
}
