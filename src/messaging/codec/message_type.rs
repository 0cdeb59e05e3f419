//! Validated payload types bound to the shared codec.

use super::{DeserializationContext, MessageCodec, SerializationContext};
use crate::messaging::domain::{
    TypeDescriptor, TypeValidationError, TypeValidationResult, TypeValidator,
};
use crate::messaging::error::{DeserializationError, SerializationError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Bounds every message payload type satisfies.
pub trait Payload: Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Payload for T where T: Serialize + DeserializeOwned + Send + Sync + 'static {}

/// A payload type that passed validation, bound to the shared codec.
///
/// Construction runs the [`TypeValidator`] once and caches the resulting
/// descriptor; encode and decode never repeat introspection. Instances are
/// immutable and cheap to clone.
///
/// # Examples
///
/// ```
/// use courier::messaging::codec::{MessageCodec, MessageType};
/// use serde::{Deserialize, Serialize};
/// use std::sync::Arc;
///
/// #[derive(Debug, PartialEq, Serialize, Deserialize)]
/// struct OrderData {
///     id: String,
///     amount: u64,
/// }
///
/// let codec = Arc::new(MessageCodec::new());
/// let message_type = MessageType::<OrderData>::new(codec).expect("valid payload type");
/// let order = OrderData { id: "A1".into(), amount: 10 };
/// let bytes = message_type.encode(&order).expect("encodes");
/// assert_eq!(message_type.decode(&bytes).expect("decodes"), order);
///
/// assert!(MessageType::<u64>::new(Arc::new(MessageCodec::new())).is_err());
/// ```
pub struct MessageType<T> {
    descriptor: Arc<TypeDescriptor>,
    validation: TypeValidationResult,
    codec: Arc<MessageCodec>,
    payload: PhantomData<fn() -> T>,
}

impl<T: Payload> MessageType<T> {
    /// Validates `T` and binds it to `codec`.
    ///
    /// # Errors
    ///
    /// Returns [`TypeValidationError`] when `T` is rejected.
    pub fn new(codec: Arc<MessageCodec>) -> Result<Self, TypeValidationError> {
        let descriptor = TypeDescriptor::of::<T>();
        let validation = TypeValidator::new().validate(&descriptor);
        validation.clone().into_result()?;
        Ok(Self {
            descriptor: Arc::new(descriptor),
            validation,
            codec,
            payload: PhantomData,
        })
    }

    /// Encodes a payload.
    ///
    /// # Errors
    ///
    /// Returns [`SerializationError`] when the value cannot be encoded.
    pub fn encode(&self, value: &T) -> Result<Vec<u8>, SerializationError> {
        self.codec.encode(&SerializationContext::new(self, value))
    }

    /// Decodes a payload.
    ///
    /// # Errors
    ///
    /// Returns [`DeserializationError`] when the bytes do not decode to `T`.
    pub fn decode(&self, data: &[u8]) -> Result<T, DeserializationError> {
        self.codec.decode(&DeserializationContext::new(self, data))
    }
}

impl<T> MessageType<T> {
    /// Returns the fully qualified payload type name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.descriptor.type_name()
    }

    /// Returns the cached type descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    /// Returns the validation result; always valid.
    #[must_use]
    pub const fn validation(&self) -> &TypeValidationResult {
        &self.validation
    }

    /// Returns the shared codec.
    #[must_use]
    pub const fn codec(&self) -> &Arc<MessageCodec> {
        &self.codec
    }
}

impl<T> Clone for MessageType<T> {
    fn clone(&self) -> Self {
        Self {
            descriptor: Arc::clone(&self.descriptor),
            validation: self.validation.clone(),
            codec: Arc::clone(&self.codec),
            payload: PhantomData,
        }
    }
}

impl<T> fmt::Debug for MessageType<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageType")
            .field("type_name", &self.type_name())
            .field("shape", self.descriptor.shape())
            .finish_non_exhaustive()
    }
}
