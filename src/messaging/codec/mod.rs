//! Shared payload codec and validated message types.
//!
//! A single [`MessageCodec`] is created at startup and shared by reference
//! with every publisher and subscription. [`MessageType`] binds a validated
//! payload type to that codec.

mod context;
mod json;
mod message_type;

pub use context::{DeserializationContext, SerializationContext};
pub use json::{MessageCodec, RAW_EXCERPT_LIMIT};
pub use message_type::{MessageType, Payload};
