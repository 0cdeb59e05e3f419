//! Typed publish/subscribe messaging.
//!
//! Application code publishes and receives plain structured values. This
//! module validates payload types at registration, encodes them with one
//! shared codec, wraps them in binary-mode event envelopes (`ce-*` headers
//! with the raw payload as body), and drives each subscription through a
//! decode, dispatch, and ack/nak state machine.
//!
//! # Architecture
//!
//! - **Domain**: type descriptors, validation, envelopes, and value types in
//!   [`domain`]
//! - **Codec**: the shared JSON codec and validated message types in
//!   [`codec`]
//! - **Ports**: the transport contract in [`ports`]
//! - **Adapters**: the in-memory transport in [`adapters`]
//! - **Services**: publishers, subscription processing, and the registry in
//!   [`services`]
//!
//! # Example
//!
//! ```
//! use courier::messaging::domain::{TypeValidationErrorKind, TypeValidator};
//!
//! let validator = TypeValidator::new();
//! let result = validator.validate_type::<u32>();
//! assert!(!result.is_valid());
//! assert_eq!(result.error_kind(), Some(TypeValidationErrorKind::ScalarType));
//! ```

pub mod adapters;
pub mod codec;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
