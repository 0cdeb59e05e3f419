//! Domain model for typed messaging.
//!
//! Payload type descriptors and their validation, the binary-mode event
//! envelope, health snapshots, and the small value types (subjects, handler
//! identifiers, headers) shared by the codec, ports, and services. Nothing
//! here talks to a transport.

mod descriptor;
mod envelope;
mod error;
mod headers;
mod health;
mod subject;
mod validation;

pub use descriptor::{ScalarKind, Shape, TypeDescriptor};
pub use envelope::{
    DATA_CONTENT_TYPE, DEFAULT_SOURCE, EventAttributes, EventEnvelope, EventHints,
    HEADER_DATA_CONTENT_TYPE, HEADER_ID, HEADER_SOURCE, HEADER_SPEC_VERSION, HEADER_TIME,
    HEADER_TYPE, InboundEvent, SPEC_VERSION, default_source,
};
pub use error::{EnvelopeError, MessagingDomainError};
pub use headers::Headers;
pub use health::{HealthStatus, MessagingHealth};
pub use subject::{HandlerId, Subject};
pub use validation::{
    TypeValidationError, TypeValidationErrorKind, TypeValidationResult, TypeValidator,
};
