//! Port contracts for the messaging subsystem.
//!
//! The transport client is an external collaborator; adapters implement
//! these traits for a concrete broker.

pub mod transport;

pub use transport::{AckHandle, Consumer, Delivery, OutboundMessage, Transport};
