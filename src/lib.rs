//! Courier: typed publish/subscribe messaging.
//!
//! Application code publishes and subscribes with plain structured values.
//! Courier validates payload types when publishers and subscriptions are
//! registered, encodes payloads with a single shared codec, carries event
//! metadata in binary-mode `ce-*` headers, and maps every subscription
//! failure to a logged negative acknowledgement.
//!
//! # Architecture
//!
//! Courier follows hexagonal architecture principles:
//!
//! - **Domain**: Pure types with no transport dependencies
//! - **Ports**: Abstract trait interfaces for the transport client
//! - **Adapters**: Concrete implementations of ports (in-memory transport)
//! - **Services**: Publishers, subscription processing, and registration
//!
//! # Modules
//!
//! - [`messaging`]: Type validation, codec, envelopes, and pub/sub services

pub mod messaging;
