//! Unit tests for the messaging module.
//!
//! Tests are organised by component: type introspection and validation,
//! the codec, envelopes, the in-memory transport, and the services built on
//! top of them.

mod subscription_tests;
