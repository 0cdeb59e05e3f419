//! Transport adapter implementations.

pub mod memory;
