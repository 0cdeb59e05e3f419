//! In-memory transport adapter.

mod transport;

pub use transport::{
    ConsumerId, DeadLetter, InMemoryTransport, Resolution, ResolutionRecord, SentMessage,
};
