//! Application services: typed publishing, subscription processing, and the
//! registration entry point.

mod publisher;
mod registry;
mod subscription;

pub use publisher::Publisher;
pub use registry::{MessagingRegistry, SubscriptionKey};
pub use subscription::{
    MessageHandler, ProcessingFailure, ProcessingOutcome, ProcessingStage, SubscriptionHandle,
    SubscriptionProcessor, SubscriptionStats,
};
