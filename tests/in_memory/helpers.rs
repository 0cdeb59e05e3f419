//! Shared fixtures for in-memory messaging tests.

use async_trait::async_trait;
use courier::messaging::{
    adapters::memory::{InMemoryTransport, ResolutionRecord},
    codec::MessageCodec,
    config::{InMemoryTransportConfig, MessagingConfig},
    domain::{EventEnvelope, EventHints, Headers},
    error::HandlerError,
    ports::OutboundMessage,
    services::{MessageHandler, MessagingRegistry},
};
use eyre::WrapErr;
use mockable::DefaultClock;
use rstest::fixture;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Registry type used throughout the in-memory tests.
pub type TestRegistry = MessagingRegistry<InMemoryTransport, DefaultClock>;

/// Source stamped on every published event.
pub const TEST_SOURCE: &str = "//in-memory-tests";

const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Structured payload used by most tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderData {
    pub id: String,
    pub amount: u64,
}

/// Builds an order payload.
pub fn order(id: &str, amount: u64) -> OrderData {
    OrderData {
        id: id.to_owned(),
        amount,
    }
}

/// A transport and the registry wired to it.
pub struct Harness {
    pub transport: Arc<InMemoryTransport>,
    pub registry: TestRegistry,
}

impl Harness {
    /// Creates a harness whose transport applies `config`.
    pub fn with_transport_config(config: InMemoryTransportConfig) -> Self {
        let transport = Arc::new(InMemoryTransport::with_config(config));
        let registry = MessagingRegistry::new(
            Arc::clone(&transport),
            Arc::new(DefaultClock),
            Arc::new(MessageCodec::new()),
            MessagingConfig::default().with_source(TEST_SOURCE),
        );
        Self {
            transport,
            registry,
        }
    }

    /// Waits until `count` deliveries have been acked or naked.
    pub async fn settle(&self, count: usize) -> eyre::Result<Vec<ResolutionRecord>> {
        tokio::time::timeout(SETTLE_TIMEOUT, self.transport.wait_for_resolutions(count))
            .await
            .wrap_err_with(|| format!("timed out waiting for {count} resolutions"))?
            .wrap_err("reading resolutions")
    }
}

/// Harness whose transport dead-letters on the first nak.
#[fixture]
pub fn harness() -> Harness {
    Harness::with_transport_config(InMemoryTransportConfig::at_most_once())
}

/// Collects every payload it is handed.
#[derive(Debug, Clone, Default)]
pub struct Inbox(Arc<Mutex<Vec<OrderData>>>);

impl Inbox {
    /// Returns the payloads handled so far, in order.
    pub fn received(&self) -> Vec<OrderData> {
        self.0.lock().expect("inbox lock").clone()
    }
}

#[async_trait]
impl MessageHandler<OrderData> for Inbox {
    async fn handle(&self, message: OrderData) -> Result<(), HandlerError> {
        self.0.lock().expect("inbox lock").push(message);
        Ok(())
    }
}

/// Headers and body of a valid order event, built outside any publisher.
pub fn raw_event(body: &[u8]) -> (Headers, Vec<u8>) {
    EventEnvelope::wrap(
        body.to_vec(),
        std::any::type_name::<OrderData>(),
        &EventHints::new(),
        TEST_SOURCE,
        &DefaultClock,
    )
    .into_parts()
}

/// Builds an outbound message from parts.
pub fn outbound((headers, body): (Headers, Vec<u8>)) -> OutboundMessage {
    OutboundMessage::new(headers, body)
}
