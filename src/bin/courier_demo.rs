//! Publishes a handful of orders through the in-memory transport and logs
//! how each subscription resolves them.
//!
//! Usage:
//!
//! ```text
//! RUST_LOG=courier=debug,courier_demo=info courier_demo
//! ```
//!
//! One order carries a zero amount; the handler rejects it, so it is
//! negatively acknowledged, redelivered once, and then dead-lettered.

use courier::messaging::adapters::memory::InMemoryTransport;
use courier::messaging::codec::MessageCodec;
use courier::messaging::config::{InMemoryTransportConfig, MessagingConfig};
use courier::messaging::domain::EventHints;
use courier::messaging::error::HandlerError;
use courier::messaging::services::MessagingRegistry;
use mockable::DefaultClock;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const ORDERS_SUBJECT: &str = "orders.placed";

/// Number of ack/nak resolutions the sample orders produce.
const EXPECTED_RESOLUTIONS: usize = 5;

#[derive(Debug, Serialize, Deserialize)]
struct OrderPlaced {
    id: String,
    amount: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let transport = Arc::new(InMemoryTransport::with_config(
        InMemoryTransportConfig::default().with_max_deliveries(2),
    ));
    let registry = MessagingRegistry::new(
        Arc::clone(&transport),
        Arc::new(DefaultClock),
        Arc::new(MessageCodec::new()),
        MessagingConfig::default().with_source("//courier-demo"),
    );

    registry
        .register_subscription::<OrderPlaced, _>(
            ORDERS_SUBJECT,
            "order-ledger",
            |order: OrderPlaced| async move {
                if order.amount == 0 {
                    return Err(HandlerError::rejected(format!(
                        "order {} has no amount",
                        order.id
                    )));
                }
                info!(order_id = %order.id, amount = order.amount, "order recorded");
                Ok(())
            },
        )
        .await?;
    registry
        .register_subscription::<OrderPlaced, _>(
            ORDERS_SUBJECT,
            "order-metrics",
            |order: OrderPlaced| async move {
                info!(order_id = %order.id, "order counted");
                Ok::<_, HandlerError>(())
            },
        )
        .await?;

    let publisher = registry
        .register_publisher::<OrderPlaced>(ORDERS_SUBJECT)
        .await?
        .with_hints(EventHints::new().with_event_type("com.example.order.placed"));

    for (id, amount) in [("A1", 10), ("A2", 0)] {
        let attributes = publisher
            .publish(&OrderPlaced {
                id: id.to_owned(),
                amount,
            })
            .await?;
        info!(ce_id = attributes.id(), order_id = id, "order published");
    }

    transport.wait_for_resolutions(EXPECTED_RESOLUTIONS).await?;
    info!(
        status = %registry.health().await.status(),
        "messaging health"
    );

    let stopped = registry.shutdown().await?;
    for (key, summary) in &stopped {
        info!(
            subscription = %key,
            acknowledged = summary.acknowledged,
            negatively_acknowledged = summary.negatively_acknowledged(),
            "subscription summary"
        );
    }
    info!(
        dead_letters = transport.dead_letters()?.len(),
        "demo finished"
    );
    Ok(())
}
