//! Fan-out, redelivery, unregistration, and shutdown.

use crate::in_memory::helpers::{Harness, Inbox, OrderData, harness, order};
use courier::messaging::{
    adapters::memory::Resolution,
    config::InMemoryTransportConfig,
    domain::{HEADER_ID, HealthStatus, Subject},
    error::HandlerError,
};
use eyre::OptionExt;
use rstest::rstest;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn every_handler_on_a_subject_receives_each_message(
    harness: Harness,
) -> eyre::Result<()> {
    let ledger = Inbox::default();
    let metrics = Inbox::default();
    for (handler_id, inbox) in [("order-ledger", &ledger), ("order-metrics", &metrics)] {
        harness
            .registry
            .register_subscription::<OrderData, _>("orders.created", handler_id, inbox.clone())
            .await?;
    }
    let publisher = harness
        .registry
        .register_publisher::<OrderData>("orders.created")
        .await?;

    publisher.publish(&order("A1", 10)).await?;
    harness.settle(2).await?;

    assert_eq!(ledger.received(), vec![order("A1", 10)]);
    assert_eq!(metrics.received(), vec![order("A1", 10)]);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn messages_stay_on_their_subject(harness: Harness) -> eyre::Result<()> {
    let created = Inbox::default();
    let cancelled = Inbox::default();
    harness
        .registry
        .register_subscription::<OrderData, _>("orders.created", "order-ledger", created.clone())
        .await?;
    harness
        .registry
        .register_subscription::<OrderData, _>(
            "orders.cancelled",
            "order-ledger",
            cancelled.clone(),
        )
        .await?;
    let publisher = harness
        .registry
        .register_publisher::<OrderData>("orders.cancelled")
        .await?;

    publisher.publish(&order("A1", 10)).await?;
    harness.settle(1).await?;

    assert!(created.received().is_empty());
    assert_eq!(cancelled.received(), vec![order("A1", 10)]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_message_is_redelivered_until_handled() -> eyre::Result<()> {
    let harness =
        Harness::with_transport_config(InMemoryTransportConfig::default().with_max_deliveries(3));
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let flaky = move |_order: OrderData| {
        let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            if attempt < 2 {
                Err(HandlerError::rejected("ledger warming up"))
            } else {
                Ok(())
            }
        }
    };
    harness
        .registry
        .register_subscription::<OrderData, _>("orders.created", "flaky-ledger", flaky)
        .await?;
    let publisher = harness
        .registry
        .register_publisher::<OrderData>("orders.created")
        .await?;

    publisher.publish(&order("A1", 10)).await?;
    let records = harness.settle(2).await?;

    let attempts: Vec<(u32, Resolution)> = records
        .iter()
        .map(|record| (record.attempt, record.resolution))
        .collect();
    assert_eq!(
        attempts,
        vec![
            (1, Resolution::NegativelyAcknowledged),
            (2, Resolution::Acknowledged)
        ]
    );
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(harness.transport.dead_letters()?.is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn exhausted_message_is_dead_lettered() -> eyre::Result<()> {
    let harness =
        Harness::with_transport_config(InMemoryTransportConfig::default().with_max_deliveries(2));
    let always_fails =
        |_order: OrderData| async { Err::<(), _>(HandlerError::rejected("ledger unavailable")) };
    harness
        .registry
        .register_subscription::<OrderData, _>("orders.created", "always-fails", always_fails)
        .await?;
    let publisher = harness
        .registry
        .register_publisher::<OrderData>("orders.created")
        .await?;

    let attributes = publisher.publish(&order("A1", 10)).await?;
    harness.settle(2).await?;

    let dead = harness.transport.dead_letters()?;
    let letter = dead.first().ok_or_eyre("one dead letter")?;
    assert_eq!(dead.len(), 1);
    assert_eq!(letter.attempts, 2);
    assert_eq!(letter.message.headers().get(HEADER_ID), Some(attributes.id()));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unregistered_subscription_stops_receiving(harness: Harness) -> eyre::Result<()> {
    let inbox = Inbox::default();
    let key = harness
        .registry
        .register_subscription::<OrderData, _>("orders.created", "order-ledger", inbox.clone())
        .await?;
    let publisher = harness
        .registry
        .register_publisher::<OrderData>("orders.created")
        .await?;

    publisher.publish(&order("A1", 10)).await?;
    harness.settle(1).await?;
    let stats = harness.registry.unregister_subscription(&key).await?;
    publisher.publish(&order("A2", 20)).await?;

    assert_eq!(stats.acknowledged, 1);
    assert_eq!(inbox.received(), vec![order("A1", 10)]);
    let subject = Subject::new("orders.created")?;
    assert_eq!(harness.transport.consumer_count(&subject)?, 0);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn shutdown_reports_per_subscription_counters(harness: Harness) -> eyre::Result<()> {
    let ledger = harness
        .registry
        .register_subscription::<OrderData, _>("orders.created", "order-ledger", Inbox::default())
        .await?;
    let rejects_zero = |order: OrderData| async move {
        if order.amount == 0 {
            Err(HandlerError::rejected("amount must be positive"))
        } else {
            Ok(())
        }
    };
    let picky = harness
        .registry
        .register_subscription::<OrderData, _>("orders.created", "order-picky", rejects_zero)
        .await?;
    let publisher = harness
        .registry
        .register_publisher::<OrderData>("orders.created")
        .await?;

    publisher.publish(&order("A1", 10)).await?;
    publisher.publish(&order("A2", 0)).await?;
    harness.settle(4).await?;
    assert_eq!(harness.registry.health().await.status(), HealthStatus::Healthy);

    let stopped = harness.registry.shutdown().await?;

    let ledger_stats = stopped.get(&ledger).ok_or_eyre("ledger stats")?;
    let picky_stats = stopped.get(&picky).ok_or_eyre("picky stats")?;
    assert_eq!(ledger_stats.acknowledged, 2);
    assert_eq!(picky_stats.acknowledged, 1);
    assert_eq!(picky_stats.handler_failures, 1);
    assert!(harness.registry.subscriptions().await.is_empty());
    assert_eq!(harness.registry.health().await.running_subscriptions(), 0);
    Ok(())
}
