//! Subscription outcomes for malformed, undecodable, and rejected messages.

use crate::in_memory::helpers::{Harness, Inbox, OrderData, harness, order, outbound, raw_event};
use courier::messaging::{
    adapters::memory::{Resolution, ResolutionRecord},
    domain::{HEADER_TYPE, Subject},
    error::HandlerError,
    ports::Transport,
    services::SubscriptionKey,
};
use eyre::OptionExt;
use rstest::rstest;

fn outcomes(records: &[ResolutionRecord]) -> Vec<Resolution> {
    records.iter().map(|record| record.resolution).collect()
}

async fn subscribe_inbox(harness: &Harness, inbox: &Inbox) -> eyre::Result<SubscriptionKey> {
    Ok(harness
        .registry
        .register_subscription::<OrderData, _>("orders.created", "order-ledger", inbox.clone())
        .await?)
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn valid_message_is_handled_and_acknowledged(harness: Harness) -> eyre::Result<()> {
    let inbox = Inbox::default();
    subscribe_inbox(&harness, &inbox).await?;
    let publisher = harness
        .registry
        .register_publisher::<OrderData>("orders.created")
        .await?;

    let attributes = publisher.publish(&order("A1", 10)).await?;
    let records = harness.settle(1).await?;

    assert_eq!(inbox.received(), vec![order("A1", 10)]);
    let record = records.first().ok_or_eyre("one resolution")?;
    assert_eq!(record.resolution, Resolution::Acknowledged);
    assert_eq!(record.event_id.as_deref(), Some(attributes.id()));
    assert_eq!(record.attempt, 1);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn missing_event_type_is_rejected_and_later_messages_flow(
    harness: Harness,
) -> eyre::Result<()> {
    let inbox = Inbox::default();
    subscribe_inbox(&harness, &inbox).await?;
    let subject = Subject::new("orders.created")?;

    let (mut headers, body) = raw_event(&serde_json::to_vec(&order("A0", 5))?);
    headers.remove(HEADER_TYPE);
    harness.transport.send(&subject, outbound((headers, body))).await?;
    let valid = raw_event(&serde_json::to_vec(&order("A1", 10))?);
    harness.transport.send(&subject, outbound(valid)).await?;

    let records = harness.settle(2).await?;

    assert_eq!(
        outcomes(&records),
        vec![Resolution::NegativelyAcknowledged, Resolution::Acknowledged]
    );
    assert_eq!(inbox.received(), vec![order("A1", 10)]);
    assert_eq!(harness.transport.dead_letters()?.len(), 1);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn undecodable_body_is_rejected_and_later_messages_flow(
    harness: Harness,
) -> eyre::Result<()> {
    let inbox = Inbox::default();
    subscribe_inbox(&harness, &inbox).await?;
    let subject = Subject::new("orders.created")?;

    let wrong_types = raw_event(br#"{"id":7,"amount":"ten"}"#);
    harness.transport.send(&subject, outbound(wrong_types)).await?;
    let valid = raw_event(&serde_json::to_vec(&order("A2", 20))?);
    harness.transport.send(&subject, outbound(valid)).await?;

    let records = harness.settle(2).await?;

    assert_eq!(
        outcomes(&records),
        vec![Resolution::NegativelyAcknowledged, Resolution::Acknowledged]
    );
    assert_eq!(inbox.received(), vec![order("A2", 20)]);
    let dead = harness.transport.dead_letters()?;
    let letter = dead.first().ok_or_eyre("one dead letter")?;
    assert_eq!(letter.message.body(), br#"{"id":7,"amount":"ten"}"#);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failing_handler_naks_without_stopping_the_loop(harness: Harness) -> eyre::Result<()> {
    let key = harness
        .registry
        .register_subscription::<OrderData, _>(
            "orders.created",
            "always-fails",
            |_order: OrderData| async {
                Err::<(), _>(HandlerError::rejected("ledger unavailable"))
            },
        )
        .await?;
    let publisher = harness
        .registry
        .register_publisher::<OrderData>("orders.created")
        .await?;

    publisher.publish(&order("A1", 10)).await?;
    publisher.publish(&order("A2", 20)).await?;
    let records = harness.settle(2).await?;

    assert_eq!(
        outcomes(&records),
        vec![
            Resolution::NegativelyAcknowledged,
            Resolution::NegativelyAcknowledged
        ]
    );
    assert!(harness.registry.is_running(&key).await);

    let stats = harness.registry.unregister_subscription(&key).await?;
    assert_eq!(stats.handler_failures, 2);
    assert_eq!(stats.acknowledged, 0);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn panicking_handler_is_contained(harness: Harness) -> eyre::Result<()> {
    let key = harness
        .registry
        .register_subscription::<OrderData, _>(
            "orders.created",
            "panics-on-zero",
            |order: OrderData| async move {
                assert!(order.amount > 0, "zero amount");
                Ok::<_, HandlerError>(())
            },
        )
        .await?;
    let publisher = harness
        .registry
        .register_publisher::<OrderData>("orders.created")
        .await?;

    publisher.publish(&order("A0", 0)).await?;
    publisher.publish(&order("A1", 10)).await?;
    let records = harness.settle(2).await?;

    assert_eq!(
        outcomes(&records),
        vec![Resolution::NegativelyAcknowledged, Resolution::Acknowledged]
    );
    assert!(harness.registry.is_running(&key).await);
    Ok(())
}
