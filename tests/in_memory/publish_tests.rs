//! Publishing through a registered publisher.

use crate::in_memory::helpers::{Harness, Inbox, OrderData, TEST_SOURCE, harness, order};
use courier::messaging::{
    domain::{
        DATA_CONTENT_TYPE, EventEnvelope, HEADER_DATA_CONTENT_TYPE, HEADER_ID, HEADER_SOURCE,
        HEADER_SPEC_VERSION, HEADER_TIME, HEADER_TYPE, SPEC_VERSION, Subject,
        TypeValidationErrorKind,
    },
    error::{PublishError, RegistrationError, TransportError},
};
use eyre::{OptionExt, ensure};
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn published_envelope_carries_required_headers(harness: Harness) -> eyre::Result<()> {
    let publisher = harness
        .registry
        .register_publisher::<OrderData>("orders.created")
        .await?;

    let attributes = publisher.publish(&order("A1", 10)).await?;

    let sent = harness.transport.sent_messages()?;
    let message = &sent.first().ok_or_eyre("one message sent")?.message;
    let headers = message.headers();
    for required in [
        HEADER_SPEC_VERSION,
        HEADER_TYPE,
        HEADER_SOURCE,
        HEADER_ID,
        HEADER_TIME,
    ] {
        ensure!(headers.contains(required), "missing {required}");
    }
    assert_eq!(headers.get(HEADER_SPEC_VERSION), Some(SPEC_VERSION));
    assert_eq!(headers.get(HEADER_TYPE), Some(publisher.type_name()));
    assert_eq!(headers.get(HEADER_SOURCE), Some(TEST_SOURCE));
    assert_eq!(headers.get(HEADER_ID), Some(attributes.id()));
    assert_eq!(headers.get(HEADER_DATA_CONTENT_TYPE), Some(DATA_CONTENT_TYPE));

    let inbound = EventEnvelope::unwrap(headers, message.body())?;
    let decoded: OrderData = serde_json::from_slice(inbound.body())?;
    assert_eq!(decoded, order("A1", 10));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn each_publish_gets_a_fresh_event_id(harness: Harness) -> eyre::Result<()> {
    let publisher = harness
        .registry
        .register_publisher::<OrderData>("orders.created")
        .await?;

    let first = publisher.publish(&order("A1", 10)).await?;
    let second = publisher.publish(&order("A1", 10)).await?;

    assert_ne!(first.id(), second.id());
    assert_eq!(harness.transport.sent_messages()?.len(), 2);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn bare_integer_publisher_is_rejected(harness: Harness) {
    let result = harness.registry.register_publisher::<i64>("orders.count").await;

    let Err(RegistrationError::InvalidType(err)) = result else {
        panic!("expected a type validation failure, got {result:?}");
    };
    assert_eq!(err.kind, TypeValidationErrorKind::ScalarType);
    assert!(err.message.contains("single-field struct"));
    assert!(err.message.contains("struct Wrapped { value: i64 }"));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn send_failure_is_returned_to_caller(harness: Harness) -> eyre::Result<()> {
    let inbox = Inbox::default();
    harness
        .registry
        .register_subscription::<OrderData, _>("orders.created", "order-ledger", inbox.clone())
        .await?;
    let publisher = harness
        .registry
        .register_publisher::<OrderData>("orders.created")
        .await?;
    harness.transport.disconnect();

    let result = publisher.publish(&order("A1", 10)).await;

    assert!(matches!(
        result,
        Err(PublishError::Transport(TransportError::NotConnected))
    ));
    assert!(harness.transport.sent_messages()?.is_empty());
    assert!(harness.transport.resolutions()?.is_empty());
    assert!(inbox.received().is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn publishing_resumes_after_reconnect(harness: Harness) -> eyre::Result<()> {
    let publisher = harness
        .registry
        .register_publisher::<OrderData>("orders.created")
        .await?;

    harness.transport.disconnect();
    assert!(publisher.publish(&order("A1", 10)).await.is_err());
    harness.transport.reconnect();
    publisher.publish(&order("A2", 20)).await?;

    let sent = harness.transport.sent_messages()?;
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent.first().map(|entry| &entry.subject),
        Some(&Subject::new("orders.created")?)
    );
    Ok(())
}
