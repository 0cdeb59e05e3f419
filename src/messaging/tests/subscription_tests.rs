//! Unit tests for the subscription processor state machine and loop.

use super::fixtures::{
    ORDER_TYPE_NAME, OrderData, ResolutionLog, Resolved, encoded_order, order, subject, wrapped,
};
use crate::messaging::adapters::memory::{InMemoryTransport, Resolution};
use crate::messaging::codec::{MessageCodec, MessageType};
use crate::messaging::domain::{EnvelopeError, HEADER_TYPE, HandlerId};
use crate::messaging::error::HandlerError;
use crate::messaging::ports::{OutboundMessage, Transport};
use crate::messaging::services::{
    MessageHandler, ProcessingFailure, ProcessingOutcome, ProcessingStage, SubscriptionHandle,
    SubscriptionProcessor, SubscriptionStats,
};
use rstest::rstest;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, watch};
use tracing_test::traced_test;

type Seen = Arc<Mutex<Vec<OrderData>>>;

fn processor<H>(handler_id: &str, handler: H) -> SubscriptionProcessor<OrderData, H>
where
    H: MessageHandler<OrderData>,
{
    SubscriptionProcessor::new(
        subject("orders.created"),
        HandlerId::new(handler_id).expect("valid handler id"),
        MessageType::new(Arc::new(MessageCodec::new())).expect("order payload is valid"),
        Arc::new(handler),
    )
}

fn recording(seen: &Seen) -> impl MessageHandler<OrderData> + use<> {
    let sink = Arc::clone(seen);
    move |order: OrderData| {
        let target = Arc::clone(&sink);
        async move {
            target.lock().expect("seen lock").push(order);
            Ok::<_, HandlerError>(())
        }
    }
}

fn always_fails() -> impl MessageHandler<OrderData> {
    |_order: OrderData| async { Err::<(), _>(HandlerError::rejected("ledger unavailable")) }
}

fn handler_failure(outcome: &ProcessingOutcome) -> Option<&HandlerError> {
    match outcome.failure() {
        Some(ProcessingFailure::Handler(err)) => Some(err),
        _ => None,
    }
}

// ============================================================================
// process
// ============================================================================

#[tokio::test]
#[traced_test]
async fn valid_message_is_handled_and_acknowledged() {
    let seen = Seen::default();
    let log = ResolutionLog::default();
    let orders = processor("order-ledger", recording(&seen));
    let (headers, body) = encoded_order("A1", 10);

    let outcome = orders.process(log.delivery(headers, body)).await;

    assert!(outcome.is_acknowledged());
    assert_eq!(log.entries(), vec![Resolved::Ack]);
    assert_eq!(*seen.lock().expect("seen lock"), vec![order("A1", 10)]);
    assert!(logs_contain("message acknowledged"));
}

#[tokio::test]
#[traced_test]
async fn envelope_failure_is_naked_and_next_message_still_processed() {
    let seen = Seen::default();
    let log = ResolutionLog::default();
    let orders = processor("order-ledger", recording(&seen));
    let (mut broken_headers, broken_body) = encoded_order("A0", 1);
    broken_headers.remove(HEADER_TYPE);

    let rejected = orders
        .process(log.delivery(broken_headers, broken_body))
        .await;
    let (headers, body) = encoded_order("A1", 10);
    let accepted = orders.process(log.delivery(headers, body)).await;

    assert!(matches!(
        rejected.failure(),
        Some(ProcessingFailure::Envelope(EnvelopeError::MissingAttribute(HEADER_TYPE)))
    ));
    assert!(accepted.is_acknowledged());
    assert_eq!(log.entries(), vec![Resolved::Nak, Resolved::Ack]);
    assert_eq!(*seen.lock().expect("seen lock"), vec![order("A1", 10)]);
    assert!(logs_contain("rejected message with invalid event envelope"));
    assert!(logs_contain("subject=orders.created"));
    assert!(logs_contain("ce-type"));
}

#[tokio::test]
#[traced_test]
async fn decode_failure_logs_type_and_excerpt() {
    let seen = Seen::default();
    let log = ResolutionLog::default();
    let orders = processor("order-ledger", recording(&seen));
    let (bad_headers, bad_body) = wrapped(br#"{"id":"A1","amount":"ten"}"#);

    let rejected = orders.process(log.delivery(bad_headers, bad_body)).await;
    let (headers, body) = encoded_order("A2", 20);
    let accepted = orders.process(log.delivery(headers, body)).await;

    assert_eq!(
        rejected.failure().map(ProcessingFailure::failed_at),
        Some(ProcessingStage::Decode)
    );
    assert!(accepted.is_acknowledged());
    assert_eq!(log.entries(), vec![Resolved::Nak, Resolved::Ack]);
    assert!(logs_contain("failed to decode message payload"));
    assert!(logs_contain(ORDER_TYPE_NAME));
    assert!(logs_contain(r#""amount":"ten""#));
}

#[tokio::test]
#[traced_test]
async fn decode_failure_log_omits_excerpt_when_disabled() {
    let log = ResolutionLog::default();
    let orders = processor("order-ledger", recording(&Seen::default()))
        .with_payload_excerpts(false);
    let (headers, body) = wrapped(br#"{"secret":"hunter2"}"#);

    let outcome = orders.process(log.delivery(headers, body)).await;

    assert_eq!(
        outcome.failure().map(ProcessingFailure::failed_at),
        Some(ProcessingStage::Decode)
    );
    assert!(logs_contain("failed to decode message payload"));
    assert!(!logs_contain("hunter2"));
}

#[tokio::test]
#[traced_test]
async fn handler_error_is_logged_with_handler_identity() {
    let log = ResolutionLog::default();
    let orders = processor("always-fails", always_fails());
    let (headers, body) = encoded_order("A1", 10);

    let outcome = orders.process(log.delivery(headers, body)).await;

    assert!(matches!(
        handler_failure(&outcome),
        Some(HandlerError::Rejected(message)) if message == "ledger unavailable"
    ));
    assert_eq!(log.entries(), vec![Resolved::Nak]);
    assert!(logs_contain("message handler failed"));
    assert!(logs_contain("handler=always-fails"));
    assert!(logs_contain("ledger unavailable"));
}

#[tokio::test]
#[traced_test]
async fn handler_panic_becomes_handler_failure() {
    let log = ResolutionLog::default();
    let orders = processor("panics", |order: OrderData| async move {
        assert!(order.amount > 0, "zero amount");
        Ok::<_, HandlerError>(())
    });
    let (headers, body) = encoded_order("A1", 0);

    let outcome = orders.process(log.delivery(headers, body)).await;

    assert!(matches!(
        handler_failure(&outcome),
        Some(HandlerError::Panicked(message)) if message.contains("zero amount")
    ));
    assert_eq!(log.entries(), vec![Resolved::Nak]);
}

#[rstest]
fn stats_count_outcomes_by_stage() {
    let mut stats = SubscriptionStats::default();

    stats.record(&ProcessingOutcome::Acknowledged);
    stats.record(&ProcessingOutcome::NegativelyAcknowledged(
        ProcessingFailure::Envelope(EnvelopeError::StructuredMode),
    ));
    stats.record(&ProcessingOutcome::NegativelyAcknowledged(
        ProcessingFailure::Handler(HandlerError::rejected("no")),
    ));

    assert_eq!(stats.acknowledged, 1);
    assert_eq!(stats.envelope_failures, 1);
    assert_eq!(stats.handler_failures, 1);
    assert_eq!(stats.negatively_acknowledged(), 2);
    assert_eq!(stats.processed(), 3);
}

// ============================================================================
// run
// ============================================================================

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn loop_survives_failures_and_stops_gracefully() {
    let transport = InMemoryTransport::new();
    let orders = subject("orders.created");
    let consumer = transport.subscribe(&orders).await.expect("subscribe");
    let handle = SubscriptionHandle::spawn(processor("always-fails", always_fails()), consumer);

    for id in ["A1", "A2"] {
        let (headers, body) = encoded_order(id, 10);
        transport
            .send(&orders, OutboundMessage::new(headers, body))
            .await
            .expect("send");
    }
    let resolutions = transport.wait_for_resolutions(2).await.expect("resolutions");

    assert!(
        resolutions
            .iter()
            .take(2)
            .all(|record| record.resolution == Resolution::NegativelyAcknowledged)
    );
    assert!(handle.is_running());

    let stats = handle.stop().await.expect("loop stops cleanly");
    assert!(stats.handler_failures >= 2);
    assert_eq!(stats.acknowledged, 0);
    assert_eq!(transport.consumer_count(&orders).expect("count"), 0);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stop_lets_in_flight_handler_finish() {
    let transport = InMemoryTransport::new();
    let orders = subject("orders.created");
    let consumer = transport.subscribe(&orders).await.expect("subscribe");
    let started = Arc::new(Notify::new());
    let slow = {
        let signal = Arc::clone(&started);
        move |_order: OrderData| {
            let entered = Arc::clone(&signal);
            async move {
                entered.notify_one();
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok::<_, HandlerError>(())
            }
        }
    };
    let handle = SubscriptionHandle::spawn(processor("slow-ledger", slow), consumer);
    let (headers, body) = encoded_order("A1", 10);
    transport
        .send(&orders, OutboundMessage::new(headers, body))
        .await
        .expect("send");

    started.notified().await;
    let stats = handle.stop().await.expect("loop stops cleanly");

    assert_eq!(stats.acknowledged, 1);
    assert_eq!(stats.negatively_acknowledged(), 0);
    let resolutions = transport.resolutions().expect("resolutions");
    assert_eq!(resolutions.len(), 1);
    assert_eq!(
        resolutions.first().map(|record| record.resolution),
        Some(Resolution::Acknowledged)
    );
    assert!(transport.dead_letters().expect("dead letters").is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn loop_ends_when_consumer_closes() {
    let transport = InMemoryTransport::new();
    let orders = subject("orders.created");
    let mut consumer = transport.subscribe(&orders).await.expect("subscribe");
    consumer.unsubscribe().await.expect("unsubscribe");
    let (_shutdown, signal) = watch::channel(false);

    let stats = processor("order-ledger", recording(&Seen::default()))
        .run(consumer, signal)
        .await;

    assert_eq!(stats, SubscriptionStats::default());
}
