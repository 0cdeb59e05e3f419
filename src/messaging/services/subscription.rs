//! Subscription processing: decode, dispatch, and resolve each delivery.

use crate::messaging::codec::{MessageType, Payload};
use crate::messaging::domain::{EnvelopeError, EventEnvelope, HandlerId, Subject};
use crate::messaging::error::{DeserializationError, HandlerError};
use crate::messaging::ports::{Consumer, Delivery};
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

/// Business logic invoked with each decoded payload.
///
/// The handler receives only the decoded value. Returning an error causes
/// the message to be negatively acknowledged.
///
/// Async closures of the form `|value: T| async move { ... }` returning
/// `Result<(), HandlerError>` implement this trait.
#[async_trait]
pub trait MessageHandler<T>: Send + Sync + 'static {
    /// Handles one decoded payload.
    async fn handle(&self, message: T) -> Result<(), HandlerError>;
}

#[async_trait]
impl<T, F, Fut> MessageHandler<T> for F
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, message: T) -> Result<(), HandlerError> {
        (self)(message).await
    }
}

/// Step of the processing pipeline at which a delivery failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessingStage {
    /// Envelope headers were missing or invalid.
    Envelope,
    /// The body did not decode into the payload type.
    Decode,
    /// The handler returned an error or panicked.
    Handler,
}

impl ProcessingStage {
    /// Returns the canonical representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Envelope => "envelope",
            Self::Decode => "decode",
            Self::Handler => "handler",
        }
    }
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Why a delivery was negatively acknowledged.
#[derive(Debug, Clone)]
pub enum ProcessingFailure {
    /// Envelope validation failed.
    Envelope(EnvelopeError),
    /// Payload decoding failed.
    Decode(DeserializationError),
    /// The handler failed.
    Handler(HandlerError),
}

impl ProcessingFailure {
    /// Returns the stage that failed.
    #[must_use]
    pub const fn failed_at(&self) -> ProcessingStage {
        match self {
            Self::Envelope(_) => ProcessingStage::Envelope,
            Self::Decode(_) => ProcessingStage::Decode,
            Self::Handler(_) => ProcessingStage::Handler,
        }
    }
}

impl fmt::Display for ProcessingFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Envelope(err) => write!(f, "envelope: {err}"),
            Self::Decode(err) => write!(f, "decode: {err}"),
            Self::Handler(err) => write!(f, "handler: {err}"),
        }
    }
}

/// Terminal state of one delivery.
#[derive(Debug, Clone)]
pub enum ProcessingOutcome {
    /// The handler succeeded and the message was acknowledged.
    Acknowledged,
    /// A step failed and the message was negatively acknowledged.
    NegativelyAcknowledged(ProcessingFailure),
}

impl ProcessingOutcome {
    /// Returns `true` for acknowledged deliveries.
    #[must_use]
    pub const fn is_acknowledged(&self) -> bool {
        matches!(self, Self::Acknowledged)
    }

    /// Returns the failure for negatively acknowledged deliveries.
    #[must_use]
    pub const fn failure(&self) -> Option<&ProcessingFailure> {
        match self {
            Self::Acknowledged => None,
            Self::NegativelyAcknowledged(failure) => Some(failure),
        }
    }
}

/// Per-subscription delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionStats {
    /// Deliveries acknowledged.
    pub acknowledged: u64,
    /// Deliveries rejected for an invalid envelope.
    pub envelope_failures: u64,
    /// Deliveries rejected because the body did not decode.
    pub decode_failures: u64,
    /// Deliveries rejected by the handler.
    pub handler_failures: u64,
}

impl SubscriptionStats {
    /// Returns the total number of deliveries processed.
    #[must_use]
    pub const fn processed(&self) -> u64 {
        self.acknowledged
            .saturating_add(self.negatively_acknowledged())
    }

    /// Returns the number of deliveries negatively acknowledged.
    #[must_use]
    pub const fn negatively_acknowledged(&self) -> u64 {
        self.envelope_failures
            .saturating_add(self.decode_failures)
            .saturating_add(self.handler_failures)
    }

    /// Counts one outcome.
    pub const fn record(&mut self, outcome: &ProcessingOutcome) {
        let counter = match outcome {
            ProcessingOutcome::Acknowledged => &mut self.acknowledged,
            ProcessingOutcome::NegativelyAcknowledged(ProcessingFailure::Envelope(_)) => {
                &mut self.envelope_failures
            }
            ProcessingOutcome::NegativelyAcknowledged(ProcessingFailure::Decode(_)) => {
                &mut self.decode_failures
            }
            ProcessingOutcome::NegativelyAcknowledged(ProcessingFailure::Handler(_)) => {
                &mut self.handler_failures
            }
        };
        *counter = counter.saturating_add(1);
    }
}

/// Drives one handler's subscription.
///
/// Each delivery moves through envelope validation, decoding, and handler
/// invocation. The first failing step is logged at error level and the
/// message is negatively acknowledged; otherwise it is acknowledged.
/// Failures never stop the loop.
pub struct SubscriptionProcessor<T, H> {
    subject: Subject,
    handler_id: HandlerId,
    message_type: MessageType<T>,
    handler: Arc<H>,
    log_payload_excerpts: bool,
}

impl<T, H> SubscriptionProcessor<T, H>
where
    T: Payload,
    H: MessageHandler<T>,
{
    /// Creates a processor for a validated message type.
    #[must_use]
    pub const fn new(
        subject: Subject,
        handler_id: HandlerId,
        message_type: MessageType<T>,
        handler: Arc<H>,
    ) -> Self {
        Self {
            subject,
            handler_id,
            message_type,
            handler,
            log_payload_excerpts: true,
        }
    }

    /// Controls whether decode-failure logs carry the raw payload excerpt.
    #[must_use]
    pub const fn with_payload_excerpts(mut self, enabled: bool) -> Self {
        self.log_payload_excerpts = enabled;
        self
    }

    /// Returns the subscribed subject.
    #[must_use]
    pub const fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Returns the handler identifier.
    #[must_use]
    pub const fn handler_id(&self) -> &HandlerId {
        &self.handler_id
    }

    /// Processes one delivery and resolves it with the transport.
    ///
    /// Resolution failures are logged; the outcome reflects the processing
    /// result regardless.
    pub async fn process(&self, delivery: Delivery) -> ProcessingOutcome {
        let outcome = match self.evaluate(&delivery).await {
            Ok(ce_id) => {
                debug!(
                    subject = %self.subject,
                    handler = %self.handler_id,
                    ce_id = %ce_id,
                    "message acknowledged"
                );
                ProcessingOutcome::Acknowledged
            }
            Err(failure) => ProcessingOutcome::NegativelyAcknowledged(failure),
        };

        let resolution = if outcome.is_acknowledged() {
            delivery.ack().await
        } else {
            delivery.nak().await
        };
        if let Err(err) = resolution {
            warn!(
                subject = %self.subject,
                handler = %self.handler_id,
                error = %err,
                "failed to resolve message with transport"
            );
        }
        outcome
    }

    async fn evaluate(&self, delivery: &Delivery) -> Result<String, ProcessingFailure> {
        let event = EventEnvelope::unwrap(delivery.headers(), delivery.body()).map_err(|err| {
            error!(
                subject = %self.subject,
                handler = %self.handler_id,
                attempt = delivery.attempt(),
                error = %err,
                "rejected message with invalid event envelope"
            );
            ProcessingFailure::Envelope(err)
        })?;
        let ce_id = event.attributes().id();

        let value = self.message_type.decode(event.body()).map_err(|err| {
            self.log_decode_failure(ce_id, &err);
            ProcessingFailure::Decode(err)
        })?;

        self.invoke(value).await.map_err(|err| {
            error!(
                subject = %self.subject,
                handler = %self.handler_id,
                type_name = self.message_type.type_name(),
                ce_id,
                error = %err,
                "message handler failed"
            );
            ProcessingFailure::Handler(err)
        })?;

        Ok(ce_id.to_owned())
    }

    fn log_decode_failure(&self, ce_id: &str, err: &DeserializationError) {
        if self.log_payload_excerpts {
            error!(
                subject = %self.subject,
                handler = %self.handler_id,
                type_name = %err.type_name,
                ce_id,
                payload_len = err.payload_len,
                excerpt = %err.excerpt,
                error = %err.cause,
                "failed to decode message payload"
            );
        } else {
            error!(
                subject = %self.subject,
                handler = %self.handler_id,
                type_name = %err.type_name,
                ce_id,
                payload_len = err.payload_len,
                error = %err.cause,
                "failed to decode message payload"
            );
        }
    }

    /// Runs the handler on its own task so a panic surfaces as an error.
    async fn invoke(&self, value: T) -> Result<(), HandlerError> {
        let handler = Arc::clone(&self.handler);
        match tokio::spawn(async move { handler.handle(value).await }).await {
            Ok(result) => result,
            Err(join_error) => Err(handler_join_error(join_error)),
        }
    }

    /// Receives and processes deliveries until `shutdown` turns `true`, its
    /// sender is dropped, or the consumer closes; then unsubscribes.
    ///
    /// A delivery already being processed when shutdown is signalled runs to
    /// completion first.
    pub async fn run(
        self,
        mut consumer: Box<dyn Consumer>,
        mut shutdown: watch::Receiver<bool>,
    ) -> SubscriptionStats {
        let mut stats = SubscriptionStats::default();
        info!(
            subject = %self.subject,
            handler = %self.handler_id,
            type_name = self.message_type.type_name(),
            "subscription started"
        );

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }
            let next = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                delivery = consumer.next() => delivery,
            };
            let Some(delivery) = next else {
                warn!(
                    subject = %self.subject,
                    handler = %self.handler_id,
                    "consumer closed by transport"
                );
                break;
            };
            stats.record(&self.process(delivery).await);
        }

        if let Err(err) = consumer.unsubscribe().await {
            warn!(
                subject = %self.subject,
                handler = %self.handler_id,
                error = %err,
                "failed to unsubscribe consumer"
            );
        }
        info!(
            subject = %self.subject,
            handler = %self.handler_id,
            acknowledged = stats.acknowledged,
            negatively_acknowledged = stats.negatively_acknowledged(),
            "subscription stopped"
        );
        stats
    }
}

fn handler_join_error(join_error: JoinError) -> HandlerError {
    if join_error.is_panic() {
        HandlerError::from_panic(&*join_error.into_panic())
    } else {
        HandlerError::failed(join_error)
    }
}

impl<T, H> fmt::Debug for SubscriptionProcessor<T, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionProcessor")
            .field("subject", &self.subject)
            .field("handler_id", &self.handler_id)
            .field("message_type", &self.message_type)
            .field("log_payload_excerpts", &self.log_payload_excerpts)
            .finish_non_exhaustive()
    }
}

/// Control handle for a spawned subscription loop.
#[derive(Debug)]
pub struct SubscriptionHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<SubscriptionStats>,
}

impl SubscriptionHandle {
    /// Spawns `processor` over `consumer` on the current Tokio runtime.
    #[must_use]
    pub fn spawn<T, H>(processor: SubscriptionProcessor<T, H>, consumer: Box<dyn Consumer>) -> Self
    where
        T: Payload,
        H: MessageHandler<T>,
    {
        let (shutdown, signal) = watch::channel(false);
        let task = tokio::spawn(processor.run(consumer, signal));
        Self { shutdown, task }
    }

    /// Returns `true` while the loop has not ended.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Signals shutdown and waits for the loop to finish its in-flight
    /// delivery and unsubscribe.
    ///
    /// # Errors
    ///
    /// Returns the [`JoinError`] when the loop task panicked or was
    /// cancelled.
    pub async fn stop(self) -> Result<SubscriptionStats, JoinError> {
        self.shutdown.send_replace(true);
        self.task.await
    }
}
