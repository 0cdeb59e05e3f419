//! In-memory transport for tests and local wiring.

use crate::messaging::config::InMemoryTransportConfig;
use crate::messaging::domain::{HEADER_ID, Subject};
use crate::messaging::error::{TransportError, TransportResult};
use crate::messaging::ports::{AckHandle, Consumer, Delivery, OutboundMessage, Transport};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::{Notify, mpsc};
use tracing::debug;

/// Identifier of a consumer created by [`InMemoryTransport::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(u64);

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "consumer-{}", self.0)
    }
}

/// How a delivery was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    /// The message was acknowledged.
    Acknowledged,
    /// The message was negatively acknowledged.
    NegativelyAcknowledged,
}

/// One recorded ack or nak.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionRecord {
    /// Subject the message was delivered on.
    pub subject: Subject,
    /// Consumer that resolved the message.
    pub consumer: ConsumerId,
    /// `ce-id` of the message, when present.
    pub event_id: Option<String>,
    /// Delivery attempt that was resolved, starting at 1.
    pub attempt: u32,
    /// Ack or nak.
    pub resolution: Resolution,
}

/// A message accepted by [`InMemoryTransport::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Destination subject.
    pub subject: Subject,
    /// Headers and body as sent.
    pub message: OutboundMessage,
}

/// A message that exhausted its deliveries, or was still queued when its
/// consumer unsubscribed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    /// Subject the message was delivered on.
    pub subject: Subject,
    /// Consumer that rejected the message last.
    pub consumer: ConsumerId,
    /// Headers and body of the message.
    pub message: OutboundMessage,
    /// Number of deliveries made; zero when the consumer left before the
    /// first one.
    pub attempts: u32,
}

/// Thread-safe in-memory transport.
///
/// Every consumer on a subject receives every message sent after it
/// subscribed. Negatively acknowledged messages are redelivered to the same
/// consumer until [`InMemoryTransportConfig::max_deliveries`] is reached and
/// then moved to the dead-letter list. Messages still queued for a consumer
/// when it unsubscribes are dead-lettered too. Sends, resolutions, and dead
/// letters are recorded for inspection.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTransport {
    inner: Arc<TransportInner>,
}

#[derive(Debug, Default)]
struct TransportInner {
    config: InMemoryTransportConfig,
    disconnected: AtomicBool,
    state: RwLock<TransportState>,
    resolved: Notify,
}

#[derive(Debug, Default)]
struct TransportState {
    consumers: HashMap<Subject, Vec<ConsumerSlot>>,
    sent: Vec<SentMessage>,
    resolutions: Vec<ResolutionRecord>,
    dead_letters: Vec<DeadLetter>,
    next_consumer_id: u64,
}

#[derive(Debug)]
struct ConsumerSlot {
    id: ConsumerId,
    sender: mpsc::UnboundedSender<QueuedMessage>,
}

#[derive(Debug, Clone)]
struct QueuedMessage {
    message: OutboundMessage,
    attempt: u32,
}

impl TransportInner {
    fn read_state(&self) -> TransportResult<RwLockReadGuard<'_, TransportState>> {
        self.state
            .read()
            .map_err(|err| TransportError::runtime(std::io::Error::other(err.to_string())))
    }

    fn write_state(&self) -> TransportResult<RwLockWriteGuard<'_, TransportState>> {
        self.state
            .write()
            .map_err(|err| TransportError::runtime(std::io::Error::other(err.to_string())))
    }

    fn record(&self, record: ResolutionRecord) -> TransportResult<()> {
        self.write_state()?.resolutions.push(record);
        self.resolved.notify_waiters();
        Ok(())
    }
}

impl InMemoryTransport {
    /// Creates a connected transport with the default redelivery policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a connected transport with the given redelivery policy.
    #[must_use]
    pub fn with_config(config: InMemoryTransportConfig) -> Self {
        Self {
            inner: Arc::new(TransportInner {
                config,
                ..TransportInner::default()
            }),
        }
    }

    /// Simulates losing the connection; sends and subscribes fail until
    /// [`Self::reconnect`] is called.
    pub fn disconnect(&self) {
        self.inner.disconnected.store(true, Ordering::SeqCst);
    }

    /// Restores the connection.
    pub fn reconnect(&self) {
        self.inner.disconnected.store(false, Ordering::SeqCst);
    }

    /// Returns every message accepted by `send`, in order.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Runtime`] when lock acquisition fails.
    pub fn sent_messages(&self) -> TransportResult<Vec<SentMessage>> {
        Ok(self.inner.read_state()?.sent.clone())
    }

    /// Returns every recorded ack and nak, in order.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Runtime`] when lock acquisition fails.
    pub fn resolutions(&self) -> TransportResult<Vec<ResolutionRecord>> {
        Ok(self.inner.read_state()?.resolutions.clone())
    }

    /// Returns messages that exhausted their deliveries.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Runtime`] when lock acquisition fails.
    pub fn dead_letters(&self) -> TransportResult<Vec<DeadLetter>> {
        Ok(self.inner.read_state()?.dead_letters.clone())
    }

    /// Returns the number of live consumers on a subject.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Runtime`] when lock acquisition fails.
    pub fn consumer_count(&self, subject: &Subject) -> TransportResult<usize> {
        let state = self.inner.read_state()?;
        Ok(state.consumers.get(subject).map_or(0, |slots| {
            slots.iter().filter(|slot| !slot.sender.is_closed()).count()
        }))
    }

    /// Waits until at least `count` resolutions have been recorded and
    /// returns them.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Runtime`] when lock acquisition fails.
    pub async fn wait_for_resolutions(
        &self,
        count: usize,
    ) -> TransportResult<Vec<ResolutionRecord>> {
        loop {
            let mut notified = pin!(self.inner.resolved.notified());
            notified.as_mut().enable();
            let records = self.resolutions()?;
            if records.len() >= count {
                return Ok(records);
            }
            notified.await;
        }
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn send(&self, subject: &Subject, message: OutboundMessage) -> TransportResult<()> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        let mut state = self.inner.write_state()?;
        state.sent.push(SentMessage {
            subject: subject.clone(),
            message: message.clone(),
        });

        let mut receivers = 0_usize;
        if let Some(slots) = state.consumers.get_mut(subject) {
            slots.retain(|slot| !slot.sender.is_closed());
            for slot in slots.iter() {
                let queued = QueuedMessage {
                    message: message.clone(),
                    attempt: 1,
                };
                if slot.sender.send(queued).is_ok() {
                    receivers += 1;
                }
            }
        }

        debug!(subject = %subject, receivers, "message sent");
        Ok(())
    }

    async fn subscribe(&self, subject: &Subject) -> TransportResult<Box<dyn Consumer>> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let id = {
            let mut state = self.inner.write_state()?;
            state.next_consumer_id += 1;
            let id = ConsumerId(state.next_consumer_id);
            state
                .consumers
                .entry(subject.clone())
                .or_default()
                .push(ConsumerSlot {
                    id,
                    sender: sender.clone(),
                });
            id
        };

        debug!(subject = %subject, consumer = %id, "consumer created");
        Ok(Box::new(InMemoryConsumer {
            subject: subject.clone(),
            id,
            receiver,
            requeue: sender,
            inner: Arc::clone(&self.inner),
        }))
    }

    fn is_connected(&self) -> bool {
        !self.inner.disconnected.load(Ordering::SeqCst)
    }
}

struct InMemoryConsumer {
    subject: Subject,
    id: ConsumerId,
    receiver: mpsc::UnboundedReceiver<QueuedMessage>,
    requeue: mpsc::UnboundedSender<QueuedMessage>,
    inner: Arc<TransportInner>,
}

#[async_trait]
impl Consumer for InMemoryConsumer {
    async fn next(&mut self) -> Option<Delivery> {
        let queued = self.receiver.recv().await?;
        let (headers, body) = queued.message.clone().into_parts();
        let attempt = queued.attempt;
        let handle = InMemoryAckHandle {
            subject: self.subject.clone(),
            consumer: self.id,
            queued,
            requeue: self.requeue.clone(),
            inner: Arc::clone(&self.inner),
        };
        Some(Delivery::new(headers, body, attempt, Box::new(handle)))
    }

    async fn unsubscribe(&mut self) -> TransportResult<()> {
        self.receiver.close();
        let mut stranded = Vec::new();
        while let Ok(queued) = self.receiver.try_recv() {
            stranded.push(DeadLetter {
                subject: self.subject.clone(),
                consumer: self.id,
                message: queued.message,
                attempts: queued.attempt.saturating_sub(1),
            });
        }

        let stranded_count = stranded.len();
        {
            let mut state = self.inner.write_state()?;
            if let Some(slots) = state.consumers.get_mut(&self.subject) {
                slots.retain(|slot| slot.id != self.id);
            }
            state.dead_letters.extend(stranded);
        }
        debug!(
            subject = %self.subject,
            consumer = %self.id,
            dead_lettered = stranded_count,
            "consumer removed"
        );
        Ok(())
    }
}

struct InMemoryAckHandle {
    subject: Subject,
    consumer: ConsumerId,
    queued: QueuedMessage,
    requeue: mpsc::UnboundedSender<QueuedMessage>,
    inner: Arc<TransportInner>,
}

impl InMemoryAckHandle {
    fn record(&self, resolution: Resolution) -> ResolutionRecord {
        ResolutionRecord {
            subject: self.subject.clone(),
            consumer: self.consumer,
            event_id: self
                .queued
                .message
                .headers()
                .get(HEADER_ID)
                .map(str::to_owned),
            attempt: self.queued.attempt,
            resolution,
        }
    }
}

#[async_trait]
impl AckHandle for InMemoryAckHandle {
    async fn ack(&mut self) -> TransportResult<()> {
        self.inner.record(self.record(Resolution::Acknowledged))
    }

    async fn nak(&mut self) -> TransportResult<()> {
        self.inner
            .record(self.record(Resolution::NegativelyAcknowledged))?;

        if self.queued.attempt < self.inner.config.max_deliveries() {
            let redelivery = QueuedMessage {
                message: self.queued.message.clone(),
                attempt: self.queued.attempt.saturating_add(1),
            };
            if self.requeue.send(redelivery).is_ok() {
                debug!(
                    subject = %self.subject,
                    consumer = %self.consumer,
                    attempt = self.queued.attempt,
                    "message queued for redelivery"
                );
                return Ok(());
            }
        }

        debug!(
            subject = %self.subject,
            consumer = %self.consumer,
            attempts = self.queued.attempt,
            "message dead-lettered"
        );
        self.inner.write_state()?.dead_letters.push(DeadLetter {
            subject: self.subject.clone(),
            consumer: self.consumer,
            message: self.queued.message.clone(),
            attempts: self.queued.attempt,
        });
        Ok(())
    }
}
