//! Programmatic registration of publishers and subscriptions.

use super::publisher::Publisher;
use super::subscription::{
    MessageHandler, SubscriptionHandle, SubscriptionProcessor, SubscriptionStats,
};
use crate::messaging::codec::{MessageCodec, MessageType, Payload};
use crate::messaging::config::MessagingConfig;
use crate::messaging::domain::{HandlerId, MessagingHealth, Subject};
use crate::messaging::error::RegistrationError;
use crate::messaging::ports::Transport;
use mockable::Clock;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Identifies one registered subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionKey {
    subject: Subject,
    handler: HandlerId,
}

impl SubscriptionKey {
    /// Creates a key from a subject and handler identifier.
    #[must_use]
    pub const fn new(subject: Subject, handler: HandlerId) -> Self {
        Self { subject, handler }
    }

    /// Returns the subscribed subject.
    #[must_use]
    pub const fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Returns the handler identifier.
    #[must_use]
    pub const fn handler(&self) -> &HandlerId {
        &self.handler
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.handler, self.subject)
    }
}

/// Explicit registration entry point for publishers and subscriptions.
///
/// A single [`MessageCodec`] is shared by every publisher and subscription
/// created here. Publishers are unique per (subject, payload type);
/// subscriptions are unique per (subject, handler identifier). Each
/// subscription owns its own transport consumer and loop.
///
/// Dropping the registry signals every subscription loop to stop; call
/// [`Self::shutdown`] to wait for them.
///
/// # Examples
///
/// ```
/// use courier::messaging::adapters::memory::InMemoryTransport;
/// use courier::messaging::codec::MessageCodec;
/// use courier::messaging::config::MessagingConfig;
/// use courier::messaging::error::HandlerError;
/// use courier::messaging::services::MessagingRegistry;
/// use mockable::DefaultClock;
/// use serde::{Deserialize, Serialize};
/// use std::sync::Arc;
///
/// #[derive(Debug, Serialize, Deserialize)]
/// struct OrderData {
///     id: String,
///     amount: u64,
/// }
///
/// # tokio::runtime::Runtime::new().expect("runtime").block_on(async {
/// let registry = MessagingRegistry::new(
///     Arc::new(InMemoryTransport::new()),
///     Arc::new(DefaultClock),
///     Arc::new(MessageCodec::new()),
///     MessagingConfig::default(),
/// );
/// registry
///     .register_subscription::<OrderData, _>("orders.created", "audit", |order: OrderData| async move {
///         assert!(!order.id.is_empty());
///         Ok::<_, HandlerError>(())
///     })
///     .await
///     .expect("subscription registers");
/// let publisher = registry
///     .register_publisher::<OrderData>("orders.created")
///     .await
///     .expect("publisher registers");
/// publisher
///     .publish(&OrderData { id: "A1".into(), amount: 10 })
///     .await
///     .expect("publish succeeds");
/// registry.shutdown().await.expect("clean shutdown");
/// # });
/// ```
pub struct MessagingRegistry<Tr, C>
where
    Tr: Transport + 'static,
    C: Clock + Send + Sync + 'static,
{
    transport: Arc<Tr>,
    clock: Arc<C>,
    codec: Arc<MessageCodec>,
    config: MessagingConfig,
    source: String,
    publishers: Mutex<BTreeSet<(Subject, &'static str)>>,
    subscriptions: Mutex<BTreeMap<SubscriptionKey, SubscriptionHandle>>,
}

impl<Tr, C> MessagingRegistry<Tr, C>
where
    Tr: Transport + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates an empty registry.
    #[must_use]
    pub fn new(
        transport: Arc<Tr>,
        clock: Arc<C>,
        codec: Arc<MessageCodec>,
        config: MessagingConfig,
    ) -> Self {
        let source = config.resolve_source();
        Self {
            transport,
            clock,
            codec,
            config,
            source,
            publishers: Mutex::new(BTreeSet::new()),
            subscriptions: Mutex::new(BTreeMap::new()),
        }
    }

    /// Registers a publisher for payload type `T` on `subject`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::Domain`] for an invalid subject,
    /// [`RegistrationError::InvalidType`] when `T` is rejected, and
    /// [`RegistrationError::DuplicatePublisher`] when the same payload type
    /// is already registered on the subject.
    pub async fn register_publisher<T: Payload>(
        &self,
        subject: impl Into<String>,
    ) -> Result<Publisher<T, Tr, C>, RegistrationError> {
        let validated_subject = Subject::new(subject)?;
        let publisher = Publisher::new(
            validated_subject.clone(),
            Arc::clone(&self.codec),
            Arc::clone(&self.transport),
            Arc::clone(&self.clock),
        )?
        .with_source(self.source.clone());

        let mut publishers = self.publishers.lock().await;
        if !publishers.insert((validated_subject.clone(), publisher.type_name())) {
            return Err(RegistrationError::DuplicatePublisher {
                subject: validated_subject,
                type_name: publisher.type_name().to_owned(),
            });
        }

        info!(
            subject = %validated_subject,
            type_name = publisher.type_name(),
            "publisher registered"
        );
        Ok(publisher)
    }

    /// Registers `handler` for payload type `T` on `subject` and starts its
    /// receive loop.
    ///
    /// `T` is validated before any consumer is created. The registry lock is
    /// not held while the transport creates the consumer.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::Domain`] for an invalid subject or
    /// handler identifier, [`RegistrationError::InvalidType`] when `T` is
    /// rejected, [`RegistrationError::DuplicateSubscription`] when the handler
    /// is already subscribed to the subject, and
    /// [`RegistrationError::Transport`] when the consumer cannot be created.
    pub async fn register_subscription<T, H>(
        &self,
        subject: impl Into<String>,
        handler_id: impl Into<String>,
        handler: H,
    ) -> Result<SubscriptionKey, RegistrationError>
    where
        T: Payload,
        H: MessageHandler<T>,
    {
        let validated_subject = Subject::new(subject)?;
        let validated_handler = HandlerId::new(handler_id)?;
        let message_type = MessageType::<T>::new(Arc::clone(&self.codec))?;
        let key = SubscriptionKey::new(validated_subject.clone(), validated_handler.clone());

        if self.subscriptions.lock().await.contains_key(&key) {
            return Err(duplicate_subscription(&key));
        }

        let mut consumer = self.transport.subscribe(&validated_subject).await?;
        let mut subscriptions = self.subscriptions.lock().await;
        if subscriptions.contains_key(&key) {
            drop(subscriptions);
            if let Err(err) = consumer.unsubscribe().await {
                warn!(
                    subject = %key.subject(),
                    handler = %key.handler(),
                    error = %err,
                    "failed to release consumer of duplicate subscription"
                );
            }
            return Err(duplicate_subscription(&key));
        }

        let type_name = message_type.type_name();
        let processor = SubscriptionProcessor::new(
            validated_subject,
            validated_handler,
            message_type,
            Arc::new(handler),
        )
        .with_payload_excerpts(self.config.log_payload_excerpts);
        subscriptions.insert(key.clone(), SubscriptionHandle::spawn(processor, consumer));

        info!(
            subject = %key.subject(),
            handler = %key.handler(),
            type_name,
            "subscription registered"
        );
        Ok(key)
    }

    /// Stops and removes one subscription.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::SubscriptionNotFound`] for unknown keys
    /// and [`RegistrationError::TaskFailed`] when the loop ended abnormally.
    pub async fn unregister_subscription(
        &self,
        key: &SubscriptionKey,
    ) -> Result<SubscriptionStats, RegistrationError> {
        let handle = self.subscriptions.lock().await.remove(key).ok_or_else(|| {
            RegistrationError::SubscriptionNotFound {
                subject: key.subject().clone(),
                handler: key.handler().clone(),
            }
        })?;
        stop_subscription(key, handle).await
    }

    /// Returns the keys of every registered subscription.
    pub async fn subscriptions(&self) -> Vec<SubscriptionKey> {
        self.subscriptions.lock().await.keys().cloned().collect()
    }

    /// Returns `true` when the subscription exists and its loop is running.
    pub async fn is_running(&self, key: &SubscriptionKey) -> bool {
        self.subscriptions
            .lock()
            .await
            .get(key)
            .is_some_and(SubscriptionHandle::is_running)
    }

    /// Returns whether the underlying transport connection is usable.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Returns a snapshot of connection and subscription-loop state.
    pub async fn health(&self) -> MessagingHealth {
        let subscriptions = self.subscriptions.lock().await;
        let running = subscriptions
            .values()
            .filter(|handle| handle.is_running())
            .count();
        MessagingHealth::new(
            self.is_connected(),
            running,
            subscriptions.len().saturating_sub(running),
        )
    }

    /// Stops every subscription, letting each finish its in-flight message,
    /// and returns their final counters.
    ///
    /// Every loop is stopped even when one fails.
    ///
    /// # Errors
    ///
    /// Returns the first [`RegistrationError::TaskFailed`] encountered.
    pub async fn shutdown(
        &self,
    ) -> Result<BTreeMap<SubscriptionKey, SubscriptionStats>, RegistrationError> {
        let handles = std::mem::take(&mut *self.subscriptions.lock().await);
        let mut stopped = BTreeMap::new();
        let mut first_failure = None;

        for (key, handle) in handles {
            match stop_subscription(&key, handle).await {
                Ok(stats) => {
                    stopped.insert(key, stats);
                }
                Err(err) => {
                    first_failure.get_or_insert(err);
                }
            }
        }

        info!(stopped = stopped.len(), "messaging registry shut down");
        first_failure.map_or(Ok(stopped), Err)
    }
}

fn duplicate_subscription(key: &SubscriptionKey) -> RegistrationError {
    RegistrationError::DuplicateSubscription {
        subject: key.subject().clone(),
        handler: key.handler().clone(),
    }
}

async fn stop_subscription(
    key: &SubscriptionKey,
    handle: SubscriptionHandle,
) -> Result<SubscriptionStats, RegistrationError> {
    handle.stop().await.map_err(|err| {
        warn!(
            subject = %key.subject(),
            handler = %key.handler(),
            error = %err,
            "subscription task ended abnormally"
        );
        RegistrationError::TaskFailed {
            subject: key.subject().clone(),
            handler: key.handler().clone(),
            reason: err.to_string(),
        }
    })
}

impl<Tr, C> fmt::Debug for MessagingRegistry<Tr, C>
where
    Tr: Transport + 'static,
    C: Clock + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessagingRegistry")
            .field("source", &self.source)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
