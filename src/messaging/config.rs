//! Configuration for the messaging registry and the in-memory transport.

use super::domain::default_source;

/// Registry-wide messaging configuration.
///
/// # Examples
///
/// ```
/// use courier::messaging::config::MessagingConfig;
///
/// let config = MessagingConfig::default();
/// assert!(config.log_payload_excerpts);
///
/// let config = MessagingConfig::default()
///     .with_source("//orders-service")
///     .without_payload_excerpts();
/// assert_eq!(config.resolve_source(), "//orders-service");
/// assert!(!config.log_payload_excerpts);
/// ```
#[derive(Debug, Clone)]
pub struct MessagingConfig {
    /// Default `ce-source` for every publisher; derived from the host name
    /// when unset.
    pub source: Option<String>,
    /// Whether decode-failure logs include the bounded raw payload excerpt.
    pub log_payload_excerpts: bool,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            source: None,
            log_payload_excerpts: true,
        }
    }
}

impl MessagingConfig {
    /// Sets the default `ce-source`.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        let raw = source.into();
        let trimmed = raw.trim();
        self.source = (!trimmed.is_empty()).then(|| trimmed.to_owned());
        self
    }

    /// Omits raw payload excerpts from decode-failure logs.
    #[must_use]
    pub const fn without_payload_excerpts(mut self) -> Self {
        self.log_payload_excerpts = false;
        self
    }

    /// Returns the configured source, or one derived from the host name.
    #[must_use]
    pub fn resolve_source(&self) -> String {
        self.source.clone().unwrap_or_else(default_source)
    }
}

/// Default number of deliveries before the in-memory transport dead-letters
/// a message.
const DEFAULT_MAX_DELIVERIES: u32 = 5;

/// Redelivery policy for [`super::adapters::memory::InMemoryTransport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InMemoryTransportConfig {
    max_deliveries: u32,
}

impl Default for InMemoryTransportConfig {
    fn default() -> Self {
        Self {
            max_deliveries: DEFAULT_MAX_DELIVERIES,
        }
    }
}

impl InMemoryTransportConfig {
    /// Delivers each message once; a negative acknowledgement dead-letters it.
    #[must_use]
    pub const fn at_most_once() -> Self {
        Self { max_deliveries: 1 }
    }

    /// Sets the maximum number of deliveries per message (minimum 1).
    #[must_use]
    pub fn with_max_deliveries(mut self, max_deliveries: u32) -> Self {
        self.max_deliveries = max_deliveries.max(1);
        self
    }

    /// Returns the maximum number of deliveries per message.
    #[must_use]
    pub const fn max_deliveries(&self) -> u32 {
        self.max_deliveries
    }
}
