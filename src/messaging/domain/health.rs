//! Messaging health snapshot types.

use std::fmt;

/// Coarse health of the messaging layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HealthStatus {
    /// The transport is connected and every subscription loop is running.
    Healthy,
    /// The transport is connected but at least one subscription loop stopped.
    Degraded,
    /// The transport connection is not usable.
    Disconnected,
}

impl HealthStatus {
    /// Returns the canonical representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Point-in-time view of the transport connection and subscription loops,
/// intended for an external health-check adapter to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessagingHealth {
    connected: bool,
    running_subscriptions: usize,
    stopped_subscriptions: usize,
}

impl MessagingHealth {
    /// Creates a health snapshot.
    #[must_use]
    pub const fn new(
        connected: bool,
        running_subscriptions: usize,
        stopped_subscriptions: usize,
    ) -> Self {
        Self {
            connected,
            running_subscriptions,
            stopped_subscriptions,
        }
    }

    /// Returns whether the transport connection is usable.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    /// Returns the number of subscription loops still running.
    #[must_use]
    pub const fn running_subscriptions(&self) -> usize {
        self.running_subscriptions
    }

    /// Returns the number of registered subscriptions whose loop has ended.
    #[must_use]
    pub const fn stopped_subscriptions(&self) -> usize {
        self.stopped_subscriptions
    }

    /// Derives the coarse status.
    #[must_use]
    pub const fn status(&self) -> HealthStatus {
        if !self.connected {
            HealthStatus::Disconnected
        } else if self.stopped_subscriptions > 0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}
