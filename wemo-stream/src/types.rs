//! Core types for the wemo-stream crate.

use std::time::Duration;

/// Unique identifier for a WeMo device (its UDN).
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct DeviceId(pub String);

impl DeviceId {
    /// Create a new device ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the device ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of one service's event subscription.
///
/// Transitions are driven exclusively by the subscription manager:
/// `Absent` to `Pending` on the first subscribe attempt, `Pending` to
/// `Active` on a granted lease, `Active` to `Active` (fresh SID) on
/// renewal, and any state back to `Absent` on failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SubscriptionState {
    /// No subscription exists and none is being established
    #[default]
    Absent,
    /// An initial SUBSCRIBE request is in flight
    Pending,
    /// The device granted a lease
    Active {
        /// Subscription identifier from the device's SID header
        sid: String,
    },
}

/// Configuration for the event broker.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Port range for the callback server (start, end)
    pub callback_port_range: (u16, u16),
    /// Lease duration requested from devices
    pub subscription_timeout: Duration,
    /// Delay before retrying a subscription the device rejected
    pub retry_delay: Duration,
    /// Size of the typed event channel
    pub event_buffer_size: usize,
}

impl BrokerConfig {
    /// Delay before renewing a granted lease.
    ///
    /// Half the lease, so renewal always precedes expiry with margin.
    pub fn renewal_delay(&self) -> Duration {
        self.subscription_timeout / 2
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            callback_port_range: (3400, 3500),
            subscription_timeout: Duration::from_secs(300),
            retry_delay: Duration::from_secs(2),
            event_buffer_size: 100,
        }
    }
}
