//! Routing of HTTP callback notifications to a channel.
//!
//! The `DeviceRouter` maintains the set of device identifiers (UDNs) the
//! listener currently serves and forwards each NOTIFY body, tagged with its
//! device identifier, to a channel.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// Raw event notification received for a single device.
///
/// The body is the unparsed XML property set exactly as the device sent it;
/// parsing and demultiplexing happen downstream.
#[derive(Debug, Clone)]
pub struct NotifyPayload {
    /// UDN of the device the notification belongs to
    pub device_id: String,
    /// The raw XML event body
    pub body: String,
}

/// Routes NOTIFY requests from the HTTP listener to a channel.
///
/// Each discovered device is registered under its UDN. Notifications for
/// unregistered identifiers are dropped (and the listener answers 404).
#[derive(Clone)]
pub struct DeviceRouter {
    devices: Arc<RwLock<HashSet<String>>>,
    event_sender: mpsc::UnboundedSender<NotifyPayload>,
}

impl DeviceRouter {
    /// Create a new router that forwards payloads to `event_sender`.
    pub fn new(event_sender: mpsc::UnboundedSender<NotifyPayload>) -> Self {
        Self {
            devices: Arc::new(RwLock::new(HashSet::new())),
            event_sender,
        }
    }

    /// Register a device identifier for event routing.
    pub async fn register(&self, device_id: String) {
        let mut devices = self.devices.write().await;
        devices.insert(device_id);
    }

    /// Unregister a device identifier.
    ///
    /// Notifications arriving for it afterwards are answered with 404.
    pub async fn unregister(&self, device_id: &str) {
        let mut devices = self.devices.write().await;
        devices.remove(device_id);
    }

    /// Route an incoming notification body to the channel.
    ///
    /// Returns `true` if the device identifier was registered and the payload
    /// was forwarded, `false` otherwise.
    pub async fn route(&self, device_id: String, body: String) -> bool {
        let devices = self.devices.read().await;

        if devices.contains(&device_id) {
            // Receiver may already be gone during shutdown
            let _ = self.event_sender.send(NotifyPayload { device_id, body });
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_route() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let router = DeviceRouter::new(tx);

        let udn = "uuid:Socket-1_0-221350K0100000".to_string();
        router.register(udn.clone()).await;

        let body = "<e:propertyset/>".to_string();
        assert!(router.route(udn.clone(), body.clone()).await);

        let payload = rx.recv().await.unwrap();
        assert_eq!(payload.device_id, udn);
        assert_eq!(payload.body, body);
    }

    #[tokio::test]
    async fn test_unregister_stops_routing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let router = DeviceRouter::new(tx);

        let udn = "uuid:Socket-1_0-221350K0100000".to_string();
        router.register(udn.clone()).await;
        router.unregister(&udn).await;

        assert!(!router.route(udn, "<e:propertyset/>".to_string()).await);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unknown_device_is_dropped() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let router = DeviceRouter::new(tx);

        assert!(
            !router
                .route("uuid:unknown".to_string(), "<e:propertyset/>".to_string())
                .await
        );
        assert!(rx.try_recv().is_err());
    }
}
