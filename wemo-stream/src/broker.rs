//! The event broker: callback server, device registry, and event fan-out.
//!
//! The broker owns the shared NOTIFY listener and the map of registered
//! device connections, keyed by UDN. Inbound notification bodies are parsed
//! by the `wemo-api` dispatcher and re-emitted as typed [`Event`]s on a
//! single stream, alongside subscription lifecycle and device-error events.

use crate::error::{BrokerError, Result};
use crate::event::{Event, EventStream};
use crate::subscription::SubscriptionManager;
use crate::types::{BrokerConfig, DeviceId, SubscriptionState};
use callback_server::{CallbackServer, NotifyPayload};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use wemo_api::{
    dispatch_notify, ApiError, DeviceConnection, DeviceDescriptor, ServiceKind, SoapArgs,
    SoapResponse,
};

/// Handle to one registered device.
///
/// Cheap to clone; all clones share the same connection and subscription
/// manager. Commands go through [`invoke`](Self::invoke) (or the typed
/// helpers on the underlying [`DeviceConnection`]); event interest is
/// declared with [`ensure_subscribed`](Self::ensure_subscribed).
#[derive(Clone)]
pub struct DeviceHandle {
    device_id: DeviceId,
    connection: Arc<DeviceConnection>,
    subscriptions: Arc<SubscriptionManager>,
    event_tx: mpsc::Sender<Event>,
}

impl DeviceHandle {
    /// The device's UDN.
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// The underlying connection, for typed action helpers.
    pub fn connection(&self) -> &Arc<DeviceConnection> {
        &self.connection
    }

    /// Execute a SOAP action without blocking the async runtime.
    ///
    /// Besides returning the error to the caller, failures that mark the
    /// device unreachable are also published as [`Event::DeviceError`] so
    /// event consumers can update availability state.
    pub async fn invoke(
        &self,
        service: ServiceKind,
        action: &str,
        args: SoapArgs,
    ) -> std::result::Result<SoapResponse, ApiError> {
        let connection = Arc::clone(&self.connection);
        let action = action.to_string();

        let result = tokio::task::spawn_blocking(move || connection.invoke(service, &action, &args))
            .await
            .map_err(|e| ApiError::Network(format!("invoke task failed: {e}")))?;

        if let Err(error) = &result {
            // Unsupported services are an ordinary caller-visible condition,
            // not a change in device availability.
            if !matches!(error, ApiError::UnsupportedService { .. }) {
                let _ = self
                    .event_tx
                    .send(Event::DeviceError {
                        device_id: self.device_id.clone(),
                        code: error.to_string(),
                    })
                    .await;
            }
        }

        result
    }

    /// Establish the event subscription for one of the device's services.
    pub async fn ensure_subscribed(&self, service: ServiceKind) {
        self.subscriptions.ensure_subscribed(service).await;
    }

    /// Current state of one service's subscription.
    pub async fn subscription_state(&self, service: ServiceKind) -> SubscriptionState {
        self.subscriptions.state(service).await
    }

    async fn teardown(&self) {
        self.subscriptions.shutdown().await;
    }
}

/// Event broker joining the callback listener to registered devices.
pub struct EventBroker {
    callback_server: CallbackServer,
    devices: Arc<RwLock<HashMap<String, DeviceHandle>>>,
    event_tx: mpsc::Sender<Event>,
    config: BrokerConfig,
    dispatch_task: Option<JoinHandle<()>>,
}

impl EventBroker {
    /// Start the broker and its callback listener.
    ///
    /// Returns the broker plus the stream all device and lifecycle events
    /// are delivered on.
    pub async fn start(config: BrokerConfig) -> Result<(Self, EventStream)> {
        let (notify_tx, notify_rx) = mpsc::unbounded_channel::<NotifyPayload>();
        let callback_server = CallbackServer::new(config.callback_port_range, notify_tx).await?;

        let (event_tx, event_rx) = mpsc::channel(config.event_buffer_size);
        let dispatch_task = tokio::spawn(Self::dispatch_loop(notify_rx, event_tx.clone()));

        info!(base_url = %callback_server.base_url(), "event broker started");

        Ok((
            Self {
                callback_server,
                devices: Arc::new(RwLock::new(HashMap::new())),
                event_tx,
                config,
                dispatch_task: Some(dispatch_task),
            },
            EventStream::new(event_rx),
        ))
    }

    /// Register a discovered device and return its handle.
    ///
    /// The UDN deduplicates re-discovery: registering a known UDN tears the
    /// old handle down and builds a fresh connection, which also clears any
    /// sticky error state the old connection had accumulated.
    pub async fn register_device(&self, descriptor: DeviceDescriptor) -> Result<DeviceHandle> {
        let udn = descriptor.udn.clone();

        let replaced = {
            let mut devices = self.devices.write().await;
            devices.remove(&udn)
        };
        if let Some(old) = replaced {
            debug!(device = %udn, "re-discovered; replacing connection");
            old.teardown().await;
            self.callback_server.router().unregister(&udn).await;
        }

        let device_id = DeviceId::new(&udn);
        let connection = Arc::new(DeviceConnection::new(descriptor));
        let subscriptions = Arc::new(SubscriptionManager::new(
            device_id.clone(),
            Arc::clone(&connection),
            Some(self.callback_server.callback_url(&udn)),
            self.event_tx.clone(),
            self.config.clone(),
        ));

        let handle = DeviceHandle {
            device_id,
            connection,
            subscriptions,
            event_tx: self.event_tx.clone(),
        };

        self.callback_server.router().register(udn.clone()).await;
        self.devices.write().await.insert(udn, handle.clone());

        Ok(handle)
    }

    /// Remove a device, tearing down its subscriptions and routing.
    ///
    /// Removing an unknown UDN completes gracefully.
    pub async fn deregister_device(&self, udn: &str) {
        let removed = {
            let mut devices = self.devices.write().await;
            devices.remove(udn)
        };

        if let Some(handle) = removed {
            handle.teardown().await;
            self.callback_server.router().unregister(udn).await;
        }
    }

    /// Look up the handle of a registered device.
    pub async fn device(&self, udn: &str) -> Option<DeviceHandle> {
        self.devices.read().await.get(udn).cloned()
    }

    /// Establish a subscription for a registered device's service.
    pub async fn ensure_subscribed(&self, udn: &str, service: ServiceKind) -> Result<()> {
        let handle = self
            .device(udn)
            .await
            .ok_or_else(|| BrokerError::UnknownDevice(udn.to_string()))?;
        handle.ensure_subscribed(service).await;
        Ok(())
    }

    /// The base URL devices deliver NOTIFY requests to.
    pub fn callback_base_url(&self) -> &str {
        self.callback_server.base_url()
    }

    /// Shut the broker down: tear down every device, then stop the listener.
    pub async fn shutdown(mut self) -> Result<()> {
        let handles: Vec<DeviceHandle> = {
            let mut devices = self.devices.write().await;
            devices.drain().map(|(_, handle)| handle).collect()
        };
        for handle in handles {
            handle.teardown().await;
        }

        self.callback_server.shutdown().await;

        // The listener owned the NOTIFY sender, so the dispatch loop drains
        // and exits on its own once the server is gone.
        if let Some(task) = self.dispatch_task.take() {
            task.await
                .map_err(|e| BrokerError::Shutdown(format!("dispatch task failed: {e}")))?;
        }

        Ok(())
    }

    /// Drain NOTIFY payloads, demultiplex them, and fan out typed events.
    async fn dispatch_loop(
        mut notify_rx: mpsc::UnboundedReceiver<NotifyPayload>,
        event_tx: mpsc::Sender<Event>,
    ) {
        while let Some(payload) = notify_rx.recv().await {
            match dispatch_notify(&payload.body) {
                Ok(events) => {
                    let device_id = DeviceId::new(&payload.device_id);
                    for event in events {
                        let _ = event_tx
                            .send(Event::Device {
                                device_id: device_id.clone(),
                                event,
                            })
                            .await;
                    }
                }
                Err(error) => {
                    warn!(device = %payload.device_id, %error, "dropping unparseable NOTIFY body");
                }
            }
        }
    }
}
