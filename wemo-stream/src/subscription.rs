//! Subscription lifecycle management.
//!
//! One [`SubscriptionManager`] per device connection runs a small state
//! machine per service (absent, pending, active), renewing at half the
//! lease and retrying rejected subscriptions after a short delay. Timers
//! are stored with their entries and aborted on teardown, so a discarded
//! connection leaves nothing running.

use crate::event::Event;
use crate::types::{BrokerConfig, DeviceId, SubscriptionState};
use soap_client::{SoapClient, SoapError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use wemo_api::{DeviceConnection, ServiceKind};

/// Result of one SUBSCRIBE or renewal exchange.
#[derive(Debug)]
pub(crate) enum SubscribeOutcome {
    /// The device granted a lease
    Granted { sid: String },
    /// The device answered but did not grant the lease
    /// (non-200 status or an unusable response)
    Rejected { reason: String },
    /// The request never completed (connection refused, DNS, timeout)
    Transport { code: String },
}

/// Follow-up work the state machine schedules after an exchange.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum FollowUp {
    /// Renew the granted lease after the delay
    Renew(Duration),
    /// Retry the subscription from scratch after the delay
    Retry(Duration),
}

impl FollowUp {
    pub(crate) fn delay(&self) -> Duration {
        match self {
            FollowUp::Renew(delay) | FollowUp::Retry(delay) => *delay,
        }
    }
}

/// The transition table of the subscription state machine.
///
/// Pure so the exact state/delay pairs are testable without timers:
/// a granted lease goes `Active` with a renewal at half the lease; a
/// rejection goes `Absent` with a near-immediate retry; a transport failure
/// goes `Absent` with no follow-up, leaving recovery to the device-error
/// and re-discovery path.
pub(crate) fn plan_after(
    outcome: &SubscribeOutcome,
    config: &BrokerConfig,
) -> (SubscriptionState, Option<FollowUp>) {
    match outcome {
        SubscribeOutcome::Granted { sid } => (
            SubscriptionState::Active { sid: sid.clone() },
            Some(FollowUp::Renew(config.renewal_delay())),
        ),
        SubscribeOutcome::Rejected { .. } => (
            SubscriptionState::Absent,
            Some(FollowUp::Retry(config.retry_delay)),
        ),
        SubscribeOutcome::Transport { .. } => (SubscriptionState::Absent, None),
    }
}

#[derive(Default)]
struct SubscriptionEntry {
    state: SubscriptionState,
    /// Pending renewal or retry task; aborted when replaced or torn down
    timer: Option<JoinHandle<()>>,
}

/// Per-connection subscription manager.
///
/// Device-category code never manages subscriptions directly: it calls
/// [`ensure_subscribed`](Self::ensure_subscribed) once for each service
/// whose events it wants, and the manager keeps the lease alive from there.
pub struct SubscriptionManager {
    device_id: DeviceId,
    connection: Arc<DeviceConnection>,
    soap: SoapClient,
    callback_url: Option<String>,
    entries: Mutex<HashMap<ServiceKind, SubscriptionEntry>>,
    event_tx: mpsc::Sender<Event>,
    config: BrokerConfig,
}

impl SubscriptionManager {
    /// Create a manager for one device connection.
    pub fn new(
        device_id: DeviceId,
        connection: Arc<DeviceConnection>,
        callback_url: Option<String>,
        event_tx: mpsc::Sender<Event>,
        config: BrokerConfig,
    ) -> Self {
        Self {
            device_id,
            connection,
            soap: SoapClient::new(),
            callback_url,
            entries: Mutex::new(HashMap::new()),
            event_tx,
            config,
        }
    }

    /// Current state of one service's subscription.
    pub async fn state(&self, service: ServiceKind) -> SubscriptionState {
        self.entries
            .lock()
            .await
            .get(&service)
            .map(|entry| entry.state.clone())
            .unwrap_or_default()
    }

    /// Establish (or renew) the event subscription for a service.
    ///
    /// Subscription failures are not surfaced to the caller; they are
    /// logged, retried where that makes sense, and reported through the
    /// event channel. Calling while an initial subscribe is already pending
    /// is a no-op.
    pub async fn ensure_subscribed(self: &Arc<Self>, service: ServiceKind) {
        let Some(endpoints) = self.connection.registry().endpoints(service).cloned() else {
            warn!(
                device = %self.device_id,
                %service,
                "cannot subscribe: service not advertised by device"
            );
            return;
        };
        let Some(callback_url) = self.callback_url.clone() else {
            warn!(
                device = %self.device_id,
                %service,
                "cannot subscribe: no callback URL configured"
            );
            return;
        };

        let active_sid = {
            let mut entries = self.entries.lock().await;
            let entry = entries.entry(service).or_default();
            match &entry.state {
                SubscriptionState::Pending => {
                    debug!(device = %self.device_id, %service, "subscribe already pending");
                    return;
                }
                SubscriptionState::Active { sid } => Some(sid.clone()),
                SubscriptionState::Absent => {
                    entry.state = SubscriptionState::Pending;
                    None
                }
            }
        };

        let renewing = active_sid.is_some();
        let host = self.connection.descriptor().host.clone();
        let port = self.connection.descriptor().port;
        let lease = self.config.subscription_timeout.as_secs() as u32;
        let soap = self.soap.clone();
        let event_url = endpoints.event_sub_url;

        let outcome = tokio::task::spawn_blocking(move || {
            let result = match &active_sid {
                Some(sid) => soap.renew(&host, port, &event_url, sid, lease),
                None => soap.subscribe(&host, port, &event_url, &callback_url, lease),
            };
            match result {
                Ok(grant) => SubscribeOutcome::Granted { sid: grant.sid },
                Err(SoapError::Network(msg)) => SubscribeOutcome::Transport { code: msg },
                Err(e) => SubscribeOutcome::Rejected {
                    reason: e.to_string(),
                },
            }
        })
        .await
        .unwrap_or_else(|e| SubscribeOutcome::Transport {
            code: format!("subscribe task failed: {e}"),
        });

        self.apply(service, renewing, outcome).await;
    }

    /// Apply an exchange outcome: emit events, store the new state, and
    /// swap in the follow-up timer.
    fn apply<'a>(
        self: &'a Arc<Self>,
        service: ServiceKind,
        renewing: bool,
        outcome: SubscribeOutcome,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        // Returning a boxed `dyn Future + Send` (rather than an `async fn`'s
        // opaque future) breaks the self-referential cycle created by the
        // renewal timer spawning `ensure_subscribed` again, which otherwise
        // leaves the compiler unable to prove the future is `Send`.
        Box::pin(async move {
        match &outcome {
            SubscribeOutcome::Granted { sid } => {
                info!(device = %self.device_id, %service, %sid, renewing, "subscription granted");
                let event = if renewing {
                    Event::SubscriptionRenewed {
                        device_id: self.device_id.clone(),
                        service,
                        sid: sid.clone(),
                    }
                } else {
                    Event::SubscriptionEstablished {
                        device_id: self.device_id.clone(),
                        service,
                        sid: sid.clone(),
                    }
                };
                let _ = self.event_tx.send(event).await;
            }
            SubscribeOutcome::Rejected { reason } => {
                warn!(device = %self.device_id, %service, %reason, "subscription rejected, retrying");
                let _ = self
                    .event_tx
                    .send(Event::SubscriptionFailed {
                        device_id: self.device_id.clone(),
                        service,
                        error: reason.clone(),
                    })
                    .await;
            }
            SubscribeOutcome::Transport { code } => {
                warn!(device = %self.device_id, %service, %code, "subscription transport failure");
                self.connection.record_error(code.clone());
                let _ = self
                    .event_tx
                    .send(Event::SubscriptionFailed {
                        device_id: self.device_id.clone(),
                        service,
                        error: code.clone(),
                    })
                    .await;
                let _ = self
                    .event_tx
                    .send(Event::DeviceError {
                        device_id: self.device_id.clone(),
                        code: code.clone(),
                    })
                    .await;
            }
        }

        let (state, follow_up) = plan_after(&outcome, &self.config);

        let mut entries = self.entries.lock().await;
        let entry = entries.entry(service).or_default();
        entry.state = state;
        if let Some(old) = entry.timer.take() {
            old.abort();
        }
        if let Some(follow_up) = follow_up {
            let delay = follow_up.delay();
            let manager = Arc::clone(self);
            entry.timer = Some(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                manager.ensure_subscribed(service).await;
            }));
        }
        })
    }

    /// Tear down all subscriptions.
    ///
    /// Aborts every pending timer, then releases active leases with
    /// best-effort UNSUBSCRIBE requests. Failures are logged only; the
    /// leases expire on their own within the lease duration.
    pub async fn shutdown(&self) {
        let leases: Vec<(ServiceKind, String)> = {
            let mut entries = self.entries.lock().await;
            let mut leases = Vec::new();
            for (service, entry) in entries.iter_mut() {
                if let Some(timer) = entry.timer.take() {
                    timer.abort();
                }
                if let SubscriptionState::Active { sid } = &entry.state {
                    leases.push((*service, sid.clone()));
                }
                entry.state = SubscriptionState::Absent;
            }
            leases
        };

        for (service, sid) in leases {
            let Some(endpoints) = self.connection.registry().endpoints(service).cloned() else {
                continue;
            };
            let host = self.connection.descriptor().host.clone();
            let port = self.connection.descriptor().port;
            let soap = self.soap.clone();

            let result = tokio::task::spawn_blocking(move || {
                soap.unsubscribe(&host, port, &endpoints.event_sub_url, &sid)
            })
            .await;

            match result {
                Ok(Ok(())) => debug!(device = %self.device_id, %service, "lease released"),
                Ok(Err(e)) => {
                    debug!(device = %self.device_id, %service, error = %e, "unsubscribe failed")
                }
                Err(e) => {
                    debug!(device = %self.device_id, %service, error = %e, "unsubscribe task failed")
                }
            }
        }
    }
}
