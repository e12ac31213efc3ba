//! Typed events emitted by the broker.

use crate::types::DeviceId;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use wemo_api::{DeviceEvent, ServiceKind};

/// One broker event: a device state change or a lifecycle notification.
#[derive(Debug, Clone)]
pub enum Event {
    /// A typed state-change notification from a device.
    Device {
        /// UDN of the reporting device
        device_id: DeviceId,
        /// The decoded notification
        event: DeviceEvent,
    },

    /// A device is presumed unreachable.
    ///
    /// Emitted whenever a SOAP action or subscription attempt fails at the
    /// transport level. Consumers typically mark the device offline and let
    /// re-discovery build a fresh connection.
    DeviceError {
        /// UDN of the affected device
        device_id: DeviceId,
        /// The recorded error code
        code: String,
    },

    /// A subscription lease was granted.
    SubscriptionEstablished {
        /// UDN of the device
        device_id: DeviceId,
        /// Service the lease covers
        service: ServiceKind,
        /// Subscription identifier
        sid: String,
    },

    /// An active lease was renewed (possibly under a fresh SID).
    SubscriptionRenewed {
        /// UDN of the device
        device_id: DeviceId,
        /// Service the lease covers
        service: ServiceKind,
        /// Subscription identifier
        sid: String,
    },

    /// A subscribe or renewal attempt failed.
    ///
    /// HTTP-level rejections retry on their own; transport failures are
    /// accompanied by a [`Event::DeviceError`].
    SubscriptionFailed {
        /// UDN of the device
        device_id: DeviceId,
        /// Service the attempt was for
        service: ServiceKind,
        /// Failure description
        error: String,
    },
}

/// Stream of broker events.
///
/// Wraps the broker's channel; use [`recv`](EventStream::recv) directly or
/// consume it as a [`futures::Stream`].
pub struct EventStream {
    receiver: mpsc::Receiver<Event>,
}

impl EventStream {
    pub(crate) fn new(receiver: mpsc::Receiver<Event>) -> Self {
        Self { receiver }
    }

    /// Receive the next event, or `None` once the broker has shut down.
    pub async fn recv(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }
}

impl Stream for EventStream {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        self.receiver.poll_recv(cx)
    }
}
