//! Event streaming and subscription management for WeMo devices
//!
//! This crate is the async half of the connection layer. It owns the shared
//! NOTIFY listener, keeps one subscription state machine per device service,
//! and turns inbound notification bodies into a single typed event stream.
//!
//! ```no_run
//! use wemo_api::{DeviceDescriptor, ServiceKind};
//! use wemo_stream::{BrokerConfig, Event, EventBroker};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (broker, mut events) = EventBroker::start(BrokerConfig::default()).await?;
//!
//!     # let setup_xml = "";
//!     let descriptor = DeviceDescriptor::from_description_xml(setup_xml, "192.168.1.42", 49153)?;
//!     let device = broker.register_device(descriptor).await?;
//!     device.ensure_subscribed(ServiceKind::BasicEvent).await;
//!
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             Event::Device { device_id, event } => println!("{device_id}: {event:?}"),
//!             other => println!("{other:?}"),
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod broker;
pub mod error;
pub mod event;
pub mod subscription;
pub mod types;

pub use broker::{DeviceHandle, EventBroker};
pub use error::{BrokerError, Result};
pub use event::{Event, EventStream};
pub use subscription::SubscriptionManager;
pub use types::{BrokerConfig, DeviceId, SubscriptionState};
