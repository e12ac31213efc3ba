//! Typed Belkin WeMo device API for UPnP control via SOAP
//!
//! This crate is the synchronous core of the connection layer: it parses
//! device descriptors, derives the per-device service registry, executes
//! SOAP actions through the private `soap-client` crate, and demultiplexes
//! NOTIFY bodies into typed events.
//!
//! ```no_run
//! use wemo_api::{DeviceConnection, DeviceDescriptor};
//!
//! # fn main() -> wemo_api::Result<()> {
//! # let setup_xml = "";
//! let descriptor = DeviceDescriptor::from_description_xml(setup_xml, "192.168.1.42", 49153)?;
//! let connection = DeviceConnection::new(descriptor);
//!
//! connection.set_binary_state(true)?;
//! println!("state: {}", connection.get_binary_state()?);
//! # Ok(())
//! # }
//! ```
//!
//! Eventing (subscriptions, renewal, the NOTIFY listener) lives in the
//! `wemo-sdk-stream` and `wemo-sdk-callback-server` crates; this crate only
//! contains the pure parsing side of it ([`dispatch_notify`]).

pub mod args;
pub mod bridge;
pub mod connection;
pub mod device;
pub mod error;
pub mod events;
pub mod service;

pub use args::SoapArgs;
pub use bridge::{BridgeDevice, CapabilityMap};
pub use connection::{DeviceConnection, SoapResponse};
pub use device::{DeviceDescriptor, ServiceDescription};
pub use error::{ApiError, Result};
pub use events::{
    dispatch_notify, DeviceAttribute, DeviceEvent, EventCategory, InsightParams,
};
pub use service::{ServiceEndpoints, ServiceKind, ServiceRegistry};
