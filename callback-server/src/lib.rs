//! HTTP callback server for receiving UPnP event notifications.
//!
//! WeMo devices deliver GENA events as HTTP NOTIFY requests to the callback
//! URL supplied at subscription time. This crate exposes a single listener
//! for all devices: every registered device gets one path keyed by its UDN,
//! and incoming NOTIFY bodies are forwarded untouched over a channel for
//! the event dispatcher to demultiplex.

pub mod router;
pub mod server;

pub use router::{DeviceRouter, NotifyPayload};
pub use server::{CallbackServer, CallbackServerError};
