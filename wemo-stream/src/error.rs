//! Error types for the wemo-stream crate.

/// Errors that can occur in the event broker.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// The callback server could not be started or stopped
    #[error("Callback server error: {0}")]
    CallbackServer(#[from] callback_server::CallbackServerError),

    /// No device with the given UDN is registered
    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    /// An error occurred during shutdown
    #[error("Shutdown error: {0}")]
    Shutdown(String),
}

/// Convenience type alias for Results using BrokerError.
pub type Result<T> = std::result::Result<T, BrokerError>;
