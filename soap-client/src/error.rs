//! Error types for the SOAP client

use thiserror::Error;

/// Errors that can occur during SOAP or GENA communication
#[derive(Debug, Error)]
pub enum SoapError {
    /// Transport-level error (connection refused, DNS failure, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// HTTP-level rejection with no parseable SOAP fault body
    #[error("HTTP error: status {0}")]
    Http(u16),

    /// XML parsing error
    #[error("XML parsing error: {0}")]
    Parse(String),

    /// SOAP fault returned by the device
    #[error("SOAP fault: error code {0}")]
    Fault(u16),
}

impl SoapError {
    /// Short code string recorded as a connection's last-observed error.
    pub fn code(&self) -> String {
        match self {
            SoapError::Network(msg) => msg.clone(),
            SoapError::Http(status) => format!("http-{status}"),
            SoapError::Parse(_) => "parse".to_string(),
            SoapError::Fault(code) => format!("fault-{code}"),
        }
    }
}
