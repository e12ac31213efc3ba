use soap_client::SoapError;
use thiserror::Error;

/// High-level API errors for WeMo device operations
///
/// This enum abstracts away the underlying SOAP communication details and
/// provides meaningful error information for the failure scenarios that
/// matter to callers controlling WeMo devices.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The device does not advertise the requested service
    ///
    /// Returned before any network I/O. Absence of a service is an ordinary
    /// condition (a plain switch has no bridge service), so this is never
    /// retried.
    #[error("Service {service} not supported by device {device}")]
    UnsupportedService {
        /// Name of the missing service
        service: String,
        /// Friendly name of the device
        device: String,
    },

    /// The connection has a recorded error and is presumed unreachable
    ///
    /// Once set, every further action fails fast with this error until a
    /// fresh connection is constructed (typically via re-discovery).
    #[error("Device unreachable: {code}")]
    DeviceUnreachable {
        /// The last-observed error code
        code: String,
    },

    /// Network communication error
    ///
    /// Connection refused, DNS failure, timeout; the device may be offline
    /// or have moved to a new address.
    #[error("Network error: {0}")]
    Network(String),

    /// HTTP-level rejection without a SOAP fault
    #[error("HTTP error: status {0}")]
    Http(u16),

    /// Response parsing error
    ///
    /// The device answered but the payload could not be parsed into the
    /// expected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// SOAP fault returned by the device
    #[error("SOAP fault: error code {0}")]
    SoapFault(u16),
}

/// Type alias for results that can return an ApiError
pub type Result<T> = std::result::Result<T, ApiError>;

impl From<SoapError> for ApiError {
    fn from(error: SoapError) -> Self {
        match error {
            SoapError::Network(msg) => ApiError::Network(msg),
            SoapError::Http(status) => ApiError::Http(status),
            SoapError::Parse(msg) => ApiError::Parse(msg),
            SoapError::Fault(code) => ApiError::SoapFault(code),
        }
    }
}
