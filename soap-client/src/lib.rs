//! Private SOAP client for UPnP device communication
//!
//! This crate provides a minimal SOAP client specifically designed for
//! communicating with UPnP devices like Belkin WeMo switches and bridges.
//! It also implements the GENA side of the protocol: SUBSCRIBE, renewal
//! and UNSUBSCRIBE requests against a service's event URL.

mod error;

pub use error::SoapError;

use std::time::Duration;
use xmltree::Element;

/// Lease granted by a device in response to a SUBSCRIBE or renewal request
#[derive(Debug, Clone)]
pub struct SubscriptionGrant {
    /// Subscription ID returned by the device
    pub sid: String,
    /// Actual timeout granted by the device (in seconds)
    pub timeout_seconds: u32,
}

/// A minimal SOAP client for UPnP device communication
#[derive(Debug, Clone)]
pub struct SoapClient {
    agent: ureq::Agent,
}

impl SoapClient {
    /// Create a new SOAP client with default configuration
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout_connect(Duration::from_secs(5))
                .timeout_read(Duration::from_secs(10))
                .build(),
        }
    }

    /// Send a SOAP request and return the parsed response element
    ///
    /// The payload is inserted verbatim inside the action element, so it must
    /// already be well-formed XML (escaped by the caller).
    pub fn call(
        &self,
        host: &str,
        port: u16,
        control_url: &str,
        service_uri: &str,
        action: &str,
        payload: &str,
    ) -> Result<Element, SoapError> {
        let body = format!(
            r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
                <s:Body>
                    <u:{action} xmlns:u="{service_uri}">
                        {payload}
                    </u:{action}>
                </s:Body>
            </s:Envelope>"#,
            action = action,
            service_uri = service_uri,
            payload = payload
        );

        let url = endpoint_url(host, port, control_url);
        let soap_action = format!("\"{}#{}\"", service_uri, action);

        let response = self
            .agent
            .post(&url)
            .set("Content-Type", "text/xml; charset=\"utf-8\"")
            .set("SOAPACTION", &soap_action)
            .send_string(&body);

        let xml_text = match response {
            Ok(response) => response
                .into_string()
                .map_err(|e| SoapError::Network(e.to_string()))?,
            // Devices report SOAP faults over HTTP 500; try to decode the
            // fault body before falling back to a plain HTTP error.
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                if let Ok(xml) = Element::parse(body.as_bytes()) {
                    if let Err(fault) = self.extract_response(&xml, action) {
                        return Err(match fault {
                            SoapError::Parse(_) => SoapError::Http(status),
                            other => other,
                        });
                    }
                }
                return Err(SoapError::Http(status));
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(SoapError::Network(transport.to_string()))
            }
        };

        let xml = Element::parse(xml_text.as_bytes())
            .map_err(|e| SoapError::Parse(e.to_string()))?;

        self.extract_response(&xml, action)
    }

    /// Subscribe to UPnP events for a service's event URL
    ///
    /// # Arguments
    /// * `host` - Device host address
    /// * `port` - Device port
    /// * `event_url` - Event subscription path from the device descriptor
    /// * `callback_url` - URL where the device should deliver NOTIFY requests
    /// * `timeout_seconds` - Requested lease duration in seconds
    pub fn subscribe(
        &self,
        host: &str,
        port: u16,
        event_url: &str,
        callback_url: &str,
        timeout_seconds: u32,
    ) -> Result<SubscriptionGrant, SoapError> {
        let url = endpoint_url(host, port, event_url);

        let response = self
            .agent
            .request("SUBSCRIBE", &url)
            .set("HOST", &format!("{}:{}", host, port))
            .set("CALLBACK", &format!("<{}>", callback_url))
            .set("NT", "upnp:event")
            .set("TIMEOUT", &format!("Second-{}", timeout_seconds))
            .call()
            .map_err(map_gena_error)?;

        Self::extract_grant(response, timeout_seconds)
    }

    /// Renew an existing subscription identified by its SID
    ///
    /// A renewal reuses the SID from the original grant instead of the
    /// CALLBACK/NT headers.
    pub fn renew(
        &self,
        host: &str,
        port: u16,
        event_url: &str,
        sid: &str,
        timeout_seconds: u32,
    ) -> Result<SubscriptionGrant, SoapError> {
        let url = endpoint_url(host, port, event_url);

        let response = self
            .agent
            .request("SUBSCRIBE", &url)
            .set("HOST", &format!("{}:{}", host, port))
            .set("SID", sid)
            .set("TIMEOUT", &format!("Second-{}", timeout_seconds))
            .call()
            .map_err(map_gena_error)?;

        Self::extract_grant(response, timeout_seconds)
    }

    /// Release a subscription lease
    pub fn unsubscribe(
        &self,
        host: &str,
        port: u16,
        event_url: &str,
        sid: &str,
    ) -> Result<(), SoapError> {
        let url = endpoint_url(host, port, event_url);

        self.agent
            .request("UNSUBSCRIBE", &url)
            .set("HOST", &format!("{}:{}", host, port))
            .set("SID", sid)
            .call()
            .map_err(map_gena_error)?;

        Ok(())
    }

    fn extract_grant(
        response: ureq::Response,
        requested_timeout: u32,
    ) -> Result<SubscriptionGrant, SoapError> {
        let sid = response
            .header("SID")
            .ok_or_else(|| {
                SoapError::Parse("Missing SID header in SUBSCRIBE response".to_string())
            })?
            .to_string();

        // "Second-300" format; fall back to the requested lease
        let timeout_seconds = response
            .header("TIMEOUT")
            .and_then(|s| s.strip_prefix("Second-"))
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(requested_timeout);

        Ok(SubscriptionGrant {
            sid,
            timeout_seconds,
        })
    }

    fn extract_response(&self, xml: &Element, action: &str) -> Result<Element, SoapError> {
        let body = xml
            .get_child("Body")
            .ok_or_else(|| SoapError::Parse("Missing SOAP Body".to_string()))?;

        if let Some(fault) = body.get_child("Fault") {
            let error_code = fault
                .get_child("detail")
                .and_then(|d| d.get_child("UPnPError"))
                .and_then(|e| e.get_child("errorCode"))
                .and_then(|c| c.get_text())
                .and_then(|t| t.trim().parse::<u16>().ok())
                .unwrap_or(500);
            return Err(SoapError::Fault(error_code));
        }

        let response_name = format!("{}Response", action);
        body.get_child(response_name.as_str())
            .cloned()
            .ok_or_else(|| SoapError::Parse(format!("Missing {} element", response_name)))
    }
}

impl Default for SoapClient {
    fn default() -> Self {
        Self::new()
    }
}

fn endpoint_url(host: &str, port: u16, path: &str) -> String {
    if path.starts_with('/') {
        format!("http://{}:{}{}", host, port, path)
    } else {
        format!("http://{}:{}/{}", host, port, path)
    }
}

fn map_gena_error(error: ureq::Error) -> SoapError {
    match error {
        ureq::Error::Status(status, _) => SoapError::Http(status),
        ureq::Error::Transport(transport) => SoapError::Network(transport.to_string()),
    }
}
