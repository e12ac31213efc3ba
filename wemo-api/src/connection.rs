//! Per-device UPnP connection: the SOAP action invoker.
//!
//! A [`DeviceConnection`] is built once per discovered device from its
//! parsed descriptor. It owns the service registry and the sticky error
//! state; all SOAP actions against the device flow through [`invoke`].
//!
//! [`invoke`]: DeviceConnection::invoke

use crate::args::SoapArgs;
use crate::bridge::{parse_device_lists, BridgeDevice};
use crate::device::DeviceDescriptor;
use crate::error::{ApiError, Result};
use crate::events::dispatcher::{parse_attribute_list, parse_insight_params};
use crate::events::{DeviceAttribute, InsightParams};
use crate::service::{ServiceKind, ServiceRegistry};
use soap_client::SoapClient;
use std::collections::HashMap;
use std::sync::Mutex;
use xmltree::Element;

/// Parsed `{Action}Response` element of a successful SOAP action.
#[derive(Debug, Clone)]
pub struct SoapResponse {
    element: Element,
}

impl SoapResponse {
    fn new(element: Element) -> Self {
        Self { element }
    }

    /// Text content of a named response field.
    pub fn field(&self, name: &str) -> Option<String> {
        self.element
            .get_child(name)
            .and_then(|c| c.get_text())
            .map(|t| t.into_owned())
    }

    /// All response fields as a scalar map.
    ///
    /// Each child element becomes one entry; nested structure beyond the
    /// first level is flattened to its text content.
    pub fn fields(&self) -> HashMap<String, String> {
        self.element
            .children
            .iter()
            .filter_map(|n| n.as_element())
            .map(|child| {
                let text = child
                    .get_text()
                    .map(|t| t.into_owned())
                    .unwrap_or_default();
                (child.name.clone(), text)
            })
            .collect()
    }

    /// The underlying response element, for callers that need raw access.
    pub fn element(&self) -> &Element {
        &self.element
    }
}

/// Connection to one WeMo device.
///
/// Owns the immutable descriptor and service registry plus the single piece
/// of mutable state the connection layer keeps: the last-observed error.
/// Once an error is recorded every further action fails fast; the state is
/// cleared only by constructing a fresh connection, which is what the
/// re-discovery path does.
#[derive(Debug)]
pub struct DeviceConnection {
    descriptor: DeviceDescriptor,
    registry: ServiceRegistry,
    soap: SoapClient,
    last_error: Mutex<Option<String>>,
}

impl DeviceConnection {
    /// Create a connection from a parsed descriptor.
    pub fn new(descriptor: DeviceDescriptor) -> Self {
        Self::with_soap_client(descriptor, SoapClient::new())
    }

    /// Create a connection with a custom SOAP client (shared agent, tests).
    pub fn with_soap_client(descriptor: DeviceDescriptor, soap: SoapClient) -> Self {
        let registry = ServiceRegistry::from_services(&descriptor.services);
        Self {
            descriptor,
            registry,
            soap,
            last_error: Mutex::new(None),
        }
    }

    /// The descriptor this connection was built from.
    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    /// The service registry derived from the descriptor.
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// The last-observed error code, if the device is presumed unreachable.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap().clone()
    }

    /// Record an error code, marking the device as presumed unreachable.
    ///
    /// Advisory, last-write-wins: it only ever downgrades the device to
    /// "assume broken". The subscription layer records here too when a
    /// SUBSCRIBE fails at the transport level.
    pub fn record_error(&self, code: impl Into<String>) {
        *self.last_error.lock().unwrap() = Some(code.into());
    }

    /// Execute a SOAP action against one of the device's services.
    ///
    /// Fails fast, before any network I/O, when the connection has a
    /// recorded error or when the device does not advertise the service.
    /// Any failure on the wire records the sticky error state.
    pub fn invoke(&self, service: ServiceKind, action: &str, args: &SoapArgs) -> Result<SoapResponse> {
        if let Some(code) = self.last_error() {
            return Err(ApiError::DeviceUnreachable { code });
        }

        let endpoints = self.registry.endpoints(service).ok_or_else(|| {
            ApiError::UnsupportedService {
                service: service.name().to_string(),
                device: self.descriptor.friendly_name.clone(),
            }
        })?;

        let payload = args.to_payload();
        match self.soap.call(
            &self.descriptor.host,
            self.descriptor.port,
            &endpoints.control_url,
            service.urn(),
            action,
            &payload,
        ) {
            Ok(element) => Ok(SoapResponse::new(element)),
            Err(e) => {
                self.record_error(e.code());
                Err(e.into())
            }
        }
    }

    /// Read the device's binary state ("0", "1", or a device-specific digit).
    pub fn get_binary_state(&self) -> Result<String> {
        let response = self.invoke(ServiceKind::BasicEvent, "GetBinaryState", &SoapArgs::new())?;
        let state = response
            .field("BinaryState")
            .ok_or_else(|| ApiError::Parse("missing BinaryState field".to_string()))?;
        // Same truncation as eventing: the state digit may carry trailers
        Ok(state.chars().next().map(String::from).unwrap_or_default())
    }

    /// Switch the device on or off.
    pub fn set_binary_state(&self, on: bool) -> Result<()> {
        let args = SoapArgs::new().text("BinaryState", if on { "1" } else { "0" });
        self.invoke(ServiceKind::BasicEvent, "SetBinaryState", &args)
            .map(|_| ())
    }

    /// Read a dimmer's brightness percentage.
    pub fn get_brightness(&self) -> Result<i32> {
        let response = self.invoke(ServiceKind::BasicEvent, "GetBinaryState", &SoapArgs::new())?;
        response
            .field("brightness")
            .and_then(|b| b.trim().parse().ok())
            .ok_or_else(|| ApiError::Parse("missing brightness field".to_string()))
    }

    /// Set a dimmer's brightness; zero switches the device off.
    pub fn set_brightness(&self, level: u8) -> Result<()> {
        let args = SoapArgs::new()
            .text("BinaryState", if level > 0 { "1" } else { "0" })
            .text("brightness", level.to_string());
        self.invoke(ServiceKind::BasicEvent, "SetBinaryState", &args)
            .map(|_| ())
    }

    /// Read current power telemetry from an Insight plug.
    pub fn get_insight_params(&self) -> Result<InsightParams> {
        let response = self.invoke(ServiceKind::Insight, "GetInsightParams", &SoapArgs::new())?;
        let params = response
            .field("InsightParams")
            .ok_or_else(|| ApiError::Parse("missing InsightParams field".to_string()))?;
        Ok(parse_insight_params(&params))
    }

    /// Read the named attributes of a Maker or heater device.
    pub fn get_attributes(&self) -> Result<Vec<DeviceAttribute>> {
        let response = self.invoke(ServiceKind::DeviceEvent, "GetAttributes", &SoapArgs::new())?;
        let list = response
            .field("attributeList")
            .ok_or_else(|| ApiError::Parse("missing attributeList field".to_string()))?;
        Ok(parse_attribute_list(&list))
    }

    /// Set named attributes on a Maker or heater device.
    pub fn set_attributes(&self, attributes: &[(&str, &str)]) -> Result<()> {
        let mut fragment = String::new();
        for (name, value) in attributes {
            fragment.push_str("<attribute><name>");
            fragment.push_str(name);
            fragment.push_str("</name><value>");
            fragment.push_str(value);
            fragment.push_str("</value></attribute>");
        }

        // The device expects the attribute list entity-encoded, which is
        // exactly what text-escaping the fragment produces.
        let args = SoapArgs::new().text("attributeList", fragment);
        self.invoke(ServiceKind::DeviceEvent, "SetAttributes", &args)
            .map(|_| ())
    }

    /// Enumerate the sub-devices and groups paired to a bridge.
    pub fn get_end_devices(&self) -> Result<Vec<BridgeDevice>> {
        let args = SoapArgs::new()
            .text("DevUDN", self.descriptor.udn.clone())
            .text("ReqListType", "PAIRED_LIST");
        let response = self.invoke(ServiceKind::Bridge, "GetEndDevices", &args)?;
        let lists = response
            .field("DeviceLists")
            .ok_or_else(|| ApiError::Parse("missing DeviceLists field".to_string()))?;
        parse_device_lists(&lists)
    }

    /// Set one capability on a bridged sub-device or group.
    pub fn set_device_status(
        &self,
        device_id: &str,
        capability_id: &str,
        value: &str,
    ) -> Result<()> {
        // Bridge group identifiers are 10 digits; real bulbs are longer
        let is_group = if device_id.len() == 10 { "YES" } else { "NO" };
        let status = format!(
            r#"<DeviceStatus><IsGroupAction>{is_group}</IsGroupAction><DeviceID available="YES">{device_id}</DeviceID><CapabilityID>{capability_id}</CapabilityID><CapabilityValue>{value}</CapabilityValue></DeviceStatus>"#
        );

        let args = SoapArgs::new().raw(
            "DeviceStatusList",
            html_escape::encode_text(&status).into_owned(),
        );
        self.invoke(ServiceKind::Bridge, "SetDeviceStatus", &args)
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::ServiceDescription;

    fn descriptor_with(host: &str, port: u16, services: Vec<ServiceDescription>) -> DeviceDescriptor {
        DeviceDescriptor {
            friendly_name: "Test Switch".to_string(),
            udn: "uuid:Socket-1_0-TEST".to_string(),
            host: host.to_string(),
            port,
            device_type: "urn:Belkin:device:controllee:1".to_string(),
            services,
            serial_number: None,
            mac_address: None,
            model_name: None,
        }
    }

    fn basicevent_service() -> ServiceDescription {
        ServiceDescription {
            service_type: "urn:Belkin:service:basicevent:1".to_string(),
            service_id: "urn:Belkin:serviceId:basicevent1".to_string(),
            control_url: "/upnp/control/basicevent1".to_string(),
            event_sub_url: "/upnp/event/basicevent1".to_string(),
        }
    }

    fn host_and_port(server: &mockito::Server) -> (String, u16) {
        let hp = server.host_with_port();
        let (host, port) = hp.rsplit_once(':').unwrap();
        (host.to_string(), port.parse().unwrap())
    }

    fn binary_state_response(state: &str) -> String {
        format!(
            r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
                <s:Body>
                    <u:GetBinaryStateResponse xmlns:u="urn:Belkin:service:basicevent:1">
                        <BinaryState>{state}</BinaryState>
                    </u:GetBinaryStateResponse>
                </s:Body>
            </s:Envelope>"#
        )
    }

    #[test]
    fn test_unsupported_service_performs_no_io() {
        let mut server = mockito::Server::new();
        let (host, port) = host_and_port(&server);

        // The mock would match any insight call; expecting zero hits proves
        // the gate fires before the network.
        let mock = server
            .mock("POST", mockito::Matcher::Any)
            .expect(0)
            .create();

        let connection = DeviceConnection::new(descriptor_with(
            &host,
            port,
            vec![basicevent_service()],
        ));

        let result = connection.invoke(ServiceKind::Insight, "GetInsightParams", &SoapArgs::new());
        match result.unwrap_err() {
            ApiError::UnsupportedService { service, device } => {
                assert_eq!(service, "insight");
                assert_eq!(device, "Test Switch");
            }
            other => panic!("Expected UnsupportedService, got {:?}", other),
        }

        mock.assert();
        assert!(connection.last_error().is_none());
    }

    #[test]
    fn test_sticky_error_gates_invocation() {
        let mut server = mockito::Server::new();
        let (host, port) = host_and_port(&server);

        let mock = server
            .mock("POST", mockito::Matcher::Any)
            .expect(0)
            .create();

        let connection = DeviceConnection::new(descriptor_with(
            &host,
            port,
            vec![basicevent_service()],
        ));
        connection.record_error("ECONNREFUSED");

        let result = connection.invoke(ServiceKind::BasicEvent, "GetBinaryState", &SoapArgs::new());
        match result.unwrap_err() {
            ApiError::DeviceUnreachable { code } => assert_eq!(code, "ECONNREFUSED"),
            other => panic!("Expected DeviceUnreachable, got {:?}", other),
        }

        mock.assert();
    }

    #[test]
    fn test_get_binary_state_truncates_trailers() {
        let mut server = mockito::Server::new();
        let (host, port) = host_and_port(&server);

        server
            .mock("POST", "/upnp/control/basicevent1")
            .with_status(200)
            .with_body(binary_state_response("0|1479773615|0|0"))
            .create();

        let connection = DeviceConnection::new(descriptor_with(
            &host,
            port,
            vec![basicevent_service()],
        ));

        assert_eq!(connection.get_binary_state().unwrap(), "0");
    }

    #[test]
    fn test_transport_failure_records_sticky_error() {
        // Port 1 refuses connections; the first call fails on the wire, the
        // second fails fast on the recorded state.
        let connection = DeviceConnection::new(descriptor_with(
            "127.0.0.1",
            1,
            vec![basicevent_service()],
        ));

        let first = connection.invoke(ServiceKind::BasicEvent, "GetBinaryState", &SoapArgs::new());
        assert!(matches!(first.unwrap_err(), ApiError::Network(_)));
        assert!(connection.last_error().is_some());

        let second = connection.invoke(ServiceKind::BasicEvent, "GetBinaryState", &SoapArgs::new());
        assert!(matches!(
            second.unwrap_err(),
            ApiError::DeviceUnreachable { .. }
        ));
    }

    #[test]
    fn test_soap_fault_records_error_and_maps() {
        let mut server = mockito::Server::new();
        let (host, port) = host_and_port(&server);

        server
            .mock("POST", "/upnp/control/basicevent1")
            .with_status(500)
            .with_body(
                r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
                    <s:Body>
                        <s:Fault>
                            <detail>
                                <UPnPError><errorCode>401</errorCode></UPnPError>
                            </detail>
                        </s:Fault>
                    </s:Body>
                </s:Envelope>"#,
            )
            .create();

        let connection = DeviceConnection::new(descriptor_with(
            &host,
            port,
            vec![basicevent_service()],
        ));

        let result = connection.invoke(ServiceKind::BasicEvent, "GetBinaryState", &SoapArgs::new());
        assert!(matches!(result.unwrap_err(), ApiError::SoapFault(401)));
        assert_eq!(connection.last_error().as_deref(), Some("fault-401"));
    }

    #[test]
    fn test_response_fields_are_scalar() {
        let element = Element::parse(
            r#"<u:GetInsightParamsResponse xmlns:u="urn:Belkin:service:insight:1">
                <InsightParams>1|100|200</InsightParams>
                <SignalStrength>92</SignalStrength>
            </u:GetInsightParamsResponse>"#
                .as_bytes(),
        )
        .unwrap();
        let response = SoapResponse::new(element);

        let fields = response.fields();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields.get("InsightParams").unwrap(), "1|100|200");
        assert_eq!(fields.get("SignalStrength").unwrap(), "92");
        assert_eq!(response.field("SignalStrength").as_deref(), Some("92"));
    }
}
