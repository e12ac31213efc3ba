//! Device descriptor parsing.
//!
//! An external discovery collaborator (SSDP) resolves a device's description
//! URL and fetches its `setup.xml`. This module parses that document into a
//! [`DeviceDescriptor`], the immutable identity a connection is built from.

use crate::error::{ApiError, Result};
use serde::Deserialize;

/// One advertised UPnP service from the device description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescription {
    /// Service type URN, e.g. `urn:Belkin:service:basicevent:1`
    pub service_type: String,
    /// Service identifier, e.g. `urn:Belkin:serviceId:basicevent1`
    pub service_id: String,
    /// Path for SOAP control requests
    pub control_url: String,
    /// Path for GENA SUBSCRIBE requests
    pub event_sub_url: String,
}

/// Identity and addressing of a discovered WeMo device.
///
/// Immutable once constructed. The UDN is the dedup key: re-discovering a
/// device with a known UDN replaces its connection rather than adding a
/// second one.
#[derive(Debug, Clone)]
pub struct DeviceDescriptor {
    /// Human-readable name configured in the WeMo app
    pub friendly_name: String,
    /// Unique device name, e.g. `uuid:Socket-1_0-221350K0100000`
    pub udn: String,
    /// Host address the descriptor was fetched from
    pub host: String,
    /// Port the device's HTTP server listens on
    pub port: u16,
    /// Device type URN, e.g. `urn:Belkin:device:controllee:1`
    pub device_type: String,
    /// Advertised services, in descriptor order
    pub services: Vec<ServiceDescription>,
    /// Serial number, when reported
    pub serial_number: Option<String>,
    /// MAC address, when reported
    pub mac_address: Option<String>,
    /// Model name, when reported
    pub model_name: Option<String>,
}

impl DeviceDescriptor {
    /// Parse a device description document (`setup.xml`).
    ///
    /// `host` and `port` come from the descriptor URL the discovery
    /// collaborator resolved; the document itself only carries relative
    /// paths.
    pub fn from_description_xml(xml: &str, host: impl Into<String>, port: u16) -> Result<Self> {
        let root: DescriptionRoot = quick_xml::de::from_str(xml)
            .map_err(|e| ApiError::Parse(format!("invalid device description: {e}")))?;

        let device = root.device;
        let services = device
            .service_list
            .map(|list| {
                list.services
                    .into_iter()
                    .map(|s| ServiceDescription {
                        service_type: s.service_type,
                        service_id: s.service_id,
                        control_url: s.control_url,
                        event_sub_url: s.event_sub_url,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            friendly_name: device.friendly_name,
            udn: device.udn,
            host: host.into(),
            port,
            device_type: device.device_type,
            services,
            serial_number: none_if_empty(device.serial_number),
            mac_address: none_if_empty(device.mac_address),
            model_name: none_if_empty(device.model_name),
        })
    }
}

fn none_if_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[derive(Debug, Deserialize)]
struct DescriptionRoot {
    device: DeviceXml,
}

#[derive(Debug, Deserialize)]
struct DeviceXml {
    #[serde(rename = "deviceType")]
    device_type: String,
    #[serde(rename = "friendlyName")]
    friendly_name: String,
    #[serde(rename = "UDN")]
    udn: String,
    #[serde(rename = "serialNumber", default)]
    serial_number: Option<String>,
    #[serde(rename = "macAddress", default)]
    mac_address: Option<String>,
    #[serde(rename = "modelName", default)]
    model_name: Option<String>,
    #[serde(rename = "serviceList", default)]
    service_list: Option<ServiceListXml>,
}

#[derive(Debug, Deserialize, Default)]
struct ServiceListXml {
    #[serde(rename = "service", default)]
    services: Vec<ServiceXml>,
}

#[derive(Debug, Deserialize)]
struct ServiceXml {
    #[serde(rename = "serviceType")]
    service_type: String,
    #[serde(rename = "serviceId")]
    service_id: String,
    #[serde(rename = "controlURL")]
    control_url: String,
    #[serde(rename = "eventSubURL")]
    event_sub_url: String,
}
