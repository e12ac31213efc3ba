//! Belkin UPnP services and the per-device service registry.

use crate::device::ServiceDescription;
use std::collections::HashMap;

/// The Belkin UPnP services the connection layer speaks to
///
/// Every WeMo device advertises a subset of these; the registry built from
/// its descriptor decides which ones are actually reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    /// basicevent service - binary state, brightness, most notifications
    BasicEvent,

    /// insight service - power telemetry on Insight plugs
    Insight,

    /// bridge service - enumeration and control of bridged sub-devices
    Bridge,

    /// deviceevent service - named attributes on Maker and heater devices
    DeviceEvent,
}

impl ServiceKind {
    /// Get the name of this service as a string
    pub fn name(&self) -> &'static str {
        match self {
            ServiceKind::BasicEvent => "basicevent",
            ServiceKind::Insight => "insight",
            ServiceKind::Bridge => "bridge",
            ServiceKind::DeviceEvent => "deviceevent",
        }
    }

    /// Get the service type URN used in SOAP requests and registry lookups
    pub fn urn(&self) -> &'static str {
        match self {
            ServiceKind::BasicEvent => "urn:Belkin:service:basicevent:1",
            ServiceKind::Insight => "urn:Belkin:service:insight:1",
            ServiceKind::Bridge => "urn:Belkin:service:bridge:1",
            ServiceKind::DeviceEvent => "urn:Belkin:service:deviceevent:1",
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Control and eventing endpoints for one advertised service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoints {
    /// Service identifier from the descriptor
    pub service_id: String,
    /// Path for SOAP control requests
    pub control_url: String,
    /// Path for GENA SUBSCRIBE requests
    pub event_sub_url: String,
}

/// Per-device map from service type URN to its endpoints.
///
/// Built once from the descriptor's service list and never mutated. Absence
/// of a service type is an ordinary condition callers must handle before any
/// network interaction.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    entries: HashMap<String, ServiceEndpoints>,
}

impl ServiceRegistry {
    /// Build the registry from a descriptor's advertised services.
    pub fn from_services(services: &[ServiceDescription]) -> Self {
        let entries = services
            .iter()
            .map(|s| {
                (
                    s.service_type.clone(),
                    ServiceEndpoints {
                        service_id: s.service_id.clone(),
                        control_url: s.control_url.clone(),
                        event_sub_url: s.event_sub_url.clone(),
                    },
                )
            })
            .collect();

        Self { entries }
    }

    /// Look up the endpoints for a known service kind.
    pub fn endpoints(&self, kind: ServiceKind) -> Option<&ServiceEndpoints> {
        self.entries.get(kind.urn())
    }

    /// Look up the endpoints for an arbitrary service type URN.
    pub fn endpoints_by_urn(&self, urn: &str) -> Option<&ServiceEndpoints> {
        self.entries.get(urn)
    }

    /// Whether the device advertises the given service kind.
    pub fn supports(&self, kind: ServiceKind) -> bool {
        self.entries.contains_key(kind.urn())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn switch_services() -> Vec<ServiceDescription> {
        vec![ServiceDescription {
            service_type: "urn:Belkin:service:basicevent:1".to_string(),
            service_id: "urn:Belkin:serviceId:basicevent1".to_string(),
            control_url: "/upnp/control/basicevent1".to_string(),
            event_sub_url: "/upnp/event/basicevent1".to_string(),
        }]
    }

    #[test]
    fn test_lookup_present_service() {
        let registry = ServiceRegistry::from_services(&switch_services());

        let endpoints = registry.endpoints(ServiceKind::BasicEvent).unwrap();
        assert_eq!(endpoints.control_url, "/upnp/control/basicevent1");
        assert_eq!(endpoints.event_sub_url, "/upnp/event/basicevent1");
        assert!(registry.supports(ServiceKind::BasicEvent));
    }

    #[test]
    fn test_absent_service_is_none() {
        let registry = ServiceRegistry::from_services(&switch_services());

        assert!(registry.endpoints(ServiceKind::Bridge).is_none());
        assert!(!registry.supports(ServiceKind::Insight));
        assert!(registry
            .endpoints_by_urn("urn:Belkin:service:bridge:1")
            .is_none());
    }
}
