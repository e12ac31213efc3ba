//! Bridged sub-device (WeMo Link) support.
//!
//! A bridge exposes its paired bulbs and bulb groups through the bridge
//! service. Their controllable state is reported as two parallel
//! comma-separated lists (capability codes and current values) which are
//! zipped into a [`CapabilityMap`]; status-change events patch individual
//! entries in place.

use crate::error::{ApiError, Result};
use crate::events::xml_utils::{child_text, collect_named, decode_entities};
use std::collections::BTreeMap;
use tracing::warn;
use xmltree::Element;

/// Current state of a bridged sub-device, keyed by capability code.
///
/// Values stay string-encoded: "0"/"1" for on/off, plain integers for
/// brightness, composites like "754:0" for color temperature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityMap {
    values: BTreeMap<String, String>,
}

impl CapabilityMap {
    /// Zip the two comma-aligned lists into a map.
    ///
    /// Firmware is expected to keep the lists positionally aligned; if their
    /// lengths differ the zip stops at the shorter list and the mismatch is
    /// logged rather than failing the enumeration.
    pub fn from_lists(capability_ids: &str, values: &str) -> Self {
        let ids: Vec<&str> = capability_ids
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        let vals: Vec<&str> = values.split(',').map(str::trim).collect();

        if ids.len() > vals.len() {
            warn!(
                ids = ids.len(),
                values = vals.len(),
                "capability list longer than value list; truncating"
            );
        }

        let values = ids
            .iter()
            .zip(vals.iter())
            .map(|(id, val)| (id.to_string(), val.to_string()))
            .collect();

        Self { values }
    }

    /// Current value for a capability code, if reported.
    pub fn get(&self, capability_id: &str) -> Option<&str> {
        self.values.get(capability_id).map(String::as_str)
    }

    /// Patch one capability in place, as bridge status-change events do.
    pub fn set(&mut self, capability_id: impl Into<String>, value: impl Into<String>) {
        self.values.insert(capability_id.into(), value.into());
    }

    /// Number of reported capabilities.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no capabilities were reported.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over (capability code, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// One sub-device or group enumerated from a bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeDevice {
    /// Bridge-local identifier (device id or group id)
    pub device_id: String,
    /// Name configured in the WeMo app
    pub friendly_name: String,
    /// Current capability state
    pub capabilities: CapabilityMap,
    /// Whether this entry is a bulb group rather than a single bulb
    pub is_group: bool,
}

/// Parse the `DeviceLists` payload of a bridge enumeration response.
///
/// The payload arrives entity-encoded. Both single devices (`DeviceInfo`)
/// and groups (`GroupInfo`, with the Group-prefixed capability lists) are
/// returned; entries missing an identifier are skipped.
pub fn parse_device_lists(payload: &str) -> Result<Vec<BridgeDevice>> {
    let decoded = decode_entities(payload);
    let root = Element::parse(decoded.as_bytes())
        .map_err(|e| ApiError::Parse(format!("invalid device list: {e}")))?;

    let mut devices = Vec::new();

    let mut infos = Vec::new();
    collect_named(&root, "DeviceInfo", &mut infos);
    for info in infos {
        let Some(device_id) = child_text(info, "DeviceID") else {
            continue;
        };
        devices.push(BridgeDevice {
            device_id,
            friendly_name: child_text(info, "FriendlyName").unwrap_or_default(),
            capabilities: CapabilityMap::from_lists(
                &child_text(info, "CapabilityIDs").unwrap_or_default(),
                &child_text(info, "CurrentState").unwrap_or_default(),
            ),
            is_group: false,
        });
    }

    let mut groups = Vec::new();
    collect_named(&root, "GroupInfo", &mut groups);
    for group in groups {
        let Some(group_id) = child_text(group, "GroupID") else {
            continue;
        };
        devices.push(BridgeDevice {
            device_id: group_id,
            friendly_name: child_text(group, "GroupName").unwrap_or_default(),
            capabilities: CapabilityMap::from_lists(
                &child_text(group, "GroupCapabilityIDs").unwrap_or_default(),
                &child_text(group, "GroupCapabilityValues").unwrap_or_default(),
            ),
            is_group: true,
        });
    }

    Ok(devices)
}
