//! Typed state-change notifications parsed from NOTIFY bodies.
//!
//! Devices batch several property changes into one NOTIFY request; the
//! dispatcher in [`dispatcher`] demultiplexes them into the event types
//! defined here. Each event category is owned by exactly one Belkin service,
//! which is what the subscription layer uses to decide which services need
//! live subscriptions.

pub mod dispatcher;
pub(crate) mod xml_utils;

pub use dispatcher::dispatch_notify;

use crate::service::ServiceKind;

/// The notification categories the dispatcher understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    /// On/off (or numeric standby) state changes
    BinaryState,
    /// Dimmer brightness changes
    Brightness,
    /// Insight power telemetry updates
    InsightParams,
    /// Capability changes on bridged sub-devices
    StatusChange,
    /// Named attribute changes on Maker and heater devices
    AttributeList,
}

impl EventCategory {
    /// The service whose event subscription delivers this category.
    pub fn owning_service(&self) -> ServiceKind {
        match self {
            EventCategory::BinaryState => ServiceKind::BasicEvent,
            EventCategory::Brightness => ServiceKind::BasicEvent,
            EventCategory::AttributeList => ServiceKind::BasicEvent,
            EventCategory::InsightParams => ServiceKind::Insight,
            EventCategory::StatusChange => ServiceKind::Bridge,
        }
    }
}

/// One state-change notification from a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// The device's binary state changed.
    ///
    /// Carries only the leading character of the reported value; devices
    /// append extra pipe-delimited fields that are not part of the state.
    BinaryState {
        /// "0", "1", or a device-specific digit (e.g. "8" for standby)
        state: String,
    },

    /// A dimmer's brightness changed.
    Brightness {
        /// Brightness percentage
        level: i32,
    },

    /// New power telemetry from an Insight plug.
    InsightParams(InsightParams),

    /// One capability changed on one bridged sub-device.
    StatusChange {
        /// Identifier of the sub-device behind the bridge
        device_id: String,
        /// Capability code, stringified
        capability_id: String,
        /// New string-encoded value
        value: String,
    },

    /// One named attribute changed.
    ///
    /// A single NOTIFY can carry several attributes; the dispatcher emits
    /// one event per attribute.
    AttributeChange(DeviceAttribute),
}

/// Power telemetry reported by Insight plugs.
///
/// Decoded from a pipe-delimited fixed-position record. Fields beyond the
/// record's actual length are `None`; a short record never fails the parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsightParams {
    /// On/off state (field 0)
    pub binary_state: String,
    /// Timestamp the device last switched on (field 1)
    pub on_since: Option<String>,
    /// Seconds in the current on-period (field 2)
    pub on_for: Option<String>,
    /// Seconds on today (field 3)
    pub today_on_time: Option<String>,
    /// Current power draw in milliwatts (field 7)
    pub instant_power: Option<String>,
    /// Energy consumed today in milliwatt-minutes (field 8)
    pub today_consumed: Option<String>,
}

/// One attribute from an `attributeList` payload or a GetAttributes response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAttribute {
    /// Attribute name, e.g. `Switch`, `Sensor`, `Mode`
    pub name: String,
    /// Current value
    pub value: String,
    /// Previous value, when reported
    pub prev_value: Option<String>,
    /// Device timestamp of the change, when reported
    pub timestamp: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_category_service_table() {
        assert_eq!(
            EventCategory::BinaryState.owning_service(),
            ServiceKind::BasicEvent
        );
        assert_eq!(
            EventCategory::Brightness.owning_service(),
            ServiceKind::BasicEvent
        );
        assert_eq!(
            EventCategory::AttributeList.owning_service(),
            ServiceKind::BasicEvent
        );
        assert_eq!(
            EventCategory::InsightParams.owning_service(),
            ServiceKind::Insight
        );
        assert_eq!(
            EventCategory::StatusChange.owning_service(),
            ServiceKind::Bridge
        );
    }
}
