//! Demultiplexing of NOTIFY bodies into typed events.
//!
//! A NOTIFY body is a UPnP property set; each named property is decoded by
//! its own handler. Handlers fail independently: a malformed property is
//! dropped without affecting its siblings, and unknown property names are
//! ignored so newer firmware cannot break the dispatcher.

use crate::error::{ApiError, Result};
use crate::events::xml_utils::{child_text, decode_entities};
use crate::events::{DeviceAttribute, DeviceEvent, InsightParams};
use tracing::debug;
use xmltree::Element;

/// Parse one NOTIFY body and return the typed events it carries.
///
/// The returned vector preserves property order; a single body can fan out
/// into several events (one per `<attribute>` in an `attributeList`).
pub fn dispatch_notify(body: &str) -> Result<Vec<DeviceEvent>> {
    let property_set = Element::parse(body.as_bytes())
        .map_err(|e| ApiError::Parse(format!("invalid property set: {e}")))?;

    let mut events = Vec::new();

    for property in property_set
        .children
        .iter()
        .filter_map(|n| n.as_element())
        .filter(|e| e.name == "property")
    {
        for variable in property.children.iter().filter_map(|n| n.as_element()) {
            let value = variable
                .get_text()
                .map(|t| t.into_owned())
                .unwrap_or_default();

            match variable.name.as_str() {
                "BinaryState" => {
                    // Trailing pipe-delimited fields are not part of the state
                    let state = value.chars().next().map(String::from).unwrap_or_default();
                    events.push(DeviceEvent::BinaryState { state });
                }
                "Brightness" => {
                    if let Ok(level) = value.trim().parse::<i32>() {
                        events.push(DeviceEvent::Brightness { level });
                    } else {
                        debug!(value = %value, "dropping unparseable Brightness");
                    }
                }
                "InsightParams" => {
                    events.push(DeviceEvent::InsightParams(parse_insight_params(&value)));
                }
                "StatusChange" => {
                    if let Some(event) = parse_status_change(&value) {
                        events.push(event);
                    } else {
                        debug!("dropping malformed StatusChange");
                    }
                }
                "attributeList" => {
                    events.extend(
                        parse_attribute_list(&value)
                            .into_iter()
                            .map(DeviceEvent::AttributeChange),
                    );
                }
                other => {
                    debug!(property = %other, "ignoring unknown property");
                }
            }
        }
    }

    Ok(events)
}

/// Decode the pipe-delimited Insight telemetry record.
///
/// Field positions are fixed: 0 binary state, 1 ONSince, 2 OnFor,
/// 3 TodayONTime, 7 instant power, 8 TodayConsumed. Missing positions stay
/// `None` rather than failing the record.
pub(crate) fn parse_insight_params(value: &str) -> InsightParams {
    let fields: Vec<&str> = value.split('|').collect();
    let field = |i: usize| fields.get(i).map(|s| s.to_string());

    InsightParams {
        binary_state: fields.first().unwrap_or(&"").to_string(),
        on_since: field(1),
        on_for: field(2),
        today_on_time: field(3),
        instant_power: field(7),
        today_consumed: field(8),
    }
}

/// Decode an entity-encoded `attributeList` payload into its attributes.
///
/// The payload is a bare sequence of `<attribute>` elements, so it is
/// wrapped in a synthetic root before parsing. Malformed payloads yield an
/// empty vector; attributes without a name or value are skipped.
pub(crate) fn parse_attribute_list(value: &str) -> Vec<DeviceAttribute> {
    let decoded = decode_entities(value);
    let wrapped = format!("<attributeList>{decoded}</attributeList>");

    let Ok(list) = Element::parse(wrapped.as_bytes()) else {
        debug!("dropping malformed attributeList");
        return Vec::new();
    };

    list.children
        .iter()
        .filter_map(|n| n.as_element())
        .filter(|e| e.name == "attribute")
        .filter_map(|attribute| {
            Some(DeviceAttribute {
                name: child_text(attribute, "name")?,
                value: child_text(attribute, "value")?,
                prev_value: child_text(attribute, "prevalue"),
                timestamp: child_text(attribute, "ts"),
            })
        })
        .collect()
}

/// Decode a bridge `StatusChange` payload.
///
/// The value is itself an XML document describing one sub-device capability
/// change; anything that does not parse into the expected shape is dropped.
fn parse_status_change(value: &str) -> Option<DeviceEvent> {
    let state_event = Element::parse(value.as_bytes()).ok()?;

    Some(DeviceEvent::StatusChange {
        device_id: child_text(&state_event, "DeviceID")?,
        capability_id: child_text(&state_event, "CapabilityId")?,
        value: child_text(&state_event, "Value")?,
    })
}
