//! End-to-end tests: NOTIFY requests delivered to the broker's listener
//! come out of the event stream as typed events.

use std::time::Duration;
use tokio::time::timeout;
use wemo_api::{DeviceDescriptor, DeviceEvent, ServiceDescription};
use wemo_stream::{BrokerConfig, Event, EventBroker};

fn notify() -> reqwest::Method {
    reqwest::Method::from_bytes(b"NOTIFY").unwrap()
}

fn test_descriptor(udn: &str) -> DeviceDescriptor {
    DeviceDescriptor {
        friendly_name: "Test Switch".to_string(),
        udn: udn.to_string(),
        // No SOAP traffic in these tests; the address is never dialed
        host: "127.0.0.1".to_string(),
        port: 1,
        device_type: "urn:Belkin:device:controllee:1".to_string(),
        services: vec![ServiceDescription {
            service_type: "urn:Belkin:service:basicevent:1".to_string(),
            service_id: "urn:Belkin:serviceId:basicevent1".to_string(),
            control_url: "/upnp/control/basicevent1".to_string(),
            event_sub_url: "/upnp/event/basicevent1".to_string(),
        }],
        serial_number: None,
        mac_address: None,
        model_name: None,
    }
}

fn config(port_range: (u16, u16)) -> BrokerConfig {
    BrokerConfig {
        callback_port_range: port_range,
        ..BrokerConfig::default()
    }
}

const NOTIFY_BODY: &str = r#"<?xml version="1.0"?>
<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
    <e:property>
        <BinaryState>1</BinaryState>
    </e:property>
</e:propertyset>"#;

#[tokio::test]
async fn test_notify_becomes_typed_event() {
    let (broker, mut events) = EventBroker::start(config((50600, 50700))).await.unwrap();

    let udn = "uuid:Socket-1_0-FLOW";
    broker.register_device(test_descriptor(udn)).await.unwrap();

    let client = reqwest::Client::new();
    let response = client
        .request(notify(), format!("{}/{}", broker.callback_base_url(), udn))
        .header("NT", "upnp:event")
        .header("NTS", "upnp:propchange")
        .body(NOTIFY_BODY)
        .send()
        .await
        .expect("Failed to send NOTIFY");
    assert_eq!(response.status(), 200);

    let event = timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("Timeout waiting for event")
        .expect("Event stream closed");

    match event {
        Event::Device { device_id, event } => {
            assert_eq!(device_id.as_str(), udn);
            assert_eq!(
                event,
                DeviceEvent::BinaryState {
                    state: "1".to_string()
                }
            );
        }
        other => panic!("Expected Event::Device, got {:?}", other),
    }

    broker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_deregistered_device_gets_404() {
    let (broker, mut events) = EventBroker::start(config((50710, 50810))).await.unwrap();

    let udn = "uuid:Socket-1_0-GONE";
    broker.register_device(test_descriptor(udn)).await.unwrap();
    broker.deregister_device(udn).await;

    let client = reqwest::Client::new();
    let response = client
        .request(notify(), format!("{}/{}", broker.callback_base_url(), udn))
        .body(NOTIFY_BODY)
        .send()
        .await
        .expect("Failed to send NOTIFY");
    assert_eq!(response.status(), 404);

    assert!(
        timeout(Duration::from_millis(100), events.recv()).await.is_err(),
        "No event should be emitted for a deregistered device"
    );

    broker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_rediscovery_replaces_connection_and_clears_error() {
    let (broker, _events) = EventBroker::start(config((50820, 50920))).await.unwrap();

    let udn = "uuid:Socket-1_0-AGAIN";
    let first = broker.register_device(test_descriptor(udn)).await.unwrap();
    first.connection().record_error("ECONNREFUSED");
    assert!(first.connection().last_error().is_some());

    // Re-discovery of the same UDN replaces the handle; the fresh
    // connection starts with a clean error state.
    let second = broker.register_device(test_descriptor(udn)).await.unwrap();
    assert!(second.connection().last_error().is_none());

    broker.shutdown().await.unwrap();
}
