//! Integration tests for the typed action helpers, driven against a mock
//! HTTP device.

use wemo_api::{DeviceConnection, DeviceDescriptor};

fn host_and_port(server: &mockito::ServerGuard) -> (String, u16) {
    let hp = server.host_with_port();
    let (host, port) = hp.rsplit_once(':').unwrap();
    (host.to_string(), port.parse().unwrap())
}

fn connection_for(server: &mockito::ServerGuard) -> DeviceConnection {
    let (host, port) = host_and_port(server);
    let setup_xml = r#"<root xmlns="urn:Belkin:device-1-0">
      <device>
        <deviceType>urn:Belkin:device:bridge:1</deviceType>
        <friendlyName>WeMo Link</friendlyName>
        <UDN>uuid:Bridge-1_0-231450B0100000</UDN>
        <serviceList>
          <service>
            <serviceType>urn:Belkin:service:basicevent:1</serviceType>
            <serviceId>urn:Belkin:serviceId:basicevent1</serviceId>
            <controlURL>/upnp/control/basicevent1</controlURL>
            <eventSubURL>/upnp/event/basicevent1</eventSubURL>
          </service>
          <service>
            <serviceType>urn:Belkin:service:insight:1</serviceType>
            <serviceId>urn:Belkin:serviceId:insight1</serviceId>
            <controlURL>/upnp/control/insight1</controlURL>
            <eventSubURL>/upnp/event/insight1</eventSubURL>
          </service>
          <service>
            <serviceType>urn:Belkin:service:deviceevent:1</serviceType>
            <serviceId>urn:Belkin:serviceId:deviceevent1</serviceId>
            <controlURL>/upnp/control/deviceevent1</controlURL>
            <eventSubURL>/upnp/event/deviceevent1</eventSubURL>
          </service>
          <service>
            <serviceType>urn:Belkin:service:bridge:1</serviceType>
            <serviceId>urn:Belkin:serviceId:bridge1</serviceId>
            <controlURL>/upnp/control/bridge1</controlURL>
            <eventSubURL>/upnp/event/bridge1</eventSubURL>
          </service>
        </serviceList>
      </device>
    </root>"#;

    let descriptor = DeviceDescriptor::from_description_xml(setup_xml, host, port).unwrap();
    DeviceConnection::new(descriptor)
}

fn envelope(service_uri: &str, action: &str, inner: &str) -> String {
    format!(
        r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
            <s:Body>
                <u:{action}Response xmlns:u="{service_uri}">{inner}</u:{action}Response>
            </s:Body>
        </s:Envelope>"#
    )
}

#[test]
fn test_set_binary_state_sends_digit() {
    let mut server = mockito::Server::new();
    let connection = connection_for(&server);

    let mock = server
        .mock("POST", "/upnp/control/basicevent1")
        .match_header(
            "SOAPACTION",
            "\"urn:Belkin:service:basicevent:1#SetBinaryState\"",
        )
        .match_body(mockito::Matcher::Regex(
            "<BinaryState>1</BinaryState>".to_string(),
        ))
        .with_status(200)
        .with_body(envelope(
            "urn:Belkin:service:basicevent:1",
            "SetBinaryState",
            "<BinaryState>1</BinaryState>",
        ))
        .create();

    connection.set_binary_state(true).unwrap();
    mock.assert();
}

#[test]
fn test_get_insight_params_decodes_offsets() {
    let mut server = mockito::Server::new();
    let connection = connection_for(&server);

    server
        .mock("POST", "/upnp/control/insight1")
        .with_status(200)
        .with_body(envelope(
            "urn:Belkin:service:insight:1",
            "GetInsightParams",
            "<InsightParams>1|100|200|300|0|0|0|5000|1500</InsightParams>",
        ))
        .create();

    let params = connection.get_insight_params().unwrap();
    assert_eq!(params.binary_state, "1");
    assert_eq!(params.on_since.as_deref(), Some("100"));
    assert_eq!(params.on_for.as_deref(), Some("200"));
    assert_eq!(params.today_on_time.as_deref(), Some("300"));
    assert_eq!(params.instant_power.as_deref(), Some("5000"));
    assert_eq!(params.today_consumed.as_deref(), Some("1500"));
}

#[test]
fn test_get_attributes_decodes_entity_encoded_list() {
    let mut server = mockito::Server::new();
    let connection = connection_for(&server);

    let list = "&lt;attribute&gt;&lt;name&gt;Switch&lt;/name&gt;&lt;value&gt;1&lt;/value&gt;&lt;/attribute&gt;&lt;attribute&gt;&lt;name&gt;SwitchMode&lt;/name&gt;&lt;value&gt;0&lt;/value&gt;&lt;/attribute&gt;";
    server
        .mock("POST", "/upnp/control/deviceevent1")
        .with_status(200)
        .with_body(envelope(
            "urn:Belkin:service:deviceevent:1",
            "GetAttributes",
            &format!("<attributeList>{list}</attributeList>"),
        ))
        .create();

    let attributes = connection.get_attributes().unwrap();
    assert_eq!(attributes.len(), 2);
    assert_eq!(attributes[0].name, "Switch");
    assert_eq!(attributes[0].value, "1");
    assert_eq!(attributes[1].name, "SwitchMode");
}

#[test]
fn test_set_attributes_entity_encodes_payload() {
    let mut server = mockito::Server::new();
    let connection = connection_for(&server);

    let mock = server
        .mock("POST", "/upnp/control/deviceevent1")
        .match_body(mockito::Matcher::Regex(
            "&lt;attribute&gt;&lt;name&gt;Mode&lt;/name&gt;&lt;value&gt;1&lt;/value&gt;&lt;/attribute&gt;"
                .to_string(),
        ))
        .with_status(200)
        .with_body(envelope(
            "urn:Belkin:service:deviceevent:1",
            "SetAttributes",
            "",
        ))
        .create();

    connection.set_attributes(&[("Mode", "1")]).unwrap();
    mock.assert();
}

#[test]
fn test_get_end_devices_parses_bulbs() {
    let mut server = mockito::Server::new();
    let connection = connection_for(&server);

    let device_lists = r#"<DeviceLists><DeviceList><DeviceListType>Paired</DeviceListType><DeviceInfos><DeviceInfo><DeviceIndex>0</DeviceIndex><DeviceID>94103EA2B27803ED</DeviceID><FriendlyName>Desk Bulb</FriendlyName><CapabilityIDs>10006,10008</CapabilityIDs><CurrentState>1,128:0</CurrentState></DeviceInfo></DeviceInfos></DeviceList></DeviceLists>"#;
    let encoded = html_escape::encode_text(device_lists);

    let mock = server
        .mock("POST", "/upnp/control/bridge1")
        .match_body(mockito::Matcher::Regex(
            "<ReqListType>PAIRED_LIST</ReqListType>".to_string(),
        ))
        .with_status(200)
        .with_body(envelope(
            "urn:Belkin:service:bridge:1",
            "GetEndDevices",
            &format!("<DeviceLists>{encoded}</DeviceLists>"),
        ))
        .create();

    let devices = connection.get_end_devices().unwrap();
    mock.assert();

    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].device_id, "94103EA2B27803ED");
    assert_eq!(devices[0].capabilities.get("10006"), Some("1"));
    assert_eq!(devices[0].capabilities.get("10008"), Some("128:0"));
}

#[test]
fn test_set_device_status_marks_group_actions() {
    let mut server = mockito::Server::new();
    let connection = connection_for(&server);

    // A 10-character identifier addresses a bulb group
    let mock = server
        .mock("POST", "/upnp/control/bridge1")
        .match_body(mockito::Matcher::Regex(
            "&lt;IsGroupAction&gt;YES&lt;/IsGroupAction&gt;".to_string(),
        ))
        .with_status(200)
        .with_body(envelope(
            "urn:Belkin:service:bridge:1",
            "SetDeviceStatus",
            "",
        ))
        .create();

    connection
        .set_device_status("1234567890", "10006", "1")
        .unwrap();
    mock.assert();
}
