//! Subscribe to a WeMo device and print its events.
//!
//! Usage: `cargo run --example watch_events -- <host> <port>`
//!
//! Fetches the device's description document, registers it with a broker,
//! subscribes to the services it advertises, and prints every event.

use wemo_api::{DeviceDescriptor, EventCategory};
use wemo_stream::{BrokerConfig, EventBroker};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wemo_stream=debug".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let host = args.next().ok_or("usage: watch_events <host> <port>")?;
    let port: u16 = args.next().ok_or("usage: watch_events <host> <port>")?.parse()?;

    let setup_xml = reqwest::get(format!("http://{host}:{port}/setup.xml"))
        .await?
        .text()
        .await?;
    let descriptor = DeviceDescriptor::from_description_xml(&setup_xml, host, port)?;
    println!(
        "found {} ({}) with {} services",
        descriptor.friendly_name,
        descriptor.udn,
        descriptor.services.len()
    );

    let (broker, mut events) = EventBroker::start(BrokerConfig::default()).await?;
    let device = broker.register_device(descriptor).await?;

    // Subscribe to the service behind each event category we care about,
    // skipping services this device does not advertise.
    let interests = [
        EventCategory::BinaryState,
        EventCategory::Brightness,
        EventCategory::InsightParams,
        EventCategory::StatusChange,
        EventCategory::AttributeList,
    ];
    let services: std::collections::HashSet<_> =
        interests.iter().map(|c| c.owning_service()).collect();
    for service in services {
        if device.connection().registry().supports(service) {
            device.ensure_subscribed(service).await;
        }
    }

    while let Some(event) = events.recv().await {
        println!("{event:?}");
    }

    Ok(())
}
