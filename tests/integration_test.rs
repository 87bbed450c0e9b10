use mqtt_gas_meter::configuration;
use mqtt_gas_meter::daemon::Daemon;
use mqtt_gas_meter::home_assistant::DiscoveryConfig;
use mqtt_gas_meter::homa::{Control, HomaDevice};
use mqtt_gas_meter::meter::{Debounce, GasMeter};
use serde_json::Value;
use std::error::Error;
use strum::IntoEnumIterator;

#[test]
fn test_daemon_topics() -> Result<(), Box<dyn Error>> {
    let conf = configuration::Configuration::load("conf/mqtt-gas-meter.conf")?;

    let daemon = Daemon::new(conf)?;
    let device = daemon.device();

    assert_eq!(
        device.control_topic(Control::Volume),
        "/devices/123456-gas-meter/controls/Volume"
    );
    assert_eq!(
        device.control_topic(Control::FlowRate),
        "/devices/123456-gas-meter/controls/Flow rate"
    );

    // A fresh daemon starts at zero volume until the retained Volume message
    // or the first pulse arrives
    assert_eq!(daemon.meter().volume(), 0.0);

    Ok(())
}

#[test]
fn test_setup_messages() -> Result<(), Box<dyn Error>> {
    let mut conf = configuration::Configuration::load("conf/mqtt-gas-meter.conf")?;
    conf.meter.system_id = String::from("test-gas-meter");
    conf.meter.device_name = String::from("Test Meter");
    conf.mqtt.registration_prefix = String::from("test_prefix");

    let daemon = Daemon::new(conf)?;
    let messages = daemon.device().setup_messages("test_prefix");

    assert_eq!(
        messages[0],
        (
            String::from("/devices/test-gas-meter/meta/room"),
            String::from("Sensors")
        )
    );
    assert_eq!(
        messages[1],
        (
            String::from("/devices/test-gas-meter/meta/name"),
            String::from("Test Meter")
        )
    );

    // Five messages per control: type, order, unit, room and the discovery config
    assert_eq!(messages.len(), 2 + 5 * Control::iter().count());

    let (_, discovery) = messages
        .iter()
        .find(|(t, _)| t == "test_prefix/sensor/test-gas-meter-Volume/config")
        .expect("Volume discovery config not found");

    let json: Value = serde_json::from_str(discovery)?;
    assert_eq!(json["device_class"], "gas");
    assert_eq!(
        json["state_topic"],
        "/devices/test-gas-meter/controls/Volume"
    );
    assert_eq!(json["device"]["name"], "Test Meter");
    assert_eq!(json["device"]["identifiers"][0], "test-gas-meter");

    Ok(())
}

#[test]
fn test_remove_clears_setup() -> Result<(), Box<dyn Error>> {
    let device = HomaDevice::new("test-gas-meter", "Test Meter", "Sensors", "Energie");

    let setup = device.setup_messages("homeassistant");
    let remove = device.remove_messages("homeassistant");

    // Every topic the setup writes is cleared again by the remove set
    for (topic, _) in &setup {
        assert!(
            remove.iter().any(|(t, payload)| t == topic && payload.is_empty()),
            "setup topic {topic} is not cleared"
        );
    }

    // The remove set additionally clears the control value topics
    for control in Control::iter() {
        assert!(
            remove
                .iter()
                .any(|(t, _)| *t == device.control_topic(control))
        );
    }

    Ok(())
}

/// Counting, manual initialization and debounce working together, the way the
/// daemon drives them
#[test]
fn test_meter_cycle() {
    let mut meter = GasMeter::new(100.0, 11.4);
    let mut debounce = Debounce::new(1000);

    // The retained Volume message initializes the counter
    assert!(meter.set_volume(1543.21));

    let edges = [1000_u64, 1100, 3000, 3500, 5000];
    let mut readings = Vec::new();
    for ts_ms in edges {
        if debounce.accept(ts_ms) {
            readings.push(meter.pulse(ts_ms));
        }
    }

    // The bounces at 1100 and 3500 are dropped
    assert_eq!(readings.len(), 3);
    assert_eq!(meter.volume(), 1543.24);

    // The published payloads parse back to the readings
    let last = readings.last().unwrap();
    assert_eq!(last.volume.to_string().parse::<f64>().unwrap(), 1543.24);
    assert_eq!(
        last.energy.to_string().parse::<f64>().unwrap(),
        last.energy
    );

    // 0.01 m³ between 3000 and 5000 ms is 18 m³/h
    assert_eq!(last.flow_rate, 18.0);

    // Our own retained publish comes back without changing anything
    assert!(!meter.set_volume(1543.24));
}

/// The discovery configs of all controls are valid JSON with matching IDs
#[test]
fn test_discovery_configs() -> Result<(), Box<dyn Error>> {
    let device = HomaDevice::new("test-gas-meter", "Test Meter", "Sensors", "Energie");

    for control in Control::iter() {
        let config = DiscoveryConfig::new(&device, control);
        let json: Value = serde_json::from_str(&config.to_string())?;

        let object_id = format!("test-gas-meter-{}", control.as_str().replace(' ', "-"));
        assert_eq!(json["unique_id"], Value::String(object_id.clone()));
        assert_eq!(
            config.discovery_topic("homeassistant"),
            format!("homeassistant/sensor/{object_id}/config")
        );
        assert_eq!(
            json["state_topic"],
            Value::String(device.control_topic(control))
        );
    }

    Ok(())
}
