use crate::homa::{Control, HomaDevice};
use serde::Serialize;
use std::fmt;

/// Discovery config sent to Home Assistant for one control
///
/// Published retained to `<prefix>/sensor/<object_id>/config` so the MQTT
/// integration creates the matching sensor entity.
///
/// See <https://www.home-assistant.io/integrations/mqtt#mqtt-discovery>
#[derive(Serialize, Debug)]
pub struct DiscoveryConfig {
    /// Device class helps Home Assistant to know how to interpret the values.
    ///
    /// See <https://www.home-assistant.io/integrations/sensor#device-class>
    #[serde(skip_serializing_if = "Option::is_none")]
    device_class: Option<&'static str>,

    /// HomA topic the control value is published on
    state_topic: String,

    /// Name of the entity, shown in Home Assistant
    name: &'static str,

    /// Unique ID for the entity, constructed from the system ID and the control
    unique_id: String,

    /// Requested entity ID, same as `unique_id`
    object_id: String,

    /// Device grouping the four entities
    device: Device,

    /// Describes how Home Assistant stores the data
    #[serde(skip_serializing_if = "Option::is_none")]
    state_class: Option<&'static str>,

    /// Template turning the raw payload into the entity value
    #[serde(skip_serializing_if = "Option::is_none")]
    value_template: Option<&'static str>,

    /// An icon for controls without a device class
    #[serde(skip_serializing_if = "Option::is_none")]
    icon: Option<&'static str>,

    /// Number of digits shown in the frontend
    #[serde(skip_serializing_if = "Option::is_none")]
    suggested_display_precision: Option<u8>,

    /// Unit used in the report, without the leading space of the HomA unit
    #[serde(skip_serializing_if = "Option::is_none")]
    unit_of_measurement: Option<&'static str>,
}

/// Device block shared by every discovery config of the gas meter
#[derive(Serialize, Debug)]
pub struct Device {
    /// Identifiers of the device, the HomA system ID
    identifiers: Vec<String>,

    /// Name of the device, from the `device_name` configuration field
    name: String,

    manufacturer: &'static str,

    model: &'static str,

    /// Area the entities are suggested to, from the `area` configuration field
    suggested_area: String,
}

impl DiscoveryConfig {
    /// Creates the discovery config of a control
    pub fn new(device: &HomaDevice, control: Control) -> DiscoveryConfig {
        let object_id = format!(
            "{}-{}",
            device.system_id(),
            control.as_str().replace(' ', "-")
        );

        let (device_class, state_class) = match control {
            Control::Volume => (Some("gas"), Some("total_increasing")),
            Control::Energy => (Some("energy"), Some("total_increasing")),
            Control::FlowRate => (Some("volume_flow_rate"), Some("measurement")),
            Control::Timestamp => (None, None),
        };

        let (value_template, icon) = match control {
            Control::Timestamp => (
                Some("{{ as_datetime(value) }}"),
                Some("mdi:calendar-arrow-right"),
            ),
            _ => (None, None),
        };

        let suggested_display_precision = match control {
            Control::Volume | Control::Energy => Some(2),
            Control::FlowRate => Some(3),
            Control::Timestamp => None,
        };

        DiscoveryConfig {
            device_class,
            state_topic: device.control_topic(control),
            name: control.as_str(),
            unique_id: object_id.clone(),
            object_id,
            device: Device {
                identifiers: vec![device.system_id().to_string()],
                name: device.device_name().to_string(),
                manufacturer: "Holger Müller",
                model: "Raspberry Pi 5 Gas Meter Module",
                suggested_area: device.area().to_string(),
            },
            state_class,
            value_template,
            icon,
            suggested_display_precision,
            unit_of_measurement: Some(control.unit().trim()).filter(|u| !u.is_empty()),
        }
    }

    /// Discovery topic this config is published on
    pub fn discovery_topic(&self, prefix: &str) -> String {
        format!("{prefix}/sensor/{}/config", self.object_id)
    }
}

impl fmt::Display for DiscoveryConfig {
    /// Formats the config in JSON format
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let Ok(config) = serde_json::to_string(&self) else {
            return Err(fmt::Error);
        };
        write!(f, "{config}")
    }
}
