use crate::home_assistant::DiscoveryConfig;
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

/// Contains the HomA controls published by the gas meter
#[derive(Debug, PartialEq, Clone, Copy, EnumIter)]
pub enum Control {
    /// Gas volume in m³, also the topic used to initialize the counter
    Volume,

    /// Energy in kWh, derived from the volume and the calorific value
    Energy,

    /// Flow rate in m³/h
    FlowRate,

    /// Local time of the last counted pulse
    Timestamp,
}

impl Control {
    /// Name of the control as used in the topic
    pub fn as_str(&self) -> &'static str {
        match self {
            Control::Volume => "Volume",
            Control::Energy => "Energy",
            Control::FlowRate => "Flow rate",
            Control::Timestamp => "Timestamp",
        }
    }

    /// Unit shown behind the value, with a leading space for HomA clients
    pub fn unit(&self) -> &'static str {
        match self {
            Control::Volume => " m³",
            Control::Energy => " kWh",
            Control::FlowRate => " m³/h",
            Control::Timestamp => "",
        }
    }

    /// HomA room of the control, empty to keep it out of the room view
    pub fn room(&self) -> &'static str {
        match self {
            Control::Volume => "Home",
            _ => "",
        }
    }

    /// Order of the control in HomA clients, starting at 1
    pub fn order(&self) -> usize {
        Control::iter().position(|c| c == *self).unwrap_or(0) + 1
    }
}

/// The HomA device, owner of the topic tree `/devices/<system_id>/...`
///
/// Produces the retained setup and remove message sets that the daemon
/// publishes, so they can be inspected without a broker.
pub struct HomaDevice {
    system_id: String,
    device_name: String,
    room: String,
    area: String,
}

impl HomaDevice {
    pub fn new(system_id: &str, device_name: &str, room: &str, area: &str) -> HomaDevice {
        HomaDevice {
            system_id: system_id.to_string(),
            device_name: device_name.to_string(),
            room: room.to_string(),
            area: area.to_string(),
        }
    }

    pub fn system_id(&self) -> &str {
        &self.system_id
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn area(&self) -> &str {
        &self.area
    }

    /// Topic carrying the value of a control
    ///
    /// ## Example
    ///
    /// ```
    /// use mqtt_gas_meter::homa::{Control, HomaDevice};
    ///
    /// let device = HomaDevice::new("123456-gas-meter", "Gas Meter", "Sensors", "Energie");
    /// assert_eq!(
    ///     device.control_topic(Control::Volume),
    ///     "/devices/123456-gas-meter/controls/Volume"
    /// );
    /// ```
    pub fn control_topic(&self, control: Control) -> String {
        format!("/devices/{}/controls/{}", self.system_id, control.as_str())
    }

    /// Topic carrying a meta attribute of a control
    fn control_meta_topic(&self, control: Control, attribute: &str) -> String {
        format!(
            "/devices/{}/controls/{}/meta/{attribute}",
            self.system_id,
            control.as_str()
        )
    }

    /// Topic carrying a meta attribute of the device itself
    fn device_meta_topic(&self, attribute: &str) -> String {
        format!("/devices/{}/meta/{attribute}", self.system_id)
    }

    /// Setup messages declaring the device and its controls, all retained
    ///
    /// `prefix` is the Home Assistant discovery prefix from the configuration.
    pub fn setup_messages(&self, prefix: &str) -> Vec<(String, String)> {
        let mut messages = vec![
            (self.device_meta_topic("room"), self.room.clone()),
            (self.device_meta_topic("name"), self.device_name.clone()),
        ];
        for control in Control::iter() {
            messages.push((
                self.control_meta_topic(control, "type"),
                String::from("text"),
            ));
            messages.push((
                self.control_meta_topic(control, "order"),
                control.order().to_string(),
            ));
            messages.push((
                self.control_meta_topic(control, "unit"),
                control.unit().to_string(),
            ));
            messages.push((
                self.control_meta_topic(control, "room"),
                control.room().to_string(),
            ));
            let discovery = DiscoveryConfig::new(self, control);
            messages.push((discovery.discovery_topic(prefix), discovery.to_string()));
        }
        messages
    }

    /// Messages clearing every retained topic the setup and the daemon wrote
    pub fn remove_messages(&self, prefix: &str) -> Vec<(String, String)> {
        let mut messages = vec![
            (self.device_meta_topic("room"), String::new()),
            (self.device_meta_topic("name"), String::new()),
        ];
        for control in Control::iter() {
            for attribute in ["type", "order", "unit", "room"] {
                messages.push((self.control_meta_topic(control, attribute), String::new()));
            }
            messages.push((self.control_topic(control), String::new()));
            let discovery = DiscoveryConfig::new(self, control);
            messages.push((discovery.discovery_topic(prefix), String::new()));
        }
        messages
    }
}
