use serde::Deserialize;
use serde_inline_default::serde_inline_default;
use std::error::Error;

/// Contains the configuration for communicating with the MQTT broker
#[serde_inline_default]
#[derive(Deserialize)]
pub struct Mqtt {
    /// Hostname or IP address. Default: localhost
    #[serde_inline_default(String::from("localhost"))]
    pub host: String,

    /// Port of the connection to the broker. Default: 1883
    #[serde_inline_default(1883)]
    pub port: u16,

    /// Username for the connection to the broker. Default: empty
    #[serde(default)]
    pub user: String,

    /// Password for the connection to the broker. Default: empty
    #[serde(default)]
    pub password: String,

    /// Path to a CA certificate in PEM format. If set, the connection to the
    /// broker uses TLS. Default: unset
    pub ca_cert: Option<String>,

    /// Prefix for the registration topic sent to Home Assistant. Default: homeassistant
    ///
    /// This must match the configuration of the MQTT integration in Home Assistant
    ///
    /// See <https://www.home-assistant.io/integrations/mqtt#discovery-options>
    #[serde_inline_default(String::from("homeassistant"))]
    #[serde(rename = "registration-prefix")]
    pub registration_prefix: String,
}

/// Contains the configuration for the gas meter hardware and its HomA identity
#[serde_inline_default]
#[derive(Deserialize)]
pub struct Meter {
    /// BCM number of the GPIO line the pulse sensor is connected to. Default: 17
    ///
    /// Line 17 = GPIO/BCM pin 17 = physical pin 11, see <https://pinout.xyz>
    #[serde_inline_default(17)]
    pub gpio_pin: u8,

    /// Number of pulses per cubic meter of gas. Default: 100
    #[serde_inline_default(100.0)]
    pub resolution: f64,

    /// Energy content of the gas in kWh/m³. Default: 11.4
    #[serde_inline_default(11.4)]
    pub calorific_value: f64,

    /// Minimum time between two counted pulses in milliseconds. Default: 1000
    #[serde_inline_default(1000)]
    pub debounce_ms: u64,

    /// Name of the device shown in HomA clients and Home Assistant. Default: Gas Meter
    #[serde_inline_default(String::from("Gas Meter"))]
    pub device_name: String,

    /// HomA system ID used to construct the topics. It should be unique on
    /// the broker. Default: 123456-gas-meter
    #[serde_inline_default(String::from("123456-gas-meter"))]
    pub system_id: String,

    /// HomA room of the device. Default: Sensors
    #[serde_inline_default(String::from("Sensors"))]
    pub room: String,

    /// Area suggested to Home Assistant. Default: Energie
    #[serde_inline_default(String::from("Energie"))]
    pub area: String,
}

/// Contains all the configuration for `mqtt-gas-meter`
#[serde_inline_default]
#[derive(Deserialize)]
pub struct Configuration {
    /// Contains the configuration for communicating with the MQTT broker
    pub mqtt: Mqtt,

    /// Contains the configuration for the gas meter
    pub meter: Meter,

    /// Sets the verbosity of the logs.
    ///   * 1 => Error
    ///  * 2 => Warning
    ///  * 3 => Info
    ///  * 4 => Debug
    ///  * 5 => Trace
    #[serde_inline_default(2)]
    #[serde(rename = "log-verbosity")]
    pub log_verbosity: usize,
}

impl Configuration {
    /// Load the configuration from a file
    ///
    /// ## Example
    ///
    /// ```
    /// use mqtt_gas_meter::{configuration, Configuration};
    ///
    /// let config = Configuration::load("conf/mqtt-gas-meter.conf").expect("Cannot load configuration");
    ///
    /// assert_eq!(config.mqtt.host, "localhost");
    /// ```
    pub fn load(path: &str) -> Result<Configuration, Box<dyn Error>> {
        toml::from_str(std::fs::read_to_string(path)?.as_str()).map_err(|err| err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that we can properly load the default configuration
    #[test]
    fn test_default_config() -> Result<(), Box<dyn Error>> {
        let conf = Configuration::load("conf/mqtt-gas-meter.conf")?;

        assert_eq!(conf.mqtt.host, String::from("localhost"));
        assert_eq!(conf.mqtt.port, 1883);
        assert_eq!(conf.mqtt.registration_prefix, String::from("homeassistant"));

        // Plain TCP by default
        assert_eq!(conf.mqtt.ca_cert, None);

        assert_eq!(conf.meter.gpio_pin, 17);
        assert_eq!(conf.meter.resolution, 100.0);
        assert_eq!(conf.meter.calorific_value, 11.4);
        assert_eq!(conf.meter.debounce_ms, 1000);
        assert_eq!(conf.meter.system_id, String::from("123456-gas-meter"));
        assert_eq!(conf.meter.device_name, String::from("Gas Meter"));

        Ok(())
    }

    #[test]
    fn test_overrides() -> Result<(), Box<dyn Error>> {
        let conf: Configuration = toml::from_str(
            r#"
            log-verbosity = 4

            [mqtt]
            host = "broker.local"
            port = 8883
            ca_cert = "/etc/ssl/certs/mosquitto.pem"

            [meter]
            gpio_pin = 27
            resolution = 10.0
            "#,
        )?;

        assert_eq!(conf.log_verbosity, 4);
        assert_eq!(conf.mqtt.host, "broker.local");
        assert_eq!(conf.mqtt.port, 8883);
        assert_eq!(
            conf.mqtt.ca_cert.as_deref(),
            Some("/etc/ssl/certs/mosquitto.pem")
        );
        assert_eq!(conf.meter.gpio_pin, 27);
        assert_eq!(conf.meter.resolution, 10.0);

        // Untouched fields keep their defaults
        assert_eq!(conf.meter.calorific_value, 11.4);
        assert_eq!(conf.mqtt.user, "");

        Ok(())
    }
}
