//! # mqtt-gas-meter
//!
//! `mqtt-gas-meter` counts gas meter pulses on a Raspberry Pi GPIO pin and
//! publishes the readings to an MQTT broker using the HomA convention, with
//! Home Assistant discovery on top
//!

pub use self::configuration::Configuration;
pub use self::configuration::Meter;
pub use self::configuration::Mqtt;
pub use self::daemon::Daemon;
pub use self::home_assistant::DiscoveryConfig;
pub use self::homa::Control;
pub use self::homa::HomaDevice;
pub use self::meter::Debounce;
pub use self::meter::GasMeter;
pub use self::meter::MeterReading;

/// Contains the configuration stuff
pub mod configuration;
/// Contains the daemon code
pub mod daemon;
/// Contains the GPIO pulse input
pub mod gpio;
/// Contains Home Assistant discovery data
pub mod home_assistant;
/// Contains the HomA device and control model
pub mod homa;
/// Contains the gas meter counter state
pub mod meter;
