use log::info;
use rppal::gpio::{Error, Event, Gpio, InputPin, Trigger};
use std::time::Duration;
use tokio::sync::mpsc;

/// Debounce period applied by the GPIO driver, the 1 s software debounce of
/// the meter sits on top of this
const DRIVER_DEBOUNCE: Duration = Duration::from_millis(100);

/// Watches the pulse sensor line and forwards rising edges to the daemon
///
/// The line is configured with the internal pull-up, a retro-reflective or
/// reed sensor pulls it to ground and releases it once per meter revolution.
/// The watcher owns the pin, dropping it stops the interrupt.
pub struct PulseWatcher {
    pin: InputPin,
}

impl PulseWatcher {
    /// Requests the GPIO line with the given BCM number as pulse input
    pub fn open(gpio_pin: u8) -> Result<PulseWatcher, Error> {
        let gpio = Gpio::new()?;
        let pin = gpio.get(gpio_pin)?.into_input_pullup();
        info!("Watching pulses on GPIO {gpio_pin}");
        Ok(PulseWatcher { pin })
    }

    /// Starts the rising-edge interrupt and returns the edge timestamps in ms
    ///
    /// Timestamps come from the kernel event, monotonic since boot, so they
    /// are only compared against each other.
    pub fn watch(&mut self) -> Result<mpsc::UnboundedReceiver<u64>, Error> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.pin.set_async_interrupt(
            Trigger::RisingEdge,
            Some(DRIVER_DEBOUNCE),
            move |event: Event| {
                // The receiver only goes away on shutdown
                let _ = tx.send(event.timestamp.as_millis() as u64);
            },
        )?;
        Ok(rx)
    }
}
