use chrono::Local;
use log::debug;

/// Rounds to 3 digits after the dot, the precision used in published payloads
fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Cumulative gas meter state
///
/// The meter counts pulse ticks and derives the published readings from them.
/// `resolution` is the number of pulses per cubic meter, so every pulse adds
/// `1/resolution` m³.
pub struct GasMeter {
    /// Number of counted pulses since the last (re)initialization
    ticks: u64,

    /// Pulses per cubic meter
    resolution: f64,

    /// Energy content of the gas in kWh/m³
    calorific_value: f64,

    /// Timestamp of the last counted pulse, used for the flow rate
    last_pulse_ms: Option<u64>,
}

/// A single reading derived from the meter state, one value per HomA control
#[derive(Debug, PartialEq)]
pub struct MeterReading {
    /// Gas volume in m³
    pub volume: f64,

    /// Energy in kWh
    pub energy: f64,

    /// Flow rate in m³/h, averaged over the interval since the previous pulse
    pub flow_rate: f64,

    /// Local time of the pulse, `%Y-%m-%d %H:%M:%S`
    pub timestamp: String,
}

impl GasMeter {
    /// Creates a meter starting at zero volume
    pub fn new(resolution: f64, calorific_value: f64) -> GasMeter {
        GasMeter {
            ticks: 0,
            resolution,
            calorific_value,
            last_pulse_ms: None,
        }
    }

    /// Counts a pulse at the given timestamp and returns the updated reading
    ///
    /// ## Example
    ///
    /// ```
    /// use mqtt_gas_meter::GasMeter;
    ///
    /// let mut meter = GasMeter::new(100.0, 11.4);
    /// let reading = meter.pulse(1000);
    ///
    /// assert_eq!(reading.volume, 0.01);
    /// ```
    pub fn pulse(&mut self, ts_ms: u64) -> MeterReading {
        self.ticks += 1;
        let flow_rate = match self.last_pulse_ms {
            // m³ per pulse over the elapsed time, scaled from ms to hours
            Some(last_ms) if ts_ms > last_ms => {
                round3(1.0 / self.resolution / (ts_ms - last_ms) as f64 * 3_600_000.0)
            }
            _ => 0.0,
        };
        self.last_pulse_ms = Some(ts_ms);

        let reading = MeterReading {
            volume: self.volume(),
            energy: round3(self.volume() * self.calorific_value),
            flow_rate,
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        };
        debug!(
            "Pulse counted, ticks = {}, volume = {} m³",
            self.ticks, reading.volume
        );
        reading
    }

    /// Current volume in m³
    pub fn volume(&self) -> f64 {
        round3(self.ticks as f64 / self.resolution)
    }

    /// Sets the absolute volume, as received from a retained MQTT message
    ///
    /// Returns `true` if the tick counter actually changed. The new value may
    /// be lower than the current one, that is how the meter is initialized or
    /// corrected from the outside.
    pub fn set_volume(&mut self, volume: f64) -> bool {
        // Our own retained readings echo back rounded to 3 decimals. At
        // resolutions above 1000 that rounding maps to a different tick
        // count, so a value matching the current reading must never move
        // the counter.
        if round3(volume) == self.volume() {
            return false;
        }
        let ticks = (volume * self.resolution).round() as u64;
        if ticks == self.ticks {
            return false;
        }
        self.ticks = ticks;
        true
    }
}

/// Software debounce on top of the driver-side debounce period
///
/// An edge is only accepted if at least the configured interval elapsed since
/// the previously seen edge. Rejected edges still move the reference
/// timestamp, so a bouncing line keeps being ignored until it settles.
pub struct Debounce {
    min_interval_ms: u64,
    last_edge_ms: Option<u64>,
}

impl Debounce {
    pub fn new(min_interval_ms: u64) -> Debounce {
        Debounce {
            min_interval_ms,
            last_edge_ms: None,
        }
    }

    /// Returns `true` if the edge at `ts_ms` should be counted
    pub fn accept(&mut self, ts_ms: u64) -> bool {
        let accepted = match self.last_edge_ms {
            Some(last_ms) => ts_ms.saturating_sub(last_ms) >= self.min_interval_ms,
            None => true,
        };
        self.last_edge_ms = Some(ts_ms);
        accepted
    }
}
