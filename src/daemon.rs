use crate::configuration::Configuration;
use crate::gpio::PulseWatcher;
use crate::homa::{Control, HomaDevice};
use crate::meter::{Debounce, GasMeter, MeterReading};
use log::{debug, error, info, trace, warn};
use rumqttc::{
    AsyncClient, ClientError, Event, Incoming, MqttOptions, QoS, TlsConfiguration, Transport,
};
use std::error::Error;
use std::path::PathBuf;
use tokio::signal::unix::SignalKind;
use tokio::sync::mpsc;
use tokio::task;
use tokio::time::sleep;

/// Directory for the marker file that remembers the HomA setup was published
const INIT_MARKER_DIR: &str = "/dev/shm";

/// Daemon that counts gas meter pulses and publishes the readings to MQTT
pub struct Daemon {
    config: Configuration,
    mqtt_config: MqttOptions,
    device: HomaDevice,
    meter: GasMeter,
}

impl Daemon {
    /// Constructs a daemon from the specified configuration
    ///
    /// ```
    /// use mqtt_gas_meter::{Configuration, Daemon};
    ///
    /// let config = Configuration::load("conf/mqtt-gas-meter.conf").expect("Cannot load configuration");
    /// let mut daemon = Daemon::new(config).expect("Cannot create daemon");
    ///
    /// // later, run daemon.run() in an async function
    /// ```
    pub fn new(config: Configuration) -> Result<Daemon, Box<dyn Error>> {
        info!("Daemon for {} starting", config.meter.system_id);

        let mut mqtt_config = MqttOptions::new(
            &config.meter.system_id,
            &config.mqtt.host,
            config.mqtt.port,
        );
        mqtt_config.set_credentials(&config.mqtt.user, &config.mqtt.password);
        if let Some(path) = &config.mqtt.ca_cert {
            debug!("Using CA certificate {path}");
            let ca = std::fs::read(path)?;
            mqtt_config.set_transport(Transport::Tls(TlsConfiguration::Simple {
                ca,
                alpn: None,
                client_auth: None,
            }));
        }

        Ok(Daemon {
            mqtt_config,
            device: HomaDevice::new(
                &config.meter.system_id,
                &config.meter.device_name,
                &config.meter.room,
                &config.meter.area,
            ),
            meter: GasMeter::new(config.meter.resolution, config.meter.calorific_value),
            config,
        })
    }

    /// Returns the HomA device of the daemon
    pub fn device(&self) -> &HomaDevice {
        &self.device
    }

    /// Returns the meter state
    pub fn meter(&self) -> &GasMeter {
        &self.meter
    }

    /// Runs the main loop that counts pulses and publishes the MQTT readings
    pub async fn run(self: &mut Daemon) {
        let (client, set_rx) = self.connect();

        self.main_loop(client, set_rx).await.unwrap_or_else(|e| {
            error!("Gas meter main loop failed: {e}");
        });
    }

    /// Clears all retained HomA and Home Assistant messages and returns
    pub async fn remove(self: &mut Daemon) {
        let (client, _set_rx) = self.connect();

        self.publish_remove(&client).await.unwrap_or_else(|e| {
            error!("Removing retained messages failed: {e}");
        });
    }

    /// Connects to the broker and spawns the event loop task
    ///
    /// The task renews the Volume subscription on every reconnect and forwards
    /// incoming Volume payloads to the returned channel.
    fn connect(&self) -> (AsyncClient, mpsc::UnboundedReceiver<String>) {
        info!(
            "Connecting to MQTT broker {}:{}",
            self.config.mqtt.host, self.config.mqtt.port
        );

        let (client, mut event_loop) = AsyncClient::new(self.mqtt_config.clone(), 10);
        let (set_tx, set_rx) = mpsc::unbounded_channel();

        let subscribe_client = client.clone();
        let volume_topic = self.device.control_topic(Control::Volume);
        task::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                        debug!("Connected to the broker");
                        // Subscribing here means the subscription is renewed
                        // when we lose the connection and reconnect
                        if let Err(e) = subscribe_client
                            .subscribe(volume_topic.clone(), QoS::AtLeastOnce)
                            .await
                        {
                            error!("Cannot subscribe to {volume_topic}: {e}");
                        }
                    }
                    Ok(Event::Incoming(Incoming::Publish(publish))) => {
                        let payload = String::from_utf8_lossy(&publish.payload).to_string();
                        debug!("Received {} : {payload}", publish.topic);
                        if publish.topic == volume_topic {
                            let _ = set_tx.send(payload);
                        }
                    }
                    Ok(notification) => trace!("MQTT notification received: {notification:?}"),
                    Err(e) => {
                        error!("MQTT connection error: {e}");
                        sleep(std::time::Duration::from_secs(1)).await;
                    }
                }
            }
        });

        (client, set_rx)
    }

    /// Single long-running iteration over pulses, overrides and signals
    async fn main_loop(
        self: &mut Daemon,
        client: AsyncClient,
        mut set_rx: mpsc::UnboundedReceiver<String>,
    ) -> Result<(), Box<dyn Error>> {
        let mut terminate_signal = tokio::signal::unix::signal(SignalKind::terminate())?;
        let mut watcher = PulseWatcher::open(self.config.meter.gpio_pin)?;
        let mut pulse_rx = watcher.watch()?;
        let mut debounce = Debounce::new(self.config.meter.debounce_ms);

        self.publish_setup(&client).await?;

        info!("Started, waiting for pulses ...");
        loop {
            tokio::select! {
                Some(ts_ms) = pulse_rx.recv() => {
                    if debounce.accept(ts_ms) {
                        let reading = self.meter.pulse(ts_ms);
                        self.publish_reading(&client, &reading).await?;
                    } else {
                        debug!("Debounce: ignored pulse at {ts_ms} ms");
                    }
                },
                Some(payload) = set_rx.recv() => {
                    self.apply_set(&payload);
                },
                _ = tokio::signal::ctrl_c() => {
                    debug!("Ctrl-C received");
                    break;
                },
                _ = terminate_signal.recv() => {
                    debug!("Interrupt received");
                    break;
                }
            }
        }

        // let queued publishes drain before disconnecting
        sleep(std::time::Duration::from_secs(1)).await;

        Ok(())
    }

    /// Applies a Volume payload received from the broker
    ///
    /// This is how the counter is initialized: an external retained publish
    /// to the Volume topic sets the absolute reading. Our own retained
    /// publishes arrive here too and are no-ops.
    fn apply_set(&mut self, payload: &str) {
        match payload.trim().parse::<f64>() {
            Ok(volume) => {
                let current = self.meter.volume();
                if self.meter.set_volume(volume) {
                    warn!(
                        "Setting new volume {volume} m³ which differs from the current {current} m³"
                    );
                }
            }
            Err(e) => warn!("Ignoring Volume payload '{payload}': {e}"),
        }
    }

    /// Publishes one reading to the four control topics
    async fn publish_reading(
        &self,
        client: &AsyncClient,
        reading: &MeterReading,
    ) -> Result<(), ClientError> {
        let topic = |control| self.device.control_topic(control);

        Daemon::publish(client, topic(Control::Volume), &reading.volume.to_string()).await?;
        Daemon::publish(client, topic(Control::Energy), &reading.energy.to_string()).await?;
        Daemon::publish(
            client,
            topic(Control::FlowRate),
            &reading.flow_rate.to_string(),
        )
        .await?;
        Daemon::publish(client, topic(Control::Timestamp), &reading.timestamp).await
    }

    /// Path of the marker file remembering that setup data was published
    fn init_marker(&self) -> PathBuf {
        PathBuf::from(format!(
            "{INIT_MARKER_DIR}/homa_init.{}",
            self.config.meter.system_id
        ))
    }

    /// Publishes the retained HomA and Home Assistant setup messages
    ///
    /// Only done once per system ID, delete the marker file and restart to
    /// publish them again.
    async fn publish_setup(&self, client: &AsyncClient) -> Result<(), ClientError> {
        let marker = self.init_marker();
        if marker.exists() {
            info!(
                "HomA setup data not reloaded, to do so delete {} and restart.",
                marker.display()
            );
            return Ok(());
        }

        info!("Publishing HomA setup data ...");
        for (topic, payload) in self
            .device
            .setup_messages(&self.config.mqtt.registration_prefix)
        {
            Daemon::publish(client, topic, &payload).await?;
        }

        // do not fail if not writable
        if let Err(e) = std::fs::File::create(&marker) {
            warn!("Could not create HomA init file {}: {e}", marker.display());
        }

        Ok(())
    }

    /// Publishes empty retained messages for everything the daemon ever wrote
    async fn publish_remove(&self, client: &AsyncClient) -> Result<(), ClientError> {
        info!(
            "Removing HomA / Home Assistant data (system ID {}) ...",
            self.config.meter.system_id
        );
        for (topic, payload) in self
            .device
            .remove_messages(&self.config.mqtt.registration_prefix)
        {
            Daemon::publish(client, topic, &payload).await?;
        }

        // a later start publishes the setup data again
        let _ = std::fs::remove_file(self.init_marker());

        // let queued publishes drain before disconnecting
        sleep(std::time::Duration::from_secs(1)).await;

        Ok(())
    }

    // Publish a retained message to MQTT
    async fn publish<S>(client: &AsyncClient, topic: S, data: &str) -> Result<(), ClientError>
    where
        S: Into<String> + std::fmt::Display,
    {
        debug!("Publishing to topic {topic} : {data}");
        client.publish(topic, QoS::AtLeastOnce, true, data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_set() {
        let config = Configuration::load("conf/mqtt-gas-meter.conf")
            .expect("Failed to load default config");
        let mut daemon = Daemon::new(config).expect("Failed to create daemon");

        daemon.apply_set("123.4");
        assert_eq!(daemon.meter().volume(), 123.4);

        // Whitespace around the decimal string is tolerated
        daemon.apply_set(" 124.0\n");
        assert_eq!(daemon.meter().volume(), 124.0);

        // Garbage payloads are ignored
        daemon.apply_set("not a number");
        assert_eq!(daemon.meter().volume(), 124.0);
    }

    #[test]
    fn test_init_marker() {
        let config = Configuration::load("conf/mqtt-gas-meter.conf")
            .expect("Failed to load default config");
        let daemon = Daemon::new(config).expect("Failed to create daemon");

        assert_eq!(
            daemon.init_marker(),
            PathBuf::from("/dev/shm/homa_init.123456-gas-meter")
        );
    }
}
