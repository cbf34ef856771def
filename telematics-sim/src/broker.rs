//! Broker seam: the publish trait the loop talks to, its MQTT v5
//! implementation and the event-loop driver with reconnect backoff.

use crate::config::MqttConf;
use crate::error::{Result, TelematicsError};
use crate::health::HealthTracker;
use async_trait::async_trait;
use rumqttc::v5::mqttbytes::v5::{Packet, PublishProperties};
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{AsyncClient, Event, EventLoop, MqttOptions};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Anything readings can be published to.
#[async_trait]
pub trait TelemetryPublisher: Send + Sync + 'static {
    /// Hands `payload` to the transport. `expiry` is a hint: the broker may
    /// drop the message once it is older than that.
    async fn publish(&self, topic: &str, payload: Vec<u8>, expiry: Duration) -> Result<()>;
}

/// Exponential reconnect delay, reset once the broker acknowledges a
/// connection.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(30))
    }
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max, current: initial }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

pub fn mqtt_options(conf: &MqttConf) -> MqttOptions {
    let mut opts = MqttOptions::new(conf.client_id.clone(), conf.host.clone(), conf.port);
    opts.set_keep_alive(Duration::from_secs(conf.keep_alive_secs.max(5)));
    opts.set_clean_start(true);
    opts
}

#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
}

impl MqttPublisher {
    /// Creates the client and spawns the task driving its event loop.
    pub fn connect(conf: &MqttConf, health: HealthTracker) -> (Self, JoinHandle<()>) {
        let (client, eventloop) = AsyncClient::new(mqtt_options(conf), 64);
        info!("connecting to MQTT broker {}:{}", conf.host, conf.port);
        let handle = tokio::spawn(drive_event_loop(eventloop, health));
        (Self { client }, handle)
    }

    pub async fn disconnect(&self) {
        if let Err(e) = self.client.disconnect().await {
            debug!("MQTT disconnect: {e:?}");
        }
    }
}

#[async_trait]
impl TelemetryPublisher for MqttPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>, expiry: Duration) -> Result<()> {
        let properties = PublishProperties {
            message_expiry_interval: Some(u32::try_from(expiry.as_secs()).unwrap_or(u32::MAX)),
            content_type: Some("application/json".to_string()),
            ..Default::default()
        };
        self.client
            .publish_with_properties(topic, QoS::AtLeastOnce, false, payload, properties)
            .await
            .map_err(|e| TelematicsError::Publish(e.to_string()))
    }
}

async fn drive_event_loop(mut eventloop: EventLoop, health: HealthTracker) {
    let mut backoff = Backoff::default();
    let mut was_connected = false;
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("MQTT connected");
                health.mark_mqtt_connected();
                backoff.reset();
                was_connected = true;
            }
            Ok(_) => {}
            Err(e) => {
                let lost = TelematicsError::BrokerConnectionLost(e.to_string());
                if was_connected {
                    health.increment_reconnects();
                    was_connected = false;
                } else {
                    health.mark_mqtt_disconnected();
                }
                let delay = backoff.next_delay();
                warn!("{lost}, retrying in {delay:?}");
                tokio::time::sleep(delay).await;
            }
        }
    }
}
