use crate::bridge::{BridgeState, RelayBridge, TopicSubscriber};
use async_trait::async_trait;
use rumqttc::v5::mqttbytes::v5::Packet;
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{AsyncClient, ConnectionError, Event, EventLoop};
use std::time::Duration;
use telematics_sim::broker::{mqtt_options, Backoff};
use telematics_sim::config::MqttConf;
use telematics_sim::error::{Result, TelematicsError};
use tracing::{debug, info};

/// Broker client owned by the relay, with an explicit lifecycle.
pub struct MqttSubscriber {
    client: AsyncClient,
}

#[async_trait]
impl TopicSubscriber for MqttSubscriber {
    async fn subscribe(&self, topic: &str) -> Result<()> {
        self.client
            .subscribe(topic, QoS::AtLeastOnce)
            .await
            .map_err(|e| TelematicsError::BrokerConnectionLost(e.to_string()))
    }
}

impl MqttSubscriber {
    pub fn new(conf: &MqttConf) -> (Self, EventLoop) {
        let (client, eventloop) = AsyncClient::new(mqtt_options(conf), 64);
        (Self { client }, eventloop)
    }

    pub async fn disconnect(&self) {
        if let Err(e) = self.client.disconnect().await {
            debug!("MQTT disconnect: {e:?}");
        }
    }
}

/// Translates broker events into bridge callbacks.
///
/// A subscribe that fails on a live connection is retried on every later
/// event until it succeeds, so the bridge never sits unsubscribed on a
/// healthy link.
pub struct EventDispatcher<'a, S: TopicSubscriber + ?Sized> {
    bridge: &'a RelayBridge,
    subscriber: &'a S,
    backoff: Backoff,
    connected: bool,
}

impl<'a, S: TopicSubscriber + ?Sized> EventDispatcher<'a, S> {
    pub fn new(bridge: &'a RelayBridge, subscriber: &'a S) -> Self {
        Self::with_backoff(bridge, subscriber, Backoff::default())
    }

    pub fn with_backoff(bridge: &'a RelayBridge, subscriber: &'a S, backoff: Backoff) -> Self {
        Self { bridge, subscriber, backoff, connected: false }
    }

    /// Handles one poll result. Returns the delay to wait before polling
    /// again when the connection failed.
    pub async fn handle_event(
        &mut self,
        event: std::result::Result<Event, ConnectionError>,
    ) -> Option<Duration> {
        match event {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("MQTT connected");
                self.connected = true;
                self.backoff.reset();
                // failure already logged; retried on the next event
                let _ = self.bridge.on_connected(self.subscriber).await;
                return None;
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if publish.topic.as_ref() == self.bridge.topic().as_bytes() {
                    let _ = self.bridge.on_message(&publish.payload);
                } else {
                    debug!("ignoring message on unexpected topic");
                }
            }
            Ok(_) => {}
            Err(e) => {
                self.connected = false;
                self.bridge
                    .on_connection_lost(&TelematicsError::BrokerConnectionLost(e.to_string()));
                return Some(self.backoff.next_delay());
            }
        }

        if self.connected && self.bridge.state() == BridgeState::Disconnected {
            self.bridge.on_connecting();
            let _ = self.bridge.on_connected(self.subscriber).await;
        }
        None
    }
}

/// Polls the broker forever, feeding lifecycle callbacks and messages to
/// the bridge. Reconnection is rumqttc's; this loop only waits between
/// attempts.
pub async fn run_bridge(bridge: RelayBridge, subscriber: &MqttSubscriber, mut eventloop: EventLoop) {
    let mut dispatcher = EventDispatcher::new(&bridge, subscriber);
    bridge.on_connecting();
    loop {
        let event = eventloop.poll().await;
        if let Some(delay) = dispatcher.handle_event(event).await {
            tokio::time::sleep(delay).await;
            bridge.on_connecting();
        }
    }
}
