/**
 * RELAY BRIDGE - broker topic -> push clients
 *
 * ROLE: reacts to the broker client's lifecycle callbacks (connecting,
 * connected, lost) and to inbound messages. Each message is decoded as a
 * reading and fanned out through the client hub; undecodable messages are
 * logged and dropped without touching the rest of the stream.
 *
 * STATES: Disconnected -> Connecting -> Subscribed -> Disconnected -> ...
 * Retry timing belongs to the broker driver, not to the bridge.
 */

use crate::hub::ClientHub;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use telematics_sim::error::{Result, TelematicsError};
use telematics_sim::models::Reading;
use tracing::{debug, info, warn};

/// Transport able to subscribe the bridge to its topic.
#[async_trait]
pub trait TopicSubscriber: Send + Sync {
    async fn subscribe(&self, topic: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeState {
    Disconnected,
    Connecting,
    Subscribed,
}

#[derive(Debug, Default)]
pub struct RelayStats {
    relayed: AtomicU64,
    decode_failures: AtomicU64,
    reconnects: AtomicU32,
}

#[derive(Debug, Serialize)]
pub struct RelayHealth {
    pub state: BridgeState,
    pub clients: usize,
    pub relayed: u64,
    pub decode_failures: u64,
    pub reconnects: u32,
}

#[derive(Clone)]
pub struct RelayBridge {
    topic: String,
    hub: ClientHub,
    state: Arc<Mutex<BridgeState>>,
    stats: Arc<RelayStats>,
}

impl RelayBridge {
    pub fn new(topic: impl Into<String>, hub: ClientHub) -> Self {
        Self {
            topic: topic.into(),
            hub,
            state: Arc::new(Mutex::new(BridgeState::Disconnected)),
            stats: Arc::new(RelayStats::default()),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn hub(&self) -> &ClientHub {
        &self.hub
    }

    pub fn state(&self) -> BridgeState {
        *self.state.lock()
    }

    pub fn on_connecting(&self) {
        *self.state.lock() = BridgeState::Connecting;
    }

    /// Broker acknowledged the connection: (re)subscribe to the topic.
    /// The state only becomes `Subscribed` once the subscribe request went
    /// through.
    pub async fn on_connected<S>(&self, subscriber: &S) -> Result<()>
    where
        S: TopicSubscriber + ?Sized,
    {
        if let Err(e) = subscriber.subscribe(&self.topic).await {
            warn!("subscribe to {} failed: {e}", self.topic);
            *self.state.lock() = BridgeState::Disconnected;
            return Err(e);
        }
        info!("subscribed to {}", self.topic);
        *self.state.lock() = BridgeState::Subscribed;
        Ok(())
    }

    pub fn on_connection_lost(&self, error: &TelematicsError) {
        let mut state = self.state.lock();
        if *state == BridgeState::Subscribed {
            self.stats.reconnects.fetch_add(1, Ordering::Relaxed);
        }
        *state = BridgeState::Disconnected;
        warn!("{error}");
    }

    /// Decodes one broker payload and broadcasts it. Returns the number of
    /// clients reached; a decode failure is logged, counted and returned.
    pub fn on_message(&self, payload: &[u8]) -> Result<usize> {
        let reading: Reading = match serde_json::from_slice(payload) {
            Ok(reading) => reading,
            Err(e) => {
                self.stats.decode_failures.fetch_add(1, Ordering::Relaxed);
                let error = TelematicsError::Decode(e);
                warn!("dropping message on {}: {error}", self.topic);
                return Err(error);
            }
        };
        let vehicle_id = reading.vehicle_id.clone();
        let reached = self.hub.broadcast(reading);
        self.stats.relayed.fetch_add(1, Ordering::Relaxed);
        debug!("relayed {vehicle_id} to {reached} client(s)");
        Ok(reached)
    }

    pub fn health(&self) -> RelayHealth {
        RelayHealth {
            state: self.state(),
            clients: self.hub.connected_clients(),
            relayed: self.stats.relayed.load(Ordering::Relaxed),
            decode_failures: self.stats.decode_failures.load(Ordering::Relaxed),
            reconnects: self.stats.reconnects.load(Ordering::Relaxed),
        }
    }
}
