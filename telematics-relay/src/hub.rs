//! Fan-out of decoded readings to connected push clients.
//!
//! Clients only see events broadcast after they connect; there is no
//! backfill. Broadcasting never waits on a client: each client owns a
//! receiver on a bounded broadcast channel, and one that falls behind by
//! more than the buffer skips the missed events.

use axum::extract::ws::Utf8Bytes;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;
use telematics_sim::models::Reading;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

pub const VEHICLE_DATA_EVENT: &str = "vehicle_data";

/// Frame pushed to clients: `{"event": "vehicle_data", "data": <reading>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushEvent {
    pub event: String,
    pub data: Reading,
}

impl PushEvent {
    pub fn vehicle_data(reading: Reading) -> Self {
        Self { event: VEHICLE_DATA_EVENT.to_string(), data: reading }
    }
}

/// A push event together with its wire text, encoded once per broadcast
/// and shared by every client.
#[derive(Debug)]
pub struct OutboundFrame {
    payload: PushEvent,
    text: Utf8Bytes,
}

impl OutboundFrame {
    pub fn encode(payload: PushEvent) -> serde_json::Result<Self> {
        let text = serde_json::to_string(&payload)?;
        Ok(Self { payload, text: text.into() })
    }

    pub fn text(&self) -> &Utf8Bytes {
        &self.text
    }
}

impl Deref for OutboundFrame {
    type Target = PushEvent;

    fn deref(&self) -> &PushEvent {
        &self.payload
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientInfo {
    pub client_id: String,
    pub connected_at: String,
}

/// Handle returned to a newly connected client.
pub struct ClientSubscription {
    pub id: Uuid,
    pub receiver: broadcast::Receiver<Arc<OutboundFrame>>,
}

#[derive(Clone)]
pub struct ClientHub {
    sender: broadcast::Sender<Arc<OutboundFrame>>,
    clients: Arc<RwLock<HashMap<Uuid, ClientInfo>>>,
}

impl ClientHub {
    /// `buffer` is how many events a client may lag behind before skipping.
    pub fn new(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer.max(1));
        Self { sender, clients: Arc::new(RwLock::new(HashMap::new())) }
    }

    pub fn connect(&self) -> ClientSubscription {
        let id = Uuid::new_v4();
        let receiver = self.sender.subscribe();
        let info = ClientInfo {
            client_id: id.to_string(),
            connected_at: OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
        };
        self.clients.write().insert(id, info);
        ClientSubscription { id, receiver }
    }

    /// Forgets the client; its receiver is released when the subscription
    /// is dropped.
    pub fn disconnect(&self, id: Uuid) -> bool {
        self.clients.write().remove(&id).is_some()
    }

    pub fn connected_clients(&self) -> usize {
        self.clients.read().len()
    }

    pub fn clients(&self) -> Vec<ClientInfo> {
        self.clients.read().values().cloned().collect()
    }

    /// Live broadcast receivers; drops to zero once every client task has
    /// released its subscription.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Pushes `reading` to every live receiver, returning how many were
    /// reached. Zero clients is not an error.
    pub fn broadcast(&self, reading: Reading) -> usize {
        match OutboundFrame::encode(PushEvent::vehicle_data(reading)) {
            Ok(frame) => self.sender.send(Arc::new(frame)).unwrap_or(0),
            Err(e) => {
                warn!("cannot encode push event: {e}");
                0
            }
        }
    }
}
