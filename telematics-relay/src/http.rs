//! Push channel and dashboard.
//!
//! `GET /ws` upgrades to a WebSocket that receives one text frame per
//! relayed reading: `{"event":"vehicle_data","data":{...}}`. Nothing is
//! expected from the client beyond connecting.

use crate::bridge::{RelayBridge, RelayHealth};
use crate::hub::{ClientHub, ClientSubscription};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::{Html, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

const DASHBOARD: &str = include_str!("../static/index.html");

#[derive(Clone)]
pub struct RelayState {
    pub bridge: RelayBridge,
}

pub fn build_router(state: RelayState) -> Router {
    Router::new()
        .route("/", get(|| async { Html(DASHBOARD) }))
        .route("/ws", get(ws_handler))
        .route("/health", get(get_health))
        .with_state(state)
}

async fn get_health(State(state): State<RelayState>) -> Json<RelayHealth> {
    Json(state.bridge.health())
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<RelayState>) -> Response {
    let hub = state.bridge.hub().clone();
    ws.on_upgrade(move |socket| serve_client(socket, hub))
}

async fn serve_client(socket: WebSocket, hub: ClientHub) {
    let ClientSubscription { id, mut receiver } = hub.connect();
    info!("client {id} connected ({} total)", hub.connected_clients());
    let (mut sink, mut stream) = socket.split();

    let mut send_task = tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(frame) => {
                    if sink.send(Message::Text(frame.text().clone())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!("client {id} lagging, skipped {skipped} readings"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            if let Message::Close(_) = message {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    hub.disconnect(id);
    debug!("client {id} disconnected");
}
