use anyhow::{Context, Result};
use std::net::SocketAddr;
use telematics_relay::config::load_config;
use telematics_relay::http::{build_router, RelayState};
use telematics_relay::mqtt::{run_bridge, MqttSubscriber};
use telematics_relay::{ClientHub, RelayBridge};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = load_config().await;
    let bridge = RelayBridge::new(cfg.topic.clone(), ClientHub::new(cfg.client_buffer));

    info!("relaying '{}' from {}:{}", cfg.topic, cfg.mqtt.host, cfg.mqtt.port);
    let (subscriber, eventloop) = MqttSubscriber::new(&cfg.mqtt);

    let app = build_router(RelayState { bridge: bridge.clone() });
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    info!("dashboard on http://{addr}, push channel on ws://{addr}/ws");

    tokio::select! {
        _ = run_bridge(bridge, &subscriber, eventloop) => {}
        served = axum::serve(listener, app) => {
            if let Err(e) = served {
                error!("HTTP server stopped: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }

    subscriber.disconnect().await;
    Ok(())
}
