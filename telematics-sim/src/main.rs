/**
 * TELEMATICS SIMULATOR - process entry point
 *
 * ROLE: bootstrap config, fleet roster, seeded vehicle states, MQTT publisher,
 * publish loop and the query API, then run until Ctrl-C.
 *
 * FLOW: tick -> generator -> cache + publish(telematics/data, expiry hint).
 */

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use telematics_sim::broker::MqttPublisher;
use telematics_sim::config::load_config;
use telematics_sim::health::HealthTracker;
use telematics_sim::http::{build_router, AppState};
use telematics_sim::publish_loop::{PublishLoop, PublishSettings};
use telematics_sim::{LatestReadingCache, StateStore, TelemetryGenerator, VehicleRegistry};
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
    info!(
        "simulating {} vehicles every {}ms on '{}'",
        cfg.vehicle_count, cfg.tick_period_ms, cfg.topic
    );

    // roster and seed states are built once, before anything runs
    let (registry, store) = {
        let mut rng = rand::thread_rng();
        let registry = VehicleRegistry::generate(cfg.vehicle_count, &mut rng);
        let store = StateStore::seed(&registry, &cfg.geofence, &mut rng);
        (registry, store)
    };
    store
        .verify_covers(&registry)
        .context("vehicle roster and state store disagree")?;
    let registry = Arc::new(registry);

    let health = HealthTracker::new();
    let cache = LatestReadingCache::new();
    let (publisher, mqtt_task) = MqttPublisher::connect(&cfg.mqtt, health.clone());
    let publisher = Arc::new(publisher);

    let publish_loop = PublishLoop::new(
        registry.clone(),
        TelemetryGenerator::new(store, cfg.geofence),
        cache.clone(),
        publisher.clone(),
        health.clone(),
        PublishSettings {
            topic: cfg.topic.clone(),
            period: cfg.tick_period(),
            expiry: cfg.message_expiry(),
            publish_timeout: cfg.publish_timeout(),
        },
    );

    let app = build_router(AppState { cache, registry, health });
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    info!("query API listening on http://{addr}");

    tokio::select! {
        _ = publish_loop.run() => {}
        served = axum::serve(listener, app) => {
            if let Err(e) = served {
                error!("HTTP server stopped: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }

    publisher.disconnect().await;
    mqtt_task.abort();
    Ok(())
}
