use crate::broker::TelemetryPublisher;
use crate::cache::LatestReadingCache;
use crate::error::TelematicsError;
use crate::generator::TelemetryGenerator;
use crate::health::HealthTracker;
use crate::registry::VehicleRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, warn};

#[derive(Debug, Clone)]
pub struct PublishSettings {
    pub topic: String,
    pub period: Duration,
    pub expiry: Duration,
    pub publish_timeout: Duration,
}

/// Outcome of one period across the whole fleet.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub produced: usize,
    pub published: usize,
    pub failed: usize,
}

/// Drives the generator on a fixed cadence, refreshes the cache and hands
/// every reading to the broker.
pub struct PublishLoop<P: TelemetryPublisher> {
    registry: Arc<VehicleRegistry>,
    generator: TelemetryGenerator,
    cache: LatestReadingCache,
    publisher: Arc<P>,
    health: HealthTracker,
    settings: PublishSettings,
}

impl<P: TelemetryPublisher> PublishLoop<P> {
    pub fn new(
        registry: Arc<VehicleRegistry>,
        generator: TelemetryGenerator,
        cache: LatestReadingCache,
        publisher: Arc<P>,
        health: HealthTracker,
        settings: PublishSettings,
    ) -> Self {
        Self { registry, generator, cache, publisher, health, settings }
    }

    pub fn generator(&self) -> &TelemetryGenerator {
        &self.generator
    }

    /// Runs until the task is dropped.
    pub async fn run(mut self) {
        let mut ticker = interval(self.settings.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let report = self.run_once().await;
            debug!(
                "tick: produced={} published={} failed={}",
                report.produced, report.published, report.failed
            );
        }
    }

    /// One period. Every vehicle is ticked and cached first; publishes run
    /// concurrently, each bounded by the publish timeout, so a stalled
    /// broker call never holds back another vehicle.
    pub async fn run_once(&mut self) -> TickReport {
        let mut report = TickReport::default();
        let mut pending = Vec::with_capacity(self.registry.len());

        for vehicle in self.registry.list() {
            let reading = match self.generator.tick(vehicle) {
                Ok(reading) => Arc::new(reading),
                Err(e) => {
                    error!("tick skipped: {e}");
                    report.failed += 1;
                    continue;
                }
            };
            self.cache.update(Arc::clone(&reading));
            report.produced += 1;

            let payload = match serde_json::to_vec(&*reading) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("cannot encode reading for {}: {e}", vehicle.vehicle_id);
                    report.failed += 1;
                    continue;
                }
            };

            let publisher = Arc::clone(&self.publisher);
            let topic = self.settings.topic.clone();
            let expiry = self.settings.expiry;
            let limit = self.settings.publish_timeout;
            let vehicle_id = vehicle.vehicle_id.clone();
            pending.push(tokio::spawn(async move {
                let outcome = match timeout(limit, publisher.publish(&topic, payload, expiry)).await {
                    Ok(result) => result,
                    Err(_) => Err(TelematicsError::Publish(format!("timed out after {limit:?}"))),
                };
                (vehicle_id, outcome)
            }));
        }

        for handle in pending {
            match handle.await {
                Ok((vehicle_id, Ok(()))) => {
                    debug!("published reading for {vehicle_id} to {}", self.settings.topic);
                    report.published += 1;
                }
                Ok((vehicle_id, Err(e))) => {
                    warn!("{vehicle_id}: {e}");
                    report.failed += 1;
                }
                Err(e) => {
                    warn!("publish task aborted: {e}");
                    report.failed += 1;
                }
            }
        }

        self.health.record_published(report.published as u64);
        self.health.record_failures(report.failed as u64);
        report
    }
}
