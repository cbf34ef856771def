use crate::cache::LatestReadingCache;
use crate::registry::VehicleRegistry;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Serialize, Deserialize)]
pub struct SimulatorHealth {
    pub uptime_seconds: u64,
    pub vehicles: u32,
    pub readings_cached: u32,
    pub readings_published: u64,
    pub publish_failures: u64,
    pub memory_usage_mb: f32,
    pub mqtt_status: String,
    pub mqtt_reconnects: u32,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    mqtt_reconnects: Arc<AtomicU32>,
    mqtt_status: Arc<Mutex<String>>,
    published: Arc<AtomicU64>,
    failures: Arc<AtomicU64>,
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            mqtt_reconnects: Arc::new(AtomicU32::new(0)),
            mqtt_status: Arc::new(Mutex::new("connecting".to_string())),
            published: Arc::new(AtomicU64::new(0)),
            failures: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn mark_mqtt_connected(&self) {
        *self.mqtt_status.lock() = "connected".to_string();
    }

    pub fn mark_mqtt_disconnected(&self) {
        *self.mqtt_status.lock() = "disconnected".to_string();
    }

    pub fn increment_reconnects(&self) {
        self.mqtt_reconnects.fetch_add(1, Ordering::Relaxed);
        *self.mqtt_status.lock() = "reconnecting".to_string();
    }

    pub fn record_published(&self, count: u64) {
        self.published.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_failures(&self, count: u64) {
        self.failures.fetch_add(count, Ordering::Relaxed);
    }

    pub fn mqtt_status(&self) -> String {
        self.mqtt_status.lock().clone()
    }

    pub fn get_health(&self, registry: &VehicleRegistry, cache: &LatestReadingCache) -> SimulatorHealth {
        SimulatorHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            vehicles: registry.len() as u32,
            readings_cached: cache.len() as u32,
            readings_published: self.published.load(Ordering::Relaxed),
            publish_failures: self.failures.load(Ordering::Relaxed),
            memory_usage_mb: get_memory_usage_mb(),
            mqtt_status: self.mqtt_status(),
            mqtt_reconnects: self.mqtt_reconnects.load(Ordering::Relaxed),
        }
    }
}

fn get_memory_usage_mb() -> f32 {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            let rss_kb = status
                .lines()
                .find(|line| line.starts_with("VmRSS:"))
                .and_then(|line| line.split_whitespace().nth(1))
                .and_then(|kb| kb.parse::<u64>().ok());
            if let Some(kb) = rss_kb {
                return kb as f32 / 1024.0;
            }
        }
    }

    0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn tracks_mqtt_transitions() {
        let health = HealthTracker::new();
        assert_eq!(health.mqtt_status(), "connecting");
        health.mark_mqtt_connected();
        assert_eq!(health.mqtt_status(), "connected");
        health.increment_reconnects();
        assert_eq!(health.mqtt_status(), "reconnecting");
        health.mark_mqtt_disconnected();
        assert_eq!(health.mqtt_status(), "disconnected");
    }

    #[test]
    fn snapshot_counts_fleet_and_publishes() {
        let health = HealthTracker::new();
        health.record_published(3);
        health.record_failures(1);
        health.increment_reconnects();

        let registry = VehicleRegistry::generate(3, &mut StdRng::seed_from_u64(1));
        let snapshot = health.get_health(&registry, &LatestReadingCache::new());
        assert_eq!(snapshot.vehicles, 3);
        assert_eq!(snapshot.readings_cached, 0);
        assert_eq!(snapshot.readings_published, 3);
        assert_eq!(snapshot.publish_failures, 1);
        assert_eq!(snapshot.mqtt_reconnects, 1);
    }
}
