/*!
Test harness for the simulator and relay.

Wires a small deterministic fleet to a `PublishLoop` over a `MockBroker`, so
tests can run whole periods and assert on what reached the cache and the
broker.
*/

use crate::mock_broker::MockBroker;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use telematics_sim::config::{Geofence, DEFAULT_TOPIC};
use telematics_sim::health::HealthTracker;
use telematics_sim::models::{
    Driver, Engine, Location, Odometer, Reading, TirePressure, Vehicle, VehicleStatus, VehicleType,
};
use telematics_sim::publish_loop::{PublishLoop, PublishSettings, TickReport};
use telematics_sim::{LatestReadingCache, StateStore, TelemetryGenerator, VehicleRegistry};

pub const TEST_EXPIRY: Duration = Duration::from_secs(60);

pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Roster `vehicle-01..` with the given powertrains, in order.
pub fn fixed_registry(types: &[VehicleType]) -> VehicleRegistry {
    let vehicles = types
        .iter()
        .enumerate()
        .map(|(i, vehicle_type)| Vehicle {
            vehicle_id: format!("vehicle-{:02}", i + 1),
            vin: format!("VIN-{}", 10_001 + i),
            driver_id: format!("driver-{:02}", i + 1),
            vehicle_type: *vehicle_type,
        })
        .collect();
    VehicleRegistry::from_vehicles(vehicles)
}

/// A plausible, alert-free reading for `vehicle_id`.
pub fn sample_reading(vehicle_id: &str, vehicle_type: VehicleType) -> Reading {
    let (rpm, fuel_level, battery_level) = match vehicle_type {
        VehicleType::FuelPowered => (Some(1800), Some(64.5), None),
        VehicleType::Electric => (None, None, Some(71.0)),
    };
    Reading {
        vehicle_id: vehicle_id.to_string(),
        vin: "VIN-10001".into(),
        vehicle_type,
        timestamp: "2025-01-01T08:00:00Z".into(),
        location: Location { latitude: 48.8566, longitude: 2.3522, altitude: 35, heading: 180, speed: 48.2 },
        driver: Driver {
            driver_id: "driver-01".into(),
            name: "Driver 01".into(),
            hours_of_service: 3.4,
            violations: vec![],
        },
        engine: Engine {
            rpm,
            load: 42.0,
            fuel_level,
            battery_level,
            coolant_temperature: 88.5,
            battery_voltage: 13.2,
        },
        odometer: Odometer { total_km: 54_321.0, trip_km: 12.3 },
        tire_pressure: TirePressure::uniform(33.0),
        alerts: vec![],
        status: VehicleStatus { ignition: true, engine_on: true, moving: true },
    }
}

pub struct TestHarness {
    pub broker: MockBroker,
    pub registry: Arc<VehicleRegistry>,
    pub cache: LatestReadingCache,
    pub health: HealthTracker,
    pub publish_loop: PublishLoop<MockBroker>,
}

impl TestHarness {
    pub fn new(types: &[VehicleType]) -> Self {
        Self::with_broker(types, MockBroker::new(), Duration::from_millis(200))
    }

    pub fn with_broker(types: &[VehicleType], broker: MockBroker, publish_timeout: Duration) -> Self {
        init_test_logging();
        let registry = Arc::new(fixed_registry(types));
        let geofence = Geofence::default();
        let store = StateStore::seed(&registry, &geofence, &mut StdRng::seed_from_u64(2024));
        let cache = LatestReadingCache::new();
        let health = HealthTracker::new();
        let publish_loop = PublishLoop::new(
            registry.clone(),
            TelemetryGenerator::new(store, geofence),
            cache.clone(),
            Arc::new(broker.clone()),
            health.clone(),
            PublishSettings {
                topic: DEFAULT_TOPIC.to_string(),
                period: Duration::from_millis(50),
                expiry: TEST_EXPIRY,
                publish_timeout,
            },
        );
        Self { broker, registry, cache, health, publish_loop }
    }

    pub async fn tick(&mut self) -> TickReport {
        self.publish_loop.run_once().await
    }
}
