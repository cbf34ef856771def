use std::time::Duration;
use telematics_devkit::{MockBroker, TestHarness};
use telematics_sim::models::VehicleType;
use telematics_sim::TelematicsError;

const FLEET: [VehicleType; 3] = [VehicleType::FuelPowered, VehicleType::Electric, VehicleType::FuelPowered];

#[tokio::test]
async fn one_period_reaches_cache_and_broker() {
    let mut harness = TestHarness::new(&FLEET);
    assert!(matches!(harness.cache.get("vehicle-01"), Err(TelematicsError::NotFound(_))));

    let report = harness.tick().await;
    assert_eq!(report.produced, 3);
    assert_eq!(report.published, 3);
    assert_eq!(report.failed, 0);

    assert_eq!(harness.cache.len(), 3);
    for id in ["vehicle-01", "vehicle-02", "vehicle-03"] {
        assert_eq!(harness.cache.get(id).unwrap().vehicle_id, id);
    }

    let messages = harness.broker.find_messages_by_topic("telematics/data");
    assert_eq!(messages.len(), 3);
    assert!(messages.iter().all(|m| m.expiry == Duration::from_secs(60)));

    let mut ids = harness.broker.published_vehicle_ids();
    ids.sort();
    assert_eq!(ids, ["vehicle-01", "vehicle-02", "vehicle-03"]);
}

#[tokio::test]
async fn published_payload_matches_cached_reading() {
    let mut harness = TestHarness::new(&[VehicleType::Electric]);
    harness.tick().await;

    let published = harness.broker.get_published_messages()[0].reading().unwrap();
    let cached = harness.cache.get("vehicle-01").unwrap();
    assert_eq!(published.vehicle_id, cached.vehicle_id);
    assert_eq!(published.timestamp, cached.timestamp);
    assert_eq!(published.odometer.total_km, cached.odometer.total_km);
    assert_eq!(published.vehicle_type, VehicleType::Electric);
    assert!(published.engine.rpm.is_none());
}

#[tokio::test]
async fn failed_publish_does_not_stop_other_vehicles() {
    let broker = MockBroker::new();
    broker.fail_for("vehicle-02");
    let mut harness = TestHarness::with_broker(&FLEET, broker, Duration::from_millis(200));

    let report = harness.tick().await;
    assert_eq!(report.produced, 3);
    assert_eq!(report.published, 2);
    assert_eq!(report.failed, 1);

    // the reading is still cached even though the broker refused it
    assert!(harness.cache.get("vehicle-02").is_ok());
    let mut ids = harness.broker.published_vehicle_ids();
    ids.sort();
    assert_eq!(ids, ["vehicle-01", "vehicle-03"]);

    // next period keeps going
    let report = harness.tick().await;
    assert_eq!(report.published, 2);
}

#[tokio::test]
async fn stalled_publish_is_bounded_by_timeout() {
    let broker = MockBroker::new();
    broker.stall_for("vehicle-01");
    let mut harness = TestHarness::with_broker(&FLEET, broker, Duration::from_millis(100));

    let started = std::time::Instant::now();
    let report = harness.tick().await;
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(report.published, 2);
    assert_eq!(report.failed, 1);
}

#[tokio::test]
async fn health_counts_publish_outcomes() {
    let broker = MockBroker::new();
    broker.fail_for("vehicle-03");
    let mut harness = TestHarness::with_broker(&FLEET, broker, Duration::from_millis(200));
    harness.tick().await;
    harness.tick().await;

    let health = harness.health.get_health(&harness.registry, &harness.cache);
    assert_eq!(health.readings_published, 4);
    assert_eq!(health.publish_failures, 2);
    assert_eq!(health.readings_cached, 3);
}

#[tokio::test]
async fn levels_and_odometers_hold_across_periods() {
    let mut harness = TestHarness::new(&FLEET);
    harness.tick().await;
    let first: Vec<_> = ["vehicle-01", "vehicle-02", "vehicle-03"]
        .iter()
        .map(|id| harness.cache.get(id).unwrap())
        .collect();

    for _ in 0..20 {
        harness.tick().await;
    }

    for before in first {
        let after = harness.cache.get(&before.vehicle_id).unwrap();
        assert!(after.odometer.total_km >= before.odometer.total_km);
        assert!(after.odometer.trip_km >= before.odometer.trip_km);
        if let (Some(a), Some(b)) = (after.engine.fuel_level, before.engine.fuel_level) {
            assert!(a <= b);
        }
        if let (Some(a), Some(b)) = (after.engine.battery_level, before.engine.battery_level) {
            assert!(a <= b);
        }
    }
}
