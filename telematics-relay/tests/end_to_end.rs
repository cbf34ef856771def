//! Simulator publishes into the mock broker; the relay bridge consumes the
//! recorded payloads and fans them out to a connected client.

use telematics_devkit::TestHarness;
use telematics_relay::{ClientHub, RelayBridge};
use telematics_sim::models::VehicleType;

#[tokio::test]
async fn readings_flow_from_publish_loop_to_client() {
    let mut harness = TestHarness::new(&[VehicleType::Electric, VehicleType::FuelPowered, VehicleType::Electric]);
    let bridge = RelayBridge::new("telematics/data", ClientHub::new(16));
    bridge.on_connecting();
    bridge.on_connected(&harness.broker).await.unwrap();
    let mut client = bridge.hub().connect();

    let report = harness.tick().await;
    assert_eq!(report.published, 3);

    for message in harness.broker.find_messages_by_topic(bridge.topic()) {
        assert_eq!(bridge.on_message(&message.payload).unwrap(), 1);
    }

    let mut received = Vec::new();
    for _ in 0..3 {
        let event = client.receiver.recv().await.unwrap();
        let cached = harness.cache.get(&event.data.vehicle_id).unwrap();
        assert_eq!(cached.timestamp, event.data.timestamp);
        assert_eq!(cached.vehicle_type, event.data.vehicle_type);
        received.push(event.data.vehicle_id.clone());
    }
    received.sort();
    assert_eq!(received, ["vehicle-01", "vehicle-02", "vehicle-03"]);
}
