/*!
In-memory broker for tests without a running MQTT server.

Records every publish (topic, payload, expiry hint) and every subscription.
Publishes for selected vehicles can be made to fail or to hang, to exercise
the publish loop's isolation between vehicles.
*/

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use telematics_relay::TopicSubscriber;
use telematics_sim::broker::TelemetryPublisher;
use telematics_sim::error::{Result, TelematicsError};
use telematics_sim::models::Reading;

#[derive(Debug, Clone)]
pub struct MockMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub expiry: Duration,
}

impl MockMessage {
    pub fn reading(&self) -> serde_json::Result<Reading> {
        serde_json::from_slice(&self.payload)
    }
}

#[derive(Clone, Default)]
pub struct MockBroker {
    published: Arc<Mutex<Vec<MockMessage>>>,
    subscriptions: Arc<Mutex<Vec<String>>>,
    failing_vehicles: Arc<Mutex<HashSet<String>>>,
    stalled_vehicles: Arc<Mutex<HashSet<String>>>,
    reject_subscribe: Arc<Mutex<bool>>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes carrying this vehicle's reading fail with `PublishError`.
    pub fn fail_for(&self, vehicle_id: &str) {
        self.failing_vehicles.lock().unwrap().insert(vehicle_id.to_string());
    }

    /// Publishes carrying this vehicle's reading never complete.
    pub fn stall_for(&self, vehicle_id: &str) {
        self.stalled_vehicles.lock().unwrap().insert(vehicle_id.to_string());
    }

    pub fn reject_subscriptions(&self, reject: bool) {
        *self.reject_subscribe.lock().unwrap() = reject;
    }

    pub fn get_published_messages(&self) -> Vec<MockMessage> {
        self.published.lock().unwrap().clone()
    }

    pub fn get_subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().unwrap().clone()
    }

    pub fn find_messages_by_topic(&self, topic: &str) -> Vec<MockMessage> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|msg| msg.topic == topic)
            .cloned()
            .collect()
    }

    /// Vehicle ids of every successfully published reading, in publish order.
    pub fn published_vehicle_ids(&self) -> Vec<String> {
        self.get_published_messages()
            .iter()
            .filter_map(|msg| msg.reading().ok())
            .map(|reading| reading.vehicle_id)
            .collect()
    }

    pub fn clear(&self) {
        self.published.lock().unwrap().clear();
        self.subscriptions.lock().unwrap().clear();
    }

    fn vehicle_of(payload: &[u8]) -> Option<String> {
        let value: serde_json::Value = serde_json::from_slice(payload).ok()?;
        value.get("vehicle_id")?.as_str().map(str::to_string)
    }
}

#[async_trait]
impl TelemetryPublisher for MockBroker {
    async fn publish(&self, topic: &str, payload: Vec<u8>, expiry: Duration) -> Result<()> {
        let vehicle = Self::vehicle_of(&payload).unwrap_or_default();
        let stalled = self.stalled_vehicles.lock().unwrap().contains(&vehicle);
        if stalled {
            std::future::pending::<()>().await;
        }
        let failing = self.failing_vehicles.lock().unwrap().contains(&vehicle);
        if failing {
            return Err(TelematicsError::Publish(format!("broker refused {vehicle}")));
        }

        self.published.lock().unwrap().push(MockMessage { topic: topic.to_string(), payload, expiry });
        tracing::debug!("[mock] published to {topic}");
        Ok(())
    }
}

#[async_trait]
impl TopicSubscriber for MockBroker {
    async fn subscribe(&self, topic: &str) -> Result<()> {
        let reject = *self.reject_subscribe.lock().unwrap();
        if reject {
            return Err(TelematicsError::BrokerConnectionLost("subscribe rejected".into()));
        }
        self.subscriptions.lock().unwrap().push(topic.to_string());
        tracing::debug!("[mock] subscribed to {topic}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_reading;
    use telematics_sim::models::VehicleType;

    #[tokio::test]
    async fn records_publishes_with_expiry() {
        let broker = MockBroker::new();
        let payload = serde_json::to_vec(&sample_reading("vehicle-01", VehicleType::Electric)).unwrap();
        broker.publish("telematics/data", payload, Duration::from_secs(60)).await.unwrap();

        let messages = broker.find_messages_by_topic("telematics/data");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].expiry, Duration::from_secs(60));
        assert_eq!(broker.published_vehicle_ids(), vec!["vehicle-01"]);
    }

    #[tokio::test]
    async fn failing_vehicle_is_refused() {
        let broker = MockBroker::new();
        broker.fail_for("vehicle-02");
        let payload = serde_json::to_vec(&sample_reading("vehicle-02", VehicleType::FuelPowered)).unwrap();
        let result = broker.publish("telematics/data", payload, Duration::from_secs(60)).await;
        assert!(matches!(result, Err(TelematicsError::Publish(_))));
        assert!(broker.get_published_messages().is_empty());
    }

    #[tokio::test]
    async fn records_subscriptions() {
        let broker = MockBroker::new();
        broker.subscribe("telematics/data").await.unwrap();
        assert_eq!(broker.get_subscriptions(), vec!["telematics/data"]);

        broker.reject_subscriptions(true);
        assert!(broker.subscribe("telematics/data").await.is_err());
    }
}
