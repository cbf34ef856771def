use crate::error::{Result, TelematicsError};
use crate::models::Reading;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Most recent reading per vehicle. Readings are immutable and swapped per
/// key, so a reader sees either the previous or the new one, never a mix.
#[derive(Debug, Clone, Default)]
pub struct LatestReadingCache {
    readings: Arc<RwLock<HashMap<String, Arc<Reading>>>>,
}

impl LatestReadingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, reading: Arc<Reading>) {
        self.readings.write().insert(reading.vehicle_id.clone(), reading);
    }

    pub fn get(&self, vehicle_id: &str) -> Result<Arc<Reading>> {
        self.readings
            .read()
            .get(vehicle_id)
            .cloned()
            .ok_or_else(|| TelematicsError::NotFound(vehicle_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.readings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Geofence;
    use crate::generator::TelemetryGenerator;
    use crate::registry::VehicleRegistry;
    use crate::state::StateStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn unknown_vehicle_is_not_found() {
        let cache = LatestReadingCache::new();
        assert!(matches!(cache.get("vehicle-01"), Err(TelematicsError::NotFound(id)) if id == "vehicle-01"));
    }

    #[test]
    fn update_replaces_previous_reading() {
        let mut rng = StdRng::seed_from_u64(12);
        let registry = VehicleRegistry::generate(1, &mut rng);
        let store = StateStore::seed(&registry, &Geofence::default(), &mut rng);
        let mut generator = TelemetryGenerator::new(store, Geofence::default());
        let vehicle = &registry.list()[0];
        let cache = LatestReadingCache::new();

        let first = Arc::new(generator.tick(vehicle).unwrap());
        cache.update(first.clone());
        assert_eq!(cache.get("vehicle-01").unwrap().vehicle_id, "vehicle-01");

        let second = Arc::new(generator.tick(vehicle).unwrap());
        cache.update(second.clone());
        assert_eq!(cache.len(), 1);
        assert_eq!(*cache.get("vehicle-01").unwrap(), *second);

        // holders of the old snapshot keep it intact
        assert_eq!(first.vehicle_id, "vehicle-01");
    }

    #[test]
    fn concurrent_readers_see_whole_readings() {
        let mut rng = StdRng::seed_from_u64(99);
        let registry = VehicleRegistry::generate(1, &mut rng);
        let store = StateStore::seed(&registry, &Geofence::default(), &mut rng);
        let mut generator = TelemetryGenerator::new(store, Geofence::default());
        let vehicle = registry.list()[0].clone();
        let cache = LatestReadingCache::new();
        cache.update(Arc::new(generator.tick(&vehicle).unwrap()));

        let reader = {
            let cache = cache.clone();
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    let r = cache.get("vehicle-01").unwrap();
                    assert_eq!(r.vehicle_id, "vehicle-01");
                    assert_eq!(r.engine.rpm.is_some(), r.engine.fuel_level.is_some());
                }
            })
        };
        for _ in 0..1000 {
            cache.update(Arc::new(generator.tick(&vehicle).unwrap()));
        }
        reader.join().unwrap();
    }
}
