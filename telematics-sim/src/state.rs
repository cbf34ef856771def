//! Mutable per-vehicle telemetry state advanced by the generator.

use crate::config::Geofence;
use crate::error::{Result, TelematicsError};
use crate::models::{TirePressure, Vehicle, VehicleType};
use crate::registry::VehicleRegistry;
use rand::Rng;
use std::collections::HashMap;
use std::time::Instant;

/// Closed interval every walked value is clamped into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

pub const SPEED_KMH: Bounds = Bounds::new(0.0, 120.0);
pub const LOAD_PCT: Bounds = Bounds::new(10.0, 100.0);
pub const COOLANT_C: Bounds = Bounds::new(70.0, 110.0);
pub const BATTERY_VOLTAGE: Bounds = Bounds::new(12.0, 14.0);
pub const TIRE_PSI: Bounds = Bounds::new(25.0, 36.0);
pub const LEVEL_PCT: Bounds = Bounds::new(0.0, 100.0);
pub const RPM_MIN: u32 = 800;
pub const RPM_MAX: u32 = 3000;

/// Type-specific part of the state. The variant is chosen from the
/// vehicle type at creation and never changes afterwards.
#[derive(Debug, Clone, PartialEq)]
pub enum Powertrain {
    Fuel { rpm: u32, fuel_level: f64 },
    Electric { battery_level: f64 },
}

impl Powertrain {
    pub fn vehicle_type(&self) -> VehicleType {
        match self {
            Powertrain::Fuel { .. } => VehicleType::FuelPowered,
            Powertrain::Electric { .. } => VehicleType::Electric,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VehicleState {
    pub latitude: f64,
    pub longitude: f64,
    pub speed: f64,
    pub load: f64,
    pub coolant_temperature: f64,
    pub battery_voltage: f64,
    pub tire_pressure: TirePressure,
    pub total_km: f64,
    pub trip_km: f64,
    pub powertrain: Powertrain,
    /// Wall-clock instant of the last advance, used for odometer distance.
    pub last_advanced: Instant,
}

impl VehicleState {
    /// Random valid seed state for `vehicle`.
    pub fn initialize<R: Rng>(vehicle: &Vehicle, geofence: &Geofence, rng: &mut R) -> Self {
        let (latitude, longitude) = geofence.sample(rng);
        let powertrain = match vehicle.vehicle_type {
            VehicleType::FuelPowered => Powertrain::Fuel {
                rpm: rng.gen_range(RPM_MIN..=RPM_MAX),
                fuel_level: round_to(rng.gen_range(5.0..100.0), 1),
            },
            VehicleType::Electric => Powertrain::Electric {
                battery_level: round_to(rng.gen_range(10.0..100.0), 1),
            },
        };
        let mut tire = || round_to(rng.gen_range(30.0..36.0), 1);
        let tire_pressure = TirePressure {
            front_left: tire(),
            front_right: tire(),
            rear_left: tire(),
            rear_right: tire(),
        };

        Self {
            latitude,
            longitude,
            speed: round_to(rng.gen_range(0.0..120.0), 2),
            load: round_to(rng.gen_range(10.0..100.0), 1),
            coolant_temperature: round_to(rng.gen_range(70.0..110.0), 1),
            battery_voltage: round_to(rng.gen_range(12.0..14.0), 2),
            tire_pressure,
            total_km: round_to(rng.gen_range(10_000.0..200_000.0), 1),
            trip_km: round_to(rng.gen_range(0.0..500.0), 1),
            powertrain,
            last_advanced: Instant::now(),
        }
    }

    pub fn vehicle_type(&self) -> VehicleType {
        self.powertrain.vehicle_type()
    }

    pub fn rpm(&self) -> Option<u32> {
        match self.powertrain {
            Powertrain::Fuel { rpm, .. } => Some(rpm),
            Powertrain::Electric { .. } => None,
        }
    }

    pub fn fuel_level(&self) -> Option<f64> {
        match self.powertrain {
            Powertrain::Fuel { fuel_level, .. } => Some(fuel_level),
            Powertrain::Electric { .. } => None,
        }
    }

    pub fn battery_level(&self) -> Option<f64> {
        match self.powertrain {
            Powertrain::Electric { battery_level } => Some(battery_level),
            Powertrain::Fuel { .. } => None,
        }
    }
}

/// One `VehicleState` per registered vehicle. Owned by the generator;
/// nothing else holds a mutable path to it.
#[derive(Debug, Default)]
pub struct StateStore {
    states: HashMap<String, VehicleState>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a state for every vehicle in the registry.
    pub fn seed<R: Rng>(registry: &VehicleRegistry, geofence: &Geofence, rng: &mut R) -> Self {
        let mut store = Self::new();
        for vehicle in registry.list() {
            store.initialize(vehicle, geofence, rng);
        }
        store
    }

    /// Creates (or replaces) the seed state for `vehicle`.
    pub fn initialize<R: Rng>(
        &mut self,
        vehicle: &Vehicle,
        geofence: &Geofence,
        rng: &mut R,
    ) -> &VehicleState {
        let state = VehicleState::initialize(vehicle, geofence, rng);
        self.states.insert(vehicle.vehicle_id.clone(), state);
        &self.states[&vehicle.vehicle_id]
    }

    /// Installs an explicit state, mainly for tests and replays.
    pub fn insert(&mut self, vehicle_id: impl Into<String>, state: VehicleState) {
        self.states.insert(vehicle_id.into(), state);
    }

    pub fn get(&self, vehicle_id: &str) -> Result<&VehicleState> {
        self.states
            .get(vehicle_id)
            .ok_or_else(|| TelematicsError::UnknownVehicle(vehicle_id.to_string()))
    }

    pub fn get_mut(&mut self, vehicle_id: &str) -> Result<&mut VehicleState> {
        self.states
            .get_mut(vehicle_id)
            .ok_or_else(|| TelematicsError::UnknownVehicle(vehicle_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Fails with the first registry entry that has no state.
    pub fn verify_covers(&self, registry: &VehicleRegistry) -> Result<()> {
        for vehicle in registry.list() {
            self.get(&vehicle.vehicle_id)?;
        }
        Ok(())
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn vehicle(id: &str, vehicle_type: VehicleType) -> Vehicle {
        Vehicle {
            vehicle_id: id.to_string(),
            vin: "VIN-10001".to_string(),
            driver_id: "driver-01".to_string(),
            vehicle_type,
        }
    }

    #[test]
    fn seed_state_is_within_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let geofence = Geofence::default();
        for i in 0..200 {
            let vehicle_type = if i % 2 == 0 { VehicleType::Electric } else { VehicleType::FuelPowered };
            let state = VehicleState::initialize(&vehicle("v", vehicle_type), &geofence, &mut rng);
            assert!(SPEED_KMH.contains(state.speed));
            assert!(LOAD_PCT.contains(state.load));
            assert!(COOLANT_C.contains(state.coolant_temperature));
            assert!(BATTERY_VOLTAGE.contains(state.battery_voltage));
            for (_, psi) in state.tire_pressure.iter() {
                assert!(TIRE_PSI.contains(psi));
            }
            assert!(geofence.contains(state.latitude, state.longitude));
            assert_eq!(state.vehicle_type(), vehicle_type);
        }
    }

    #[test]
    fn powertrain_follows_vehicle_type() {
        let mut rng = StdRng::seed_from_u64(1);
        let geofence = Geofence::default();

        let fuel = VehicleState::initialize(&vehicle("f", VehicleType::FuelPowered), &geofence, &mut rng);
        assert!(fuel.rpm().is_some());
        assert!(fuel.fuel_level().is_some());
        assert!(fuel.battery_level().is_none());

        let ev = VehicleState::initialize(&vehicle("e", VehicleType::Electric), &geofence, &mut rng);
        assert!(ev.rpm().is_none());
        assert!(ev.fuel_level().is_none());
        assert!(ev.battery_level().is_some());
    }

    #[test]
    fn get_unknown_vehicle_fails() {
        let store = StateStore::new();
        assert!(matches!(store.get("ghost"), Err(TelematicsError::UnknownVehicle(id)) if id == "ghost"));
    }

    #[test]
    fn seed_covers_registry() {
        let mut rng = StdRng::seed_from_u64(3);
        let registry = VehicleRegistry::generate(4, &mut rng);
        let store = StateStore::seed(&registry, &Geofence::default(), &mut rng);
        assert_eq!(store.len(), 4);
        assert!(store.verify_covers(&registry).is_ok());

        let bigger = VehicleRegistry::generate(5, &mut rng);
        assert!(matches!(
            store.verify_covers(&bigger),
            Err(TelematicsError::UnknownVehicle(id)) if id == "vehicle-05"
        ));
    }

    #[test]
    fn round_to_decimals() {
        assert_eq!(round_to(12.3456, 2), 12.35);
        assert_eq!(round_to(0.04, 1), 0.0);
    }
}
