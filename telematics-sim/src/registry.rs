use crate::models::{Vehicle, VehicleType};
use rand::Rng;

/// Fixed fleet roster built once at startup.
#[derive(Debug, Clone)]
pub struct VehicleRegistry {
    vehicles: Vec<Vehicle>,
}

impl VehicleRegistry {
    /// Builds `count` vehicles (`vehicle-01`, `VIN-10001`, `driver-01`, ...)
    /// with a powertrain drawn at random for each.
    pub fn generate<R: Rng>(count: usize, rng: &mut R) -> Self {
        let vehicles = (1..=count)
            .map(|i| {
                let vehicle_type = if rng.gen_bool(0.5) {
                    VehicleType::Electric
                } else {
                    VehicleType::FuelPowered
                };
                Vehicle {
                    vehicle_id: format!("vehicle-{i:02}"),
                    vin: format!("VIN-{}", 10_000 + i),
                    driver_id: format!("driver-{i:02}"),
                    vehicle_type,
                }
            })
            .collect();
        Self { vehicles }
    }

    pub fn from_vehicles(vehicles: Vec<Vehicle>) -> Self {
        Self { vehicles }
    }

    pub fn list(&self) -> &[Vehicle] {
        &self.vehicles
    }

    pub fn get(&self, vehicle_id: &str) -> Option<&Vehicle> {
        self.vehicles.iter().find(|v| v.vehicle_id == vehicle_id)
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }
}
