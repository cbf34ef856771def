//! Wire document published on the broker topic and served by the query API.
//!
//! Field names are part of the external contract: dashboards and the relay
//! decode exactly this shape.

use serde::{Deserialize, Serialize};

/// Powertrain family, fixed when the vehicle is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleType {
    #[serde(rename = "electric")]
    Electric,
    #[serde(rename = "fuel-powered")]
    FuelPowered,
}

/// Static identity of one fleet vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub vehicle_id: String,
    pub vin: String,
    pub driver_id: String,
    #[serde(rename = "type")]
    pub vehicle_type: VehicleType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub vehicle_id: String,
    pub vin: String,
    #[serde(rename = "type")]
    pub vehicle_type: VehicleType,
    pub timestamp: String,
    pub location: Location,
    pub driver: Driver,
    pub engine: Engine,
    pub odometer: Odometer,
    pub tire_pressure: TirePressure,
    pub alerts: Vec<Alert>,
    pub status: VehicleStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: u32,
    pub heading: u32,
    pub speed: f64,
}

/// Synthetic driver block, regenerated on every reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub driver_id: String,
    pub name: String,
    pub hours_of_service: f64,
    pub violations: Vec<String>,
}

/// Inactive powertrain fields are serialized as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Engine {
    pub rpm: Option<u32>,
    pub load: f64,
    pub fuel_level: Option<f64>,
    pub battery_level: Option<f64>,
    pub coolant_temperature: f64,
    pub battery_voltage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Odometer {
    pub total_km: f64,
    pub trip_km: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TirePressure {
    pub front_left: f64,
    pub front_right: f64,
    pub rear_left: f64,
    pub rear_right: f64,
}

impl TirePressure {
    pub fn uniform(psi: f64) -> Self {
        Self { front_left: psi, front_right: psi, rear_left: psi, rear_right: psi }
    }

    /// Tires in check order, named as they appear on the wire.
    pub fn iter(&self) -> [(&'static str, f64); 4] {
        [
            ("front_left", self.front_left),
            ("front_right", self.front_right),
            ("rear_left", self.rear_left),
            ("rear_right", self.rear_right),
        ]
    }

    pub fn iter_mut(&mut self) -> [&mut f64; 4] {
        [&mut self.front_left, &mut self.front_right, &mut self.rear_left, &mut self.rear_right]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Alert {
    LowFuel {
        fuel_level: f64,
        timestamp: String,
    },
    LowBattery {
        battery_level: f64,
        timestamp: String,
    },
    LowTirePressure {
        tire: String,
        pressure: f64,
        recommended_pressure: f64,
        timestamp: String,
    },
    HighCoolantTemperature {
        temperature: f64,
        timestamp: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleStatus {
    pub ignition: bool,
    pub engine_on: bool,
    pub moving: bool,
}
