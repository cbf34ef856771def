//! Stateful telemetry generator.
//!
//! Each tick advances one vehicle's [`VehicleState`] with bounded random
//! walks, derives threshold alerts from the updated state and assembles the
//! [`Reading`] document. Levels (fuel, battery) only ever fall and
//! odometers only ever grow.

use crate::config::Geofence;
use crate::error::Result;
use crate::models::{Alert, Driver, Engine, Location, Odometer, Reading, Vehicle, VehicleStatus};
use crate::state::{
    round_to, Powertrain, StateStore, VehicleState, BATTERY_VOLTAGE, COOLANT_C, LEVEL_PCT, LOAD_PCT,
    RPM_MAX, RPM_MIN, SPEED_KMH, TIRE_PSI,
};
use rand::Rng;
use std::time::{Duration, Instant};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub const LOW_FUEL_THRESHOLD: f64 = 10.0;
pub const LOW_BATTERY_THRESHOLD: f64 = 15.0;
pub const LOW_TIRE_THRESHOLD: f64 = 30.0;
pub const HIGH_COOLANT_THRESHOLD: f64 = 100.0;
pub const RECOMMENDED_TIRE_PRESSURE: f64 = 35.0;

const SPEED_STEP: f64 = 5.0;
const RPM_STEP: i64 = 200;
const FUEL_BURN_MAX: f64 = 0.5;
const BATTERY_DRAIN_MAX: f64 = 1.0;
const LOAD_STEP: f64 = 5.0;
const COOLANT_STEP: f64 = 1.0;
const TIRE_STEP: f64 = 0.5;

pub struct TelemetryGenerator {
    store: StateStore,
    geofence: Geofence,
}

impl TelemetryGenerator {
    pub fn new(store: StateStore, geofence: Geofence) -> Self {
        Self { store, geofence }
    }

    /// Read access for inspection; mutation only happens through `tick`.
    pub fn state(&self, vehicle_id: &str) -> Result<&VehicleState> {
        self.store.get(vehicle_id)
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Advances `vehicle` using the wall-clock time elapsed since its
    /// previous advance.
    pub fn tick(&mut self, vehicle: &Vehicle) -> Result<Reading> {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.store.get(&vehicle.vehicle_id)?.last_advanced);
        let reading = self.tick_with(vehicle, elapsed, &mut rand::thread_rng(), OffsetDateTime::now_utc())?;
        self.store.get_mut(&vehicle.vehicle_id)?.last_advanced = now;
        Ok(reading)
    }

    /// Deterministic core of `tick`: explicit elapsed time, randomness and
    /// timestamp.
    pub fn tick_with<R: Rng>(
        &mut self,
        vehicle: &Vehicle,
        elapsed: Duration,
        rng: &mut R,
        at: OffsetDateTime,
    ) -> Result<Reading> {
        let geofence = self.geofence;
        let state = self.store.get_mut(&vehicle.vehicle_id)?;
        advance(state, &geofence, elapsed, rng);

        let timestamp = at.format(&Rfc3339).unwrap_or_default();
        let alerts = derive_alerts(state, &timestamp);
        Ok(assemble(vehicle, state, alerts, timestamp, rng))
    }
}

/// One simulation step applied in place.
pub fn advance<R: Rng>(state: &mut VehicleState, geofence: &Geofence, elapsed: Duration, rng: &mut R) {
    // location is resampled, not walked
    let (latitude, longitude) = geofence.sample(rng);
    state.latitude = latitude;
    state.longitude = longitude;

    state.speed = round_to(SPEED_KMH.clamp(state.speed + rng.gen_range(-SPEED_STEP..=SPEED_STEP)), 2);

    match &mut state.powertrain {
        Powertrain::Fuel { rpm, fuel_level } => {
            let next = i64::from(*rpm) + rng.gen_range(-RPM_STEP..=RPM_STEP);
            *rpm = next.clamp(i64::from(RPM_MIN), i64::from(RPM_MAX)) as u32;
            *fuel_level = drain(*fuel_level, round_to(rng.gen_range(0.0..=FUEL_BURN_MAX), 1));
        }
        Powertrain::Electric { battery_level } => {
            *battery_level = drain(*battery_level, round_to(rng.gen_range(0.0..=BATTERY_DRAIN_MAX), 1));
        }
    }

    state.load = round_to(LOAD_PCT.clamp(state.load + rng.gen_range(-LOAD_STEP..=LOAD_STEP)), 1);
    state.coolant_temperature = round_to(
        COOLANT_C.clamp(state.coolant_temperature + rng.gen_range(-COOLANT_STEP..=COOLANT_STEP)),
        1,
    );
    state.battery_voltage = round_to(rng.gen_range(BATTERY_VOLTAGE.min..=BATTERY_VOLTAGE.max), 2);

    for psi in state.tire_pressure.iter_mut() {
        *psi = round_to(TIRE_PSI.clamp(*psi + rng.gen_range(-TIRE_STEP..=TIRE_STEP)), 1);
    }

    let distance_km = state.speed * elapsed.as_secs_f64() / 3600.0;
    state.total_km += distance_km;
    state.trip_km += distance_km;
}

// Never raises the level: rounding is monotonic and the draw is non-negative.
fn drain(level: f64, amount: f64) -> f64 {
    round_to(LEVEL_PCT.clamp(level - amount.max(0.0)), 1).min(level)
}

/// Threshold alerts for the given (already advanced) state, in fixed check
/// order: fuel, battery, tires, coolant.
pub fn derive_alerts(state: &VehicleState, timestamp: &str) -> Vec<Alert> {
    let mut alerts = Vec::new();

    match state.powertrain {
        Powertrain::Fuel { fuel_level, .. } if fuel_level < LOW_FUEL_THRESHOLD => {
            alerts.push(Alert::LowFuel { fuel_level, timestamp: timestamp.to_string() });
        }
        Powertrain::Electric { battery_level } if battery_level < LOW_BATTERY_THRESHOLD => {
            alerts.push(Alert::LowBattery { battery_level, timestamp: timestamp.to_string() });
        }
        _ => {}
    }

    for (tire, pressure) in state.tire_pressure.iter() {
        if pressure < LOW_TIRE_THRESHOLD {
            alerts.push(Alert::LowTirePressure {
                tire: tire.to_string(),
                pressure,
                recommended_pressure: RECOMMENDED_TIRE_PRESSURE,
                timestamp: timestamp.to_string(),
            });
        }
    }

    if state.coolant_temperature > HIGH_COOLANT_THRESHOLD {
        alerts.push(Alert::HighCoolantTemperature {
            temperature: state.coolant_temperature,
            timestamp: timestamp.to_string(),
        });
    }

    alerts
}

fn assemble<R: Rng>(
    vehicle: &Vehicle,
    state: &VehicleState,
    alerts: Vec<Alert>,
    timestamp: String,
    rng: &mut R,
) -> Reading {
    let driver_suffix = vehicle
        .driver_id
        .get(vehicle.driver_id.len().saturating_sub(2)..)
        .unwrap_or(&vehicle.driver_id);

    Reading {
        vehicle_id: vehicle.vehicle_id.clone(),
        vin: vehicle.vin.clone(),
        vehicle_type: state.vehicle_type(),
        timestamp,
        location: Location {
            latitude: state.latitude,
            longitude: state.longitude,
            altitude: rng.gen_range(0..=500),
            heading: rng.gen_range(0..=360),
            speed: state.speed,
        },
        driver: Driver {
            driver_id: vehicle.driver_id.clone(),
            name: format!("Driver {driver_suffix}"),
            hours_of_service: round_to(rng.gen_range(0.0..10.0), 1),
            violations: Vec::new(),
        },
        engine: Engine {
            rpm: state.rpm(),
            load: state.load,
            fuel_level: state.fuel_level(),
            battery_level: state.battery_level(),
            coolant_temperature: state.coolant_temperature,
            battery_voltage: state.battery_voltage,
        },
        odometer: Odometer {
            total_km: round_to(state.total_km, 1),
            trip_km: round_to(state.trip_km, 1),
        },
        tire_pressure: state.tire_pressure,
        alerts,
        status: VehicleStatus {
            ignition: rng.gen_bool(0.5),
            engine_on: rng.gen_bool(0.5),
            moving: state.speed > 0.0,
        },
    }
}
