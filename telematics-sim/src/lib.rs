//! Fleet telemetry simulator.
//!
//! A fixed roster of vehicles is advanced once per tick by a stateful
//! generator; every reading is cached for the query API and published to an
//! MQTT v5 topic with a message-expiry hint.

pub mod broker;
pub mod cache;
pub mod config;
pub mod error;
pub mod generator;
pub mod health;
pub mod http;
pub mod models;
pub mod publish_loop;
pub mod registry;
pub mod state;

pub use cache::LatestReadingCache;
pub use error::TelematicsError;
pub use generator::TelemetryGenerator;
pub use models::{Alert, Reading, Vehicle, VehicleType};
pub use registry::VehicleRegistry;
pub use state::StateStore;
