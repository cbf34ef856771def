//! Query API: latest reading per vehicle, roster and health.
//! Reads the cache directly; nothing here goes through the broker.

use crate::cache::LatestReadingCache;
use crate::error::TelematicsError;
use crate::health::{HealthTracker, SimulatorHealth};
use crate::models::{Reading, Vehicle};
use crate::registry::VehicleRegistry;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub cache: LatestReadingCache,
    pub registry: Arc<VehicleRegistry>,
    pub health: HealthTracker,
}

impl IntoResponse for TelematicsError {
    fn into_response(self) -> Response {
        match self {
            TelematicsError::NotFound(_) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": "Vehicle not found" }))).into_response()
            }
            other => {
                tracing::error!("request failed: {other}");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": other.to_string() }))).into_response()
            }
        }
    }
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .route("/vehicles", get(list_vehicles))
        .route("/vehicle/{vehicle_id}", get(get_vehicle))
        .with_state(app_state)
}

// GET /vehicle/{vehicle_id}
async fn get_vehicle(
    State(app): State<AppState>,
    Path(vehicle_id): Path<String>,
) -> Result<Json<Reading>, TelematicsError> {
    let reading = app.cache.get(&vehicle_id)?;
    Ok(Json((*reading).clone()))
}

// GET /vehicles
async fn list_vehicles(State(app): State<AppState>) -> Json<Vec<Vehicle>> {
    Json(app.registry.list().to_vec())
}

// GET /system/health
async fn get_system_health(State(app): State<AppState>) -> Json<SimulatorHealth> {
    Json(app.health.get_health(&app.registry, &app.cache))
}
