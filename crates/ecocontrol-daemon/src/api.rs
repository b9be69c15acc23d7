//! REST API handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use ecocontrol_core::DeviceState;
use ecocontrol_sync::SyncOutcome;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::state::{AppState, DeviceView};

/// API error response
#[derive(Serialize)]
struct ApiError {
    error: String,
}

impl ApiError {
    fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

fn not_found() -> axum::response::Response {
    (StatusCode::NOT_FOUND, Json(ApiError::new("Device not found"))).into_response()
}

/// Thermostat view of a panel's state
#[derive(Serialize)]
pub struct StateResponse {
    #[serde(flatten)]
    pub state: DeviceState,
    /// Measured temperature, `null` until the panel reports it
    pub current_temperature: Option<f64>,
    /// Requested temperature, the panel minimum while unknown
    pub target_temperature: f64,
    /// Panels only heat
    pub heating_mode: &'static str,
}

impl From<DeviceState> for StateResponse {
    fn from(state: DeviceState) -> Self {
        Self {
            state,
            current_temperature: state.room_temperature,
            target_temperature: state.target_temperature(),
            heating_mode: "heat",
        }
    }
}

/// List all panels
pub async fn list_devices(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.devices().await)
}

/// Get a panel by MAC
pub async fn get_device(
    State(state): State<Arc<AppState>>,
    Path(mac): Path<String>,
) -> impl IntoResponse {
    match state.get_device(&mac).await {
        Some(controller) => Json(DeviceView::of(&controller).await).into_response(),
        None => not_found(),
    }
}

/// Get a panel's state mirror
pub async fn get_state(
    State(state): State<Arc<AppState>>,
    Path(mac): Path<String>,
) -> impl IntoResponse {
    match state.get_device(&mac).await {
        Some(controller) => Json(StateResponse::from(controller.state())).into_response(),
        None => not_found(),
    }
}

/// Setpoint request body
#[derive(Deserialize)]
pub struct SetpointRequest {
    pub value: f64,
}

/// Write a new setpoint. The mirror changes immediately; the panel write
/// completes in the background.
pub async fn set_setpoint(
    State(state): State<Arc<AppState>>,
    Path(mac): Path<String>,
    Json(req): Json<SetpointRequest>,
) -> impl IntoResponse {
    if !state.config.setpoint_in_range(req.value) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(format!(
                "Setpoint must be between {} and {}",
                state.config.sync.setpoint_min, state.config.sync.setpoint_max
            ))),
        )
            .into_response();
    }

    let Some(controller) = state.get_device(&mac).await else {
        return not_found();
    };

    info!(device = %mac, value = req.value, "Setpoint change requested");
    // The write result is logged by the controller
    let _write = controller.set_setpoint(req.value);

    (
        StatusCode::ACCEPTED,
        Json(StateResponse::from(controller.state())),
    )
        .into_response()
}

/// Poll a panel now
pub async fn sync_device(
    State(state): State<Arc<AppState>>,
    Path(mac): Path<String>,
) -> impl IntoResponse {
    let Some(controller) = state.get_device(&mac).await else {
        return not_found();
    };

    info!(device = %mac, "Manual sync requested");

    match controller.sync_once().await {
        Ok(SyncOutcome::Synced(synced)) => Json(StateResponse::from(synced)).into_response(),
        Ok(SyncOutcome::Skipped) => (
            StatusCode::CONFLICT,
            Json(ApiError::new("Sync already in progress")),
        )
            .into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError::new(format!("Sync failed: {}", e))),
        )
            .into_response(),
    }
}

/// Trigger a discovery run
pub async fn trigger_scan(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    info!("Manual scan triggered");

    let found = state.discover().await;
    Json(serde_json::json!({
        "status": "completed",
        "devices_found": found,
        "total": state.registry.len().await
    }))
}

/// Get current configuration
pub async fn get_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.config.clone())
}
