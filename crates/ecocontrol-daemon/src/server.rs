//! Web server setup and routing

use anyhow::Result;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::api;
use crate::state::AppState;
use crate::ws;

/// Build the API router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/devices", get(api::list_devices))
        .route("/api/devices/{mac}", get(api::get_device))
        .route("/api/devices/{mac}/state", get(api::get_state))
        .route("/api/devices/{mac}/setpoint", put(api::set_setpoint))
        .route("/api/devices/{mac}/sync", post(api::sync_device))
        .route("/api/scan", post(api::trigger_scan))
        .route("/api/config", get(api::get_config))
        // WebSocket for live state updates
        .route("/ws", get(ws::websocket_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Start discovery in the background and serve the API
pub async fn run(state: Arc<AppState>, bind: &str) -> Result<()> {
    let app = router(state.clone());

    tokio::spawn(state.clone().run_discovery());

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(address = %bind, "Starting API server");
    axum::serve(listener, app).await?;

    state.registry.shutdown().await;
    Ok(())
}
