//! WebSocket handler for live state updates

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use ecocontrol_core::{Device, DeviceState};
use ecocontrol_sync::SyncEvent;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// WebSocket message types
#[derive(Serialize)]
#[serde(tag = "type", content = "data")]
enum WsMessage {
    #[serde(rename = "device_confirmed")]
    DeviceConfirmed(Device),
    #[serde(rename = "host_changed")]
    HostChanged {
        mac: String,
        previous: String,
        host: String,
    },
    #[serde(rename = "state_synced")]
    StateSynced { mac: String, state: DeviceState },
    #[serde(rename = "setpoint_requested")]
    SetpointRequested { mac: String, value: f64 },
    #[serde(rename = "sync_failed")]
    SyncFailed { mac: String, error: String },
    #[serde(rename = "pong")]
    Pong,
}

impl From<SyncEvent> for WsMessage {
    fn from(event: SyncEvent) -> Self {
        match event {
            SyncEvent::DeviceConfirmed(device) => WsMessage::DeviceConfirmed(device),
            SyncEvent::HostChanged {
                mac,
                previous,
                host,
            } => WsMessage::HostChanged {
                mac: mac.0,
                previous,
                host,
            },
            SyncEvent::StateSynced { mac, state } => WsMessage::StateSynced { mac: mac.0, state },
            SyncEvent::SetpointRequested { mac, value } => {
                WsMessage::SetpointRequested { mac: mac.0, value }
            }
            SyncEvent::SyncFailed { mac, error } => WsMessage::SyncFailed { mac: mac.0, error },
        }
    }
}

/// WebSocket upgrade handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.registry.subscribe();

    info!("WebSocket client connected");

    // Send current panels and their state on connect
    for view in state.devices().await {
        let mac = view.device.mac.0.clone();
        let snapshot = [
            WsMessage::DeviceConfirmed(view.device),
            WsMessage::StateSynced {
                mac,
                state: view.state,
            },
        ];
        for msg in snapshot {
            if let Ok(json) = serde_json::to_string(&msg) {
                if sender.send(Message::Text(json.into())).await.is_err() {
                    return;
                }
            }
        }
    }

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        let msg = WsMessage::from(event);
                        if let Ok(json) = serde_json::to_string(&msg) {
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        debug!(skipped = n, "Sync event channel lagged");
                    }
                    Err(RecvError::Closed) => {
                        debug!("Sync event channel closed");
                        break;
                    }
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        if text.as_str() == "ping" {
                            if let Ok(pong) = serde_json::to_string(&WsMessage::Pong) {
                                if sender.send(Message::Text(pong.into())).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("WebSocket client disconnected");
}
