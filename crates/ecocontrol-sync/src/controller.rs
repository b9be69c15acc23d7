//! Per-device synchronization controller

use chrono::{DateTime, Utc};
use ecocontrol_core::{Device, DeviceMac, DeviceState};
use ecocontrol_mesh::{parse_characteristics, DeviceRequest, MeshClient, MeshError};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::store::StateStore;

/// Poll period used when none is configured
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(300);

/// Lifecycle of a controller. `Stopped` is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerPhase {
    /// Created, not started yet
    Idle,
    /// Timer running
    Polling,
    /// Shut down
    Stopped,
}

/// Result of a single sync attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyncOutcome {
    /// Both requests succeeded and the report was applied
    Synced(DeviceState),
    /// Another sync for this device was still in flight
    Skipped,
}

/// Events published by the registry and its controllers
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A new MAC was confirmed and its controller started
    DeviceConfirmed(Device),
    /// A known MAC was announced from a different host
    HostChanged {
        mac: DeviceMac,
        previous: String,
        host: String,
    },
    /// A poll succeeded; `state` is the reconciled mirror
    StateSynced { mac: DeviceMac, state: DeviceState },
    /// A setpoint was written into the mirror and sent to the panel
    SetpointRequested { mac: DeviceMac, value: f64 },
    /// A poll failed; the mirror was left as it was
    SyncFailed { mac: DeviceMac, error: String },
}

/// Owns one panel's state mirror and keeps it in sync
pub struct DeviceSyncController {
    mac: DeviceMac,
    device: RwLock<Device>,
    client: MeshClient,
    store: StateStore,
    interval: Duration,
    in_flight: Mutex<()>,
    phase: watch::Sender<ControllerPhase>,
    last_synced: RwLock<Option<DateTime<Utc>>>,
    task: std::sync::Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<SyncEvent>,
}

impl DeviceSyncController {
    pub fn new(
        device: Device,
        client: MeshClient,
        interval: Duration,
        events: broadcast::Sender<SyncEvent>,
    ) -> Self {
        let (phase, _) = watch::channel(ControllerPhase::Idle);
        Self {
            mac: device.mac.clone(),
            device: RwLock::new(device),
            client,
            store: StateStore::new(),
            interval: interval.max(Duration::from_millis(1)),
            in_flight: Mutex::new(()),
            phase,
            last_synced: RwLock::new(None),
            task: std::sync::Mutex::new(None),
            events,
        }
    }

    pub fn mac(&self) -> &DeviceMac {
        &self.mac
    }

    pub async fn device(&self) -> Device {
        self.device.read().await.clone()
    }

    /// Point the controller at a new host, returning the previous one if it changed
    pub async fn relocate(&self, host: &str) -> Option<String> {
        self.device.write().await.relocate(host)
    }

    pub fn state(&self) -> DeviceState {
        self.store.snapshot()
    }

    /// Receiver notified whenever the mirror changes
    pub fn subscribe(&self) -> watch::Receiver<DeviceState> {
        self.store.subscribe()
    }

    pub fn phase(&self) -> ControllerPhase {
        *self.phase.borrow()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn last_synced(&self) -> Option<DateTime<Utc>> {
        *self.last_synced.read().await
    }

    /// Sync now, then every `interval` until shutdown.
    ///
    /// Calling it again, or after shutdown, does nothing.
    pub fn start(self: &Arc<Self>) {
        let Ok(mut task) = self.task.lock() else {
            warn!(mac = %self.mac, "Controller task slot poisoned, not starting");
            return;
        };
        if task.is_some() || self.phase() == ControllerPhase::Stopped {
            debug!(mac = %self.mac, "Controller already started");
            return;
        }

        self.phase.send_replace(ControllerPhase::Polling);
        let controller = Arc::clone(self);
        *task = Some(tokio::spawn(async move { controller.run().await }));

        info!(
            mac = %self.mac,
            interval_secs = self.interval.as_secs(),
            "Started state sync"
        );
    }

    /// Stop the timer. The mirror stays readable.
    pub fn shutdown(&self) {
        if let Ok(mut task) = self.task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
        self.phase.send_replace(ControllerPhase::Stopped);
        info!(mac = %self.mac, "Stopped state sync");
    }

    async fn run(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // First tick completes immediately
            ticker.tick().await;

            match self.sync_once().await {
                Ok(SyncOutcome::Synced(state)) => {
                    debug!(mac = %self.mac, state = ?state, "State synced");
                }
                Ok(SyncOutcome::Skipped) => {}
                Err(e) => {
                    warn!(mac = %self.mac, error = %e, "State sync failed, keeping previous state");
                }
            }
        }
    }

    /// Poll the panel once and apply its report.
    ///
    /// At most one sync runs per device; a concurrent call returns
    /// [`SyncOutcome::Skipped`] without touching the network. On failure the
    /// mirror is left exactly as it was.
    pub async fn sync_once(&self) -> Result<SyncOutcome, MeshError> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!(mac = %self.mac, "Sync already in flight, skipping");
            return Ok(SyncOutcome::Skipped);
        };

        let device = self.device().await;
        match self.poll(&device).await {
            Ok(state) => {
                *self.last_synced.write().await = Some(Utc::now());
                let _ = self.events.send(SyncEvent::StateSynced {
                    mac: self.mac.clone(),
                    state,
                });
                Ok(SyncOutcome::Synced(state))
            }
            Err(e) => {
                let _ = self.events.send(SyncEvent::SyncFailed {
                    mac: self.mac.clone(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn poll(&self, device: &Device) -> Result<DeviceState, MeshError> {
        let details = self
            .client
            .request(device, &DeviceRequest::device_data())
            .await?;
        trace!(mac = %device.mac, details = %details, "Device metadata");

        let report = self
            .client
            .request(device, &DeviceRequest::device_info())
            .await?;
        let characteristics = parse_characteristics(&report)
            .map_err(|reason| MeshError::protocol(&device.host, reason))?;

        Ok(self.store.reconcile(&characteristics))
    }

    /// Write a new setpoint.
    ///
    /// The mirror is updated before this returns; the request to the panel
    /// runs in the background. A rejected write is not rolled back, the next
    /// poll brings the mirror back in line with the panel.
    pub fn set_setpoint(self: &Arc<Self>, value: f64) -> JoinHandle<Result<Value, MeshError>> {
        self.store.set_setpoint(value);
        let _ = self.events.send(SyncEvent::SetpointRequested {
            mac: self.mac.clone(),
            value,
        });

        let controller = Arc::clone(self);
        tokio::spawn(async move { controller.write_setpoint(value).await })
    }

    async fn write_setpoint(&self, value: f64) -> Result<Value, MeshError> {
        let device = self.device().await;
        info!(mac = %device.mac, host = %device.host, value = value, "Writing setpoint");

        let result = self
            .client
            .request(&device, &DeviceRequest::set_setpoint(value))
            .await;

        match &result {
            Ok(reply) => trace!(mac = %device.mac, reply = %reply, "Setpoint write acknowledged"),
            Err(e) => {
                warn!(mac = %device.mac, error = %e, "Setpoint write failed");
                let _ = self.events.send(SyncEvent::SyncFailed {
                    mac: self.mac.clone(),
                    error: e.to_string(),
                });
            }
        }
        result
    }
}
