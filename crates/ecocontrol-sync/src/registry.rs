//! Registry of sync controllers keyed by device MAC

use ecocontrol_core::Device;
use ecocontrol_mesh::MeshClient;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::controller::{DeviceSyncController, SyncEvent};

/// What [`DeviceRegistry::register`] did with a confirmed device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// New MAC; a controller was created and started
    Added,
    /// Known MAC at a new host; the existing controller now polls `host`
    Relocated { previous: String },
    /// Known MAC at the same host
    Unchanged,
}

/// Owns every controller. A MAC never has more than one.
pub struct DeviceRegistry {
    client: MeshClient,
    interval: Duration,
    controllers: RwLock<HashMap<String, Arc<DeviceSyncController>>>,
    event_tx: broadcast::Sender<SyncEvent>,
}

impl DeviceRegistry {
    /// Controllers created by this registry poll every `interval`
    pub fn new(client: MeshClient, interval: Duration) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            client,
            interval,
            controllers: RwLock::new(HashMap::new()),
            event_tx,
        }
    }

    /// Subscribe to registry and controller events
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.event_tx.subscribe()
    }

    /// Take ownership of a confirmed device
    pub async fn register(&self, device: Device) -> Registration {
        let mut controllers = self.controllers.write().await;

        if let Some(existing) = controllers.get(device.mac.as_str()) {
            let known = existing.device().await;
            if known.id != device.id {
                warn!(
                    mac = %device.mac,
                    known_id = %known.id,
                    announced_id = %device.id,
                    "Node number changed for known MAC, keeping the original"
                );
            }

            return match existing.relocate(&device.host).await {
                Some(previous) => {
                    info!(mac = %device.mac, previous = %previous, host = %device.host, "Panel moved to a new host");
                    let _ = self.event_tx.send(SyncEvent::HostChanged {
                        mac: device.mac.clone(),
                        previous: previous.clone(),
                        host: device.host.clone(),
                    });
                    Registration::Relocated { previous }
                }
                None => {
                    debug!(mac = %device.mac, "Panel already registered");
                    Registration::Unchanged
                }
            };
        }

        let controller = Arc::new(DeviceSyncController::new(
            device.clone(),
            self.client.clone(),
            self.interval,
            self.event_tx.clone(),
        ));
        controllers.insert(device.mac.as_str().to_string(), Arc::clone(&controller));
        drop(controllers);

        info!(mac = %device.mac, host = %device.host, id = %device.id, "Registered panel");
        let _ = self.event_tx.send(SyncEvent::DeviceConfirmed(device));
        controller.start();

        Registration::Added
    }

    /// Controller for a MAC
    pub async fn get(&self, mac: &str) -> Option<Arc<DeviceSyncController>> {
        self.controllers.read().await.get(mac).cloned()
    }

    /// All controllers, ordered by MAC
    pub async fn controllers(&self) -> Vec<Arc<DeviceSyncController>> {
        let mut all: Vec<_> = self.controllers.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.mac().cmp(b.mac()));
        all
    }

    pub async fn len(&self) -> usize {
        self.controllers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.controllers.read().await.is_empty()
    }

    /// Stop every controller's timer
    pub async fn shutdown(&self) {
        for controller in self.controllers.read().await.values() {
            controller.shutdown();
        }
    }
}
