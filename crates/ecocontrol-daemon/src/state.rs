//! Application state management

use anyhow::Result;
use chrono::{DateTime, Utc};
use ecocontrol_core::{Device, DeviceState, MANUFACTURER, MODEL, SERVICE_NAME};
use ecocontrol_discovery::{AnnouncementSource, DeviceDiscoverer, DeviceValidator, MdnsSource};
use ecocontrol_mesh::MeshClient;
use ecocontrol_sync::{ControllerPhase, DeviceRegistry, DeviceSyncController, Registration};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Config;

/// Shared application state
pub struct AppState {
    /// Controllers for confirmed panels
    pub registry: Arc<DeviceRegistry>,
    /// Panel discovery
    pub discoverer: Arc<DeviceDiscoverer>,
    /// Configuration
    pub config: Config,
}

/// A panel as shown by the API
#[derive(Debug, Clone, Serialize)]
pub struct DeviceView {
    #[serde(flatten)]
    pub device: Device,
    pub name: &'static str,
    pub manufacturer: &'static str,
    pub model: &'static str,
    pub phase: ControllerPhase,
    pub last_synced: Option<DateTime<Utc>>,
    pub state: DeviceState,
}

impl DeviceView {
    pub async fn of(controller: &DeviceSyncController) -> Self {
        Self {
            device: controller.device().await,
            name: SERVICE_NAME,
            manufacturer: MANUFACTURER,
            model: MODEL,
            phase: controller.phase(),
            last_synced: controller.last_synced().await,
            state: controller.state(),
        }
    }
}

impl AppState {
    /// Create application state browsing the network with mDNS
    pub fn new(config: Config) -> Result<Arc<Self>> {
        let source = Arc::new(MdnsSource::new(
            &config.discovery.service_fqdn,
            config.browse_window(),
        ));
        Self::with_source(config, source)
    }

    /// Create application state with a custom announcement source
    pub fn with_source(config: Config, source: Arc<dyn AnnouncementSource>) -> Result<Arc<Self>> {
        let client = MeshClient::new(config.request_timeout())?;

        let discoverer = DeviceDiscoverer::new(source, DeviceValidator::new(client.clone()))
            .with_service_fqdn(&config.discovery.service_fqdn)
            .with_static_hosts(config.discovery.static_hosts.clone());

        let registry = DeviceRegistry::new(client, config.sync_interval());

        Ok(Arc::new(Self {
            registry: Arc::new(registry),
            discoverer: Arc::new(discoverer),
            config,
        }))
    }

    /// Run discovery once and hand every confirmed panel to the registry.
    /// Returns the number of panels confirmed in this run.
    pub async fn discover(&self) -> usize {
        let devices = self.discoverer.discover_devices().await;
        let found = devices.len();

        for device in devices {
            let mac = device.mac.clone();
            if let Registration::Relocated { previous } = self.registry.register(device).await {
                debug!(mac = %mac, previous = %previous, "Registry followed a panel to a new host");
            }
        }

        let total = self.registry.len().await;
        info!(found = found, total = total, "Discovery finished");
        found
    }

    /// Discover now, then again on every rediscovery interval
    pub async fn run_discovery(self: Arc<Self>) {
        self.discover().await;

        let Some(period) = self.config.rediscovery_interval() else {
            info!("Periodic rediscovery disabled");
            return;
        };

        let mut ticker = tokio::time::interval(period);
        // Skip the immediate tick; the first run already happened
        ticker.tick().await;
        loop {
            ticker.tick().await;
            self.discover().await;
        }
    }

    /// All panels, ordered by MAC
    pub async fn devices(&self) -> Vec<DeviceView> {
        let mut views = Vec::new();
        for controller in self.registry.controllers().await {
            views.push(DeviceView::of(&controller).await);
        }
        views
    }

    /// Panel by MAC
    pub async fn get_device(&self, mac: &str) -> Option<Arc<DeviceSyncController>> {
        self.registry.get(mac).await
    }
}
