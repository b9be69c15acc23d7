//! Discovery runs: browse, filter by service name, validate

use ecocontrol_core::Device;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::announce::{same_service, AnnouncementSource};
use crate::validator::DeviceValidator;

/// Service type announced by panels
pub const MESH_SERVICE_FQDN: &str = "_mesh-http._tcp.local";

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("mDNS error: {0}")]
    Mdns(String),
    #[error("Announcement source failed: {0}")]
    Source(String),
}

/// One-shot discovery of panels. The caller decides when to run it again.
pub struct DeviceDiscoverer {
    source: Arc<dyn AnnouncementSource>,
    validator: DeviceValidator,
    service_fqdn: String,
    static_hosts: Vec<String>,
}

impl DeviceDiscoverer {
    pub fn new(source: Arc<dyn AnnouncementSource>, validator: DeviceValidator) -> Self {
        Self {
            source,
            validator,
            service_fqdn: MESH_SERVICE_FQDN.to_string(),
            static_hosts: Vec::new(),
        }
    }

    /// Accept announcements for a different service name
    pub fn with_service_fqdn(mut self, fqdn: &str) -> Self {
        self.service_fqdn = fqdn.to_string();
        self
    }

    /// Hosts validated on every run whether or not they were announced
    pub fn with_static_hosts(mut self, hosts: Vec<String>) -> Self {
        self.static_hosts = hosts;
        self
    }

    pub fn validator(&self) -> &DeviceValidator {
        &self.validator
    }

    /// Candidate addresses from one browse, in announcement order, each at most once
    pub async fn discover(&self) -> Result<Vec<String>, DiscoveryError> {
        let announcements = self.source.browse().await?;
        let total = announcements.len();

        let mut seen = HashSet::new();
        let candidates: Vec<String> = announcements
            .into_iter()
            .filter(|a| same_service(&a.fqdn, &self.service_fqdn))
            .map(|a| a.address)
            .filter(|address| seen.insert(address.clone()))
            .collect();

        debug!(
            announcements = total,
            candidates = candidates.len(),
            "Filtered announcements"
        );
        Ok(candidates)
    }

    /// Browse, then validate every candidate and static host concurrently.
    ///
    /// Browse failures are logged and leave only the static hosts to probe.
    /// When two addresses report the same MAC the first confirmation wins.
    pub async fn discover_devices(&self) -> Vec<Device> {
        let mut candidates = match self.discover().await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, "Service discovery failed");
                Vec::new()
            }
        };

        for host in &self.static_hosts {
            if !candidates.contains(host) {
                candidates.push(host.clone());
            }
        }

        let mut tasks = JoinSet::new();
        for (index, address) in candidates.iter().cloned().enumerate() {
            let validator = self.validator.clone();
            tasks.spawn(async move { (index, validator.validate(&address).await) });
        }

        let mut confirmed: Vec<(usize, Device)> = Vec::new();
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok((index, Some(device))) => confirmed.push((index, device)),
                Ok((_, None)) => {}
                Err(e) => warn!(error = %e, "Validation task failed"),
            }
        }
        confirmed.sort_by_key(|(index, _)| *index);

        let mut macs = HashSet::new();
        let devices: Vec<Device> = confirmed
            .into_iter()
            .map(|(_, device)| device)
            .filter(|device| {
                let fresh = macs.insert(device.mac.clone());
                if !fresh {
                    warn!(mac = %device.mac, host = %device.host, "Duplicate MAC in one discovery run, ignoring");
                }
                fresh
            })
            .collect();

        info!(
            candidates = candidates.len(),
            confirmed = devices.len(),
            "Discovery run complete"
        );
        devices
    }
}
