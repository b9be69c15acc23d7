//! Configuration loading and validation

use anyhow::{bail, Result};
use ecocontrol_core::DEFAULT_TARGET_TEMPERATURE;
use ecocontrol_discovery::{DEFAULT_BROWSE_WINDOW, MESH_SERVICE_FQDN};
use ecocontrol_mesh::DEFAULT_TIMEOUT;
use ecocontrol_sync::DEFAULT_SYNC_INTERVAL;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Bind address for the REST API
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Seconds between discovery runs (0 runs discovery once at startup)
    #[serde(default = "default_rediscovery_interval")]
    pub rediscovery_interval_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            rediscovery_interval_secs: default_rediscovery_interval(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_rediscovery_interval() -> u64 {
    600
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Service type announced by panels
    #[serde(default = "default_service_fqdn")]
    pub service_fqdn: String,
    /// mDNS browse window per discovery run
    #[serde(default = "default_browse_timeout")]
    pub browse_timeout_secs: u64,
    /// Hosts probed on every run in addition to announced ones
    #[serde(default)]
    pub static_hosts: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            service_fqdn: default_service_fqdn(),
            browse_timeout_secs: default_browse_timeout(),
            static_hosts: Vec::new(),
        }
    }
}

fn default_service_fqdn() -> String {
    MESH_SERVICE_FQDN.to_string()
}

fn default_browse_timeout() -> u64 {
    DEFAULT_BROWSE_WINDOW.as_secs()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Poll period per panel
    #[serde(default = "default_sync_interval")]
    pub interval_secs: u64,
    /// Deadline for every HTTP request to a panel
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Lowest setpoint accepted by the API
    #[serde(default = "default_setpoint_min")]
    pub setpoint_min: f64,
    /// Highest setpoint accepted by the API
    #[serde(default = "default_setpoint_max")]
    pub setpoint_max: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sync_interval(),
            request_timeout_secs: default_request_timeout(),
            setpoint_min: default_setpoint_min(),
            setpoint_max: default_setpoint_max(),
        }
    }
}

fn default_sync_interval() -> u64 {
    DEFAULT_SYNC_INTERVAL.as_secs()
}

fn default_request_timeout() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_setpoint_min() -> f64 {
    DEFAULT_TARGET_TEMPERATURE
}

fn default_setpoint_max() -> f64 {
    30.0
}

impl Config {
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.request_timeout_secs)
    }

    pub fn browse_window(&self) -> Duration {
        Duration::from_secs(self.discovery.browse_timeout_secs)
    }

    /// Interval between discovery runs, `None` when discovery runs once
    pub fn rediscovery_interval(&self) -> Option<Duration> {
        match self.daemon.rediscovery_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Whether the API accepts `value` as a setpoint
    pub fn setpoint_in_range(&self, value: f64) -> bool {
        value.is_finite() && value >= self.sync.setpoint_min && value <= self.sync.setpoint_max
    }

    pub fn validate(&self) -> Result<()> {
        if self.sync.interval_secs == 0 {
            bail!("sync.interval_secs must be greater than zero");
        }
        if self.sync.request_timeout_secs == 0 {
            bail!("sync.request_timeout_secs must be greater than zero");
        }
        if self.sync.setpoint_min > self.sync.setpoint_max {
            bail!(
                "sync.setpoint_min ({}) is above sync.setpoint_max ({})",
                self.sync.setpoint_min,
                self.sync.setpoint_max
            );
        }
        if self.discovery.service_fqdn.trim().is_empty() {
            bail!("discovery.service_fqdn must not be empty");
        }
        Ok(())
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        config
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Config::default()
    };

    config.validate()?;
    Ok(config)
}

/// Save default configuration to file
pub fn save_default_config(path: &Path) -> Result<()> {
    let config = Config {
        discovery: DiscoveryConfig {
            static_hosts: vec!["192.168.0.27".to_string()],
            ..DiscoveryConfig::default()
        },
        ..Config::default()
    };

    let content = toml::to_string_pretty(&config)?;
    std::fs::write(path, content)?;
    Ok(())
}
