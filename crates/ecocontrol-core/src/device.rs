//! Device identity for confirmed mesh nodes

use serde::{Deserialize, Serialize};

/// Manufacturer reported for every panel
pub const MANUFACTURER: &str = "SunnyHeat";

/// Model reported for every panel
pub const MODEL: &str = "Panel";

/// Display name of the thermostat service exposed per panel
pub const SERVICE_NAME: &str = "infrared panel";

/// Mesh node MAC address, the long-term identity key of a device
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceMac(pub String);

impl DeviceMac {
    /// Create a MAC key from a header value, trimming surrounding whitespace
    pub fn new(mac: &str) -> Self {
        Self(mac.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceMac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A confirmed heating panel
///
/// Created once per confirmed discovery. Only `host` may change afterwards,
/// when the same MAC is announced from a different address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Network address or hostname, optionally with `:port`
    pub host: String,
    /// Mesh node number (opaque)
    pub id: String,
    /// Mesh node MAC address
    pub mac: DeviceMac,
}

impl Device {
    pub fn new(host: impl Into<String>, id: impl Into<String>, mac: DeviceMac) -> Self {
        Self {
            host: host.into(),
            id: id.into(),
            mac,
        }
    }

    /// Replace the host, returning the previous one if it changed
    pub fn relocate(&mut self, host: &str) -> Option<String> {
        if self.host == host {
            return None;
        }
        Some(std::mem::replace(&mut self.host, host.to_string()))
    }
}
