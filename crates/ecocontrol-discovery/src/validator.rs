//! Probe-based confirmation of announced addresses

use ecocontrol_core::{Device, DeviceMac};
use ecocontrol_mesh::{MeshClient, MeshError, MeshInfoReply, HEADER_NODE_MAC, HEADER_NODE_NUM};
use thiserror::Error;
use tracing::{debug, info};

/// Status code of a successful probe
const STATUS_OK: f64 = 0.0;

/// Why an address was not accepted as a panel.
///
/// Unrelated hosts announce services too, so a mismatch is routine.
#[derive(Error, Debug)]
pub enum ValidationMismatch {
    #[error("Probe failed: {0}")]
    Probe(#[from] MeshError),
    #[error("Probe reply is not a JSON object")]
    NotAnObject,
    #[error("Probe reply has no numeric status_code")]
    MissingStatus,
    #[error("Probe reply status_code is {0}")]
    Status(f64),
    #[error("Probe reply lacks the {0} header")]
    MissingHeader(&'static str),
}

/// Turn a probe reply from `address` into a confirmed device
pub fn confirm(address: &str, reply: &MeshInfoReply) -> Result<Device, ValidationMismatch> {
    if !reply.body.is_object() {
        return Err(ValidationMismatch::NotAnObject);
    }

    match reply.status_code() {
        Some(code) if code == STATUS_OK => {}
        Some(code) => return Err(ValidationMismatch::Status(code)),
        None => return Err(ValidationMismatch::MissingStatus),
    }

    let mac = reply
        .node_mac
        .as_deref()
        .ok_or(ValidationMismatch::MissingHeader(HEADER_NODE_MAC))?;
    let id = reply
        .node_num
        .as_deref()
        .ok_or(ValidationMismatch::MissingHeader(HEADER_NODE_NUM))?;

    Ok(Device::new(address, id, DeviceMac::new(mac)))
}

/// Confirms that an address speaks the mesh protocol
#[derive(Debug, Clone)]
pub struct DeviceValidator {
    client: MeshClient,
}

impl DeviceValidator {
    pub fn new(client: MeshClient) -> Self {
        Self { client }
    }

    /// Probe `address` and report why it is not a panel
    pub async fn check(&self, address: &str) -> Result<Device, ValidationMismatch> {
        let reply = self.client.probe(address).await?;
        confirm(address, &reply)
    }

    /// Probe `address`; mismatches are logged and yield `None`
    pub async fn validate(&self, address: &str) -> Option<Device> {
        match self.check(address).await {
            Ok(device) => {
                info!(host = %device.host, id = %device.id, mac = %device.mac, "Confirmed panel");
                Some(device)
            }
            Err(e) => {
                debug!(host = %address, reason = %e, "Address is not a panel");
                None
            }
        }
    }
}
