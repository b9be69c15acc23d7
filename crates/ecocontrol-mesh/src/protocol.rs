//! Wire format of the mesh-HTTP protocol

use ecocontrol_core::Characteristic;
use serde::Serialize;
use serde_json::Value;

/// Discovery probe path (GET, no identity headers)
pub const MESH_INFO_PATH: &str = "/mesh_info";

/// Path for every request addressed to a confirmed node
pub const DEVICE_REQUEST_PATH: &str = "/device_request";

/// Identity header carrying the node MAC
pub const HEADER_NODE_MAC: &str = "Mesh-Node-Mac";

/// Identity header carrying the node number
pub const HEADER_NODE_NUM: &str = "Mesh-Node-Num";

/// Characteristic id of the heating setpoint
pub const SETPOINT_CID: u32 = 19;

/// Requests sent to `/device_request`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "request")]
pub enum DeviceRequest {
    /// Device metadata, currently informational only
    #[serde(rename = "getDeviceData")]
    GetDeviceData { start: u8 },
    /// Current characteristics
    #[serde(rename = "get_device_info")]
    GetDeviceInfo,
    /// Write characteristics, addressed by cid
    #[serde(rename = "set_status")]
    SetStatus { characteristics: Vec<Characteristic> },
}

impl DeviceRequest {
    pub fn device_data() -> Self {
        Self::GetDeviceData { start: 1 }
    }

    pub fn device_info() -> Self {
        Self::GetDeviceInfo
    }

    pub fn set_setpoint(value: f64) -> Self {
        Self::SetStatus {
            characteristics: vec![Characteristic::write(SETPOINT_CID, value)],
        }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetDeviceData { .. } => "getDeviceData",
            Self::GetDeviceInfo => "get_device_info",
            Self::SetStatus { .. } => "set_status",
        }
    }
}

/// Extract the characteristics from a `get_device_info` reply.
///
/// The reply must be an object holding a `characteristics` array. Array
/// entries that are not objects are skipped. Reads are matched by name, so a
/// `cid` that is not a valid id is dropped rather than the whole entry.
pub fn parse_characteristics(reply: &Value) -> Result<Vec<Characteristic>, String> {
    let object = reply
        .as_object()
        .ok_or_else(|| "state reply is not an object".to_string())?;

    let entries = object
        .get("characteristics")
        .and_then(Value::as_array)
        .ok_or_else(|| "state reply has no characteristics array".to_string())?;

    Ok(entries
        .iter()
        .filter_map(Value::as_object)
        .map(|entry| Characteristic {
            name: entry.get("name").and_then(Value::as_str).map(str::to_string),
            value: entry.get("value").cloned().unwrap_or(Value::Null),
            cid: entry
                .get("cid")
                .and_then(Value::as_u64)
                .and_then(|cid| u32::try_from(cid).ok()),
        })
        .collect())
}
