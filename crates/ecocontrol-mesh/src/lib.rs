//! Ecocontrol Mesh - JSON-over-HTTP client for mesh nodes
//!
//! Every exchange with a panel is a single HTTP request whose body is parsed
//! as JSON. The client is stateless and can be shared across devices.

pub mod client;
pub mod protocol;

pub use client::{MeshClient, MeshError, MeshInfoReply, DEFAULT_TIMEOUT};
pub use protocol::{
    parse_characteristics, DeviceRequest, DEVICE_REQUEST_PATH, HEADER_NODE_MAC, HEADER_NODE_NUM,
    MESH_INFO_PATH, SETPOINT_CID,
};
