//! Ecocontrol Core - Device identity and state types
//!
//! This crate provides the foundational types shared by the other crates:
//! - Device identity records for confirmed mesh nodes
//! - The typed state mirror (room and setpoint temperature)
//! - Wire-level characteristics and the mapping from characteristic names to state fields

pub mod device;
pub mod state;

pub use device::{Device, DeviceMac, MANUFACTURER, MODEL, SERVICE_NAME};
pub use state::{
    number_value, Characteristic, DeviceState, StateField, DEFAULT_TARGET_TEMPERATURE,
};
