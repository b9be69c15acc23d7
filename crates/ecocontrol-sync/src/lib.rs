//! Ecocontrol Sync - Keeping a live state mirror per panel
//!
//! Each confirmed panel gets one [`DeviceSyncController`] that polls it on a
//! fixed period and writes setpoint changes. Controllers are owned by the
//! [`DeviceRegistry`], which guarantees one controller per MAC.

pub mod controller;
pub mod registry;
pub mod store;

pub use controller::{
    ControllerPhase, DeviceSyncController, SyncEvent, SyncOutcome, DEFAULT_SYNC_INTERVAL,
};
pub use registry::{DeviceRegistry, Registration};
pub use store::StateStore;
