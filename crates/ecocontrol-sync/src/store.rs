//! Per-device state store

use ecocontrol_core::{Characteristic, DeviceState};
use tokio::sync::watch;

/// Single source of truth for one panel's state.
///
/// Writes are synchronous and replace the whole state at once, so readers
/// never observe a partially applied report.
#[derive(Debug)]
pub struct StateStore {
    tx: watch::Sender<DeviceState>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    /// Store with every field unknown
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(DeviceState::default());
        Self { tx }
    }

    pub fn snapshot(&self) -> DeviceState {
        *self.tx.borrow()
    }

    /// Receiver notified on every change
    pub fn subscribe(&self) -> watch::Receiver<DeviceState> {
        self.tx.subscribe()
    }

    /// Record a requested setpoint ahead of the panel confirming it
    pub fn set_setpoint(&self, value: f64) {
        self.tx.send_modify(|state| state.setpoint_temperature = Some(value));
    }

    /// Apply a panel report and return the resulting state
    pub fn reconcile(&self, characteristics: &[Characteristic]) -> DeviceState {
        let mut next = DeviceState::default();
        self.tx.send_if_modified(|state| {
            next = state.merged(characteristics);
            let changed = next != *state;
            *state = next;
            changed
        });
        next
    }
}
