//! Typed state mirror and wire characteristics

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Target temperature reported while the panel has not told us its setpoint yet
pub const DEFAULT_TARGET_TEMPERATURE: f64 = 15.0;

/// The state fields a panel reports by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateField {
    RoomTemperature,
    SetpointTemperature,
}

impl StateField {
    pub const ALL: [StateField; 2] = [StateField::RoomTemperature, StateField::SetpointTemperature];

    /// Map a characteristic name to a field. Names must match exactly;
    /// anything else is unknown and yields `None`.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "RoomTemperature" => Some(Self::RoomTemperature),
            "SetpointTemperature" => Some(Self::SetpointTemperature),
            _ => None,
        }
    }

    pub fn wire_name(self) -> &'static str {
        match self {
            Self::RoomTemperature => "RoomTemperature",
            Self::SetpointTemperature => "SetpointTemperature",
        }
    }
}

impl std::fmt::Display for StateField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// A single data point exchanged with a panel
///
/// Reads identify characteristics by `name`, writes by `cid`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Characteristic {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<u32>,
}

impl Characteristic {
    /// Characteristic as reported by a panel
    pub fn named(name: &str, value: Value) -> Self {
        Self {
            name: Some(name.to_string()),
            value,
            cid: None,
        }
    }

    /// Characteristic for a write request, addressed by `cid`
    pub fn write(cid: u32, value: f64) -> Self {
        Self {
            name: None,
            value: number_value(value),
            cid: Some(cid),
        }
    }

    /// Known state field this characteristic carries, if any
    pub fn field(&self) -> Option<StateField> {
        self.name.as_deref().and_then(StateField::from_wire)
    }

    /// Numeric value; numeric strings are accepted, everything else is `None`
    pub fn numeric_value(&self) -> Option<f64> {
        let value = match &self.value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }?;
        value.is_finite().then_some(value)
    }
}

/// Encode a number as JSON, using an integer when it has no fractional part
pub fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}

/// Typed mirror of a panel's state. `None` means not reported yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceState {
    pub room_temperature: Option<f64>,
    pub setpoint_temperature: Option<f64>,
}

impl DeviceState {
    pub fn get(&self, field: StateField) -> Option<f64> {
        match field {
            StateField::RoomTemperature => self.room_temperature,
            StateField::SetpointTemperature => self.setpoint_temperature,
        }
    }

    pub fn set(&mut self, field: StateField, value: f64) {
        match field {
            StateField::RoomTemperature => self.room_temperature = Some(value),
            StateField::SetpointTemperature => self.setpoint_temperature = Some(value),
        }
    }

    /// State after applying a panel report.
    ///
    /// Characteristics with unknown names or non-numeric values are skipped.
    /// When a field appears more than once the last occurrence wins.
    pub fn merged(&self, characteristics: &[Characteristic]) -> DeviceState {
        let mut next = *self;
        for characteristic in characteristics {
            let Some(field) = characteristic.field() else {
                continue;
            };
            if let Some(value) = characteristic.numeric_value() {
                next.set(field, value);
            }
        }
        next
    }

    /// Setpoint to show a user, falling back to the panel minimum while unknown
    pub fn target_temperature(&self) -> f64 {
        self.setpoint_temperature
            .unwrap_or(DEFAULT_TARGET_TEMPERATURE)
    }
}
