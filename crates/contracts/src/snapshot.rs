//! ControlSnapshot - Control Cycle Engine output
//!
//! Immutable per-cycle record handed to the status publisher.

use serde::{Deserialize, Serialize};

use crate::{OperatingMode, PhaseReading};

/// Status feed fields, one topic each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusField {
    Mode,
    Speed,
    Steer,
    CameraPan,
    CameraTilt,
    Phase,
    Voltage,
    Action,
    AuxEvent,
    Alive,
}

impl StatusField {
    /// All fields in publish order (liveness last)
    pub const ALL: [StatusField; 10] = [
        Self::Mode,
        Self::Speed,
        Self::Steer,
        Self::CameraPan,
        Self::CameraTilt,
        Self::Phase,
        Self::Voltage,
        Self::Action,
        Self::AuxEvent,
        Self::Alive,
    ];

    /// Topic suffix under the status prefix
    pub fn topic_suffix(&self) -> &'static str {
        match self {
            Self::Mode => "mode",
            Self::Speed => "speed",
            Self::Steer => "steer",
            Self::CameraPan => "campan",
            Self::CameraTilt => "camtilt",
            Self::Phase => "tlphase",
            Self::Voltage => "vcc",
            Self::Action => "action",
            Self::AuxEvent => "sound",
            Self::Alive => "alive",
        }
    }
}

/// Per-cycle status record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlSnapshot {
    /// Cycle number (1-based)
    pub cycle: u64,

    /// Mode that governed the cycle
    pub mode: OperatingMode,

    /// Commanded speed
    pub speed: i32,

    /// Commanded steering angle
    pub steer: f32,

    /// Camera pan
    pub pan: i32,

    /// Camera tilt
    pub tilt: i32,

    /// Phase selected for reporting
    pub reported_phase: PhaseReading,

    /// Supply voltage
    pub voltage: f32,

    /// Human-readable current action
    pub action: String,

    /// Last auxiliary event heard
    pub aux_event: String,

    /// Liveness flag
    pub alive: bool,
}

impl ControlSnapshot {
    /// Render one field as its status payload
    pub fn field_payload(&self, field: StatusField) -> String {
        match field {
            StatusField::Mode => self.mode.as_wire().to_string(),
            StatusField::Speed => self.speed.to_string(),
            StatusField::Steer => self.steer.to_string(),
            StatusField::CameraPan => self.pan.to_string(),
            StatusField::CameraTilt => self.tilt.to_string(),
            StatusField::Phase => self.reported_phase.token().to_string(),
            StatusField::Voltage => format!("{:.2}", self.voltage),
            StatusField::Action => self.action.clone(),
            StatusField::AuxEvent => self.aux_event.clone(),
            StatusField::Alive => self.alive.to_string(),
        }
    }

    /// All fields with their payloads, in publish order
    pub fn field_payloads(&self) -> Vec<(StatusField, String)> {
        StatusField::ALL
            .iter()
            .map(|field| (*field, self.field_payload(*field)))
            .collect()
    }
}
