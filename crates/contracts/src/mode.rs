//! OperatingMode - top-level policy selector

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating mode of the coordinator
///
/// Selects which control policy governs the current cycle. The wire names
/// are the payloads accepted on the mode-control topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OperatingMode {
    /// Stationary, steering terms reset
    #[default]
    Standby,
    /// Lane following with a speed ramp up to cruise
    LaneFollow,
    /// Speed gated by the remotely reported traffic-light phase
    PhaseFromRemote,
    /// Speed gated by the locally detected traffic-light phase
    PhaseFromDetector,
    /// Terminate the control loop
    Quit,
}

impl OperatingMode {
    /// All modes, in wire order
    pub const ALL: [OperatingMode; 5] = [
        Self::Standby,
        Self::LaneFollow,
        Self::PhaseFromRemote,
        Self::PhaseFromDetector,
        Self::Quit,
    ];

    /// Decode a mode-control payload (case-sensitive)
    pub fn from_wire(payload: &str) -> Option<Self> {
        match payload {
            "standby" => Some(Self::Standby),
            "lanedetection" => Some(Self::LaneFollow),
            "tlviamqtt" => Some(Self::PhaseFromRemote),
            "tlviacnn" => Some(Self::PhaseFromDetector),
            "quit" => Some(Self::Quit),
            _ => None,
        }
    }

    /// Name used on the wire and on the status feed
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Standby => "standby",
            Self::LaneFollow => "lanedetection",
            Self::PhaseFromRemote => "tlviamqtt",
            Self::PhaseFromDetector => "tlviacnn",
            Self::Quit => "quit",
        }
    }

    /// Whether the loop must stop before actuating
    pub fn is_quit(&self) -> bool {
        matches!(self, Self::Quit)
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}
