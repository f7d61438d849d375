//! Traffic-light phases and remote phase readings

use serde::{Deserialize, Serialize};
use std::fmt;

/// Traffic-light phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrafficLightPhase {
    Red,
    RedYellow,
    Green,
    Yellow,
    Off,
}

impl TrafficLightPhase {
    /// Decode a phase token (case-sensitive)
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "red" => Some(Self::Red),
            "redyellow" => Some(Self::RedYellow),
            "green" => Some(Self::Green),
            "yellow" => Some(Self::Yellow),
            "off" => Some(Self::Off),
            _ => None,
        }
    }

    /// Token used on the wire
    pub fn as_token(&self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::RedYellow => "redyellow",
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Off => "off",
        }
    }

    /// Phases that require the vehicle to stop
    pub fn requires_stop(&self) -> bool {
        matches!(self, Self::Red | Self::RedYellow)
    }
}

impl fmt::Display for TrafficLightPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

/// Last phase reported on the remote channel
///
/// Unknown tokens are kept verbatim rather than rejected at ingestion; the
/// fusion step treats them as "no recognized phase".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseReading {
    Recognized(TrafficLightPhase),
    Unrecognized(String),
}

impl PhaseReading {
    /// Classify a raw token
    pub fn from_token(token: &str) -> Self {
        match TrafficLightPhase::from_token(token) {
            Some(phase) => Self::Recognized(phase),
            None => Self::Unrecognized(token.to_string()),
        }
    }

    /// Recognized phase, if any
    pub fn phase(&self) -> Option<TrafficLightPhase> {
        match self {
            Self::Recognized(phase) => Some(*phase),
            Self::Unrecognized(_) => None,
        }
    }

    /// Token as it appears on the status feed
    pub fn token(&self) -> &str {
        match self {
            Self::Recognized(phase) => phase.as_token(),
            Self::Unrecognized(raw) => raw,
        }
    }
}

impl Default for PhaseReading {
    fn default() -> Self {
        Self::Recognized(TrafficLightPhase::Red)
    }
}

impl From<TrafficLightPhase> for PhaseReading {
    fn from(phase: TrafficLightPhase) -> Self {
        Self::Recognized(phase)
    }
}

impl fmt::Display for PhaseReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}
