//! Inbound message decoding
//!
//! Every message is decoded once into a closed [`Command`] or an explicit
//! [`Decoded::Ignored`] outcome before anything touches shared state.

use std::fmt;

use contracts::{InboundMessage, OperatingMode, PhaseReading, TopicConfig};
use phase_tracker::PhaseTracker;

/// Manual driving request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualAction {
    Go,
    Stop,
    /// Reversing is not supported; treated as a stop
    Backwards,
}

impl ManualAction {
    /// Parse a lowercased manual action payload
    pub fn from_payload(payload: &str) -> Option<Self> {
        match payload.to_lowercase().as_str() {
            "go" => Some(Self::Go),
            "stop" => Some(Self::Stop),
            "backwards" => Some(Self::Backwards),
            _ => None,
        }
    }

    /// Mode the action switches to
    pub fn target_mode(self) -> OperatingMode {
        match self {
            Self::Go => OperatingMode::LaneFollow,
            Self::Stop | Self::Backwards => OperatingMode::Standby,
        }
    }

    pub fn note(self) -> &'static str {
        match self {
            Self::Go => "Manual: Go",
            Self::Stop => "Manual: Stop",
            Self::Backwards => "Manual: Backwards (stop for safety)",
        }
    }
}

/// Decoded control message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetMode(OperatingMode),
    Manual(ManualAction),
    /// Raw phase token, stored without validation
    RemotePhase(String),
    Sound(String),
}

impl Command {
    /// Metric label for the command kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SetMode(_) => "mode",
            Self::Manual(_) => "manual",
            Self::RemotePhase(_) => "phase",
            Self::Sound(_) => "sound",
        }
    }

    /// Apply to the tracker
    ///
    /// Each branch writes its fields and the action note under one lock so a
    /// concurrent snapshot sees either none or all of the update. Returns
    /// `false` when a mode change was rejected because quit is pending.
    pub fn apply(&self, tracker: &PhaseTracker) -> bool {
        match self {
            Self::SetMode(mode) => {
                tracker.set_mode_with_note(*mode, format!("Mode set to {}", mode.as_wire()))
            }
            Self::Manual(action) => tracker.set_mode_with_note(action.target_mode(), action.note()),
            Self::RemotePhase(token) => {
                tracker.set_remote_phase_with_note(
                    PhaseReading::from_token(token),
                    format!("Remote phase: {token}"),
                );
                true
            }
            Self::Sound(payload) => {
                tracker.set_aux_event_with_note(payload.clone(), format!("Sound detected: {payload}"));
                true
            }
        }
    }
}

/// Why a message was not applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    UnknownTopic(String),
    UnknownMode(String),
    UnknownManualAction(String),
}

impl IgnoreReason {
    /// Metric label for the command kind the message was addressed to
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownTopic(_) => "unknown",
            Self::UnknownMode(_) => "mode",
            Self::UnknownManualAction(_) => "manual",
        }
    }
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTopic(topic) => write!(f, "message on unhandled topic '{topic}'"),
            Self::UnknownMode(payload) => write!(f, "unknown mode '{payload}'"),
            Self::UnknownManualAction(payload) => write!(f, "unknown manual action '{payload}'"),
        }
    }
}

/// Decode outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Apply(Command),
    Ignored(IgnoreReason),
}

/// Decode an inbound message against the configured topics
///
/// Payloads are UTF-8 decoded (lossy) and matched exactly; no trimming.
pub fn decode(msg: &InboundMessage, topics: &TopicConfig) -> Decoded {
    let payload = msg.payload_str();
    let topic = msg.topic.as_str();

    if topic == topics.mode {
        match OperatingMode::from_wire(&payload) {
            Some(mode) => Decoded::Apply(Command::SetMode(mode)),
            None => Decoded::Ignored(IgnoreReason::UnknownMode(payload)),
        }
    } else if topic == topics.manual_action {
        match ManualAction::from_payload(&payload) {
            Some(action) => Decoded::Apply(Command::Manual(action)),
            None => Decoded::Ignored(IgnoreReason::UnknownManualAction(payload)),
        }
    } else if topic == topics.remote_phase {
        Decoded::Apply(Command::RemotePhase(payload))
    } else if topic == topics.sound {
        Decoded::Apply(Command::Sound(payload))
    } else {
        Decoded::Ignored(IgnoreReason::UnknownTopic(msg.topic.clone()))
    }
}
