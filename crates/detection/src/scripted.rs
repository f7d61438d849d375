//! Scripted detection engine
//!
//! Replays configured detection lists cyclically, one list per call. Stands
//! in for a real model in simulated runs and tests.

use contracts::{ContractError, Detection, DetectionConfig, DetectionEngine, Frame};
use parking_lot::Mutex;

#[derive(Debug)]
enum Script {
    Frames(Vec<Vec<Detection>>),
    Fail(String),
}

/// Engine returning pre-recorded detections
#[derive(Debug)]
pub struct ScriptedDetectionEngine {
    script: Script,
    cursor: Mutex<usize>,
}

impl ScriptedDetectionEngine {
    /// Replay `frames` in order, wrapping around; an empty script detects nothing
    pub fn new(frames: Vec<Vec<Detection>>) -> Self {
        Self {
            script: Script::Frames(frames),
            cursor: Mutex::new(0),
        }
    }

    /// Always return the same detections
    pub fn single(detections: Vec<Detection>) -> Self {
        Self::new(vec![detections])
    }

    /// Build from the `[detection]` config section
    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(
            config
                .script
                .iter()
                .map(|frame| frame.detections.clone())
                .collect(),
        )
    }

    /// Engine whose every call fails
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            script: Script::Fail(message.into()),
            cursor: Mutex::new(0),
        }
    }

    /// Number of calls served so far
    pub fn calls(&self) -> usize {
        *self.cursor.lock()
    }
}

impl DetectionEngine for ScriptedDetectionEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    fn detect(&self, _frame: &Frame) -> Result<Vec<Detection>, ContractError> {
        let mut cursor = self.cursor.lock();
        let call = *cursor;
        *cursor += 1;

        match &self.script {
            Script::Fail(message) => Err(ContractError::detection(self.name(), message.clone())),
            Script::Frames(frames) if frames.is_empty() => Ok(Vec::new()),
            Script::Frames(frames) => Ok(frames[call % frames.len()].clone()),
        }
    }
}
