//! Speed policy per mode

use contracts::{ControlConfig, PhaseReading, TrafficLightPhase};

/// Speed targets and lane-follow ramp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeedPolicy {
    pub cruise: i32,
    pub reduced: i32,
    pub ramp_step: i32,
}

impl SpeedPolicy {
    pub fn new(config: &ControlConfig) -> Self {
        Self {
            cruise: config.cruise_speed,
            reduced: config.reduced_speed,
            ramp_step: config.ramp_step,
        }
    }

    /// Target speed for a phase
    ///
    /// Red / RedYellow stop, Yellow slows down, Green and Off run at cruise.
    pub fn for_phase(&self, phase: TrafficLightPhase) -> i32 {
        if phase.requires_stop() {
            0
        } else if phase == TrafficLightPhase::Yellow {
            self.reduced
        } else {
            self.cruise
        }
    }

    /// Speed under a remotely reported phase
    ///
    /// `off` and unrecognized tokens hold `last`.
    pub fn for_remote(&self, reading: &PhaseReading, last: i32) -> i32 {
        match reading.phase() {
            Some(TrafficLightPhase::Off) | None => last,
            Some(phase) => self.for_phase(phase),
        }
    }

    /// Next lane-follow speed: one ramp step up, capped at cruise
    pub fn ramp(&self, last: i32) -> i32 {
        last.saturating_add(self.ramp_step).min(self.cruise).max(0)
    }
}

impl Default for SpeedPolicy {
    fn default() -> Self {
        Self::new(&ControlConfig::default())
    }
}
