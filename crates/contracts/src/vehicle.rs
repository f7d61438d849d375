//! VehicleDriver trait - vehicle abstraction
//!
//! Sensor read, lane-following image processing and actuation live behind
//! this trait. The coordinator only sees a snapshot in and a command out.

use serde::{Deserialize, Serialize};

use crate::{ContractError, Frame};

/// Sensor readings for one cycle
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSnapshot {
    /// Current steering angle
    pub steer: f32,

    /// Camera gimbal pan
    pub pan: i32,

    /// Camera gimbal tilt
    pub tilt: i32,

    /// Supply voltage
    pub voltage: f32,

    /// Camera frame
    pub frame: Frame,

    /// Vehicle requests termination (local window closed, kill switch, ...)
    pub terminate: bool,
}

/// Actuator command for one cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActuatorCommand {
    /// Forward speed (never negative: reverse is not actuated)
    pub speed: i32,

    /// Steering angle
    pub steer: f32,
}

/// Vehicle abstraction
///
/// Calls are synchronous and happen on the control loop only.
pub trait VehicleDriver: Send {
    /// Vehicle name (used for logging)
    fn name(&self) -> &str;

    /// Read all sensors
    fn read_sensors(&mut self) -> Result<SensorSnapshot, ContractError>;

    /// Run one lane-following step on the frame and return the steering angle
    fn run_lane_following_step(&mut self, frame: &Frame, speed: i32)
        -> Result<f32, ContractError>;

    /// Reset accumulated steering-control terms
    fn reset_control_terms(&mut self);

    /// Drive the actuators
    fn command_actuators(&mut self, command: ActuatorCommand) -> Result<(), ContractError>;

    /// Release hardware resources; no calls follow
    fn release(&mut self);
}
