//! Simulated vehicle
//!
//! Renders a synthetic road frame with a drifting lane marker, steers toward
//! it with a PI controller and records every actuator command. Faults and the
//! terminate flag can be injected after a number of sensor reads.

use std::sync::Arc;

use contracts::{
    ActuatorCommand, ContractError, Frame, SensorSnapshot, SimulatedVehicleConfig, VehicleDriver,
};
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, VehicleError};
use self::road::road_frame;

/// Integral gain of the lane controller
const INTEGRAL_GAIN: f32 = 0.01;

/// Steering saturation (degrees)
const MAX_STEER: f32 = 45.0;

/// Lane marker drift per sensor read (pixels)
const LANE_DRIFT_PX: f32 = 3.0;

/// Lane marker drift amplitude as a fraction of frame width
const LANE_DRIFT_RANGE: f32 = 0.2;

#[derive(Debug, Default)]
struct ProbeState {
    reads: u64,
    lane_steps: u64,
    resets: u64,
    commands: Vec<ActuatorCommand>,
    released: bool,
}

/// Read-only view of what the vehicle was asked to do
///
/// Stays usable after the vehicle itself has been moved into the control loop.
#[derive(Debug, Clone, Default)]
pub struct VehicleProbe {
    inner: Arc<Mutex<ProbeState>>,
}

impl VehicleProbe {
    /// Sensor reads served (including the faulting one)
    pub fn reads(&self) -> u64 {
        self.inner.lock().reads
    }

    /// Lane-following steps run
    pub fn lane_steps(&self) -> u64 {
        self.inner.lock().lane_steps
    }

    /// Times the steering terms were reset
    pub fn resets(&self) -> u64 {
        self.inner.lock().resets
    }

    /// Actuator commands in order
    pub fn commands(&self) -> Vec<ActuatorCommand> {
        self.inner.lock().commands.clone()
    }

    /// Speeds of all actuator commands
    pub fn speeds(&self) -> Vec<i32> {
        self.inner.lock().commands.iter().map(|c| c.speed).collect()
    }

    pub fn is_released(&self) -> bool {
        self.inner.lock().released
    }
}

/// In-process [`VehicleDriver`]
#[derive(Debug)]
pub struct SimulatedVehicle {
    config: SimulatedVehicleConfig,
    probe: VehicleProbe,
    reads: u64,
    steer: f32,
    integral: f32,
    released: bool,
}

impl SimulatedVehicle {
    pub fn new(config: SimulatedVehicleConfig) -> Self {
        info!(
            vehicle = %config.name,
            width = config.frame_width,
            height = config.frame_height,
            "simulated vehicle ready"
        );
        Self {
            config,
            probe: VehicleProbe::default(),
            reads: 0,
            steer: 0.0,
            integral: 0.0,
            released: false,
        }
    }

    /// Handle for observing the vehicle from tests
    pub fn probe(&self) -> VehicleProbe {
        self.probe.clone()
    }

    fn ensure_active(&self) -> Result<()> {
        if self.released {
            Err(VehicleError::Released {
                vehicle: self.config.name.clone(),
            })
        } else {
            Ok(())
        }
    }

    /// Lane marker column for the current read
    fn lane_x(&self) -> u32 {
        let width = self.config.frame_width as f32;
        let range = (width * LANE_DRIFT_RANGE).max(1.0);
        // triangle wave around the centre
        let phase = (self.reads as f32 * LANE_DRIFT_PX) % (4.0 * range);
        let offset = if phase < 2.0 * range {
            phase - range
        } else {
            3.0 * range - phase
        };
        (width / 2.0 + offset).clamp(0.0, width - 1.0) as u32
    }

    fn read(&mut self) -> Result<SensorSnapshot> {
        self.ensure_active()?;
        self.reads += 1;
        self.probe.inner.lock().reads = self.reads;

        if let Some(limit) = self.config.fail_after_cycles {
            if self.reads > limit {
                return Err(VehicleError::sensor_read(
                    &self.config.name,
                    format!("simulated sensor fault after {limit} reads"),
                ));
            }
        }

        let terminate = self
            .config
            .terminate_after_cycles
            .is_some_and(|limit| self.reads > limit);

        let frame = road_frame(
            self.config.frame_width,
            self.config.frame_height,
            self.lane_x(),
        );

        Ok(SensorSnapshot {
            steer: self.steer,
            pan: self.config.pan,
            tilt: self.config.tilt,
            voltage: self.config.voltage,
            frame,
            terminate,
        })
    }

    fn lane_step(&mut self, frame: &Frame, speed: i32) -> Result<f32> {
        self.ensure_active()?;
        self.probe.inner.lock().lane_steps += 1;

        let Some(lane_x) = road::find_lane(frame) else {
            debug!("no lane marker found, holding steering");
            return Ok(self.steer);
        };

        let error = lane_x as f32 - frame.width as f32 / 2.0;
        if speed > 0 {
            self.integral += error;
        }
        let steer = (self.config.steer_gain * error + INTEGRAL_GAIN * self.integral)
            .clamp(-MAX_STEER, MAX_STEER);
        Ok(steer)
    }

    fn actuate(&mut self, command: ActuatorCommand) -> Result<()> {
        self.ensure_active()?;
        if command.speed < 0 {
            return Err(VehicleError::actuator(
                &self.config.name,
                format!("negative speed {} not supported", command.speed),
            ));
        }
        self.steer = command.steer;
        self.probe.inner.lock().commands.push(command);
        Ok(())
    }
}

impl VehicleDriver for SimulatedVehicle {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn read_sensors(&mut self) -> std::result::Result<SensorSnapshot, ContractError> {
        Ok(self.read()?)
    }

    fn run_lane_following_step(
        &mut self,
        frame: &Frame,
        speed: i32,
    ) -> std::result::Result<f32, ContractError> {
        Ok(self.lane_step(frame, speed)?)
    }

    fn reset_control_terms(&mut self) {
        self.integral = 0.0;
        self.probe.inner.lock().resets += 1;
    }

    fn command_actuators(&mut self, command: ActuatorCommand) -> std::result::Result<(), ContractError> {
        Ok(self.actuate(command)?)
    }

    #[instrument(name = "vehicle_release", skip(self), fields(vehicle = %self.config.name))]
    fn release(&mut self) {
        if self.released {
            warn!("vehicle already released");
            return;
        }
        self.released = true;
        self.steer = 0.0;
        self.probe.inner.lock().released = true;
        info!(reads = self.reads, "vehicle released");
    }
}

/// Synthetic road imagery
mod road {
    use contracts::Frame;

    const ROAD: [u8; 3] = [60, 60, 60];
    const MARKER: [u8; 3] = [250, 250, 250];
    const MARKER_HALF_WIDTH: u32 = 2;
    const MARKER_THRESHOLD: u8 = 200;

    /// Grey road with a vertical white lane marker centred on `lane_x`
    pub fn road_frame(width: u32, height: u32, lane_x: u32) -> Frame {
        let mut data = Vec::with_capacity(width as usize * height as usize * Frame::CHANNELS);
        for _ in 0..height {
            for x in 0..width {
                let on_marker = x.abs_diff(lane_x) <= MARKER_HALF_WIDTH;
                data.extend_from_slice(if on_marker { &MARKER } else { &ROAD });
            }
        }
        Frame {
            width,
            height,
            data: data.into(),
        }
    }

    /// Mean column of bright pixels on the bottom row
    pub fn find_lane(frame: &Frame) -> Option<u32> {
        if frame.height == 0 {
            return None;
        }
        let y = frame.height - 1;
        let (sum, count) = (0..frame.width)
            .filter(|&x| {
                frame
                    .pixel(x, y)
                    .is_some_and(|px| px.iter().all(|&c| c >= MARKER_THRESHOLD))
            })
            .fold((0u64, 0u64), |(sum, count), x| (sum + x as u64, count + 1));
        (count > 0).then(|| (sum / count) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> SimulatedVehicleConfig {
        SimulatedVehicleConfig {
            frame_width: 64,
            frame_height: 48,
            ..Default::default()
        }
    }

    #[test]
    fn test_read_produces_configured_frame() {
        let mut vehicle = SimulatedVehicle::new(small_config());
        let snap = vehicle.read_sensors().unwrap();
        assert_eq!(snap.frame.width, 64);
        assert_eq!(snap.frame.height, 48);
        assert_eq!(snap.frame.data.len(), 64 * 48 * 3);
        assert_eq!(snap.pan, 90);
        assert!(!snap.terminate);
    }

    #[test]
    fn test_lane_found_in_frame() {
        let frame = road::road_frame(64, 8, 40);
        assert_eq!(road::find_lane(&frame), Some(40));
        let blank = Frame::solid(64, 8, [0, 0, 0]);
        assert_eq!(road::find_lane(&blank), None);
    }

    #[test]
    fn test_lane_step_steers_toward_marker() {
        let mut vehicle = SimulatedVehicle::new(small_config());
        let right = road::road_frame(64, 8, 50);
        assert!(vehicle.run_lane_following_step(&right, 10).unwrap() > 0.0);

        vehicle.reset_control_terms();
        let left = road::road_frame(64, 8, 10);
        assert!(vehicle.run_lane_following_step(&left, 10).unwrap() < 0.0);
        assert_eq!(vehicle.probe().resets(), 1);
        assert_eq!(vehicle.probe().lane_steps(), 2);
    }

    #[test]
    fn test_fault_injection() {
        let mut config = small_config();
        config.fail_after_cycles = Some(2);
        let mut vehicle = SimulatedVehicle::new(config);
        assert!(vehicle.read_sensors().is_ok());
        assert!(vehicle.read_sensors().is_ok());
        let err = vehicle.read_sensors().unwrap_err();
        assert!(matches!(err, ContractError::Vehicle { .. }));
    }

    #[test]
    fn test_terminate_flag() {
        let mut config = small_config();
        config.terminate_after_cycles = Some(1);
        let mut vehicle = SimulatedVehicle::new(config);
        assert!(!vehicle.read_sensors().unwrap().terminate);
        assert!(vehicle.read_sensors().unwrap().terminate);
    }

    #[test]
    fn test_commands_recorded_and_negative_rejected() {
        let mut vehicle = SimulatedVehicle::new(small_config());
        let probe = vehicle.probe();
        vehicle
            .command_actuators(ActuatorCommand { speed: 5, steer: 1.5 })
            .unwrap();
        assert!(vehicle
            .command_actuators(ActuatorCommand { speed: -1, steer: 0.0 })
            .is_err());
        assert_eq!(probe.speeds(), vec![5]);
        assert_eq!(vehicle.read_sensors().unwrap().steer, 1.5);
    }

    #[test]
    fn test_release_blocks_further_calls() {
        let mut vehicle = SimulatedVehicle::new(small_config());
        let probe = vehicle.probe();
        vehicle.release();
        vehicle.release();
        assert!(probe.is_released());
        assert!(vehicle.read_sensors().is_err());
    }
}
