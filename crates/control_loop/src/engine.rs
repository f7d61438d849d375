//! Control cycle engine
//!
//! One cycle: tracker snapshot → sensor read → speed policy for the mode →
//! lane-following step → actuation → video hand-off → status publish.
//! `Quit` is only observed at the top of a cycle, so a cycle that has started
//! always completes.

use std::time::{Duration, Instant};

use contracts::{
    ActuatorCommand, ContractError, ControlConfig, ControlSnapshot, OperatingMode, PhaseReading,
    PubSubClient, TrafficLightPhase, VehicleDriver,
};
use detection::DetectionAdapter;
use phase_tracker::{PhaseTracker, TrackerSnapshot};
use publisher::{StatusPublisher, VideoStreamer};
use tracing::{debug, error, info, instrument, warn};

use crate::policy::SpeedPolicy;
use crate::stats::{CycleStats, StopReason};

/// Result of one `run_cycle` call
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Cycle ran to the end and published this snapshot
    Completed(ControlSnapshot),
    /// Loop must stop; nothing was actuated
    Stopped(StopReason),
}

/// Speed, reported phase and default action text chosen for one cycle
struct ModeDecision {
    speed: i32,
    reported_phase: PhaseReading,
    action: String,
}

/// Parts handed to the shutdown coordinator once the loop has ended
pub struct EngineParts<V, P> {
    pub vehicle: V,
    pub status: StatusPublisher<P>,
    pub video: Option<VideoStreamer>,
    pub stats: CycleStats,
    pub fault: Option<ContractError>,
}

/// Per-tick state machine driving the vehicle
pub struct ControlEngine<V, P> {
    vehicle: V,
    tracker: PhaseTracker,
    detector: DetectionAdapter,
    status: StatusPublisher<P>,
    video: Option<VideoStreamer>,
    policy: SpeedPolicy,
    min_cycle_period: Option<Duration>,
    max_cycles: Option<u64>,
    /// Last commanded speed, held across cycles
    last_speed: i32,
    last_mode: Option<OperatingMode>,
    /// Sequence of the newest action note already shown
    last_note_seq: u64,
    cycle: u64,
    stats: CycleStats,
    fault: Option<ContractError>,
}

impl<V, P> ControlEngine<V, P>
where
    V: VehicleDriver,
    P: PubSubClient + Sync,
{
    pub fn new(
        vehicle: V,
        tracker: PhaseTracker,
        detector: DetectionAdapter,
        status: StatusPublisher<P>,
        config: &ControlConfig,
    ) -> Self {
        Self {
            vehicle,
            tracker,
            detector,
            status,
            video: None,
            policy: SpeedPolicy::new(config),
            min_cycle_period: config.min_cycle_period(),
            max_cycles: None,
            last_speed: 0,
            last_mode: None,
            last_note_seq: 0,
            cycle: 0,
            stats: CycleStats::default(),
            fault: None,
        }
    }

    /// Stream every cycle's frame through `streamer`
    pub fn with_video(mut self, streamer: VideoStreamer) -> Self {
        self.video = Some(streamer);
        self
    }

    /// Stop after `limit` completed cycles
    pub fn with_max_cycles(mut self, limit: Option<u64>) -> Self {
        self.max_cycles = limit;
        self
    }

    pub fn last_speed(&self) -> i32 {
        self.last_speed
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    pub fn vehicle(&self) -> &V {
        &self.vehicle
    }

    /// Run cycles until a stop condition
    ///
    /// A vehicle error ends the loop with [`StopReason::VehicleFault`]; the
    /// error itself is kept for [`ControlEngine::into_parts`].
    #[instrument(name = "control_loop_run", skip(self), fields(vehicle = %self.vehicle.name()))]
    pub async fn run(&mut self) -> StopReason {
        let started = Instant::now();
        info!(
            cruise = self.policy.cruise,
            reduced = self.policy.reduced,
            detector = %self.detector.engine_name(),
            video = self.video.is_some(),
            "control loop started"
        );

        let reason = loop {
            let cycle_started = Instant::now();
            match self.run_cycle().await {
                Ok(CycleOutcome::Completed(_)) => {}
                Ok(CycleOutcome::Stopped(reason)) => break reason,
                Err(e) => {
                    error!(error = %e, "vehicle fault, leaving control loop");
                    let reason = StopReason::VehicleFault(e.to_string());
                    self.fault = Some(e);
                    break reason;
                }
            }
            self.throttle(cycle_started).await;
        };

        self.stats.duration = started.elapsed();
        self.stats.final_speed = self.last_speed;
        info!(
            reason = %reason,
            cycles = self.stats.cycles,
            final_speed = self.last_speed,
            "control loop stopped"
        );
        reason
    }

    /// Run a single cycle
    ///
    /// # Errors
    /// Returns the vehicle error when reading sensors, the lane step or
    /// actuation fails. Detection and publish failures are absorbed.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, ContractError> {
        let cycle_started = Instant::now();
        let tracked = self.tracker.snapshot();

        if tracked.mode.is_quit() {
            return Ok(CycleOutcome::Stopped(StopReason::QuitRequested));
        }
        if let Some(limit) = self.max_cycles {
            if self.cycle >= limit {
                return Ok(CycleOutcome::Stopped(StopReason::CycleLimit(limit)));
            }
        }
        self.log_mode_change(tracked.mode);

        let sensors = self.vehicle.read_sensors()?;
        if sensors.terminate {
            return Ok(CycleOutcome::Stopped(StopReason::VehicleTerminated));
        }

        let mut frame = sensors.frame;
        let decision = match tracked.mode {
            OperatingMode::Standby => ModeDecision {
                speed: 0,
                reported_phase: TrafficLightPhase::Off.into(),
                action: "Standby Mode".to_string(),
            },
            OperatingMode::LaneFollow => ModeDecision {
                speed: self.policy.ramp(self.last_speed),
                reported_phase: TrafficLightPhase::Off.into(),
                action: "Lane Detection Mode".to_string(),
            },
            OperatingMode::PhaseFromRemote => {
                let reading = tracked.remote_phase.clone();
                ModeDecision {
                    speed: self.policy.for_remote(&reading, self.last_speed),
                    action: format!("TL via MQTT: {}", reading.token()),
                    reported_phase: reading,
                }
            }
            OperatingMode::PhaseFromDetector => {
                let outcome = self.detector.detect(&frame).await;
                if outcome.degraded {
                    self.stats.detection_failures += 1;
                }
                frame = outcome.annotated;
                ModeDecision {
                    speed: self.policy.for_phase(outcome.phase),
                    reported_phase: outcome.phase.into(),
                    action: format!("TL via CNN: {}", outcome.phase),
                }
            }
            OperatingMode::Quit => return Ok(CycleOutcome::Stopped(StopReason::QuitRequested)),
        };

        let steer = if tracked.mode == OperatingMode::Standby {
            self.vehicle.reset_control_terms();
            sensors.steer
        } else {
            self.vehicle.run_lane_following_step(&frame, decision.speed)?
        };

        self.vehicle.command_actuators(ActuatorCommand {
            speed: decision.speed,
            steer,
        })?;
        self.last_speed = decision.speed;

        if let Some(video) = &self.video {
            video.offer(frame);
        }

        self.cycle += 1;
        let snapshot = ControlSnapshot {
            cycle: self.cycle,
            mode: tracked.mode,
            speed: decision.speed,
            steer,
            pan: sensors.pan,
            tilt: sensors.tilt,
            action: self.action_text(&tracked, decision.action),
            reported_phase: decision.reported_phase,
            voltage: sensors.voltage,
            aux_event: tracked.aux_event,
            alive: true,
        };

        let report = self.status.publish_status(&snapshot).await;
        self.stats.publish_failures += report.failed as u64;

        let elapsed = cycle_started.elapsed();
        self.stats.record_cycle(snapshot.mode, snapshot.speed, elapsed);
        observability::record_cycle_metrics(&snapshot, elapsed);
        debug!(
            cycle = snapshot.cycle,
            mode = %snapshot.mode,
            speed = snapshot.speed,
            steer = snapshot.steer,
            phase = %snapshot.reported_phase,
            "cycle complete"
        );

        Ok(CycleOutcome::Completed(snapshot))
    }

    /// Hand everything needed for teardown to the caller
    pub fn into_parts(self) -> EngineParts<V, P> {
        EngineParts {
            vehicle: self.vehicle,
            status: self.status,
            video: self.video,
            stats: self.stats,
            fault: self.fault,
        }
    }

    /// A new action note is shown for exactly one cycle, then the mode text
    fn action_text(&mut self, tracked: &TrackerSnapshot, default: String) -> String {
        match &tracked.action {
            Some(note) if note.seq > self.last_note_seq => {
                self.last_note_seq = note.seq;
                note.text.clone()
            }
            _ => default,
        }
    }

    fn log_mode_change(&mut self, mode: OperatingMode) {
        if self.last_mode != Some(mode) {
            info!(from = ?self.last_mode.map(|m| m.as_wire()), to = %mode, "operating mode changed");
            self.last_mode = Some(mode);
        }
    }

    async fn throttle(&self, cycle_started: Instant) {
        if let Some(period) = self.min_cycle_period {
            let elapsed = cycle_started.elapsed();
            if elapsed < period {
                tokio::time::sleep(period - elapsed).await;
            } else if elapsed > period * 4 {
                warn!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    period_ms = period.as_millis() as u64,
                    "cycle overran minimum period"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        BoundingBox, Detection, DetectionConfig, DetectionEngine, SimulatedVehicleConfig,
        TopicConfig,
    };
    use detection::ScriptedDetectionEngine;
    use std::sync::Arc;
    use transport::LoopbackBus;
    use vehicle::{SimulatedVehicle, VehicleProbe};

    type TestEngine = ControlEngine<SimulatedVehicle, LoopbackBus>;

    struct Harness {
        engine: TestEngine,
        tracker: PhaseTracker,
        probe: VehicleProbe,
        bus: LoopbackBus,
    }

    fn vehicle_config() -> SimulatedVehicleConfig {
        SimulatedVehicleConfig {
            frame_width: 32,
            frame_height: 24,
            ..Default::default()
        }
    }

    fn harness_with(
        mode: OperatingMode,
        control: ControlConfig,
        vehicle: SimulatedVehicleConfig,
        engine: impl DetectionEngine + 'static,
    ) -> Harness {
        let (bus, _rx) = LoopbackBus::new(64);
        let tracker = PhaseTracker::with_initial(mode, PhaseReading::default());
        let vehicle = SimulatedVehicle::new(vehicle);
        let probe = vehicle.probe();
        let detector = DetectionAdapter::new(
            Arc::new(engine),
            &DetectionConfig::default(),
            control.detection_timeout(),
        );
        let status = StatusPublisher::new(
            bus.clone(),
            TopicConfig::default(),
            control.publish_timeout(),
        );
        let engine = ControlEngine::new(vehicle, tracker.clone(), detector, status, &control);
        Harness {
            engine,
            tracker,
            probe,
            bus,
        }
    }

    fn harness(mode: OperatingMode) -> Harness {
        harness_with(
            mode,
            ControlConfig::default(),
            vehicle_config(),
            ScriptedDetectionEngine::new(Vec::new()),
        )
    }

    async fn completed(engine: &mut TestEngine) -> ControlSnapshot {
        match engine.run_cycle().await.unwrap() {
            CycleOutcome::Completed(snapshot) => snapshot,
            CycleOutcome::Stopped(reason) => panic!("unexpected stop: {reason}"),
        }
    }

    fn det(class_id: usize, score: f32) -> Detection {
        Detection::new(class_id, score, BoundingBox::new(2.0, 2.0, 10.0, 10.0))
    }

    #[tokio::test]
    async fn test_standby_stops_and_resets() {
        let mut h = harness(OperatingMode::Standby);
        for _ in 0..3 {
            let snap = completed(&mut h.engine).await;
            assert_eq!(snap.speed, 0);
            assert_eq!(snap.reported_phase.token(), "off");
            assert_eq!(snap.action, "Standby Mode");
        }
        assert_eq!(h.probe.speeds(), vec![0, 0, 0]);
        assert_eq!(h.probe.resets(), 3);
        assert_eq!(h.probe.lane_steps(), 0);
    }

    #[tokio::test]
    async fn test_lane_follow_ramps_to_cruise() {
        let control = ControlConfig {
            cruise_speed: 5,
            reduced_speed: 3,
            ramp_step: 2,
            ..Default::default()
        };
        let mut h = harness_with(
            OperatingMode::LaneFollow,
            control,
            vehicle_config(),
            ScriptedDetectionEngine::new(Vec::new()),
        );
        for _ in 0..5 {
            completed(&mut h.engine).await;
        }
        assert_eq!(h.probe.speeds(), vec![2, 4, 5, 5, 5]);
        assert_eq!(h.probe.lane_steps(), 5);
    }

    #[tokio::test]
    async fn test_remote_phase_speeds() {
        let mut h = harness(OperatingMode::PhaseFromRemote);
        let cases = [
            ("green", 40),
            ("purple", 40),
            ("yellow", 30),
            ("off", 30),
            ("red", 0),
            ("bogus", 0),
            ("green", 40),
            ("redyellow", 0),
        ];
        for (token, expected) in cases {
            h.tracker.set_remote_phase(PhaseReading::from_token(token));
            let snap = completed(&mut h.engine).await;
            assert_eq!(snap.speed, expected, "token {token}");
            assert_eq!(snap.reported_phase.token(), token);
            assert_eq!(snap.action, format!("TL via MQTT: {token}"));
        }
    }

    #[tokio::test]
    async fn test_detector_red_outranks_green() {
        let mut h = harness_with(
            OperatingMode::PhaseFromDetector,
            ControlConfig::default(),
            vehicle_config(),
            ScriptedDetectionEngine::single(vec![det(0, 0.9), det(2, 0.99)]),
        );
        let snap = completed(&mut h.engine).await;
        assert_eq!(snap.speed, 0);
        assert_eq!(snap.reported_phase.token(), "red");
        assert_eq!(snap.action, "TL via CNN: red");
        assert_eq!(h.bus.published_on("SMARTCAR_status/tlphase"), vec!["red"]);
    }

    #[tokio::test]
    async fn test_detector_failure_degrades_to_full_speed() {
        let mut h = harness_with(
            OperatingMode::PhaseFromDetector,
            ControlConfig::default(),
            vehicle_config(),
            ScriptedDetectionEngine::failing("model missing"),
        );
        let snap = completed(&mut h.engine).await;
        assert_eq!(snap.speed, 40);
        assert_eq!(snap.reported_phase.token(), "off");
        assert_eq!(h.engine.stats().detection_failures, 1);
    }

    #[tokio::test]
    async fn test_action_note_shown_for_one_cycle() {
        let mut h = harness(OperatingMode::Standby);
        completed(&mut h.engine).await;

        h.tracker
            .set_mode_with_note(OperatingMode::LaneFollow, "Manual: Go");
        assert_eq!(completed(&mut h.engine).await.action, "Manual: Go");
        assert_eq!(completed(&mut h.engine).await.action, "Lane Detection Mode");
    }

    #[tokio::test]
    async fn test_backwards_never_moves() {
        let mut h = harness(OperatingMode::LaneFollow);
        completed(&mut h.engine).await;
        h.tracker
            .set_mode_with_note(OperatingMode::Standby, "Manual: Backwards (stop for safety)");
        let snap = completed(&mut h.engine).await;
        assert_eq!(snap.speed, 0);
        assert!(h.probe.speeds().iter().all(|s| *s >= 0));
    }

    #[tokio::test]
    async fn test_quit_checked_before_sensors() {
        let mut h = harness(OperatingMode::LaneFollow);
        h.tracker.request_quit("Shutdown requested");
        let outcome = h.engine.run_cycle().await.unwrap();
        assert_eq!(outcome, CycleOutcome::Stopped(StopReason::QuitRequested));
        assert_eq!(h.probe.reads(), 0);
        assert!(h.probe.commands().is_empty());
    }

    #[tokio::test]
    async fn test_vehicle_terminate_flag_stops_loop() {
        let mut vehicle = vehicle_config();
        vehicle.terminate_after_cycles = Some(2);
        let mut h = harness_with(
            OperatingMode::LaneFollow,
            ControlConfig::default(),
            vehicle,
            ScriptedDetectionEngine::new(Vec::new()),
        );
        let reason = h.engine.run().await;
        assert_eq!(reason, StopReason::VehicleTerminated);
        assert_eq!(h.probe.commands().len(), 2);
        assert_eq!(h.engine.stats().cycles, 2);
    }

    #[tokio::test]
    async fn test_vehicle_fault_kept_for_teardown() {
        let mut vehicle = vehicle_config();
        vehicle.fail_after_cycles = Some(1);
        let mut h = harness_with(
            OperatingMode::Standby,
            ControlConfig::default(),
            vehicle,
            ScriptedDetectionEngine::new(Vec::new()),
        );
        let reason = h.engine.run().await;
        assert!(reason.is_fault());

        let parts = h.engine.into_parts();
        assert!(matches!(parts.fault, Some(ContractError::Vehicle { .. })));
        assert_eq!(parts.stats.cycles, 1);
    }

    #[tokio::test]
    async fn test_cycle_limit() {
        let mut h = harness(OperatingMode::Standby);
        h.engine = h.engine.with_max_cycles(Some(3));
        assert_eq!(h.engine.run().await, StopReason::CycleLimit(3));
        assert_eq!(h.bus.published_on("SMARTCAR_status/alive").len(), 3);
    }

    #[tokio::test]
    async fn test_publish_failures_do_not_stop_loop() {
        let mut h = harness(OperatingMode::LaneFollow);
        h.bus.set_fail_publish(true);
        h.engine = h.engine.with_max_cycles(Some(2));
        assert_eq!(h.engine.run().await, StopReason::CycleLimit(2));
        assert_eq!(h.engine.stats().publish_failures, 20);
    }
}
