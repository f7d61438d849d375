//! # Integration Tests
//!
//! Cross-crate scenarios.
//!
//! Covers:
//! - contract snapshot checks
//! - end-to-end runs on the in-process bus (no broker, simulated vehicle)

#[cfg(test)]
mod contract_tests {
    use contracts::{OperatingMode, StatusField, TopicConfig};

    #[test]
    fn test_wire_names_stable() {
        let names: Vec<&str> = OperatingMode::ALL.iter().map(|m| m.as_wire()).collect();
        assert_eq!(
            names,
            ["standby", "lanedetection", "tlviamqtt", "tlviacnn", "quit"]
        );
    }

    #[test]
    fn test_status_topics_stable() {
        let topics = TopicConfig::default();
        let status: Vec<String> = StatusField::ALL
            .iter()
            .map(|f| topics.status_topic(*f))
            .collect();
        assert_eq!(status.first().map(String::as_str), Some("SMARTCAR_status/mode"));
        assert_eq!(status.last().map(String::as_str), Some("SMARTCAR_status/alive"));
        assert!(status.contains(&"SMARTCAR_status/tlphase".to_string()));
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use command_listener::{CommandListener, ListenerHandle};
    use contracts::{
        ActuatorCommand, BoundingBox, CarConfig, ContractError, ControlConfig, Detection,
        DetectionConfig, Frame, OperatingMode, PubSubClient, SensorSnapshot,
        SimulatedVehicleConfig, TopicConfig, VehicleDriver,
    };
    use control_loop::{
        run_session, ControlEngine, CycleOutcome, ShutdownCoordinator, StopReason,
    };
    use detection::{DetectionAdapter, ScriptedDetectionEngine};
    use phase_tracker::PhaseTracker;
    use publisher::StatusPublisher;
    use transport::LoopbackBus;
    use vehicle::{SimulatedVehicle, VehicleProbe};

    fn small_vehicle() -> SimulatedVehicleConfig {
        SimulatedVehicleConfig {
            frame_width: 48,
            frame_height: 32,
            ..Default::default()
        }
    }

    fn build_engine<V: VehicleDriver>(
        vehicle: V,
        tracker: &PhaseTracker,
        bus: &LoopbackBus,
        detections: ScriptedDetectionEngine,
        config: &CarConfig,
    ) -> ControlEngine<V, LoopbackBus> {
        let detector = DetectionAdapter::new(
            Arc::new(detections),
            &config.detection,
            config.control.detection_timeout(),
        );
        let status = StatusPublisher::new(
            bus.clone(),
            config.topics.clone(),
            config.control.publish_timeout(),
        );
        ControlEngine::new(vehicle, tracker.clone(), detector, status, &config.control)
    }

    /// Bus, listener and engine wired the way `smartcar run --loopback` does
    struct Rig {
        bus: LoopbackBus,
        topics: TopicConfig,
        tracker: PhaseTracker,
        listener: ListenerHandle,
        engine: ControlEngine<SimulatedVehicle, LoopbackBus>,
        probe: VehicleProbe,
    }

    impl Rig {
        async fn new(detections: ScriptedDetectionEngine) -> Self {
            let config = CarConfig {
                vehicle: small_vehicle(),
                ..Default::default()
            };
            let (bus, rx) = LoopbackBus::new(64);
            for topic in config.topics.control_topics() {
                bus.subscribe(topic).await.unwrap();
            }
            let tracker = PhaseTracker::new();
            let listener = CommandListener::spawn(tracker.clone(), rx, config.topics.clone());

            let vehicle = SimulatedVehicle::new(config.vehicle.clone());
            let probe = vehicle.probe();
            let engine = build_engine(vehicle, &tracker, &bus, detections, &config);

            Self {
                bus,
                topics: config.topics,
                tracker,
                listener,
                engine,
                probe,
            }
        }

        /// Inject a message and wait until the listener has handled it
        async fn send(&self, topic: &str, payload: &str) {
            let metrics = self.listener.metrics().clone();
            let before = metrics.applied() + metrics.ignored();
            assert!(self.bus.inject(topic, payload.to_string()).await);

            let handled = tokio::time::timeout(Duration::from_secs(1), async {
                while metrics.applied() + metrics.ignored() == before {
                    tokio::time::sleep(Duration::from_millis(2)).await;
                }
            })
            .await;
            assert!(handled.is_ok(), "listener did not handle {topic} {payload}");
        }

        async fn cycle(&mut self) -> contracts::ControlSnapshot {
            match self.engine.run_cycle().await.unwrap() {
                CycleOutcome::Completed(snapshot) => snapshot,
                CycleOutcome::Stopped(reason) => panic!("unexpected stop: {reason}"),
            }
        }
    }

    fn det(class_id: usize, score: f32) -> Detection {
        Detection::new(class_id, score, BoundingBox::new(4.0, 4.0, 20.0, 20.0))
    }

    /// Mode tlviacnn, detector sees red 0.9 and green 0.99: red wins, speed 0
    #[tokio::test]
    async fn test_e2e_detector_red_outranks_green() {
        let mut rig = Rig::new(ScriptedDetectionEngine::single(vec![
            det(0, 0.9),
            det(2, 0.99),
        ]))
        .await;

        rig.send(&rig.topics.mode.clone(), "tlviacnn").await;
        let first = rig.cycle().await;
        assert_eq!(first.mode, OperatingMode::PhaseFromDetector);
        assert_eq!(first.speed, 0);
        assert_eq!(first.reported_phase.token(), "red");
        assert_eq!(first.action, "Mode set to tlviacnn");

        let second = rig.cycle().await;
        assert_eq!(second.action, "TL via CNN: red");
        assert_eq!(
            rig.bus.published_on("SMARTCAR_status/tlphase"),
            vec!["red", "red"]
        );
        assert_eq!(rig.probe.speeds(), vec![0, 0]);

        rig.listener.stop().await;
    }

    /// Standby, then `go`: next cycle runs lane following and shows the note
    #[tokio::test]
    async fn test_e2e_manual_go_from_standby() {
        let mut rig = Rig::new(ScriptedDetectionEngine::new(Vec::new())).await;

        let idle = rig.cycle().await;
        assert_eq!(idle.mode, OperatingMode::Standby);
        assert_eq!(idle.speed, 0);

        rig.send(&rig.topics.manual_action.clone(), "go").await;
        let moving = rig.cycle().await;
        assert_eq!(moving.mode, OperatingMode::LaneFollow);
        assert_eq!(moving.action, "Manual: Go");
        assert_eq!(moving.speed, 1);

        assert_eq!(
            rig.bus.published_on("SMARTCAR_status/action"),
            vec!["Standby Mode", "Manual: Go"]
        );
        rig.listener.stop().await;
    }

    /// Manual `backwards` while driving never yields a non-zero speed
    #[tokio::test]
    async fn test_e2e_backwards_stops() {
        let mut rig = Rig::new(ScriptedDetectionEngine::new(Vec::new())).await;

        rig.send(&rig.topics.manual_action.clone(), "GO").await;
        for _ in 0..3 {
            rig.cycle().await;
        }
        assert_eq!(rig.engine.last_speed(), 3);

        rig.send(&rig.topics.manual_action.clone(), "backwards").await;
        for _ in 0..3 {
            assert_eq!(rig.cycle().await.speed, 0);
        }
        assert!(rig.probe.speeds().iter().all(|s| *s >= 0));
        rig.listener.stop().await;
    }

    /// Remote phases on TL15 gate the speed; unknown tokens hold it
    #[tokio::test]
    async fn test_e2e_remote_phase_gating() {
        let mut rig = Rig::new(ScriptedDetectionEngine::new(Vec::new())).await;
        let mode_topic = rig.topics.mode.clone();
        let phase_topic = rig.topics.remote_phase.clone();

        rig.send(&mode_topic, "tlviamqtt").await;
        // initial remote phase is red
        assert_eq!(rig.cycle().await.speed, 0);

        for (token, expected) in [
            ("green", 40),
            ("blinking", 40),
            ("yellow", 30),
            ("red", 0),
            ("redyellow", 0),
            ("green", 40),
        ] {
            rig.send(&phase_topic, token).await;
            let snap = rig.cycle().await;
            assert_eq!(snap.speed, expected, "after {token}");
            assert_eq!(snap.reported_phase.token(), token);
            assert_eq!(snap.action, format!("Remote phase: {token}"));
        }
        rig.listener.stop().await;
    }

    /// Any sequence of mode messages leaves the last valid one in force
    #[tokio::test]
    async fn test_e2e_last_valid_mode_wins() {
        let rig = Rig::new(ScriptedDetectionEngine::new(Vec::new())).await;
        let mode_topic = rig.topics.mode.clone();

        for payload in ["tlviacnn", "LANEDETECTION", "lanedetection", "fly", " quit"] {
            rig.send(&mode_topic, payload).await;
        }
        assert_eq!(rig.tracker.mode(), OperatingMode::LaneFollow);

        let stats = rig.listener.stop().await;
        assert_eq!(stats.applied, 2);
        assert_eq!(stats.ignored, 3);
    }

    /// Sound events are reported verbatim on the status feed
    #[tokio::test]
    async fn test_e2e_sound_event_reported() {
        let mut rig = Rig::new(ScriptedDetectionEngine::new(Vec::new())).await;
        rig.send(&rig.topics.sound.clone(), "siren").await;

        let snap = rig.cycle().await;
        assert_eq!(snap.aux_event, "siren");
        assert_eq!(snap.action, "Sound detected: siren");
        assert_eq!(rig.bus.published_on("SMARTCAR_status/sound"), vec!["siren"]);
        rig.listener.stop().await;
    }

    /// Requests quit from inside the third actuation
    struct QuitOnCommand {
        inner: SimulatedVehicle,
        tracker: PhaseTracker,
        quit_at: usize,
        commands: usize,
    }

    impl VehicleDriver for QuitOnCommand {
        fn name(&self) -> &str {
            "quit-on-command"
        }

        fn read_sensors(&mut self) -> Result<SensorSnapshot, ContractError> {
            self.inner.read_sensors()
        }

        fn run_lane_following_step(
            &mut self,
            frame: &Frame,
            speed: i32,
        ) -> Result<f32, ContractError> {
            self.inner.run_lane_following_step(frame, speed)
        }

        fn reset_control_terms(&mut self) {
            self.inner.reset_control_terms();
        }

        fn command_actuators(&mut self, command: ActuatorCommand) -> Result<(), ContractError> {
            self.commands += 1;
            if self.commands == self.quit_at {
                self.tracker.request_quit("Quit requested mid-cycle");
            }
            self.inner.command_actuators(command)
        }

        fn release(&mut self) {
            self.inner.release();
        }
    }

    /// Quit mid-cycle: the cycle completes, nothing is actuated afterwards,
    /// and alive=false is the last message
    #[tokio::test]
    async fn test_e2e_quit_mid_cycle() {
        let config = CarConfig {
            vehicle: small_vehicle(),
            ..Default::default()
        };
        let (bus, rx) = LoopbackBus::new(64);
        for topic in config.topics.control_topics() {
            bus.subscribe(topic).await.unwrap();
        }
        let tracker = PhaseTracker::with_initial(
            OperatingMode::LaneFollow,
            contracts::PhaseReading::default(),
        );
        let listener = CommandListener::spawn(tracker.clone(), rx, config.topics.clone());

        let inner = SimulatedVehicle::new(config.vehicle.clone());
        let probe = inner.probe();
        let vehicle = QuitOnCommand {
            inner,
            tracker: tracker.clone(),
            quit_at: 3,
            commands: 0,
        };

        let engine = build_engine(
            vehicle,
            &tracker,
            &bus,
            ScriptedDetectionEngine::new(Vec::new()),
            &config,
        );
        let coordinator =
            ShutdownCoordinator::new(bus.clone(), &config.topics).with_listener(listener);

        let report = tokio::time::timeout(Duration::from_secs(5), run_session(engine, coordinator))
            .await
            .expect("session did not stop");

        assert_eq!(report.stop_reason, StopReason::QuitRequested);
        assert_eq!(report.stats.cycles, 3);
        assert_eq!(probe.commands().len(), 3);
        assert_eq!(probe.speeds(), vec![1, 2, 3]);
        assert!(probe.is_released());

        assert_eq!(
            bus.published_on("SMARTCAR_status/alive"),
            vec!["true", "true", "true", "false"]
        );
        let last = bus.published().last().cloned().unwrap();
        assert_eq!(last.topic, "SMARTCAR_status/alive");
        assert_eq!(last.payload, "false");
        assert!(bus.subscriptions().is_empty());
        assert!(!bus.is_connected());
    }

    /// Config file → scripted detector → session with a cycle limit
    #[tokio::test]
    async fn test_e2e_config_driven_session() {
        let toml = r#"
[control]
cruise_speed = 25
reduced_speed = 10

[vehicle]
frame_width = 48
frame_height = 32

[video]
enabled = false

[[detection.script]]
detections = [{ class_id = 3, score = 0.8, bbox = { xmin = 1.0, ymin = 1.0, xmax = 9.0, ymax = 9.0 } }]

[[detection.script]]
detections = [{ class_id = 2, score = 0.9, bbox = { xmin = 1.0, ymin = 1.0, xmax = 9.0, ymax = 9.0 } }]
"#;
        let config =
            config_loader::ConfigLoader::load_from_str(toml, config_loader::ConfigFormat::Toml)
                .unwrap();

        let (bus, rx) = LoopbackBus::new(64);
        let tracker = PhaseTracker::with_initial(
            OperatingMode::PhaseFromDetector,
            contracts::PhaseReading::default(),
        );
        let listener = CommandListener::spawn(tracker.clone(), rx, config.topics.clone());
        let vehicle = SimulatedVehicle::new(config.vehicle.clone());
        let engine = build_engine(
            vehicle,
            &tracker,
            &bus,
            ScriptedDetectionEngine::from_config(&config.detection),
            &config,
        )
        .with_max_cycles(Some(4));
        let coordinator =
            ShutdownCoordinator::new(bus.clone(), &config.topics).with_listener(listener);

        let report = run_session(engine, coordinator).await;
        assert_eq!(report.stop_reason, StopReason::CycleLimit(4));
        assert_eq!(
            bus.published_on("SMARTCAR_status/speed"),
            vec!["10", "25", "10", "25"]
        );
        assert_eq!(
            bus.published_on("SMARTCAR_status/tlphase"),
            vec!["yellow", "green", "yellow", "green"]
        );
        assert_eq!(report.stats.cycles_in(OperatingMode::PhaseFromDetector), 4);
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn test_default_configs_line_up() {
        let control = ControlConfig::default();
        assert!(control.reduced_speed <= control.cruise_speed);
        assert!(!DetectionConfig::default().classes.is_empty());
    }
}
