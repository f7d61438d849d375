//! Session orchestrator - wires every component and runs the loop.
//!
//! With the `mqtt` feature the session talks to a real broker unless
//! `loopback` is set; without it the in-process bus is always used.

use std::sync::Arc;

use anyhow::{Context, Result};
use command_listener::CommandListener;
use contracts::{CarConfig, InboundMessage, PubSubClient};
use control_loop::{run_session, ControlEngine, SessionReport, ShutdownCoordinator};
use detection::{DetectionAdapter, ScriptedDetectionEngine};
use phase_tracker::PhaseTracker;
use publisher::{StatusPublisher, TcpVideoSink, VideoStreamer};
use tracing::{info, warn};
use transport::{LoopbackBus, DEFAULT_INBOUND_CAPACITY};
use vehicle::SimulatedVehicle;

use super::console::spawn_console;
use crate::error::CliError;

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Validated coordinator configuration (CLI overrides applied)
    pub config: CarConfig,

    /// Stop after this many cycles (None = unlimited)
    pub max_cycles: Option<u64>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,

    /// Use the in-process bus fed from stdin
    #[cfg_attr(not(feature = "mqtt"), allow(dead_code))]
    pub loopback: bool,
}

/// Coordinator session
pub struct Session {
    config: SessionConfig,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Run until quit, vehicle termination, a fault or the cycle limit
    pub async fn run(self) -> Result<SessionReport> {
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        #[cfg(feature = "mqtt")]
        if !self.config.loopback {
            return self.run_mqtt().await;
        }

        self.run_loopback().await
    }

    /// Run against the configured MQTT broker
    #[cfg(feature = "mqtt")]
    async fn run_mqtt(self) -> Result<SessionReport> {
        let broker = &self.config.config.broker;
        info!(
            host = %broker.host,
            port = broker.port,
            client_id = %broker.client_id,
            "Connecting to broker..."
        );

        let (client, inbound) =
            transport::MqttTransport::connect(broker, DEFAULT_INBOUND_CAPACITY)
                .await
                .map_err(|e| {
                    CliError::broker_connection(&broker.host, broker.port, e.to_string())
                })?;

        info!(endpoint = %client.endpoint(), "Connected to broker");

        subscribe_control_topics(&client, &self.config.config).await?;
        self.run_with(client, inbound).await
    }

    /// Run on the in-process bus, fed from stdin
    async fn run_loopback(self) -> Result<SessionReport> {
        info!("Running on the in-process bus (no broker required)");

        let (bus, inbound) = LoopbackBus::new(DEFAULT_INBOUND_CAPACITY);
        subscribe_control_topics(&bus, &self.config.config).await?;

        let console = spawn_console(bus.clone());
        let report = self.run_with(bus, inbound).await;
        console.abort();
        report
    }

    /// Wiring shared by both transports
    async fn run_with<P>(
        self,
        client: P,
        inbound: async_channel::Receiver<InboundMessage>,
    ) -> Result<SessionReport>
    where
        P: PubSubClient + Clone + Sync + 'static,
    {
        let config = &self.config.config;
        let tracker = PhaseTracker::new();

        let listener = CommandListener::spawn(tracker.clone(), inbound, config.topics.clone());
        info!("Command listener started");

        let vehicle = SimulatedVehicle::new(config.vehicle.clone());
        info!(vehicle = %config.vehicle.name, "Vehicle ready");

        let engine = Arc::new(ScriptedDetectionEngine::from_config(&config.detection));
        let detector = DetectionAdapter::new(
            engine,
            &config.detection,
            config.control.detection_timeout(),
        );

        let status = StatusPublisher::new(
            client.clone(),
            config.topics.clone(),
            config.control.publish_timeout(),
        );

        let mut engine =
            ControlEngine::new(vehicle, tracker.clone(), detector, status, &config.control)
                .with_max_cycles(self.config.max_cycles);

        if config.video.enabled {
            let sink = TcpVideoSink::new(&config.video);
            info!(addr = %sink.addr(), "Video side-channel enabled");
            engine = engine.with_video(VideoStreamer::spawn(sink));
        } else {
            info!("Video side-channel disabled");
        }

        let coordinator = ShutdownCoordinator::new(client, &config.topics).with_listener(listener);

        // A signal asks for Quit; the loop notices it at the next cycle boundary
        let signal_task = tokio::spawn(async move {
            shutdown_signal().await;
            warn!("Received shutdown signal, stopping control loop...");
            tracker.request_quit("Shutdown requested");
        });

        info!(max_cycles = ?self.config.max_cycles, "Control loop running");
        let report = run_session(engine, coordinator).await;
        signal_task.abort();

        Ok(report)
    }
}

/// Subscribe every control topic; any failure aborts startup
async fn subscribe_control_topics<P: PubSubClient>(client: &P, config: &CarConfig) -> Result<()> {
    for topic in config.topics.control_topics() {
        client
            .subscribe(topic)
            .await
            .map_err(|e| CliError::subscribe(topic, e.to_string()))
            .with_context(|| format!("Failed to subscribe via {}", client.name()))?;
        info!(topic = %topic, "Subscribed");
    }
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
