//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::CarConfig;
use control_loop::SessionReport;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::session::{Session, SessionConfig};

/// Execute the `run` command
pub async fn run_coordinator(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let mut config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    apply_overrides(&mut config, args);
    config_loader::ConfigLoader::validate(&config)
        .context("Configuration invalid after CLI overrides")?;

    info!(
        broker = %format!("{}:{}", config.broker.host, config.broker.port),
        remote_phase_topic = %config.topics.remote_phase,
        cruise_speed = config.control.cruise_speed,
        reduced_speed = config.control.reduced_speed,
        video = config.video.enabled,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config, args);
        return Ok(());
    }

    let session = Session::new(SessionConfig {
        config,
        max_cycles: (args.max_cycles > 0).then_some(args.max_cycles),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
        loopback: args.loopback,
    });

    info!("Starting coordinator...");
    let report = session.run().await.context("Coordinator startup failed")?;

    print_report(&report);

    if let Some(fault) = report.fault {
        return Err(CliError::vehicle_fault(fault.to_string()).into());
    }

    info!("SmartCar coordinator finished");
    Ok(())
}

/// Apply CLI overrides on top of the loaded configuration
fn apply_overrides(config: &mut CarConfig, args: &RunArgs) {
    if let Some(ref host) = args.host {
        info!(host = %host, "Overriding broker host from CLI");
        config.broker.host = host.clone();
    }
    if let Some(port) = args.port {
        info!(port = %port, "Overriding broker port from CLI");
        config.broker.port = port;
    }
    if args.no_video && config.video.enabled {
        info!("Video side-channel disabled from CLI");
        config.video.enabled = false;
    }
}

fn print_report(report: &SessionReport) {
    info!(
        reason = %report.stop_reason,
        cycles = report.stats.cycles,
        duration_secs = report.stats.duration.as_secs_f64(),
        rate = format!("{:.2}", report.stats.cycle_rate()),
        "Control loop finished"
    );

    report.stats.print_summary();

    let shutdown = &report.shutdown;
    println!("=== Shutdown ===\n");
    println!("  Stop reason:         {}", report.stop_reason);
    if let Some(listener) = shutdown.listener {
        println!(
            "  Commands:            {} applied, {} ignored",
            listener.applied, listener.ignored
        );
    }
    if let Some(video) = shutdown.video {
        println!(
            "  Video frames:        {} sent, {} failed, {} skipped",
            video.sent,
            video.failed,
            video.skipped()
        );
    }
    println!("  Offline published:   {}", shutdown.offline_published);
    println!("  Disconnected:        {}", shutdown.disconnected);
    println!("  Vehicle released:    {}", shutdown.vehicle_released);
    println!();

    if !shutdown.is_clean() {
        warn!(
            unsubscribe_failures = ?shutdown.unsubscribe_failures,
            "Shutdown completed with errors"
        );
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &CarConfig, args: &RunArgs) {
    println!("\n=== Configuration Summary ===\n");
    println!("Broker:");
    if args.loopback {
        println!("  (in-process bus, broker settings unused)");
    } else {
        println!("  {}:{}", config.broker.host, config.broker.port);
        println!("  Client ID: {}", config.broker.client_id);
    }

    println!("\nControl topics:");
    for topic in config.topics.control_topics() {
        println!("  - {}", topic);
    }
    println!("Status prefix: {}", config.topics.status_prefix);

    println!("\nSpeed policy:");
    println!("  Cruise: {}", config.control.cruise_speed);
    println!("  Reduced: {}", config.control.reduced_speed);
    println!("  Ramp step: {}", config.control.ramp_step);

    println!("\nDetection:");
    println!("  Classes: {}", config.detection.classes.len());
    println!("  Score threshold: {}", config.detection.score_threshold);
    println!("  Scripted frames: {}", config.detection.script.len());

    if config.video.enabled {
        println!(
            "\nVideo: {}:{} ({}x{}, quality {})",
            config.video.host,
            config.video.port,
            config.video.width,
            config.video.height,
            config.video.jpeg_quality
        );
    } else {
        println!("\nVideo: disabled");
    }

    if args.max_cycles > 0 {
        println!("\nCycle limit: {}", args.max_cycles);
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args() -> RunArgs {
        RunArgs {
            config: PathBuf::from("smartcar.toml"),
            host: None,
            port: None,
            max_cycles: 0,
            dry_run: false,
            loopback: false,
            no_video: false,
            metrics_port: 0,
        }
    }

    #[test]
    fn test_overrides_applied() {
        let mut config = CarConfig::default();
        let args = RunArgs {
            host: Some("10.0.0.5".to_string()),
            port: Some(8883),
            no_video: true,
            ..args()
        };
        apply_overrides(&mut config, &args);
        assert_eq!(config.broker.host, "10.0.0.5");
        assert_eq!(config.broker.port, 8883);
        assert!(!config.video.enabled);
    }

    #[test]
    fn test_no_overrides_keeps_config() {
        let mut config = CarConfig::default();
        apply_overrides(&mut config, &args());
        assert_eq!(config.broker.host, "localhost");
        assert!(config.video.enabled);
    }

    #[tokio::test]
    async fn test_missing_config_is_reported() {
        let args = RunArgs {
            config: PathBuf::from("/nonexistent/smartcar.toml"),
            ..args()
        };
        let err = run_coordinator(&args).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
