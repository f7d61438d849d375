//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{CarConfig, StatusField};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    broker: BrokerInfo,
    control: ControlInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    topics: Option<TopicsInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    classes: Vec<ClassInfo>,
    video: Option<VideoInfo>,
    vehicle: VehicleInfo,
}

#[derive(Serialize)]
struct BrokerInfo {
    host: String,
    port: u16,
    client_id: String,
}

#[derive(Serialize)]
struct ControlInfo {
    cruise_speed: i32,
    reduced_speed: i32,
    ramp_step: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_cycle_period_ms: Option<u64>,
}

#[derive(Serialize)]
struct TopicsInfo {
    control: Vec<String>,
    status: Vec<String>,
}

#[derive(Serialize)]
struct ClassInfo {
    id: usize,
    name: String,
    color: [u8; 3],
}

#[derive(Serialize)]
struct VideoInfo {
    addr: String,
    width: u32,
    height: u32,
    jpeg_quality: u8,
}

#[derive(Serialize)]
struct VehicleInfo {
    name: String,
    frame_width: u32,
    frame_height: u32,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&config, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config, args);
    }

    Ok(())
}

fn build_config_info(config: &CarConfig, args: &InfoArgs) -> ConfigInfo {
    let topics = args.topics.then(|| TopicsInfo {
        control: config
            .topics
            .control_topics()
            .iter()
            .map(|t| t.to_string())
            .collect(),
        status: StatusField::ALL
            .iter()
            .map(|field| config.topics.status_topic(*field))
            .collect(),
    });

    let classes = if args.classes {
        config
            .detection
            .classes
            .iter()
            .enumerate()
            .map(|(id, class)| ClassInfo {
                id,
                name: class.name.clone(),
                color: class.color,
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        broker: BrokerInfo {
            host: config.broker.host.clone(),
            port: config.broker.port,
            client_id: config.broker.client_id.clone(),
        },
        control: ControlInfo {
            cruise_speed: config.control.cruise_speed,
            reduced_speed: config.control.reduced_speed,
            ramp_step: config.control.ramp_step,
            min_cycle_period_ms: config
                .control
                .min_cycle_period()
                .map(|p| p.as_millis() as u64),
        },
        topics,
        classes,
        video: config.video.enabled.then(|| VideoInfo {
            addr: format!("{}:{}", config.video.host, config.video.port),
            width: config.video.width,
            height: config.video.height,
            jpeg_quality: config.video.jpeg_quality,
        }),
        vehicle: VehicleInfo {
            name: config.vehicle.name.clone(),
            frame_width: config.vehicle.frame_width,
            frame_height: config.vehicle.frame_height,
        },
    }
}

fn print_config_info(config: &CarConfig, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               SmartCar Configuration                         ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📡 Broker");
    println!("   ├─ Address: {}:{}", config.broker.host, config.broker.port);
    println!("   ├─ Client ID: {}", config.broker.client_id);
    println!("   └─ Keep-alive: {}s", config.broker.keep_alive_secs);

    println!("\n🚦 Speed Policy");
    println!("   ├─ Cruise: {}", config.control.cruise_speed);
    println!("   ├─ Reduced (yellow): {}", config.control.reduced_speed);
    println!("   ├─ Ramp step: {}", config.control.ramp_step);
    match config.control.min_cycle_period() {
        Some(period) => println!("   └─ Min cycle period: {}ms", period.as_millis()),
        None => println!("   └─ Min cycle period: unthrottled"),
    }

    if args.topics {
        println!("\n📨 Topics");
        for topic in config.topics.control_topics() {
            println!("   ├─ subscribe {}", topic);
        }
        for (i, field) in StatusField::ALL.iter().enumerate() {
            let prefix = if i == StatusField::ALL.len() - 1 { "└─" } else { "├─" };
            println!("   {} publish   {}", prefix, config.topics.status_topic(*field));
        }
    } else {
        println!("\n📨 Remote phase topic: {}", config.topics.remote_phase);
    }

    let classes = &config.detection.classes;
    println!(
        "\n🔍 Detection (threshold {}, {} scripted frames)",
        config.detection.score_threshold,
        config.detection.script.len()
    );
    if args.classes {
        for (i, class) in classes.iter().enumerate() {
            let prefix = if i == classes.len() - 1 { "└─" } else { "├─" };
            println!("   {} [{}] {} {:?}", prefix, i, class.name, class.color);
        }
    } else {
        println!("   └─ {} classes", classes.len());
    }

    if config.video.enabled {
        println!("\n🎥 Video");
        println!("   ├─ Receiver: {}:{}", config.video.host, config.video.port);
        println!(
            "   └─ Frame: {}x{} @ quality {}",
            config.video.width, config.video.height, config.video.jpeg_quality
        );
    } else {
        println!("\n🎥 Video: disabled");
    }

    println!("\n🚗 Vehicle");
    println!("   ├─ Name: {}", config.vehicle.name);
    println!(
        "   └─ Camera: {}x{}",
        config.vehicle.frame_width, config.vehicle.frame_height
    );

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args(topics: bool, classes: bool) -> InfoArgs {
        InfoArgs {
            config: PathBuf::from("smartcar.toml"),
            json: true,
            topics,
            classes,
        }
    }

    #[test]
    fn test_info_lists_topics_and_classes() {
        let info = build_config_info(&CarConfig::default(), &args(true, true));
        let topics = info.topics.unwrap();
        assert_eq!(topics.control.len(), 4);
        assert_eq!(topics.status.len(), 10);
        assert_eq!(topics.status.last().unwrap(), "SMARTCAR_status/alive");
        assert_eq!(info.classes[0].name, "red");
    }

    #[test]
    fn test_info_omits_optional_sections() {
        let mut config = CarConfig::default();
        config.video.enabled = false;
        let info = build_config_info(&config, &args(false, false));
        assert!(info.topics.is_none());
        assert!(info.classes.is_empty());
        assert!(info.video.is_none());

        let json = serde_json::to_string(&info).unwrap();
        assert!(!json.contains("\"topics\""));
        assert!(!json.contains("\"classes\""));
    }
}
