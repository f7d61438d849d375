//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::CarConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    broker: String,
    remote_phase_topic: String,
    cruise_speed: i32,
    reduced_speed: i32,
    class_count: usize,
    video_enabled: bool,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    broker: format!("{}:{}", config.broker.host, config.broker.port),
                    remote_phase_topic: config.topics.remote_phase.clone(),
                    cruise_speed: config.control.cruise_speed,
                    reduced_speed: config.control.reduced_speed,
                    class_count: config.detection.classes.len(),
                    video_enabled: config.video.enabled,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &CarConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.detection.script.is_empty() {
        warnings.push(
            "detection.script is empty - tlviacnn mode will always report 'off'".to_string(),
        );
    }

    if config.control.min_cycle_period_ms == 0 {
        warnings.push("control.min_cycle_period_ms is 0 - control loop runs unthrottled".to_string());
    }

    if config.control.reduced_speed == 0 {
        warnings.push("control.reduced_speed is 0 - yellow stops the vehicle".to_string());
    }

    let class_count = config.detection.classes.len();
    for (idx, frame) in config.detection.script.iter().enumerate() {
        if frame
            .detections
            .iter()
            .any(|d| d.class_id >= class_count)
        {
            warnings.push(format!(
                "detection.script[{idx}] references a class id outside the class table"
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Broker: {}", summary.broker);
            println!("  Remote phase topic: {}", summary.remote_phase_topic);
            println!(
                "  Speeds: cruise {}, reduced {}",
                summary.cruise_speed, summary.reduced_speed
            );
            println!("  Detector classes: {}", summary.class_count);
            println!("  Video: {}", if summary.video_enabled { "on" } else { "off" });
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_valid_config_with_warnings() {
        let file = write_config("[control]\ncruise_speed = 40\nreduced_speed = 0\n");
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        };
        let result = validate_config(&args);
        assert!(result.valid);
        let warnings = result.warnings.unwrap();
        assert!(warnings.iter().any(|w| w.contains("yellow stops")));
        assert!(warnings.iter().any(|w| w.contains("unthrottled")));
    }

    #[test]
    fn test_invalid_config_reports_error() {
        let file = write_config("[control]\ncruise_speed = 20\nreduced_speed = 30\n");
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: false,
        };
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("reduced_speed"));
        assert!(run_validate(&args).is_err());
    }

    #[test]
    fn test_missing_file() {
        let args = ValidateArgs {
            config: "/nonexistent/smartcar.toml".into(),
            json: false,
        };
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().starts_with("File not found"));
    }
}
