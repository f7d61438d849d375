//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// SmartCar - vehicle coordinator driven over MQTT
#[derive(Parser, Debug)]
#[command(
    name = "smartcar",
    author,
    version,
    about = "SmartCar vehicle coordinator",
    long_about = "Runs the per-cycle control loop of a small autonomous car.\n\n\
                  Listens for mode, traffic-light and manual commands on an MQTT broker, \n\
                  gates speed on the remote or detected traffic-light phase, and publishes \n\
                  status and a JPEG video feed."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "SMARTCAR_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "SMARTCAR_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the coordinator
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "smartcar.toml", env = "SMARTCAR_CONFIG")]
    pub config: PathBuf,

    /// Override broker host from configuration
    #[arg(long, env = "SMARTCAR_BROKER_HOST")]
    pub host: Option<String>,

    /// Override broker port from configuration
    #[arg(long, env = "SMARTCAR_BROKER_PORT")]
    pub port: Option<u16>,

    /// Stop after this many control cycles (0 = unlimited)
    #[arg(long, default_value = "0", env = "SMARTCAR_MAX_CYCLES")]
    pub max_cycles: u64,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Use the in-process bus instead of a broker; control messages are read
    /// from stdin as `<topic> <payload>` lines
    #[arg(long)]
    pub loopback: bool,

    /// Disable the video side-channel regardless of configuration
    #[arg(long)]
    pub no_video: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "SMARTCAR_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "smartcar.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "smartcar.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show the detector class table
    #[arg(long)]
    pub classes: bool,

    /// Show every topic name
    #[arg(long)]
    pub topics: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
