//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Broker could not be reached at startup
    #[error("Failed to connect to broker at {host}:{port}: {message}")]
    BrokerConnection {
        host: String,
        port: u16,
        message: String,
    },

    /// Subscribing a control topic failed at startup
    #[error("Failed to subscribe to '{topic}': {message}")]
    Subscribe { topic: String, message: String },

    /// The control loop ended on a vehicle fault
    #[error("Control loop stopped on a vehicle fault: {message}")]
    VehicleFault { message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    #[cfg_attr(not(feature = "mqtt"), allow(dead_code))]
    pub fn broker_connection(
        host: impl Into<String>,
        port: u16,
        message: impl Into<String>,
    ) -> Self {
        Self::BrokerConnection {
            host: host.into(),
            port,
            message: message.into(),
        }
    }

    pub fn subscribe(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Subscribe {
            topic: topic.into(),
            message: message.into(),
        }
    }

    pub fn vehicle_fault(message: impl Into<String>) -> Self {
        Self::VehicleFault {
            message: message.into(),
        }
    }
}
