//! Transport error types

use contracts::ContractError;
use thiserror::Error;

/// Transport specific error
#[derive(Debug, Error)]
pub enum TransportError {
    /// Broker refused or dropped the connection during startup
    #[error("failed to connect to broker at {host}:{port}: {message}")]
    ConnectionFailed {
        host: String,
        port: u16,
        message: String,
    },

    /// No CONNACK within the startup deadline
    #[error("broker at {host}:{port} did not answer within {timeout_ms}ms")]
    ConnectTimeout {
        host: String,
        port: u16,
        timeout_ms: u64,
    },

    /// Client request could not be queued
    #[error("client request failed: {message}")]
    Client { message: String },

    /// Wrapped ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl TransportError {
    /// Create connection error
    pub fn connection_failed(
        host: impl Into<String>,
        port: u16,
        message: impl Into<String>,
    ) -> Self {
        Self::ConnectionFailed {
            host: host.into(),
            port,
            message: message.into(),
        }
    }
}

impl From<TransportError> for ContractError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Contract(inner) => inner,
            other => ContractError::transport(other.to_string()),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, TransportError>;
