//! Layered error definitions
//!
//! Categorized by source: config / transport / vehicle / detection / video

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Transport Errors =====
    /// Broker connection error
    #[error("transport connection error: {message}")]
    TransportConnection { message: String },

    /// Subscribe / unsubscribe error
    #[error("subscription error for topic '{topic}': {message}")]
    Subscription { topic: String, message: String },

    /// Publish error
    #[error("publish error for topic '{topic}': {message}")]
    Publish { topic: String, message: String },

    // ===== Collaborator Errors =====
    /// Vehicle abstraction fault
    #[error("vehicle '{vehicle}' fault: {message}")]
    Vehicle { vehicle: String, message: String },

    /// Detection engine failure
    #[error("detection engine '{engine}' failed: {message}")]
    Detection { engine: String, message: String },

    /// Frame buffer does not match its declared geometry
    #[error("invalid frame: {message}")]
    InvalidFrame { message: String },

    // ===== Video Errors =====
    /// Video side-channel error
    #[error("video sink '{sink_name}' error: {message}")]
    VideoSend { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create transport connection error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::TransportConnection {
            message: message.into(),
        }
    }

    /// Create publish error
    pub fn publish(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Publish {
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Create subscription error
    pub fn subscription(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Subscription {
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Create vehicle fault
    pub fn vehicle(vehicle: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Vehicle {
            vehicle: vehicle.into(),
            message: message.into(),
        }
    }

    /// Create detection failure
    pub fn detection(engine: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Detection {
            engine: engine.into(),
            message: message.into(),
        }
    }

    /// Create video send error
    pub fn video_send(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::VideoSend {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}
