//! CarConfig - Config Loader output
//!
//! Describes the complete coordinator configuration: broker connection, topic
//! names, control policy constants, detection, video side-channel and the
//! simulated vehicle. Every field has a default, so an empty file is valid.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

use crate::{Detection, StatusField};

/// Complete coordinator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CarConfig {
    /// Pub/sub broker connection
    #[validate(nested)]
    pub broker: BrokerConfig,

    /// Control and status topic names
    #[validate(nested)]
    pub topics: TopicConfig,

    /// Speed policy and loop timing
    #[validate(nested)]
    pub control: ControlConfig,

    /// Detection adapter settings
    #[validate(nested)]
    pub detection: DetectionConfig,

    /// Video side-channel
    #[validate(nested)]
    pub video: VideoConfig,

    /// Simulated vehicle
    #[validate(nested)]
    pub vehicle: SimulatedVehicleConfig,
}

/// Broker connection settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BrokerConfig {
    /// Broker host
    #[validate(length(min = 1))]
    pub host: String,

    /// Broker port
    pub port: u16,

    /// Client identifier presented to the broker
    #[validate(length(min = 1))]
    pub client_id: String,

    /// Keep-alive interval (seconds)
    #[validate(range(min = 5, max = 3600))]
    pub keep_alive_secs: u64,

    /// Startup connection deadline (milliseconds)
    #[validate(range(min = 100))]
    pub connect_timeout_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "smartcar".to_string(),
            keep_alive_secs: 60,
            connect_timeout_ms: 5000,
        }
    }
}

impl BrokerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Topic names
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TopicConfig {
    /// Mode-control topic
    #[validate(length(min = 1))]
    pub mode: String,

    /// Remote traffic-light phase topic
    #[validate(length(min = 1))]
    pub remote_phase: String,

    /// Manual action topic
    #[validate(length(min = 1))]
    pub manual_action: String,

    /// Auxiliary sound-event topic
    #[validate(length(min = 1))]
    pub sound: String,

    /// Prefix of every status topic
    #[validate(length(min = 1))]
    pub status_prefix: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            mode: "SMARTCAR_control/mode".to_string(),
            remote_phase: "TL15".to_string(),
            manual_action: "SMARTCAR_control/manual_action".to_string(),
            sound: "SMARTCAR_control/sound".to_string(),
            status_prefix: "SMARTCAR_status/".to_string(),
        }
    }
}

impl TopicConfig {
    /// Subscribed control topics
    pub fn control_topics(&self) -> [&str; 4] {
        [
            self.mode.as_str(),
            self.remote_phase.as_str(),
            self.manual_action.as_str(),
            self.sound.as_str(),
        ]
    }

    /// Full topic for a status field
    pub fn status_topic(&self, field: StatusField) -> String {
        format!("{}{}", self.status_prefix, field.topic_suffix())
    }
}

/// Speed policy and loop timing
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ControlConfig {
    /// Full cruise speed (lane-follow ceiling, green / off)
    #[validate(range(min = 0, max = 100))]
    pub cruise_speed: i32,

    /// Reduced cruise speed (yellow)
    #[validate(range(min = 0, max = 100))]
    pub reduced_speed: i32,

    /// Lane-follow ramp increment per cycle
    #[validate(range(min = 1, max = 100))]
    pub ramp_step: i32,

    /// Minimum cycle period (milliseconds, 0 = as fast as possible)
    pub min_cycle_period_ms: u64,

    /// Detection call deadline (milliseconds)
    #[validate(range(min = 1))]
    pub detection_timeout_ms: u64,

    /// Status publish deadline (milliseconds)
    #[validate(range(min = 1))]
    pub publish_timeout_ms: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            cruise_speed: 40,
            reduced_speed: 30,
            ramp_step: 1,
            min_cycle_period_ms: 0,
            detection_timeout_ms: 500,
            publish_timeout_ms: 200,
        }
    }
}

impl ControlConfig {
    pub fn min_cycle_period(&self) -> Option<Duration> {
        (self.min_cycle_period_ms > 0).then(|| Duration::from_millis(self.min_cycle_period_ms))
    }

    pub fn detection_timeout(&self) -> Duration {
        Duration::from_millis(self.detection_timeout_ms)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }
}

/// Detector class table entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDef {
    /// Class label
    pub name: String,

    /// Annotation colour (RGB)
    pub color: [u8; 3],
}

impl ClassDef {
    pub fn new(name: impl Into<String>, color: [u8; 3]) -> Self {
        Self {
            name: name.into(),
            color,
        }
    }
}

/// Class table of the traffic-light model
pub fn default_class_table() -> Vec<ClassDef> {
    vec![
        ClassDef::new("red", [255, 0, 0]),
        ClassDef::new("redyellow", [255, 165, 0]),
        ClassDef::new("green", [0, 128, 0]),
        ClassDef::new("yellow", [255, 255, 0]),
        ClassDef::new("off", [0, 0, 0]),
        ClassDef::new("Person", [128, 128, 128]),
    ]
}

/// Detections returned by the scripted engine for one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptedFrame {
    #[serde(default)]
    pub detections: Vec<Detection>,
}

/// Detection adapter settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DetectionConfig {
    /// Detections scoring below this are discarded
    #[validate(range(min = 0.0, max = 1.0))]
    pub score_threshold: f32,

    /// Class table (index = class id)
    #[validate(length(min = 1))]
    pub classes: Vec<ClassDef>,

    /// Scripted engine output, replayed cyclically
    pub script: Vec<ScriptedFrame>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.25,
            classes: default_class_table(),
            script: Vec::new(),
        }
    }
}

/// Video side-channel settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct VideoConfig {
    /// Stream frames at all
    pub enabled: bool,

    /// Receiver host
    #[validate(length(min = 1))]
    pub host: String,

    /// Receiver port
    pub port: u16,

    /// Transmission width
    #[validate(range(min = 1, max = 4096))]
    pub width: u32,

    /// Transmission height
    #[validate(range(min = 1, max = 4096))]
    pub height: u32,

    /// JPEG quality
    #[validate(range(min = 1, max = 100))]
    pub jpeg_quality: u8,

    /// Per-frame send deadline (milliseconds)
    #[validate(range(min = 1))]
    pub send_timeout_ms: u64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "localhost".to_string(),
            port: 50007,
            width: 320,
            height: 240,
            jpeg_quality: 80,
            send_timeout_ms: 1000,
        }
    }
}

impl VideoConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

/// Simulated vehicle settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SimulatedVehicleConfig {
    /// Vehicle name
    #[validate(length(min = 1))]
    pub name: String,

    /// Camera frame width
    #[validate(range(min = 1, max = 4096))]
    pub frame_width: u32,

    /// Camera frame height
    #[validate(range(min = 1, max = 4096))]
    pub frame_height: u32,

    /// Reported supply voltage
    pub voltage: f32,

    /// Camera pan
    pub pan: i32,

    /// Camera tilt
    pub tilt: i32,

    /// Proportional steering gain of the lane-following step
    pub steer_gain: f32,

    /// Raise a sensor fault after this many reads
    pub fail_after_cycles: Option<u64>,

    /// Raise the terminate flag after this many reads
    pub terminate_after_cycles: Option<u64>,
}

impl Default for SimulatedVehicleConfig {
    fn default() -> Self {
        Self {
            name: "smartcar-sim".to_string(),
            frame_width: 640,
            frame_height: 480,
            voltage: 7.4,
            pan: 90,
            tilt: 90,
            steer_gain: 0.1,
            fail_after_cycles: None,
            terminate_after_cycles: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CarConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.control.cruise_speed, 40);
        assert_eq!(config.control.reduced_speed, 30);
        assert_eq!(config.detection.classes.len(), 6);
    }

    #[test]
    fn test_status_topic() {
        let topics = TopicConfig::default();
        assert_eq!(
            topics.status_topic(StatusField::Alive),
            "SMARTCAR_status/alive"
        );
        assert_eq!(topics.control_topics()[1], "TL15");
    }

    #[test]
    fn test_range_violation_detected() {
        let mut config = CarConfig::default();
        config.video.jpeg_quality = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_min_cycle_period_zero_disables() {
        let control = ControlConfig::default();
        assert!(control.min_cycle_period().is_none());
    }
}
