//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the coordinator:
//! operating modes, traffic-light phases, frames, detections, the per-cycle
//! status snapshot, configuration, and the collaborator traits (vehicle,
//! detection engine, pub/sub client, video sink).
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Wire tokens
//! Mode names and phase tokens are matched case-sensitively, exactly as the
//! dashboard and the traffic-light controller send them.

mod config;
mod detection;
mod error;
mod frame;
mod mode;
mod phase;
mod pubsub;
mod snapshot;
mod vehicle;
mod video;

pub use config::*;
pub use detection::{BoundingBox, Detection, DetectionEngine};
pub use error::*;
pub use frame::Frame;
pub use mode::OperatingMode;
pub use phase::{PhaseReading, TrafficLightPhase};
pub use pubsub::{InboundMessage, LocalPubSubClient, PubSubClient};
pub use snapshot::{ControlSnapshot, StatusField};
pub use vehicle::{ActuatorCommand, SensorSnapshot, VehicleDriver};
pub use video::{LocalVideoSink, VideoSink};
