//! # Publisher
//!
//! Outbound channels of the coordinator.
//!
//! - [`StatusPublisher`]: per-field status messages through a `PubSubClient`
//! - [`VideoStreamer`]: latest-frame worker in front of a `VideoSink`
//! - [`TcpVideoSink`]: JPEG / base64 data URI per TCP connection
//!
//! Failures on either channel are logged and counted; they never reach the
//! control loop.

mod metrics;
mod status;
mod streamer;
mod video;

pub use metrics::ChannelMetrics;
pub use status::{PublishReport, StatusPublisher};
pub use streamer::{StreamerStats, VideoStreamer};
pub use video::{encode_frame, TcpVideoSink, DATA_URI_PREFIX};
