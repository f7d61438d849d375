//! VideoSink trait - video side-channel output interface

use crate::{ContractError, Frame};

/// Video side-channel
///
/// Decouples the control loop from how frames leave the vehicle.
#[trait_variant::make(VideoSink: Send)]
pub trait LocalVideoSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Transmit one frame
    ///
    /// # Errors
    /// Returns a video error (should include context)
    async fn send_frame(&mut self, frame: &Frame) -> Result<(), ContractError>;
}
