//! Frame - camera image passed between vehicle, detector and video channel

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::ContractError;

/// RGB8 camera frame
///
/// Pixel data is reference counted; cloning a frame does not copy pixels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Image width
    pub width: u32,

    /// Image height
    pub height: u32,

    /// Packed RGB8 pixels, row-major
    pub data: Bytes,
}

impl Frame {
    /// Bytes per pixel
    pub const CHANNELS: usize = 3;

    /// Create a frame, checking the buffer matches the geometry
    pub fn new(width: u32, height: u32, data: impl Into<Bytes>) -> Result<Self, ContractError> {
        let data = data.into();
        let expected = width as usize * height as usize * Self::CHANNELS;
        if data.len() != expected {
            return Err(ContractError::InvalidFrame {
                message: format!(
                    "{}x{} frame needs {} bytes, got {}",
                    width,
                    height,
                    expected,
                    data.len()
                ),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Uniformly coloured frame
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = width as usize * height as usize;
        let data: Vec<u8> = rgb.iter().copied().cycle().take(pixels * Self::CHANNELS).collect();
        Self {
            width,
            height,
            data: Bytes::from(data),
        }
    }

    /// Pixel at (x, y), if inside the frame
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * Self::CHANNELS;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    }
}
