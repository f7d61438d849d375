//! Detection engine interface
//!
//! The engine itself (model load, inference, box decoding) is an external
//! collaborator; only its input and output shapes are fixed here.

use serde::{Deserialize, Serialize};

use crate::{ContractError, Frame};

/// Axis-aligned box in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

impl BoundingBox {
    pub fn new(xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }
}

/// One raw detection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Index into the model's class table (may be out of range)
    pub class_id: usize,

    /// Confidence in [0, 1]
    pub score: f32,

    /// Object box
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(class_id: usize, score: f32, bbox: BoundingBox) -> Self {
        Self {
            class_id,
            score,
            bbox,
        }
    }
}

/// Object detection engine
///
/// Called from a blocking thread; implementations may take as long as
/// inference needs. The caller applies its own timeout.
pub trait DetectionEngine: Send + Sync {
    /// Engine name (used for logging)
    fn name(&self) -> &str;

    /// Run inference on one frame and return an unordered detection list
    ///
    /// # Errors
    /// Returns a detection error when the engine is unavailable or inference fails
    fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, ContractError>;
}
