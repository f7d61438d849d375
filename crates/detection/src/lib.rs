//! # Detection
//!
//! Traffic-light detection on camera frames.
//!
//! Responsibilities:
//! - Call the [`DetectionEngine`](contracts::DetectionEngine) off the async runtime with a deadline
//! - Filter by score threshold and class table
//! - Annotate retained boxes and reduce them to one phase by priority
//! - Provide a scripted engine for simulated runs

mod adapter;
mod annotate;
mod class_table;
mod scripted;

pub use adapter::{reduce_phase, DetectionAdapter, DetectionOutcome};
pub use annotate::{draw_boxes, label};
pub use class_table::{ClassEntry, ClassTable};
pub use scripted::ScriptedDetectionEngine;
