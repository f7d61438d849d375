//! Session wiring.

mod console;
mod orchestrator;

pub use orchestrator::{Session, SessionConfig};
