//! # Command Listener
//!
//! Applies control messages from the broker to the shared [`PhaseTracker`].
//!
//! Responsibilities:
//! - Decode inbound messages into [`Command`] (or an explicit ignore reason)
//! - Apply commands to the tracker with an action note
//! - Count applied / ignored messages
//!
//! ```ignore
//! let handle = CommandListener::spawn(tracker.clone(), inbound_rx, config.topics.clone());
//! // ... run the control loop ...
//! let stats = handle.stop().await;
//! ```
//!
//! [`PhaseTracker`]: phase_tracker::PhaseTracker

mod command;
mod listener;

pub use command::{decode, Command, Decoded, IgnoreReason, ManualAction};
pub use listener::{CommandListener, ListenerHandle, ListenerMetrics, ListenerStats};
