//! # Phase Tracker
//!
//! Shared state between the command listener and the control loop: the
//! selected operating mode, the remotely reported traffic-light phase, the
//! last auxiliary event and the latest action note.
//!
//! All fields sit behind one mutex. Writers assign under the lock; readers get
//! a value copy through [`PhaseTracker::snapshot`], so a cycle never observes a
//! half-applied message. Nothing inside the lock performs I/O.
//!
//! `Quit` is final: once selected, later mode writes are rejected.

use std::sync::Arc;

use contracts::{OperatingMode, PhaseReading};
use parking_lot::Mutex;
use tracing::debug;

/// Auxiliary event reported before any sound message arrives
pub const NO_AUX_EVENT: &str = "None";

/// Human-readable description of the last applied message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionNote {
    /// Monotonic sequence number (first note is 1)
    pub seq: u64,

    /// Description text
    pub text: String,
}

/// Value copy of the tracker state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerSnapshot {
    pub mode: OperatingMode,
    pub remote_phase: PhaseReading,
    pub aux_event: String,
    pub action: Option<ActionNote>,
}

#[derive(Debug)]
struct TrackerState {
    mode: OperatingMode,
    remote_phase: PhaseReading,
    aux_event: String,
    action: Option<ActionNote>,
    next_seq: u64,
}

impl TrackerState {
    /// Assign `mode` unless `Quit` is already selected
    fn select_mode(&mut self, mode: OperatingMode) -> bool {
        if self.mode.is_quit() {
            return false;
        }
        self.mode = mode;
        true
    }

    fn note(&mut self, text: String) {
        self.next_seq += 1;
        self.action = Some(ActionNote {
            seq: self.next_seq,
            text,
        });
    }
}

/// Lock-guarded state container
///
/// Cheap to clone; all clones share the same state.
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    inner: Arc<Mutex<TrackerState>>,
}

impl PhaseTracker {
    /// Create a tracker in `Standby`, remote phase `red`, no aux event
    pub fn new() -> Self {
        Self::with_initial(OperatingMode::Standby, PhaseReading::default())
    }

    /// Create a tracker with explicit initial values
    pub fn with_initial(mode: OperatingMode, remote_phase: PhaseReading) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TrackerState {
                mode,
                remote_phase,
                aux_event: NO_AUX_EVENT.to_string(),
                action: None,
                next_seq: 0,
            })),
        }
    }

    /// Select the operating mode
    ///
    /// Returns `false` (state unchanged) once `Quit` has been selected.
    pub fn set_mode(&self, mode: OperatingMode) -> bool {
        let accepted = self.inner.lock().select_mode(mode);
        if accepted {
            debug!(mode = %mode, "mode updated");
        } else {
            debug!(mode = %mode, "mode change rejected, quit pending");
        }
        accepted
    }

    /// Store the remote phase reading
    pub fn set_remote_phase(&self, reading: PhaseReading) {
        debug!(phase = %reading, "remote phase updated");
        self.inner.lock().remote_phase = reading;
    }

    /// Store the auxiliary event verbatim
    pub fn set_aux_event(&self, event: impl Into<String>) {
        self.inner.lock().aux_event = event.into();
    }

    /// Record a human-readable description of the last applied message
    pub fn note_action(&self, text: impl Into<String>) {
        self.inner.lock().note(text.into());
    }

    /// Set mode and action note in one critical section
    ///
    /// Returns `false` and leaves mode and note untouched once `Quit` has
    /// been selected.
    pub fn set_mode_with_note(&self, mode: OperatingMode, text: impl Into<String>) -> bool {
        let text = text.into();
        let mut state = self.inner.lock();
        if !state.select_mode(mode) {
            return false;
        }
        state.note(text);
        true
    }

    /// Store the remote phase reading and action note together
    pub fn set_remote_phase_with_note(&self, reading: PhaseReading, text: impl Into<String>) {
        let text = text.into();
        let mut state = self.inner.lock();
        state.remote_phase = reading;
        state.note(text);
    }

    /// Store the auxiliary event and action note together
    pub fn set_aux_event_with_note(&self, event: impl Into<String>, text: impl Into<String>) {
        let (event, text) = (event.into(), text.into());
        let mut state = self.inner.lock();
        state.aux_event = event;
        state.note(text);
    }

    /// Ask the control loop to terminate at its next cycle boundary
    ///
    /// A second request keeps the first reason.
    pub fn request_quit(&self, reason: impl Into<String>) {
        if !self.set_mode_with_note(OperatingMode::Quit, reason) {
            debug!("quit already requested");
        }
    }

    /// Current mode
    pub fn mode(&self) -> OperatingMode {
        self.inner.lock().mode
    }

    /// Value copy of the whole state
    pub fn snapshot(&self) -> TrackerSnapshot {
        let state = self.inner.lock();
        TrackerSnapshot {
            mode: state.mode,
            remote_phase: state.remote_phase.clone(),
            aux_event: state.aux_event.clone(),
            action: state.action.clone(),
        }
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}
