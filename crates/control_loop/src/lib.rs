//! # Control Loop
//!
//! Per-cycle coordinator of the vehicle.
//!
//! Responsibilities:
//! - Pick the speed for the active operating mode ([`SpeedPolicy`])
//! - Drive one sense → decide → actuate → publish cycle ([`ControlEngine`])
//! - Tear the session down in order ([`ShutdownCoordinator`])
//!
//! ## Usage
//!
//! ```ignore
//! use control_loop::{run_session, ControlEngine, ShutdownCoordinator};
//!
//! let engine = ControlEngine::new(vehicle, tracker, detector, status, &config.control)
//!     .with_video(streamer);
//! let coordinator = ShutdownCoordinator::new(client, &config.topics).with_listener(listener);
//!
//! let report = run_session(engine, coordinator).await;
//! report.stats.print_summary();
//! report.into_result()?;
//! ```

mod engine;
mod policy;
mod shutdown;
mod stats;

use contracts::{ContractError, PubSubClient, VehicleDriver};
use tracing::{info, instrument};

pub use engine::{ControlEngine, CycleOutcome, EngineParts};
pub use policy::SpeedPolicy;
pub use shutdown::{ShutdownCoordinator, ShutdownReport};
pub use stats::{CycleStats, StopReason};

/// Outcome of a full session
#[derive(Debug)]
pub struct SessionReport {
    pub stop_reason: StopReason,
    pub stats: CycleStats,
    pub shutdown: ShutdownReport,
    /// Vehicle error that ended the loop, if any
    pub fault: Option<ContractError>,
}

impl SessionReport {
    /// `Err` when the loop ended on a vehicle fault
    pub fn into_result(self) -> Result<CycleStats, ContractError> {
        match self.fault {
            Some(fault) => Err(fault),
            None => Ok(self.stats),
        }
    }
}

/// Run the control loop to completion, then tear everything down
///
/// Teardown runs whatever the stop reason, including vehicle faults.
#[instrument(name = "control_session", skip_all)]
pub async fn run_session<V, P>(
    mut engine: ControlEngine<V, P>,
    coordinator: ShutdownCoordinator<P>,
) -> SessionReport
where
    V: VehicleDriver,
    P: PubSubClient + Sync,
{
    let stop_reason = engine.run().await;

    let EngineParts {
        mut vehicle,
        status,
        video,
        stats,
        fault,
    } = engine.into_parts();

    let shutdown = coordinator.shutdown(&status, video, &mut vehicle).await;
    info!(
        reason = %stop_reason,
        cycles = stats.cycles,
        clean_shutdown = shutdown.is_clean(),
        "session finished"
    );

    SessionReport {
        stop_reason,
        stats,
        shutdown,
        fault,
    }
}
