//! Run statistics

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use contracts::OperatingMode;
use observability::RunningStats;

/// Why the control loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// `Quit` observed at the top of a cycle
    QuitRequested,
    /// Vehicle raised its terminate flag
    VehicleTerminated,
    /// Vehicle call failed
    VehicleFault(String),
    /// Configured cycle limit reached
    CycleLimit(u64),
}

impl StopReason {
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::VehicleFault(_))
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QuitRequested => f.write_str("quit requested"),
            Self::VehicleTerminated => f.write_str("vehicle requested termination"),
            Self::VehicleFault(message) => write!(f, "vehicle fault: {message}"),
            Self::CycleLimit(limit) => write!(f, "cycle limit {limit} reached"),
        }
    }
}

/// Statistics from a control loop run
#[derive(Debug, Clone, Default)]
pub struct CycleStats {
    /// Completed cycles
    pub cycles: u64,

    /// Completed cycles per mode
    pub cycles_by_mode: HashMap<OperatingMode, u64>,

    /// Detection passes that fell back to the neutral outcome
    pub detection_failures: u64,

    /// Status messages that could not be published
    pub publish_failures: u64,

    /// Last commanded speed
    pub final_speed: i32,

    /// Per-cycle wall time (milliseconds)
    pub cycle_time_ms: RunningStats,

    /// Wall time of the loop
    pub duration: Duration,
}

impl CycleStats {
    pub(crate) fn record_cycle(&mut self, mode: OperatingMode, speed: i32, elapsed: Duration) {
        self.cycles += 1;
        self.cycle_time_ms.push(elapsed.as_secs_f64() * 1000.0);
        *self.cycles_by_mode.entry(mode).or_default() += 1;
        self.final_speed = speed;
    }

    /// Completed cycles in `mode`
    pub fn cycles_in(&self, mode: OperatingMode) -> u64 {
        self.cycles_by_mode.get(&mode).copied().unwrap_or(0)
    }

    /// Cycles per second
    pub fn cycle_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.cycles as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print a human-readable summary
    pub fn print_summary(&self) {
        println!("\n=== Control Loop Statistics ===\n");
        println!("  Duration:            {:.2}s", self.duration.as_secs_f64());
        println!("  Cycles:              {}", self.cycles);
        println!("  Cycle rate:          {:.2}/s", self.cycle_rate());
        println!("  Final speed:         {}", self.final_speed);
        println!("  Detection failures:  {}", self.detection_failures);
        println!("  Publish failures:    {}", self.publish_failures);
        println!("  Cycle time (ms):     {}", self.cycle_time_ms.summary());

        println!("\n  Cycles per mode");
        for mode in OperatingMode::ALL {
            let count = self.cycles_in(mode);
            if count > 0 {
                println!("    {:<15} {}", mode.as_wire(), count);
            }
        }
        println!();
    }
}
