//! Control loop metrics
//!
//! Facade calls (`metrics` crate) plus an in-memory running summary for the
//! end-of-run report.

use std::time::Duration;

use contracts::ControlSnapshot;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

/// Register metric descriptions with the installed recorder
pub fn describe_metrics() {
    describe_counter!("smartcar_cycles_total", "Completed control cycles by mode");
    describe_gauge!("smartcar_speed", "Last commanded speed");
    describe_histogram!("smartcar_cycle_duration_ms", "Control cycle wall time");
    describe_counter!(
        "smartcar_commands_total",
        "Inbound control messages by kind and outcome"
    );
    describe_counter!("smartcar_detection_total", "Detection passes by outcome");
    describe_counter!(
        "smartcar_publish_total",
        "Outbound messages by channel and status"
    );
}

/// Record one completed cycle
pub fn record_cycle_metrics(snapshot: &ControlSnapshot, elapsed: Duration) {
    counter!("smartcar_cycles_total", "mode" => snapshot.mode.as_wire()).increment(1);
    gauge!("smartcar_speed").set(snapshot.speed as f64);
    histogram!("smartcar_cycle_duration_ms").record(elapsed.as_secs_f64() * 1000.0);
}

/// Online mean / variance / min / max (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary::from(self)
    }
}

/// Frozen view of a [`RunningStats`]
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}
