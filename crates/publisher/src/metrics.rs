//! Publish counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Success / failure counters for one output channel
#[derive(Debug)]
pub struct ChannelMetrics {
    channel: &'static str,
    sent: AtomicU64,
    failed: AtomicU64,
}

impl ChannelMetrics {
    /// Counters for `channel` (`status` or `video`)
    pub fn new(channel: &'static str) -> Self {
        Self {
            channel,
            sent: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn inc_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!("smartcar_publish_total", "channel" => self.channel, "status" => "ok")
            .increment(1);
    }

    pub fn inc_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!("smartcar_publish_total", "channel" => self.channel, "status" => "error")
            .increment(1);
    }
}
