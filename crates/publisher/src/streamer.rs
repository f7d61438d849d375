//! VideoStreamer - latest-frame worker in front of a [`VideoSink`]
//!
//! The control loop hands frames over without waiting. The worker always
//! sends the newest frame; frames offered while a send is in flight replace
//! each other and only the last one goes out.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use contracts::{Frame, VideoSink};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use crate::metrics::ChannelMetrics;

/// Counters reported at shutdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamerStats {
    pub offered: u64,
    pub sent: u64,
    pub failed: u64,
}

impl StreamerStats {
    /// Frames superseded before the worker got to them
    pub fn skipped(&self) -> u64 {
        self.offered.saturating_sub(self.sent + self.failed)
    }
}

/// Handle to a running video worker
pub struct VideoStreamer {
    name: String,
    tx: watch::Sender<Option<Frame>>,
    offered: AtomicU64,
    metrics: Arc<ChannelMetrics>,
    worker_handle: JoinHandle<()>,
}

impl VideoStreamer {
    /// Spawn the worker task around `sink`
    pub fn spawn<S: VideoSink + Send + 'static>(sink: S) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = watch::channel(None);
        let metrics = Arc::new(ChannelMetrics::new("video"));

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();
        let worker_handle = tokio::spawn(async move {
            video_worker(sink, rx, worker_metrics, worker_name).await;
        });

        Self {
            name,
            tx,
            offered: AtomicU64::new(0),
            metrics,
            worker_handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<ChannelMetrics> {
        &self.metrics
    }

    /// Queue `frame` as the next one to send, replacing any unsent frame
    pub fn offer(&self, frame: Frame) {
        self.offered.fetch_add(1, Ordering::Relaxed);
        self.tx.send_replace(Some(frame));
    }

    /// Stop the worker after it has sent the pending frame
    #[instrument(name = "video_streamer_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) -> StreamerStats {
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "video worker panicked");
        }
        let stats = StreamerStats {
            offered: self.offered.load(Ordering::Relaxed),
            sent: self.metrics.sent(),
            failed: self.metrics.failed(),
        };
        debug!(
            sink = %self.name,
            offered = stats.offered,
            sent = stats.sent,
            failed = stats.failed,
            "video streamer stopped"
        );
        stats
    }
}

#[instrument(name = "video_worker_loop", skip(sink, rx, metrics), fields(sink = %name))]
async fn video_worker<S: VideoSink>(
    mut sink: S,
    mut rx: watch::Receiver<Option<Frame>>,
    metrics: Arc<ChannelMetrics>,
    name: String,
) {
    debug!("video worker started");

    // changed() reports a pending value before it reports the closed channel
    while rx.changed().await.is_ok() {
        let frame = rx.borrow_and_update().clone();
        let Some(frame) = frame else { continue };

        match sink.send_frame(&frame).await {
            Ok(()) => metrics.inc_sent(),
            Err(e) => {
                metrics.inc_failed();
                warn!(error = %e, "video send failed");
            }
        }
    }

    debug!("video worker stopped");
}
