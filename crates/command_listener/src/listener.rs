//! Listener task
//!
//! Drains the transport's inbound channel, decodes each message and applies
//! it to the tracker. Runs until stopped or until the channel closes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_channel::Receiver;
use contracts::{InboundMessage, TopicConfig};
use phase_tracker::PhaseTracker;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::command::{decode, Decoded, IgnoreReason};

/// Applied / ignored message counters
#[derive(Debug, Default)]
pub struct ListenerMetrics {
    applied: AtomicU64,
    ignored: AtomicU64,
}

impl ListenerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn applied(&self) -> u64 {
        self.applied.load(Ordering::Relaxed)
    }

    pub fn ignored(&self) -> u64 {
        self.ignored.load(Ordering::Relaxed)
    }

    fn record_applied(&self, kind: &'static str) {
        self.applied.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("smartcar_commands_total", "kind" => kind, "outcome" => "applied")
            .increment(1);
    }

    fn record_ignored(&self, kind: &'static str) {
        self.ignored.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("smartcar_commands_total", "kind" => kind, "outcome" => "ignored")
            .increment(1);
    }

    pub fn snapshot(&self) -> ListenerStats {
        ListenerStats {
            applied: self.applied(),
            ignored: self.ignored(),
        }
    }
}

/// Counts reported when the listener stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStats {
    pub applied: u64,
    pub ignored: u64,
}

/// Spawns the listener task
pub struct CommandListener;

impl CommandListener {
    /// Start applying inbound messages to `tracker`
    pub fn spawn(
        tracker: PhaseTracker,
        inbound: Receiver<InboundMessage>,
        topics: TopicConfig,
    ) -> ListenerHandle {
        let metrics = Arc::new(ListenerMetrics::new());
        let (stop_tx, stop_rx) = oneshot::channel();

        let worker_metrics = Arc::clone(&metrics);
        let task = tokio::spawn(async move {
            listen(tracker, inbound, topics, worker_metrics, stop_rx).await;
        });

        ListenerHandle {
            stop_tx: Some(stop_tx),
            metrics,
            task,
        }
    }
}

/// Handle to a running listener
pub struct ListenerHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    metrics: Arc<ListenerMetrics>,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    /// Live counters
    pub fn metrics(&self) -> &Arc<ListenerMetrics> {
        &self.metrics
    }

    /// Whether the task has ended (stopped or channel closed)
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the task; no message is applied after this returns
    #[instrument(name = "listener_stop", skip(self))]
    pub async fn stop(mut self) -> ListenerStats {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            error!(error = ?e, "listener task panicked");
        }
        let stats = self.metrics.snapshot();
        debug!(applied = stats.applied, ignored = stats.ignored, "listener stopped");
        stats
    }
}

#[instrument(name = "listener_loop", skip_all)]
async fn listen(
    tracker: PhaseTracker,
    inbound: Receiver<InboundMessage>,
    topics: TopicConfig,
    metrics: Arc<ListenerMetrics>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    info!("command listener started");
    loop {
        tokio::select! {
            biased;
            _ = &mut stop_rx => break,
            received = inbound.recv() => match received {
                Ok(msg) => handle_message(&tracker, &topics, &metrics, &msg),
                Err(_) => {
                    debug!("inbound channel closed");
                    break;
                }
            },
        }
    }
    info!("command listener finished");
}

fn handle_message(
    tracker: &PhaseTracker,
    topics: &TopicConfig,
    metrics: &ListenerMetrics,
    msg: &InboundMessage,
) {
    match decode(msg, topics) {
        Decoded::Apply(command) => {
            debug!(topic = %msg.topic, kind = command.kind(), "applying command");
            if command.apply(tracker) {
                metrics.record_applied(command.kind());
            } else {
                warn!(topic = %msg.topic, kind = command.kind(), "ignoring mode change, quit pending");
                metrics.record_ignored(command.kind());
            }
        }
        Decoded::Ignored(reason) => {
            match &reason {
                IgnoreReason::UnknownTopic(_) => debug!(reason = %reason, "ignoring message"),
                _ => warn!(topic = %msg.topic, reason = %reason, "ignoring message"),
            }
            metrics.record_ignored(reason.kind());
        }
    }
}
