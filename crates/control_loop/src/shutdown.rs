//! Ordered teardown
//!
//! Runs once the control loop has left its last cycle:
//!
//! 1. drain and stop the video worker
//! 2. publish the offline status
//! 3. stop the command listener
//! 4. unsubscribe the control topics
//! 5. disconnect from the broker
//! 6. release the vehicle
//!
//! Every step is attempted; a failing step is logged and the next one runs.

use std::time::Duration;

use command_listener::{ListenerHandle, ListenerStats};
use contracts::{PubSubClient, TopicConfig, VehicleDriver};
use publisher::{StatusPublisher, StreamerStats, VideoStreamer};
use tracing::{info, instrument, warn};

/// Deadline for each broker-facing teardown call
const STEP_TIMEOUT: Duration = Duration::from_secs(1);

/// What happened during teardown
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub video: Option<StreamerStats>,
    pub offline_published: bool,
    pub listener: Option<ListenerStats>,
    /// Topics whose unsubscribe failed or timed out
    pub unsubscribe_failures: Vec<String>,
    pub disconnected: bool,
    pub vehicle_released: bool,
}

impl ShutdownReport {
    /// Every step succeeded
    pub fn is_clean(&self) -> bool {
        self.offline_published
            && self.unsubscribe_failures.is_empty()
            && self.disconnected
            && self.vehicle_released
    }
}

/// Owns the broker-side resources torn down after the loop
pub struct ShutdownCoordinator<P> {
    client: P,
    control_topics: Vec<String>,
    listener: Option<ListenerHandle>,
}

impl<P: PubSubClient + Sync> ShutdownCoordinator<P> {
    pub fn new(client: P, topics: &TopicConfig) -> Self {
        Self {
            client,
            control_topics: topics
                .control_topics()
                .iter()
                .map(|t| t.to_string())
                .collect(),
            listener: None,
        }
    }

    /// Stop `listener` as part of teardown
    pub fn with_listener(mut self, listener: ListenerHandle) -> Self {
        self.listener = Some(listener);
        self
    }

    #[instrument(name = "shutdown", skip_all, fields(client = %self.client.name()))]
    pub async fn shutdown<V: VehicleDriver>(
        self,
        status: &StatusPublisher<P>,
        video: Option<VideoStreamer>,
        vehicle: &mut V,
    ) -> ShutdownReport {
        let mut report = ShutdownReport::default();

        if let Some(video) = video {
            report.video = Some(video.shutdown().await);
        }

        report.offline_published = status.publish_offline().await;
        if !report.offline_published {
            warn!("offline status not published");
        }

        if let Some(listener) = self.listener {
            report.listener = Some(listener.stop().await);
        }

        for topic in &self.control_topics {
            match tokio::time::timeout(STEP_TIMEOUT, self.client.unsubscribe(topic)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(topic = %topic, error = %e, "unsubscribe failed");
                    report.unsubscribe_failures.push(topic.clone());
                }
                Err(_) => {
                    warn!(topic = %topic, "unsubscribe timed out");
                    report.unsubscribe_failures.push(topic.clone());
                }
            }
        }

        report.disconnected =
            match tokio::time::timeout(STEP_TIMEOUT, self.client.disconnect()).await {
                Ok(Ok(())) => true,
                Ok(Err(e)) => {
                    warn!(error = %e, "disconnect failed");
                    false
                }
                Err(_) => {
                    warn!("disconnect timed out");
                    false
                }
            };

        vehicle.release();
        report.vehicle_released = true;

        info!(
            clean = report.is_clean(),
            offline_published = report.offline_published,
            disconnected = report.disconnected,
            "shutdown complete"
        );
        report
    }
}
