//! Status feed
//!
//! One message per snapshot field, each on its own topic under the status
//! prefix. Publishes are bounded by a deadline; failures are counted and
//! logged, never returned.

use std::sync::Arc;
use std::time::Duration;

use contracts::{ControlSnapshot, PubSubClient, StatusField, TopicConfig};
use tracing::{debug, instrument, warn};

use crate::metrics::ChannelMetrics;

/// Outcome of one `publish_status` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub sent: usize,
    pub failed: usize,
}

/// Publishes [`ControlSnapshot`]s through a [`PubSubClient`]
pub struct StatusPublisher<P> {
    client: P,
    topics: TopicConfig,
    timeout: Duration,
    metrics: Arc<ChannelMetrics>,
}

impl<P: PubSubClient> StatusPublisher<P> {
    pub fn new(client: P, topics: TopicConfig, timeout: Duration) -> Self {
        Self {
            client,
            topics,
            timeout,
            metrics: Arc::new(ChannelMetrics::new("status")),
        }
    }

    pub fn metrics(&self) -> &Arc<ChannelMetrics> {
        &self.metrics
    }

    /// Publish every field of `snapshot`
    #[instrument(
        name = "status_publish",
        skip(self, snapshot),
        fields(cycle = snapshot.cycle, mode = %snapshot.mode)
    )]
    pub async fn publish_status(&self, snapshot: &ControlSnapshot) -> PublishReport {
        let mut report = PublishReport::default();
        for (field, payload) in snapshot.field_payloads() {
            if self.publish_field(field, payload).await {
                report.sent += 1;
            } else {
                report.failed += 1;
            }
        }
        if report.failed > 0 {
            warn!(failed = report.failed, "status publish incomplete");
        }
        report
    }

    /// Publish `alive = false`
    ///
    /// Last status message of a run.
    #[instrument(name = "status_publish_offline", skip(self))]
    pub async fn publish_offline(&self) -> bool {
        self.publish_field(StatusField::Alive, false.to_string()).await
    }

    async fn publish_field(&self, field: StatusField, payload: String) -> bool {
        let topic = self.topics.status_topic(field);
        match tokio::time::timeout(self.timeout, self.client.publish(&topic, payload)).await {
            Ok(Ok(())) => {
                self.metrics.inc_sent();
                true
            }
            Ok(Err(e)) => {
                self.metrics.inc_failed();
                debug!(topic = %topic, error = %e, "status publish failed");
                false
            }
            Err(_) => {
                self.metrics.inc_failed();
                debug!(topic = %topic, timeout_ms = self.timeout.as_millis() as u64, "status publish timed out");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{OperatingMode, PhaseReading, TrafficLightPhase};
    use transport::LoopbackBus;

    fn snapshot() -> ControlSnapshot {
        ControlSnapshot {
            cycle: 1,
            mode: OperatingMode::PhaseFromRemote,
            speed: 30,
            steer: 1.5,
            pan: 90,
            tilt: 80,
            reported_phase: PhaseReading::from(TrafficLightPhase::Yellow),
            voltage: 7.456,
            action: "TL via MQTT: yellow".to_string(),
            aux_event: "None".to_string(),
            alive: true,
        }
    }

    fn publisher(bus: &LoopbackBus) -> StatusPublisher<LoopbackBus> {
        StatusPublisher::new(
            bus.clone(),
            TopicConfig::default(),
            Duration::from_millis(200),
        )
    }

    #[tokio::test]
    async fn test_one_message_per_field() {
        let (bus, _rx) = LoopbackBus::new(16);
        let report = publisher(&bus).publish_status(&snapshot()).await;
        assert_eq!(report, PublishReport { sent: 10, failed: 0 });

        let published = bus.published();
        assert_eq!(published.len(), 10);
        assert_eq!(bus.published_on("SMARTCAR_status/speed"), vec!["30"]);
        assert_eq!(bus.published_on("SMARTCAR_status/tlphase"), vec!["yellow"]);
        assert_eq!(bus.published_on("SMARTCAR_status/vcc"), vec!["7.46"]);
        assert_eq!(published.last().unwrap().topic, "SMARTCAR_status/alive");
    }

    #[tokio::test]
    async fn test_failures_counted_not_returned() {
        let (bus, _rx) = LoopbackBus::new(16);
        bus.set_fail_publish(true);
        let publisher = publisher(&bus);
        let report = publisher.publish_status(&snapshot()).await;
        assert_eq!(report.failed, 10);
        assert_eq!(publisher.metrics().failed(), 10);
    }

    #[tokio::test]
    async fn test_offline_message() {
        let (bus, _rx) = LoopbackBus::new(16);
        assert!(publisher(&bus).publish_offline().await);
        assert_eq!(bus.published_on("SMARTCAR_status/alive"), vec!["false"]);
    }
}
