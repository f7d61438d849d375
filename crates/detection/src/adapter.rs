//! Detection adapter
//!
//! Runs the engine on a blocking thread, filters its raw output, annotates
//! the frame and reduces everything to one traffic-light phase.
//!
//! At most one engine call is in flight. A call that outlives its deadline
//! keeps its blocking thread; until it returns, later passes degrade without
//! submitting new work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{DetectionConfig, DetectionEngine, Frame, TrafficLightPhase};
use tracing::{debug, instrument, warn};

use crate::annotate::{draw_boxes, label};
use crate::class_table::ClassTable;

/// Phase priority, highest first
const PHASE_PRIORITY: [TrafficLightPhase; 4] = [
    TrafficLightPhase::Red,
    TrafficLightPhase::RedYellow,
    TrafficLightPhase::Yellow,
    TrafficLightPhase::Green,
];

/// Result of one detection pass
#[derive(Debug, Clone)]
pub struct DetectionOutcome {
    /// Selected phase (`Off` when nothing selects one)
    pub phase: TrafficLightPhase,

    /// Frame with retained boxes drawn in class colours
    pub annotated: Frame,

    /// `"<class> (<score%>)"` per retained detection
    pub labels: Vec<String>,

    /// True when the engine failed and the neutral outcome was substituted
    pub degraded: bool,
}

impl DetectionOutcome {
    /// Neutral outcome used when the engine fails
    pub fn fallback(frame: &Frame) -> Self {
        Self {
            phase: TrafficLightPhase::Off,
            annotated: frame.clone(),
            labels: Vec::new(),
            degraded: true,
        }
    }
}

/// Reduce candidate phases by fixed priority
///
/// First match in `Red > RedYellow > Yellow > Green` wins regardless of score;
/// no candidates gives `Off`.
pub fn reduce_phase(candidates: &[TrafficLightPhase]) -> TrafficLightPhase {
    PHASE_PRIORITY
        .into_iter()
        .find(|phase| candidates.contains(phase))
        .unwrap_or(TrafficLightPhase::Off)
}

/// Clears the in-flight flag when the engine call ends, panics included
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Wraps a [`DetectionEngine`] with filtering, annotation and a deadline
#[derive(Clone)]
pub struct DetectionAdapter {
    engine: Arc<dyn DetectionEngine>,
    classes: Arc<ClassTable>,
    score_threshold: f32,
    timeout: Duration,
    in_flight: Arc<AtomicBool>,
}

impl std::fmt::Debug for DetectionAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionAdapter")
            .field("engine", &self.engine.name())
            .field("classes", &self.classes.len())
            .field("score_threshold", &self.score_threshold)
            .field("timeout", &self.timeout)
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .finish()
    }
}

impl DetectionAdapter {
    pub fn new(engine: Arc<dyn DetectionEngine>, config: &DetectionConfig, timeout: Duration) -> Self {
        Self {
            engine,
            classes: Arc::new(ClassTable::new(&config.classes)),
            score_threshold: config.score_threshold,
            timeout,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Detect, filter, annotate and reduce
    ///
    /// Never fails: engine errors, panics, timeouts and a still-running
    /// earlier call yield [`DetectionOutcome::fallback`].
    #[instrument(
        name = "detection_detect",
        skip(self, frame),
        fields(engine = %self.engine.name(), width = frame.width, height = frame.height)
    )]
    pub async fn detect(&self, frame: &Frame) -> DetectionOutcome {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return self.degrade(frame, "busy", "previous engine call still running");
        }
        let guard = InFlightGuard(Arc::clone(&self.in_flight));

        let engine = Arc::clone(&self.engine);
        let input = frame.clone();
        let call = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            engine.detect(&input)
        });

        let detections = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(Ok(detections))) => detections,
            Ok(Ok(Err(e))) => return self.degrade(frame, "error", &e.to_string()),
            Ok(Err(join_err)) => return self.degrade(frame, "panic", &join_err.to_string()),
            Err(_) => {
                let message = format!("no result within {}ms", self.timeout.as_millis());
                return self.degrade(frame, "timeout", &message);
            }
        };

        let mut boxes = Vec::new();
        let mut labels = Vec::new();
        let mut candidates = Vec::new();

        for det in detections {
            if det.score < self.score_threshold {
                continue;
            }
            let Some(class) = self.classes.get(det.class_id) else {
                warn!(class_id = det.class_id, "detection with unknown class dropped");
                continue;
            };
            boxes.push((det.bbox, class.color));
            labels.push(label(&class.name, det.score));
            if let Some(phase) = class.phase {
                candidates.push(phase);
            }
        }

        let annotated = match draw_boxes(frame, &boxes) {
            Ok(annotated) => annotated,
            Err(e) => {
                warn!(error = %e, "annotation failed, using raw frame");
                frame.clone()
            }
        };

        let phase = reduce_phase(&candidates);
        metrics::counter!("smartcar_detection_total", "outcome" => "ok").increment(1);
        debug!(phase = %phase, labels = ?labels, "detection complete");

        DetectionOutcome {
            phase,
            annotated,
            labels,
            degraded: false,
        }
    }

    fn degrade(&self, frame: &Frame, outcome: &'static str, message: &str) -> DetectionOutcome {
        warn!(outcome, error = %message, "detection failed, assuming no light");
        metrics::counter!("smartcar_detection_total", "outcome" => outcome).increment(1);
        DetectionOutcome::fallback(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{BoundingBox, ContractError, Detection};

    use crate::scripted::ScriptedDetectionEngine;

    fn det(class_id: usize, score: f32) -> Detection {
        Detection::new(class_id, score, BoundingBox::new(1.0, 1.0, 6.0, 6.0))
    }

    fn adapter(engine: impl DetectionEngine + 'static) -> DetectionAdapter {
        DetectionAdapter::new(
            Arc::new(engine),
            &DetectionConfig::default(),
            Duration::from_millis(200),
        )
    }

    struct PanickingEngine;

    impl DetectionEngine for PanickingEngine {
        fn name(&self) -> &str {
            "panicking"
        }

        fn detect(&self, _frame: &Frame) -> Result<Vec<Detection>, ContractError> {
            panic!("inference crashed")
        }
    }

    struct SlowEngine;

    impl DetectionEngine for SlowEngine {
        fn name(&self) -> &str {
            "slow"
        }

        fn detect(&self, _frame: &Frame) -> Result<Vec<Detection>, ContractError> {
            std::thread::sleep(Duration::from_millis(600));
            Ok(vec![det(0, 0.9)])
        }
    }

    /// Blocks every call until the test drops the sender
    struct GatedEngine {
        calls: Arc<std::sync::atomic::AtomicUsize>,
        gate: std::sync::Mutex<std::sync::mpsc::Receiver<()>>,
    }

    impl DetectionEngine for GatedEngine {
        fn name(&self) -> &str {
            "gated"
        }

        fn detect(&self, _frame: &Frame) -> Result<Vec<Detection>, ContractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let _ = self.gate.lock().unwrap().recv();
            Ok(vec![det(2, 0.9)])
        }
    }

    #[test]
    fn test_reduce_phase_priority() {
        use TrafficLightPhase::*;
        assert_eq!(reduce_phase(&[Green, Red]), Red);
        assert_eq!(reduce_phase(&[Green, Yellow]), Yellow);
        assert_eq!(reduce_phase(&[Yellow, RedYellow]), RedYellow);
        assert_eq!(reduce_phase(&[Green]), Green);
        assert_eq!(reduce_phase(&[]), Off);
    }

    #[tokio::test]
    async fn test_red_beats_higher_scoring_green() {
        let engine = ScriptedDetectionEngine::single(vec![det(0, 0.9), det(2, 0.99)]);
        let outcome = adapter(engine).detect(&Frame::solid(8, 8, [0, 0, 0])).await;
        assert_eq!(outcome.phase, TrafficLightPhase::Red);
        assert_eq!(outcome.labels, vec!["red (90%)", "green (99%)"]);
        assert!(!outcome.degraded);
    }

    #[tokio::test]
    async fn test_below_threshold_dropped() {
        let engine = ScriptedDetectionEngine::single(vec![det(0, 0.2), det(2, 0.3)]);
        let outcome = adapter(engine).detect(&Frame::solid(8, 8, [0, 0, 0])).await;
        assert_eq!(outcome.phase, TrafficLightPhase::Green);
        assert_eq!(outcome.labels.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_class_dropped() {
        let engine = ScriptedDetectionEngine::single(vec![det(42, 0.9)]);
        let outcome = adapter(engine).detect(&Frame::solid(8, 8, [0, 0, 0])).await;
        assert_eq!(outcome.phase, TrafficLightPhase::Off);
        assert!(outcome.labels.is_empty());
        assert!(!outcome.degraded);
    }

    #[tokio::test]
    async fn test_off_and_person_annotated_without_phase() {
        let engine = ScriptedDetectionEngine::single(vec![det(4, 0.8), det(5, 0.7)]);
        let frame = Frame::solid(8, 8, [255, 255, 255]);
        let outcome = adapter(engine).detect(&frame).await;
        assert_eq!(outcome.phase, TrafficLightPhase::Off);
        assert_eq!(outcome.labels, vec!["off (80%)", "Person (70%)"]);
        assert_ne!(outcome.annotated, frame);
    }

    #[tokio::test]
    async fn test_engine_error_degrades() {
        let engine = ScriptedDetectionEngine::failing("model not loaded");
        let frame = Frame::solid(8, 8, [1, 2, 3]);
        let outcome = adapter(engine).detect(&frame).await;
        assert!(outcome.degraded);
        assert_eq!(outcome.phase, TrafficLightPhase::Off);
        assert_eq!(outcome.annotated, frame);
    }

    #[tokio::test]
    async fn test_engine_panic_degrades() {
        let outcome = adapter(PanickingEngine)
            .detect(&Frame::solid(4, 4, [0, 0, 0]))
            .await;
        assert!(outcome.degraded);
    }

    #[tokio::test]
    async fn test_hung_engine_keeps_one_call_in_flight() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let (release, gate) = std::sync::mpsc::channel::<()>();
        let adapter = DetectionAdapter::new(
            Arc::new(GatedEngine {
                calls: Arc::clone(&calls),
                gate: std::sync::Mutex::new(gate),
            }),
            &DetectionConfig::default(),
            Duration::from_millis(30),
        );
        let frame = Frame::solid(4, 4, [0, 0, 0]);

        for _ in 0..5 {
            let outcome = adapter.detect(&frame).await;
            assert!(outcome.degraded);
            assert_eq!(outcome.phase, TrafficLightPhase::Off);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // once the stuck call returns, the next pass reaches the engine again
        drop(release);
        let mut recovered = None;
        for _ in 0..50 {
            let outcome = adapter.detect(&frame).await;
            if !outcome.degraded {
                recovered = Some(outcome);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(recovered.unwrap().phase, TrafficLightPhase::Green);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_engine_timeout_degrades() {
        let outcome = adapter(SlowEngine).detect(&Frame::solid(4, 4, [0, 0, 0])).await;
        assert!(outcome.degraded);
        assert_eq!(outcome.phase, TrafficLightPhase::Off);
    }
}
