use lazy_static::lazy_static;
use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};

use crate::domain::ports::MetricsReporter;
use crate::domain::value_objects::{Metrics, PipelineState};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Active pipeline state (0=Stopped, 1=Starting, 2=Running, 3=Reconfiguring, 4=Failed)
    pub static ref PIPELINE_STATE: Gauge = Gauge::new(
        "pipeline_state",
        "Current state of the active camera pipeline"
    ).expect("metric can be created");

    // Total automatic engine restart attempts
    pub static ref RESTART_ATTEMPTS: IntCounter = IntCounter::new(
        "engine_restart_attempts_total",
        "Total number of automatic engine restart attempts"
    ).expect("metric can be created");

    // Current restart backoff delay in seconds
    pub static ref BACKOFF_SECONDS: Gauge = Gauge::new(
        "engine_restart_backoff_seconds",
        "Current engine restart backoff delay"
    ).expect("metric can be created");

    // Currently attached stream subscribers
    pub static ref ATTACHED_SUBSCRIBERS: IntGauge = IntGauge::new(
        "stream_subscribers",
        "Number of currently attached stream subscribers"
    ).expect("metric can be created");

    // Total subscribers evicted as unresponsive
    pub static ref EVICTED_SUBSCRIBERS: IntCounter = IntCounter::new(
        "stream_subscribers_evicted_total",
        "Total subscribers evicted for staying saturated"
    ).expect("metric can be created");

    // Total events offered to subscriber queues
    pub static ref EVENTS_BROADCAST: IntCounter = IntCounter::new(
        "stream_events_broadcast_total",
        "Total frame/metrics events offered to subscribers"
    ).expect("metric can be created");

    // Total events dropped by full subscriber queues
    pub static ref EVENTS_DROPPED: IntCounter = IntCounter::new(
        "stream_events_dropped_total",
        "Total events dropped from full subscriber queues"
    ).expect("metric can be created");

    // Latest detection fps reported by the engine
    pub static ref DETECTION_FPS: Gauge = Gauge::new(
        "detection_fps",
        "Frames per second reported by the vision engine"
    ).expect("metric can be created");

    // Latest detected people count
    pub static ref DETECTED_PEOPLE: IntGauge = IntGauge::new(
        "detected_people",
        "People detected in the latest interval"
    ).expect("metric can be created");
}

pub struct PrometheusReporter;

impl PrometheusReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn init_metrics() -> Result<(), prometheus::Error> {
        REGISTRY.register(Box::new(PIPELINE_STATE.clone()))?;
        REGISTRY.register(Box::new(RESTART_ATTEMPTS.clone()))?;
        REGISTRY.register(Box::new(BACKOFF_SECONDS.clone()))?;
        REGISTRY.register(Box::new(ATTACHED_SUBSCRIBERS.clone()))?;
        REGISTRY.register(Box::new(EVICTED_SUBSCRIBERS.clone()))?;
        REGISTRY.register(Box::new(EVENTS_BROADCAST.clone()))?;
        REGISTRY.register(Box::new(EVENTS_DROPPED.clone()))?;
        REGISTRY.register(Box::new(DETECTION_FPS.clone()))?;
        REGISTRY.register(Box::new(DETECTED_PEOPLE.clone()))?;
        Ok(())
    }

    pub fn gather_metrics() -> Vec<u8> {
        let encoder = TextEncoder::new();
        let metric_families = REGISTRY.gather();
        let mut buffer = vec![];
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
            return b"# Error encoding metrics\n".to_vec();
        }
        buffer
    }
}

impl Default for PrometheusReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsReporter for PrometheusReporter {
    fn report_state_change(&self, _camera_id: &str, state: PipelineState) {
        PIPELINE_STATE.set(state.as_metric());
    }

    fn report_restart_attempt(&self, _camera_id: &str) {
        RESTART_ATTEMPTS.inc();
    }

    fn report_backoff(&self, delay_secs: f64) {
        BACKOFF_SECONDS.set(delay_secs);
    }

    fn report_detection_sample(&self, metrics: &Metrics) {
        DETECTION_FPS.set(metrics.fps);
        DETECTED_PEOPLE.set(metrics.detected_count as i64);
    }

    fn report_subscriber_attached(&self) {
        ATTACHED_SUBSCRIBERS.inc();
    }

    fn report_subscriber_detached(&self) {
        ATTACHED_SUBSCRIBERS.dec();
    }

    fn report_subscriber_evicted(&self) {
        ATTACHED_SUBSCRIBERS.dec();
        EVICTED_SUBSCRIBERS.inc();
    }

    fn report_event_broadcast(&self) {
        EVENTS_BROADCAST.inc();
    }

    fn report_event_dropped(&self) {
        EVENTS_DROPPED.inc();
    }
}
