use crate::domain::value_objects::{Metrics, PipelineState};

/// Port for metrics reporting
pub trait MetricsReporter: Send + Sync {
    fn report_state_change(&self, camera_id: &str, state: PipelineState);
    fn report_restart_attempt(&self, camera_id: &str);
    fn report_backoff(&self, delay_secs: f64);
    fn report_detection_sample(&self, metrics: &Metrics);
    fn report_subscriber_attached(&self);
    fn report_subscriber_detached(&self);
    fn report_subscriber_evicted(&self);
    fn report_event_broadcast(&self);
    fn report_event_dropped(&self);
}
