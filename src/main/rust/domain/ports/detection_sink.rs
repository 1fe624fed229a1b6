use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::errors::Result;
use crate::domain::value_objects::Metrics;

/// One completed detection interval, appended to the event sink.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionRecord {
    pub camera_id: String,
    pub detected_count: u64,
    pub mode: String,
    pub fps: f64,
    pub recorded_at_ms: u64,
}

impl DetectionRecord {
    pub fn from_metrics(camera_id: &str, metrics: &Metrics) -> Self {
        let recorded_at_ms = metrics
            .emitted_at
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        Self {
            camera_id: camera_id.to_string(),
            detected_count: metrics.detected_count,
            mode: metrics.mode.clone(),
            fps: metrics.fps,
            recorded_at_ms,
        }
    }
}

/// Port for the append-only detection event sink. No read path is
/// required by the core.
#[async_trait]
pub trait DetectionSink: Send + Sync {
    async fn append(&self, record: &DetectionRecord) -> Result<()>;
}
