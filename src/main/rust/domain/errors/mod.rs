use std::time::Duration;

use thiserror::Error;

use crate::domain::value_objects::Stage;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Failed to spawn vision engine: {0}")]
    SpawnFailed(String),

    #[error("Stage {0} did not report readiness within {1:?}")]
    StageTimeout(Stage, Duration),

    #[error("Invalid ROI: width and height must be positive (got {width}x{height})")]
    InvalidRoi { width: u32, height: u32 },

    #[error("Unknown camera: {0}")]
    UnknownCamera(String),

    #[error("Pipeline for camera {0} is not running")]
    PipelineNotRunning(String),

    #[error("Invalid backoff policy: {0}")]
    InvalidBackoff(String),

    #[error("Failed to append detection record: {0}")]
    SinkAppend(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
