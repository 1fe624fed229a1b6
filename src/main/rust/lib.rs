pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-exports for convenience
pub use application::services::{ClusterCoordinator, PipelineHandle, PipelineService, PipelineSettings};
pub use config::Config;
pub use domain::entities::{ClusterSnapshot, PipelineLifecycle, PipelineStatus, StateTransition};
pub use domain::errors::{DomainError, Result};
pub use domain::ports::{
    DetectionRecord, DetectionSink, EngineEvent, EngineHandle, EventFanout, MetricsReporter,
    VisionEngine,
};
pub use domain::value_objects::{
    BackoffPolicy, CameraDescriptor, Frame, Metrics, PipelineState, RegionOfInterest,
    RestartPolicy, RoiSpec, Stage, StageStatus, StreamEvent,
};
pub use infrastructure::broadcast::Broadcaster;
pub use infrastructure::engine::{EngineConfig, ProcessEngine};
pub use infrastructure::metrics::PrometheusReporter;
pub use infrastructure::sink::JsonlDetectionSink;
