mod cluster_snapshot;
mod pipeline_lifecycle;

pub use cluster_snapshot::{CameraStatus, ClusterSnapshot, PipelineStatus, ServiceStatus};
pub use pipeline_lifecycle::{PipelineLifecycle, StageSet, StateTransition};
