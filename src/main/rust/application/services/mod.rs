mod coordinator;
mod pipeline_service;

pub use coordinator::ClusterCoordinator;
pub use pipeline_service::{PipelineHandle, PipelineService, PipelineSettings};
