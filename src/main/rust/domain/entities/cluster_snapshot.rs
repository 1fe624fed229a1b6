use serde::Serialize;

use crate::domain::value_objects::{CameraDescriptor, Metrics, PipelineState, StageStatus};

/// Read model published by each pipeline into its shared status cell.
///
/// The coordinator assembles `ClusterSnapshot` values from these cells
/// on demand; they are never a second source of truth for transitions.
#[derive(Debug, Clone)]
pub struct PipelineStatus {
    pub state: PipelineState,
    pub input: StageStatus,
    pub config: StageStatus,
    pub distribution: StageStatus,
    pub latest_metrics: Option<Metrics>,
}

impl Default for PipelineStatus {
    fn default() -> Self {
        Self {
            state: PipelineState::Stopped,
            input: StageStatus::Pending,
            config: StageStatus::Pending,
            distribution: StageStatus::Pending,
            latest_metrics: None,
        }
    }
}

/// Per-stage readiness of the active pipeline as exposed to dashboards.
///
/// `subscribe` is the dashboard-facing name for the Distribution stage.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub subscribe: StageStatus,
    pub input: StageStatus,
    pub config: StageStatus,
}

impl Default for ServiceStatus {
    fn default() -> Self {
        Self {
            subscribe: StageStatus::Pending,
            input: StageStatus::Pending,
            config: StageStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraStatus {
    pub id: String,
    pub display_name: String,
    pub location: String,
    pub state: PipelineState,
}

impl CameraStatus {
    pub fn new(descriptor: &CameraDescriptor, state: PipelineState) -> Self {
        Self {
            id: descriptor.id().to_string(),
            display_name: descriptor.display_name().to_string(),
            location: descriptor.location().to_string(),
            state,
        }
    }
}

/// Derived, read-only aggregate of the cluster's operational state.
///
/// Computed on demand from the coordinator's authoritative state and
/// serialized as the `/status` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSnapshot {
    pub current_camera_id: Option<String>,
    pub cameras: Vec<CameraStatus>,
    pub mode: String,
    pub fps: f64,
    pub people_count: u64,
    pub detection_mode: Option<String>,
    pub service_status: ServiceStatus,
}

impl ClusterSnapshot {
    /// Assemble the snapshot from the active pipeline's status (if any)
    /// and the per-camera state list.
    pub fn assemble(
        current_camera_id: Option<String>,
        cameras: Vec<CameraStatus>,
        active: Option<&PipelineStatus>,
    ) -> Self {
        let (mode, service_status, metrics) = match active {
            Some(status) => (
                status.state.to_string(),
                ServiceStatus {
                    subscribe: status.distribution,
                    input: status.input,
                    config: status.config,
                },
                status.latest_metrics.clone(),
            ),
            None => (
                PipelineState::Stopped.to_string(),
                ServiceStatus::default(),
                None,
            ),
        };

        Self {
            current_camera_id,
            cameras,
            mode,
            fps: metrics.as_ref().map(|m| m.fps).unwrap_or(0.0),
            people_count: metrics.as_ref().map(|m| m.detected_count).unwrap_or(0),
            detection_mode: metrics.map(|m| m.mode),
            service_status,
        }
    }
}
