use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use super::pipeline_service::{PipelineHandle, PipelineService, PipelineSettings};
use crate::domain::entities::{CameraStatus, ClusterSnapshot, PipelineStatus};
use crate::domain::errors::{DomainError, Result};
use crate::domain::ports::{DetectionSink, EventFanout, MetricsReporter, VisionEngine};
use crate::domain::value_objects::{CameraDescriptor, PipelineState, RegionOfInterest, RoiSpec};

/// Single authoritative owner of "which camera is active".
///
/// All mutating operations are serialized on one lock so that
/// camera-switch mutual exclusion is trivially correct: at most one
/// pipeline is ever in a non-Stopped state. Pipeline-internal
/// concurrency (engine I/O, fan-out) never holds this lock, and
/// `snapshot` never takes it.
pub struct ClusterCoordinator {
    registry: Vec<CameraDescriptor>,
    engine: Arc<dyn VisionEngine>,
    fanout: Arc<dyn EventFanout>,
    sink: Arc<dyn DetectionSink>,
    metrics: Arc<dyn MetricsReporter>,
    settings: PipelineSettings,
    default_roi: RegionOfInterest,
    statuses: HashMap<String, Arc<RwLock<PipelineStatus>>>,
    current_camera: RwLock<Option<String>>,
    // The serialization point for switch/reconfigure/shutdown
    active: Mutex<Option<PipelineHandle>>,
}

impl ClusterCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Vec<CameraDescriptor>,
        engine: Arc<dyn VisionEngine>,
        fanout: Arc<dyn EventFanout>,
        sink: Arc<dyn DetectionSink>,
        metrics: Arc<dyn MetricsReporter>,
        settings: PipelineSettings,
        default_roi: RegionOfInterest,
    ) -> Self {
        let statuses = registry
            .iter()
            .map(|camera| {
                (
                    camera.id().to_string(),
                    Arc::new(RwLock::new(PipelineStatus::default())),
                )
            })
            .collect();

        Self {
            registry,
            engine,
            fanout,
            sink,
            metrics,
            settings,
            default_roi,
            statuses,
            current_camera: RwLock::new(None),
            active: Mutex::new(None),
        }
    }

    pub fn cameras(&self) -> &[CameraDescriptor] {
        &self.registry
    }

    /// Make the given camera the active one. The previously active
    /// pipeline is stopped before the target starts, so at most one
    /// pipeline drives a native engine at any instant. Re-requesting
    /// the already-active camera is an ack, except when that pipeline
    /// is Failed: then it is the explicit restart request.
    pub async fn switch_camera(&self, camera_id: &str) -> Result<()> {
        let descriptor = self.lookup(camera_id)?.clone();
        let mut active = self.active.lock().await;

        if let Some(handle) = active.as_ref() {
            if handle.camera_id() == camera_id {
                let state = match self.status_cell(camera_id) {
                    Some(cell) => cell.read().await.state,
                    None => PipelineState::Stopped,
                };

                if state != PipelineState::Failed {
                    tracing::debug!(camera_id, "Camera already active");
                    return Ok(());
                }
                tracing::info!(camera_id, "Explicit restart of failed pipeline");
            } else {
                tracing::info!(from = handle.camera_id(), to = camera_id, "Switching camera");
            }
        } else {
            tracing::info!(camera_id, "Activating camera");
        }

        if let Some(previous) = active.take() {
            previous.stop().await;
        }

        let status = self
            .status_cell(camera_id)
            .ok_or_else(|| DomainError::UnknownCamera(camera_id.to_string()))?;

        let handle = PipelineService::spawn(
            descriptor,
            self.default_roi,
            self.engine.clone(),
            self.fanout.clone(),
            self.sink.clone(),
            self.metrics.clone(),
            self.settings,
            status,
        );

        *active = Some(handle);
        *self.current_camera.write().await = Some(camera_id.to_string());

        Ok(())
    }

    /// Replace the ROI of the named camera's running pipeline.
    /// Validation failures (`UnknownCamera`, `InvalidRoi`) are returned
    /// before any pipeline state is touched.
    pub async fn reconfigure(&self, camera_id: &str, spec: RoiSpec) -> Result<()> {
        self.lookup(camera_id)?;
        let roi = spec.validate()?;

        let active = self.active.lock().await;
        match active.as_ref() {
            Some(handle) if handle.camera_id() == camera_id => handle.reconfigure(roi).await,
            _ => Err(DomainError::PipelineNotRunning(camera_id.to_string())),
        }
    }

    /// Read-only aggregate of the cluster state. Never takes the
    /// coordinator's serialization point, so status reads cannot block
    /// pipeline progress.
    pub async fn snapshot(&self) -> ClusterSnapshot {
        let current = self.current_camera.read().await.clone();

        let mut cameras = Vec::with_capacity(self.registry.len());
        let mut active_status = None;

        for descriptor in &self.registry {
            let status = match self.status_cell(descriptor.id()) {
                Some(cell) => cell.read().await.clone(),
                None => PipelineStatus::default(),
            };

            if current.as_deref() == Some(descriptor.id()) {
                active_status = Some(status.clone());
            }

            cameras.push(CameraStatus::new(descriptor, status.state));
        }

        ClusterSnapshot::assemble(current, cameras, active_status.as_ref())
    }

    /// Stop the active pipeline (process shutdown path).
    pub async fn shutdown(&self) {
        let mut active = self.active.lock().await;
        if let Some(handle) = active.take() {
            handle.stop().await;
        }
        *self.current_camera.write().await = None;
    }

    fn lookup(&self, camera_id: &str) -> Result<&CameraDescriptor> {
        self.registry
            .iter()
            .find(|camera| camera.id() == camera_id)
            .ok_or_else(|| DomainError::UnknownCamera(camera_id.to_string()))
    }

    fn status_cell(&self, camera_id: &str) -> Option<Arc<RwLock<PipelineStatus>>> {
        self.statuses.get(camera_id).cloned()
    }
}
