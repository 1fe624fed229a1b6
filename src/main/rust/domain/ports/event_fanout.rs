use crate::domain::value_objects::StreamEvent;

/// Port for the pipeline-facing side of the fan-out broadcaster.
///
/// Ingestion must be non-blocking: no subscriber may stall the
/// producing pipeline.
pub trait EventFanout: Send + Sync {
    /// Offer one event to every subscriber of the camera.
    fn publish(&self, camera_id: &str, event: &StreamEvent);

    /// Announce that sequence numbers may jump (reconfiguration
    /// boundary).
    fn mark_discontinuity(&self, camera_id: &str);
}
