use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::errors::Result;
use crate::domain::value_objects::{CameraDescriptor, RegionOfInterest, Stage, StreamEvent};

/// Event emitted by a running engine handle.
///
/// An unexpected process exit surfaces as a terminal `Exited` event on
/// the stream, never as a fault crossing the process boundary, so the
/// pipeline state machine can react uniformly.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A stage reported readiness (input capture ready, config applied)
    StageReady(Stage),
    /// A frame or metrics record was produced
    Event(StreamEvent),
    /// The process exited; terminal for this handle
    Exited { status: Option<i32> },
}

/// Port for the native vision engine boundary.
///
/// Implementations own the OS process/resource lifetime exclusively;
/// no other component may signal the engine directly.
#[async_trait]
pub trait VisionEngine: Send + Sync {
    /// Launch the per-camera engine with the given ROI. Fails with
    /// `SpawnFailed` if the process cannot be started.
    async fn start(
        &self,
        camera: &CameraDescriptor,
        roi: RegionOfInterest,
    ) -> Result<Box<dyn EngineHandle>>;
}

/// Handle to one running engine instance.
#[async_trait]
pub trait EngineHandle: Send + std::fmt::Debug {
    /// Take the event receiver for this handle. Yields `None` after the
    /// first call; the stream ends when the process exits or is stopped.
    fn take_events(&mut self) -> Option<mpsc::Receiver<EngineEvent>>;

    /// Request graceful termination, escalating to forced termination
    /// after a grace timeout. Stopping an already-stopped handle is a
    /// no-op.
    async fn stop(&mut self);
}
