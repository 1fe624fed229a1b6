use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;

use super::output_codec::{parse_line, EngineLine};
use crate::domain::errors::{DomainError, Result};
use crate::domain::ports::{EngineEvent, EngineHandle, VisionEngine};
use crate::domain::value_objects::{CameraDescriptor, Frame, RegionOfInterest, StreamEvent};

/// Buffered events between the reader task and the pipeline
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Upper bound on a single frame payload; larger headers indicate a
/// corrupted stream
const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// How long the reader waits to reap the exit code after stdout EOF
const EXIT_REAP_GRACE: Duration = Duration::from_millis(500);

/// Configuration for launching the native engine binary.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    binary: PathBuf,
    frame_width: u32,
    frame_height: u32,
    stop_grace: Duration,
}

impl EngineConfig {
    pub fn new(binary: PathBuf, frame_width: u32, frame_height: u32, stop_grace: Duration) -> Self {
        Self {
            binary,
            frame_width,
            frame_height,
            stop_grace,
        }
    }

    pub fn frame_width(&self) -> u32 {
        self.frame_width
    }

    pub fn frame_height(&self) -> u32 {
        self.frame_height
    }
}

/// Subprocess-backed implementation of the `VisionEngine` port.
///
/// Launches `engine --window x,y,w,h --source <camera>` per camera and
/// decodes its stdout protocol into typed events. The spawned process
/// is owned exclusively by the returned handle.
pub struct ProcessEngine {
    config: EngineConfig,
}

impl ProcessEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl VisionEngine for ProcessEngine {
    async fn start(
        &self,
        camera: &CameraDescriptor,
        roi: RegionOfInterest,
    ) -> Result<Box<dyn EngineHandle>> {
        let window = roi
            .clamped(self.config.frame_width, self.config.frame_height)
            .as_window_arg();

        tracing::info!(
            camera_id = camera.id(),
            window = %window,
            "Spawning vision engine"
        );

        let mut child = Command::new(&self.config.binary)
            .arg("--window")
            .arg(&window)
            .arg("--source")
            .arg(camera.id())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DomainError::SpawnFailed(e.to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DomainError::SpawnFailed("stdout not captured".to_string()))?;
        let stdin = child.stdin.take();

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(drain_stderr(stderr, camera.id().to_string()));
        }

        let child = Arc::new(Mutex::new(Some(child)));

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(read_output(
            stdout,
            tx,
            camera.id().to_string(),
            child.clone(),
        ));

        Ok(Box::new(ProcessHandle {
            child,
            stdin,
            events: Some(rx),
            stop_grace: self.config.stop_grace,
        }))
    }
}

/// Handle owning one engine subprocess.
///
/// The child is shared with the reader task so an unexpected exit can
/// carry the real exit code on the event stream.
#[derive(Debug)]
struct ProcessHandle {
    child: Arc<Mutex<Option<Child>>>,
    stdin: Option<ChildStdin>,
    events: Option<mpsc::Receiver<EngineEvent>>,
    stop_grace: Duration,
}

#[async_trait]
impl EngineHandle for ProcessHandle {
    fn take_events(&mut self) -> Option<mpsc::Receiver<EngineEvent>> {
        self.events.take()
    }

    async fn stop(&mut self) {
        let Some(mut child) = self.child.lock().await.take() else {
            return; // already stopped
        };

        // Closing stdin asks the engine to exit; escalate after the
        // grace period.
        drop(self.stdin.take());

        match timeout(self.stop_grace, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(%status, "Vision engine exited gracefully");
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Failed to await vision engine exit");
            }
            Err(_) => {
                tracing::warn!(
                    grace = ?self.stop_grace,
                    "Vision engine did not exit in time, killing"
                );
                let _ = child.kill().await;
            }
        }
    }
}

async fn read_output(
    stdout: ChildStdout,
    tx: mpsc::Sender<EngineEvent>,
    camera_id: String,
    child: Arc<Mutex<Option<Child>>>,
) {
    let mut reader = BufReader::new(stdout);
    let mut line = String::new();
    let mut sequence: u64 = 0;

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let event = match parse_line(&line) {
                    EngineLine::Ready(stage) => Some(EngineEvent::StageReady(stage)),
                    EngineLine::Metrics(metrics) => {
                        Some(EngineEvent::Event(StreamEvent::Metrics(metrics)))
                    }
                    EngineLine::FrameHeader(length) => {
                        if length > MAX_FRAME_BYTES {
                            tracing::warn!(camera_id, length, "Frame header exceeds limit");
                            break;
                        }

                        let mut payload = vec![0u8; length];
                        if reader.read_exact(&mut payload).await.is_err() {
                            break;
                        }

                        sequence += 1;
                        Some(EngineEvent::Event(StreamEvent::Frame(Frame::new(
                            sequence,
                            Bytes::from(payload),
                        ))))
                    }
                    EngineLine::Unrecognized(raw) => {
                        tracing::debug!(camera_id, line = %raw, "Unrecognized engine output");
                        None
                    }
                };

                if let Some(event) = event {
                    if tx.send(event).await.is_err() {
                        return; // pipeline gone
                    }
                }
            }
            Err(e) => {
                tracing::warn!(camera_id, error = %e, "Engine stdout read failed");
                break;
            }
        }
    }

    // Stdout EOF normally means the process is going down; reap it so
    // the terminal event carries the real exit code. A deliberate stop
    // has already taken the child out of the cell.
    let status = {
        let mut guard = child.lock().await;
        match guard.as_mut() {
            Some(child) => match timeout(EXIT_REAP_GRACE, child.wait()).await {
                Ok(Ok(status)) => status.code(),
                _ => None,
            },
            None => None,
        }
    };

    let _ = tx.send(EngineEvent::Exited { status }).await;
}

async fn drain_stderr(stderr: tokio::process::ChildStderr, camera_id: String) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!(camera_id, engine = %line, "engine stderr");
    }
}
