use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::application::services::PipelineSettings;
use crate::domain::value_objects::{BackoffPolicy, CameraDescriptor, RestartPolicy};
use crate::infrastructure::engine::EngineConfig;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "vision-cluster",
    version = "0.1.0",
    author = "Vision Cluster",
    about = "Camera fleet orchestrator driving a native vision engine"
)]
pub struct Config {
    /// Path to the camera registry JSON file
    #[arg(long, env = "CAMERAS_FILE", default_value = "cameras.json")]
    pub cameras_file: PathBuf,

    /// Path to the native vision engine binary
    #[arg(long, env = "ENGINE_BINARY", default_value = "/usr/local/bin/engine")]
    pub engine_binary: PathBuf,

    /// Engine capture frame width in pixels
    #[arg(long, env = "FRAME_WIDTH", default_value = "640")]
    pub frame_width: u32,

    /// Engine capture frame height in pixels
    #[arg(long, env = "FRAME_HEIGHT", default_value = "480")]
    pub frame_height: u32,

    /// HTTP server port (control API, status, websocket streams, metrics)
    #[arg(long, env = "HTTP_PORT", default_value = "9000")]
    pub http_port: u16,

    /// Seconds to wait for engine stage readiness before failing the start
    #[arg(long, default_value = "10")]
    pub stage_timeout: u64,

    /// Seconds to wait for the engine to exit before killing it
    #[arg(long, default_value = "5")]
    pub stop_grace: u64,

    /// Maximum automatic engine restart attempts before parking as failed
    #[arg(long, default_value = "5")]
    pub max_restart_attempts: u32,

    /// Initial restart delay in seconds
    #[arg(long, default_value = "1")]
    pub restart_initial_delay: u64,

    /// Maximum restart delay in seconds
    #[arg(long, default_value = "30")]
    pub restart_max_delay: u64,

    /// Restart backoff multiplier
    #[arg(long, default_value = "2.0")]
    pub restart_multiplier: f64,

    /// Per-subscriber event queue capacity
    #[arg(long, default_value = "32")]
    pub subscriber_queue_capacity: usize,

    /// Consecutive full-queue offers before a subscriber is evicted
    #[arg(long, default_value = "8")]
    pub eviction_threshold: u32,

    /// Path of the append-only detection event log (JSON lines)
    #[arg(long, env = "DETECTIONS_FILE", default_value = "detections.jsonl")]
    pub detections_file: PathBuf,

    /// Camera to activate on startup (none if omitted)
    #[arg(long, env = "INITIAL_CAMERA")]
    pub initial_camera: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Minimum allowed port (ports below 1024 are privileged)
const MIN_USER_PORT: u16 = 1024;

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        Self::validate_port(self.http_port, "http")?;

        if self.frame_width == 0 || self.frame_height == 0 {
            anyhow::bail!("Frame dimensions cannot be 0");
        }

        if self.stage_timeout == 0 {
            anyhow::bail!("Stage timeout cannot be 0");
        }

        if self.restart_multiplier <= 1.0 {
            anyhow::bail!("Restart multiplier must be > 1.0");
        }

        if self.restart_initial_delay == 0 {
            anyhow::bail!("Initial restart delay cannot be 0");
        }

        if self.restart_max_delay < self.restart_initial_delay {
            anyhow::bail!(
                "Maximum restart delay ({}) cannot be less than initial delay ({})",
                self.restart_max_delay,
                self.restart_initial_delay
            );
        }

        if self.subscriber_queue_capacity == 0 {
            anyhow::bail!("Subscriber queue capacity cannot be 0");
        }

        if self.eviction_threshold == 0 {
            anyhow::bail!("Eviction threshold cannot be 0");
        }

        Ok(())
    }

    fn validate_port(port: u16, name: &str) -> anyhow::Result<()> {
        if port == 0 {
            anyhow::bail!("Invalid {} port: port cannot be 0", name);
        }
        if port < MIN_USER_PORT {
            anyhow::bail!(
                "Invalid {} port: {} is a privileged port (< {}). Use a port >= {}",
                name,
                port,
                MIN_USER_PORT,
                MIN_USER_PORT
            );
        }
        Ok(())
    }

    pub fn to_backoff_policy(&self) -> crate::domain::errors::Result<BackoffPolicy> {
        BackoffPolicy::new(
            Duration::from_secs(self.restart_initial_delay),
            Duration::from_secs(self.restart_max_delay),
            self.restart_multiplier,
        )
    }

    pub fn to_pipeline_settings(&self) -> crate::domain::errors::Result<PipelineSettings> {
        Ok(PipelineSettings {
            restart_policy: RestartPolicy::new(self.max_restart_attempts, self.to_backoff_policy()?),
            stage_timeout: Duration::from_secs(self.stage_timeout),
        })
    }

    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig::new(
            self.engine_binary.clone(),
            self.frame_width,
            self.frame_height,
            Duration::from_secs(self.stop_grace),
        )
    }

    /// Load the camera registry from the configured JSON file.
    pub async fn load_cameras(&self) -> anyhow::Result<Vec<CameraDescriptor>> {
        let contents = tokio::fs::read_to_string(&self.cameras_file)
            .await
            .map_err(|e| {
                anyhow::anyhow!("Cannot read {}: {}", self.cameras_file.display(), e)
            })?;

        let cameras: Vec<CameraDescriptor> = serde_json::from_str(&contents).map_err(|e| {
            anyhow::anyhow!("Invalid camera registry {}: {}", self.cameras_file.display(), e)
        })?;

        if cameras.is_empty() {
            anyhow::bail!("Camera registry {} is empty", self.cameras_file.display());
        }

        Ok(cameras)
    }
}
