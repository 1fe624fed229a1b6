use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::domain::entities::{PipelineLifecycle, PipelineStatus};
use crate::domain::errors::{DomainError, Result};
use crate::domain::ports::{
    DetectionRecord, DetectionSink, EngineEvent, EventFanout, MetricsReporter, VisionEngine,
};
use crate::domain::value_objects::{
    CameraDescriptor, RegionOfInterest, RestartPolicy, Stage, StreamEvent,
};

/// Commands queued per pipeline
const COMMAND_CHANNEL_CAPACITY: usize = 8;

/// Tunables shared by every pipeline the coordinator starts.
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub restart_policy: RestartPolicy,
    pub stage_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            restart_policy: RestartPolicy::default(),
            stage_timeout: Duration::from_secs(10),
        }
    }
}

enum PipelineCommand {
    Reconfigure {
        roi: RegionOfInterest,
        reply: oneshot::Sender<Result<()>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
}

/// Control handle to one spawned pipeline task.
///
/// Owned by the coordinator; dropping it (or calling `stop`) releases
/// the engine process and every other pipeline resource.
pub struct PipelineHandle {
    camera_id: String,
    commands: mpsc::Sender<PipelineCommand>,
    task: JoinHandle<()>,
}

impl PipelineHandle {
    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    /// Forward a reconfiguration request; only a Running pipeline
    /// accepts one.
    pub async fn reconfigure(&self, roi: RegionOfInterest) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(PipelineCommand::Reconfigure { roi, reply })
            .await
            .map_err(|_| DomainError::PipelineNotRunning(self.camera_id.clone()))?;

        response
            .await
            .map_err(|_| DomainError::PipelineNotRunning(self.camera_id.clone()))?
    }

    /// Stop the pipeline and wait until it has fully wound down; the
    /// engine process is released before this returns.
    pub async fn stop(self) {
        let (reply, stopped) = oneshot::channel();
        if self
            .commands
            .send(PipelineCommand::Stop { reply })
            .await
            .is_ok()
        {
            let _ = stopped.await;
        }
        let _ = self.task.await;
    }
}

/// Application service driving one camera's supervised pipeline.
///
/// Runs as a dedicated task: starts the native engine, tracks stage
/// readiness, forwards produced events to the fan-out, and applies the
/// bounded restart policy on failure. The command channel is always
/// checked before engine events so a switch-away preempts anything
/// else in flight.
pub struct PipelineService {
    camera: CameraDescriptor,
    engine: Arc<dyn VisionEngine>,
    fanout: Arc<dyn EventFanout>,
    sink: Arc<dyn DetectionSink>,
    metrics: Arc<dyn MetricsReporter>,
    settings: PipelineSettings,
    status: Arc<RwLock<PipelineStatus>>,
    lifecycle: PipelineLifecycle,
    commands: mpsc::Receiver<PipelineCommand>,
}

impl PipelineService {
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        camera: CameraDescriptor,
        initial_roi: RegionOfInterest,
        engine: Arc<dyn VisionEngine>,
        fanout: Arc<dyn EventFanout>,
        sink: Arc<dyn DetectionSink>,
        metrics: Arc<dyn MetricsReporter>,
        settings: PipelineSettings,
        status: Arc<RwLock<PipelineStatus>>,
    ) -> PipelineHandle {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let camera_id = camera.id().to_string();

        let service = Self {
            camera,
            engine,
            fanout,
            sink,
            metrics,
            settings,
            status,
            lifecycle: PipelineLifecycle::new(initial_roi),
            commands: commands_rx,
        };

        let task = tokio::spawn(service.run());

        PipelineHandle {
            camera_id,
            commands: commands_tx,
            task,
        }
    }

    async fn run(mut self) {
        'activation: loop {
            // Honor queued commands before (re)starting the engine:
            // a pending switch-away outranks a restart or an ROI edit.
            loop {
                match self.commands.try_recv() {
                    Ok(PipelineCommand::Stop { reply }) => {
                        self.finish_stopped("switch-away").await;
                        let _ = reply.send(());
                        return;
                    }
                    Ok(PipelineCommand::Reconfigure { reply, .. }) => {
                        let _ = reply.send(Err(DomainError::PipelineNotRunning(
                            self.camera.id().to_string(),
                        )));
                    }
                    Err(mpsc::error::TryRecvError::Empty) => break,
                    Err(mpsc::error::TryRecvError::Disconnected) => {
                        self.finish_stopped("coordinator gone").await;
                        return;
                    }
                }
            }

            // A reconfiguration keeps its Reconfiguring state across the
            // engine restart; everything else begins a fresh start.
            if !self.lifecycle.state().is_awaiting_readiness() {
                self.lifecycle.begin_start();
            }
            self.publish_status().await;

            let mut handle = match self
                .engine
                .start(&self.camera, self.lifecycle.roi())
                .await
            {
                Ok(handle) => handle,
                Err(e) => {
                    tracing::error!(camera_id = self.camera.id(), error = %e, "Engine spawn failed");
                    self.lifecycle.stage_failed(Stage::Input, e.to_string());
                    self.publish_status().await;
                    if self.backoff_or_park().await {
                        continue 'activation;
                    }
                    return;
                }
            };

            let mut events = match handle.take_events() {
                Some(events) => events,
                None => {
                    handle.stop().await;
                    self.lifecycle
                        .stage_failed(Stage::Input, "engine produced no event stream");
                    self.publish_status().await;
                    if self.backoff_or_park().await {
                        continue 'activation;
                    }
                    return;
                }
            };

            let readiness_deadline = Instant::now() + self.settings.stage_timeout;

            loop {
                tokio::select! {
                    biased;

                    command = self.commands.recv() => match command {
                        Some(PipelineCommand::Stop { reply }) => {
                            handle.stop().await;
                            self.finish_stopped("switch-away").await;
                            let _ = reply.send(());
                            return;
                        }
                        Some(PipelineCommand::Reconfigure { roi, reply }) => {
                            if self.lifecycle.state().is_running() {
                                self.lifecycle.begin_reconfigure(roi);
                                self.publish_status().await;
                                // Frames in flight are discarded with the
                                // old handle so no stale-ROI frames bleed
                                // into the new region.
                                self.fanout.mark_discontinuity(self.camera.id());
                                handle.stop().await;
                                let _ = reply.send(Ok(()));
                                continue 'activation;
                            }
                            let _ = reply.send(Err(DomainError::PipelineNotRunning(
                                self.camera.id().to_string(),
                            )));
                        }
                        None => {
                            handle.stop().await;
                            self.finish_stopped("coordinator gone").await;
                            return;
                        }
                    },

                    event = events.recv() => match event {
                        Some(EngineEvent::StageReady(stage)) => {
                            let was_running = self.lifecycle.state().is_running();
                            self.lifecycle.stage_ready(stage);
                            if !was_running && self.lifecycle.state().is_running() {
                                tracing::info!(camera_id = self.camera.id(), "Pipeline running");
                            }
                            self.publish_status().await;
                        }
                        Some(EngineEvent::Event(event)) => {
                            self.forward_event(event).await;
                        }
                        Some(EngineEvent::Exited { status }) => {
                            handle.stop().await;
                            let reason = match status {
                                Some(code) => format!("engine exited with status {}", code),
                                None => "engine stream ended unexpectedly".to_string(),
                            };
                            tracing::error!(camera_id = self.camera.id(), %reason, "Engine failure");
                            self.lifecycle.stage_failed(Stage::Input, reason);
                            self.publish_status().await;
                            if self.backoff_or_park().await {
                                continue 'activation;
                            }
                            return;
                        }
                        None => {
                            handle.stop().await;
                            self.lifecycle
                                .stage_failed(Stage::Input, "engine event channel closed");
                            self.publish_status().await;
                            if self.backoff_or_park().await {
                                continue 'activation;
                            }
                            return;
                        }
                    },

                    _ = sleep_until(readiness_deadline),
                        if self.lifecycle.state().is_awaiting_readiness() =>
                    {
                        let stage = if !self.lifecycle.stages().input().is_success() {
                            Stage::Input
                        } else {
                            Stage::Config
                        };
                        let err = DomainError::StageTimeout(stage, self.settings.stage_timeout);
                        tracing::error!(camera_id = self.camera.id(), error = %err, "Stage readiness timeout");

                        handle.stop().await;
                        self.lifecycle.stage_failed(stage, err.to_string());
                        self.publish_status().await;
                        if self.backoff_or_park().await {
                            continue 'activation;
                        }
                        return;
                    }
                }
            }
        }
    }

    /// Fan out one produced event; metrics also update the status cell
    /// and the append-only sink.
    async fn forward_event(&mut self, event: StreamEvent) {
        if let StreamEvent::Metrics(ref metrics) = event {
            self.metrics.report_detection_sample(metrics);
            self.status.write().await.latest_metrics = Some(metrics.clone());

            let record = DetectionRecord::from_metrics(self.camera.id(), metrics);
            if let Err(e) = self.sink.append(&record).await {
                tracing::warn!(camera_id = self.camera.id(), error = %e, "Detection sink append failed");
            }
        }

        let confirms_distribution = event.is_frame()
            && self.lifecycle.state().is_running()
            && !self.lifecycle.stages().distribution().is_success();

        self.fanout.publish(self.camera.id(), &event);

        if confirms_distribution {
            self.lifecycle.confirm_distribution();
            self.publish_status().await;
        }
    }

    /// After a failure: wait out the backoff before the next automatic
    /// restart attempt (returns true), or with the attempt cap
    /// exhausted park in Failed until told to stop (returns false).
    async fn backoff_or_park(&mut self) -> bool {
        let attempt = self.lifecycle.record_restart_attempt();
        self.metrics.report_restart_attempt(self.camera.id());

        if !self.settings.restart_policy.allows_attempt(attempt) {
            tracing::error!(
                camera_id = self.camera.id(),
                attempts = attempt - 1,
                "Restart attempts exhausted; pipeline stays Failed until an explicit restart"
            );

            loop {
                match self.commands.recv().await {
                    Some(PipelineCommand::Stop { reply }) => {
                        self.finish_stopped("switch-away").await;
                        let _ = reply.send(());
                        return false;
                    }
                    Some(PipelineCommand::Reconfigure { reply, .. }) => {
                        let _ = reply.send(Err(DomainError::PipelineNotRunning(
                            self.camera.id().to_string(),
                        )));
                    }
                    None => {
                        self.finish_stopped("coordinator gone").await;
                        return false;
                    }
                }
            }
        }

        let delay = self.settings.restart_policy.backoff().delay_for(attempt);
        self.metrics.report_backoff(delay.as_secs_f64());
        tracing::info!(
            camera_id = self.camera.id(),
            attempt,
            ?delay,
            "Restarting engine after failure"
        );

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(PipelineCommand::Stop { reply }) => {
                        self.finish_stopped("switch-away").await;
                        let _ = reply.send(());
                        return false;
                    }
                    Some(PipelineCommand::Reconfigure { reply, .. }) => {
                        let _ = reply.send(Err(DomainError::PipelineNotRunning(
                            self.camera.id().to_string(),
                        )));
                    }
                    None => {
                        self.finish_stopped("coordinator gone").await;
                        return false;
                    }
                },

                _ = &mut sleep => {
                    // The replacement engine restarts frame numbering
                    // at 1, same as a reconfiguration boundary.
                    self.fanout.mark_discontinuity(self.camera.id());
                    return true;
                }
            }
        }
    }

    async fn finish_stopped(&mut self, reason: &str) {
        self.lifecycle.mark_stopped(reason);
        self.publish_status().await;
        tracing::info!(camera_id = self.camera.id(), reason, "Pipeline stopped");
    }

    async fn publish_status(&self) {
        let stages = self.lifecycle.stages();
        {
            let mut status = self.status.write().await;
            status.state = self.lifecycle.state();
            status.input = stages.input();
            status.config = stages.config();
            status.distribution = stages.distribution();
        }
        self.metrics
            .report_state_change(self.camera.id(), self.lifecycle.state());
    }
}
