use std::time::Instant;

use crate::domain::value_objects::{PipelineState, RegionOfInterest, Stage, StageStatus};

/// State transition record
#[derive(Debug, Clone)]
pub struct StateTransition {
    pub from: PipelineState,
    pub to: PipelineState,
    pub timestamp: Instant,
    pub reason: Option<String>,
}

/// Readiness of the three named stages owned by one pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageSet {
    input: StageStatus,
    config: StageStatus,
    distribution: StageStatus,
}

impl StageSet {
    pub fn get(&self, stage: Stage) -> StageStatus {
        match stage {
            Stage::Input => self.input,
            Stage::Config => self.config,
            Stage::Distribution => self.distribution,
        }
    }

    fn set(&mut self, stage: Stage, status: StageStatus) {
        match stage {
            Stage::Input => self.input = status,
            Stage::Config => self.config = status,
            Stage::Distribution => self.distribution = status,
        }
    }

    pub fn input(&self) -> StageStatus {
        self.input
    }

    pub fn config(&self) -> StageStatus {
        self.config
    }

    pub fn distribution(&self) -> StageStatus {
        self.distribution
    }

    /// Input and Config both ready; the pipeline may enter Running.
    pub fn ready_for_running(&self) -> bool {
        self.input.is_success() && self.config.is_success()
    }
}

/// Domain entity driving the per-camera pipeline state machine.
///
/// Owns the authoritative `PipelineState`, the three `StageStatus`
/// values, the ROI currently applied, and the restart attempt counter.
/// All mutation goes through the transition methods below; external
/// components only observe.
#[derive(Debug)]
pub struct PipelineLifecycle {
    state: PipelineState,
    stages: StageSet,
    roi: RegionOfInterest,
    restart_attempts: u32,
    history: Vec<StateTransition>,
    running_since: Option<Instant>,
}

impl PipelineLifecycle {
    pub fn new(initial_roi: RegionOfInterest) -> Self {
        Self {
            state: PipelineState::Stopped,
            stages: StageSet::default(),
            roi: initial_roi,
            restart_attempts: 0,
            history: Vec::new(),
            running_since: None,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn stages(&self) -> &StageSet {
        &self.stages
    }

    pub fn roi(&self) -> RegionOfInterest {
        self.roi
    }

    pub fn restart_attempts(&self) -> u32 {
        self.restart_attempts
    }

    pub fn transition_count(&self) -> usize {
        self.history.len()
    }

    pub fn last_transition(&self) -> Option<&StateTransition> {
        self.history.last()
    }

    pub fn uptime(&self) -> Option<std::time::Duration> {
        self.running_since.map(|since| since.elapsed())
    }

    /// `Stopped|Failed -> Starting`: the camera became active (or a
    /// restart attempt begins). All three stages reset to Pending.
    pub fn begin_start(&mut self) {
        self.stages = StageSet::default();
        self.running_since = None;
        self.record_transition(PipelineState::Starting, None);
    }

    /// A readiness signal from the adapter. Once Input and Config are
    /// both Success the pipeline enters Running.
    pub fn stage_ready(&mut self, stage: Stage) {
        if !self.state.is_awaiting_readiness() {
            return;
        }

        self.stages.set(stage, StageStatus::Success);

        if self.stages.ready_for_running() {
            self.restart_attempts = 0;
            self.running_since = Some(Instant::now());
            self.record_transition(PipelineState::Running, None);
        }
    }

    /// The Broadcaster confirmed it has begun fanning out frames.
    pub fn confirm_distribution(&mut self) {
        if self.state.is_running() {
            self.stages.set(Stage::Distribution, StageStatus::Success);
        }
    }

    /// Any stage reporting Failure moves the whole pipeline to Failed.
    pub fn stage_failed(&mut self, stage: Stage, reason: impl Into<String>) {
        self.stages.set(stage, StageStatus::Failure);
        self.running_since = None;
        self.record_transition(PipelineState::Failed, Some(reason.into()));
    }

    /// `Running -> Reconfiguring`: replace the ROI wholesale and reset
    /// Input/Config readiness; the adapter is restarted with the new
    /// region and both stages must report Success again.
    pub fn begin_reconfigure(&mut self, new_roi: RegionOfInterest) {
        debug_assert!(self.state.is_running());
        self.roi = new_roi;
        self.stages.set(Stage::Input, StageStatus::Pending);
        self.stages.set(Stage::Config, StageStatus::Pending);
        self.record_transition(PipelineState::Reconfiguring, None);
    }

    /// Switch-away or shutdown: the rest state, re-enterable from
    /// anywhere.
    pub fn mark_stopped(&mut self, reason: impl Into<String>) {
        self.stages = StageSet::default();
        self.running_since = None;
        self.restart_attempts = 0;
        self.record_transition(PipelineState::Stopped, Some(reason.into()));
    }

    /// Count one automatic restart attempt; returns the new total.
    pub fn record_restart_attempt(&mut self) -> u32 {
        self.restart_attempts += 1;
        self.restart_attempts
    }

    fn record_transition(&mut self, new_state: PipelineState, reason: Option<String>) {
        let transition = StateTransition {
            from: self.state,
            to: new_state,
            timestamp: Instant::now(),
            reason,
        };

        self.history.push(transition);
        self.state = new_state;
    }
}
