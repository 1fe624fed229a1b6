use std::fmt;

use serde::Serialize;

/// Lifecycle state of one camera pipeline (pure domain).
///
/// `Stopped` is the rest state and is re-enterable; there is no
/// terminal state. `Failed` pipelines are eligible for bounded
/// automatic restarts before requiring an explicit external restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Stopped,
    Starting,
    Running,
    Reconfiguring,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "Stopped"),
            Self::Starting => write!(f, "Starting"),
            Self::Running => write!(f, "Running"),
            Self::Reconfiguring => write!(f, "Reconfiguring"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

impl PipelineState {
    /// Convert state to numeric value for metrics
    pub fn as_metric(&self) -> f64 {
        match self {
            Self::Stopped => 0.0,
            Self::Starting => 1.0,
            Self::Running => 2.0,
            Self::Reconfiguring => 3.0,
            Self::Failed => 4.0,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Any state in which the pipeline may be driving the native engine.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Stopped)
    }

    /// States in which stage readiness events are still expected.
    pub fn is_awaiting_readiness(&self) -> bool {
        matches!(self, Self::Starting | Self::Reconfiguring)
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::Stopped
    }
}
