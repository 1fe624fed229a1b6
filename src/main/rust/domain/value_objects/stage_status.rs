use std::fmt;

use serde::Serialize;

/// The three named stages of a camera pipeline whose readiness is
/// tracked independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Native capture is producing frames
    Input,
    /// Detection parameters (ROI) applied
    Config,
    /// Fan-out to subscribers has begun
    Distribution,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Config => write!(f, "config"),
            Self::Distribution => write!(f, "distribution"),
        }
    }
}

/// Readiness of a single pipeline stage.
///
/// Set only by the owning pipeline's transitions, never by external
/// callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Success,
    Failure,
}

impl StageStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure)
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

impl Default for StageStatus {
    fn default() -> Self {
        Self::Pending
    }
}
