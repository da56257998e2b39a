//! Generation task model and lifecycle status.
//!
//! A task tracks one generation attempt from submission to a terminal
//! state. Status moves forward only; progress never decreases.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a generation task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Submitted,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "submitted" => Some(Self::Submitted),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether this status ends the task lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Position in the forward-only lifecycle. Both terminal states share
    /// the highest rank; neither can replace the other.
    fn rank(&self) -> u8 {
        match self {
            Self::Submitted => 0,
            Self::Processing => 1,
            Self::Completed | Self::Failed => 2,
        }
    }
}

/// One generation attempt.
///
/// Created on submission and mutated only by the orchestrator in response
/// to poll results or fallback completion. Once a terminal status lands
/// the task no longer changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationTask {
    /// Opaque id assigned by whichever backend accepted the job. Remote
    /// job ids come from the service; local fallback ids look like
    /// `local_{unix_seconds}`.
    pub id: String,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Completion fraction, 0.0 to 1.0, non-decreasing.
    pub progress: f64,
    /// Latest human-readable status message from the backend.
    pub message: Option<String>,
    /// Failure detail once the task is Failed.
    pub error_message: Option<String>,
    /// The requirements text the task was submitted with.
    pub requirements: String,
    /// Ordered ids of the input images.
    pub image_ids: Vec<String>,
    /// When the task was submitted.
    pub created_at: DateTime<Utc>,
    /// Reference to the finished document once Completed.
    pub artifact_ref: Option<String>,
}

impl GenerationTask {
    /// Create a freshly submitted task.
    pub fn new(id: String, requirements: String, image_ids: Vec<String>) -> Self {
        Self {
            id,
            status: TaskStatus::Submitted,
            progress: 0.0,
            message: None,
            error_message: None,
            requirements,
            image_ids,
            created_at: Utc::now(),
            artifact_ref: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a status observed from a poll. Backward transitions and
    /// mutations after a terminal status are rejected.
    ///
    /// Returns true if the status changed.
    pub fn apply_status(&mut self, status: TaskStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        if status.rank() < self.status.rank() {
            return false;
        }
        let changed = self.status != status;
        self.status = status;
        changed
    }

    /// Apply a progress value, clamped to [0, 1] and never decreasing.
    pub fn apply_progress(&mut self, progress: f64) {
        let clamped = progress.clamp(0.0, 1.0);
        if clamped > self.progress {
            self.progress = clamped;
        }
    }
}
