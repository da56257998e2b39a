//! Client for the remote biography generation service.
//!
//! The service exposes a small task API: create a generation task with the
//! images and requirements, poll its status, download the finished
//! document. Responses are decoded leniently (unknown or absent optional
//! fields never fail a poll) but the status string itself must be one of
//! the known task states.

mod client;

pub use client::RemoteClient;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::images::ImagePayload;
use crate::models::TaskStatus;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("service returned HTTP {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("malformed response: {0}")]
    Protocol(String),
}

/// Handle returned by a successful task creation.
#[derive(Debug, Clone)]
pub struct CreatedTask {
    pub task_id: String,
    pub message: Option<String>,
}

/// One decoded status poll.
#[derive(Debug, Clone)]
pub struct RemoteStatus {
    pub status: TaskStatus,
    pub progress: Option<f64>,
    pub message: Option<String>,
    pub artifact_url: Option<String>,
    pub error_detail: Option<String>,
}

/// Wire shape of `POST /biography/create`.
#[derive(Debug, Deserialize)]
pub struct CreateTaskResponse {
    pub task_id: String,
    pub status: Option<String>,
    pub message: Option<String>,
}

/// Wire shape of `GET /biography/status/{task_id}`. Every field except the
/// status itself is optional; servers have shipped several variants.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskStatusResponse {
    pub task_id: Option<String>,
    pub status: String,
    pub progress: Option<f64>,
    pub message: Option<String>,
    pub pdf_url: Option<String>,
    pub error_message: Option<String>,
    pub error: Option<String>,
    pub created_at: Option<String>,
}

impl TaskStatusResponse {
    /// Validates the payload into a typed status. The failure detail
    /// prefers `error_message` and falls back to the legacy `error` field.
    pub fn into_status(self) -> Result<RemoteStatus, RemoteError> {
        let status = TaskStatus::from_str(&self.status).ok_or_else(|| {
            RemoteError::Protocol(format!("unknown task status {:?}", self.status))
        })?;
        Ok(RemoteStatus {
            status,
            progress: self.progress,
            message: self.message,
            artifact_url: self.pdf_url,
            error_detail: self.error_message.or(self.error),
        })
    }
}

/// The orchestrator's view of the remote service. Implemented by
/// [`RemoteClient`] for HTTP and by in-memory fakes in tests.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    async fn create_task(
        &self,
        requirements: &str,
        template_style: &str,
        language: &str,
        images: &[ImagePayload],
    ) -> Result<CreatedTask, RemoteError>;

    async fn task_status(&self, task_id: &str) -> Result<RemoteStatus, RemoteError>;

    async fn download_document(&self, task_id: &str) -> Result<Vec<u8>, RemoteError>;

    /// Liveness probe; connectivity indicators use this, the polling loop
    /// does not.
    async fn check_health(&self) -> bool;
}
