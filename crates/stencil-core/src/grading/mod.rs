//! Interface to the remote grading service.
//!
//! The orchestrator only talks to [`GradingClient`]; HTTP implementations
//! live in `stencil-evals`.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::eval::Criterion;

/// Remote grading errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GradingError {
    /// Missing, invalid or insufficient credentials.
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// Rate limit exceeded.
    #[error("rate limited: retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// Eval, run or file unknown to the service.
    #[error("not found: {resource}")]
    NotFound { resource: String },

    /// Any other non-success status.
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Network error.
    #[error("network error: {message}")]
    Network { message: String },

    /// Invalid response from the service.
    #[error("invalid response: {message}")]
    InvalidResponse { message: String },

    /// Local data file could not be read.
    #[error("file error: {message}")]
    File { message: String },
}

impl GradingError {
    /// Whether the error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Network { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Result type for grading operations.
pub type GradingResult<T> = Result<T, GradingError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEval {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRun {
    pub id: String,
    #[serde(default)]
    pub report_url: Option<String>,
}

/// One chat message of the run's input template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateMessage {
    pub role: String,
    pub content: String,
}

/// Everything needed to start a remote run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRequest {
    pub eval_id: String,
    pub name: String,
    pub model: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub messages: Vec<TemplateMessage>,
    pub file_id: String,
}

/// Remote run status. Unknown values count as still in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteRunStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Canceled,
}

impl RemoteRunStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "queued" => Self::Queued,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "canceled" | "cancelled" => Self::Canceled,
            _ => Self::InProgress,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultCounts {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    #[serde(default)]
    pub errored: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub status: RemoteRunStatus,
    #[serde(default)]
    pub result_counts: Option<ResultCounts>,
    #[serde(default)]
    pub error: Option<String>,
}

#[async_trait]
pub trait GradingClient: Send + Sync {
    /// Registers an eval with an item schema and testing criteria.
    async fn create_eval(
        &self,
        name: &str,
        item_schema: &Value,
        criteria: &[Criterion],
    ) -> GradingResult<RemoteEval>;

    /// Uploads a JSONL data file.
    async fn upload_file(&self, path: &Path) -> GradingResult<RemoteFile>;

    async fn create_run(&self, request: &RunRequest) -> GradingResult<RemoteRun>;

    async fn get_run(&self, eval_id: &str, run_id: &str) -> GradingResult<RunReport>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(GradingError::RateLimited { retry_after: None }.is_retryable());
        assert!(GradingError::Api {
            status: 503,
            message: "unavailable".into()
        }
        .is_retryable());
        assert!(!GradingError::Api {
            status: 400,
            message: "bad".into()
        }
        .is_retryable());
        assert!(!GradingError::Authentication {
            message: "bad key".into()
        }
        .is_retryable());
    }

    #[test]
    fn unknown_remote_status_is_in_progress() {
        assert_eq!(RemoteRunStatus::parse("cancelled"), RemoteRunStatus::Canceled);
        assert_eq!(RemoteRunStatus::parse("weird"), RemoteRunStatus::InProgress);
    }
}
