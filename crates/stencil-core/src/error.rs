//! Error types for the core crate.

use crate::eval::RunStatus;
use crate::grading::GradingError;
use crate::render::RenderError;

/// Field-level validation failure, raised before anything is persisted or
/// sent to the grading service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {}", messages.join(", "))]
pub struct ValidationError {
    pub field: String,
    pub messages: Vec<String>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            messages: vec![message.into()],
        }
    }

    pub fn with_messages(field: impl Into<String>, messages: Vec<String>) -> Self {
        Self {
            field: field.into(),
            messages,
        }
    }
}

/// Core errors.
#[derive(Debug, thiserror::Error)]
pub enum StencilError {
    /// Bad parameter, grader or workflow configuration.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Missing or invalid values at render time.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Failure reported by the remote grading client.
    #[error(transparent)]
    Grading(#[from] GradingError),

    /// Polling budget exhausted before the remote run finished.
    #[error("{message}")]
    Timeout { message: String },

    /// Evaluation canceled by the caller.
    #[error("Evaluation canceled")]
    Canceled,

    /// Referenced entity does not exist.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// Evaluation run status change that skips or reverses a state.
    #[error("invalid run transition from {from} to {to}")]
    InvalidTransition { from: RunStatus, to: RunStatus },

    /// SQLite failure, including uniqueness and immutability violations.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// A thread panicked while holding the store connection.
    #[error("storage lock poisoned")]
    LockPoisoned,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StencilError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            // Caller input
            Self::Validation(_) => 1,
            Self::Render(_) => 1,
            Self::NotFound { .. } => 1,
            Self::InvalidTransition { .. } => 1,

            // Remote
            Self::Grading(GradingError::Authentication { .. }) => 2,
            Self::Grading(_) => 3,
            Self::Timeout { .. } => 3,
            Self::Canceled => 3,

            // Local infrastructure
            Self::Storage(_) => 4,
            Self::LockPoisoned => 4,
            Self::Io(_) => 4,
            Self::Serialization(_) => 4,
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, StencilError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_joins_messages() {
        let err = ValidationError::with_messages(
            "grader_config",
            vec!["pattern can't be blank".into(), "other".into()],
        );
        assert_eq!(err.to_string(), "grader_config: pattern can't be blank, other");
    }

    #[test]
    fn timeout_displays_bare_message() {
        let err = StencilError::Timeout {
            message: "Timeout waiting for eval results".into(),
        };
        assert_eq!(err.to_string(), "Timeout waiting for eval results");
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn auth_failures_have_dedicated_exit_code() {
        let err = StencilError::from(GradingError::Authentication {
            message: "bad key".into(),
        });
        assert_eq!(err.exit_code(), 2);
    }
}
