use thiserror::Error;

use crate::models::submission::SubmissionStatus;

/// Engine-level error taxonomy. Every public operation fails with one of
/// these; infrastructure failures from collaborators are wrapped, never
/// swallowed.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("assignment is not open for submissions")]
    AssignmentUnavailable,

    #[error("attempt limit of {max_attempts} reached")]
    AttemptLimitExceeded { max_attempts: u32 },

    #[error("submission is already {}", current.as_str())]
    AlreadySubmitted { current: SubmissionStatus },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Infrastructure(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for EngineError {
    fn from(errors: validator::ValidationErrors) -> Self {
        EngineError::Validation(errors.to_string())
    }
}

impl EngineError {
    /// Recoverable, user-facing rejections as opposed to system faults.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, EngineError::Infrastructure(_))
    }
}
