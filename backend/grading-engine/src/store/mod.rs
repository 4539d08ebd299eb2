use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Assignment, Question, Submission, SubmissionStatus};

pub mod memory;

pub use memory::MemoryStore;

/// Failures surfaced by the persistence collaborator. Conflict variants are
/// domain signals the engine maps to user-facing rejections; `Backend` is an
/// infrastructure fault propagated as-is.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The `(assignment, student, attempt_number)` triple already exists.
    #[error("attempt number already taken")]
    DuplicateAttempt,

    /// A guarded status update observed a different state than expected.
    #[error("submission is {}", current.as_str())]
    StatusConflict { current: SubmissionStatus },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<StoreError> for crate::error::EngineError {
    fn from(err: StoreError) -> Self {
        use crate::error::EngineError;
        match err {
            StoreError::NotFound(what) => EngineError::NotFound(what),
            StoreError::StatusConflict { current } => EngineError::AlreadySubmitted { current },
            // Leaking out of the engine's allocation retry means the race
            // never settled; treat it as an infrastructure fault.
            StoreError::DuplicateAttempt => {
                EngineError::Infrastructure(anyhow::anyhow!("attempt number already taken"))
            }
            StoreError::Backend(err) => EngineError::Infrastructure(err),
        }
    }
}

/// Load/save for assignments and their ordered question sets.
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    async fn insert_assignment(
        &self,
        assignment: Assignment,
        questions: Vec<Question>,
    ) -> Result<(), StoreError>;

    async fn assignment(&self, id: Uuid) -> Result<Option<Assignment>, StoreError>;

    async fn save_assignment(&self, assignment: &Assignment) -> Result<(), StoreError>;

    /// Questions of an assignment in grading order.
    async fn questions(&self, assignment_id: Uuid) -> Result<Vec<Question>, StoreError>;

    /// Swap the full question set of a draft assignment.
    async fn replace_questions(
        &self,
        assignment_id: Uuid,
        questions: Vec<Question>,
    ) -> Result<(), StoreError>;

    /// Atomically apply one grading outcome to a question's running
    /// counters. Implementations must not lose concurrent increments.
    async fn record_question_result(
        &self,
        question_id: Uuid,
        correct: bool,
    ) -> Result<(), StoreError>;
}

/// Load/save and queries for submissions. Insertion enforces uniqueness of
/// `(assignment_id, student_id, attempt_number)`.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn insert_submission(&self, submission: Submission) -> Result<(), StoreError>;

    async fn submission(&self, id: Uuid) -> Result<Option<Submission>, StoreError>;

    async fn save_submission(&self, submission: &Submission) -> Result<(), StoreError>;

    /// Atomically advance a submission's status iff its current status is
    /// one of `from`, returning the claimed record. This is the
    /// per-submission serialization point: of two concurrent claims on a
    /// draft attempt, exactly one succeeds.
    async fn claim_submission(
        &self,
        id: Uuid,
        from: &[SubmissionStatus],
        to: SubmissionStatus,
    ) -> Result<Submission, StoreError>;

    async fn count_attempts(
        &self,
        assignment_id: Uuid,
        student_id: Uuid,
    ) -> Result<u32, StoreError>;

    /// All attempts of an assignment that carry a final grade.
    async fn graded_for_assignment(
        &self,
        assignment_id: Uuid,
    ) -> Result<Vec<Submission>, StoreError>;

    /// The student's highest-scoring graded attempt.
    async fn best_attempt(
        &self,
        assignment_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<Submission>, StoreError>;

    /// Attempts waiting on a human grader, oldest submission first.
    async fn needing_grading(&self, assignment_id: Uuid) -> Result<Vec<Submission>, StoreError>;
}
