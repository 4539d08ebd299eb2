use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::question::{Difficulty, QuestionKind};
use crate::error::EngineError;

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Draft,
    Published,
    Closed,
    Archived,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Draft => "draft",
            AssignmentStatus::Published => "published",
            AssignmentStatus::Closed => "closed",
            AssignmentStatus::Archived => "archived",
        }
    }

    /// Forward-only lifecycle; closed and archived never accept new work.
    pub fn can_transition_to(&self, next: AssignmentStatus) -> bool {
        matches!(
            (self, next),
            (AssignmentStatus::Draft, AssignmentStatus::Published)
                | (AssignmentStatus::Published, AssignmentStatus::Closed)
                | (AssignmentStatus::Closed, AssignmentStatus::Archived)
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentKind {
    Homework,
    Quiz,
    Exam,
    Practice,
}

/// The publishable unit of gradable work: timing window, attempt policy,
/// late policy, and aggregate statistics over graded submissions. Owns an
/// ordered set of questions held by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Uuid,
    pub course_id: Uuid,
    pub teacher_id: Uuid,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    pub kind: AssignmentKind,
    pub status: AssignmentStatus,

    // Timing window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    /// Minutes allowed per attempt; None = unlimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit_minutes: Option<u32>,

    // Late policy
    pub allow_late_submission: bool,
    pub late_penalty_percent_per_day: f64,

    // Attempt policy
    pub max_attempts: u32,

    // Grading display; scoring itself is computed from question points.
    pub total_points: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passing_score: Option<f64>,
    pub show_correct_answers: bool,

    // Aggregate statistics, recomputed from graded submissions.
    pub total_submissions: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_score: Option<f64>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Assignment {
    /// Startable: published and past `available_from`. The due date never
    /// blocks starting; lateness is handled on the submission itself.
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        if self.status != AssignmentStatus::Published {
            return false;
        }
        match self.available_from {
            Some(from) => now >= from,
            None => true,
        }
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        match self.due_date {
            Some(due) => now > due,
            None => false,
        }
    }

    /// Percentage deducted for a submission at `submitted_at`: whole days
    /// late (ceiling) times the per-day rate, clamped to [0, 100]. Zero when
    /// there is no due date, late submission is disallowed, or the work was
    /// on time.
    pub fn late_penalty_percent(&self, submitted_at: DateTime<Utc>) -> f64 {
        let Some(due) = self.due_date else { return 0.0 };
        if !self.allow_late_submission || submitted_at <= due {
            return 0.0;
        }

        let seconds_late = (submitted_at - due).num_seconds() as f64;
        let days_late = (seconds_late / SECONDS_PER_DAY).ceil();

        (days_late * self.late_penalty_percent_per_day).clamp(0.0, 100.0)
    }

    /// Advance the lifecycle, rejecting illegal transitions centrally.
    pub fn transition_to(&mut self, next: AssignmentStatus) -> Result<(), EngineError> {
        if !self.status.can_transition_to(next) {
            return Err(EngineError::Validation(format!(
                "assignment cannot move from {} to {}",
                self.status.as_str(),
                next.as_str()
            )));
        }
        self.status = next;
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

/// Request to author an assignment together with its ordered questions.
/// Policy fields left unset fall back to the engine configuration.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateAssignmentRequest {
    pub course_id: Uuid,

    #[validate(length(
        min = 3,
        max = 255,
        message = "Title must be between 3 and 255 characters"
    ))]
    pub title: String,

    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    pub kind: AssignmentKind,

    #[serde(default)]
    pub available_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub time_limit_minutes: Option<u32>,

    #[serde(default = "default_true")]
    pub allow_late_submission: bool,
    #[validate(range(min = 0.0, max = 100.0, message = "Penalty must be within 0-100"))]
    #[serde(default)]
    pub late_penalty_percent_per_day: Option<f64>,

    #[validate(range(min = 1, message = "At least one attempt must be allowed"))]
    #[serde(default)]
    pub max_attempts: Option<u32>,

    #[validate(range(min = 0.0, max = 1000.0, message = "Total points must be within 0-1000"))]
    #[serde(default)]
    pub total_points: Option<f64>,
    #[validate(range(min = 0.0, message = "Passing score must be >= 0"))]
    #[serde(default)]
    pub passing_score: Option<f64>,

    #[serde(default = "default_true")]
    pub show_correct_answers: bool,

    #[validate(nested)]
    #[serde(default)]
    pub questions: Vec<QuestionInput>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QuestionInput {
    #[validate(length(min = 1, message = "Question text must not be empty"))]
    pub text: String,
    pub kind: QuestionKind,
    #[validate(range(min = 0.0, message = "Points must be >= 0"))]
    pub points: f64,
    /// Position within the assignment; defaults to the input index.
    #[serde(default)]
    pub order: Option<u32>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
}
