use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Draft,
    Submitted,
    Grading,
    Graded,
    Returned,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Draft => "draft",
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::Grading => "grading",
            SubmissionStatus::Graded => "graded",
            SubmissionStatus::Returned => "returned",
        }
    }

    /// Submitted forks into auto-graded or manual grading; a graded attempt
    /// may be re-graded (teacher amendment) or returned to the student.
    pub fn can_transition_to(&self, next: SubmissionStatus) -> bool {
        matches!(
            (self, next),
            (SubmissionStatus::Draft, SubmissionStatus::Submitted)
                | (SubmissionStatus::Submitted, SubmissionStatus::Grading)
                | (SubmissionStatus::Submitted, SubmissionStatus::Graded)
                | (SubmissionStatus::Grading, SubmissionStatus::Graded)
                | (SubmissionStatus::Graded, SubmissionStatus::Graded)
                | (SubmissionStatus::Graded, SubmissionStatus::Returned)
        )
    }
}

/// One graded answer inside a submission. `is_correct` stays `None` until a
/// human grader decides (essay) or forever for unanswered essays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradedAnswer {
    pub value: Option<String>,
    pub is_correct: Option<bool>,
    pub points_earned: f64,
    pub max_points: f64,
    #[serde(default)]
    pub needs_manual_grading: bool,
    #[serde(default)]
    pub manually_graded: bool,
}

/// A grader's verdict for one answer, applied during manual grading. Points
/// must land within `[0, max_points]` of the answer being overridden.
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerOverride {
    pub points_earned: f64,
    #[serde(default)]
    pub is_correct: Option<bool>,
}

/// One student's attempt at an assignment, numbered per student. `max_score`
/// is a snapshot of the question points at creation time, not a live sum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub student_id: Uuid,
    /// 1-based, unique per (assignment, student).
    pub attempt_number: u32,
    pub answers: HashMap<Uuid, GradedAnswer>,
    pub status: SubmissionStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub max_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graded_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_spent_seconds: Option<i64>,

    pub is_late: bool,
    /// Penalty actually applied; 0 unless the attempt was late.
    pub late_penalty_percent: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graded_by: Option<Uuid>,
    pub auto_graded: bool,
    pub needs_manual_grading: bool,
}

/// Per-attempt digest returned to clients after grading.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionSummary {
    pub total_questions: usize,
    pub correct_answers: usize,
    pub incorrect_answers: usize,
    pub score: Option<f64>,
    pub max_score: f64,
    pub percentage: Option<f64>,
    pub status: SubmissionStatus,
    pub time_spent_seconds: Option<i64>,
    pub is_late: bool,
}

impl Submission {
    pub fn new(
        assignment_id: Uuid,
        student_id: Uuid,
        attempt_number: u32,
        max_score: f64,
        started_at: DateTime<Utc>,
    ) -> Self {
        Submission {
            id: Uuid::new_v4(),
            assignment_id,
            student_id,
            attempt_number,
            answers: HashMap::new(),
            status: SubmissionStatus::Draft,
            score: None,
            max_score,
            percentage: None,
            started_at: Some(started_at),
            submitted_at: None,
            graded_at: None,
            time_spent_seconds: None,
            is_late: false,
            late_penalty_percent: 0.0,
            teacher_feedback: None,
            graded_by: None,
            auto_graded: false,
            needs_manual_grading: false,
        }
    }

    /// Advance the state machine, rejecting illegal moves centrally. A
    /// rejected move means the caller holds a stale view of the attempt.
    pub fn transition_to(&mut self, next: SubmissionStatus) -> Result<(), EngineError> {
        if !self.status.can_transition_to(next) {
            return Err(EngineError::AlreadySubmitted {
                current: self.status,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Recompute `score` and `percentage` from the per-answer points, then
    /// apply the late penalty, flooring at zero. A zero `max_score` yields a
    /// percentage of 0 by convention.
    pub fn recalculate_score(&mut self) {
        let mut total: f64 = self.answers.values().map(|a| a.points_earned).sum();

        if self.is_late && self.late_penalty_percent > 0.0 {
            total -= total * self.late_penalty_percent / 100.0;
            total = total.max(0.0);
        }

        self.score = Some(total);
        self.percentage = Some(if self.max_score > 0.0 {
            total / self.max_score * 100.0
        } else {
            0.0
        });
    }

    pub fn summary(&self) -> SubmissionSummary {
        let correct = self
            .answers
            .values()
            .filter(|a| a.is_correct == Some(true))
            .count();

        SubmissionSummary {
            total_questions: self.answers.len(),
            correct_answers: correct,
            incorrect_answers: self.answers.len() - correct,
            score: self.score,
            max_score: self.max_score,
            percentage: self.percentage,
            status: self.status,
            time_spent_seconds: self.time_spent_seconds,
            is_late: self.is_late,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(points_earned: f64, max_points: f64, is_correct: Option<bool>) -> GradedAnswer {
        GradedAnswer {
            value: Some("x".to_string()),
            is_correct,
            points_earned,
            max_points,
            needs_manual_grading: false,
            manually_graded: false,
        }
    }

    fn submission_with(answers: Vec<GradedAnswer>, max_score: f64) -> Submission {
        let mut s = Submission::new(Uuid::new_v4(), Uuid::new_v4(), 1, max_score, Utc::now());
        for a in answers {
            s.answers.insert(Uuid::new_v4(), a);
        }
        s
    }

    #[test]
    fn score_is_the_sum_of_points_earned() {
        let mut s = submission_with(
            vec![
                answer(5.0, 5.0, Some(true)),
                answer(0.0, 5.0, Some(false)),
                answer(3.5, 4.0, Some(true)),
            ],
            14.0,
        );
        s.recalculate_score();
        assert_eq!(s.score, Some(8.5));
        let pct = s.percentage.unwrap();
        assert!((pct - 8.5 / 14.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn late_penalty_reduces_score_but_never_below_zero() {
        let mut s = submission_with(vec![answer(10.0, 10.0, Some(true))], 10.0);
        s.is_late = true;
        s.late_penalty_percent = 20.0;
        s.recalculate_score();
        assert_eq!(s.score, Some(8.0));
        assert_eq!(s.percentage, Some(80.0));

        s.late_penalty_percent = 100.0;
        s.recalculate_score();
        assert_eq!(s.score, Some(0.0));
    }

    #[test]
    fn zero_max_score_yields_zero_percentage() {
        let mut s = submission_with(vec![], 0.0);
        s.recalculate_score();
        assert_eq!(s.score, Some(0.0));
        assert_eq!(s.percentage, Some(0.0));
    }

    #[test]
    fn score_stays_within_bounds_after_grading() {
        let mut s = submission_with(
            vec![answer(5.0, 5.0, Some(true)), answer(5.0, 5.0, Some(true))],
            10.0,
        );
        s.is_late = true;
        s.late_penalty_percent = 30.0;
        s.recalculate_score();
        let score = s.score.unwrap();
        assert!(score >= 0.0 && score <= s.max_score);
    }

    #[test]
    fn illegal_transitions_surface_the_current_state() {
        let mut s = submission_with(vec![], 10.0);
        s.transition_to(SubmissionStatus::Submitted).unwrap();
        s.transition_to(SubmissionStatus::Graded).unwrap();

        // Second submit on the same attempt must fail.
        let err = s.transition_to(SubmissionStatus::Submitted).unwrap_err();
        match err {
            EngineError::AlreadySubmitted { current } => {
                assert_eq!(current, SubmissionStatus::Graded)
            }
            other => panic!("unexpected error: {other}"),
        }

        // Amend, then return; returned is terminal.
        s.transition_to(SubmissionStatus::Graded).unwrap();
        s.transition_to(SubmissionStatus::Returned).unwrap();
        assert!(s.transition_to(SubmissionStatus::Graded).is_err());
    }

    #[test]
    fn summary_counts_correct_and_incorrect_answers() {
        let mut s = submission_with(
            vec![
                answer(5.0, 5.0, Some(true)),
                answer(0.0, 5.0, Some(false)),
                answer(0.0, 10.0, None),
            ],
            20.0,
        );
        s.recalculate_score();
        let summary = s.summary();
        assert_eq!(summary.total_questions, 3);
        assert_eq!(summary.correct_answers, 1);
        assert_eq!(summary.incorrect_answers, 2);
    }
}
