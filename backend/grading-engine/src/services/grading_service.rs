use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use uuid::Uuid;

use crate::error::EngineError;
use crate::models::{
    AnswerOverride, Assignment, GradedAnswer, NotificationPayload, NotificationPriority,
    RelatedType, Submission, SubmissionStatus,
};
use crate::services::assignment_service::refresh_statistics;
use crate::services::notifier::Notifier;
use crate::store::{AssignmentStore, StoreError, SubmissionStore};
use crate::utils::clock::Clock;

/// How often attempt-number allocation retries before giving up. Collisions
/// only happen when the same student starts the same assignment twice at
/// the same instant.
const ATTEMPT_ALLOCATION_RETRIES: u32 = 3;

/// Orchestrates the submission state machine: starting attempts, dispatching
/// per-question auto-grading, applying late penalties, routing essays to
/// manual grading, and refreshing assignment statistics afterwards.
pub struct GradingService {
    assignments: Arc<dyn AssignmentStore>,
    submissions: Arc<dyn SubmissionStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl GradingService {
    pub fn new(
        assignments: Arc<dyn AssignmentStore>,
        submissions: Arc<dyn SubmissionStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            assignments,
            submissions,
            notifier,
            clock,
        }
    }

    /// Create a draft submission for a student, sized to the assignment's
    /// question set. `max_score` is snapshotted here, not derived later.
    pub async fn start_attempt(
        &self,
        assignment_id: Uuid,
        student_id: Uuid,
    ) -> Result<Submission, EngineError> {
        let assignment = self
            .assignments
            .assignment(assignment_id)
            .await?
            .ok_or(EngineError::NotFound("assignment"))?;

        let now = self.clock.now();
        if !assignment.is_available(now) {
            return Err(EngineError::AssignmentUnavailable);
        }

        let questions = self.assignments.questions(assignment_id).await?;
        let max_score: f64 = questions.iter().map(|q| q.points).sum();

        // Concurrent starts race on the attempt number; the store's
        // uniqueness constraint arbitrates and we recount on collision.
        for _ in 0..ATTEMPT_ALLOCATION_RETRIES {
            let prior = self
                .submissions
                .count_attempts(assignment_id, student_id)
                .await?;
            if prior >= assignment.max_attempts {
                return Err(EngineError::AttemptLimitExceeded {
                    max_attempts: assignment.max_attempts,
                });
            }

            let submission =
                Submission::new(assignment_id, student_id, prior + 1, max_score, now);
            match self.submissions.insert_submission(submission.clone()).await {
                Ok(()) => {
                    tracing::info!(
                        "Attempt {} started: submission {} for student {} on assignment {}",
                        submission.attempt_number,
                        submission.id,
                        student_id,
                        assignment_id
                    );
                    return Ok(submission);
                }
                Err(StoreError::DuplicateAttempt) => continue,
                Err(err) => return Err(err.into()),
            }
        }

        Err(EngineError::Infrastructure(anyhow::anyhow!(
            "could not allocate an attempt number for student {student_id}"
        )))
    }

    /// Grade and finalize a draft attempt. Auto-gradable questions are
    /// checked immediately; essays route the attempt to manual grading.
    /// Called once per attempt: the second of two concurrent submits
    /// observes the claimed status and fails with `AlreadySubmitted`.
    pub async fn submit_attempt(
        &self,
        submission_id: Uuid,
        student_id: Uuid,
        answers: &HashMap<Uuid, String>,
    ) -> Result<Submission, EngineError> {
        let existing = self
            .submissions
            .submission(submission_id)
            .await?
            .ok_or(EngineError::NotFound("submission"))?;
        if existing.student_id != student_id {
            return Err(EngineError::NotFound("submission"));
        }

        let assignment = self
            .assignments
            .assignment(existing.assignment_id)
            .await?
            .ok_or(EngineError::NotFound("assignment"))?;
        let questions = self.assignments.questions(assignment.id).await?;

        // Reject malformed input before any mutation.
        let known: HashSet<Uuid> = questions.iter().map(|q| q.id).collect();
        if let Some(unknown) = answers.keys().find(|id| !known.contains(id)) {
            return Err(EngineError::Validation(format!(
                "unknown question id {unknown} in answer map"
            )));
        }

        // The per-submission serialization point.
        let mut submission = self
            .submissions
            .claim_submission(
                submission_id,
                &[SubmissionStatus::Draft],
                SubmissionStatus::Submitted,
            )
            .await?;

        let now = self.clock.now();
        let mut needs_manual = false;

        for question in &questions {
            let graded = match answers.get(&question.id) {
                // Unanswered counts as incorrect with zero points.
                None => GradedAnswer {
                    value: None,
                    is_correct: Some(false),
                    points_earned: 0.0,
                    max_points: question.points,
                    needs_manual_grading: false,
                    manually_graded: false,
                },
                Some(value) => match question.check_answer(value) {
                    Some(correct) => {
                        self.assignments
                            .record_question_result(question.id, correct)
                            .await?;
                        GradedAnswer {
                            value: Some(value.clone()),
                            is_correct: Some(correct),
                            points_earned: if correct { question.points } else { 0.0 },
                            max_points: question.points,
                            needs_manual_grading: false,
                            manually_graded: false,
                        }
                    }
                    None => {
                        needs_manual = true;
                        GradedAnswer {
                            value: Some(value.clone()),
                            is_correct: None,
                            points_earned: 0.0,
                            max_points: question.points,
                            needs_manual_grading: true,
                            manually_graded: false,
                        }
                    }
                },
            };
            submission.answers.insert(question.id, graded);
        }

        submission.is_late = assignment.is_overdue(now);
        submission.late_penalty_percent = if submission.is_late {
            assignment.late_penalty_percent(now)
        } else {
            0.0
        };
        submission.needs_manual_grading = needs_manual;
        submission.submitted_at = Some(now);
        if let Some(started) = submission.started_at {
            submission.time_spent_seconds = Some((now - started).num_seconds());
        }
        submission.recalculate_score();

        if needs_manual {
            submission.transition_to(SubmissionStatus::Grading)?;
        } else {
            submission.transition_to(SubmissionStatus::Graded)?;
            submission.graded_at = Some(now);
            submission.auto_graded = true;
        }

        self.submissions.save_submission(&submission).await?;

        tracing::info!(
            "Submission {} {}: score {:?}/{}, late={}, penalty={}%",
            submission.id,
            submission.status.as_str(),
            submission.score,
            submission.max_score,
            submission.is_late,
            submission.late_penalty_percent
        );

        if submission.status == SubmissionStatus::Graded {
            refresh_statistics(
                self.assignments.as_ref(),
                self.submissions.as_ref(),
                assignment.id,
                now,
            )
            .await?;
        }

        let message = if needs_manual {
            format!(
                "You submitted \"{}\". It is waiting for manual grading.",
                assignment.title
            )
        } else {
            format!(
                "You submitted \"{}\". Score: {:.2}/{:.2}",
                assignment.title,
                submission.score.unwrap_or(0.0),
                submission.max_score
            )
        };
        self.notify_best_effort(NotificationPayload {
            student_id,
            title: "Assignment submitted".to_string(),
            message,
            related_type: RelatedType::Submission,
            related_id: submission.id,
            priority: NotificationPriority::Medium,
        })
        .await;

        Ok(submission)
    }

    /// Teacher finishes (or amends) grading: per-answer overrides for the
    /// essays and any auto-graded answers being corrected, then the same
    /// score arithmetic as on submit.
    pub async fn complete_grading(
        &self,
        submission_id: Uuid,
        teacher_id: Uuid,
        overrides: &HashMap<Uuid, AnswerOverride>,
        feedback: Option<String>,
    ) -> Result<Submission, EngineError> {
        let existing = self
            .submissions
            .submission(submission_id)
            .await?
            .ok_or(EngineError::NotFound("submission"))?;

        // Validate every override against the recorded answers before any
        // mutation.
        for (question_id, grade) in overrides {
            let answer = existing.answers.get(question_id).ok_or_else(|| {
                EngineError::Validation(format!(
                    "unknown question id {question_id} in grading overrides"
                ))
            })?;
            if grade.points_earned < 0.0 || grade.points_earned > answer.max_points {
                return Err(EngineError::Validation(format!(
                    "points for question {question_id} must be within 0-{}",
                    answer.max_points
                )));
            }
        }

        let mut submission = self
            .submissions
            .claim_submission(
                submission_id,
                &[SubmissionStatus::Grading, SubmissionStatus::Graded],
                SubmissionStatus::Graded,
            )
            .await?;

        let now = self.clock.now();
        for (question_id, grade) in overrides {
            if let Some(answer) = submission.answers.get_mut(question_id) {
                answer.points_earned = grade.points_earned;
                answer.is_correct = grade.is_correct;
                answer.needs_manual_grading = false;
                answer.manually_graded = true;
            }
        }

        submission.needs_manual_grading = false;
        submission.graded_at = Some(now);
        submission.graded_by = Some(teacher_id);
        if feedback.is_some() {
            submission.teacher_feedback = feedback;
        }
        submission.recalculate_score();

        self.submissions.save_submission(&submission).await?;

        tracing::info!(
            "Submission {} graded by {}: score {:?}/{}",
            submission.id,
            teacher_id,
            submission.score,
            submission.max_score
        );

        refresh_statistics(
            self.assignments.as_ref(),
            self.submissions.as_ref(),
            submission.assignment_id,
            now,
        )
        .await?;

        let assignment = self
            .assignments
            .assignment(submission.assignment_id)
            .await?
            .ok_or(EngineError::NotFound("assignment"))?;
        self.notify_best_effort(NotificationPayload {
            student_id: submission.student_id,
            title: "Assignment graded".to_string(),
            message: format!(
                "\"{}\" has been graded. Score: {:.2}/{:.2} ({:.1}%)",
                assignment.title,
                submission.score.unwrap_or(0.0),
                submission.max_score,
                submission.percentage.unwrap_or(0.0)
            ),
            related_type: RelatedType::Submission,
            related_id: submission.id,
            priority: NotificationPriority::High,
        })
        .await;

        Ok(submission)
    }

    /// Feedback delivered to the student; scoring is already final.
    pub async fn return_submission(
        &self,
        submission_id: Uuid,
    ) -> Result<Submission, EngineError> {
        let submission = self
            .submissions
            .claim_submission(
                submission_id,
                &[SubmissionStatus::Graded],
                SubmissionStatus::Returned,
            )
            .await?;
        tracing::info!("Submission {} returned to student", submission.id);
        Ok(submission)
    }

    pub async fn attempts_count(
        &self,
        assignment_id: Uuid,
        student_id: Uuid,
    ) -> Result<u32, EngineError> {
        Ok(self
            .submissions
            .count_attempts(assignment_id, student_id)
            .await?)
    }

    pub async fn best_attempt(
        &self,
        assignment_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<Submission>, EngineError> {
        Ok(self
            .submissions
            .best_attempt(assignment_id, student_id)
            .await?)
    }

    pub async fn submissions_needing_grading(
        &self,
        assignment_id: Uuid,
        teacher_id: Uuid,
    ) -> Result<Vec<Submission>, EngineError> {
        let assignment = self
            .assignments
            .assignment(assignment_id)
            .await?
            .ok_or(EngineError::NotFound("assignment"))?;
        if assignment.teacher_id != teacher_id {
            return Err(EngineError::NotFound("assignment"));
        }
        Ok(self.submissions.needing_grading(assignment_id).await?)
    }

    pub async fn assignment(&self, assignment_id: Uuid) -> Result<Assignment, EngineError> {
        self.assignments
            .assignment(assignment_id)
            .await?
            .ok_or(EngineError::NotFound("assignment"))
    }

    async fn notify_best_effort(&self, payload: NotificationPayload) {
        let submission_id = payload.related_id;
        if let Err(err) = self.notifier.notify(payload).await {
            tracing::warn!(
                "Notification failed for submission {}: {:#}",
                submission_id,
                err
            );
        }
    }
}
