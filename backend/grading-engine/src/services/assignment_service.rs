use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::config::GradingConfig;
use crate::error::EngineError;
use crate::models::{
    Assignment, AssignmentStatistics, AssignmentStatus, CreateAssignmentRequest,
    NotificationPayload, NotificationPriority, Question, QuestionInput, QuestionKind,
    QuestionStats, RelatedType, SubmissionStats,
};
use crate::services::notifier::Notifier;
use crate::store::{AssignmentStore, SubmissionStore};
use crate::utils::clock::Clock;

/// Authoring and lifecycle of assignments plus their aggregate statistics.
pub struct AssignmentService {
    assignments: Arc<dyn AssignmentStore>,
    submissions: Arc<dyn SubmissionStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    config: GradingConfig,
}

impl AssignmentService {
    pub fn new(
        assignments: Arc<dyn AssignmentStore>,
        submissions: Arc<dyn SubmissionStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: GradingConfig,
    ) -> Self {
        Self {
            assignments,
            submissions,
            notifier,
            clock,
            config,
        }
    }

    /// Create a draft assignment together with its ordered questions.
    pub async fn create_assignment(
        &self,
        req: CreateAssignmentRequest,
        teacher_id: Uuid,
    ) -> Result<Assignment, EngineError> {
        req.validate()?;
        for question in &req.questions {
            validate_question_kind(&question.kind)?;
        }

        let now = self.clock.now();
        let assignment = Assignment {
            id: Uuid::new_v4(),
            course_id: req.course_id,
            teacher_id,
            title: req.title,
            description: req.description,
            instructions: req.instructions,
            kind: req.kind,
            status: AssignmentStatus::Draft,
            available_from: req.available_from,
            due_date: req.due_date,
            time_limit_minutes: req.time_limit_minutes,
            allow_late_submission: req.allow_late_submission,
            late_penalty_percent_per_day: req
                .late_penalty_percent_per_day
                .unwrap_or(self.config.default_late_penalty_percent_per_day),
            max_attempts: req.max_attempts.unwrap_or(self.config.default_max_attempts),
            total_points: req.total_points.unwrap_or(self.config.default_total_points),
            passing_score: req.passing_score,
            show_correct_answers: req.show_correct_answers,
            total_submissions: 0,
            avg_score: None,
            created_at: now,
            updated_at: now,
        };

        let questions = build_questions(assignment.id, req.questions, now);
        let question_count = questions.len();

        self.assignments
            .insert_assignment(assignment.clone(), questions)
            .await?;

        tracing::info!(
            "Assignment created: {} ({} questions) by teacher {}",
            assignment.id,
            question_count,
            teacher_id
        );

        Ok(assignment)
    }

    /// Publish a draft and notify the enrolled students. Enrollment is the
    /// identity collaborator's business, so recipients arrive as a list.
    pub async fn publish(
        &self,
        assignment_id: Uuid,
        teacher_id: Uuid,
        recipients: &[Uuid],
    ) -> Result<Assignment, EngineError> {
        let mut assignment = self.owned_assignment(assignment_id, teacher_id).await?;

        let questions = self.assignments.questions(assignment_id).await?;
        if questions.is_empty() {
            return Err(EngineError::Validation(
                "assignment has no questions".to_string(),
            ));
        }

        assignment.transition_to(AssignmentStatus::Published)?;
        assignment.updated_at = self.clock.now();
        self.assignments.save_assignment(&assignment).await?;

        tracing::info!(
            "Assignment published: {} to {} students",
            assignment.id,
            recipients.len()
        );

        let due = match assignment.due_date {
            Some(due) => format!("Due {}", due.format("%Y-%m-%d %H:%M UTC")),
            None => "No due date".to_string(),
        };
        let payloads = recipients
            .iter()
            .map(|student_id| NotificationPayload {
                student_id: *student_id,
                title: "New assignment".to_string(),
                message: format!("\"{}\" has been posted. {}", assignment.title, due),
                related_type: RelatedType::Assignment,
                related_id: assignment.id,
                priority: NotificationPriority::Medium,
            })
            .collect();
        if let Err(err) = self.notifier.notify_bulk(payloads).await {
            tracing::warn!("Publish notification failed for {}: {:#}", assignment.id, err);
        }

        Ok(assignment)
    }

    pub async fn close(
        &self,
        assignment_id: Uuid,
        teacher_id: Uuid,
    ) -> Result<Assignment, EngineError> {
        self.advance(assignment_id, teacher_id, AssignmentStatus::Closed)
            .await
    }

    pub async fn archive(
        &self,
        assignment_id: Uuid,
        teacher_id: Uuid,
    ) -> Result<Assignment, EngineError> {
        self.advance(assignment_id, teacher_id, AssignmentStatus::Archived)
            .await
    }

    /// Swap the question set of a draft. Once an assignment leaves draft its
    /// questions are frozen, otherwise attempts created before and after the
    /// edit would snapshot different max scores.
    pub async fn replace_questions(
        &self,
        assignment_id: Uuid,
        teacher_id: Uuid,
        inputs: Vec<QuestionInput>,
    ) -> Result<Vec<Question>, EngineError> {
        let assignment = self.owned_assignment(assignment_id, teacher_id).await?;
        if assignment.status != AssignmentStatus::Draft {
            return Err(EngineError::Validation(format!(
                "questions are frozen once the assignment is {}",
                assignment.status.as_str()
            )));
        }

        for input in &inputs {
            input.validate()?;
            validate_question_kind(&input.kind)?;
        }

        let questions = build_questions(assignment_id, inputs, self.clock.now());
        self.assignments
            .replace_questions(assignment_id, questions.clone())
            .await?;
        Ok(questions)
    }

    /// Recompute the aggregate counters from the graded submissions.
    pub async fn update_statistics(&self, assignment_id: Uuid) -> Result<Assignment, EngineError> {
        refresh_statistics(
            self.assignments.as_ref(),
            self.submissions.as_ref(),
            assignment_id,
            self.clock.now(),
        )
        .await
    }

    /// Full teacher-facing report: submission aggregates plus per-question
    /// answer statistics.
    pub async fn assignment_statistics(
        &self,
        assignment_id: Uuid,
    ) -> Result<AssignmentStatistics, EngineError> {
        let assignment = self
            .assignments
            .assignment(assignment_id)
            .await?
            .ok_or(EngineError::NotFound("assignment"))?;
        let graded = self.submissions.graded_for_assignment(assignment_id).await?;
        let questions = self.assignments.questions(assignment_id).await?;

        let scores: Vec<f64> = graded.iter().filter_map(|s| s.score).collect();
        let percentages: Vec<f64> = graded.iter().filter_map(|s| s.percentage).collect();

        let submissions = SubmissionStats {
            total: graded.len() as u64,
            avg_score: mean(&scores),
            min_score: scores.iter().copied().reduce(f64::min),
            max_score: scores.iter().copied().reduce(f64::max),
            avg_percentage: mean(&percentages),
        };

        let questions = questions
            .into_iter()
            .map(|q| QuestionStats {
                id: q.id,
                text: q.text.clone(),
                kind: q.kind.as_str(),
                points: q.points,
                times_answered: q.times_answered,
                success_rate: q.success_rate(),
            })
            .collect();

        Ok(AssignmentStatistics {
            assignment_id: assignment.id,
            title: assignment.title,
            total_points: assignment.total_points,
            total_submissions: assignment.total_submissions,
            avg_score: assignment.avg_score,
            submissions,
            questions,
        })
    }

    /// Questions answered at least once with a success rate below 50%.
    pub async fn difficult_questions(
        &self,
        assignment_id: Uuid,
    ) -> Result<Vec<Question>, EngineError> {
        let questions = self.assignments.questions(assignment_id).await?;
        Ok(questions
            .into_iter()
            .filter(|q| q.times_answered > 0 && q.success_rate() < 50.0)
            .collect())
    }

    async fn advance(
        &self,
        assignment_id: Uuid,
        teacher_id: Uuid,
        next: AssignmentStatus,
    ) -> Result<Assignment, EngineError> {
        let mut assignment = self.owned_assignment(assignment_id, teacher_id).await?;
        assignment.transition_to(next)?;
        assignment.updated_at = self.clock.now();
        self.assignments.save_assignment(&assignment).await?;
        tracing::info!("Assignment {} is now {}", assignment.id, next.as_str());
        Ok(assignment)
    }

    async fn owned_assignment(
        &self,
        assignment_id: Uuid,
        teacher_id: Uuid,
    ) -> Result<Assignment, EngineError> {
        let assignment = self
            .assignments
            .assignment(assignment_id)
            .await?
            .ok_or(EngineError::NotFound("assignment"))?;
        // Ownership comes from the identity collaborator; a mismatch reads
        // the same as a missing record.
        if assignment.teacher_id != teacher_id {
            return Err(EngineError::NotFound("assignment"));
        }
        Ok(assignment)
    }
}

/// Idempotent full recompute of `total_submissions` and `avg_score` from the
/// graded submissions. Concurrent refreshes may race; last writer wins with
/// the true aggregate.
pub(crate) async fn refresh_statistics(
    assignments: &dyn AssignmentStore,
    submissions: &dyn SubmissionStore,
    assignment_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Assignment, EngineError> {
    let mut assignment = assignments
        .assignment(assignment_id)
        .await?
        .ok_or(EngineError::NotFound("assignment"))?;

    let graded = submissions.graded_for_assignment(assignment_id).await?;
    let scores: Vec<f64> = graded.iter().filter_map(|s| s.score).collect();

    assignment.total_submissions = graded.len() as u64;
    assignment.avg_score = mean(&scores);
    assignment.updated_at = now;

    assignments.save_assignment(&assignment).await?;
    Ok(assignment)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn build_questions(
    assignment_id: Uuid,
    inputs: Vec<QuestionInput>,
    now: DateTime<Utc>,
) -> Vec<Question> {
    inputs
        .into_iter()
        .enumerate()
        .map(|(index, input)| Question {
            id: Uuid::new_v4(),
            assignment_id,
            text: input.text,
            kind: input.kind,
            points: input.points,
            order: input.order.unwrap_or(index as u32),
            explanation: input.explanation,
            difficulty: input.difficulty,
            times_answered: 0,
            times_correct: 0,
            created_at: now,
        })
        .collect()
}

fn validate_question_kind(kind: &QuestionKind) -> Result<(), EngineError> {
    match kind {
        QuestionKind::MultipleChoice {
            options,
            correct_option,
        } => {
            if options.len() < 2 {
                return Err(EngineError::Validation(
                    "multiple choice needs at least two options".to_string(),
                ));
            }
            if !options.iter().any(|o| o.id == *correct_option) {
                return Err(EngineError::Validation(
                    "correct option must be one of the listed options".to_string(),
                ));
            }
        }
        QuestionKind::TrueFalse { correct_option } => {
            if correct_option != "true" && correct_option != "false" {
                return Err(EngineError::Validation(
                    "true/false answer must be \"true\" or \"false\"".to_string(),
                ));
            }
        }
        QuestionKind::ShortAnswer(answer) | QuestionKind::FillBlank(answer) => {
            if answer.correct.trim().is_empty() {
                return Err(EngineError::Validation(
                    "correct answer must not be empty".to_string(),
                ));
            }
        }
        QuestionKind::Essay => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChoiceOption;

    #[test]
    fn multiple_choice_needs_its_correct_option_listed() {
        let kind = QuestionKind::MultipleChoice {
            options: vec![
                ChoiceOption {
                    id: "a".to_string(),
                    text: "one".to_string(),
                },
                ChoiceOption {
                    id: "b".to_string(),
                    text: "two".to_string(),
                },
            ],
            correct_option: "c".to_string(),
        };
        assert!(validate_question_kind(&kind).is_err());
    }

    #[test]
    fn essay_questions_need_no_correct_answer() {
        assert!(validate_question_kind(&QuestionKind::Essay).is_ok());
    }

    #[test]
    fn question_order_defaults_to_input_position() {
        let inputs = vec![
            QuestionInput {
                text: "first".to_string(),
                kind: QuestionKind::Essay,
                points: 1.0,
                order: None,
                explanation: None,
                difficulty: None,
            },
            QuestionInput {
                text: "second".to_string(),
                kind: QuestionKind::Essay,
                points: 1.0,
                order: Some(7),
                explanation: None,
                difficulty: None,
            },
        ];
        let questions = build_questions(Uuid::new_v4(), inputs, Utc::now());
        assert_eq!(questions[0].order, 0);
        assert_eq!(questions[1].order, 7);
    }

    #[test]
    fn mean_of_nothing_is_none() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[4.0, 6.0]), Some(5.0));
    }
}
