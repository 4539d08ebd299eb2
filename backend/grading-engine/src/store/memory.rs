use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AssignmentStore, StoreError, SubmissionStore};
use crate::models::{Assignment, Question, Submission, SubmissionStatus};

/// In-memory store backing tests and single-process deployments. All writes
/// go through one `RwLock`, which gives the guarded status update and the
/// question-counter increments their atomicity.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    assignments: HashMap<Uuid, Assignment>,
    questions: HashMap<Uuid, Question>,
    submissions: HashMap<Uuid, Submission>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn has_final_grade(submission: &Submission) -> bool {
    // Returned attempts keep their grade and stay in the aggregate.
    matches!(
        submission.status,
        SubmissionStatus::Graded | SubmissionStatus::Returned
    )
}

#[async_trait]
impl AssignmentStore for MemoryStore {
    async fn insert_assignment(
        &self,
        assignment: Assignment,
        questions: Vec<Question>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        for question in questions {
            inner.questions.insert(question.id, question);
        }
        inner.assignments.insert(assignment.id, assignment);
        Ok(())
    }

    async fn assignment(&self, id: Uuid) -> Result<Option<Assignment>, StoreError> {
        Ok(self.inner.read().await.assignments.get(&id).cloned())
    }

    async fn save_assignment(&self, assignment: &Assignment) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.assignments.contains_key(&assignment.id) {
            return Err(StoreError::NotFound("assignment"));
        }
        inner.assignments.insert(assignment.id, assignment.clone());
        Ok(())
    }

    async fn questions(&self, assignment_id: Uuid) -> Result<Vec<Question>, StoreError> {
        let inner = self.inner.read().await;
        let mut questions: Vec<Question> = inner
            .questions
            .values()
            .filter(|q| q.assignment_id == assignment_id)
            .cloned()
            .collect();
        questions.sort_by_key(|q| q.order);
        Ok(questions)
    }

    async fn replace_questions(
        &self,
        assignment_id: Uuid,
        questions: Vec<Question>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.assignments.contains_key(&assignment_id) {
            return Err(StoreError::NotFound("assignment"));
        }
        inner.questions.retain(|_, q| q.assignment_id != assignment_id);
        for question in questions {
            inner.questions.insert(question.id, question);
        }
        Ok(())
    }

    async fn record_question_result(
        &self,
        question_id: Uuid,
        correct: bool,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let question = inner
            .questions
            .get_mut(&question_id)
            .ok_or(StoreError::NotFound("question"))?;
        question.record_result(correct);
        Ok(())
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn insert_submission(&self, submission: Submission) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let duplicate = inner.submissions.values().any(|s| {
            s.assignment_id == submission.assignment_id
                && s.student_id == submission.student_id
                && s.attempt_number == submission.attempt_number
        });
        if duplicate {
            return Err(StoreError::DuplicateAttempt);
        }
        inner.submissions.insert(submission.id, submission);
        Ok(())
    }

    async fn submission(&self, id: Uuid) -> Result<Option<Submission>, StoreError> {
        Ok(self.inner.read().await.submissions.get(&id).cloned())
    }

    async fn save_submission(&self, submission: &Submission) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.submissions.contains_key(&submission.id) {
            return Err(StoreError::NotFound("submission"));
        }
        inner.submissions.insert(submission.id, submission.clone());
        Ok(())
    }

    async fn claim_submission(
        &self,
        id: Uuid,
        from: &[SubmissionStatus],
        to: SubmissionStatus,
    ) -> Result<Submission, StoreError> {
        let mut inner = self.inner.write().await;
        let submission = inner
            .submissions
            .get_mut(&id)
            .ok_or(StoreError::NotFound("submission"))?;
        if !from.contains(&submission.status) {
            return Err(StoreError::StatusConflict {
                current: submission.status,
            });
        }
        submission.status = to;
        Ok(submission.clone())
    }

    async fn count_attempts(
        &self,
        assignment_id: Uuid,
        student_id: Uuid,
    ) -> Result<u32, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .submissions
            .values()
            .filter(|s| s.assignment_id == assignment_id && s.student_id == student_id)
            .count() as u32)
    }

    async fn graded_for_assignment(
        &self,
        assignment_id: Uuid,
    ) -> Result<Vec<Submission>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .submissions
            .values()
            .filter(|s| s.assignment_id == assignment_id && has_final_grade(s))
            .cloned()
            .collect())
    }

    async fn best_attempt(
        &self,
        assignment_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<Submission>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .submissions
            .values()
            .filter(|s| {
                s.assignment_id == assignment_id
                    && s.student_id == student_id
                    && has_final_grade(s)
            })
            .max_by(|a, b| {
                let a_score = a.score.unwrap_or(0.0);
                let b_score = b.score.unwrap_or(0.0);
                a_score.total_cmp(&b_score)
            })
            .cloned())
    }

    async fn needing_grading(&self, assignment_id: Uuid) -> Result<Vec<Submission>, StoreError> {
        let inner = self.inner.read().await;
        let mut waiting: Vec<Submission> = inner
            .submissions
            .values()
            .filter(|s| {
                s.assignment_id == assignment_id
                    && s.status == SubmissionStatus::Grading
                    && s.needs_manual_grading
            })
            .cloned()
            .collect();
        waiting.sort_by_key(|s| s.submitted_at);
        Ok(waiting)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn submission(assignment_id: Uuid, student_id: Uuid, attempt: u32) -> Submission {
        Submission::new(assignment_id, student_id, attempt, 10.0, Utc::now())
    }

    #[tokio::test]
    async fn duplicate_attempt_numbers_are_rejected() {
        let store = MemoryStore::new();
        let assignment_id = Uuid::new_v4();
        let student_id = Uuid::new_v4();

        store
            .insert_submission(submission(assignment_id, student_id, 1))
            .await
            .unwrap();

        let err = store
            .insert_submission(submission(assignment_id, student_id, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateAttempt));

        // A different student may reuse the number.
        store
            .insert_submission(submission(assignment_id, Uuid::new_v4(), 1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn claim_succeeds_exactly_once_per_source_state() {
        let store = MemoryStore::new();
        let s = submission(Uuid::new_v4(), Uuid::new_v4(), 1);
        let id = s.id;
        store.insert_submission(s).await.unwrap();

        store
            .claim_submission(id, &[SubmissionStatus::Draft], SubmissionStatus::Submitted)
            .await
            .unwrap();

        let err = store
            .claim_submission(id, &[SubmissionStatus::Draft], SubmissionStatus::Submitted)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::StatusConflict {
                current: SubmissionStatus::Submitted
            }
        ));
    }

    #[tokio::test]
    async fn question_counters_survive_concurrent_increments() {
        use std::sync::Arc;

        use crate::models::question::{Question, QuestionKind};

        let store = Arc::new(MemoryStore::new());
        let assignment_id = Uuid::new_v4();
        let question = Question {
            id: Uuid::new_v4(),
            assignment_id,
            text: "q".to_string(),
            kind: QuestionKind::TrueFalse {
                correct_option: "true".to_string(),
            },
            points: 1.0,
            order: 0,
            explanation: None,
            difficulty: None,
            times_answered: 0,
            times_correct: 0,
            created_at: Utc::now(),
        };
        let question_id = question.id;

        let assignment = crate::models::Assignment {
            id: assignment_id,
            course_id: Uuid::new_v4(),
            teacher_id: Uuid::new_v4(),
            title: "t".to_string(),
            description: None,
            instructions: None,
            kind: crate::models::AssignmentKind::Quiz,
            status: crate::models::AssignmentStatus::Published,
            available_from: None,
            due_date: None,
            time_limit_minutes: None,
            allow_late_submission: true,
            late_penalty_percent_per_day: 10.0,
            max_attempts: 1,
            total_points: 1.0,
            passing_score: None,
            show_correct_answers: true,
            total_submissions: 0,
            avg_score: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store
            .insert_assignment(assignment, vec![question])
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..50u32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .record_question_result(question_id, i % 2 == 0)
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let questions = store.questions(assignment_id).await.unwrap();
        assert_eq!(questions[0].times_answered, 50);
        assert_eq!(questions[0].times_correct, 25);
    }
}
