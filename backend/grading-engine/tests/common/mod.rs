#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use grading_engine::models::{
    Assignment, AssignmentKind, ChoiceOption, CreateAssignmentRequest, Question, QuestionInput,
    QuestionKind, TextAnswer,
};
use grading_engine::store::AssignmentStore;
use grading_engine::{
    AssignmentService, FixedClock, GradingConfig, GradingService, LogNotifier, MemoryStore,
};
use uuid::Uuid;

pub struct TestEngine {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedClock>,
    pub notifier: Arc<LogNotifier>,
    pub assignments: Arc<AssignmentService>,
    pub grading: Arc<GradingService>,
    pub teacher_id: Uuid,
}

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
}

pub fn engine() -> TestEngine {
    // Initialize tracing for tests
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::at(epoch()));
    let notifier = Arc::new(LogNotifier::new());

    let assignments = Arc::new(AssignmentService::new(
        store.clone(),
        store.clone(),
        notifier.clone(),
        clock.clone(),
        GradingConfig::default(),
    ));
    let grading = Arc::new(GradingService::new(
        store.clone(),
        store.clone(),
        notifier.clone(),
        clock.clone(),
    ));

    TestEngine {
        store,
        clock,
        notifier,
        assignments,
        grading,
        teacher_id: Uuid::new_v4(),
    }
}

pub fn multiple_choice(points: f64) -> QuestionInput {
    QuestionInput {
        text: "Pick the right option".to_string(),
        kind: QuestionKind::MultipleChoice {
            options: vec![
                ChoiceOption {
                    id: "a".to_string(),
                    text: "wrong".to_string(),
                },
                ChoiceOption {
                    id: "b".to_string(),
                    text: "right".to_string(),
                },
            ],
            correct_option: "b".to_string(),
        },
        points,
        order: None,
        explanation: None,
        difficulty: None,
    }
}

pub fn short_answer(points: f64, correct: &str, case_sensitive: bool) -> QuestionInput {
    QuestionInput {
        text: "Answer in one word".to_string(),
        kind: QuestionKind::ShortAnswer(TextAnswer {
            correct: correct.to_string(),
            alternatives: Vec::new(),
            case_sensitive,
        }),
        points,
        order: None,
        explanation: None,
        difficulty: None,
    }
}

pub fn essay(points: f64) -> QuestionInput {
    QuestionInput {
        text: "Discuss at length".to_string(),
        kind: QuestionKind::Essay,
        points,
        order: None,
        explanation: None,
        difficulty: None,
    }
}

pub fn request(questions: Vec<QuestionInput>) -> CreateAssignmentRequest {
    CreateAssignmentRequest {
        course_id: Uuid::new_v4(),
        title: "Chapter 3 quiz".to_string(),
        description: None,
        instructions: None,
        kind: AssignmentKind::Quiz,
        available_from: None,
        due_date: None,
        time_limit_minutes: None,
        allow_late_submission: true,
        late_penalty_percent_per_day: None,
        max_attempts: None,
        total_points: None,
        passing_score: None,
        show_correct_answers: true,
        questions,
    }
}

/// Create and publish an assignment, returning it with its stored questions
/// in grading order.
pub async fn published(
    engine: &TestEngine,
    req: CreateAssignmentRequest,
) -> (Assignment, Vec<Question>) {
    let assignment = engine
        .assignments
        .create_assignment(req, engine.teacher_id)
        .await
        .expect("create assignment");
    let assignment = engine
        .assignments
        .publish(assignment.id, engine.teacher_id, &[])
        .await
        .expect("publish assignment");
    let questions = engine
        .store
        .questions(assignment.id)
        .await
        .expect("load questions");
    (assignment, questions)
}
