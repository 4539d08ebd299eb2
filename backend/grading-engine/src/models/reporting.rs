use serde::Serialize;
use uuid::Uuid;

/// Aggregate over the graded submissions of one assignment.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionStats {
    pub total: u64,
    pub avg_score: Option<f64>,
    pub min_score: Option<f64>,
    pub max_score: Option<f64>,
    pub avg_percentage: Option<f64>,
}

/// Per-question answer statistics for the teacher's report.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionStats {
    pub id: Uuid,
    pub text: String,
    pub kind: &'static str,
    pub points: f64,
    pub times_answered: u64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssignmentStatistics {
    pub assignment_id: Uuid,
    pub title: String,
    pub total_points: f64,
    pub total_submissions: u64,
    pub avg_score: Option<f64>,
    pub submissions: SubmissionStats,
    pub questions: Vec<QuestionStats>,
}
