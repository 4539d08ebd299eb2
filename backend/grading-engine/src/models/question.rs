use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single gradable prompt owned by an assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub text: String,
    pub kind: QuestionKind,
    /// Maximum credit for this question, >= 0.
    pub points: f64,
    /// Display/grading position within the assignment.
    pub order: u32,
    /// Shown to the student after submission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    /// Running counters, monotone; `times_correct <= times_answered`.
    #[serde(default)]
    pub times_answered: u64,
    #[serde(default)]
    pub times_correct: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// One choice descriptor of a multiple-choice question. Ids are opaque;
/// answer checking compares them by identity, never as free text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub id: String,
    pub text: String,
}

/// Accepted values of a free-text question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextAnswer {
    pub correct: String,
    #[serde(default)]
    pub alternatives: Vec<String>,
    #[serde(default)]
    pub case_sensitive: bool,
}

impl TextAnswer {
    /// True iff the candidate matches the correct answer or any alternative.
    /// Case-insensitive mode lower-cases and trims both sides.
    pub fn matches(&self, candidate: &str) -> bool {
        let accepted = std::iter::once(self.correct.as_str())
            .chain(self.alternatives.iter().map(String::as_str));

        if self.case_sensitive {
            accepted.into_iter().any(|value| value == candidate)
        } else {
            let normalized = candidate.trim().to_lowercase();
            accepted
                .into_iter()
                .any(|value| value.trim().to_lowercase() == normalized)
        }
    }
}

/// Closed set of question kinds; each variant carries only the fields its
/// answer-checking policy needs, so adding a kind is a compile-time change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice {
        options: Vec<ChoiceOption>,
        correct_option: String,
    },
    TrueFalse {
        correct_option: String,
    },
    ShortAnswer(TextAnswer),
    FillBlank(TextAnswer),
    Essay,
}

impl QuestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice { .. } => "multiple_choice",
            QuestionKind::TrueFalse { .. } => "true_false",
            QuestionKind::ShortAnswer(_) => "short_answer",
            QuestionKind::FillBlank(_) => "fill_blank",
            QuestionKind::Essay => "essay",
        }
    }
}

impl Question {
    /// Check a candidate answer against this question's correct-answer
    /// policy. `None` means the answer requires manual grading (essay).
    pub fn check_answer(&self, candidate: &str) -> Option<bool> {
        match &self.kind {
            QuestionKind::MultipleChoice { correct_option, .. }
            | QuestionKind::TrueFalse { correct_option } => Some(candidate == correct_option),
            QuestionKind::ShortAnswer(answer) | QuestionKind::FillBlank(answer) => {
                Some(answer.matches(candidate))
            }
            QuestionKind::Essay => None,
        }
    }

    pub fn is_auto_gradable(&self) -> bool {
        !matches!(self.kind, QuestionKind::Essay)
    }

    /// Percentage of auto-graded answers that were correct; 0 when the
    /// question has never been answered.
    pub fn success_rate(&self) -> f64 {
        if self.times_answered == 0 {
            return 0.0;
        }
        self.times_correct as f64 / self.times_answered as f64 * 100.0
    }

    /// Apply one grading outcome to the running counters. Callers must hold
    /// the store's per-question write guard so increments are never lost.
    pub fn record_result(&mut self, correct: bool) {
        self.times_answered += 1;
        if correct {
            self.times_correct += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(kind: QuestionKind) -> Question {
        Question {
            id: Uuid::new_v4(),
            assignment_id: Uuid::new_v4(),
            text: "q".to_string(),
            kind,
            points: 5.0,
            order: 0,
            explanation: None,
            difficulty: None,
            times_answered: 0,
            times_correct: 0,
            created_at: Utc::now(),
        }
    }

    fn text_answer(case_sensitive: bool) -> TextAnswer {
        TextAnswer {
            correct: "Paris".to_string(),
            alternatives: vec!["paris, france".to_string()],
            case_sensitive,
        }
    }

    #[test]
    fn multiple_choice_compares_option_ids_exactly() {
        let q = question(QuestionKind::MultipleChoice {
            options: vec![
                ChoiceOption {
                    id: "a".to_string(),
                    text: "first".to_string(),
                },
                ChoiceOption {
                    id: "b".to_string(),
                    text: "second".to_string(),
                },
            ],
            correct_option: "b".to_string(),
        });

        assert_eq!(q.check_answer("b"), Some(true));
        assert_eq!(q.check_answer("a"), Some(false));
        assert_eq!(q.check_answer("B"), Some(false));
        // Values outside the option set are simply wrong, not an error.
        assert_eq!(q.check_answer("z"), Some(false));
    }

    #[test]
    fn true_false_compares_by_identity() {
        let q = question(QuestionKind::TrueFalse {
            correct_option: "true".to_string(),
        });
        assert_eq!(q.check_answer("true"), Some(true));
        assert_eq!(q.check_answer("false"), Some(false));
        assert_eq!(q.check_answer(" true "), Some(false));
    }

    #[test]
    fn short_answer_case_insensitive_normalizes_both_sides() {
        let q = question(QuestionKind::ShortAnswer(text_answer(false)));
        assert_eq!(q.check_answer("PARIS"), Some(true));
        assert_eq!(q.check_answer("paris"), Some(true));
        assert_eq!(q.check_answer("  Paris  "), Some(true));
        assert_eq!(q.check_answer("Paris, France"), Some(true));
        assert_eq!(q.check_answer("London"), Some(false));
    }

    #[test]
    fn short_answer_case_sensitive_requires_verbatim_match() {
        let q = question(QuestionKind::FillBlank(text_answer(true)));
        assert_eq!(q.check_answer("Paris"), Some(true));
        assert_eq!(q.check_answer("paris"), Some(false));
        assert_eq!(q.check_answer(" Paris"), Some(false));
    }

    #[test]
    fn essay_always_needs_manual_grading() {
        let q = question(QuestionKind::Essay);
        assert_eq!(q.check_answer("anything at all"), None);
        assert_eq!(q.check_answer(""), None);
        assert!(!q.is_auto_gradable());
    }

    #[test]
    fn question_kinds_serialize_with_a_type_tag() {
        let kind = QuestionKind::ShortAnswer(TextAnswer {
            correct: "Paris".to_string(),
            alternatives: vec![],
            case_sensitive: false,
        });
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["type"], "short_answer");
        assert_eq!(json["correct"], "Paris");

        let parsed: QuestionKind =
            serde_json::from_str(r#"{"type":"true_false","correct_option":"true"}"#).unwrap();
        assert_eq!(parsed.as_str(), "true_false");
    }

    #[test]
    fn success_rate_is_zero_before_any_answer() {
        let mut q = question(QuestionKind::TrueFalse {
            correct_option: "true".to_string(),
        });
        assert_eq!(q.success_rate(), 0.0);

        q.record_result(true);
        q.record_result(false);
        q.record_result(true);
        q.record_result(true);
        assert_eq!(q.times_answered, 4);
        assert_eq!(q.times_correct, 3);
        assert_eq!(q.success_rate(), 75.0);
        assert!(q.times_correct <= q.times_answered);
    }
}
