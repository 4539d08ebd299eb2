pub mod assignment;
pub mod notification;
pub mod question;
pub mod reporting;
pub mod submission;

pub use assignment::{
    Assignment, AssignmentKind, AssignmentStatus, CreateAssignmentRequest, QuestionInput,
};
pub use notification::{NotificationPayload, NotificationPriority, RelatedType};
pub use question::{ChoiceOption, Difficulty, Question, QuestionKind, TextAnswer};
pub use reporting::{AssignmentStatistics, QuestionStats, SubmissionStats};
pub use submission::{
    AnswerOverride, GradedAnswer, Submission, SubmissionStatus, SubmissionSummary,
};
