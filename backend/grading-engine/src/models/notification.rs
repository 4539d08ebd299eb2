use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of record a notification points back at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RelatedType {
    Assignment,
    Submission,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    Medium,
    High,
}

/// Payload handed to the notification collaborator. Delivery is best-effort;
/// the engine never depends on it succeeding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub student_id: Uuid,
    pub title: String,
    pub message: String,
    pub related_type: RelatedType,
    pub related_id: Uuid,
    pub priority: NotificationPriority,
}
