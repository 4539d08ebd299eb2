use std::sync::Mutex;

use async_trait::async_trait;

use crate::models::NotificationPayload;

/// Notification collaborator. The engine fires payloads at it and moves on;
/// a delivery failure never rolls back a grading transition.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, payload: NotificationPayload) -> anyhow::Result<()>;

    async fn notify_bulk(&self, payloads: Vec<NotificationPayload>) -> anyhow::Result<()> {
        for payload in payloads {
            self.notify(payload).await?;
        }
        Ok(())
    }
}

/// Logs every payload and keeps it in memory. Stands in for the real
/// delivery channel in tests and local runs.
#[derive(Default)]
pub struct LogNotifier {
    sent: Mutex<Vec<NotificationPayload>>,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<NotificationPayload> {
        self.sent.lock().expect("notifier lock poisoned").clone()
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, payload: NotificationPayload) -> anyhow::Result<()> {
        tracing::info!(
            "Notification for student {}: {} - {}",
            payload.student_id,
            payload.title,
            payload.message
        );
        self.sent
            .lock()
            .expect("notifier lock poisoned")
            .push(payload);
        Ok(())
    }
}
