//! NotificationSink port - メッセージバスへの publish
//!
//! fire-and-forget。配信保証は at-least-once（タスクのリトライ）まで。

use async_trait::async_trait;

use crate::domain::ErrorKind;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifyError {
    #[error("publish to topic '{topic}' failed: {reason}")]
    Publish { topic: String, reason: String },
}

impl NotifyError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Infrastructure
    }
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, topic: &str, payload: serde_json::Value) -> Result<(), NotifyError>;
}
