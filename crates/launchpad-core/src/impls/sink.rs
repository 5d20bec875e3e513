//! NotificationSink の開発用実装
//!
//! - RecordingSink: publish をメモリに記録する（テスト用、失敗も注入できる）
//! - LogSink: publish を tracing に流すだけ（デモ・ローカル実行用）

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tracing::info;

use crate::ports::{NotificationSink, NotifyError};

#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    published: Mutex<Vec<PublishedMessage>>,
    failures_left: AtomicU32,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 次の `n` 回の publish を失敗させる
    pub fn fail_next(&self, n: u32) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn publish(&self, topic: &str, payload: serde_json::Value) -> Result<(), NotifyError> {
        let injected = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if injected {
            return Err(NotifyError::Publish {
                topic: topic.to_string(),
                reason: "injected failure".into(),
            });
        }

        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PublishedMessage {
                topic: topic.to_string(),
                payload,
            });
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn publish(&self, topic: &str, payload: serde_json::Value) -> Result<(), NotifyError> {
        info!(topic, %payload, "message published");
        Ok(())
    }
}
