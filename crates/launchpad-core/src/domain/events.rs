//! Events - ゲームライフサイクルのイベント
//!
//! 遷移表（`lifecycle::transitions`）のキーとして使われます。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameEvent {
    SubmitForReview,
    Approve,
    Reject,
    PreRegister,
    PublishNow,
    AutoPublish,
    CancelPreRegister,
    UnpublishNow,
    UpdateInfo,
    UpdateVersion,
}

impl GameEvent {
    pub const ALL: [GameEvent; 10] = [
        GameEvent::SubmitForReview,
        GameEvent::Approve,
        GameEvent::Reject,
        GameEvent::PreRegister,
        GameEvent::PublishNow,
        GameEvent::AutoPublish,
        GameEvent::CancelPreRegister,
        GameEvent::UnpublishNow,
        GameEvent::UpdateInfo,
        GameEvent::UpdateVersion,
    ];
}

impl fmt::Display for GameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// イベントに付随するデータ
///
/// PreRegister だけが公開予定時刻を必要とします。
/// UnpublishNow は運用者の理由をログに残すために受け取ります。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventData {
    pub publish_time: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

impl EventData {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn publish_at(at: DateTime<Utc>) -> Self {
        Self {
            publish_time: Some(at),
            reason: None,
        }
    }

    pub fn with_reason(reason: impl Into<String>) -> Self {
        Self {
            publish_time: None,
            reason: Some(reason.into()),
        }
    }
}
