//! LifecycleError - 状態遷移のエラー

use chrono::{DateTime, Utc};

use crate::app::EngineError;
use crate::domain::{ErrorKind, GameEvent, GameId, GameStatus, MediaKind, StoreError};
use crate::typed::HandlerError;

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("game {0} not found")]
    GameNotFound(GameId),

    #[error("event {event} is not allowed in status {from}")]
    IllegalTransition { from: GameStatus, event: GameEvent },

    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("missing required media: {0:?}")]
    MissingMedia(Vec<MediaKind>),

    #[error("a publish time is required to pre-register")]
    MissingPublishTime,

    #[error("publish time {publish_time} is not after {now}")]
    PublishTimeNotInFuture {
        publish_time: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    /// version 付き書き込みが 0 行。読み直してから呼び出し側が判断する
    #[error("game {game_id} was modified concurrently (expected version {expected_version})")]
    ConcurrentModification {
        game_id: GameId,
        expected_version: i64,
    },

    #[error(transparent)]
    Store(StoreError),

    #[error("failed to stage follow-up task: {0}")]
    Enqueue(#[from] EngineError),
}

impl LifecycleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LifecycleError::GameNotFound(_)
            | LifecycleError::IllegalTransition { .. }
            | LifecycleError::MissingFields(_)
            | LifecycleError::MissingMedia(_)
            | LifecycleError::MissingPublishTime
            | LifecycleError::PublishTimeNotInFuture { .. } => ErrorKind::Validation,
            LifecycleError::ConcurrentModification { .. } => ErrorKind::Concurrency,
            LifecycleError::Store(e) => e.kind(),
            LifecycleError::Enqueue(e) => e.kind(),
        }
    }
}

impl From<LifecycleError> for HandlerError {
    fn from(err: LifecycleError) -> Self {
        HandlerError::failed(err)
    }
}
