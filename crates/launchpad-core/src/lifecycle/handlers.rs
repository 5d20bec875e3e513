//! ライフサイクルのタスク handler
//!
//! - **AutoPublishHandler**: 予約公開時刻になったゲームを Published に進める
//! - **NotifyReservedUsersHandler**: 公開されたゲームの予約ユーザーに通知する
//!
//! どちらも at-least-once で呼ばれる前提。重複配信や古いタスクは成功扱いで捨てる。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::config::LifecycleConfig;
use super::error::LifecycleError;
use super::machine::GameLifecycle;
use crate::app::{EngineError, TaskEngine};
use crate::domain::{
    EventData, GameEvent, GameId, GameStatus, StoreError, TaskRecord, TaskType,
};
use crate::ports::{GameStore, NotificationSink, ReservationDirectory};
use crate::typed::{Handler, HandlerError, Task};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoPublishTask {
    pub game_id: GameId,
    pub publish_time: DateTime<Utc>,
}

impl Task for AutoPublishTask {
    const TYPE: TaskType = TaskType::GameAutoPublish;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyReservedUsersTask {
    pub game_id: GameId,
}

impl Task for NotifyReservedUsersTask {
    const TYPE: TaskType = TaskType::GameNotifyReservedUsers;
}

pub struct AutoPublishHandler {
    lifecycle: Arc<GameLifecycle>,
}

impl AutoPublishHandler {
    pub fn new(lifecycle: Arc<GameLifecycle>) -> Self {
        Self { lifecycle }
    }
}

#[async_trait]
impl Handler<AutoPublishTask> for AutoPublishHandler {
    async fn handle(&self, task: AutoPublishTask, record: &TaskRecord) -> Result<(), HandlerError> {
        let game = match self.lifecycle.current(task.game_id).await {
            Ok(game) => game,
            Err(LifecycleError::GameNotFound(game_id)) => {
                warn!(task_id = %record.id, %game_id, "game no longer exists; auto-publish dropped");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if game.status == GameStatus::Published {
            debug!(task_id = %record.id, game_id = %game.id, "game already published; duplicate delivery");
            return Ok(());
        }
        if game.status != GameStatus::PreRegister || game.publish_time != Some(task.publish_time) {
            info!(
                task_id = %record.id,
                game_id = %game.id,
                status = %game.status,
                scheduled_for = %task.publish_time,
                "auto-publish task is stale; skipped"
            );
            return Ok(());
        }

        self.lifecycle
            .apply(&game, GameEvent::AutoPublish, &EventData::none())
            .await?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct PushBody<'a> {
    user_ids: Vec<String>,
    content: PushContent<'a>,
}

#[derive(Debug, Serialize)]
struct PushContent<'a> {
    title: &'a str,
    game_id: GameId,
    game_name: &'a str,
    message: String,
}

pub struct NotifyReservedUsersHandler {
    games: Arc<dyn GameStore>,
    reservations: Arc<dyn ReservationDirectory>,
    sink: Arc<dyn NotificationSink>,
    config: LifecycleConfig,
}

impl NotifyReservedUsersHandler {
    pub fn new(
        games: Arc<dyn GameStore>,
        reservations: Arc<dyn ReservationDirectory>,
        sink: Arc<dyn NotificationSink>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            games,
            reservations,
            sink,
            config,
        }
    }
}

#[async_trait]
impl Handler<NotifyReservedUsersTask> for NotifyReservedUsersHandler {
    async fn handle(
        &self,
        task: NotifyReservedUsersTask,
        record: &TaskRecord,
    ) -> Result<(), HandlerError> {
        let game = match self.games.get_by_id(task.game_id).await {
            Ok(game) => game,
            Err(StoreError::NotFound { .. }) => {
                warn!(task_id = %record.id, game_id = %task.game_id, "game no longer exists; notification dropped");
                return Ok(());
            }
            Err(e) => return Err(HandlerError::failed(e)),
        };
        let users = self
            .reservations
            .reserved_user_ids(task.game_id)
            .await
            .map_err(HandlerError::failed)?;
        if users.is_empty() {
            debug!(task_id = %record.id, game_id = %game.id, "no reserved users to notify");
            return Ok(());
        }

        let body = PushBody {
            user_ids: users.iter().map(|u| u.value().to_string()).collect(),
            content: PushContent {
                title: "Game released",
                game_id: game.id,
                game_name: &game.name,
                message: format!("{} is now available. Sign in to start playing.", game.name),
            },
        };
        let payload = serde_json::to_value(&body).map_err(HandlerError::failed)?;
        self.sink
            .publish(&self.config.notify_topic, payload)
            .await
            .map_err(HandlerError::failed)?;

        info!(
            task_id = %record.id,
            game_id = %game.id,
            users = users.len(),
            topic = %self.config.notify_topic,
            "reserved users notified"
        );
        Ok(())
    }
}

/// 両方の handler を登録し、起動時に揃っていることを要求する
pub fn register_handlers(
    engine: &TaskEngine,
    lifecycle: Arc<GameLifecycle>,
    notifier: NotifyReservedUsersHandler,
) -> Result<(), EngineError> {
    engine.register::<AutoPublishTask, _>(AutoPublishHandler::new(lifecycle))?;
    engine.register::<NotifyReservedUsersTask, _>(notifier)?;
    engine.expect_task_types(&TaskType::ALL);
    Ok(())
}
