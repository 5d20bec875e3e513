//! GameLifecycle - 表駆動のゲーム公開ステートマシン
//!
//! # フロー（handle_event）
//! 1. ゲームを読む（status, version）
//! 2. 遷移表を引く。無ければ IllegalTransition（書き込みなし）
//! 3. アクションを実行。状態の書き込みは必ず version 付きで 1 回だけ
//!    - タスクを伴う遷移は、ゲームの更新とタスクの挿入/削除を同じトランザクションでコミット
//! 4. コミット後に該当ワーカーを wake-up
//!
//! 書き込みが 0 行なら ConcurrentModification を返し、リトライはしない。

use std::sync::Arc;

use tracing::{debug, info};

use super::error::LifecycleError;
use super::guards::check_submission;
use super::handlers::{AutoPublishTask, NotifyReservedUsersTask};
use super::transitions::{self, Transition, TransitionAction};
use crate::app::TaskEngine;
use crate::domain::{
    EventData, GameEvent, GameId, GamePatch, GameRecord, GameStatus, StoreError, TaskStatus,
    TaskType,
};
use crate::ports::{Clock, GameStore, Transaction, UnitOfWork};

/// 予約公開タスクの custom id（キャンセル・重複排除に使う）
pub fn auto_publish_custom_id(game_id: GameId) -> String {
    format!("game_auto_publish_{}", game_id.value())
}

pub fn notify_reserved_users_custom_id(game_id: GameId) -> String {
    format!("game_notify_reserved_users_{}", game_id.value())
}

pub struct GameLifecycle {
    games: Arc<dyn GameStore>,
    uow: Arc<dyn UnitOfWork>,
    engine: TaskEngine,
    clock: Arc<dyn Clock>,
}

impl GameLifecycle {
    pub fn new(
        games: Arc<dyn GameStore>,
        uow: Arc<dyn UnitOfWork>,
        engine: TaskEngine,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            games,
            uow,
            engine,
            clock,
        }
    }

    pub async fn current(&self, game_id: GameId) -> Result<GameRecord, LifecycleError> {
        self.games.get_by_id(game_id).await.map_err(|e| match e {
            StoreError::NotFound { .. } => LifecycleError::GameNotFound(game_id),
            other => LifecycleError::Store(other),
        })
    }

    /// 遷移を評価して実行する。成功時は遷移後の状態を返す
    pub async fn handle_event(
        &self,
        game_id: GameId,
        event: GameEvent,
        data: EventData,
    ) -> Result<GameStatus, LifecycleError> {
        let game = self.current(game_id).await?;
        self.apply(&game, event, &data).await
    }

    /// 読み込み済みの `game` を起点に遷移する（version は `game.version` で照合）
    pub(crate) async fn apply(
        &self,
        game: &GameRecord,
        event: GameEvent,
        data: &EventData,
    ) -> Result<GameStatus, LifecycleError> {
        let Some(transition) = transitions::lookup(game.status, event) else {
            debug!(
                game_id = %game.id,
                status = %game.status,
                %event,
                allowed = ?transitions::allowed_events(game.status),
                "illegal transition rejected"
            );
            return Err(LifecycleError::IllegalTransition {
                from: game.status,
                event,
            });
        };

        match transition.action {
            TransitionAction::None => self.write_status(game, transition).await?,
            TransitionAction::ValidateSubmission => {
                let media = self
                    .games
                    .media_kinds(game.id)
                    .await
                    .map_err(LifecycleError::Store)?;
                check_submission(game, &media)?;
                self.write_status(game, transition).await?;
            }
            TransitionAction::SchedulePublish => self.schedule_publish(game, transition, data).await?,
            TransitionAction::PublishNow => self.stage_publish(game, transition).await?,
            TransitionAction::CancelScheduledPublish => {
                self.cancel_scheduled_publish(game, transition).await?
            }
        }

        info!(
            game_id = %game.id,
            from = %transition.from,
            to = %transition.to,
            %event,
            version = game.version + 1,
            reason = data.reason.as_deref(),
            "game status changed"
        );
        Ok(transition.to)
    }

    async fn write_status(
        &self,
        game: &GameRecord,
        transition: &Transition,
    ) -> Result<(), LifecycleError> {
        let rows = self
            .games
            .update_with_version(game.id, game.version, GamePatch::status(transition.to))
            .await
            .map_err(LifecycleError::Store)?;
        if rows == 0 {
            return Err(concurrent(game));
        }
        Ok(())
    }

    async fn schedule_publish(
        &self,
        game: &GameRecord,
        transition: &Transition,
        data: &EventData,
    ) -> Result<(), LifecycleError> {
        let publish_time = data.publish_time.ok_or(LifecycleError::MissingPublishTime)?;
        let now = self.clock.now();
        if publish_time <= now {
            return Err(LifecycleError::PublishTimeNotInFuture { publish_time, now });
        }

        let custom_id = auto_publish_custom_id(game.id);
        let mut tx = Transaction::new();
        tx.update_game(
            game.id,
            game.version,
            GamePatch::status(transition.to).with_publish_time(publish_time),
        );
        // 同じゲームの未実行の予約公開は常に 1 件
        tx.delete_tasks_by_custom_id(&custom_id, TaskType::GameAutoPublish, TaskStatus::Pending);
        self.engine.schedule(
            &mut tx,
            Some(custom_id),
            &AutoPublishTask {
                game_id: game.id,
                publish_time,
            },
            publish_time,
        )?;
        self.commit(game, tx).await?;

        self.engine.wake_up(TaskType::GameAutoPublish);
        Ok(())
    }

    async fn stage_publish(
        &self,
        game: &GameRecord,
        transition: &Transition,
    ) -> Result<(), LifecycleError> {
        let now = self.clock.now();
        let mut tx = Transaction::new();
        tx.update_game(
            game.id,
            game.version,
            GamePatch::status(transition.to).with_publish_time(now),
        );
        self.engine.enqueue(
            &mut tx,
            Some(notify_reserved_users_custom_id(game.id)),
            &NotifyReservedUsersTask { game_id: game.id },
        )?;
        self.commit(game, tx).await?;

        self.engine.wake_up(TaskType::GameNotifyReservedUsers);
        Ok(())
    }

    async fn cancel_scheduled_publish(
        &self,
        game: &GameRecord,
        transition: &Transition,
    ) -> Result<(), LifecycleError> {
        let mut tx = Transaction::new();
        tx.update_game(game.id, game.version, GamePatch::status(transition.to));
        tx.delete_tasks_by_custom_id(
            auto_publish_custom_id(game.id),
            TaskType::GameAutoPublish,
            TaskStatus::Pending,
        );
        let report = self.commit(game, tx).await?;
        debug!(game_id = %game.id, deleted = report.deleted, "scheduled publish cancelled");
        Ok(())
    }

    async fn commit(
        &self,
        game: &GameRecord,
        tx: Transaction,
    ) -> Result<crate::ports::CommitReport, LifecycleError> {
        self.uow.commit(tx).await.map_err(|e| match e {
            StoreError::VersionConflict { .. } => concurrent(game),
            StoreError::NotFound { .. } => LifecycleError::GameNotFound(game.id),
            other => LifecycleError::Store(other),
        })
    }

    // ========================================
    // イベントごとの入口
    // ========================================

    pub async fn submit_for_review(&self, game_id: GameId) -> Result<GameStatus, LifecycleError> {
        self.handle_event(game_id, GameEvent::SubmitForReview, EventData::none())
            .await
    }

    pub async fn approve(&self, game_id: GameId) -> Result<GameStatus, LifecycleError> {
        self.handle_event(game_id, GameEvent::Approve, EventData::none())
            .await
    }

    pub async fn reject(&self, game_id: GameId) -> Result<GameStatus, LifecycleError> {
        self.handle_event(game_id, GameEvent::Reject, EventData::none())
            .await
    }

    pub async fn pre_register(
        &self,
        game_id: GameId,
        publish_time: chrono::DateTime<chrono::Utc>,
    ) -> Result<GameStatus, LifecycleError> {
        self.handle_event(
            game_id,
            GameEvent::PreRegister,
            EventData::publish_at(publish_time),
        )
        .await
    }

    pub async fn publish_now(&self, game_id: GameId) -> Result<GameStatus, LifecycleError> {
        self.handle_event(game_id, GameEvent::PublishNow, EventData::none())
            .await
    }

    pub async fn cancel_pre_register(&self, game_id: GameId) -> Result<GameStatus, LifecycleError> {
        self.handle_event(game_id, GameEvent::CancelPreRegister, EventData::none())
            .await
    }

    pub async fn unpublish(
        &self,
        game_id: GameId,
        reason: &str,
    ) -> Result<GameStatus, LifecycleError> {
        self.handle_event(
            game_id,
            GameEvent::UnpublishNow,
            EventData::with_reason(reason),
        )
        .await
    }

    pub async fn update_info(&self, game_id: GameId) -> Result<GameStatus, LifecycleError> {
        self.handle_event(game_id, GameEvent::UpdateInfo, EventData::none())
            .await
    }

    pub async fn update_version(&self, game_id: GameId) -> Result<GameStatus, LifecycleError> {
        self.handle_event(game_id, GameEvent::UpdateVersion, EventData::none())
            .await
    }
}

fn concurrent(game: &GameRecord) -> LifecycleError {
    LifecycleError::ConcurrentModification {
        game_id: game.id,
        expected_version: game.version,
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::app::EngineConfig;
    use crate::domain::{DistributeType, NewGame};
    use crate::impls::InMemoryStore;
    use crate::lifecycle::guards::required_media;
    use crate::ports::FixedClock;
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};

    pub fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 0).unwrap()
    }

    pub struct World {
        pub store: InMemoryStore,
        pub clock: Arc<FixedClock>,
        pub engine: TaskEngine,
        pub lifecycle: Arc<GameLifecycle>,
    }

    impl World {
        pub fn new() -> Self {
            let clock = Arc::new(FixedClock::new(t0()));
            let store = InMemoryStore::new(clock.clone());
            let engine = TaskEngine::new(
                Arc::new(store.clone()),
                clock.clone(),
                EngineConfig::default(),
            );
            let lifecycle = Arc::new(GameLifecycle::new(
                Arc::new(store.clone()),
                Arc::new(store.clone()),
                engine.clone(),
                clock.clone(),
            ));
            Self {
                store,
                clock,
                engine,
                lifecycle,
            }
        }

        /// 必須項目とメディアが揃った Init のゲーム
        pub async fn complete_game(&self) -> GameRecord {
            let game = self
                .store
                .insert_game(NewGame {
                    name: "Star Courier".into(),
                    developer: "Nightjar Studio".into(),
                    publisher: "Nightjar Publishing".into(),
                    distribute_type: DistributeType::Apk,
                })
                .await;
            self.store
                .attach_media(game.id, &required_media(DistributeType::Apk))
                .await;
            game
        }

        /// `status` まで正規のイベントで進めたゲーム
        pub async fn game_in(&self, status: GameStatus) -> GameRecord {
            let game = self.complete_game().await;
            let id = game.id;
            let lc = &self.lifecycle;
            match status {
                GameStatus::Init => {}
                GameStatus::InReview => {
                    lc.submit_for_review(id).await.unwrap();
                }
                GameStatus::Approved => {
                    lc.submit_for_review(id).await.unwrap();
                    lc.approve(id).await.unwrap();
                }
                GameStatus::PreRegister => {
                    lc.submit_for_review(id).await.unwrap();
                    lc.approve(id).await.unwrap();
                    lc.pre_register(id, self.clock.now() + TimeDelta::hours(1))
                        .await
                        .unwrap();
                }
                GameStatus::Published => {
                    lc.submit_for_review(id).await.unwrap();
                    lc.approve(id).await.unwrap();
                    lc.publish_now(id).await.unwrap();
                }
                GameStatus::Unpublished => {
                    lc.submit_for_review(id).await.unwrap();
                    lc.approve(id).await.unwrap();
                    lc.publish_now(id).await.unwrap();
                    lc.unpublish(id, "license expired").await.unwrap();
                }
            }
            lc.current(id).await.unwrap()
        }
    }
}
