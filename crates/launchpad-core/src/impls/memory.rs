//! InMemoryStore - 開発用・テスト用のストア実装
//!
//! TaskStore / GameStore / ReservationDirectory / UnitOfWork をひとつの状態で実装します。
//!
//! # 実装詳細
//! - `Arc<tokio::sync::Mutex<StoreState>>` で排他制御（Clone しても同じ状態を共有）
//! - `claim_due` は SQL 実装と同じく「候補の SELECT → version CAS の UPDATE」の二段階。
//!   間に他のワーカーが割り込めば CAS が失敗して `VersionConflict` になる
//! - `commit` は状態のコピーに ops を順に適用し、全部成功したときだけ差し替える
//! - `set_offline(true)` で全操作を `StoreError::Unavailable` にできる（障害注入）

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::app::status::TaskCounts;
use crate::domain::{
    GameId, GamePatch, GameRecord, MediaKind, NewGame, StoreError, TaskId, TaskRecord,
    TaskStatus, TaskType, TaskUpdate, UserId,
};
use crate::ports::{
    Clock, CommitReport, GameStore, ReservationDirectory, TaskStore, Transaction, TxOp,
    UnitOfWork,
};

#[derive(Debug, Clone)]
struct StoreState {
    tasks: BTreeMap<TaskId, TaskRecord>,
    games: BTreeMap<GameId, GameRecord>,
    media: HashMap<GameId, Vec<MediaKind>>,
    reservations: HashMap<GameId, Vec<UserId>>,
    next_task_id: i64,
    next_game_id: i64,
}

impl StoreState {
    fn new() -> Self {
        Self {
            tasks: BTreeMap::new(),
            games: BTreeMap::new(),
            media: HashMap::new(),
            reservations: HashMap::new(),
            next_task_id: 1,
            next_game_id: 1,
        }
    }

    fn allocate_task_id(&mut self) -> TaskId {
        let id = TaskId::new(self.next_task_id);
        self.next_task_id += 1;
        id
    }

    fn allocate_game_id(&mut self) -> GameId {
        let id = GameId::new(self.next_game_id);
        self.next_game_id += 1;
        id
    }

    fn apply_op(
        &mut self,
        op: TxOp,
        now: DateTime<Utc>,
        report: &mut CommitReport,
    ) -> Result<(), StoreError> {
        match op {
            TxOp::InsertTask(task) => {
                let id = self.allocate_task_id();
                self.tasks.insert(id, TaskRecord::from_new(id, task, now));
                report.inserted.push(id);
            }
            TxOp::UpdateGame {
                id,
                expected_version,
                patch,
            } => {
                let game = self.games.get_mut(&id).ok_or(StoreError::NotFound {
                    entity: "game",
                    id: id.value(),
                })?;
                if game.version != expected_version {
                    return Err(StoreError::VersionConflict {
                        entity: "game",
                        id: id.value(),
                        expected: expected_version,
                    });
                }
                game.apply(&patch, now);
            }
            TxOp::DeleteTasksByCustomId {
                custom_id,
                task_type,
                status,
            } => {
                let before = self.tasks.len();
                self.tasks.retain(|_, t| {
                    !(t.custom_id.as_deref() == Some(custom_id.as_str())
                        && t.task_type == task_type
                        && t.status == status)
                });
                report.deleted += (before - self.tasks.len()) as u64;
            }
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
    clock: Arc<dyn Clock>,
    offline: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState::new())),
            clock,
            offline: Arc::new(AtomicBool::new(false)),
        }
    }

    /// true の間、すべての操作が `StoreError::Unavailable` を返す
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store is offline".into()));
        }
        Ok(())
    }

    // ========================================
    // シード用（ports には含まれない）
    // ========================================

    pub async fn insert_game(&self, game: NewGame) -> GameRecord {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let id = state.allocate_game_id();
        let record = GameRecord::from_new(id, game, now);
        state.games.insert(id, record.clone());
        record
    }

    pub async fn attach_media(&self, game_id: GameId, kinds: &[MediaKind]) {
        let mut state = self.state.lock().await;
        state.media.entry(game_id).or_default().extend_from_slice(kinds);
    }

    pub async fn add_reservations(&self, game_id: GameId, users: &[UserId]) {
        let mut state = self.state.lock().await;
        state
            .reservations
            .entry(game_id)
            .or_default()
            .extend_from_slice(users);
    }
}

#[async_trait]
impl TaskStore for InMemoryStore {
    async fn claim_due(
        &self,
        task_type: TaskType,
        now: DateTime<Utc>,
    ) -> Result<Option<TaskRecord>, StoreError> {
        self.ensure_online()?;

        let candidate = {
            let state = self.state.lock().await;
            state
                .tasks
                .values()
                .filter(|t| t.task_type == task_type && t.is_due(now))
                .min_by_key(|t| (t.next_retry_time, t.id))
                .map(|t| (t.id, t.version))
        };
        let Some((id, seen_version)) = candidate else {
            return Ok(None);
        };

        let mut state = self.state.lock().await;
        match state.tasks.get_mut(&id) {
            Some(record)
                if record.version == seen_version && record.status == TaskStatus::Pending =>
            {
                record.claim(now);
                Ok(Some(record.clone()))
            }
            _ => Err(StoreError::VersionConflict {
                entity: "task",
                id: id.value(),
                expected: seen_version,
            }),
        }
    }

    async fn peek_min_next_retry(
        &self,
        task_type: TaskType,
    ) -> Result<Option<TaskRecord>, StoreError> {
        self.ensure_online()?;
        let state = self.state.lock().await;
        Ok(state
            .tasks
            .values()
            .filter(|t| t.task_type == task_type && t.status == TaskStatus::Pending)
            .min_by_key(|t| (t.next_retry_time, t.id))
            .cloned())
    }

    async fn complete_or_reschedule(
        &self,
        id: TaskId,
        expected_version: i64,
        update: TaskUpdate,
    ) -> Result<(), StoreError> {
        self.ensure_online()?;
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        match state.tasks.get_mut(&id) {
            Some(record) if record.version == expected_version => {
                record.apply(&update, now);
                Ok(())
            }
            _ => Err(StoreError::VersionConflict {
                entity: "task",
                id: id.value(),
                expected: expected_version,
            }),
        }
    }

    async fn reset_stale_processing(&self, stale_before: DateTime<Utc>) -> Result<u64, StoreError> {
        self.ensure_online()?;
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let mut reset = 0;
        for record in state.tasks.values_mut() {
            if record.is_stale(stale_before) {
                record.reset_stale(now);
                reset += 1;
            }
        }
        Ok(reset)
    }

    async fn get_task(&self, id: TaskId) -> Result<Option<TaskRecord>, StoreError> {
        self.ensure_online()?;
        let state = self.state.lock().await;
        Ok(state.tasks.get(&id).cloned())
    }

    async fn list_tasks(&self, task_type: TaskType) -> Result<Vec<TaskRecord>, StoreError> {
        self.ensure_online()?;
        let state = self.state.lock().await;
        Ok(state
            .tasks
            .values()
            .filter(|t| t.task_type == task_type)
            .cloned()
            .collect())
    }

    async fn counts_by_status(&self) -> Result<TaskCounts, StoreError> {
        self.ensure_online()?;
        let state = self.state.lock().await;
        let mut counts = TaskCounts::default();
        for record in state.tasks.values() {
            counts.record(record.status);
        }
        Ok(counts)
    }
}

#[async_trait]
impl GameStore for InMemoryStore {
    async fn get_by_id(&self, id: GameId) -> Result<GameRecord, StoreError> {
        self.ensure_online()?;
        let state = self.state.lock().await;
        state.games.get(&id).cloned().ok_or(StoreError::NotFound {
            entity: "game",
            id: id.value(),
        })
    }

    async fn update_with_version(
        &self,
        id: GameId,
        expected_version: i64,
        patch: GamePatch,
    ) -> Result<u64, StoreError> {
        self.ensure_online()?;
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        match state.games.get_mut(&id) {
            Some(game) if game.version == expected_version => {
                game.apply(&patch, now);
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn media_kinds(&self, id: GameId) -> Result<Vec<MediaKind>, StoreError> {
        self.ensure_online()?;
        let state = self.state.lock().await;
        Ok(state.media.get(&id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl ReservationDirectory for InMemoryStore {
    async fn reserved_user_ids(&self, game_id: GameId) -> Result<Vec<UserId>, StoreError> {
        self.ensure_online()?;
        let state = self.state.lock().await;
        Ok(state
            .reservations
            .get(&game_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl UnitOfWork for InMemoryStore {
    async fn commit(&self, tx: Transaction) -> Result<CommitReport, StoreError> {
        self.ensure_online()?;
        let now = self.clock.now();
        let mut state = self.state.lock().await;

        let mut staged = state.clone();
        let mut report = CommitReport::default();
        for op in tx.into_ops() {
            staged.apply_op(op, now, &mut report)?;
        }
        *state = staged;
        Ok(report)
    }
}
