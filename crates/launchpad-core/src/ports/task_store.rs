//! TaskStore port - 永続タスクテーブル
//!
//! # 設計原則
//! - Pending → Processing は `claim_due` の version CAS だけが行う（二重 claim しない）
//! - 書き戻しは claim で得た version を期待値にした CAS
//! - 挿入と削除はビジネス側の書き込みと同じトランザクションで行うため、
//!   `Transaction`（ports::transaction）に積んで `UnitOfWork::commit` で適用する

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::app::status::TaskCounts;
use crate::domain::{StoreError, TaskId, TaskRecord, TaskType, TaskUpdate};

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// `task_type` の中で next_retry_time が最も古い due タスクを claim する
    ///
    /// - due が無ければ `Ok(None)`
    /// - 候補を読んだ後に他者が先に claim した場合は `StoreError::VersionConflict`
    async fn claim_due(
        &self,
        task_type: TaskType,
        now: DateTime<Utc>,
    ) -> Result<Option<TaskRecord>, StoreError>;

    /// due かどうかに関係なく、next_retry_time が最小の Pending タスク
    async fn peek_min_next_retry(
        &self,
        task_type: TaskType,
    ) -> Result<Option<TaskRecord>, StoreError>;

    /// claim したワーカーの書き戻し（version 不一致なら `VersionConflict`）
    async fn complete_or_reschedule(
        &self,
        id: TaskId,
        expected_version: i64,
        update: TaskUpdate,
    ) -> Result<(), StoreError>;

    /// update_time が `stale_before` より古い Processing タスクを Pending に戻す
    ///
    /// 戻した件数を返す。
    async fn reset_stale_processing(&self, stale_before: DateTime<Utc>) -> Result<u64, StoreError>;

    async fn get_task(&self, id: TaskId) -> Result<Option<TaskRecord>, StoreError>;

    async fn list_tasks(&self, task_type: TaskType) -> Result<Vec<TaskRecord>, StoreError>;

    async fn counts_by_status(&self) -> Result<TaskCounts, StoreError>;
}
