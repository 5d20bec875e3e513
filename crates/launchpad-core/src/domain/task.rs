//! Task record: 永続タスクの 1 行。
//!
//! Design:
//! - ストアが single source of truth。ワーカーはここにある version で CAS する
//! - 状態遷移はすべてこの型のメソッドで行う（ストア実装はロックと条件判定だけ）

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{TaskId, TaskStatus, TaskType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    /// 呼び出し側のキー（dedupe / キャンセル用）
    pub custom_id: Option<String>,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub retry_count: u32,
    /// handler 固有の payload（JSON bytes）
    pub content: Vec<u8>,
    pub version: i64,
    /// この時刻以降に claim 可能
    pub next_retry_time: DateTime<Utc>,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

impl TaskRecord {
    pub fn from_new(id: TaskId, task: NewTask, now: DateTime<Utc>) -> Self {
        Self {
            id,
            custom_id: task.custom_id,
            task_type: task.task_type,
            status: TaskStatus::Pending,
            retry_count: 0,
            content: task.content,
            version: 0,
            next_retry_time: task.next_retry_time,
            create_time: now,
            update_time: now,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == TaskStatus::Pending && self.next_retry_time <= now
    }

    /// Pending → Processing
    pub fn claim(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::Processing;
        self.version += 1;
        self.update_time = now;
    }

    /// Write-back of a handler result.
    pub fn apply(&mut self, update: &TaskUpdate, now: DateTime<Utc>) {
        match *update {
            TaskUpdate::Succeeded => {
                self.status = TaskStatus::Success;
                self.version += 1;
            }
            TaskUpdate::Reschedule {
                retry_count,
                next_retry_time,
            } => {
                // version は claim 時点の値のまま
                self.status = TaskStatus::Pending;
                self.retry_count = retry_count;
                self.next_retry_time = next_retry_time;
            }
        }
        self.update_time = now;
    }

    /// Processing のまま放置されたタスクを Pending に戻す
    pub fn reset_stale(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::Pending;
        self.version += 1;
        self.update_time = now;
    }

    pub fn is_stale(&self, stale_before: DateTime<Utc>) -> bool {
        self.status == TaskStatus::Processing && self.update_time < stale_before
    }
}

/// まだ ID が振られていない挿入予定のタスク
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub custom_id: Option<String>,
    pub task_type: TaskType,
    pub content: Vec<u8>,
    pub next_retry_time: DateTime<Utc>,
}

/// ワーカーの書き戻し内容
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskUpdate {
    /// Processing → Success, version+1
    Succeeded,
    /// Processing → Pending, version unchanged
    Reschedule {
        retry_count: u32,
        next_retry_time: DateTime<Utc>,
    },
}
