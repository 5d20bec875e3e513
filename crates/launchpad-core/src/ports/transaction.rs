//! Transaction / UnitOfWork - 複数の書き込みをまとめて原子的に適用する
//!
//! ライフサイクルの遷移とタスクの挿入・削除は同じトランザクションで
//! コミットされなければなりません。ここでは書き込み集合（write set）を
//! 値として組み立て、`UnitOfWork::commit` が all-or-nothing で適用します。
//!
//! # 使用例
//! ```ignore
//! let mut tx = Transaction::new();
//! tx.update_game(game.id, game.version, GamePatch::status(GameStatus::PreRegister));
//! engine.schedule(&mut tx, Some(custom_id), &payload, publish_time)?;
//! uow.commit(tx).await?;
//! ```

use async_trait::async_trait;

use crate::domain::{GameId, GamePatch, NewTask, StoreError, TaskId, TaskStatus, TaskType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOp {
    InsertTask(NewTask),
    /// 0 行ならトランザクション全体が `VersionConflict` で失敗
    UpdateGame {
        id: GameId,
        expected_version: i64,
        patch: GamePatch,
    },
    DeleteTasksByCustomId {
        custom_id: String,
        task_type: TaskType,
        status: TaskStatus,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    ops: Vec<TxOp>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_task(&mut self, task: NewTask) {
        self.ops.push(TxOp::InsertTask(task));
    }

    pub fn update_game(&mut self, id: GameId, expected_version: i64, patch: GamePatch) {
        self.ops.push(TxOp::UpdateGame {
            id,
            expected_version,
            patch,
        });
    }

    pub fn delete_tasks_by_custom_id(
        &mut self,
        custom_id: impl Into<String>,
        task_type: TaskType,
        status: TaskStatus,
    ) {
        self.ops.push(TxOp::DeleteTasksByCustomId {
            custom_id: custom_id.into(),
            task_type,
            status,
        });
    }

    pub fn ops(&self) -> &[TxOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<TxOp> {
        self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// コミット結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub inserted: Vec<TaskId>,
    pub deleted: u64,
}

#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn commit(&self, tx: Transaction) -> Result<CommitReport, StoreError>;
}
