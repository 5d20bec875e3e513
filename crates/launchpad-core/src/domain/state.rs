//! State - タスクとゲームの状態
//!
//! どちらも整数コードで永続化されます。

use serde::{Deserialize, Serialize};
use std::fmt;

/// TaskStatus は永続タスクの状態
///
/// # 状態遷移
/// - Pending → Processing: claim（version CAS、version+1）
/// - Processing → Success: handler 成功（version+1）
/// - Processing → Pending: handler 失敗（retry_count+1、backoff 後に再実行）
/// - Processing → Pending: タイムアウト回収（version+1）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum TaskStatus {
    Pending,
    Processing,
    Success,
}

impl TaskStatus {
    pub fn code(self) -> i32 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::Processing => 1,
            TaskStatus::Success => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Success)
    }
}

/// GameStatus はゲーム公開ライフサイクルの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum GameStatus {
    Init,
    InReview,
    Approved,
    PreRegister,
    Published,
    Unpublished,
}

impl GameStatus {
    pub const ALL: [GameStatus; 6] = [
        GameStatus::Init,
        GameStatus::InReview,
        GameStatus::Approved,
        GameStatus::PreRegister,
        GameStatus::Published,
        GameStatus::Unpublished,
    ];

    pub fn code(self) -> i32 {
        match self {
            GameStatus::Init => 0,
            GameStatus::InReview => 1,
            GameStatus::Approved => 2,
            GameStatus::PreRegister => 3,
            GameStatus::Published => 4,
            GameStatus::Unpublished => 5,
        }
    }
}

/// 未知の状態コード
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {entity} status code: {code}")]
pub struct UnknownStatus {
    pub entity: &'static str,
    pub code: i32,
}

impl TryFrom<i32> for TaskStatus {
    type Error = UnknownStatus;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(TaskStatus::Pending),
            1 => Ok(TaskStatus::Processing),
            2 => Ok(TaskStatus::Success),
            code => Err(UnknownStatus {
                entity: "task",
                code,
            }),
        }
    }
}

impl From<TaskStatus> for i32 {
    fn from(status: TaskStatus) -> Self {
        status.code()
    }
}

impl TryFrom<i32> for GameStatus {
    type Error = UnknownStatus;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        GameStatus::ALL
            .into_iter()
            .find(|s| s.code() == code)
            .ok_or(UnknownStatus {
                entity: "game",
                code,
            })
    }
}

impl From<GameStatus> for i32 {
    fn from(status: GameStatus) -> Self {
        status.code()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
