//! TaskType - 非同期タスクの種類
//!
//! ストア上では整数として永続化されます（1 = GameAutoPublish, 2 = GameNotifyReservedUsers）。
//! ワーカーは TaskType ごとに 1 本起動されます。

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum TaskType {
    /// 予約公開: publish_time になったら PreRegister → Published
    GameAutoPublish,
    /// 公開時に予約ユーザーへ通知
    GameNotifyReservedUsers,
}

/// 未知の整数値
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task type code: {0}")]
pub struct UnknownTaskType(pub i32);

impl TaskType {
    pub const ALL: [TaskType; 2] = [TaskType::GameAutoPublish, TaskType::GameNotifyReservedUsers];

    pub fn code(self) -> i32 {
        match self {
            TaskType::GameAutoPublish => 1,
            TaskType::GameNotifyReservedUsers => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::GameAutoPublish => "game_auto_publish",
            TaskType::GameNotifyReservedUsers => "game_notify_reserved_users",
        }
    }
}

impl TryFrom<i32> for TaskType {
    type Error = UnknownTaskType;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(TaskType::GameAutoPublish),
            2 => Ok(TaskType::GameNotifyReservedUsers),
            other => Err(UnknownTaskType(other)),
        }
    }
}

impl From<TaskType> for i32 {
    fn from(task_type: TaskType) -> Self {
        task_type.code()
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(TaskType::GameAutoPublish, 1)]
    #[case(TaskType::GameNotifyReservedUsers, 2)]
    fn codes_are_stable(#[case] task_type: TaskType, #[case] code: i32) {
        assert_eq!(task_type.code(), code);
        assert_eq!(TaskType::try_from(code), Ok(task_type));
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert_eq!(TaskType::try_from(0), Err(UnknownTaskType(0)));
        assert!(serde_json::from_str::<TaskType>("7").is_err());
    }
}
