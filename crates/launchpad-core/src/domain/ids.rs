//! Domain identifiers (strongly-typed IDs).
//!
//! ID はストア側で採番される数値 (i64) です。
//! Phantom type パターンで `TaskId` / `GameId` / `UserId` を型レベルで区別し、
//! 中身は同じ i64 でも混同できないようにしています。
//!
//! serde では素の数値としてシリアライズされます（`{"game_id": 42}`）。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"task-", "game-", "user-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// ```ignore
/// let game_id = GameId::new(7);
/// let task_id = TaskId::new(7);
/// // game_id と task_id は異なる型なので、混同できない
/// ```
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    value: i64,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn new(value: i64) -> Self {
        Self {
            value,
            _marker: PhantomData,
        }
    }

    /// ストア上の数値 ID
    pub fn value(&self) -> i64 {
        self.value
    }
}

impl<T: IdMarker> From<i64> for Id<T> {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.value)
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Task のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Task {}

impl IdMarker for Task {
    fn prefix() -> &'static str {
        "task-"
    }
}

/// Game のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Game {}

impl IdMarker for Game {
    fn prefix() -> &'static str {
        "game-"
    }
}

/// User のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum User {}

impl IdMarker for User {
    fn prefix() -> &'static str {
        "user-"
    }
}

/// Identifier of a persisted async task.
pub type TaskId = Id<Task>;

/// Identifier of a game in the catalog.
pub type GameId = Id<Game>;

/// Identifier of a user who reserved a game.
pub type UserId = Id<User>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display_with_prefix() {
        assert_eq!(TaskId::new(3).to_string(), "task-3");
        assert_eq!(GameId::new(42).to_string(), "game-42");
        assert_eq!(UserId::new(9).to_string(), "user-9");
    }

    #[test]
    fn ids_serialize_as_plain_numbers() {
        let json = serde_json::to_string(&GameId::new(42)).unwrap();
        assert_eq!(json, "42");

        let back: GameId = serde_json::from_str(&json).unwrap();
        assert_eq!(back.value(), 42);
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;
        assert_eq!(size_of::<TaskId>(), size_of::<i64>());
        assert_eq!(size_of::<GameId>(), size_of::<i64>());
    }
}
