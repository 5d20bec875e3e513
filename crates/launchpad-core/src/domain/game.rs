//! Game record と付随するカタログ情報。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{GameId, GameStatus};

/// 配信形態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistributeType {
    /// APK ファイル配布
    Apk,
    /// H5 リンク
    H5Link,
}

/// ゲームに紐づくメディア素材の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    Icon,
    Screenshot,
    Video,
    ApkFile,
    H5Link,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub id: GameId,
    pub name: String,
    pub developer: String,
    pub publisher: String,
    pub distribute_type: DistributeType,
    pub status: GameStatus,
    pub version: i64,
    pub publish_time: Option<DateTime<Utc>>,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

impl GameRecord {
    pub fn from_new(id: GameId, game: NewGame, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: game.name,
            developer: game.developer,
            publisher: game.publisher,
            distribute_type: game.distribute_type,
            status: GameStatus::Init,
            version: 0,
            publish_time: None,
            create_time: now,
            update_time: now,
        }
    }

    /// version-guarded write の適用（呼び出し側で version を照合済み）
    pub fn apply(&mut self, patch: &GamePatch, now: DateTime<Utc>) {
        self.status = patch.status;
        if let Some(publish_time) = patch.publish_time {
            self.publish_time = Some(publish_time);
        }
        self.version += 1;
        self.update_time = now;
    }
}

/// 新規登録するゲーム（常に Init から始まる）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGame {
    pub name: String,
    pub developer: String,
    pub publisher: String,
    pub distribute_type: DistributeType,
}

/// 状態遷移で書き込む内容
///
/// `publish_time` が None なら既存値を保持する。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GamePatch {
    pub status: GameStatus,
    pub publish_time: Option<DateTime<Utc>>,
}

impl GamePatch {
    pub fn status(status: GameStatus) -> Self {
        Self {
            status,
            publish_time: None,
        }
    }

    pub fn with_publish_time(mut self, at: DateTime<Utc>) -> Self {
        self.publish_time = Some(at);
        self
    }
}
