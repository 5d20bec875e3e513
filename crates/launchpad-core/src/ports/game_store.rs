//! GameStore port - ゲームテーブルと付随情報の読み書き

use async_trait::async_trait;

use crate::domain::{GameId, GamePatch, GameRecord, MediaKind, StoreError, UserId};

#[async_trait]
pub trait GameStore: Send + Sync {
    /// 見つからなければ `StoreError::NotFound`
    async fn get_by_id(&self, id: GameId) -> Result<GameRecord, StoreError>;

    /// `version == expected_version` のときだけ patch を適用し version+1
    ///
    /// 影響行数（0 または 1）を返す。0 の解釈は呼び出し側が決める。
    async fn update_with_version(
        &self,
        id: GameId,
        expected_version: i64,
        patch: GamePatch,
    ) -> Result<u64, StoreError>;

    /// 審査提出時のメディアチェック用
    async fn media_kinds(&self, id: GameId) -> Result<Vec<MediaKind>, StoreError>;
}

/// 予約（事前登録）ユーザーの参照
#[async_trait]
pub trait ReservationDirectory: Send + Sync {
    async fn reserved_user_ids(&self, game_id: GameId) -> Result<Vec<UserId>, StoreError>;
}
