//! Task trait - 型付き payload と TaskType の対応付け
//!
//! # 学習ポイント
//! - Associated Constants (`const TYPE`)
//! - Trait bounds の組み合わせ (Serialize + DeserializeOwned + Send + Sync + 'static)

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::TaskType;

/// Task は payload 型と TaskType を対応付ける
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct AutoPublishTask {
///     game_id: GameId,
///     publish_time: DateTime<Utc>,
/// }
///
/// impl Task for AutoPublishTask {
///     const TYPE: TaskType = TaskType::GameAutoPublish;
/// }
/// ```
///
/// ストア上の content は PayloadCodec で bytes に変換されます。
pub trait Task: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TYPE: TaskType;
}
