//! Lifecycle - ゲーム公開のステートマシン
//!
//! 状態遷移は `transitions::TRANSITIONS` の表だけで決まります。
//! 予約公開と予約ユーザー通知は TaskEngine のタスクとして実行され、
//! タスクの登録・削除はゲームの更新と同じトランザクションでコミットされます。
//!
//! # 主要コンポーネント
//! - **GameLifecycle**: handle_event と各イベントの入口
//! - **AutoPublishHandler** / **NotifyReservedUsersHandler**: タスク handler
//! - **LifecycleConfig**: 通知先 topic

pub mod config;
pub mod error;
pub mod guards;
pub mod handlers;
pub mod machine;
pub mod transitions;

pub use self::config::LifecycleConfig;
pub use self::error::LifecycleError;
pub use self::handlers::{
    AutoPublishHandler, AutoPublishTask, NotifyReservedUsersHandler, NotifyReservedUsersTask,
    register_handlers,
};
pub use self::machine::{GameLifecycle, auto_publish_custom_id, notify_reserved_users_custom_id};
pub use self::transitions::{Transition, TransitionAction};
