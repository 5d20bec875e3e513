//! App - タスクエンジン
//!
//! ports を組み合わせてタスクの実行基盤を実装します。
//!
//! # 主要コンポーネント
//! - **TaskEngine**: handler 登録、起動、タスク投入、wake-up
//! - **WorkerLoop**: TaskType ごとの claim → handle → 書き戻しループ
//! - **ReaperLoop**: Processing のまま止まったタスクの回収
//! - **WorkerGroup**: 起動したループの停止と join
//! - **RetryPolicy** / **EngineConfig**: backoff とタイミング設定

pub mod config;
pub mod engine;
pub mod reaper_loop;
pub mod retry;
pub mod status;
mod time;
pub mod worker_group;
pub mod worker_loop;

pub use self::config::{ConfigError, EngineConfig};
pub use self::engine::{EngineError, TaskEngine};
pub use self::reaper_loop::ReaperLoop;
pub use self::retry::RetryPolicy;
pub use self::status::TaskCounts;
pub use self::worker_group::WorkerGroup;
pub use self::worker_loop::{TickOutcome, WorkerLoop};
