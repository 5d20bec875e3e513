//! Ports - 抽象化レイヤー
//!
//! 各 trait は外部システム（リレーショナルストア、メッセージバス、時計）への
//! インターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - ストアが source of truth（正本）。並行制御は version CAS とトランザクションだけ
//! - メッセージバスは fire-and-forget
//! - 時刻は Clock 経由でのみ読む

pub mod clock;
pub mod game_store;
pub mod notification;
pub mod task_store;
pub mod transaction;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::game_store::{GameStore, ReservationDirectory};
pub use self::notification::{NotificationSink, NotifyError};
pub use self::task_store::TaskStore;
pub use self::transaction::{CommitReport, Transaction, TxOp, UnitOfWork};
