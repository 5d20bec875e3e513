//! Impls - ports の開発用・テスト用実装
//!
//! # 含まれる実装
//! - **InMemoryStore**: TaskStore / GameStore / ReservationDirectory / UnitOfWork
//! - **RecordingSink** / **LogSink**: NotificationSink
//!
//! 本番用のリレーショナルストアやメッセージバス実装は別クレートに置く想定です。

pub mod memory;
pub mod sink;

pub use self::memory::InMemoryStore;
pub use self::sink::{LogSink, PublishedMessage, RecordingSink};
