//! launchpad-core
//!
//! 永続・リトライ付きの非同期タスクエンジンと、その上に載るゲーム公開ライフサイクル。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task_type, state, events, task, game, errors）
//! - **ports**: 抽象化レイヤー（TaskStore, GameStore, UnitOfWork, NotificationSink, Clock）
//! - **app**: タスクエンジン（TaskEngine, WorkerLoop, ReaperLoop, RetryPolicy, EngineConfig）
//! - **typed**: 型付き Task API（Task trait, Handler trait, TypedRegistry, PayloadCodec）
//! - **lifecycle**: ゲーム公開のステートマシンとタスク handler
//! - **impls**: 実装（InMemoryStore, RecordingSink など開発用）
//! - **observability**: tracing の初期化

pub mod app;
pub mod domain;
pub mod impls;
pub mod lifecycle;
pub mod observability;
pub mod ports;
pub mod typed;
