//! Typed - 型付き Task API
//!
//! Task の payload 型と TaskType の対応を静的に保証します。
//!
//! # 二層構造
//! - **表層（Typed）**: `Task` trait, `Handler<T>` trait - 型安全
//! - **内部（Dyn）**: `DynHandler` trait - object-safe, type erasure

pub mod codec;
pub mod handler;
pub mod registry;
pub mod task;

pub use self::codec::{CodecError, PayloadCodec};
pub use self::handler::{DynHandler, Handler, HandlerError, TypedHandler};
pub use self::registry::{RegistryError, TypedRegistry};
pub use self::task::Task;
