//! Handler trait - Task を実行する Handler の定義
//!
//! # 学習ポイント
//! - ジェネリック trait (Handler<T>)
//! - Object-safe trait (DynHandler)
//! - Type erasure パターン (TypedHandler<T, H> → DynHandler)

use super::codec::{CodecError, PayloadCodec};
use super::task::Task;
use crate::domain::{ErrorKind, TaskRecord, TaskType};
use async_trait::async_trait;
use std::error::Error;
use std::marker::PhantomData;

/// HandlerError は handler の失敗
///
/// どの variant でもワーカーは backoff 付きで再スケジュールします。
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    Decode(#[from] CodecError),

    #[error("{0}")]
    Failed(#[source] Box<dyn Error + Send + Sync>),
}

impl HandlerError {
    pub fn failed(err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        HandlerError::Failed(err.into())
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Handler
    }
}

/// Handler は decode 済みの Task を実行する
///
/// ```ignore
/// struct AutoPublishHandler { /* ... */ }
///
/// #[async_trait]
/// impl Handler<AutoPublishTask> for AutoPublishHandler {
///     async fn handle(&self, task: AutoPublishTask, record: &TaskRecord) -> Result<(), HandlerError> {
///         // ...
///         Ok(())
///     }
/// }
/// ```
///
/// `record` は claim されたタスクの行（id, retry_count などをログに使う）。
#[async_trait]
pub trait Handler<T: Task>: Send + Sync {
    async fn handle(&self, task: T, record: &TaskRecord) -> Result<(), HandlerError>;
}

/// DynHandler は object-safe な Handler の抽象化
///
/// ワーカーは TaskType ごとに `Arc<dyn DynHandler>` をひとつ持ちます。
#[async_trait]
pub trait DynHandler: Send + Sync {
    async fn handle_dyn(&self, record: &TaskRecord) -> Result<(), HandlerError>;
    fn task_type(&self) -> TaskType;
}

pub struct TypedHandler<T: Task, H: Handler<T>> {
    handler: H,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Task, H: Handler<T>> TypedHandler<T, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Task, H: Handler<T>> DynHandler for TypedHandler<T, H> {
    async fn handle_dyn(&self, record: &TaskRecord) -> Result<(), HandlerError> {
        let task: T = PayloadCodec::decode(&record.content)?;
        self.handler.handle(task, record).await
    }

    fn task_type(&self) -> TaskType {
        T::TYPE
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::typed::task::fixtures::{OtherSampleTask, SampleTask};
    use std::sync::atomic::{AtomicU32, Ordering};

    pub struct SampleHandler;

    #[async_trait]
    impl Handler<SampleTask> for SampleHandler {
        async fn handle(&self, _task: SampleTask, _record: &TaskRecord) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    pub struct OtherSampleHandler;

    #[async_trait]
    impl Handler<OtherSampleTask> for OtherSampleHandler {
        async fn handle(
            &self,
            _task: OtherSampleTask,
            _record: &TaskRecord,
        ) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    /// 最初の `n` 回は失敗する
    pub struct FlakyHandler {
        remaining_failures: AtomicU32,
    }

    impl FlakyHandler {
        pub fn new(n: u32) -> Self {
            Self {
                remaining_failures: AtomicU32::new(n),
            }
        }
    }

    #[async_trait]
    impl Handler<SampleTask> for FlakyHandler {
        async fn handle(&self, task: SampleTask, _record: &TaskRecord) -> Result<(), HandlerError> {
            let failed = self
                .remaining_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if failed {
                return Err(HandlerError::failed(format!(
                    "intentional failure for value {}",
                    task.value
                )));
            }
            Ok(())
        }
    }

    pub struct PanickingHandler;

    #[async_trait]
    impl Handler<SampleTask> for PanickingHandler {
        async fn handle(&self, task: SampleTask, _record: &TaskRecord) -> Result<(), HandlerError> {
            panic!("sample handler exploded on value {}", task.value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::SampleHandler;
    use super::*;
    use crate::domain::{NewTask, TaskId};
    use crate::typed::task::fixtures::SampleTask;
    use chrono::Utc;

    fn record_with(content: &[u8]) -> TaskRecord {
        TaskRecord::from_new(
            TaskId::new(1),
            NewTask {
                custom_id: None,
                task_type: TaskType::GameAutoPublish,
                content: content.to_vec(),
                next_retry_time: Utc::now(),
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn typed_handler_decodes_and_dispatches() {
        let typed_handler = TypedHandler::<SampleTask, _>::new(SampleHandler);
        assert_eq!(typed_handler.task_type(), TaskType::GameAutoPublish);

        typed_handler
            .handle_dyn(&record_with(br#"{"value":100}"#))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn malformed_content_is_a_decode_error() {
        let typed_handler = TypedHandler::<SampleTask, _>::new(SampleHandler);
        let err = typed_handler
            .handle_dyn(&record_with(b"not json"))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Decode(_)));
    }
}
