//! TaskEngine - 永続・リトライ付き非同期タスクエンジン
//!
//! # 学習ポイント
//! - Clone できる handle（中身は `Arc<Inner>`）。グローバルな singleton は持たない
//! - 起動時検証（Fail-fast 設計）: 二重登録・期待 TaskType の不足はエラーで返す
//! - タスクの挿入は呼び出し側の Transaction に積む（ビジネス側の書き込みと原子的）
//!
//! # 使用例
//! ```ignore
//! let engine = TaskEngine::new(store.clone(), clock.clone(), EngineConfig::from_env()?);
//! engine.register::<AutoPublishTask, _>(AutoPublishHandler::new(lifecycle.clone()))?;
//! engine.expect_task_types(&TaskType::ALL);
//! let workers = engine.start()?;
//!
//! let mut tx = Transaction::new();
//! engine.schedule(&mut tx, Some(custom_id), &payload, publish_time)?;
//! uow.commit(tx).await?;
//! engine.wake_up(TaskType::GameAutoPublish);
//!
//! workers.shutdown_and_join().await;
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use super::config::{ConfigError, EngineConfig};
use super::reaper_loop::ReaperLoop;
use super::status::TaskCounts;
use super::worker_group::WorkerGroup;
use super::worker_loop::WorkerLoop;
use crate::domain::{ErrorKind, NewTask, StoreError, TaskType};
use crate::ports::{Clock, TaskStore, Transaction};
use crate::typed::{CodecError, Handler, PayloadCodec, RegistryError, Task, TypedRegistry};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("handler for task type '{0}' is already registered")]
    DuplicateHandler(TaskType),

    #[error("task engine has already been started")]
    AlreadyStarted,

    #[error("no handler registered for expected task types: {0:?}")]
    MissingHandlers(Vec<TaskType>),

    #[error("task content is not valid JSON: {0}")]
    InvalidContent(#[source] serde_json::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::DuplicateHandler(_)
            | EngineError::AlreadyStarted
            | EngineError::MissingHandlers(_)
            | EngineError::Config(_) => ErrorKind::Configuration,
            EngineError::InvalidContent(_) | EngineError::Codec(_) => ErrorKind::Validation,
            EngineError::Store(e) => e.kind(),
        }
    }
}

impl From<RegistryError> for EngineError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::AlreadyRegistered(task_type) => EngineError::DuplicateHandler(task_type),
        }
    }
}

struct Inner {
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    /// start() で取り出される。None なら起動済み
    registry: Mutex<Option<TypedRegistry>>,
    expected: Mutex<Vec<TaskType>>,
    wakers: RwLock<HashMap<TaskType, mpsc::Sender<()>>>,
}

#[derive(Clone)]
pub struct TaskEngine {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TaskEngine {
    pub fn new(store: Arc<dyn TaskStore>, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                clock,
                config,
                registry: Mutex::new(Some(TypedRegistry::new())),
                expected: Mutex::new(Vec::new()),
                wakers: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn is_started(&self) -> bool {
        lock(&self.inner.registry).is_none()
    }

    /// TaskType ごとに handler はひとつだけ
    pub fn register<T: Task, H: Handler<T> + 'static>(&self, handler: H) -> Result<(), EngineError> {
        let mut registry = lock(&self.inner.registry);
        let registry = registry.as_mut().ok_or(EngineError::AlreadyStarted)?;
        registry.register::<T, H>(handler)?;
        debug!(task_type = %T::TYPE, "handler registered");
        Ok(())
    }

    /// start() 時に「期待集合 ⊆ 登録済み集合」をチェックする
    pub fn expect_task_types(&self, task_types: &[TaskType]) {
        let mut expected = lock(&self.inner.expected);
        for task_type in task_types {
            if !expected.contains(task_type) {
                expected.push(*task_type);
            }
        }
    }

    /// 登録済み TaskType ごとのワーカーと回収ループを起動する
    pub fn start(&self) -> Result<WorkerGroup, EngineError> {
        self.inner.config.validate()?;

        let registry = {
            let mut slot = lock(&self.inner.registry);
            let registered = slot
                .as_ref()
                .ok_or(EngineError::AlreadyStarted)?
                .registered_types();
            let missing: Vec<TaskType> = lock(&self.inner.expected)
                .iter()
                .filter(|t| !registered.contains(t))
                .copied()
                .collect();
            if !missing.is_empty() {
                return Err(EngineError::MissingHandlers(missing));
            }
            slot.take().ok_or(EngineError::AlreadyStarted)?
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut group = WorkerGroup::new(shutdown_tx);
        let mut started = Vec::new();
        {
            let mut wakers = self
                .inner
                .wakers
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            for (task_type, handler) in registry.into_handlers() {
                let (wake_tx, wake_rx) = mpsc::channel(self.inner.config.wake_capacity);
                wakers.insert(task_type, wake_tx);

                let worker = WorkerLoop::new(
                    handler,
                    Arc::clone(&self.inner.store),
                    Arc::clone(&self.inner.clock),
                    self.inner.config.clone(),
                );
                group.push(
                    format!("worker:{task_type}"),
                    tokio::spawn(worker.run_guarded(wake_rx, shutdown_rx.clone())),
                );
                started.push(task_type);
            }
        }

        let reaper = ReaperLoop::new(
            Arc::clone(&self.inner.store),
            Arc::clone(&self.inner.clock),
            &self.inner.config,
        );
        group.push("timeout-recovery", tokio::spawn(reaper.run(shutdown_rx)));

        info!(task_types = ?started, "task engine started");
        Ok(group)
    }

    /// すぐに実行可能な Pending タスクを `tx` に積む
    pub fn add_task(
        &self,
        tx: &mut Transaction,
        task_type: TaskType,
        custom_id: Option<String>,
        content: Vec<u8>,
    ) -> Result<(), EngineError> {
        let now = self.inner.clock.now();
        self.add_scheduled_task(tx, task_type, custom_id, content, now)
    }

    /// `when` 以降に実行可能な Pending タスクを `tx` に積む
    pub fn add_scheduled_task(
        &self,
        tx: &mut Transaction,
        task_type: TaskType,
        custom_id: Option<String>,
        content: Vec<u8>,
        when: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        serde_json::from_slice::<serde::de::IgnoredAny>(&content)
            .map_err(EngineError::InvalidContent)?;
        debug!(%task_type, custom_id = ?custom_id, next_retry_time = %when, "task staged");
        tx.insert_task(NewTask {
            custom_id,
            task_type,
            content,
            next_retry_time: when,
        });
        Ok(())
    }

    pub fn enqueue<T: Task>(
        &self,
        tx: &mut Transaction,
        custom_id: Option<String>,
        task: &T,
    ) -> Result<(), EngineError> {
        let content = PayloadCodec::encode(task)?;
        self.add_task(tx, T::TYPE, custom_id, content)
    }

    pub fn schedule<T: Task>(
        &self,
        tx: &mut Transaction,
        custom_id: Option<String>,
        task: &T,
        when: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let content = PayloadCodec::encode(task)?;
        self.add_scheduled_task(tx, T::TYPE, custom_id, content, when)
    }

    /// ワーカーへのヒント。ブロックせず、満杯なら捨てる
    pub fn wake_up(&self, task_type: TaskType) {
        let wakers = self
            .inner
            .wakers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(wake_tx) = wakers.get(&task_type) else {
            if self.is_started() {
                error!(%task_type, "no worker for task type; wake-up dropped");
            } else {
                debug!(%task_type, "task engine not started; wake-up dropped");
            }
            return;
        };
        match wake_tx.try_send(()) {
            Ok(()) => {}
            Err(TrySendError::Full(())) => {
                debug!(%task_type, "wake-up mailbox full; hint dropped");
            }
            Err(TrySendError::Closed(())) => {
                warn!(%task_type, "worker has stopped; wake-up dropped");
            }
        }
    }

    pub async fn counts(&self) -> Result<TaskCounts, EngineError> {
        Ok(self.inner.store.counts_by_status().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::retry::RetryPolicy;
    use crate::domain::TaskStatus;
    use crate::impls::InMemoryStore;
    use crate::ports::{FixedClock, SystemClock, TxOp, UnitOfWork};
    use crate::typed::handler::fixtures::{
        FlakyHandler, OtherSampleHandler, PanickingHandler, SampleHandler,
    };
    use crate::typed::task::fixtures::{OtherSampleTask, SampleTask};
    use chrono::{TimeDelta, TimeZone};
    use std::time::Duration;

    fn fixed_engine() -> (TaskEngine, InMemoryStore, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        ));
        let store = InMemoryStore::new(clock.clone());
        let engine = TaskEngine::new(Arc::new(store.clone()), clock.clone(), EngineConfig::default());
        (engine, store, clock)
    }

    fn fast_config() -> EngineConfig {
        EngineConfig {
            init_delay: Duration::ZERO,
            idle_poll_interval: Duration::from_millis(20),
            error_sleep_interval: Duration::from_millis(10),
            retry_policy: RetryPolicy::new(vec![Duration::from_millis(10)]),
            ..EngineConfig::default()
        }
    }

    fn live_engine() -> (TaskEngine, InMemoryStore) {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store = InMemoryStore::new(clock.clone());
        let engine = TaskEngine::new(Arc::new(store.clone()), clock, fast_config());
        (engine, store)
    }

    async fn wait_for_status(store: &InMemoryStore, status: TaskStatus) -> bool {
        let poll = async {
            loop {
                let tasks = store.list_tasks(TaskType::GameAutoPublish).await.unwrap();
                if tasks.iter().any(|t| t.status == status) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), poll).await.is_ok()
    }

    #[test]
    fn duplicate_registration_is_an_error() {
        let (engine, _, _) = fixed_engine();
        engine.register::<SampleTask, _>(SampleHandler).unwrap();

        let err = engine.register::<SampleTask, _>(SampleHandler).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateHandler(TaskType::GameAutoPublish)));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn missing_expected_handlers_fail_fast() {
        let (engine, _, _) = fixed_engine();
        engine.register::<SampleTask, _>(SampleHandler).unwrap();
        engine.expect_task_types(&TaskType::ALL);

        let err = engine.start().unwrap_err();
        assert!(matches!(
            err,
            EngineError::MissingHandlers(ref missing) if missing == &vec![TaskType::GameNotifyReservedUsers]
        ));
        assert!(!engine.is_started());

        engine
            .register::<OtherSampleTask, _>(OtherSampleHandler)
            .unwrap();
        let workers = engine.start().unwrap();
        assert_eq!(workers.len(), 3);
        workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn engine_starts_only_once() {
        let (engine, _, _) = fixed_engine();
        engine.register::<SampleTask, _>(SampleHandler).unwrap();
        let workers = engine.start().unwrap();
        assert!(engine.is_started());

        assert!(matches!(engine.start(), Err(EngineError::AlreadyStarted)));
        assert!(matches!(
            engine.register::<OtherSampleTask, _>(OtherSampleHandler),
            Err(EngineError::AlreadyStarted)
        ));
        workers.shutdown_and_join().await;
    }

    #[test]
    fn add_task_stages_inserts_in_the_transaction() {
        let (engine, _, clock) = fixed_engine();
        let mut tx = Transaction::new();
        let later = clock.now() + TimeDelta::hours(2);

        engine
            .add_task(&mut tx, TaskType::GameNotifyReservedUsers, None, b"{\"game_id\":1}".to_vec())
            .unwrap();
        engine
            .schedule(&mut tx, Some("sample".into()), &SampleTask { value: 3 }, later)
            .unwrap();

        let ops = tx.into_ops();
        assert_eq!(ops.len(), 2);
        match (&ops[0], &ops[1]) {
            (TxOp::InsertTask(now_task), TxOp::InsertTask(later_task)) => {
                assert_eq!(now_task.next_retry_time, clock.now());
                assert_eq!(later_task.next_retry_time, later);
                assert_eq!(later_task.task_type, TaskType::GameAutoPublish);
                assert_eq!(later_task.custom_id.as_deref(), Some("sample"));
            }
            other => panic!("unexpected ops: {other:?}"),
        }
    }

    #[test]
    fn non_json_content_is_rejected() {
        let (engine, _, _) = fixed_engine();
        let mut tx = Transaction::new();
        let err = engine
            .add_task(&mut tx, TaskType::GameAutoPublish, None, b"\xff\xfe".to_vec())
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidContent(_)));
        assert!(tx.is_empty());
    }

    #[tokio::test]
    async fn wake_up_never_blocks() {
        let (engine, _, _) = fixed_engine();
        // 起動前: ログだけ
        engine.wake_up(TaskType::GameAutoPublish);

        engine.register::<SampleTask, _>(SampleHandler).unwrap();
        let workers = engine.start().unwrap();
        for _ in 0..(engine.config().wake_capacity * 2) {
            engine.wake_up(TaskType::GameAutoPublish);
        }
        // 未登録の TaskType
        engine.wake_up(TaskType::GameNotifyReservedUsers);
        workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn workers_process_and_retry_committed_tasks() {
        let (engine, store) = live_engine();
        engine
            .register::<SampleTask, _>(FlakyHandler::new(2))
            .unwrap();
        let workers = engine.start().unwrap();

        let mut tx = Transaction::new();
        engine
            .enqueue(&mut tx, Some("sample-1".into()), &SampleTask { value: 1 })
            .unwrap();
        store.commit(tx).await.unwrap();
        engine.wake_up(TaskType::GameAutoPublish);

        assert!(wait_for_status(&store, TaskStatus::Success).await);
        let task = &store.list_tasks(TaskType::GameAutoPublish).await.unwrap()[0];
        assert_eq!(task.retry_count, 2);

        let counts = engine.counts().await.unwrap();
        assert_eq!(counts.succeeded, 1);
        workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn panicking_handler_halts_only_its_worker() {
        let (engine, store) = live_engine();
        engine.register::<SampleTask, _>(PanickingHandler).unwrap();
        let workers = engine.start().unwrap();

        let mut tx = Transaction::new();
        engine.enqueue(&mut tx, None, &SampleTask { value: 9 }).unwrap();
        store.commit(tx).await.unwrap();
        engine.wake_up(TaskType::GameAutoPublish);

        // claim 済みのまま残る（回収ループの対象）
        assert!(wait_for_status(&store, TaskStatus::Processing).await);
        tokio::time::sleep(Duration::from_millis(50)).await;
        let task = &store.list_tasks(TaskType::GameAutoPublish).await.unwrap()[0];
        assert_eq!(task.status, TaskStatus::Processing);

        // 以後の wake-up は閉じたメールボックスに当たるだけ
        engine.wake_up(TaskType::GameAutoPublish);
        tokio::time::timeout(Duration::from_secs(5), workers.shutdown_and_join())
            .await
            .unwrap();
    }
}
