//! WorkerLoop - TaskType ごとのタスク実行ループ
//!
//! # フロー
//! 1. wake-up / next_fetch / shutdown のどれかを待つ
//! 2. `claim_due` で一番古い due タスクを claim（Pending → Processing）
//! 3. handler を実行して結果を書き戻す
//!    - 成功: Success
//!    - 失敗: Pending に戻し、retry_count+1、backoff 後に再実行
//! 4. 次に起きる時刻を決める
//!    - タスクを処理した: すぐ
//!    - due なし: 一番早い Pending の時刻、無ければ idle_poll_interval 後
//!    - ストアエラー: error_sleep_interval 後
//!
//! `tick()` が 1 回分の処理で、テストは時計を進めながら直接呼びます。

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use super::config::EngineConfig;
use super::time::{add_std, until};
use super::worker_group::sleep_or_shutdown;
use crate::domain::{TaskId, TaskRecord, TaskType, TaskUpdate};
use crate::ports::{Clock, TaskStore};
use crate::typed::DynHandler;

/// `tick()` 1 回の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Succeeded {
        task_id: TaskId,
    },
    Rescheduled {
        task_id: TaskId,
        retry_count: u32,
        next_retry_time: DateTime<Utc>,
    },
    /// handler は実行したが書き戻しに失敗（回収ループが後で拾う）
    WriteBackFailed {
        task_id: TaskId,
    },
    Idle {
        next_fetch: DateTime<Utc>,
    },
    StoreError {
        next_fetch: DateTime<Utc>,
    },
}

impl TickOutcome {
    pub fn next_fetch(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            TickOutcome::Idle { next_fetch } | TickOutcome::StoreError { next_fetch } => *next_fetch,
            _ => now,
        }
    }
}

pub struct WorkerLoop {
    task_type: TaskType,
    handler: Arc<dyn DynHandler>,
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl WorkerLoop {
    pub fn new(
        handler: Arc<dyn DynHandler>,
        store: Arc<dyn TaskStore>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            task_type: handler.task_type(),
            handler,
            store,
            clock,
            config,
        }
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    pub async fn tick(&self) -> TickOutcome {
        let now = self.clock.now();
        match self.store.claim_due(self.task_type, now).await {
            Ok(Some(task)) => self.execute(task).await,
            Ok(None) => self.idle(now).await,
            Err(e) => {
                if e.is_conflict() {
                    debug!(task_type = %self.task_type, error = %e, "claim lost to another worker");
                } else {
                    error!(task_type = %self.task_type, error = %e, "failed to claim task");
                }
                TickOutcome::StoreError {
                    next_fetch: add_std(now, self.config.error_sleep_interval),
                }
            }
        }
    }

    async fn idle(&self, now: DateTime<Utc>) -> TickOutcome {
        match self.store.peek_min_next_retry(self.task_type).await {
            Ok(Some(next)) => {
                debug!(
                    task_type = %self.task_type,
                    task_id = %next.id,
                    next_retry_time = %next.next_retry_time,
                    "no task due; sleeping until the next scheduled one"
                );
                TickOutcome::Idle {
                    next_fetch: next.next_retry_time,
                }
            }
            Ok(None) => TickOutcome::Idle {
                next_fetch: add_std(now, self.config.idle_poll_interval),
            },
            Err(e) => {
                error!(task_type = %self.task_type, error = %e, "failed to look up next scheduled task");
                TickOutcome::StoreError {
                    next_fetch: add_std(now, self.config.error_sleep_interval),
                }
            }
        }
    }

    async fn execute(&self, task: TaskRecord) -> TickOutcome {
        let update = match self.handler.handle_dyn(&task).await {
            Ok(()) => TaskUpdate::Succeeded,
            Err(e) => {
                let delay = self.config.retry_policy.next_delay(task.retry_count);
                let next_retry_time = add_std(self.clock.now(), delay);
                error!(
                    task_type = %self.task_type,
                    task_id = %task.id,
                    retry_count = task.retry_count,
                    %next_retry_time,
                    error = %e,
                    "task handler failed; rescheduling"
                );
                TaskUpdate::Reschedule {
                    retry_count: task.retry_count.saturating_add(1),
                    next_retry_time,
                }
            }
        };

        match self
            .store
            .complete_or_reschedule(task.id, task.version, update)
            .await
        {
            Ok(()) => match update {
                TaskUpdate::Succeeded => {
                    info!(task_type = %self.task_type, task_id = %task.id, "task succeeded");
                    TickOutcome::Succeeded { task_id: task.id }
                }
                TaskUpdate::Reschedule {
                    retry_count,
                    next_retry_time,
                } => TickOutcome::Rescheduled {
                    task_id: task.id,
                    retry_count,
                    next_retry_time,
                },
            },
            Err(e) if e.is_conflict() => {
                warn!(task_type = %self.task_type, task_id = %task.id, error = %e, "task write-back lost a version race");
                TickOutcome::WriteBackFailed { task_id: task.id }
            }
            Err(e) => {
                error!(task_type = %self.task_type, task_id = %task.id, error = %e, "failed to write back task result");
                TickOutcome::WriteBackFailed { task_id: task.id }
            }
        }
    }

    pub async fn run(
        self,
        mut wake_rx: mpsc::Receiver<()>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let task_type = self.task_type;
        if !sleep_or_shutdown(self.config.init_delay, &mut shutdown_rx).await {
            info!(%task_type, "worker stopped before first poll");
            return;
        }
        info!(%task_type, "worker started");

        let mut wake_open = true;
        let mut next_fetch = self.clock.now();
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let wait = until(self.clock.now(), next_fetch);
            tokio::select! {
                biased;
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                msg = wake_rx.recv(), if wake_open => {
                    if msg.is_none() {
                        wake_open = false;
                        continue;
                    }
                    debug!(%task_type, "worker woken up");
                }
                _ = tokio::time::sleep(wait) => {}
            }

            let outcome = self.tick().await;
            next_fetch = outcome.next_fetch(self.clock.now());
        }
        info!(%task_type, "worker stopped");
    }

    /// `run` を panic から隔離する。panic したワーカーは再起動しない
    pub async fn run_guarded(
        self,
        wake_rx: mpsc::Receiver<()>,
        shutdown_rx: watch::Receiver<bool>,
    ) {
        let task_type = self.task_type;
        if let Err(panic) = AssertUnwindSafe(self.run(wake_rx, shutdown_rx))
            .catch_unwind()
            .await
        {
            error!(
                %task_type,
                panic = %panic_message(panic.as_ref()),
                "worker panicked; tasks of this type are no longer processed"
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
