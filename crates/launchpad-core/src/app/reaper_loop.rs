//! ReaperLoop - Processing のまま止まったタスクの回収
//!
//! ワーカーが claim 後にクラッシュしたり書き戻しに失敗したりすると、
//! タスクは Processing のまま残ります。一定時間（stale_after）更新されていない
//! Processing タスクを Pending に戻し、ワーカーが再度 claim できるようにします。
//!
//! # フロー
//! 1. 初回は idle_poll_interval 待ってから回収
//! 2. 以後 recovery_period ごとに回収
//! 3. shutdown で停止

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::config::EngineConfig;
use super::time::sub_std;
use super::worker_group::sleep_or_shutdown;
use crate::domain::StoreError;
use crate::ports::{Clock, TaskStore};

pub struct ReaperLoop {
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
    initial_delay: Duration,
    period: Duration,
    stale_after: Duration,
}

impl ReaperLoop {
    pub fn new(store: Arc<dyn TaskStore>, clock: Arc<dyn Clock>, config: &EngineConfig) -> Self {
        Self {
            store,
            clock,
            initial_delay: config.idle_poll_interval,
            period: config.recovery_period,
            stale_after: config.stale_after,
        }
    }

    /// 1 回分の回収。戻した件数を返す
    pub async fn sweep(&self) -> Result<u64, StoreError> {
        let stale_before = sub_std(self.clock.now(), self.stale_after);
        let reset = self.store.reset_stale_processing(stale_before).await?;
        if reset > 0 {
            warn!(reset, %stale_before, "reset stale processing tasks to pending");
        } else {
            debug!(%stale_before, "no stale processing tasks");
        }
        Ok(reset)
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        if !sleep_or_shutdown(self.initial_delay, &mut shutdown_rx).await {
            return;
        }
        info!(period_secs = self.period.as_secs(), "timeout recovery started");
        loop {
            if let Err(e) = self.sweep().await {
                error!(error = %e, "timeout recovery sweep failed");
            }
            if !sleep_or_shutdown(self.period, &mut shutdown_rx).await {
                break;
            }
        }
        info!("timeout recovery stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewTask, TaskStatus, TaskType};
    use crate::impls::InMemoryStore;
    use crate::ports::{FixedClock, Transaction, UnitOfWork};
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn sweep_recovers_stuck_task_once() {
        let clock = Arc::new(FixedClock::new(t0()));
        let store = InMemoryStore::new(clock.clone());
        let mut tx = Transaction::new();
        tx.insert_task(NewTask {
            custom_id: None,
            task_type: TaskType::GameNotifyReservedUsers,
            content: b"{}".to_vec(),
            next_retry_time: t0(),
        });
        store.commit(tx).await.unwrap();
        let claimed = store
            .claim_due(TaskType::GameNotifyReservedUsers, t0())
            .await
            .unwrap()
            .unwrap();

        let reaper = ReaperLoop::new(
            Arc::new(store.clone()),
            clock.clone(),
            &EngineConfig::default(),
        );

        // 1 時間後: まだ stale ではない
        clock.advance(TimeDelta::hours(1));
        assert_eq!(reaper.sweep().await.unwrap(), 0);

        // 25 時間後: 回収される
        clock.advance(TimeDelta::hours(24));
        assert_eq!(reaper.sweep().await.unwrap(), 1);
        assert_eq!(reaper.sweep().await.unwrap(), 0);

        let task = store.get_task(claimed.id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.version, claimed.version + 1);

        // 再び claim できる
        let again = store
            .claim_due(TaskType::GameNotifyReservedUsers, clock.now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(again.id, claimed.id);
    }

    #[tokio::test]
    async fn sweep_surfaces_store_errors() {
        let clock = Arc::new(FixedClock::new(t0()));
        let store = InMemoryStore::new(clock.clone());
        store.set_offline(true);
        let reaper = ReaperLoop::new(Arc::new(store), clock, &EngineConfig::default());
        assert!(matches!(
            reaper.sweep().await,
            Err(StoreError::Unavailable(_))
        ));
    }
}
