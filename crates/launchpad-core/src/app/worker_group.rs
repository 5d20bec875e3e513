//! WorkerGroup - 起動したループの handle 群

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Worker group handle.
/// - `request_shutdown()` で全ループに停止を通知する（実行中の handler は中断しない）
/// - `shutdown_and_join()` で全ループの終了を待てる
#[derive(Debug)]
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<(String, JoinHandle<()>)>,
}

impl WorkerGroup {
    pub(crate) fn new(shutdown_tx: watch::Sender<bool>) -> Self {
        Self {
            shutdown_tx,
            joins: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, name: impl Into<String>, join: JoinHandle<()>) {
        self.joins.push((name.into(), join));
    }

    /// ワーカー + 回収ループの本数
    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.joins.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn request_shutdown(&self) {
        // ignore send error: receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for (name, join) in self.joins {
            if let Err(e) = join.await {
                warn!(loop_name = %name, error = %e, "loop did not finish cleanly");
            }
        }
        info!("all loops stopped");
    }
}

/// `duration` だけ眠る。途中で shutdown が来たら false
pub(crate) async fn sleep_or_shutdown(
    duration: Duration,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> bool {
    if *shutdown_rx.borrow() {
        return false;
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = shutdown_rx.changed() => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shutdown_interrupts_sleep() {
        let (tx, mut rx) = watch::channel(false);
        let sleeper = tokio::spawn(async move {
            sleep_or_shutdown(Duration::from_secs(3600), &mut rx).await
        });
        tx.send(true).unwrap();
        assert!(!sleeper.await.unwrap());
    }

    #[tokio::test]
    async fn group_joins_all_loops() {
        let (tx, rx) = watch::channel(false);
        let mut group = WorkerGroup::new(tx);
        for i in 0..3 {
            let mut rx = rx.clone();
            group.push(
                format!("loop-{i}"),
                tokio::spawn(async move {
                    while sleep_or_shutdown(Duration::from_millis(5), &mut rx).await {}
                }),
            );
        }
        assert_eq!(group.len(), 3);
        assert_eq!(group.names(), vec!["loop-0", "loop-1", "loop-2"]);

        tokio::time::timeout(Duration::from_secs(5), group.shutdown_and_join())
            .await
            .unwrap();
    }
}
