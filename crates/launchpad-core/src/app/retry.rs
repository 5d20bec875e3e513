//! Retry policy: decides backoff delays.

use std::time::Duration;

/// Backoff sequence indexed by the task's retry count.
///
/// 失敗するたびに retry_count が 1 増え、次回の遅延は
/// `delays[min(retry_count, len - 1)]`。最後の値で頭打ちになり、リセットはしない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl RetryPolicy {
    /// 2s, 3s, 5s, 10s, 30s, 1m, 5m
    pub fn default_sequence() -> Vec<Duration> {
        [2, 3, 5, 10, 30, 60, 300]
            .into_iter()
            .map(Duration::from_secs)
            .collect()
    }

    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    /// 後ろの遅延が前より短くならない
    pub fn is_non_decreasing(&self) -> bool {
        self.delays.windows(2).all(|w| w[0] <= w[1])
    }

    /// Delay before the next attempt of a task that has failed `retry_count` times before.
    ///
    /// # Arguments
    /// * `retry_count` - the task's retry count before this failure (0 on the first failure).
    pub fn next_delay(&self, retry_count: u32) -> Duration {
        let Some(last) = self.delays.len().checked_sub(1) else {
            return Duration::ZERO;
        };
        let index = (retry_count as usize).min(last);
        self.delays[index]
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::default_sequence())
    }
}
