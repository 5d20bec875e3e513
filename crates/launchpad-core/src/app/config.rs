//! EngineConfig - エンジンのタイミング設定
//!
//! Default は本番の値。`from_env()` で `LAUNCHPAD_*` 環境変数から上書きできます。
//!
//! | 変数 | 単位 | Default |
//! |---|---|---|
//! | `LAUNCHPAD_INIT_DELAY_SECS` | 秒 | 10 |
//! | `LAUNCHPAD_IDLE_POLL_SECS` | 秒 | 30 |
//! | `LAUNCHPAD_ERROR_SLEEP_SECS` | 秒 | 3 |
//! | `LAUNCHPAD_BACKOFF_SECS` | 秒（カンマ区切り） | 2,3,5,10,30,60,300 |
//! | `LAUNCHPAD_RECOVERY_PERIOD_SECS` | 秒 | 86400 |
//! | `LAUNCHPAD_STALE_AFTER_SECS` | 秒 | 86400 |
//! | `LAUNCHPAD_WAKE_CAPACITY` | 件 | 1000 |

use std::time::Duration;

use crate::app::retry::RetryPolicy;
use crate::domain::ErrorKind;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("backoff sequence must not be empty")]
    EmptyBackoff,

    #[error("backoff sequence must not decrease")]
    DecreasingBackoff,

    #[error("wake-up capacity must be greater than zero")]
    ZeroWakeCapacity,
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// ワーカー起動後、最初の poll までの待ち
    pub init_delay: Duration,
    /// due タスクも将来のタスクも無いときの poll 間隔
    pub idle_poll_interval: Duration,
    /// ストアエラー後の待ち
    pub error_sleep_interval: Duration,
    pub retry_policy: RetryPolicy,
    /// タイムアウト回収の周期（最初の回収は init 後すぐ）
    pub recovery_period: Duration,
    /// Processing のままこの時間を過ぎたら回収対象
    pub stale_after: Duration,
    /// wake-up メールボックスの容量（TaskType ごと）
    pub wake_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            init_delay: Duration::from_secs(10),
            idle_poll_interval: Duration::from_secs(30),
            error_sleep_interval: Duration::from_secs(3),
            retry_policy: RetryPolicy::default(),
            recovery_period: Duration::from_secs(24 * 60 * 60),
            stale_after: Duration::from_secs(24 * 60 * 60),
            wake_capacity: 1000,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `lookup` で値を引いて Default を上書きする
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = lookup("LAUNCHPAD_INIT_DELAY_SECS") {
            config.init_delay = parse_secs("LAUNCHPAD_INIT_DELAY_SECS", &v)?;
        }
        if let Some(v) = lookup("LAUNCHPAD_IDLE_POLL_SECS") {
            config.idle_poll_interval = parse_secs("LAUNCHPAD_IDLE_POLL_SECS", &v)?;
        }
        if let Some(v) = lookup("LAUNCHPAD_ERROR_SLEEP_SECS") {
            config.error_sleep_interval = parse_secs("LAUNCHPAD_ERROR_SLEEP_SECS", &v)?;
        }
        if let Some(v) = lookup("LAUNCHPAD_BACKOFF_SECS") {
            let delays = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| parse_secs("LAUNCHPAD_BACKOFF_SECS", s))
                .collect::<Result<Vec<_>, _>>()?;
            config.retry_policy = RetryPolicy::new(delays);
        }
        if let Some(v) = lookup("LAUNCHPAD_RECOVERY_PERIOD_SECS") {
            config.recovery_period = parse_secs("LAUNCHPAD_RECOVERY_PERIOD_SECS", &v)?;
        }
        if let Some(v) = lookup("LAUNCHPAD_STALE_AFTER_SECS") {
            config.stale_after = parse_secs("LAUNCHPAD_STALE_AFTER_SECS", &v)?;
        }
        if let Some(v) = lookup("LAUNCHPAD_WAKE_CAPACITY") {
            config.wake_capacity =
                v.trim()
                    .parse()
                    .map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
                        key: "LAUNCHPAD_WAKE_CAPACITY",
                        reason: e.to_string(),
                    })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_policy.delays().is_empty() {
            return Err(ConfigError::EmptyBackoff);
        }
        if !self.retry_policy.is_non_decreasing() {
            return Err(ConfigError::DecreasingBackoff);
        }
        if self.wake_capacity == 0 {
            return Err(ConfigError::ZeroWakeCapacity);
        }
        Ok(())
    }
}

fn parse_secs(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| ConfigError::InvalidValue {
            key,
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_production_timings() {
        let config = EngineConfig::default();
        assert_eq!(config.init_delay, Duration::from_secs(10));
        assert_eq!(config.idle_poll_interval, Duration::from_secs(30));
        assert_eq!(config.error_sleep_interval, Duration::from_secs(3));
        assert_eq!(config.recovery_period, Duration::from_secs(86_400));
        assert_eq!(config.stale_after, Duration::from_secs(86_400));
        assert_eq!(config.wake_capacity, 1000);
        assert_eq!(config.retry_policy.delays().len(), 7);
    }

    #[test]
    fn env_overrides_defaults() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            ("LAUNCHPAD_IDLE_POLL_SECS", "5"),
            ("LAUNCHPAD_BACKOFF_SECS", "1, 2 ,4"),
            ("LAUNCHPAD_WAKE_CAPACITY", "16"),
        ]))
        .unwrap();

        assert_eq!(config.idle_poll_interval, Duration::from_secs(5));
        assert_eq!(
            config.retry_policy.delays(),
            &[
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
        assert_eq!(config.wake_capacity, 16);
        assert_eq!(config.init_delay, Duration::from_secs(10));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = EngineConfig::from_lookup(lookup_from(&[("LAUNCHPAD_ERROR_SLEEP_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "LAUNCHPAD_ERROR_SLEEP_SECS",
                ..
            }
        ));

        let err = EngineConfig::from_lookup(lookup_from(&[("LAUNCHPAD_BACKOFF_SECS", " , ")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::EmptyBackoff);

        let err = EngineConfig::from_lookup(lookup_from(&[("LAUNCHPAD_WAKE_CAPACITY", "0")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroWakeCapacity);
    }

    #[test]
    fn unsorted_backoff_is_rejected() {
        let err = EngineConfig::from_lookup(lookup_from(&[("LAUNCHPAD_BACKOFF_SECS", "300,2")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::DecreasingBackoff);

        let config = EngineConfig::from_lookup(lookup_from(&[("LAUNCHPAD_BACKOFF_SECS", "5,5,60")]))
            .unwrap();
        let delays = config.retry_policy.delays();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }
}
