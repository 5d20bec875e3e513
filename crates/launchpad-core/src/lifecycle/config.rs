//! LifecycleConfig - 通知先の設定

/// `LAUNCHPAD_NOTIFY_TOPIC` で上書きできる
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
    pub notify_topic: String,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            notify_topic: "core.push.users".to_string(),
        }
    }
}

impl LifecycleConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(topic) = lookup("LAUNCHPAD_NOTIFY_TOPIC") {
            let topic = topic.trim();
            if !topic.is_empty() {
                config.notify_topic = topic.to_string();
            }
        }
        config
    }
}
