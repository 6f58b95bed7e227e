use crate::statics;
use serde::{Deserialize, Serialize};
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

/// Message threshold, as offered by the host's add-on preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    None,
    Debug,
    Info,
    #[default]
    Warning,
    Error,
}

impl LogLevel {
    pub fn level_filter(self) -> LevelFilter {
        match self {
            LogLevel::None => LevelFilter::OFF,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

/// Runtime settings handed to every manager at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub log_level: LogLevel,
    /// Keys starting with this prefix are internal and never grouped.
    pub private_prefix: String,
    /// Bag key holding the persisted grouping record.
    pub group_data_key: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            private_prefix: statics::CPM_PRIVATE_PREFIX.to_string(),
            group_data_key: statics::CPM_GROUP_DATA_KEY.to_string(),
        }
    }
}

impl Preferences {
    pub fn is_private(&self, key: &str) -> bool {
        !self.private_prefix.is_empty() && key.starts_with(&self.private_prefix)
    }
}

/// Install a global fmt subscriber honoring `prefs.log_level`; the `CPM_LOG`
/// environment variable takes precedence. Returns false if a subscriber was
/// already installed.
pub fn init_logging(prefs: &Preferences) -> bool {
    let filter = EnvFilter::builder()
        .with_default_directive(prefs.log_level.level_filter().into())
        .with_env_var(statics::CPM_LOG_ENV)
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::{LogLevel, Preferences};
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn preferences_parse_with_defaults() {
        let prefs: Preferences = json5::from_str("{ log_level: 'DEBUG' }").unwrap();
        assert_eq!(prefs.log_level, LogLevel::Debug);
        assert_eq!(prefs.group_data_key, "_cpm_group_data");
        assert!(prefs.is_private("_secret"));
        assert!(!prefs.is_private("visible"));
    }

    #[test]
    fn none_turns_logging_off() {
        assert_eq!(LogLevel::None.level_filter(), LevelFilter::OFF);
        assert_eq!(LogLevel::default().level_filter(), LevelFilter::WARN);
    }
}
