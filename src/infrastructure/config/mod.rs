//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::application::errors::ConfigError;
use crate::application::store::StoreConfig;
use crate::domain::keys::ChatKey;
use crate::infrastructure::database::DocumentDb;
use crate::infrastructure::scheduler::{
    AutoDeleteStatusMessage, CronJobConfig, CronTime, DEFAULT_CRON_TIME, DEFAULT_TIME_ZONE,
};

/// Mirror configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub store: StoreSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("chat-mirror.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct StoreSettings {
    #[serde(default)]
    pub filter_chats: bool,
    /// Pinned chats sort first
    #[serde(default = "default_true")]
    pub pin_chats: bool,
    #[serde(default)]
    pub auto_delete_status_message: StatusCleanupSetting,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            filter_chats: false,
            pin_chats: true,
            auto_delete_status_message: StatusCleanupSetting::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// `false`/`true`, or a schedule
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StatusCleanupSetting {
    Toggle(bool),
    Schedule(CleanupSchedule),
}

impl Default for StatusCleanupSetting {
    fn default() -> Self {
        Self::Toggle(false)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CleanupSchedule {
    #[serde(default = "default_cron_time")]
    pub cron_time: CronTime,
    #[serde(default)]
    pub time_zone: Option<String>,
}

fn default_cron_time() -> CronTime {
    CronTime::Expression(DEFAULT_CRON_TIME.to_string())
}

impl From<&StatusCleanupSetting> for AutoDeleteStatusMessage {
    fn from(setting: &StatusCleanupSetting) -> Self {
        match setting {
            StatusCleanupSetting::Toggle(enabled) => AutoDeleteStatusMessage::from(*enabled),
            StatusCleanupSetting::Schedule(schedule) => AutoDeleteStatusMessage::Enabled(CronJobConfig {
                cron_time: schedule.cron_time.clone(),
                time_zone: Some(
                    schedule
                        .time_zone
                        .clone()
                        .unwrap_or_else(|| DEFAULT_TIME_ZONE.to_string()),
                ),
                on_complete: None,
            }),
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))
    }

    pub fn load_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Ok(path) = std::env::var("CHAT_MIRROR_DB") {
            config.database.path = PathBuf::from(path);
        }

        if let Ok(filter) = std::env::var("CHAT_MIRROR_FILTER_CHATS") {
            config.store.filter_chats = parse_flag(&filter).ok_or_else(|| {
                ConfigError::InvalidValue(format!("CHAT_MIRROR_FILTER_CHATS={}", filter))
            })?;
        }

        Ok(config)
    }

    /// Store options backed by `db`
    pub fn store_config(&self, db: DocumentDb) -> StoreConfig {
        StoreConfig::new(db)
            .with_chat_key(ChatKey::new(self.store.pin_chats))
            .filter_chats(self.store.filter_chats)
            .auto_delete_status_message(&self.store.auto_delete_status_message)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
