//! Nudge configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{NudgeError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NudgeConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub journal: JournalConfig,
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

impl NudgeConfig {
    /// Load config from the default path (~/.nudge/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NudgeError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| NudgeError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| NudgeError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Nudge home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".nudge")
    }
}

/// Durable schedule store location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite file path. `~` is expanded by the binary.
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_path() -> String {
    "~/.nudge/nudge.db".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: default_store_path() }
    }
}

/// Dismissal journal layout and dedup policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalConfig {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_journal_key")]
    pub key: String,
    /// Keep only the newest snapshot per notification id.
    #[serde(default = "bool_true")]
    pub dedup_by_id: bool,
}

fn default_namespace() -> String {
    "nudge_prefs".into()
}
fn default_journal_key() -> String {
    "pending_dismissed".into()
}
fn bool_true() -> bool {
    true
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            key: default_journal_key(),
            dedup_by_id: true,
        }
    }
}

/// Runtime timer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Capacity of the channel carrying timer fires to the dispatcher.
    #[serde(default = "default_fire_capacity")]
    pub fire_channel_capacity: usize,
}

fn default_fire_capacity() -> usize {
    64
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            fire_channel_capacity: default_fire_capacity(),
        }
    }
}

/// Rendering behaviour of the built-in desktop renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Drop fires when notification permission is not granted.
    #[serde(default = "bool_true")]
    pub require_permission: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { require_permission: true }
    }
}
