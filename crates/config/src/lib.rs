//! Configuration loading, validation, and management for the resequencer.
//!
//! Loads configuration from `~/.resequencer/config.toml` (or an explicit path)
//! with environment variable overrides. Validates all settings at startup.

use resequencer_core::{Destination, ReleasePolicy, TimeoutAction};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.resequencer/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResequencerConfig {
    /// Release contiguous runs as they close gaps, or only whole sequences
    #[serde(default)]
    pub release_policy: ReleasePolicy,

    /// Destination used when an item carries no reply-to
    #[serde(default = "default_destination")]
    pub default_destination: String,

    /// Destination that receives items of expired groups (if any)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discard_destination: Option<String>,

    /// Group timeout and reaping
    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    /// Event bus settings
    #[serde(default)]
    pub events: EventsConfig,
}

fn default_destination() -> String {
    "output".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Idle time after which an open group is expired
    #[serde(default = "default_group_timeout_ms")]
    pub group_timeout_ms: u64,

    /// How often the reaper scans for idle groups
    #[serde(default = "default_reap_interval_ms")]
    pub reap_interval_ms: u64,

    /// What to do with items still buffered in an expired group
    #[serde(default)]
    pub on_timeout: TimeoutAction,
}

fn default_group_timeout_ms() -> u64 {
    60_000
}
fn default_reap_interval_ms() -> u64 {
    1_000
}

impl LifecycleConfig {
    pub fn group_timeout(&self) -> Duration {
        Duration::from_millis(self.group_timeout_ms)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.reap_interval_ms)
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            group_timeout_ms: default_group_timeout_ms(),
            reap_interval_ms: default_reap_interval_ms(),
            on_timeout: TimeoutAction::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

fn default_event_capacity() -> usize {
    256
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: default_event_capacity(),
        }
    }
}

impl ResequencerConfig {
    /// Load configuration from the default path (~/.resequencer/config.toml).
    ///
    /// Environment variables override file values:
    /// - `RESEQ_RELEASE_POLICY` (`partial` or `complete_only`)
    /// - `RESEQ_GROUP_TIMEOUT_MS`
    /// - `RESEQ_DEFAULT_DESTINATION`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load from a specific path, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(policy) = lookup("RESEQ_RELEASE_POLICY") {
            self.release_policy = policy.parse().map_err(ConfigError::ValidationError)?;
        }

        if let Some(timeout) = lookup("RESEQ_GROUP_TIMEOUT_MS") {
            self.lifecycle.group_timeout_ms = timeout.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "RESEQ_GROUP_TIMEOUT_MS must be an integer, got '{timeout}'"
                ))
            })?;
        }

        if let Some(destination) = lookup("RESEQ_DEFAULT_DESTINATION") {
            self.default_destination = destination;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".resequencer")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_destination.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "default_destination must not be empty".into(),
            ));
        }

        if self.lifecycle.group_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "lifecycle.group_timeout_ms must be > 0".into(),
            ));
        }

        if self.lifecycle.reap_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "lifecycle.reap_interval_ms must be > 0".into(),
            ));
        }

        if self.events.capacity == 0 {
            return Err(ConfigError::ValidationError(
                "events.capacity must be > 0".into(),
            ));
        }

        Ok(())
    }

    pub fn default_destination(&self) -> Destination {
        Destination::new(self.default_destination.clone())
    }

    pub fn discard_destination(&self) -> Option<Destination> {
        self.discard_destination.clone().map(Destination::new)
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        Self::default().to_toml()
    }

    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

impl Default for ResequencerConfig {
    fn default() -> Self {
        Self {
            release_policy: ReleasePolicy::default(),
            default_destination: default_destination(),
            discard_destination: None,
            lifecycle: LifecycleConfig::default(),
            events: EventsConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
