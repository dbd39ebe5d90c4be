//! TOML-based application configuration.
//!
//! Stores:
//! - Per-preset gesture parameters (hold duration, decay, phase thresholds)
//! - The timezone reference for ledger calendar days
//! - Commit retry policy
//!
//! Configuration is stored at `~/.config/questboard/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::commit::RetryPolicy;
use crate::error::ConfigError;
use crate::gesture::{GestureConfig, GesturePreset};
use crate::ledger::DayBoundary;

/// Gesture presets, one section per call site kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GesturesConfig {
    #[serde(default = "GestureConfig::purchase_confirm")]
    pub purchase: GestureConfig,
    #[serde(default = "GestureConfig::daily_ritual")]
    pub ritual: GestureConfig,
}

/// Ledger configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Offset from UTC of the single calendar used to derive ledger days.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

/// Commit retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommitConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/questboard/config.toml`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gestures: GesturesConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub commit: CommitConfig,
}

// Default functions
fn default_max_attempts() -> u32 {
    5
}
fn default_initial_backoff_ms() -> u64 {
    200
}
fn default_max_backoff_ms() -> u64 {
    5_000
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_attempt_timeout_ms() -> u64 {
    3_000
}

impl Default for GesturesConfig {
    fn default() -> Self {
        Self {
            purchase: GestureConfig::purchase_confirm(),
            ritual: GestureConfig::daily_ritual(),
        }
    }
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        if key.is_empty() {
            return Err(unknown());
        }

        let mut parts = key.split('.').peekable();
        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => value
                        .parse::<bool>()
                        .map(serde_json::Value::Bool)
                        .map_err(|e| invalid(e.to_string()))?,
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<i64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("config.toml"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from disk or return (and write) the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed
    /// or fails validation, or if the default config cannot be written.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Same as [`Config::load`] for an explicit file.
    ///
    /// # Errors
    ///
    /// See [`Config::load`].
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config =
                    toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Persist to an explicit file.
    ///
    /// # Errors
    ///
    /// See [`Config::save`].
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Update a value in memory. The whole config must still validate.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed
    /// into the existing type, or the result fails validation. On error
    /// `self` is unchanged.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate().map_err(|e| match e {
            ConfigError::InvalidValue { message, .. } => ConfigError::InvalidValue {
                key: key.to_string(),
                message,
            },
            other => other,
        })?;
        *self = updated;
        Ok(())
    }

    /// Set a config value by key and persist it.
    ///
    /// # Errors
    ///
    /// See [`Config::set_value`]; also fails if the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.set_value(key, value)?;
        self.save()
    }

    /// Check every section for values the core would refuse.
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` naming the first offending section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for preset in [GesturePreset::Purchase, GesturePreset::Ritual] {
            self.gesture(preset)
                .validate()
                .map_err(|e| ConfigError::InvalidValue {
                    key: format!("gestures.{preset}"),
                    message: e.to_string(),
                })?;
        }
        DayBoundary::from_offset_minutes(self.ledger.utc_offset_minutes).map_err(|e| {
            ConfigError::InvalidValue {
                key: "ledger.utc_offset_minutes".into(),
                message: e.to_string(),
            }
        })?;
        if self.commit.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "commit.max_attempts".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.commit.backoff_multiplier.is_nan() || self.commit.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                key: "commit.backoff_multiplier".into(),
                message: "must be at least 1.0".into(),
            });
        }
        Ok(())
    }

    pub fn gesture(&self, preset: GesturePreset) -> GestureConfig {
        match preset {
            GesturePreset::Purchase => self.gestures.purchase,
            GesturePreset::Ritual => self.gestures.ritual,
        }
    }

    /// Calendar used for ledger days. Falls back to UTC for an offset
    /// `validate` would reject.
    pub fn day_boundary(&self) -> DayBoundary {
        DayBoundary::from_offset_minutes(self.ledger.utc_offset_minutes).unwrap_or_default()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.commit.max_attempts.max(1),
            initial_backoff_ms: self.commit.initial_backoff_ms,
            max_backoff_ms: self.commit.max_backoff_ms,
            backoff_multiplier: self.commit.backoff_multiplier,
            attempt_timeout_ms: self.commit.attempt_timeout_ms,
        }
    }
}
