//! Configuration documents loaded from TOML.
//!
//! The engine treats the config file as an opaque key/value document
//! addressed by dotted keys (`liquidator.select.repay_denoms`). It owns a
//! single key itself, the sweep period at [`KEY_WAIT`]; every other key
//! belongs to whichever stage implementations are installed, and each of
//! those brings its own [`ValidateFn`].

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Sweep period. Must parse as a duration of at least [`MIN_WAIT`].
pub const KEY_WAIT: &str = "liquidator.wait";

/// Shortest sweep period the core validator accepts.
pub const MIN_WAIT: Duration = Duration::from_secs(1);

/// Longest duration accepted anywhere in the config: `i64::MAX`
/// nanoseconds, about 292 years.
pub const MAX_DURATION: Duration = Duration::from_nanos(i64::MAX as u64);

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {message}")]
    Read { path: String, message: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("missing {0}")]
    Missing(String),

    #[error("invalid {key}: {value}")]
    Invalid { key: String, value: String },

    #[error("{key} must be a nonzero duration of at least {min:?}")]
    TooShort { key: String, min: Duration },
}

impl ConfigError {
    pub fn invalid(key: &str, value: impl fmt::Display) -> Self {
        ConfigError::Invalid {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Raw document
// ---------------------------------------------------------------------------

/// A parsed but not yet validated configuration document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawConfig {
    table: toml::Table,
}

impl RawConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let table: toml::Table =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(Self { table })
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Look up a dotted key.
    pub fn get(&self, key: &str) -> Option<&toml::Value> {
        let mut parts = key.split('.');
        let mut value = self.table.get(parts.next()?)?;
        for part in parts {
            value = value.as_table()?.get(part)?;
        }
        Some(value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// String value at `key`, if present and a string.
    pub fn string(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }

    /// String list at `key`. Returns an empty list when the key is missing
    /// or holds anything other than an array of strings.
    pub fn strings(&self, key: &str) -> Vec<String> {
        let Some(array) = self.get(key).and_then(|v| v.as_array()) else {
            return Vec::new();
        };
        let strings: Option<Vec<String>> = array
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect();
        strings.unwrap_or_default()
    }

    /// Duration at `key`: a Go-style duration string (`"1m30s"`) or an
    /// integer number of seconds.
    pub fn duration(&self, key: &str) -> Result<Duration, ConfigError> {
        match self.get(key) {
            None => Err(ConfigError::Missing(key.to_string())),
            Some(toml::Value::String(s)) => {
                parse_duration(s).ok_or_else(|| ConfigError::invalid(key, s))
            }
            Some(toml::Value::Integer(secs)) if *secs >= 0 => {
                let d = Duration::from_secs(*secs as u64);
                if d > MAX_DURATION {
                    return Err(ConfigError::invalid(key, secs));
                }
                Ok(d)
            }
            Some(other) => Err(ConfigError::invalid(key, other)),
        }
    }

    /// Deserialize the table at `key` into `T`. `Ok(None)` when absent.
    pub fn section<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value
                .clone()
                .try_into()
                .map(Some)
                .map_err(|e: toml::de::Error| ConfigError::invalid(key, e.message())),
        }
    }
}

// ---------------------------------------------------------------------------
// Validated snapshot
// ---------------------------------------------------------------------------

/// A configuration document that passed every registered validator.
///
/// Snapshots are immutable; the engine replaces the whole `Arc` on reload so
/// a sweep keeps reading the snapshot it started with.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    pub version: u64,
    pub raw: Arc<RawConfig>,
    pub wait: Duration,
    pub loaded_at: DateTime<Utc>,
}

impl ConfigSnapshot {
    pub fn config(&self) -> &RawConfig {
        &self.raw
    }
}

// ---------------------------------------------------------------------------
// Validators
// ---------------------------------------------------------------------------

/// Pass/fail check on a raw configuration document.
pub type ValidateFn = Arc<dyn Fn(&RawConfig) -> Result<(), ConfigError> + Send + Sync>;

/// Wrap a plain function or closure as a [`ValidateFn`].
pub fn validator<F>(f: F) -> ValidateFn
where
    F: Fn(&RawConfig) -> Result<(), ConfigError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Validates the keys the engine itself reads.
pub fn validate_core(config: &RawConfig) -> Result<(), ConfigError> {
    match config.duration(KEY_WAIT) {
        Ok(wait) if wait >= MIN_WAIT => Ok(()),
        Ok(_) | Err(ConfigError::Missing(_)) => Err(ConfigError::TooShort {
            key: KEY_WAIT.to_string(),
            min: MIN_WAIT,
        }),
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// Logging settings
// ---------------------------------------------------------------------------

/// `[log]` table, read once at startup by the binary.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LogSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
        }
    }
}

impl LogSettings {
    pub fn from_config(config: &RawConfig) -> Result<Self, ConfigError> {
        Ok(config.section("log")?.unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Duration parsing
// ---------------------------------------------------------------------------

/// Parse a Go-style duration such as `"300ms"`, `"1.5h"` or `"2h45m"`.
/// A bare number is read as seconds. Anything past [`MAX_DURATION`] is
/// rejected rather than clamped.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(secs) = s.parse::<u64>() {
        let d = Duration::from_secs(secs);
        return (d <= MAX_DURATION).then_some(d);
    }

    let mut total = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_len == 0 {
            return None;
        }
        let value: f64 = rest[..num_len].parse().ok()?;
        rest = &rest[num_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return None,
        };
        rest = &rest[unit_len..];
        total += value * nanos_per_unit;
    }

    let nanos = total.round();
    if !nanos.is_finite() || nanos > i64::MAX as f64 {
        return None;
    }
    Some(Duration::from_nanos(nanos as u64))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
