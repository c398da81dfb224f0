//! Effective settings with provenance
//!
//! Captures the merged settings plus where each layer came from, and turns
//! them into an engine [`CacheConfig`].

use chrono::{DateTime, Utc};
use fscache_store::{CacheConfig, LockWait};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use super::defaults::BuiltinDefaults;
use super::merge::merge_layers;

/// Settings file picked up from the working directory when present
pub const DEFAULT_SETTINGS_FILE: &str = "fscache.toml";

/// Upper bound for `cache.lock_timeout_ms` (one hour)
const MAX_LOCK_TIMEOUT_MS: u64 = 60 * 60 * 1000;

/// Origin of a settings layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    File,
    Cli,
}

/// A contributing settings layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    /// Origin of this layer
    pub origin: ConfigOrigin,

    /// File path (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Merged settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveSettings {
    /// When these settings were computed
    pub created_at: DateTime<Utc>,

    /// The merged settings object
    pub config: Value,

    /// Contributing layers in precedence order
    pub sources: Vec<ConfigSource>,
}

impl EffectiveSettings {
    /// Build settings from defaults, an optional TOML file and CLI overrides.
    ///
    /// A missing file is skipped; an unreadable or malformed one is an error.
    pub fn build(
        settings_path: Option<&Path>,
        cli_overrides: Option<Value>,
    ) -> Result<Self, ConfigError> {
        let mut layers = vec![BuiltinDefaults::default().to_value()];
        let mut sources = vec![ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        }];

        if let Some(path) = settings_path {
            if path.exists() {
                let (value, digest) = Self::load_toml_file(path)?;
                layers.push(value);
                sources.push(ConfigSource {
                    origin: ConfigOrigin::File,
                    path: Some(path.to_string_lossy().to_string()),
                    digest: Some(digest),
                });
            }
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let merged = merge_layers(layers);
        Self::validate(&merged)?;

        Ok(Self {
            created_at: Utc::now(),
            config: merged,
            sources,
        })
    }

    /// Load and parse a TOML file, returning the value and digest
    fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
        let bytes = fs::read(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        let contents = String::from_utf8(bytes)
            .map_err(|e| ConfigError::ParseError(format!("Invalid UTF-8: {}", e)))?;

        let toml_value: toml::Value = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))?;

        Ok((Self::toml_to_json(toml_value), digest))
    }

    fn toml_to_json(toml: toml::Value) -> Value {
        match toml {
            toml::Value::String(s) => Value::String(s),
            toml::Value::Integer(i) => Value::Number(i.into()),
            toml::Value::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            toml::Value::Boolean(b) => Value::Bool(b),
            toml::Value::Datetime(dt) => Value::String(dt.to_string()),
            toml::Value::Array(arr) => {
                Value::Array(arr.into_iter().map(Self::toml_to_json).collect())
            }
            toml::Value::Table(table) => Value::Object(
                table
                    .into_iter()
                    .map(|(k, v)| (k, Self::toml_to_json(v)))
                    .collect(),
            ),
        }
    }

    fn validate(config: &Value) -> Result<(), ConfigError> {
        match config.pointer("/cache/root") {
            Some(Value::String(root)) if !root.trim().is_empty() => {}
            _ => {
                return Err(ConfigError::ValidationError(
                    "cache.root must be a non-empty string".to_string(),
                ))
            }
        }

        if let Some(timeout) = config.pointer("/cache/lock_timeout_ms") {
            match timeout.as_u64() {
                Some(ms) if ms <= MAX_LOCK_TIMEOUT_MS => {}
                _ => {
                    return Err(ConfigError::ValidationError(format!(
                        "cache.lock_timeout_ms must be an integer in [0, {}]",
                        MAX_LOCK_TIMEOUT_MS
                    )))
                }
            }
        }

        if let Some(sync) = config.pointer("/cache/sync_writes") {
            if !sync.is_boolean() {
                return Err(ConfigError::ValidationError(
                    "cache.sync_writes must be a boolean".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Engine configuration for these settings.
    pub fn cache_config(&self) -> CacheConfig {
        let root = self.get_str("cache.root").unwrap_or("cache");
        CacheConfig {
            cache_root: PathBuf::from(root),
            lock_wait: LockWait::from_millis(self.get_u64("cache.lock_timeout_ms")),
            sync_writes: self.get_bool("cache.sync_writes").unwrap_or(false),
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Get a value by dot-separated path
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current = &self.config;
        for part in path.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    /// Get a value as u64
    pub fn get_u64(&self, path: &str) -> Option<u64> {
        self.get(path).and_then(|v| v.as_u64())
    }

    /// Get a value as string
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(|v| v.as_str())
    }

    /// Get a value as bool
    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get(path).and_then(|v| v.as_bool())
    }
}

/// Settings errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
