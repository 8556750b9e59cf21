#![forbid(unsafe_code)]

//! Monitor configuration.
//!
//! Captures every tunable of the poll pipeline as a single [`MonitorConfig`]
//! that can be loaded from TOML at startup.
//!
//! ```toml
//! # mutexmon.toml
//! endpoint = "http://localhost:8081"
//! poll_interval_ms = 1000
//! indicator_ttl_ms = 3000
//! label_max_chars = 20
//! ```
//!
//! Every field has a default, so a partial file (or none at all) is fine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use mutexmon_core::IndicatorConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("validation errors: {}", .0.join("; "))]
    Validation(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
    /// Collector base URL. The collector serves its web port at its
    /// command port + 1, hence 8081.
    pub endpoint: String,
    /// Path of the snapshot resource under `endpoint`.
    pub path: String,
    pub poll_interval_ms: u64,
    /// Upper bound for one fetch; kept below the poll interval by default.
    pub request_timeout_ms: u64,
    pub indicator_ttl_ms: u64,
    pub label_max_chars: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8081".to_string(),
            path: "/mutexes".to_string(),
            poll_interval_ms: 1000,
            request_timeout_ms: 900,
            indicator_ttl_ms: 3000,
            label_max_chars: 20,
        }
    }
}

impl MonitorConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Returns a list of validation errors. Empty means valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            errors.push(format!(
                "endpoint must be an http(s) URL, got {:?}",
                self.endpoint
            ));
        }
        if !self.path.starts_with('/') {
            errors.push(format!("path must start with '/', got {:?}", self.path));
        }
        if self.poll_interval_ms == 0 {
            errors.push("poll_interval_ms must be > 0".to_string());
        }
        if self.request_timeout_ms == 0 {
            errors.push("request_timeout_ms must be > 0".to_string());
        }
        if self.indicator_ttl_ms == 0 {
            errors.push("indicator_ttl_ms must be > 0".to_string());
        }
        if self.label_max_chars == 0 {
            errors.push("label_max_chars must be > 0".to_string());
        }
        errors
    }

    /// `self` if valid, otherwise every problem at once.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Full URL of the snapshot resource.
    pub fn snapshot_url(&self) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), self.path)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn indicator_config(&self) -> IndicatorConfig {
        IndicatorConfig {
            ttl_ms: self.indicator_ttl_ms,
            label_max_chars: self.label_max_chars,
        }
    }
}
