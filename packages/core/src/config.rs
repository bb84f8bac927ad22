//! Engine Configuration
//!
//! Settings for opening a [`PageEngine`](crate::engine::PageEngine). All
//! fields have defaults, so a partial JSON document deserializes cleanly.
//!
//! # Environment Variables
//!
//! * `PAGESPACE_DB_PATH` - database file location
//! * `PAGESPACE_BUSY_TIMEOUT_MS` - per-connection busy timeout
//! * `PAGESPACE_SEARCH_MIN_TERM_LENGTH` - default minimum search term length

use crate::db::DEFAULT_BUSY_TIMEOUT_MS;
use crate::services::{PageOrder, DEFAULT_SEARCH_MIN_TERM_LENGTH};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub const DB_PATH_ENV: &str = "PAGESPACE_DB_PATH";
pub const BUSY_TIMEOUT_ENV: &str = "PAGESPACE_BUSY_TIMEOUT_MS";
pub const SEARCH_MIN_TERM_LENGTH_ENV: &str = "PAGESPACE_SEARCH_MIN_TERM_LENGTH";

pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 128;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Environment variable {name} has invalid value `{value}`")]
    InvalidEnv { name: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub database_path: PathBuf,
    pub busy_timeout_ms: u64,
    pub event_channel_capacity: usize,
    pub search_min_term_length: usize,
    /// Loader default: return pages outside their publish window
    pub include_unpublished: bool,
    /// Loader default: return pages the actor may not view
    pub include_unviewable: bool,
    pub default_order: PageOrder,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("./data/pagespace.db"),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            search_min_term_length: DEFAULT_SEARCH_MIN_TERM_LENGTH,
            include_unpublished: true,
            include_unviewable: true,
            default_order: PageOrder::Standard,
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with the `PAGESPACE_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().overlay(|name| std::env::var(name).ok())
    }

    /// Overlay values looked up by environment variable name
    pub fn overlay<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(DB_PATH_ENV) {
            tracing::info!("Using database path from {}: {}", DB_PATH_ENV, path);
            self.database_path = PathBuf::from(path);
        }
        if let Some(value) = lookup(BUSY_TIMEOUT_ENV) {
            self.busy_timeout_ms = parse_env(BUSY_TIMEOUT_ENV, value)?;
        }
        if let Some(value) = lookup(SEARCH_MIN_TERM_LENGTH_ENV) {
            self.search_min_term_length = parse_env(SEARCH_MIN_TERM_LENGTH_ENV, value)?;
        }
        Ok(self)
    }

    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database_path is empty".to_string()));
        }
        if self.busy_timeout_ms == 0 {
            return Err(ConfigError::Invalid("busy_timeout_ms must be positive".to_string()));
        }
        if self.event_channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "event_channel_capacity must be positive".to_string(),
            ));
        }
        if self.search_min_term_length == 0 {
            return Err(ConfigError::Invalid(
                "search_min_term_length must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { name, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.event_channel_capacity, 128);
        assert_eq!(config.search_min_term_length, 3);
    }

    #[test]
    fn test_overlay_from_environment() {
        let vars: HashMap<&str, &str> = [
            (DB_PATH_ENV, "/tmp/pages.db"),
            (BUSY_TIMEOUT_ENV, " 250 "),
        ]
        .into_iter()
        .collect();

        let config = EngineConfig::default()
            .overlay(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/pages.db"));
        assert_eq!(config.busy_timeout_ms, 250);
        assert_eq!(config.search_min_term_length, 3);
    }

    #[test]
    fn test_invalid_environment_value() {
        let err = EngineConfig::default()
            .overlay(|name| (name == SEARCH_MIN_TERM_LENGTH_ENV).then(|| "three".to_string()))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidEnv {
                name: SEARCH_MIN_TERM_LENGTH_ENV,
                value: "three".to_string()
            }
        );
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = EngineConfig::default();
        config.event_channel_capacity = 0;
        assert!(config.validate().is_err());

        let config = EngineConfig::default().with_database_path("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "busy_timeout_ms": 100, "default_order": "reverse" }"#)
                .unwrap();
        assert_eq!(config.busy_timeout_ms, 100);
        assert!(matches!(config.default_order, PageOrder::Reverse));
        assert!(config.include_unpublished);
    }
}
