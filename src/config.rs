//! Runtime configuration
//!
//! Read from the process environment (after `.env` has been loaded by the
//! binary). CLI flags override individual fields.

use crate::error::{BiError, Result};
use std::time::Duration;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:///data/leads_scored_segmentation.db";
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_BUSY_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct BiConfig {
    pub database_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub request_timeout: Duration,
    /// How long SQLite waits on a locked database before failing.
    pub busy_timeout: Duration,
}

impl Default for BiConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            busy_timeout: Duration::from_secs(DEFAULT_BUSY_TIMEOUT_SECS),
        }
    }
}

impl BiConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let secs = |key: &str| {
            get(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
        };
        let request_timeout = secs("LLM_TIMEOUT_SECS").unwrap_or(defaults.request_timeout);
        let busy_timeout = secs("DB_BUSY_TIMEOUT_SECS").unwrap_or(defaults.busy_timeout);

        Self {
            database_url: get("DATABASE_URL").unwrap_or(defaults.database_url),
            api_key: get("ANTHROPIC_API_KEY"),
            model: get("CLAUDE_MODEL").unwrap_or(defaults.model),
            base_url: get("ANTHROPIC_BASE_URL").unwrap_or(defaults.base_url),
            request_timeout,
            busy_timeout,
        }
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| BiError::Configuration("ANTHROPIC_API_KEY not set".to_string()))
    }
}
