use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::keypool::{KeyPool, KeyPoolError};
use crate::llm::DEFAULT_MODEL;

/// Comma-separated API keys seeding the pool.
pub const ENV_API_KEYS: &str = "PAGEPILOT_API_KEYS";
/// Model id override; defaults to the crate's default model.
pub const ENV_MODEL: &str = "PAGEPILOT_MODEL";
/// Endpoint base URL override, mainly for proxies and tests.
pub const ENV_BASE_URL: &str = "PAGEPILOT_BASE_URL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

/// The shape persisted under the `LOG.CONFIG` settings key. The crate
/// itself never installs a logger; consumers read this to configure
/// theirs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LogConfig {
    #[serde(default)]
    pub level: LogLevel,
    /// Module prefixes to enable at `level`; empty means everything.
    #[serde(default)]
    pub namespaces: Vec<String>,
}

/// Per-step fallbacks applied when a workflow author leaves a knob
/// unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineDefaults {
    pub step_timeout_ms: u64,
    pub retry_delay_ms: u64,
    pub wait_timeout_ms: u64,
    pub wait_interval_ms: u64,
}

impl Default for EngineDefaults {
    fn default() -> Self {
        Self {
            step_timeout_ms: 30_000,
            retry_delay_ms: 1000,
            wait_timeout_ms: 30_000,
            wait_interval_ms: 500,
        }
    }
}

pub fn model_from_env() -> String {
    std::env::var(ENV_MODEL).unwrap_or_else(|_| DEFAULT_MODEL.to_string())
}

/// Endpoint override from the environment; values that do not parse as
/// absolute URLs are ignored with a warning.
pub fn base_url_from_env() -> Option<String> {
    let raw = std::env::var(ENV_BASE_URL).ok()?;
    match url::Url::parse(&raw) {
        Ok(_) => Some(raw),
        Err(e) => {
            log::warn!("ignoring invalid {ENV_BASE_URL}: {e}");
            None
        }
    }
}

/// Build a key pool from `PAGEPILOT_API_KEYS`. Missing or empty
/// environment yields an empty pool rather than an error.
pub fn key_pool_from_env() -> Result<KeyPool, KeyPoolError> {
    let raw = std::env::var(ENV_API_KEYS).unwrap_or_default();
    let secrets = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .enumerate()
        .map(|(i, s)| (SecretString::from(s.to_string()), format!("env-key-{i}")));
    KeyPool::from_secrets(secrets)
}
