//! Process configuration read from the environment

use crate::knowledge::DEFAULT_OWNER_NAME;
use crate::llm::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_SESSION_IDLE: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid FOLIO_PORT value: {0}")]
    InvalidPort(String),
    #[error("Invalid FOLIO_SESSION_IDLE_SECS value: {0}")]
    InvalidIdleTimeout(String),
}

/// Settings for the assistant service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Gemini credential; `None` leaves the assistant unconfigured
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub contact_relay_url: Option<String>,
    pub owner_name: String,
    pub knowledge_path: Option<PathBuf>,
    pub port: u16,
    /// Sessions untouched this long are ended
    pub session_idle_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            contact_relay_url: None,
            owner_name: DEFAULT_OWNER_NAME.to_string(),
            knowledge_path: None,
            port: DEFAULT_PORT,
            session_idle_timeout: DEFAULT_SESSION_IDLE,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup; blank values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let port = match get("FOLIO_PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidPort(raw))?,
            None => defaults.port,
        };

        let session_idle_timeout = match get("FOLIO_SESSION_IDLE_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => return Err(ConfigError::InvalidIdleTimeout(raw)),
            },
            None => defaults.session_idle_timeout,
        };

        Ok(Self {
            api_key: get("FOLIO_GEMINI_API_KEY").or_else(|| get("GEMINI_API_KEY")),
            model: get("FOLIO_MODEL").unwrap_or(defaults.model),
            base_url: get("FOLIO_GEMINI_BASE_URL").unwrap_or(defaults.base_url),
            contact_relay_url: get("FOLIO_CONTACT_RELAY_URL"),
            owner_name: get("FOLIO_OWNER_NAME").unwrap_or(defaults.owner_name),
            knowledge_path: get("FOLIO_KNOWLEDGE_PATH").map(PathBuf::from),
            port,
            session_idle_timeout,
        })
    }
}
