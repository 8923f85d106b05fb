//! Client configuration, read from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use freightdesk_core::page::DEFAULT_PAGE_SIZE;
use thiserror::Error;

use crate::envelope::EnvelopeShape;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api/v1";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_REPLAY_ATTEMPTS: u32 = 5;
pub const DEFAULT_REPLAY_RETRY_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key} ({value:?}): {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL including the API prefix, without a trailing slash.
    pub api_url: String,
    /// List-response envelope the deployment's backend serves.
    pub envelope: EnvelopeShape,
    /// Location of the state database; `None` means the OS data directory.
    pub state_path: Option<PathBuf>,
    pub request_timeout: Duration,
    /// Replay attempts before a queued write is dead-lettered.
    pub max_replay_attempts: u32,
    /// Delay before writes kept after a server error are tried again.
    pub replay_retry_interval: Duration,
    pub page_size: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            envelope: EnvelopeShape::default(),
            state_path: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_replay_attempts: DEFAULT_MAX_REPLAY_ATTEMPTS,
            replay_retry_interval: DEFAULT_REPLAY_RETRY_INTERVAL,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ClientConfig {
    /// Load from `FREIGHTDESK_*` environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = lookup("FREIGHTDESK_API_URL") {
            config.api_url = parse_url(&url)?;
        }
        if let Some(raw) = lookup("FREIGHTDESK_ENVELOPE") {
            config.envelope = EnvelopeShape::from_str(&raw).map_err(|reason| ConfigError::Invalid {
                key: "FREIGHTDESK_ENVELOPE",
                value: raw.clone(),
                reason,
            })?;
        }
        if let Some(path) = lookup("FREIGHTDESK_STATE_PATH") {
            if !path.trim().is_empty() {
                config.state_path = Some(PathBuf::from(path));
            }
        }
        if let Some(raw) = lookup("FREIGHTDESK_REQUEST_TIMEOUT_SECS") {
            let secs = parse_positive("FREIGHTDESK_REQUEST_TIMEOUT_SECS", &raw)?;
            config.request_timeout = Duration::from_secs(u64::from(secs));
        }
        if let Some(raw) = lookup("FREIGHTDESK_MAX_REPLAY_ATTEMPTS") {
            config.max_replay_attempts = parse_positive("FREIGHTDESK_MAX_REPLAY_ATTEMPTS", &raw)?;
        }
        if let Some(raw) = lookup("FREIGHTDESK_REPLAY_RETRY_SECS") {
            let secs = parse_positive("FREIGHTDESK_REPLAY_RETRY_SECS", &raw)?;
            config.replay_retry_interval = Duration::from_secs(u64::from(secs));
        }
        if let Some(raw) = lookup("FREIGHTDESK_PAGE_SIZE") {
            config.page_size = parse_positive("FREIGHTDESK_PAGE_SIZE", &raw)?;
        }

        Ok(config)
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

fn parse_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::Invalid {
            key: "FREIGHTDESK_API_URL",
            value: raw.to_string(),
            reason: "expected an http(s) URL".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

fn parse_positive(key: &'static str, raw: &str) -> Result<u32, ConfigError> {
    match raw.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        Ok(_) => Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
            reason: "must be greater than zero".to_string(),
        }),
        Err(e) => Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
            reason: e.to_string(),
        }),
    }
}
