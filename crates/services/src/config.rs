use std::env;
use std::time::Duration;

use progress_core::model::NOTIFICATION_HISTORY_LIMIT;
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_TOAST_TIMEOUT_SECS: u64 = 6;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Runtime knobs for the progress and notification engine.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub api_base_url: Url,
    pub toast_timeout: Duration,
    /// `None` disables polling for server notifications.
    pub poll_interval: Option<Duration>,
    pub history_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base_url: Url::parse(DEFAULT_API_BASE_URL)
                .unwrap_or_else(|_| unreachable!("default API URL is valid")),
            toast_timeout: Duration::from_secs(DEFAULT_TOAST_TIMEOUT_SECS),
            poll_interval: Some(Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS)),
            history_limit: NOTIFICATION_HISTORY_LIMIT,
        }
    }
}

impl EngineConfig {
    /// Load configuration from `LEARN_*` environment variables, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = non_blank(lookup("LEARN_API_BASE_URL")) {
            config.api_base_url =
                Url::parse(&raw).map_err(|source| ConfigError::InvalidBaseUrl { raw, source })?;
        }

        if let Some(secs) = parse_number(&lookup, "LEARN_TOAST_TIMEOUT_SECS")? {
            config.toast_timeout = Duration::from_secs(secs);
        }

        if let Some(secs) = parse_number(&lookup, "LEARN_NOTIFICATION_POLL_SECS")? {
            config.poll_interval = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Some(limit) = parse_number(&lookup, "LEARN_NOTIFICATION_HISTORY_LIMIT")? {
            config.history_limit = usize::try_from(limit).unwrap_or(usize::MAX).max(1);
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_api_base_url(mut self, url: Url) -> Self {
        self.api_base_url = url;
        self
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}

fn parse_number(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<u64>, ConfigError> {
    non_blank(lookup(var))
        .map(|raw| {
            raw.parse::<u64>()
                .map_err(|_| ConfigError::InvalidNumber { var, raw })
        })
        .transpose()
}
