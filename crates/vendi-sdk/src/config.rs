use std::time::Duration;

use crate::error::{Result, VendiError};

pub const DEFAULT_BASE_URL: &str = "https://api.vendi-ai.com";

/// Client settings.
///
/// Environment variables read by [`VendiConfig::from_env`]:
/// - `VENDI_API_KEY`: bearer token (required before a client is built)
/// - `VENDI_API_URL`: platform base URL (default: `https://api.vendi-ai.com`)
/// - `VENDI_PROJECT_ID`: sent as `X-Project-Id` when set
/// - `VENDI_CONNECT_TIMEOUT_SECS` (default: 3)
/// - `VENDI_REQUEST_TIMEOUT_SECS` (default: 300)
/// - `VENDI_BATCH_POLL_INTERVAL_SECS` (default: 5)
/// - `VENDI_BATCH_TIMEOUT_SECS` (default: 3600)
#[derive(Debug, Clone)]
pub struct VendiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub project_id: Option<String>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Defaults used by `run_batch_job` and `await_completion_default`.
    pub batch_poll_interval: Duration,
    pub batch_timeout: Duration,
}

impl Default for VendiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            project_id: None,
            connect_timeout: Duration::from_secs(3),
            request_timeout: Duration::from_secs(300),
            batch_poll_interval: Duration::from_secs(5),
            batch_timeout: Duration::from_secs(3600),
        }
    }
}

fn env_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

impl VendiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var("VENDI_API_KEY").ok().filter(|v| !v.is_empty()),
            base_url: std::env::var("VENDI_API_URL").unwrap_or(defaults.base_url),
            project_id: std::env::var("VENDI_PROJECT_ID").ok().filter(|v| !v.is_empty()),
            connect_timeout: env_secs("VENDI_CONNECT_TIMEOUT_SECS", defaults.connect_timeout),
            request_timeout: env_secs("VENDI_REQUEST_TIMEOUT_SECS", defaults.request_timeout),
            batch_poll_interval: env_secs(
                "VENDI_BATCH_POLL_INTERVAL_SECS",
                defaults.batch_poll_interval,
            ),
            batch_timeout: env_secs("VENDI_BATCH_TIMEOUT_SECS", defaults.batch_timeout),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_batch_poll_interval(mut self, interval: Duration) -> Self {
        self.batch_poll_interval = interval;
        self
    }

    pub fn with_batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout = timeout;
        self
    }

    /// Check the settings a client needs and return the normalized base URL.
    pub(crate) fn validate(&self) -> Result<String> {
        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => {}
            _ => return Err(VendiError::Config("VENDI_API_KEY is not set".to_string())),
        }
        let base = self.base_url.trim().trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(VendiError::Config(format!(
                "invalid base URL `{}`: expected http:// or https://",
                self.base_url
            )));
        }
        if self.batch_poll_interval.is_zero() {
            return Err(VendiError::Config(
                "batch poll interval must be greater than zero".to_string(),
            ));
        }
        Ok(base.to_string())
    }
}
