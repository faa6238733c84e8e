//! Client configuration.

use std::env::VarError;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::http::RetryPolicy;

/// Hosted service endpoint used when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "https://api.yod.agames.ai";

/// Default time allowed for one whole request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time allowed to establish a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Source of environment variables, abstracted for tests.
#[cfg_attr(test, mockall::automock)]
pub trait EnvSource {
    fn var(&self, key: &str) -> Result<String, VarError>;
}

/// Reads from the process environment.
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Result<String, VarError> {
        std::env::var(key)
    }
}

#[derive(Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: String,
    /// Sent as a bearer credential; takes precedence over `bearer_token`.
    pub api_key: Option<String>,
    pub bearer_token: Option<String>,
    /// Identity header for development deployments.
    pub user_id: Option<String>,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub retry: RetryPolicy,
    /// Merged after the standard headers, so they can override them.
    pub headers: Vec<(String, String)>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            bearer_token: None,
            user_id: None,
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            retry: RetryPolicy::default(),
            headers: Vec::new(),
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_deref().map(mask_secret))
            .field("bearer_token", &self.bearer_token.as_deref().map(mask_secret))
            .field("user_id", &self.user_id)
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("retry", &self.retry)
            .field("headers", &self.headers.iter().map(|(k, _)| k).collect::<Vec<_>>())
            .finish()
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Builds a configuration from `MEMCLIENT_*` environment variables.
    ///
    /// Unset or empty variables keep their defaults; malformed numbers are rejected.
    pub fn from_env(env: &impl EnvSource) -> Result<Self> {
        let mut config = Self::default();
        let var = |key: &str| env.var(key).ok().filter(|value| !value.trim().is_empty());

        if let Some(base_url) = var("MEMCLIENT_BASE_URL") {
            config.base_url = base_url;
        }
        config.api_key = var("MEMCLIENT_API_KEY");
        config.bearer_token = var("MEMCLIENT_TOKEN");
        config.user_id = var("MEMCLIENT_USER_ID");

        if let Some(timeout) = var("MEMCLIENT_TIMEOUT") {
            let seconds: f64 = timeout.trim().parse().map_err(|_| {
                Error::Config(format!("MEMCLIENT_TIMEOUT is not a number: {}", timeout))
            })?;
            config.timeout = Duration::try_from_secs_f64(seconds).map_err(|_| {
                Error::Config(format!("MEMCLIENT_TIMEOUT is out of range: {}", timeout))
            })?;
        }

        if let Some(retries) = var("MEMCLIENT_MAX_RETRIES") {
            config.retry.max_retries = retries.trim().parse().map_err(|_| {
                Error::Config(format!("MEMCLIENT_MAX_RETRIES is not a count: {}", retries))
            })?;
        }

        Ok(config)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("invalid base URL {:?}: {}", self.base_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "base URL must use http or https, got {}",
                url.scheme()
            )));
        }
        if self.timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(Error::Config("timeouts must be greater than zero".to_string()));
        }
        self.retry.validate()
    }

    /// Joins the base URL and an API path without doubling or dropping slashes.
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Keeps the first and last few characters of a secret for log output.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 12 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}*********{}", head, tail)
}
