//! Client configuration.

use std::env;
use std::time::Duration;

use thiserror::Error;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable holding the control plane base URL.
pub const ENV_API_URL: &str = "STRATUS_API_URL";

/// Environment variable holding the API token.
pub const ENV_API_TOKEN: &str = "STRATUS_API_TOKEN";

/// Errors building a configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),
}

/// Connection settings for the control plane API.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the control plane, e.g. `https://api.stratus.example`.
    pub base_url: String,
    /// Bearer token presented on every request.
    pub token: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// User-Agent header value.
    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("stratus-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Read [`ENV_API_URL`] and [`ENV_API_TOKEN`] from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = env::var(ENV_API_URL).map_err(|_| ConfigError::MissingEnv(ENV_API_URL))?;
        let token = env::var(ENV_API_TOKEN).map_err(|_| ConfigError::MissingEnv(ENV_API_TOKEN))?;
        Ok(Self::new(base_url, token))
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the User-Agent header.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}
