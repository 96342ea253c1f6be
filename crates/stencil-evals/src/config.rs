use serde::{Deserialize, Serialize};

/// Connection settings for the grading service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalsConfig {
    /// Base URL of the evals API.
    #[serde(default = "default_url")]
    pub url: String,

    /// Bearer API key.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries for transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

impl Default for EvalsConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            api_key: None,
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl EvalsConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `STENCIL_EVALS_URL` | API base URL |
    /// | `STENCIL_EVALS_API_KEY` | Bearer API key |
    /// | `STENCIL_EVALS_TIMEOUT` | Request timeout in seconds |
    /// | `STENCIL_EVALS_MAX_RETRIES` | Retries for transient failures |
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("STENCIL_EVALS_URL").unwrap_or_else(|_| default_url()),
            api_key: std::env::var("STENCIL_EVALS_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            timeout_secs: std::env::var("STENCIL_EVALS_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_timeout),
            max_retries: std::env::var("STENCIL_EVALS_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_max_retries),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }
}
