use std::time::Duration;

use fixpix_core::error::CoreError;

/// Endpoint configuration for [`HttpClient`](crate::http::HttpClient).
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the AI inference server.
    pub ai_base_url: String,
    /// Base URL of the project backend (also the media root).
    pub api_base_url: String,
    /// Per-request timeout. `None` means requests may block indefinitely,
    /// matching the pipeline's lack of per-stage timeouts.
    pub request_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ai_base_url: "http://localhost:8001".into(),
            api_base_url: "http://localhost:8000".into(),
            request_timeout: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                 |
    /// |-------------------------------|-------------------------|
    /// | `FIXPIX_AI_URL`               | `http://localhost:8001` |
    /// | `FIXPIX_API_URL`              | `http://localhost:8000` |
    /// | `FIXPIX_REQUEST_TIMEOUT_SECS` | unset (no timeout)      |
    pub fn from_env() -> Result<Self, CoreError> {
        let defaults = Self::default();

        let ai_base_url = std::env::var("FIXPIX_AI_URL").unwrap_or(defaults.ai_base_url);
        let api_base_url = std::env::var("FIXPIX_API_URL").unwrap_or(defaults.api_base_url);

        let request_timeout = match std::env::var("FIXPIX_REQUEST_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    CoreError::Validation(format!(
                        "FIXPIX_REQUEST_TIMEOUT_SECS must be a whole number of seconds, got '{raw}'"
                    ))
                })?;
                Some(Duration::from_secs(secs))
            }
            Err(_) => None,
        };

        Ok(Self {
            ai_base_url: ai_base_url.trim_end_matches('/').to_string(),
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            request_timeout,
        })
    }
}
