use fixpix_core::error::CoreError;
use fixpix_core::settings::Settings;
use fixpix_inference::config::ClientConfig;

/// Everything the worker reads from its environment.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub client: ClientConfig,
    /// Settings applied to every file.
    pub settings: Settings,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var           | Default  |
    /// |-------------------|----------|
    /// | `FIXPIX_SETTINGS` | `{}`     |
    ///
    /// plus the endpoint variables read by [`ClientConfig::from_env`].
    pub fn from_env() -> Result<Self, CoreError> {
        let client = ClientConfig::from_env()?;
        let settings = match std::env::var("FIXPIX_SETTINGS") {
            Ok(raw) => parse_settings(&raw)?,
            Err(_) => Settings::default(),
        };
        Ok(Self { client, settings })
    }
}

/// Parse a settings JSON object, merged over the defaults.
pub fn parse_settings(raw: &str) -> Result<Settings, CoreError> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| CoreError::Validation(format!("FIXPIX_SETTINGS is not valid JSON: {e}")))?;
    Settings::from_stored(Some(&value))
}
