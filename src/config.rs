//! Settings - Provider Keys and Polling Bounds from the Environment
//!
//! Variables map one-to-one onto fields (`BANNERBEAR_API_KEY` ->
//! `bannerbear_api_key`). A `.env` file in the working directory is loaded
//! first when present.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::collaborators::{DeepAiClient, FreeImageHost, GeminiClient};
use crate::provider::{BannerbearProvider, DEFAULT_BASE_URL};
use crate::render::{PollPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid settings: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub bannerbear_api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub bannerbear_base_url: String,
    #[serde(default)]
    pub freeimage_api_key: Option<String>,
    #[serde(default)]
    pub deepai_api_key: Option<String>,
    #[serde(default)]
    pub gemini_api_key: Option<String>,
    #[serde(default = "default_max_attempts")]
    pub render_max_attempts: u32,
    #[serde(default = "default_interval_ms")]
    pub render_poll_interval_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

fn default_timeout_secs() -> u64 {
    10
}

impl Settings {
    /// Load from the process environment, after an optional `.env`
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenv::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let settings: Settings =
            envy::from_iter(vars).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if settings.http_timeout_secs == 0 {
            return Err(ConfigError::Invalid("HTTP_TIMEOUT_SECS must be at least 1".into()));
        }
        Ok(settings)
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(
            self.render_max_attempts,
            Duration::from_millis(self.render_poll_interval_ms),
        )
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn render_provider(&self) -> Result<BannerbearProvider, ConfigError> {
        let key = required(&self.bannerbear_api_key, "BANNERBEAR_API_KEY")?;
        Ok(BannerbearProvider::new(key, &self.bannerbear_base_url, self.http_timeout()))
    }

    pub fn image_host(&self) -> Result<FreeImageHost, ConfigError> {
        let key = required(&self.freeimage_api_key, "FREEIMAGE_API_KEY")?;
        Ok(FreeImageHost::new(key, self.http_timeout()))
    }

    pub fn text_to_image(&self) -> Result<DeepAiClient, ConfigError> {
        let key = required(&self.deepai_api_key, "DEEPAI_API_KEY")?;
        Ok(DeepAiClient::new(key, self.http_timeout()))
    }

    pub fn language_model(&self) -> Result<GeminiClient, ConfigError> {
        let key = required(&self.gemini_api_key, "GEMINI_API_KEY")?;
        Ok(GeminiClient::new(key, self.http_timeout()))
    }
}

fn required<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str, ConfigError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_apply() {
        let settings = Settings::from_vars(vars(&[])).unwrap();
        assert_eq!(settings.bannerbear_base_url, DEFAULT_BASE_URL);
        assert_eq!(settings.poll_policy(), PollPolicy::default());
        assert_eq!(settings.http_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_overrides_parse() {
        let settings = Settings::from_vars(vars(&[
            ("BANNERBEAR_API_KEY", "bb_key"),
            ("RENDER_MAX_ATTEMPTS", "5"),
            ("RENDER_POLL_INTERVAL_MS", "250"),
            ("UNRELATED", "ignored"),
        ]))
        .unwrap();
        assert_eq!(settings.bannerbear_api_key.as_deref(), Some("bb_key"));
        assert_eq!(
            settings.poll_policy(),
            PollPolicy::new(5, Duration::from_millis(250))
        );
        assert!(settings.render_provider().is_ok());
    }

    #[test]
    fn test_missing_or_blank_key_is_reported() {
        let settings = Settings::from_vars(vars(&[("FREEIMAGE_API_KEY", "  ")])).unwrap();
        assert!(matches!(
            settings.render_provider(),
            Err(ConfigError::Missing("BANNERBEAR_API_KEY"))
        ));
        assert!(matches!(
            settings.image_host(),
            Err(ConfigError::Missing("FREEIMAGE_API_KEY"))
        ));
        assert!(matches!(
            settings.language_model(),
            Err(ConfigError::Missing("GEMINI_API_KEY"))
        ));

        let settings = Settings::from_vars(vars(&[("GEMINI_API_KEY", "gm_key")])).unwrap();
        assert!(settings.language_model().is_ok());
    }

    #[test]
    fn test_bad_numbers_are_invalid() {
        let result = Settings::from_vars(vars(&[("RENDER_MAX_ATTEMPTS", "lots")]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
