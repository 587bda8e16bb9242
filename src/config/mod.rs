//! Configuration module for the Widn client.
//!
//! Provides configuration management including API keys, base URLs,
//! timeouts, and retry settings. Timeouts are always bounded: the client
//! never waits indefinitely for a first byte or for transfer completion.

use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use crate::errors::{WidnError, WidnResult};

/// Default base URL for the Widn API.
pub const DEFAULT_BASE_URL: &str = "https://api.widn.ai";

/// Default request timeout (60 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default maximum retry attempts.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Configuration for the Widn client.
#[derive(Clone)]
pub struct WidnConfig {
    /// API key for authentication (stored securely).
    pub(crate) api_key: SecretString,
    /// Base URL for API requests.
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum retry attempts for non-streaming calls.
    pub max_retries: u32,
}

impl WidnConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> WidnConfigBuilder {
        WidnConfigBuilder::new()
    }

    /// Creates a configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `WIDN_API_KEY` (required): API key for authentication
    /// - `WIDN_BASE_URL` (optional): Custom base URL
    /// - `WIDN_TIMEOUT` (optional): Request timeout in seconds
    /// - `WIDN_MAX_RETRIES` (optional): Maximum retry attempts
    pub fn from_env() -> WidnResult<Self> {
        let api_key = std::env::var("WIDN_API_KEY").map_err(|_| WidnError::Configuration {
            message: "WIDN_API_KEY environment variable not set".to_string(),
        })?;

        let mut builder = WidnConfigBuilder::new().api_key(api_key);

        if let Ok(base_url) = std::env::var("WIDN_BASE_URL") {
            builder = builder.base_url(base_url);
        }

        if let Ok(timeout_str) = std::env::var("WIDN_TIMEOUT") {
            if let Ok(timeout_secs) = timeout_str.parse::<u64>() {
                builder = builder.timeout(Duration::from_secs(timeout_secs));
            }
        }

        if let Ok(retries_str) = std::env::var("WIDN_MAX_RETRIES") {
            if let Ok(retries) = retries_str.parse::<u32>() {
                builder = builder.max_retries(retries);
            }
        }

        builder.build()
    }

    /// Returns the API key (exposing the secret).
    pub(crate) fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    /// Returns the API key hint (last 4 characters) for debugging.
    pub fn api_key_hint(&self) -> String {
        let key = self.api_key.expose_secret();
        if key.len() > 4 {
            format!("...{}", &key[key.len() - 4..])
        } else {
            "****".to_string()
        }
    }

}

impl std::fmt::Debug for WidnConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidnConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

/// Builder for `WidnConfig`.
#[derive(Default)]
pub struct WidnConfigBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    timeout: Option<Duration>,
    max_retries: Option<u32>,
}

impl WidnConfigBuilder {
    /// Creates a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the API key from an environment variable.
    pub fn api_key_from_env(mut self, var_name: &str) -> WidnResult<Self> {
        let api_key = std::env::var(var_name).map_err(|_| WidnError::Configuration {
            message: format!("Environment variable {} not set", var_name),
        })?;
        self.api_key = Some(api_key);
        Ok(self)
    }

    /// Sets the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the timeout in seconds.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Some(Duration::from_secs(secs));
        self
    }

    /// Sets the maximum retry attempts.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> WidnResult<WidnConfig> {
        let api_key = self.api_key.ok_or_else(|| WidnError::Configuration {
            message: "API key is required".to_string(),
        })?;

        if api_key.is_empty() {
            return Err(WidnError::Configuration {
                message: "API key cannot be empty".to_string(),
            });
        }

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let parsed = url::Url::parse(&base_url)?;
        if parsed.scheme() != "https" {
            return Err(WidnError::Configuration {
                message: "Base URL must use HTTPS".to_string(),
            });
        }

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        if timeout.is_zero() {
            return Err(WidnError::Configuration {
                message: "Timeout must be greater than zero".to_string(),
            });
        }

        Ok(WidnConfig {
            api_key: SecretString::new(api_key),
            base_url,
            timeout,
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder_success() {
        let config = WidnConfig::builder()
            .api_key("widn_test_api_key_12345")
            .base_url("https://custom.api.widn.ai")
            .timeout(Duration::from_secs(30))
            .max_retries(5)
            .build()
            .unwrap();

        assert_eq!(config.api_key(), "widn_test_api_key_12345");
        assert_eq!(config.base_url, "https://custom.api.widn.ai");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 5);
    }

    #[test]
    fn test_config_builder_defaults() {
        let config = WidnConfig::builder()
            .api_key("widn_test_key")
            .build()
            .unwrap();

        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn test_config_builder_missing_api_key() {
        let result = WidnConfig::builder().build();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_builder_empty_api_key() {
        let result = WidnConfig::builder().api_key("").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_builder_invalid_base_url() {
        let result = WidnConfig::builder()
            .api_key("widn_test_key")
            .base_url("http://insecure.api.widn.ai")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_builder_zero_timeout() {
        let result = WidnConfig::builder()
            .api_key("widn_test_key")
            .timeout(Duration::ZERO)
            .build();
        assert!(result.is_err());
    }

    // All from_env scenarios run in one test: the WIDN_* variables are
    // process-global, and tests in this crate run in parallel.
    #[test]
    fn test_from_env() {
        let clear = || {
            std::env::remove_var("WIDN_API_KEY");
            std::env::remove_var("WIDN_BASE_URL");
            std::env::remove_var("WIDN_TIMEOUT");
            std::env::remove_var("WIDN_MAX_RETRIES");
        };

        // Missing API key is an error.
        clear();
        let result = WidnConfig::from_env();
        assert!(matches!(result, Err(WidnError::Configuration { .. })));

        // Key alone yields the documented defaults.
        std::env::set_var("WIDN_API_KEY", "widn_env_key");
        let config = WidnConfig::from_env().unwrap();
        assert_eq!(config.api_key(), "widn_env_key");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);

        // All four variables are honored.
        std::env::set_var("WIDN_BASE_URL", "https://custom.api.widn.ai");
        std::env::set_var("WIDN_TIMEOUT", "25");
        std::env::set_var("WIDN_MAX_RETRIES", "7");
        let config = WidnConfig::from_env().unwrap();
        assert_eq!(config.base_url, "https://custom.api.widn.ai");
        assert_eq!(config.timeout, Duration::from_secs(25));
        assert_eq!(config.max_retries, 7);

        // Unparseable numeric values fall back to the defaults.
        std::env::set_var("WIDN_TIMEOUT", "soon");
        std::env::set_var("WIDN_MAX_RETRIES", "many");
        let config = WidnConfig::from_env().unwrap();
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);

        clear();
    }

    #[test]
    fn test_api_key_hint() {
        let config = WidnConfig::builder()
            .api_key("widn_secret_key_12345")
            .build()
            .unwrap();

        let hint = config.api_key_hint();
        assert_eq!(hint, "...2345");
        assert!(!hint.contains("secret"));
    }

    #[test]
    fn test_config_debug_redacts_api_key() {
        let config = WidnConfig::builder()
            .api_key("widn_secret_key")
            .build()
            .unwrap();

        let debug_str = format!("{:?}", config);
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("widn_secret_key"));
    }
}
