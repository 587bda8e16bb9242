//! Widn API client.
//!
//! Provides the main client interface for relaying completion requests to
//! the Widn API.

use std::sync::Arc;

use crate::auth::{ApiKeyAuth, AuthProvider};
use crate::config::{WidnConfig, WidnConfigBuilder};
use crate::errors::WidnResult;
use crate::resilience::{RetryConfig, RetryPolicy};
use crate::services::{CompletionsService, CredentialsService, ModelsService};
use crate::transport::{HttpTransport, HttpTransportImpl};

/// The main Widn client.
///
/// Provides access to completion dispatch (streaming and non-streaming),
/// credential validation, and the model catalog.
///
/// # Example
///
/// ```rust,no_run
/// use widn_client::{WidnClient, CompletionRequest};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = WidnClient::builder()
///         .api_key("widn_your_api_key")
///         .build()?;
///
///     let request = CompletionRequest::builder()
///         .model("vesuvius")
///         .user("Hello, Widn!")
///         .build()?;
///
///     let response = client.completions().create(request).await?;
///     println!("{}", response.content().unwrap_or_default());
///     Ok(())
/// }
/// ```
pub struct WidnClient {
    config: WidnConfig,
    completions_service: CompletionsService,
    credentials_service: CredentialsService,
    models_service: ModelsService,
}

impl WidnClient {
    /// Creates a new client builder.
    pub fn builder() -> WidnClientBuilder {
        WidnClientBuilder::new()
    }

    /// Creates a client from environment variables.
    ///
    /// Reads `WIDN_API_KEY` and optionally `WIDN_BASE_URL`, `WIDN_TIMEOUT`,
    /// and `WIDN_MAX_RETRIES`.
    pub fn from_env() -> WidnResult<Self> {
        let config = WidnConfig::from_env()?;
        WidnClientBuilder::from_config(config).build()
    }

    /// Creates a client from an API key.
    pub fn from_api_key(api_key: impl Into<String>) -> WidnResult<Self> {
        WidnClientBuilder::new().api_key(api_key).build()
    }

    /// Returns the completions service.
    pub fn completions(&self) -> &CompletionsService {
        &self.completions_service
    }

    /// Returns the credentials service.
    pub fn credentials(&self) -> &CredentialsService {
        &self.credentials_service
    }

    /// Returns the models service.
    pub fn models(&self) -> &ModelsService {
        &self.models_service
    }

    /// Returns the configuration.
    pub fn config(&self) -> &WidnConfig {
        &self.config
    }
}

impl std::fmt::Debug for WidnClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidnClient")
            .field("config", &self.config)
            .finish()
    }
}

/// Builder for the Widn client.
pub struct WidnClientBuilder {
    config_builder: WidnConfigBuilder,
    transport: Option<Arc<dyn HttpTransport>>,
    auth: Option<Arc<dyn AuthProvider>>,
    retry_config: Option<RetryConfig>,
}

impl WidnClientBuilder {
    /// Creates a new client builder.
    pub fn new() -> Self {
        Self {
            config_builder: WidnConfigBuilder::new(),
            transport: None,
            auth: None,
            retry_config: None,
        }
    }

    /// Creates a builder from an existing configuration.
    pub fn from_config(config: WidnConfig) -> Self {
        Self {
            config_builder: WidnConfigBuilder::new()
                .api_key(config.api_key())
                .base_url(&config.base_url)
                .timeout(config.timeout)
                .max_retries(config.max_retries),
            transport: None,
            auth: None,
            retry_config: None,
        }
    }

    /// Sets the API key.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.api_key(api_key);
        self
    }

    /// Sets the API key from an environment variable.
    pub fn api_key_from_env(mut self, var_name: &str) -> WidnResult<Self> {
        self.config_builder = self.config_builder.api_key_from_env(var_name)?;
        Ok(self)
    }

    /// Sets the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.base_url(base_url);
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config_builder = self.config_builder.timeout(timeout);
        self
    }

    /// Sets the timeout in seconds.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config_builder = self.config_builder.timeout_secs(secs);
        self
    }

    /// Sets the maximum retry attempts for non-streaming calls.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config_builder = self.config_builder.max_retries(retries);
        self
    }

    /// Sets a custom transport.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets a custom auth provider.
    pub fn auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Sets the retry configuration.
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry_config = Some(config);
        self
    }

    /// Builds the client.
    pub fn build(self) -> WidnResult<WidnClient> {
        let config = self.config_builder.build()?;

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(t) => t,
            None => Arc::new(
                HttpTransportImpl::new(&config.base_url, config.timeout).map_err(|e| {
                    crate::errors::WidnError::Configuration {
                        message: e.to_string(),
                    }
                })?,
            ),
        };

        let auth: Arc<dyn AuthProvider> = match self.auth {
            Some(a) => a,
            None => Arc::new(ApiKeyAuth::from_string(config.api_key())),
        };

        let retry_config = self
            .retry_config
            .unwrap_or_else(|| RetryConfig::default().max_retries(config.max_retries));
        let retry = Arc::new(RetryPolicy::new(retry_config));

        let completions_service =
            CompletionsService::new(Arc::clone(&transport), Arc::clone(&auth), retry);
        let credentials_service = CredentialsService::new(Arc::clone(&transport));
        let models_service = ModelsService::new();

        Ok(WidnClient {
            config,
            completions_service,
            credentials_service,
            models_service,
        })
    }
}

impl Default for WidnClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockTransport;

    #[test]
    fn test_builder_requires_api_key() {
        let result = WidnClientBuilder::new().build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_with_api_key() {
        let client = WidnClientBuilder::new()
            .api_key("widn_test_key_12345")
            .build()
            .unwrap();

        assert_eq!(client.config().base_url, crate::config::DEFAULT_BASE_URL);
    }

    #[test]
    fn test_builder_with_custom_transport() {
        let client = WidnClientBuilder::new()
            .api_key("widn_test_key")
            .transport(Arc::new(MockTransport::new()))
            .build()
            .unwrap();

        assert_eq!(client.models().list().len(), 2);
    }

    #[test]
    fn test_from_api_key() {
        let client = WidnClient::from_api_key("widn_test_key").unwrap();
        assert_eq!(client.config().api_key_hint(), "..._key");
    }
}
