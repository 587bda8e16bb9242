//! Credential validation service.
//!
//! Validates a candidate API key with one minimal non-streaming upstream
//! call. The key is used for the probe only; persistence (and whether a
//! failed key is discarded) is the host application's concern.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

use crate::auth::{ApiKeyAuth, AuthProvider};
use crate::errors::{classify_failure, WidnError};
use crate::transport::{HttpMethod, HttpRequest, HttpTransport};
use crate::types::chat::{CompletionRequest, Message};
use crate::types::models::known;

/// Confirmation message returned on successful validation.
pub const CREDENTIALS_VALID_MESSAGE: &str =
    "Credentials are valid. The integration is ready to use.";

/// Credential validation service.
pub struct CredentialsService {
    transport: Arc<dyn HttpTransport>,
}

impl CredentialsService {
    /// Creates a new credentials service.
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Validates an API key with a minimal probe completion.
    ///
    /// Returns a confirmation message on success. On failure the error
    /// carries the best available upstream diagnostic, classified so rate
    /// limiting stays distinguishable from an invalid key.
    #[instrument(skip(self, api_key))]
    pub async fn validate(&self, api_key: &str) -> Result<String, WidnError> {
        let auth = ApiKeyAuth::from_string(api_key);
        auth.validate()?;

        let probe = CompletionRequest::builder()
            .model(known::VESUVIUS)
            .message(Message::user("Say hello"))
            .temperature(0.2)
            .max_tokens(50)
            .stream(false)
            .build()?;

        let body = serde_json::to_vec(&probe)?;

        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        auth.apply_auth(&mut headers);

        let request = HttpRequest {
            method: HttpMethod::Post,
            path: "completions".to_string(),
            headers,
            body: Some(body),
            timeout: None,
        };

        let response = self
            .transport
            .send(request)
            .await
            .map_err(WidnError::from_transport)?;

        if !response.is_success() {
            return Err(classify_failure(
                response.status,
                &response.body,
                response.retry_after(),
            ));
        }

        Ok(CREDENTIALS_VALID_MESSAGE.to_string())
    }
}

impl std::fmt::Debug for CredentialsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsService").finish()
    }
}
