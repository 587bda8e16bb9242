//! Error types for the Widn client.
//!
//! Provides the error taxonomy for all failure modes, plus the upstream
//! failure classifier that separates rate limiting from generic upstream
//! errors. Malformed stream frames are deliberately absent from this
//! taxonomy: they are skipped per line inside the streaming pipeline and
//! never surface as errors.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for Widn operations.
pub type WidnResult<T> = Result<T, WidnError>;

/// Placeholder diagnostic used when an upstream failure carries no usable
/// message.
pub const GENERIC_UPSTREAM_MESSAGE: &str = "Invalid credentials";

/// Error type for Widn client operations.
#[derive(Debug, Error)]
pub enum WidnError {
    /// Configuration error (invalid API key, base URL, etc.)
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message describing the configuration issue.
        message: String,
    },

    /// Authentication error (invalid or missing API key).
    #[error("Authentication failed: {message}")]
    Authentication {
        /// Error message from the API.
        message: String,
    },

    /// Validation error (request validation failed).
    #[error("Validation error: {message}")]
    Validation {
        /// Error message describing the validation issue.
        message: String,
        /// The parameter that caused the error.
        param: Option<String>,
    },

    /// Rate limit exceeded. Surfaced distinctly so the host can signal
    /// backoff/retry to its own caller instead of degrading to content.
    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        /// Error message.
        message: String,
        /// Duration to wait before retrying, when the upstream provided one.
        retry_after: Option<Duration>,
    },

    /// Generic upstream failure (anything that is not a rate limit).
    #[error("Upstream error (HTTP {status_code}): {message}")]
    Upstream {
        /// Best available diagnostic from the upstream response.
        message: String,
        /// HTTP status code, 0 when unknown.
        status_code: u16,
    },

    /// Network/connection error.
    #[error("Network error: {message}")]
    Network {
        /// Error message.
        message: String,
    },

    /// Timeout error.
    #[error("Request timeout: {message}")]
    Timeout {
        /// Error message.
        message: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message.
        message: String,
    },
}

impl WidnError {
    /// Returns true if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WidnError::RateLimit { .. }
                | WidnError::Upstream { status_code: 500..=504, .. }
                | WidnError::Timeout { .. }
                | WidnError::Network { .. }
        )
    }

    /// Returns the retry-after duration if available.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            WidnError::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        WidnError::Validation {
            message: message.into(),
            param: None,
        }
    }

    /// Creates a validation error with the offending parameter.
    pub fn validation_param(message: impl Into<String>, param: impl Into<String>) -> Self {
        WidnError::Validation {
            message: message.into(),
            param: Some(param.into()),
        }
    }

    /// Creates an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        WidnError::Authentication {
            message: message.into(),
        }
    }
}

/// API error response body.
#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorResponse {
    /// The error details.
    pub error: ApiErrorDetail,
}

/// Detailed API error information.
///
/// The upstream is not consistent about where it reports a numeric status:
/// some responses carry it as `status`, others as `code`, and `code` may
/// also hold a symbolic string. Both fields deserialize leniently so a
/// non-numeric value never discards the rest of the error body.
#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorDetail {
    /// The error message.
    #[serde(default)]
    pub message: Option<String>,
    /// Numeric status carried inside the error body.
    #[serde(default, deserialize_with = "lenient_u16")]
    pub status: Option<u16>,
    /// Numeric code carried inside the error body.
    #[serde(default, deserialize_with = "lenient_u16")]
    pub code: Option<u16>,
}

/// Accepts a number or a numeric string; anything else reads as absent.
fn lenient_u16<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }))
}

/// Classifies a failed upstream call.
///
/// A rate-limit condition is recognized from any of: the HTTP status itself,
/// an error-carried numeric `status` field, or an error-carried numeric
/// `code` field equal to 429. Everything else classifies as [`WidnError::Upstream`]
/// carrying the best available diagnostic: the structured error message when
/// present, otherwise the raw body text, otherwise a fixed placeholder.
pub fn classify_failure(status: u16, body: &[u8], retry_after: Option<Duration>) -> WidnError {
    let detail = serde_json::from_slice::<ApiErrorResponse>(body)
        .ok()
        .map(|r| r.error);

    let carried_status = detail.as_ref().and_then(|d| d.status);
    let carried_code = detail.as_ref().and_then(|d| d.code);

    let message = detail
        .and_then(|d| d.message)
        .filter(|m| !m.is_empty())
        .or_else(|| {
            let text = String::from_utf8_lossy(body).trim().to_string();
            if text.is_empty() { None } else { Some(text) }
        })
        .unwrap_or_else(|| GENERIC_UPSTREAM_MESSAGE.to_string());

    if status == 429 || carried_status == Some(429) || carried_code == Some(429) {
        return WidnError::RateLimit {
            message,
            retry_after,
        };
    }

    WidnError::Upstream {
        message,
        status_code: status,
    }
}

impl WidnError {
    /// Maps a transport-layer failure into the client taxonomy.
    pub(crate) fn from_transport(err: crate::transport::TransportError) -> Self {
        match err {
            crate::transport::TransportError::Timeout { timeout } => WidnError::Timeout {
                message: format!("Request timed out after {:?}", timeout),
            },
            other => WidnError::Network {
                message: other.to_string(),
            },
        }
    }
}

impl From<reqwest::Error> for WidnError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            WidnError::Timeout {
                message: err.to_string(),
            }
        } else if err.is_connect() {
            WidnError::Network {
                message: err.to_string(),
            }
        } else {
            WidnError::Upstream {
                message: err.to_string(),
                status_code: err.status().map(|s| s.as_u16()).unwrap_or(0),
            }
        }
    }
}

impl From<serde_json::Error> for WidnError {
    fn from(err: serde_json::Error) -> Self {
        WidnError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for WidnError {
    fn from(err: url::ParseError) -> Self {
        WidnError::Configuration {
            message: format!("Invalid URL: {}", err),
        }
    }
}
