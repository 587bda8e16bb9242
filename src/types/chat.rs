//! Completion request and response types.

use serde::{Deserialize, Serialize};

use crate::errors::WidnError;

/// Default temperature applied when the caller does not set one.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
/// Default completion token budget.
pub const DEFAULT_MAX_TOKENS: u32 = 150;
/// Default nucleus sampling parameter.
pub const DEFAULT_TOP_P: f32 = 0.9;
/// Default min-p sampling parameter.
pub const DEFAULT_MIN_P: f32 = 0.1;

/// Completion request.
///
/// Immutable once built; one request drives exactly one upstream call.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    /// Model ID (required).
    pub model: String,

    /// Messages array (required).
    pub messages: Vec<Message>,

    /// Temperature (0.0-2.0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Max completion tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Top P sampling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Min P sampling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_p: Option<f32>,

    /// Enable streaming.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

impl CompletionRequest {
    /// Creates a new request with model and messages.
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
            top_p: None,
            min_p: None,
            stream: None,
        }
    }

    /// Creates a new request builder.
    pub fn builder() -> CompletionRequestBuilder {
        CompletionRequestBuilder::new()
    }

    /// Returns true if the caller asked for a streaming response.
    pub fn is_streaming(&self) -> bool {
        self.stream.unwrap_or(false)
    }

    /// Fills absent generation parameters with the documented defaults
    /// (temperature 0.7, max_tokens 150, top_p 0.9, min_p 0.1).
    pub fn with_defaults(mut self) -> Self {
        self.temperature.get_or_insert(DEFAULT_TEMPERATURE);
        self.max_tokens.get_or_insert(DEFAULT_MAX_TOKENS);
        self.top_p.get_or_insert(DEFAULT_TOP_P);
        self.min_p.get_or_insert(DEFAULT_MIN_P);
        self
    }

    /// Validates the request.
    pub fn validate(&self) -> Result<(), WidnError> {
        if self.model.is_empty() {
            return Err(WidnError::validation_param("Model is required", "model"));
        }

        if self.messages.is_empty() {
            return Err(WidnError::validation_param(
                "At least one message is required",
                "messages",
            ));
        }

        if let Some(temp) = self.temperature {
            if !(0.0..=2.0).contains(&temp) {
                return Err(WidnError::validation_param(
                    "Temperature must be between 0.0 and 2.0",
                    "temperature",
                ));
            }
        }

        if let Some(top_p) = self.top_p {
            if !(0.0..=1.0).contains(&top_p) {
                return Err(WidnError::validation_param(
                    "top_p must be between 0.0 and 1.0",
                    "top_p",
                ));
            }
        }

        if let Some(min_p) = self.min_p {
            if !(0.0..=1.0).contains(&min_p) {
                return Err(WidnError::validation_param(
                    "min_p must be between 0.0 and 1.0",
                    "min_p",
                ));
            }
        }

        Ok(())
    }
}

/// Completion request builder.
#[derive(Debug, Default)]
pub struct CompletionRequestBuilder {
    model: Option<String>,
    messages: Vec<Message>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    top_p: Option<f32>,
    min_p: Option<f32>,
    stream: Option<bool>,
}

impl CompletionRequestBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the model.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets all messages.
    pub fn messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    /// Adds a message.
    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Adds a system message.
    pub fn system(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message::system(content));
        self
    }

    /// Adds a user message.
    pub fn user(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message::user(content));
        self
    }

    /// Adds an assistant message.
    pub fn assistant(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message::assistant(content));
        self
    }

    /// Sets the temperature.
    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    /// Sets the max tokens.
    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    /// Sets top_p.
    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Sets min_p.
    pub fn min_p(mut self, min_p: f32) -> Self {
        self.min_p = Some(min_p);
        self
    }

    /// Enables or disables streaming.
    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = Some(stream);
        self
    }

    /// Builds the request.
    pub fn build(self) -> Result<CompletionRequest, WidnError> {
        let model = self
            .model
            .ok_or_else(|| WidnError::validation_param("Model is required", "model"))?;

        let request = CompletionRequest {
            model,
            messages: self.messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
            min_p: self.min_p,
            stream: self.stream,
        };

        request.validate()?;
        Ok(request)
    }
}

/// Chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Message role.
    pub role: Role,

    /// Message content.
    pub content: String,
}

impl Message {
    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Creates an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System message.
    System,
    /// User message.
    User,
    /// Assistant message.
    Assistant,
}

/// The unit of output emitted to the caller.
///
/// One event per extracted delta in streaming mode, exactly one event for a
/// non-streaming call. Events are emitted in arrival order and never mutated
/// after emission; downstream consumers reconstruct prose by concatenation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEvent {
    /// Content fragment.
    pub content: String,
    /// Always [`Role::Assistant`].
    pub role: Role,
}

impl ContentEvent {
    /// Creates a new assistant content event.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            role: Role::Assistant,
        }
    }
}

/// Completion response (non-streaming).
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionResponse {
    /// Response choices.
    pub choices: Vec<Choice>,
}

impl CompletionResponse {
    /// Gets the first choice content.
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
    }
}

/// Response choice.
#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    /// Assistant message.
    pub message: AssistantMessage,
}

/// Assistant message in a response.
#[derive(Debug, Clone, Deserialize)]
pub struct AssistantMessage {
    /// Message content.
    pub content: Option<String>,
}
