//! Widn AI Client Library
//!
//! A production-ready Rust client for the Widn AI completions API. Relays
//! completion requests to the upstream service and surfaces the response as
//! an ordered stream of content events, with credential validation and a
//! model catalog alongside.
//!
//! # Features
//!
//! - **Completions**: Non-streaming and streaming dispatch with builder-based requests
//! - **Live Relay**: Server-sent event decoding tolerant of arbitrary chunk boundaries
//! - **Graceful Degradation**: Mid-stream failures preserve partial output
//! - **Credential Validation**: One-call API key probing with upstream diagnostics
//! - **Resilience**: Automatic retries with exponential backoff for non-streaming calls
//! - **Observability**: Tracing spans and structured logging
//! - **Async/Await**: Built on Tokio for high-performance async I/O
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use widn_client::{WidnClient, CompletionRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = WidnClient::builder()
//!         .api_key("widn_your_api_key")
//!         .build()?;
//!
//!     let request = CompletionRequest::builder()
//!         .model("vesuvius")
//!         .user("Hello, Widn!")
//!         .build()?;
//!
//!     let response = client.completions().create(request).await?;
//!     println!("{}", response.content().unwrap_or_default());
//!     Ok(())
//! }
//! ```
//!
//! # Streaming Example
//!
//! ```rust,no_run
//! use widn_client::{WidnClient, CompletionRequest};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = WidnClient::builder()
//!         .api_key("widn_your_api_key")
//!         .build()?;
//!
//!     let request = CompletionRequest::builder()
//!         .model("sugarloaf")
//!         .user("Tell me a story")
//!         .stream(true)
//!         .build()?;
//!
//!     let mut stream = client.completions().create_stream(request).await?;
//!
//!     while let Some(event) = stream.next().await {
//!         print!("{}", event.content);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod observability;
pub mod resilience;
pub mod services;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use client::{WidnClient, WidnClientBuilder};
pub use config::WidnConfig;
pub use errors::{WidnError, WidnResult};

// Type re-exports
pub use services::{CollectSink, EventSink};
pub use transport::{CompletionStream, STREAM_ERROR_PLACEHOLDER};
pub use types::chat::{
    AssistantMessage, Choice, CompletionRequest, CompletionResponse, ContentEvent, Message, Role,
};
pub use types::models::ModelDescriptor;

/// Mock implementations for testing.
#[cfg(any(test, feature = "mocks"))]
pub mod mocks;
