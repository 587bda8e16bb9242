//! HTTP transport layer for the Widn client.
//!
//! Provides the HTTP transport abstraction and the reqwest implementation
//! for issuing API requests, in both single-response and streaming mode.

mod http;
mod streaming;

pub use http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, HttpTransportImpl};
pub use streaming::{
    extract_content, CompletionStream, Frame, FrameReassembler, StreamingResponse,
    STREAM_ERROR_PLACEHOLDER,
};

use std::time::Duration;

/// Transport error types.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection error.
    #[error("Connection error: {message}")]
    Connection {
        /// Error message.
        message: String,
    },

    /// Timeout error.
    #[error("Timeout after {timeout:?}")]
    Timeout {
        /// Timeout duration.
        timeout: Duration,
    },

    /// Invalid response.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Error message.
        message: String,
    },
}
