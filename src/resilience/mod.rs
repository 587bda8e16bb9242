//! Resilience layer for the Widn client.
//!
//! Provides the retry policy used by non-streaming calls. Streaming calls
//! are never retried: a transfer in flight already produced caller-visible
//! events, so failures degrade inside the stream instead.

mod retry;

pub use retry::{RetryConfig, RetryPolicy};
