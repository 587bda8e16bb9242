//! Streaming response handling: line reassembly, frame stripping, delta
//! extraction, and the completion stream that relays content events to the
//! caller.
//!
//! The upstream emits a line-delimited stream of JSON fragments, optionally
//! prefixed with an event marker and terminated by a reserved literal line.
//! Network fragmentation gives no alignment guarantees, so raw chunks are
//! reassembled into complete lines before any parsing happens. Lines that
//! fail to parse are skipped per line and never abort the transfer.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use pin_project_lite::pin_project;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use super::TransportError;
use crate::errors::{classify_failure, WidnError};
use crate::types::chat::ContentEvent;

/// Event marker prefixing stream lines. Fixed and case-sensitive.
const EVENT_PREFIX: &str = "data: ";

/// Reserved literal signaling end of the streaming transfer.
const DONE_SENTINEL: &str = "[DONE]";

/// Content of the single degraded event emitted when a transfer fails after
/// dispatch. Partial output already emitted is preserved ahead of it.
pub const STREAM_ERROR_PLACEHOLDER: &str = "[Error streaming response]";

/// Streaming HTTP response.
pub struct StreamingResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Byte stream.
    pub stream: Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>,
}

/// Reassembles raw byte fragments into complete logical lines.
///
/// Buffering is byte-level, so fragments may split lines, delimiters, or
/// multi-byte characters at any boundary. At any observation point the
/// buffer holds at most the tail of one incomplete line; complete lines are
/// emitted and removed as soon as their delimiter arrives.
#[derive(Debug, Default)]
pub struct FrameReassembler {
    buffer: Vec<u8>,
}

impl FrameReassembler {
    /// Creates a new reassembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a fragment and returns every complete line it unlocked.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut lines = Vec::new();

        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            line.pop(); // the delimiter itself
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }

        lines
    }

    /// Flushes any non-empty residual content as a final line.
    ///
    /// Called once, when the transfer ends without a trailing delimiter.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let mut line = std::mem::take(&mut self.buffer);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if line.is_empty() {
            return None;
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

/// A stream line after transport framing has been removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// The stream-termination sentinel; stop consuming further lines.
    Sentinel,
    /// Nothing left after stripping; skip and continue.
    Empty,
    /// A payload to hand to the delta extractor.
    Payload(String),
}

impl Frame {
    /// Normalizes a raw line: trims whitespace, strips the event-prefix
    /// marker if present, and detects the termination sentinel.
    pub fn strip(line: &str) -> Frame {
        let trimmed = line.trim_start();
        let payload = trimmed.strip_prefix(EVENT_PREFIX).unwrap_or(trimmed).trim();

        if payload.is_empty() {
            Frame::Empty
        } else if payload == DONE_SENTINEL {
            Frame::Sentinel
        } else {
            Frame::Payload(payload.to_string())
        }
    }
}

/// A named extraction strategy: a pure probe over one known frame shape.
type Strategy = (&'static str, fn(&Value) -> Option<&str>);

fn delta_in_choices(value: &Value) -> Option<&str> {
    value.get("choices")?.get(0)?.get("delta")?.get("content")?.as_str()
}

fn message_in_choices(value: &Value) -> Option<&str> {
    value
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
}

fn bare_delta(value: &Value) -> Option<&str> {
    value.get("delta")?.get("content")?.as_str()
}

/// Known frame shapes, tried in priority order: the incremental-delta field
/// first, then the full-message fallback for non-delta-shaped frames.
const STRATEGIES: &[Strategy] = &[
    ("delta_in_choices", delta_in_choices),
    ("message_in_choices", message_in_choices),
    ("bare_delta", bare_delta),
];

/// Extracts a content delta from a stripped frame payload.
///
/// Never fails: payloads that are not valid JSON, or that match no known
/// shape, are logged at debug level and skipped. An empty content string is
/// treated as no extraction.
pub fn extract_content(payload: &str) -> Option<ContentEvent> {
    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, payload = %payload, "Skipping unparseable stream frame");
            return None;
        }
    };

    for (name, probe) in STRATEGIES {
        if let Some(content) = probe(&value) {
            if !content.is_empty() {
                tracing::trace!(strategy = name, "Extracted content delta");
                return Some(ContentEvent::new(content));
            }
        }
    }

    None
}

pin_project! {
    /// Completion event stream.
    ///
    /// Drives reassembly, frame stripping, and delta extraction over a live
    /// byte source and yields [`ContentEvent`]s strictly in arrival order.
    /// The stream is infallible by design: a transport failure mid-transfer
    /// preserves events already produced and appends exactly one placeholder
    /// event before ending. Sentinel termination and source exhaustion are
    /// both normal ends. One stream serves exactly one request and is not
    /// restartable; dropping it releases the upstream connection.
    pub struct CompletionStream {
        #[pin]
        inner: Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>,
        reassembler: FrameReassembler,
        pending: VecDeque<ContentEvent>,
        done: bool,
    }
}

impl CompletionStream {
    /// Creates a completion stream from a streaming response.
    ///
    /// A non-200 status classifies before any event is produced; rate
    /// limiting surfaces distinctly so the caller can retry.
    pub fn new(response: StreamingResponse) -> Result<Self, WidnError> {
        if response.status != 200 {
            let retry_after = response
                .headers
                .get("retry-after")
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(classify_failure(response.status, &[], retry_after));
        }

        Ok(Self {
            inner: response.stream,
            reassembler: FrameReassembler::new(),
            pending: VecDeque::new(),
            done: false,
        })
    }

    /// Collects the remaining events and concatenates their content.
    pub async fn collect_text(self) -> String {
        self.map(|event| event.content).collect::<String>().await
    }
}

/// Processes one reassembled line; returns true when the sentinel was seen.
fn process_line(line: &str, pending: &mut VecDeque<ContentEvent>) -> bool {
    match Frame::strip(line) {
        Frame::Sentinel => true,
        Frame::Empty => false,
        Frame::Payload(payload) => {
            if let Some(event) = extract_content(&payload) {
                pending.push_back(event);
            }
            false
        }
    }
}

impl Stream for CompletionStream {
    type Item = ContentEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(event));
            }

            if *this.done {
                return Poll::Ready(None);
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    for line in this.reassembler.feed(&bytes) {
                        if process_line(&line, this.pending) {
                            *this.done = true;
                            break;
                        }
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    tracing::warn!(error = %e, "Streaming transfer failed; emitting placeholder");
                    *this.done = true;
                    this.pending
                        .push_back(ContentEvent::new(STREAM_ERROR_PLACEHOLDER));
                }
                Poll::Ready(None) => {
                    // Exhaustion without a sentinel is a normal end.
                    *this.done = true;
                    if let Some(line) = this.reassembler.finish() {
                        process_line(&line, this.pending);
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use pretty_assertions::assert_eq;

    fn streaming_response(
        chunks: Vec<Result<Bytes, TransportError>>,
    ) -> StreamingResponse {
        StreamingResponse {
            status: 200,
            headers: HashMap::new(),
            stream: Box::pin(stream::iter(chunks)),
        }
    }

    async fn collect_events(chunks: Vec<Result<Bytes, TransportError>>) -> Vec<ContentEvent> {
        CompletionStream::new(streaming_response(chunks))
            .unwrap()
            .collect()
            .await
    }

    fn delta_line(content: &str) -> String {
        format!(
            "data: {{\"choices\":[{{\"delta\":{{\"content\":\"{}\"}}}}]}}\n",
            content
        )
    }

    #[test]
    fn test_reassembler_single_line() {
        let mut reassembler = FrameReassembler::new();
        let lines = reassembler.feed(b"hello\n");
        assert_eq!(lines, vec!["hello".to_string()]);
    }

    #[test]
    fn test_reassembler_split_mid_line() {
        let mut reassembler = FrameReassembler::new();
        assert!(reassembler.feed(b"hel").is_empty());
        assert!(reassembler.feed(b"lo wor").is_empty());
        let lines = reassembler.feed(b"ld\nnext\n");
        assert_eq!(lines, vec!["hello world".to_string(), "next".to_string()]);
    }

    #[test]
    fn test_reassembler_split_mid_delimiter() {
        let mut reassembler = FrameReassembler::new();
        assert!(reassembler.feed(b"line\r").is_empty());
        let lines = reassembler.feed(b"\n");
        assert_eq!(lines, vec!["line".to_string()]);
    }

    #[test]
    fn test_reassembler_many_delimiters_in_one_chunk() {
        let mut reassembler = FrameReassembler::new();
        let lines = reassembler.feed(b"a\nb\nc\n");
        assert_eq!(
            lines,
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn test_reassembler_empty_fragment() {
        let mut reassembler = FrameReassembler::new();
        assert!(reassembler.feed(b"").is_empty());
        assert!(reassembler.feed(b"tail").is_empty());
        assert_eq!(reassembler.finish(), Some("tail".to_string()));
    }

    #[test]
    fn test_reassembler_split_multibyte_character() {
        let mut reassembler = FrameReassembler::new();
        let text = "héllo\n".as_bytes();
        // Split inside the two-byte 'é'.
        assert!(reassembler.feed(&text[..2]).is_empty());
        let lines = reassembler.feed(&text[2..]);
        assert_eq!(lines, vec!["héllo".to_string()]);
    }

    #[test]
    fn test_reassembler_arbitrary_partitions_preserve_lines() {
        let text = b"first line\nsecond line\nthird\n";
        let expected = vec![
            "first line".to_string(),
            "second line".to_string(),
            "third".to_string(),
        ];

        // Every split point, including mid-line and mid-delimiter.
        for split in 0..=text.len() {
            let mut reassembler = FrameReassembler::new();
            let mut lines = reassembler.feed(&text[..split]);
            lines.extend(reassembler.feed(&text[split..]));
            if let Some(residual) = reassembler.finish() {
                lines.push(residual);
            }
            assert_eq!(lines, expected, "partition at byte {}", split);
        }
    }

    #[test]
    fn test_frame_strip_prefix() {
        assert_eq!(
            Frame::strip("data: {\"x\":1}"),
            Frame::Payload("{\"x\":1}".to_string())
        );
    }

    #[test]
    fn test_frame_strip_without_prefix() {
        assert_eq!(
            Frame::strip("{\"x\":1}"),
            Frame::Payload("{\"x\":1}".to_string())
        );
    }

    #[test]
    fn test_frame_strip_sentinel() {
        assert_eq!(Frame::strip("data: [DONE]"), Frame::Sentinel);
        assert_eq!(Frame::strip("[DONE]"), Frame::Sentinel);
    }

    #[test]
    fn test_frame_strip_empty() {
        assert_eq!(Frame::strip(""), Frame::Empty);
        assert_eq!(Frame::strip("   "), Frame::Empty);
        assert_eq!(Frame::strip("data: "), Frame::Empty);
    }

    #[test]
    fn test_extract_shape_tolerance() {
        let shapes = [
            (r#"{"choices":[{"delta":{"content":"a"}}]}"#, "a"),
            (r#"{"choices":[{"message":{"content":"b"}}]}"#, "b"),
            (r#"{"delta":{"content":"c"}}"#, "c"),
        ];

        for (payload, expected) in shapes {
            let event = extract_content(payload).unwrap();
            assert_eq!(event.content, expected);
        }
    }

    #[test]
    fn test_extract_prefers_delta_over_message() {
        let payload =
            r#"{"choices":[{"delta":{"content":"delta"},"message":{"content":"full"}}]}"#;
        assert_eq!(extract_content(payload).unwrap().content, "delta");
    }

    #[test]
    fn test_extract_skips_invalid_json() {
        assert_eq!(extract_content("not json at all"), None);
    }

    #[test]
    fn test_extract_skips_unknown_shape_and_empty_content() {
        assert_eq!(extract_content(r#"{"usage":{"total_tokens":5}}"#), None);
        assert_eq!(
            extract_content(r#"{"choices":[{"delta":{"content":""}}]}"#),
            None
        );
    }

    #[tokio::test]
    async fn test_stream_sentinel_termination() {
        let body = format!(
            "{}{}data: [DONE]\n{}",
            delta_line("Hel"),
            delta_line("lo"),
            delta_line("ignored after sentinel")
        );
        let events = collect_events(vec![Ok(Bytes::from(body))]).await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].content, "Hel");
        assert_eq!(events[1].content, "lo");
    }

    #[tokio::test]
    async fn test_stream_exhaustion_without_sentinel_is_success() {
        let events = collect_events(vec![
            Ok(Bytes::from(delta_line("a"))),
            Ok(Bytes::from(delta_line("b"))),
        ])
        .await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].content, "a");
        assert_eq!(events[1].content, "b");
    }

    #[tokio::test]
    async fn test_stream_flushes_residual_line_on_close() {
        // No trailing newline on the final frame.
        let line = delta_line("tail");
        let events =
            collect_events(vec![Ok(Bytes::from(line.trim_end().to_string()))]).await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].content, "tail");
    }

    #[tokio::test]
    async fn test_stream_chunks_split_at_arbitrary_boundaries() {
        let body = format!("{}{}data: [DONE]\n", delta_line("one "), delta_line("two"));
        let bytes = body.as_bytes();

        // Feed in three uneven pieces, splitting mid-line.
        let events = collect_events(vec![
            Ok(Bytes::copy_from_slice(&bytes[..7])),
            Ok(Bytes::copy_from_slice(&bytes[7..bytes.len() - 3])),
            Ok(Bytes::copy_from_slice(&bytes[bytes.len() - 3..])),
        ])
        .await;

        let text: String = events.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(text, "one two");
    }

    #[tokio::test]
    async fn test_stream_malformed_line_does_not_halt_processing() {
        let body = format!("{}garbage not json\n{}", delta_line("a"), delta_line("b"));
        let events = collect_events(vec![Ok(Bytes::from(body))]).await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].content, "a");
        assert_eq!(events[1].content, "b");
    }

    #[tokio::test]
    async fn test_stream_partial_output_preserved_on_transport_failure() {
        let events = collect_events(vec![
            Ok(Bytes::from(delta_line("first "))),
            Ok(Bytes::from(delta_line("second"))),
            Err(TransportError::Connection {
                message: "connection reset".to_string(),
            }),
        ])
        .await;

        assert_eq!(events.len(), 3);
        assert_eq!(events[0].content, "first ");
        assert_eq!(events[1].content, "second");
        assert_eq!(events[2].content, STREAM_ERROR_PLACEHOLDER);
    }

    #[tokio::test]
    async fn test_stream_rejects_rate_limited_status() {
        let response = StreamingResponse {
            status: 429,
            headers: HashMap::new(),
            stream: Box::pin(stream::empty()),
        };

        let err = CompletionStream::new(response).err().unwrap();
        assert!(matches!(err, WidnError::RateLimit { .. }));
    }

    #[tokio::test]
    async fn test_stream_rejects_server_error_status() {
        let response = StreamingResponse {
            status: 500,
            headers: HashMap::new(),
            stream: Box::pin(stream::empty()),
        };

        let err = CompletionStream::new(response).err().unwrap();
        assert!(matches!(err, WidnError::Upstream { .. }));
    }

    #[tokio::test]
    async fn test_collect_text() {
        let body = format!("{}{}", delta_line("Hello"), delta_line(", world"));
        let stream = CompletionStream::new(streaming_response(vec![Ok(Bytes::from(body))]))
            .unwrap();

        assert_eq!(stream.collect_text().await, "Hello, world");
    }
}
