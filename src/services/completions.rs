//! Completions service.
//!
//! Dispatches completion requests in streaming or non-streaming mode and
//! relays the resulting content events to the caller. One service call
//! serves exactly one request; no state is shared across calls.

use std::collections::HashMap;
use std::sync::Arc;
use futures::StreamExt;
use tracing::instrument;

use crate::auth::AuthProvider;
use crate::errors::{classify_failure, WidnError};
use crate::resilience::RetryPolicy;
use crate::transport::{
    CompletionStream, HttpRequest, HttpResponse, HttpTransport, STREAM_ERROR_PLACEHOLDER,
};
use crate::types::chat::{CompletionRequest, CompletionResponse, ContentEvent};

/// Caller-supplied output sink for relayed content events.
///
/// Events are pushed one at a time, in emission order, and `close` is called
/// exactly once after the final event. Rate-limit failures bypass the sink
/// entirely and propagate as errors so the caller can schedule a retry.
pub trait EventSink: Send {
    /// Receives one content event.
    fn push(&mut self, event: ContentEvent);

    /// Signals end of the event sequence.
    fn close(&mut self);
}

/// Sink that collects every event into a vector.
///
/// Suits non-streaming callers that want the full sequence once it is done.
#[derive(Debug, Default)]
pub struct CollectSink {
    events: Vec<ContentEvent>,
    closed: bool,
}

impl CollectSink {
    /// Creates an empty collecting sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the collected events.
    pub fn events(&self) -> &[ContentEvent] {
        &self.events
    }

    /// Consumes the sink, returning the collected events.
    pub fn into_events(self) -> Vec<ContentEvent> {
        self.events
    }

    /// Returns true once the sequence has ended.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl EventSink for CollectSink {
    fn push(&mut self, event: ContentEvent) {
        self.events.push(event);
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Completions service.
pub struct CompletionsService {
    transport: Arc<dyn HttpTransport>,
    auth: Arc<dyn AuthProvider>,
    retry: Arc<RetryPolicy>,
}

impl CompletionsService {
    /// Creates a new completions service.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        auth: Arc<dyn AuthProvider>,
        retry: Arc<RetryPolicy>,
    ) -> Self {
        Self {
            transport,
            auth,
            retry,
        }
    }

    /// Creates a non-streaming completion.
    #[instrument(skip(self, request), fields(model = %request.model))]
    pub async fn create(&self, request: CompletionRequest) -> Result<CompletionResponse, WidnError> {
        request.validate()?;

        let mut request = request;
        request.stream = Some(false);

        let http_request = self.build_request(&request, false)?;

        let response = self
            .retry
            .execute(|| {
                let transport = Arc::clone(&self.transport);
                let req = http_request.clone();
                async move {
                    transport.send(req).await.map_err(WidnError::from_transport)
                }
            })
            .await?;

        Self::parse_response(response)
    }

    /// Creates a streaming completion.
    ///
    /// Streaming dispatches are never retried; failures after dispatch
    /// degrade inside the returned stream.
    #[instrument(skip(self, request), fields(model = %request.model))]
    pub async fn create_stream(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionStream, WidnError> {
        request.validate()?;

        let mut request = request;
        request.stream = Some(true);

        let http_request = self.build_request(&request, true)?;

        let response = self
            .transport
            .send_streaming(http_request)
            .await
            .map_err(WidnError::from_transport)?;

        CompletionStream::new(response)
    }

    /// Relays one request to a caller-supplied sink.
    ///
    /// Streaming requests push one event per extracted delta, in arrival
    /// order; non-streaming requests push exactly one event carrying the
    /// response content (empty when absent). A rate-limit failure propagates
    /// as an error without touching the sink; any other dispatch failure
    /// degrades to a single placeholder event so partial output semantics
    /// match the in-stream behavior. The sink is closed on every non-error
    /// outcome.
    #[instrument(skip(self, request, sink), fields(model = %request.model, streaming = request.is_streaming()))]
    pub async fn relay<S: EventSink>(
        &self,
        request: CompletionRequest,
        sink: &mut S,
    ) -> Result<(), WidnError> {
        if request.is_streaming() {
            match self.create_stream(request).await {
                Ok(mut stream) => {
                    while let Some(event) = stream.next().await {
                        sink.push(event);
                    }
                }
                Err(err @ WidnError::RateLimit { .. }) => return Err(err),
                Err(err) => {
                    tracing::warn!(error = %err, "Streaming dispatch failed; emitting placeholder");
                    sink.push(ContentEvent::new(STREAM_ERROR_PLACEHOLDER));
                }
            }
        } else {
            match self.create(request).await {
                Ok(response) => {
                    sink.push(ContentEvent::new(response.content().unwrap_or_default()));
                }
                Err(err @ WidnError::RateLimit { .. }) => return Err(err),
                Err(err) => {
                    tracing::warn!(error = %err, "Completion failed; emitting placeholder");
                    sink.push(ContentEvent::new(STREAM_ERROR_PLACEHOLDER));
                }
            }
        }

        sink.close();
        Ok(())
    }

    /// Builds the HTTP request, applying documented generation-parameter
    /// defaults for any the caller left unset.
    fn build_request(
        &self,
        request: &CompletionRequest,
        streaming: bool,
    ) -> Result<HttpRequest, WidnError> {
        let request = request.clone().with_defaults();
        let body = serde_json::to_vec(&request)?;

        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());

        if streaming {
            headers.insert("Accept".to_string(), "text/event-stream".to_string());
        }

        self.auth.apply_auth(&mut headers);

        Ok(HttpRequest {
            method: crate::transport::HttpMethod::Post,
            path: "completions".to_string(),
            headers,
            body: Some(body),
            timeout: None,
        })
    }

    /// Parses the buffered HTTP response.
    fn parse_response(response: HttpResponse) -> Result<CompletionResponse, WidnError> {
        if !response.is_success() {
            return Err(classify_failure(
                response.status,
                &response.body,
                response.retry_after(),
            ));
        }

        Ok(response.json()?)
    }
}

impl std::fmt::Debug for CompletionsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionsService").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ApiKeyAuth;
    use crate::mocks::{MockResponse, MockTransport};
    use crate::resilience::RetryConfig;
    use bytes::Bytes;
    use serde_json::Value;

    fn service(transport: Arc<MockTransport>) -> CompletionsService {
        CompletionsService::new(
            transport,
            Arc::new(ApiKeyAuth::from_string("widn_test_key")),
            Arc::new(RetryPolicy::new(RetryConfig::no_retries())),
        )
    }

    fn request(streaming: bool) -> CompletionRequest {
        CompletionRequest::builder()
            .model("vesuvius")
            .user("Say hello")
            .stream(streaming)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_returns_single_response() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&serde_json::json!({
            "choices": [{"message": {"content": "Hello!"}}]
        }));

        let response = service(Arc::clone(&transport))
            .create(request(false))
            .await
            .unwrap();

        assert_eq!(response.content(), Some("Hello!"));
    }

    #[tokio::test]
    async fn test_create_applies_auth_and_defaults() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&serde_json::json!({"choices": []}));

        service(Arc::clone(&transport))
            .create(request(false))
            .await
            .unwrap();

        let recorded = transport.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(
            recorded[0].headers.get("Authorization"),
            Some(&"Bearer widn_test_key".to_string())
        );

        let body: Value = serde_json::from_slice(recorded[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body["model"], "vesuvius");
        assert_eq!(body["stream"], false);
        assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
        assert_eq!(body["max_tokens"], 150);
        assert!((body["top_p"].as_f64().unwrap() - 0.9).abs() < 1e-6);
        assert!((body["min_p"].as_f64().unwrap() - 0.1).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_create_classifies_rate_limit() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::error(429, "slow down"));

        let err = service(transport).create(request(false)).await.err().unwrap();
        assert!(matches!(err, WidnError::RateLimit { .. }));
    }

    #[tokio::test]
    async fn test_create_classifies_upstream_error() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::error(500, "boom"));

        let err = service(transport).create(request(false)).await.err().unwrap();
        assert!(matches!(err, WidnError::Upstream { status_code: 500, .. }));
    }

    #[tokio::test]
    async fn test_relay_non_streaming_emits_one_event() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&serde_json::json!({
            "choices": [{"message": {"content": "Hello!"}}]
        }));

        let mut sink = CollectSink::new();
        service(transport)
            .relay(request(false), &mut sink)
            .await
            .unwrap();

        assert_eq!(sink.events(), &[ContentEvent::new("Hello!")]);
        assert!(sink.is_closed());
    }

    #[tokio::test]
    async fn test_relay_non_streaming_empty_content() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&serde_json::json!({"choices": []}));

        let mut sink = CollectSink::new();
        service(transport)
            .relay(request(false), &mut sink)
            .await
            .unwrap();

        assert_eq!(sink.events(), &[ContentEvent::new("")]);
    }

    #[tokio::test]
    async fn test_relay_streaming_pushes_events_in_order() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_stream(
            200,
            vec![
                Ok(Bytes::from(
                    "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n",
                )),
                Ok(Bytes::from(
                    "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\ndata: [DONE]\n",
                )),
            ],
        );

        let mut sink = CollectSink::new();
        service(Arc::clone(&transport))
            .relay(request(true), &mut sink)
            .await
            .unwrap();

        let contents: Vec<&str> = sink.events().iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["Hel", "lo"]);
        assert!(sink.is_closed());

        // Streaming mode was requested upstream.
        let recorded = transport.recorded();
        let body: Value = serde_json::from_slice(recorded[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body["stream"], true);
        assert_eq!(
            recorded[0].headers.get("Accept"),
            Some(&"text/event-stream".to_string())
        );
    }

    #[tokio::test]
    async fn test_relay_streaming_rate_limit_bypasses_sink() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_stream(429, vec![]);

        let mut sink = CollectSink::new();
        let err = service(transport)
            .relay(request(true), &mut sink)
            .await
            .err()
            .unwrap();

        assert!(matches!(err, WidnError::RateLimit { .. }));
        assert!(sink.events().is_empty());
        assert!(!sink.is_closed());
    }

    #[tokio::test]
    async fn test_relay_streaming_dispatch_failure_degrades_to_placeholder() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_stream(500, vec![]);

        let mut sink = CollectSink::new();
        service(transport)
            .relay(request(true), &mut sink)
            .await
            .unwrap();

        assert_eq!(sink.events(), &[ContentEvent::new(STREAM_ERROR_PLACEHOLDER)]);
        assert!(sink.is_closed());
    }

    #[tokio::test]
    async fn test_relay_streaming_preserves_partial_output_on_failure() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_stream(
            200,
            vec![
                Ok(Bytes::from(
                    "data: {\"choices\":[{\"delta\":{\"content\":\"partial\"}}]}\n",
                )),
                Err(crate::transport::TransportError::Connection {
                    message: "reset".to_string(),
                }),
            ],
        );

        let mut sink = CollectSink::new();
        service(transport)
            .relay(request(true), &mut sink)
            .await
            .unwrap();

        let contents: Vec<&str> = sink.events().iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["partial", STREAM_ERROR_PLACEHOLDER]);
    }
}
