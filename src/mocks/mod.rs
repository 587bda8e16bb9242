//! Mock implementations for testing.
//!
//! Provides a mock transport for unit testing services without making real
//! API calls, including scripted streaming transfers.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::transport::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, StreamingResponse, TransportError,
};

/// A recorded request.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Request path.
    pub path: String,
    /// Request body.
    pub body: Option<Vec<u8>>,
    /// Request headers.
    pub headers: HashMap<String, String>,
}

/// A mock buffered response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: Vec<u8>,
}

impl MockResponse {
    /// Creates a successful JSON response.
    pub fn json<T: serde::Serialize>(value: &T) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_default();
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());

        Self {
            status: 200,
            headers,
            body,
        }
    }

    /// Creates an error response with a structured error body.
    pub fn error(status: u16, message: &str) -> Self {
        let error = serde_json::json!({
            "error": {
                "message": message
            }
        });

        let body = serde_json::to_vec(&error).unwrap_or_default();
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());

        Self {
            status,
            headers,
            body,
        }
    }

    /// Creates a response with custom status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Adds a header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }
}

/// A scripted streaming transfer.
struct MockStream {
    status: u16,
    headers: HashMap<String, String>,
    chunks: Vec<Result<Bytes, TransportError>>,
}

/// Mock HTTP transport for testing.
///
/// Responses and streams are consumed in queue order; requests are recorded
/// for assertions.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<Vec<MockResponse>>,
    streams: Mutex<Vec<MockStream>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a buffered response.
    pub fn queue(&self, response: MockResponse) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push(response);
        }
    }

    /// Queues a JSON response.
    pub fn queue_json<T: serde::Serialize>(&self, value: &T) {
        self.queue(MockResponse::json(value));
    }

    /// Queues a scripted streaming transfer.
    pub fn queue_stream(&self, status: u16, chunks: Vec<Result<Bytes, TransportError>>) {
        if let Ok(mut streams) = self.streams.lock() {
            streams.push(MockStream {
                status,
                headers: HashMap::new(),
                chunks,
            });
        }
    }

    /// Returns the recorded requests, in arrival order.
    pub fn recorded(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn record(&self, request: &HttpRequest) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                method: request.method,
                path: request.path.clone(),
                body: request.body.clone(),
                headers: request.headers.clone(),
            });
        }
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.record(&request);

        let response = self
            .responses
            .lock()
            .ok()
            .and_then(|mut responses| {
                if responses.is_empty() {
                    None
                } else {
                    Some(responses.remove(0))
                }
            })
            .ok_or_else(|| TransportError::InvalidResponse {
                message: "no mock response queued".to_string(),
            })?;

        Ok(HttpResponse {
            status: response.status,
            headers: response.headers,
            body: response.body,
        })
    }

    async fn send_streaming(
        &self,
        request: HttpRequest,
    ) -> Result<StreamingResponse, TransportError> {
        self.record(&request);

        let script = self
            .streams
            .lock()
            .ok()
            .and_then(|mut streams| {
                if streams.is_empty() {
                    None
                } else {
                    Some(streams.remove(0))
                }
            })
            .ok_or_else(|| TransportError::InvalidResponse {
                message: "no mock stream queued".to_string(),
            })?;

        Ok(StreamingResponse {
            status: script.status,
            headers: script.headers,
            stream: Box::pin(futures::stream::iter(script.chunks)),
        })
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_transport_queues_in_order() {
        let transport = MockTransport::new();
        transport.queue(MockResponse::json(&serde_json::json!({"a": 1})));
        transport.queue(MockResponse::error(500, "boom"));

        let first = transport.send(HttpRequest::get("x")).await.unwrap();
        assert_eq!(first.status, 200);

        let second = transport.send(HttpRequest::get("y")).await.unwrap();
        assert_eq!(second.status, 500);

        assert!(transport.send(HttpRequest::get("z")).await.is_err());
        assert_eq!(transport.recorded().len(), 3);
    }
}
