//! Response types for restkit
//!
//! Two ways out of a handler: return a value and let the dispatcher
//! serialize it ([`render_value`]), or declare the method raw and write
//! through the shared [`ResponseSink`] the binder hands in as an argument.

use crate::error::{ApiError, ErrorResponse};
use bytes::Bytes;
use http::{header, HeaderMap, StatusCode};
use http_body_util::Full;
use std::sync::{Arc, Mutex};

/// HTTP Response type
pub type Response = http::Response<Full<Bytes>>;

/// Trait for types that can be converted into an HTTP response
pub trait IntoResponse {
    /// Convert self into a Response
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response {
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        let error_response = ErrorResponse::from(self);
        let body = serde_json::to_vec(&error_response).unwrap_or_else(|_| {
            br#"{"error":{"type":"internal_error","message":"Failed to serialize error"}}"#.to_vec()
        });

        http::Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))
            .unwrap()
    }
}

/// Serialize a handler's return value into a response.
///
/// Objects and arrays become JSON, strings/numbers/booleans become plain
/// text, and null becomes an empty 204.
pub(crate) fn render_value(value: serde_json::Value) -> Response {
    use serde_json::Value;

    match value {
        Value::Null => http::Response::builder()
            .status(StatusCode::NO_CONTENT)
            .body(Full::new(Bytes::new()))
            .unwrap(),
        Value::String(s) => http::Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(Full::new(Bytes::from(s)))
            .unwrap(),
        Value::Bool(b) => http::Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(Full::new(Bytes::from(b.to_string())))
            .unwrap(),
        Value::Number(n) => http::Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(Full::new(Bytes::from(n.to_string())))
            .unwrap(),
        value @ (Value::Object(_) | Value::Array(_)) => match serde_json::to_vec(&value) {
            Ok(body) => http::Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Full::new(Bytes::from(body)))
                .unwrap(),
            Err(err) => {
                ApiError::internal(format!("Failed to serialize response: {}", err)).into_response()
            }
        },
    }
}

/// Shared response sink for raw/stream handlers.
///
/// Methods marked raw receive a sink handle as a bound argument, write
/// status, headers and body through it, and the dispatcher finalizes
/// whatever was written instead of serializing a return value.
#[derive(Clone, Default)]
pub struct ResponseSink {
    inner: Arc<Mutex<SinkState>>,
}

struct SinkState {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    ended: bool,
}

impl Default for SinkState {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            ended: false,
        }
    }
}

impl ResponseSink {
    /// Create a new empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the response status code
    pub fn set_status(&self, status: StatusCode) {
        self.inner.lock().unwrap().status = status;
    }

    /// Set a response header
    pub fn set_header(&self, name: &str, value: &str) {
        let mut state = self.inner.lock().unwrap();
        if let (Ok(name), Ok(value)) = (
            name.parse::<http::header::HeaderName>(),
            value.parse::<http::header::HeaderValue>(),
        ) {
            state.headers.insert(name, value);
        }
    }

    /// Append to the response body. Writes after [`end`](Self::end) are
    /// discarded.
    pub fn write(&self, chunk: impl AsRef<[u8]>) {
        let mut state = self.inner.lock().unwrap();
        if !state.ended {
            state.body.extend_from_slice(chunk.as_ref());
        }
    }

    /// Mark the response complete
    pub fn end(&self) {
        self.inner.lock().unwrap().ended = true;
    }

    /// Whether anything was written through this sink
    pub(crate) fn touched(&self) -> bool {
        let state = self.inner.lock().unwrap();
        state.ended || !state.body.is_empty() || !state.headers.is_empty()
    }

    /// Build the final response from whatever the handler wrote
    pub(crate) fn into_response(self) -> Response {
        let state = std::mem::take(&mut *self.inner.lock().unwrap());
        let mut builder = http::Response::builder().status(state.status);
        if let Some(headers) = builder.headers_mut() {
            headers.extend(state.headers);
        }
        builder.body(Full::new(Bytes::from(state.body))).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use serde_json::json;

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8_lossy(&bytes).to_string()
    }

    #[tokio::test]
    async fn test_render_object_as_json() {
        let response = render_value(json!({"id": 1}));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(body_text(response).await, r#"{"id":1}"#);
    }

    #[tokio::test]
    async fn test_render_string_as_text() {
        let response = render_value(json!("hello"));
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
        assert_eq!(body_text(response).await, "hello");
    }

    #[tokio::test]
    async fn test_render_bool_and_number_as_text() {
        assert_eq!(body_text(render_value(json!(true))).await, "true");
        assert_eq!(body_text(render_value(json!(42))).await, "42");
    }

    #[tokio::test]
    async fn test_render_null_as_no_content() {
        let response = render_value(serde_json::Value::Null);
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(body_text(response).await, "");
    }

    #[tokio::test]
    async fn test_sink_collects_writes() {
        let sink = ResponseSink::new();
        sink.set_status(StatusCode::CREATED);
        sink.set_header("x-kind", "raw");
        sink.write("part one, ");
        sink.write("part two");
        sink.end();

        assert!(sink.touched());
        let response = sink.into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers().get("x-kind").unwrap(), "raw");
        assert_eq!(body_text(response).await, "part one, part two");
    }

    #[test]
    fn test_sink_untouched() {
        assert!(!ResponseSink::new().touched());
    }

    #[tokio::test]
    async fn test_sink_discards_writes_after_end() {
        let sink = ResponseSink::new();
        sink.write("kept");
        sink.end();
        sink.write("dropped");
        assert_eq!(body_text(sink.into_response()).await, "kept");
    }
}
