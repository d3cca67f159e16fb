//! TestClient for integration testing without network binding
//!
//! Sends simulated HTTP requests through the full dispatch pipeline
//! without starting a real server.
//!
//! # Example
//!
//! ```rust,ignore
//! use restkit_core::{Application, TestClient};
//!
//! #[tokio::test]
//! async fn test_hello() {
//!     let app = Application::new().configure(register_hello).mount(hello_id());
//!     let client = TestClient::new(&app);
//!
//!     let response = client.get("/hello").await;
//!     response.assert_status(http::StatusCode::OK);
//!     assert_eq!(response.text(), "Hello, World!");
//! }
//! ```

use crate::app::Application;
use crate::error::ApiError;
use crate::request::{Principal, Request, UploadedFile};
use crate::response::{IntoResponse, Response};
use crate::router::{RouteMatch, Router};
use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use http_body_util::BodyExt;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

/// Test client driving the dispatch pipeline in-process
pub struct TestClient {
    router: Arc<Router>,
}

impl TestClient {
    /// Create a test client from an application's built routes
    pub fn new(app: &Application) -> Self {
        Self {
            router: Arc::new(app.build_router()),
        }
    }

    /// Create a test client over an already-built router
    pub fn from_router(router: Router) -> Self {
        Self {
            router: Arc::new(router),
        }
    }

    /// Send a GET request
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request(TestRequest::get(path)).await
    }

    /// Send a POST request with JSON body
    pub async fn post_json<T: Serialize>(&self, path: &str, body: &T) -> TestResponse {
        self.request(TestRequest::post(path).json(body)).await
    }

    /// Send a request with full control
    pub async fn request(&self, req: TestRequest) -> TestResponse {
        let method = req.method.clone();
        let path = req.path.clone();

        let (handler, params) = match self.router.match_route(uri_path(&path), &method) {
            RouteMatch::Found { handler, params } => (handler.clone(), params),
            RouteMatch::NotFound => {
                let response =
                    ApiError::not_found(format!("No route found for {} {}", method, path))
                        .into_response();
                return TestResponse::from_response(response).await;
            }
            RouteMatch::MethodNotAllowed { allowed } => {
                let allowed_str: Vec<&str> = allowed.iter().map(|m| m.as_str()).collect();
                let mut response = ApiError::method_not_allowed(format!(
                    "Method {} not allowed for {}",
                    method, path
                ))
                .into_response();

                if let Ok(value) = allowed_str.join(", ").parse() {
                    response.headers_mut().insert(header::ALLOW, value);
                }
                return TestResponse::from_response(response).await;
            }
        };

        let uri: http::Uri = path.parse().unwrap_or_else(|_| "/".parse().unwrap());
        let mut request = Request::new(
            method,
            uri,
            req.headers,
            req.body.unwrap_or_default(),
            params,
        );
        for file in req.files {
            request.add_file(file);
        }
        if let Some(principal) = req.principal {
            request.set_principal(principal);
        }

        let response = handler(request).await;
        TestResponse::from_response(response).await
    }
}

fn uri_path(path: &str) -> &str {
    path.split('?').next().unwrap_or(path)
}

/// Test request builder
#[derive(Debug, Clone)]
pub struct TestRequest {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Option<Bytes>,
    files: Vec<UploadedFile>,
    principal: Option<Principal>,
}

impl TestRequest {
    fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            headers: HeaderMap::new(),
            body: None,
            files: Vec::new(),
            principal: None,
        }
    }

    /// Create a GET request
    pub fn get(path: &str) -> Self {
        Self::new(Method::GET, path)
    }

    /// Create a POST request
    pub fn post(path: &str) -> Self {
        Self::new(Method::POST, path)
    }

    /// Create a PUT request
    pub fn put(path: &str) -> Self {
        Self::new(Method::PUT, path)
    }

    /// Create a PATCH request
    pub fn patch(path: &str) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// Create a DELETE request
    pub fn delete(path: &str) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Create a HEAD request
    pub fn head(path: &str) -> Self {
        Self::new(Method::HEAD, path)
    }

    /// Create an OPTIONS request
    pub fn options(path: &str) -> Self {
        Self::new(Method::OPTIONS, path)
    }

    /// Add a header to the request
    pub fn header(mut self, key: &str, value: &str) -> Self {
        if let (Ok(name), Ok(val)) = (
            key.parse::<http::header::HeaderName>(),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, val);
        }
        self
    }

    /// Set the request body as JSON, with the matching Content-Type
    pub fn json<T: Serialize>(mut self, body: &T) -> Self {
        if let Ok(bytes) = serde_json::to_vec(body) {
            self.body = Some(Bytes::from(bytes));
            self.headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        }
        self
    }

    /// Set the request body as raw bytes
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the Content-Type header
    pub fn content_type(self, content_type: &str) -> Self {
        self.header("content-type", content_type)
    }

    /// Attach an uploaded file, as the body-parsing collaborator would
    pub fn file(
        mut self,
        field: &str,
        file_name: Option<&str>,
        content_type: Option<&str>,
        data: impl Into<Bytes>,
    ) -> Self {
        self.files.push(UploadedFile {
            field: field.to_string(),
            file_name: file_name.map(String::from),
            content_type: content_type.map(String::from),
            data: data.into(),
        });
        self
    }

    /// Attach an authenticated principal, as an auth preprocessor would
    pub fn principal(mut self, name: &str, roles: &[&str]) -> Self {
        self.principal = Some(Principal::new(
            name,
            roles.iter().map(|r| r.to_string()).collect(),
        ));
        self
    }
}

/// Test response with assertion helpers
#[derive(Debug)]
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    async fn from_response(response: Response) -> Self {
        let (parts, body) = response.into_parts();
        let body_bytes = body
            .collect()
            .await
            .map(|b| b.to_bytes())
            .unwrap_or_default();

        Self {
            status: parts.status,
            headers: parts.headers,
            body: body_bytes,
        }
    }

    /// Get the response status code
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Get the response headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get the response body as bytes
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Get the response body as a string
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Parse the response body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Assert that the response has the expected status code
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "Expected status {}, got {}. Body: {}",
            expected,
            self.status,
            self.text()
        );
        self
    }

    /// Assert that the response has the expected header value
    pub fn assert_header(&self, key: &str, expected: &str) -> &Self {
        let actual = self
            .headers
            .get(key)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        assert_eq!(
            actual, expected,
            "Expected header '{}' to be '{}', got '{}'",
            key, expected, actual
        );
        self
    }

    /// Assert that the response body contains the expected string
    pub fn assert_body_contains(&self, expected: &str) -> &Self {
        let body = self.text();
        assert!(
            body.contains(expected),
            "Expected body to contain '{}', got '{}'",
            expected,
            body
        );
        self
    }
}
