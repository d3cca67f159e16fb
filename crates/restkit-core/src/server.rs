//! HTTP server adapter
//!
//! hyper/http1 accept loop in front of the router. The adapter owns the
//! transport concerns the core does not: collecting the body, producing
//! 404/405 responses from router match results, parsing multipart bodies
//! into uploaded files, and the per-request completion log line.

use crate::error::ApiError;
use crate::request::{Request, UploadedFile};
use crate::response::{IntoResponse, Response};
use crate::router::{RouteMatch, Router};
use bytes::Bytes;
use http::{header, StatusCode};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// HTTP server over a built router
pub struct Server {
    router: Arc<Router>,
}

impl Server {
    /// Create a server for the given router
    pub fn new(router: Router) -> Self {
        Self {
            router: Arc::new(router),
        }
    }

    /// Run the server
    pub async fn run(self, addr: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr: SocketAddr = addr.parse()?;
        let listener = TcpListener::bind(addr).await?;

        info!("restkit server running on http://{}", addr);

        loop {
            let (stream, _remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let router = self.router.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: hyper::Request<Incoming>| {
                    let router = router.clone();
                    async move {
                        let response = handle_request(router, req).await;
                        Ok::<_, Infallible>(response)
                    }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Connection error: {}", err);
                }
            });
        }
    }
}

/// Handle a single HTTP request
async fn handle_request(router: Arc<Router>, req: hyper::Request<Incoming>) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = std::time::Instant::now();

    let (parts, body) = req.into_parts();

    let (handler, params) = match router.match_route(&path, &method) {
        RouteMatch::Found { handler, params } => (handler.clone(), params),
        RouteMatch::NotFound => {
            let response = ApiError::not_found(format!("No route found for {} {}", method, path))
                .into_response();
            log_request(&method, &path, response.status(), start);
            return response;
        }
        RouteMatch::MethodNotAllowed { allowed } => {
            let allowed_str: Vec<&str> = allowed.iter().map(|m| m.as_str()).collect();
            let mut response =
                ApiError::method_not_allowed(format!("Method {} not allowed for {}", method, path))
                    .into_response();

            if let Ok(value) = allowed_str.join(", ").parse() {
                response.headers_mut().insert(header::ALLOW, value);
            }
            log_request(&method, &path, response.status(), start);
            return response;
        }
    };

    let body_bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            let response = ApiError::from(err).into_response();
            log_request(&method, &path, response.status(), start);
            return response;
        }
    };

    let mut request = Request::new(method.clone(), parts.uri, parts.headers, body_bytes, params);
    attach_multipart_files(&mut request);

    let response = handler(request).await;

    log_request(&method, &path, response.status(), start);
    response
}

/// Parse a `multipart/form-data` body into uploaded files on the request.
fn attach_multipart_files(request: &mut Request) {
    let Some(content_type) = request.header(header::CONTENT_TYPE.as_str()) else {
        return;
    };
    if !content_type.starts_with("multipart/form-data") {
        return;
    }
    let Some(boundary) = extract_boundary(content_type) else {
        return;
    };

    for file in parse_multipart(request.body(), &boundary) {
        request.add_file(file);
    }
}

/// Extract boundary from a Content-Type header
fn extract_boundary(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|part| {
        let part = part.trim();
        part.strip_prefix("boundary=")
            .map(|b| b.trim_matches('"').to_string())
    })
}

/// Parse multipart form data into its fields.
///
/// Simplified parser: fields are decoded lossily as UTF-8, which covers
/// form posts and text uploads; binary-exact uploads belong to a dedicated
/// body-parsing collaborator.
fn parse_multipart(body: &Bytes, boundary: &str) -> Vec<UploadedFile> {
    let delimiter = format!("--{}", boundary);
    let body_str = String::from_utf8_lossy(body);
    let mut files = Vec::new();

    for part in body_str.split(delimiter.as_str()).skip(1) {
        let part = part.trim_start_matches("\r\n");
        if part.starts_with("--") || part.is_empty() {
            continue;
        }

        let Some((raw_headers, content)) = part.split_once("\r\n\r\n") else {
            continue;
        };

        let mut field = None;
        let mut file_name = None;
        let mut part_content_type = None;
        for line in raw_headers.lines() {
            let lower = line.to_ascii_lowercase();
            if lower.starts_with("content-disposition:") {
                field = header_param(line, "name");
                file_name = header_param(line, "filename");
            } else if let Some(value) = lower.strip_prefix("content-type:") {
                part_content_type = Some(value.trim().to_string());
            }
        }

        let Some(field) = field else { continue };
        let content = content.strip_suffix("\r\n").unwrap_or(content);

        files.push(UploadedFile {
            field,
            file_name,
            content_type: part_content_type,
            data: Bytes::from(content.to_string()),
        });
    }

    files
}

fn header_param(line: &str, name: &str) -> Option<String> {
    line.split(';').find_map(|piece| {
        let piece = piece.trim();
        piece
            .strip_prefix(&format!("{}=", name))
            .map(|v| v.trim_matches('"').to_string())
    })
}

/// Log request completion
fn log_request(method: &http::Method, path: &str, status: StatusCode, start: std::time::Instant) {
    let elapsed = start.elapsed();

    if status.is_server_error() || status.is_client_error() {
        error!(
            method = %method,
            path = %path,
            status = %status.as_u16(),
            duration_ms = %elapsed.as_millis(),
            "Request failed"
        );
    } else {
        info!(
            method = %method,
            path = %path,
            status = %status.as_u16(),
            duration_ms = %elapsed.as_millis(),
            "Request completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_boundary() {
        assert_eq!(
            extract_boundary("multipart/form-data; boundary=XYZ").as_deref(),
            Some("XYZ")
        );
        assert_eq!(
            extract_boundary("multipart/form-data; boundary=\"quoted\"").as_deref(),
            Some("quoted")
        );
        assert_eq!(extract_boundary("application/json"), None);
    }

    #[test]
    fn test_parse_multipart_fields() {
        let body = Bytes::from(
            "--BOUND\r\n\
             Content-Disposition: form-data; name=\"avatar\"; filename=\"me.txt\"\r\n\
             Content-Type: text/plain\r\n\
             \r\n\
             hello world\r\n\
             --BOUND--\r\n",
        );

        let files = parse_multipart(&body, "BOUND");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].field, "avatar");
        assert_eq!(files[0].file_name.as_deref(), Some("me.txt"));
        assert_eq!(files[0].content_type.as_deref(), Some("text/plain"));
        assert_eq!(&files[0].data[..], b"hello world");
    }

    #[test]
    fn test_parse_multipart_ignores_nameless_parts() {
        let body = Bytes::from(
            "--B\r\nContent-Type: text/plain\r\n\r\norphan\r\n--B--\r\n",
        );
        assert!(parse_multipart(&body, "B").is_empty());
    }
}
