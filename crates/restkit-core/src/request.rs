//! Request model for restkit
//!
//! The pipeline owns a fully-buffered, cloneable [`Request`]: the transport
//! adapter (or the test client) collects the body and hands over headers,
//! query, path parameters, cookies and any parsed multipart fields before
//! dispatch begins. Preprocessors may mutate the request — attaching derived
//! attributes or an authenticated principal — ahead of authorization and
//! parameter binding.

use bytes::Bytes;
use http::{header, HeaderMap, Method, Uri};
use std::collections::HashMap;

/// Authenticated caller identity, set by an authentication preprocessor or
/// the transport adapter.
#[derive(Debug, Clone)]
pub struct Principal {
    /// Caller name or subject
    pub name: String,
    /// Roles granted to the caller
    pub roles: Vec<String>,
}

impl Principal {
    /// Create a new principal
    pub fn new(name: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            name: name.into(),
            roles,
        }
    }
}

/// A single uploaded file, as parsed from a `multipart/form-data` body by
/// the body-parsing collaborator.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Form field name
    pub field: String,
    /// Original filename, if the client sent one
    pub file_name: Option<String>,
    /// Declared content type of the part
    pub content_type: Option<String>,
    /// File contents
    pub data: Bytes,
}

/// HTTP Request wrapper
///
/// Provides access to all parts of an incoming HTTP request.
#[derive(Clone)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    json: Option<serde_json::Value>,
    json_invalid: bool,
    path_params: HashMap<String, String>,
    query_params: HashMap<String, String>,
    cookies: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
    principal: Option<Principal>,
    attributes: HashMap<String, serde_json::Value>,
    language: Option<String>,
}

impl Request {
    /// Create a new request from its parts
    pub fn new(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
        path_params: HashMap<String, String>,
    ) -> Self {
        let query_params = parse_query(uri.query().unwrap_or(""));
        let cookies = parse_cookies(&headers);

        // The host body parser pre-parses JSON bodies; a declared-JSON body
        // that fails to parse surfaces as 400 when a handler binds it.
        let mut json = None;
        let mut json_invalid = false;
        if is_json_content(&headers) && !body.is_empty() {
            match serde_json::from_slice(&body) {
                Ok(value) => json = Some(value),
                Err(_) => json_invalid = true,
            }
        }

        Self {
            method,
            uri,
            headers,
            body,
            json,
            json_invalid,
            path_params,
            query_params,
            cookies,
            files: HashMap::new(),
            principal: None,
            attributes: HashMap::new(),
            language: None,
        }
    }

    /// Get the HTTP method
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Get the URI
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Get the request path
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Get the headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get a header value as a string
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get the request `Content-Type` media type, without parameters
    pub fn content_type(&self) -> Option<&str> {
        self.header(header::CONTENT_TYPE.as_str())
            .map(|v| v.split(';').next().unwrap_or(v).trim())
    }

    /// Get the raw body bytes
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Get the pre-parsed JSON body, if the request carried one
    pub fn json(&self) -> Option<&serde_json::Value> {
        self.json.as_ref()
    }

    /// Whether the body declared itself JSON but failed to parse
    pub(crate) fn json_invalid(&self) -> bool {
        self.json_invalid
    }

    /// Get path parameters
    pub fn path_params(&self) -> &HashMap<String, String> {
        &self.path_params
    }

    /// Get a specific path parameter
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    /// Get a specific query parameter
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(String::as_str)
    }

    /// Get a cookie value by name
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Get an uploaded file by form field name
    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files.get(name)
    }

    /// Attach an uploaded file (called by the body-parsing collaborator)
    pub fn add_file(&mut self, file: UploadedFile) {
        self.files.insert(file.field.clone(), file);
    }

    /// Get the authenticated principal, if one was attached
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Attach the authenticated principal
    pub fn set_principal(&mut self, principal: Principal) {
        self.principal = Some(principal);
    }

    /// Read an attribute attached by a preprocessor
    pub fn attribute(&self, name: &str) -> Option<&serde_json::Value> {
        self.attributes.get(name)
    }

    /// Attach a derived attribute for later pipeline stages
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// The language selected by negotiation, if any
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub(crate) fn set_language(&mut self, tag: String) {
        self.language = Some(tag);
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .finish()
    }
}

fn is_json_content(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            let media = v.split(';').next().unwrap_or(v).trim();
            media == "application/json" || media.ends_with("+json")
        })
        .unwrap_or(false)
}

fn parse_query(query: &str) -> HashMap<String, String> {
    serde_urlencoded::from_str::<Vec<(String, String)>>(query)
        .map(|pairs| pairs.into_iter().collect())
        .unwrap_or_default()
}

fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for value in headers.get_all(header::COOKIE) {
        let Ok(raw) = value.to_str() else { continue };
        for parsed in cookie::Cookie::split_parse(raw.to_string()).flatten() {
            cookies.insert(parsed.name().to_string(), parsed.value().to_string());
        }
    }
    cookies
}
