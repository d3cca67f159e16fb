//! Host router
//!
//! Radix-tree routing over (verb, path) pairs using matchit. The route
//! builder registers one compiled handler per service method here; the
//! transport adapter and the test client match inbound requests against it.
//!
//! # Path Patterns
//!
//! Dynamic segments use `{param}` syntax (`:param` is accepted as-is):
//!
//! - `/users` - Static path
//! - `/users/{id}` - Single parameter
//! - `/users/{user_id}/posts/{post_id}` - Multiple parameters
//!
//! Registering the same (verb, path) twice replaces the earlier handler:
//! duplicate registration resolution is last-wins, consistent with generic
//! HTTP router semantics.

use crate::request::Request;
use crate::response::Response;
use http::Method;
use matchit::Router as MatchitRouter;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Type-erased route handler stored in the router
pub(crate) type BoxedHandler =
    Arc<dyn Fn(Request) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync>;

/// HTTP method router for a single path
#[derive(Clone, Default)]
pub struct MethodRouter {
    handlers: HashMap<Method, BoxedHandler>,
}

impl MethodRouter {
    /// Get handler for a method
    pub(crate) fn get_handler(&self, method: &Method) -> Option<&BoxedHandler> {
        self.handlers.get(method)
    }

    /// Get allowed methods for a 405 response, in stable order
    pub(crate) fn allowed_methods(&self) -> Vec<Method> {
        let mut methods: Vec<Method> = self.handlers.keys().cloned().collect();
        methods.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        methods
    }
}

/// Main router
pub struct Router {
    inner: MatchitRouter<String>,
    routes: HashMap<String, MethodRouter>,
}

impl Router {
    /// Create a new router
    pub fn new() -> Self {
        Self {
            inner: MatchitRouter::new(),
            routes: HashMap::new(),
        }
    }

    /// Register a handler for a (verb, path) pair.
    ///
    /// A duplicate registration replaces the earlier handler (last wins).
    /// Structurally conflicting patterns (same shape, different parameter
    /// names) cannot coexist in the radix tree and abort registration.
    pub(crate) fn route(&mut self, method: Method, path: &str, handler: BoxedHandler) {
        let key = convert_path_params(path);

        if !self.routes.contains_key(&key) {
            if let Err(err) = self.inner.insert(key.clone(), key.clone()) {
                panic!("conflicting route pattern `{}`: {}", path, err);
            }
        }

        let entry = self.routes.entry(key).or_default();
        if entry.handlers.insert(method.clone(), handler).is_some() {
            tracing::debug!(%method, path, "replacing existing route handler");
        }
    }

    /// Match a request and return the handler + params
    pub(crate) fn match_route(&self, path: &str, method: &Method) -> RouteMatch<'_> {
        match self.inner.at(path) {
            Ok(matched) => {
                let Some(method_router) = self.routes.get(matched.value) else {
                    return RouteMatch::NotFound;
                };

                if let Some(handler) = method_router.get_handler(method) {
                    let params: HashMap<String, String> = matched
                        .params
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect();

                    RouteMatch::Found { handler, params }
                } else {
                    RouteMatch::MethodNotAllowed {
                        allowed: method_router.allowed_methods(),
                    }
                }
            }
            Err(_) => RouteMatch::NotFound,
        }
    }

    /// The registered route table as (path, verbs) pairs, in stable order
    pub fn registered_routes(&self) -> Vec<(String, Vec<Method>)> {
        let mut routes: Vec<(String, Vec<Method>)> = self
            .routes
            .iter()
            .map(|(path, mr)| (path.clone(), mr.allowed_methods()))
            .collect();
        routes.sort_by(|a, b| a.0.cmp(&b.0));
        routes
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of route matching
pub(crate) enum RouteMatch<'a> {
    Found {
        handler: &'a BoxedHandler,
        params: HashMap<String, String>,
    },
    NotFound,
    MethodNotAllowed {
        allowed: Vec<Method>,
    },
}

/// Convert `{param}` style to `:param` for matchit
fn convert_path_params(path: &str) -> String {
    let mut result = String::with_capacity(path.len());

    for ch in path.chars() {
        match ch {
            '{' => {
                result.push(':');
            }
            '}' => {
                // Skip closing brace
            }
            _ => {
                result.push(ch);
            }
        }
    }

    result
}

/// Normalize a path: exactly one leading slash, no trailing slash (unless
/// root), no duplicate slashes.
pub(crate) fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if segments.is_empty() {
        return "/".to_string();
    }

    let mut result = String::with_capacity(path.len() + 1);
    for segment in segments {
        result.push('/');
        result.push_str(segment);
    }

    result
}

/// Join a class base path and a method path into one normalized route path.
/// Returns `None` when neither declared a path — such methods contribute no
/// route.
pub(crate) fn join_paths(base: Option<&str>, method: Option<&str>) -> Option<String> {
    match (base, method) {
        (None, None) => None,
        (Some(base), None) => Some(normalize_path(base)),
        (None, Some(method)) => Some(normalize_path(method)),
        (Some(base), Some(method)) => Some(normalize_path(&format!("{}/{}", base, method))),
    }
}
