//! Parameter binder
//!
//! Resolves each declared [`ParamKind`](crate::metadata::ParamKind) against
//! the inbound request, producing exactly one argument per descriptor in
//! positional order. A named value that is absent from the request binds to
//! [`Arg::Missing`] — presence validation belongs to preprocessors or the
//! handler, not this layer.

use crate::error::{ApiError, Result};
use crate::factory::ServiceFactory;
use crate::metadata::{ParamDescriptor, ParamKind, ServiceInstance};
use crate::request::{Request, UploadedFile};
use crate::response::ResponseSink;
use bytes::Bytes;
use std::sync::Arc;

/// A bound invocation argument.
#[derive(Clone)]
pub enum Arg {
    /// The request object
    Request(Request),
    /// The response sink
    Response(ResponseSink),
    /// A named value that was present (path/query/header/cookie)
    Text(String),
    /// The parsed JSON body
    Json(serde_json::Value),
    /// The raw body bytes
    Bytes(Bytes),
    /// An uploaded file
    File(UploadedFile),
    /// An object resolved through the service factory
    Context(ServiceInstance),
    /// A named value that was absent from the request
    Missing,
}

impl Arg {
    /// The text value, for present named kinds
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The parsed JSON body
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Arg::Json(v) => Some(v),
            _ => None,
        }
    }

    /// The raw body bytes
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Arg::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// The bound request object
    pub fn as_request(&self) -> Option<&Request> {
        match self {
            Arg::Request(r) => Some(r),
            _ => None,
        }
    }

    /// The bound response sink
    pub fn as_response(&self) -> Option<&ResponseSink> {
        match self {
            Arg::Response(s) => Some(s),
            _ => None,
        }
    }

    /// The bound uploaded file
    pub fn as_file(&self) -> Option<&UploadedFile> {
        match self {
            Arg::File(f) => Some(f),
            _ => None,
        }
    }

    /// Downcast a context-injected object to its concrete type
    pub fn as_context<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        match self {
            Arg::Context(instance) => instance.clone().downcast::<T>().ok(),
            _ => None,
        }
    }

    /// Whether the named value was absent from the request
    pub fn is_missing(&self) -> bool {
        matches!(self, Arg::Missing)
    }
}

impl std::fmt::Debug for Arg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arg::Request(_) => f.write_str("Arg::Request"),
            Arg::Response(_) => f.write_str("Arg::Response"),
            Arg::Text(s) => write!(f, "Arg::Text({:?})", s),
            Arg::Json(v) => write!(f, "Arg::Json({})", v),
            Arg::Bytes(b) => write!(f, "Arg::Bytes({} bytes)", b.len()),
            Arg::File(file) => write!(f, "Arg::File({:?})", file.field),
            Arg::Context(_) => f.write_str("Arg::Context"),
            Arg::Missing => f.write_str("Arg::Missing"),
        }
    }
}

/// Bind the declared parameters against the request, producing one argument
/// per descriptor in positional order.
pub fn bind(
    descriptors: &[ParamDescriptor],
    request: &Request,
    response: &ResponseSink,
    factory: &Arc<dyn ServiceFactory>,
) -> Result<Vec<Arg>> {
    let mut args = Vec::with_capacity(descriptors.len());

    for (position, descriptor) in descriptors.iter().enumerate() {
        if descriptor.index != position {
            // Positions must be dense 0..N-1; anything else is a
            // registration bug surfaced as an internal error.
            return Err(ApiError::internal(format!(
                "parameter descriptor at position {} declares index {}",
                position, descriptor.index
            )));
        }

        let arg = match &descriptor.kind {
            ParamKind::Request => Arg::Request(request.clone()),
            ParamKind::Response => Arg::Response(response.clone()),
            ParamKind::PathParam(name) => text_or_missing(request.path_param(name)),
            ParamKind::QueryParam(name) => text_or_missing(request.query_param(name)),
            ParamKind::Header(name) => text_or_missing(request.header(name)),
            ParamKind::Cookie(name) => text_or_missing(request.cookie(name)),
            ParamKind::File(name) => request
                .file(name)
                .cloned()
                .map(Arg::File)
                .unwrap_or(Arg::Missing),
            ParamKind::Body => Arg::Bytes(request.body().clone()),
            ParamKind::JsonBody => {
                if request.json_invalid() {
                    return Err(ApiError::bad_request("Invalid JSON in request body"));
                }
                request
                    .json()
                    .cloned()
                    .map(Arg::Json)
                    .unwrap_or(Arg::Missing)
            }
            ParamKind::Context(id) => Arg::Context(factory.resolve(*id, None)?),
        };
        args.push(arg);
    }

    Ok(args)
}

fn text_or_missing(value: Option<&str>) -> Arg {
    value.map(|v| Arg::Text(v.to_string())).unwrap_or(Arg::Missing)
}
