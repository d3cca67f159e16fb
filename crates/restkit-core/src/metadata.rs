//! Metadata model for restkit services
//!
//! In-memory descriptors for service classes, methods and parameters.
//! Any registration front end (builder calls, configuration loaders, code
//! generation) produces these descriptors; the core never depends on the
//! syntax that declared them, only on the accumulated model.
//!
//! Effective metadata for a method is the concatenation of class-level then
//! method-level lists (roles, languages, accepted media types,
//! preprocessors) — never a replacement. A method registered without an
//! owning class carries only its own metadata.

use crate::binder::Arg;
use crate::error::ApiError;
use crate::preprocessor::Preprocessor;
use http::Method;
use std::any::{Any, TypeId};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Identity of a service type.
///
/// Captured once via [`ServiceId::of`]; hashable and `Copy`-cheap so
/// registry lookups stay O(1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceId {
    type_id: TypeId,
    name: &'static str,
}

impl ServiceId {
    /// The identity of service type `T`
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The service's type name, for diagnostics
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn type_id(&self) -> TypeId {
        self.type_id
    }
}

/// A resolved service instance, as produced by the service factory.
pub type ServiceInstance = Arc<dyn Any + Send + Sync>;

/// Constructor closure captured at registration time; the default factory
/// calls it to instantiate the service.
pub type ServiceConstructor = Arc<dyn Fn() -> ServiceInstance + Send + Sync>;

/// Future returned by a method invocation.
pub type MethodFuture =
    Pin<Box<dyn Future<Output = Result<serde_json::Value, ApiError>> + Send>>;

/// The invocation closure of a service method: receives the resolved
/// instance and the bound argument vector, returns the value to serialize
/// (or an error to map).
pub type MethodCallback = Arc<dyn Fn(ServiceInstance, Vec<Arg>) -> MethodFuture + Send + Sync>;

/// Wrap an async closure as a [`MethodCallback`].
pub fn method_callback<F, Fut>(f: F) -> MethodCallback
where
    F: Fn(ServiceInstance, Vec<Arg>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<serde_json::Value, ApiError>> + Send + 'static,
{
    Arc::new(move |instance, args| Box::pin(f(instance, args)))
}

/// Wrap a plain constructor closure as a [`ServiceConstructor`].
pub fn service_constructor<T, F>(f: F) -> ServiceConstructor
where
    T: Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    Arc::new(move || Arc::new(f()) as ServiceInstance)
}

/// How a formal parameter is resolved against the inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    /// The request object itself
    Request,
    /// The response sink, for raw/stream methods
    Response,
    /// A path parameter, by name
    PathParam(String),
    /// A query parameter, by name
    QueryParam(String),
    /// A header, by name
    Header(String),
    /// A cookie, by name
    Cookie(String),
    /// An uploaded file, by form field name
    File(String),
    /// The raw body bytes
    Body,
    /// The body parsed as JSON
    JsonBody,
    /// An object resolved through the service factory
    Context(ServiceId),
}

/// Positional parameter descriptor. Positions are dense 0..N-1; the binder
/// produces exactly one argument per descriptor, in order.
#[derive(Debug, Clone)]
pub struct ParamDescriptor {
    /// Zero-based argument position
    pub index: usize,
    /// Binding kind
    pub kind: ParamKind,
}

impl ParamDescriptor {
    /// Create a descriptor for the given position and kind
    pub fn new(index: usize, kind: ParamKind) -> Self {
        Self { index, kind }
    }
}

/// Metadata for a single routable method.
#[derive(Clone)]
pub struct ServiceMethod {
    name: String,
    /// HTTP verb; GET when undeclared
    pub verb: Method,
    /// Method-level path segment, concatenated with the class path
    pub path: Option<String>,
    /// Positional parameter descriptors
    pub parameters: Vec<ParamDescriptor>,
    /// Method-level security roles
    pub roles: Vec<String>,
    /// Method-level accepted languages
    pub languages: Vec<String>,
    /// Method-level accepted content types
    pub accepts: Vec<String>,
    /// Method-level preprocessors, in declaration order
    pub preprocessors: Vec<Arc<dyn Preprocessor>>,
    /// Whether the method writes the response itself instead of returning a
    /// value to serialize
    pub raw_response: bool,
    /// Invocation closure; methods without one contribute no route
    pub callback: Option<MethodCallback>,
}

impl ServiceMethod {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            verb: Method::GET,
            path: None,
            parameters: Vec::new(),
            roles: Vec::new(),
            languages: Vec::new(),
            accepts: Vec::new(),
            preprocessors: Vec::new(),
            raw_response: false,
            callback: None,
        }
    }

    /// The method name on the owning class
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn apply(&mut self, options: MethodOptions) {
        if let Some(verb) = options.verb {
            self.verb = verb;
        }
        if let Some(path) = options.path {
            self.path = Some(path);
        }
        self.roles.extend(normalize_roles(options.roles));
        self.languages.extend(options.languages);
        self.accepts.extend(options.accepts);
        self.preprocessors.extend(options.preprocessors);
        if !options.parameters.is_empty() {
            self.parameters = options.parameters;
        }
        if let Some(raw) = options.raw_response {
            self.raw_response = raw;
        }
        if let Some(callback) = options.callback {
            self.callback = Some(callback);
        }
    }
}

/// Metadata for a service class: identity, base path, class-level
/// restrictions, and the owned methods in declaration order.
#[derive(Clone)]
pub struct ServiceClass {
    id: ServiceId,
    /// Explicit ancestor link captured at registration time
    pub parent: Option<ServiceId>,
    /// Base path segment shared by all methods
    pub path: Option<String>,
    /// Class-level security roles
    pub roles: Vec<String>,
    /// Class-level accepted languages
    pub languages: Vec<String>,
    /// Class-level accepted content types
    pub accepts: Vec<String>,
    /// Class-level preprocessors, in declaration order
    pub preprocessors: Vec<Arc<dyn Preprocessor>>,
    /// Constructor used by the default service factory
    pub constructor: Option<ServiceConstructor>,
    // Declaration order matters: route building is deterministic and
    // duplicate (verb, path) resolution is last-wins.
    methods: Vec<ServiceMethod>,
}

impl ServiceClass {
    pub(crate) fn new(id: ServiceId) -> Self {
        Self {
            id,
            parent: None,
            path: None,
            roles: Vec::new(),
            languages: Vec::new(),
            accepts: Vec::new(),
            preprocessors: Vec::new(),
            constructor: None,
            methods: Vec::new(),
        }
    }

    /// The class identity
    pub fn id(&self) -> ServiceId {
        self.id
    }

    /// Look up a method by name
    pub fn method(&self, name: &str) -> Option<&ServiceMethod> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Iterate methods in declaration order
    pub fn methods(&self) -> impl Iterator<Item = &ServiceMethod> {
        self.methods.iter()
    }

    pub(crate) fn get_or_create_method(&mut self, name: &str) -> &mut ServiceMethod {
        if let Some(pos) = self.methods.iter().position(|m| m.name == name) {
            return &mut self.methods[pos];
        }
        self.methods.push(ServiceMethod::new(name));
        self.methods.last_mut().unwrap()
    }

    pub(crate) fn apply(&mut self, options: ClassOptions) {
        if let Some(parent) = options.parent {
            self.parent = Some(parent);
        }
        if let Some(path) = options.path {
            self.path = Some(path);
        }
        self.roles.extend(normalize_roles(options.roles));
        self.languages.extend(options.languages);
        self.accepts.extend(options.accepts);
        self.preprocessors.extend(options.preprocessors);
        if let Some(constructor) = options.constructor {
            self.constructor = Some(constructor);
        }
    }
}

/// Class-level registration descriptor.
#[derive(Clone, Default)]
pub struct ClassOptions {
    /// Base path segment
    pub path: Option<String>,
    /// Explicit ancestor whose metadata this class inherits
    pub parent: Option<ServiceId>,
    /// Security roles to append
    pub roles: Vec<String>,
    /// Accepted languages to append
    pub languages: Vec<String>,
    /// Accepted content types to append
    pub accepts: Vec<String>,
    /// Preprocessors to append
    pub preprocessors: Vec<Arc<dyn Preprocessor>>,
    /// Constructor for the default factory
    pub constructor: Option<ServiceConstructor>,
}

/// Method-level registration descriptor.
#[derive(Clone, Default)]
pub struct MethodOptions {
    /// HTTP verb; defaults to GET when never declared
    pub verb: Option<Method>,
    /// Method path segment
    pub path: Option<String>,
    /// Security roles to append
    pub roles: Vec<String>,
    /// Accepted languages to append
    pub languages: Vec<String>,
    /// Accepted content types to append
    pub accepts: Vec<String>,
    /// Preprocessors to append
    pub preprocessors: Vec<Arc<dyn Preprocessor>>,
    /// Positional parameter descriptors (replaces any prior list when
    /// non-empty)
    pub parameters: Vec<ParamDescriptor>,
    /// Raw-response flag
    pub raw_response: Option<bool>,
    /// Invocation closure
    pub callback: Option<MethodCallback>,
}

// A declared empty role means "any authenticated caller".
fn normalize_roles(roles: Vec<String>) -> Vec<String> {
    roles
        .into_iter()
        .map(|r| if r.is_empty() { "*".to_string() } else { r })
        .collect()
}
