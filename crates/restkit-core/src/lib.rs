//! # restkit Core
//!
//! Metadata-driven REST service dispatcher. Services and their methods are
//! described by plain descriptors accumulated in a [`MetadataRegistry`];
//! the [`RouteBuilder`] compiles that metadata into live handlers on a
//! radix-tree [`Router`]; every request runs a fixed pipeline:
//! preprocess → authorize → negotiate → bind parameters → invoke →
//! serialize, with stage failures mapped to HTTP status codes once at the
//! dispatcher boundary.

mod app;
mod binder;
mod builder;
mod dispatch;
mod error;
mod factory;
pub mod guard;
mod metadata;
pub mod preprocessor;
mod registry;
mod request;
mod response;
mod router;
mod server;
#[cfg(any(test, feature = "test-utils"))]
mod test_client;

// Public API
pub use app::Application;
pub use binder::{bind, Arg};
pub use builder::RouteBuilder;
pub use error::{ApiError, Result};
pub use factory::{DefaultServiceFactory, ServiceContainer, ServiceFactory};
pub use metadata::{
    method_callback, service_constructor, ClassOptions, MethodCallback, MethodFuture,
    MethodOptions, ParamDescriptor, ParamKind, ServiceClass, ServiceConstructor, ServiceId,
    ServiceInstance, ServiceMethod,
};
pub use preprocessor::{async_preprocessor_fn, preprocessor_fn, Preprocessor};
pub use registry::MetadataRegistry;
pub use request::{Principal, Request, UploadedFile};
pub use response::{IntoResponse, Response, ResponseSink};
pub use router::Router;
pub use server::Server;
#[cfg(any(test, feature = "test-utils"))]
pub use test_client::{TestClient, TestRequest, TestResponse};
