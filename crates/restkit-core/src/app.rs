//! Application builder
//!
//! Owns the metadata registry, the service factory and the list of mounted
//! services, and wires them into a router/server pair.
//!
//! # Example
//!
//! ```rust,ignore
//! use restkit_core::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     Application::new()
//!         .configure(|registry| {
//!             registry.register_class(ServiceId::of::<HelloService>(), ClassOptions {
//!                 path: Some("hello".into()),
//!                 constructor: Some(service_constructor(|| HelloService)),
//!                 ..Default::default()
//!             });
//!             // ... register methods ...
//!         })
//!         .mount(ServiceId::of::<HelloService>())
//!         .run("127.0.0.1:8080")
//!         .await
//! }
//! ```

use crate::builder::RouteBuilder;
use crate::factory::{DefaultServiceFactory, ServiceFactory};
use crate::metadata::ServiceId;
use crate::registry::MetadataRegistry;
use crate::router::Router;
use crate::server::Server;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Main application builder for restkit
pub struct Application {
    registry: MetadataRegistry,
    factory: Arc<dyn ServiceFactory>,
    services: Vec<ServiceId>,
}

impl Application {
    /// Create a new application
    pub fn new() -> Self {
        // Initialize tracing if not already done
        let _ = tracing_subscriber::registry()
            .with(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,restkit=debug")),
            )
            .with(tracing_subscriber::fmt::layer())
            .try_init();

        Self {
            registry: MetadataRegistry::new(),
            factory: Arc::new(DefaultServiceFactory),
            services: Vec::new(),
        }
    }

    /// Populate the metadata registry through a registration closure
    pub fn configure(mut self, f: impl FnOnce(&mut MetadataRegistry)) -> Self {
        f(&mut self.registry);
        self
    }

    /// Swap the service factory (the IoC collaborator). Must happen before
    /// routes are built.
    pub fn service_factory(mut self, factory: impl ServiceFactory) -> Self {
        self.factory = Arc::new(factory);
        self
    }

    /// Queue a registered service for route building
    pub fn mount(mut self, id: ServiceId) -> Self {
        self.services.push(id);
        self
    }

    /// Access the registry (for registration front ends that want direct
    /// mutable access instead of [`configure`](Self::configure))
    pub fn registry_mut(&mut self) -> &mut MetadataRegistry {
        &mut self.registry
    }

    /// Read the accumulated metadata
    pub fn registry(&self) -> &MetadataRegistry {
        &self.registry
    }

    /// Compile the mounted services into a router
    pub fn build_router(&self) -> Router {
        RouteBuilder::with_factory(self.factory.clone()).build(&self.registry, &self.services)
    }

    /// Build the router and serve it on the given address
    pub async fn run(self, addr: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Server::new(self.build_router()).run(addr).await
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}
