//! Route builder
//!
//! Compiles accumulated metadata into live route handlers. For each
//! requested service the builder resolves inheritance, merges class-level
//! and method-level metadata (class lists first, method lists appended),
//! joins base and method paths, and registers one handler per method with
//! the host router.
//!
//! Building is deterministic: services are processed in the order given and
//! methods in declaration order, so identical metadata always produces an
//! identical route table. Classes with no path anywhere, and methods that
//! never received a callback, contribute no routes.

use crate::dispatch::CompiledMethod;
use crate::factory::{DefaultServiceFactory, ServiceFactory};
use crate::metadata::ServiceId;
use crate::registry::MetadataRegistry;
use crate::router::{join_paths, BoxedHandler, Router};
use std::sync::Arc;
use tracing::{debug, warn};

/// Builds route handlers from registry metadata.
pub struct RouteBuilder {
    factory: Arc<dyn ServiceFactory>,
}

impl RouteBuilder {
    /// Create a builder using the default (constructor-based) factory
    pub fn new() -> Self {
        Self {
            factory: Arc::new(DefaultServiceFactory),
        }
    }

    /// Create a builder resolving instances through the given factory
    pub fn with_factory(factory: Arc<dyn ServiceFactory>) -> Self {
        Self { factory }
    }

    /// Build a fresh router holding routes for the given services
    pub fn build(&self, registry: &MetadataRegistry, services: &[ServiceId]) -> Router {
        let mut router = Router::new();
        self.build_into(&mut router, registry, services);
        router
    }

    /// Register routes for the given services onto an existing router
    pub fn build_into(
        &self,
        router: &mut Router,
        registry: &MetadataRegistry,
        services: &[ServiceId],
    ) {
        for &id in services {
            let Some(resolved) = registry.resolve(id) else {
                warn!(service = id.name(), "no metadata registered; skipping");
                continue;
            };

            for method in &resolved.methods {
                let Some(callback) = method.callback.clone() else {
                    continue;
                };
                let Some(path) = join_paths(resolved.base_path.as_deref(), method.path.as_deref())
                else {
                    continue;
                };

                let mut roles = resolved.roles.clone();
                roles.extend(method.roles.iter().cloned());
                let mut languages = resolved.languages.clone();
                languages.extend(method.languages.iter().cloned());
                let mut accepts = resolved.accepts.clone();
                accepts.extend(method.accepts.iter().cloned());
                let mut preprocessors = resolved.preprocessors.clone();
                preprocessors.extend(method.preprocessors.iter().cloned());

                let compiled = Arc::new(CompiledMethod {
                    service: resolved.id,
                    method: method.name().to_string(),
                    roles,
                    languages,
                    accepts,
                    preprocessors,
                    parameters: method.parameters.clone(),
                    raw_response: method.raw_response,
                    callback,
                    constructor: resolved.constructor.clone(),
                    factory: self.factory.clone(),
                });

                let handler: BoxedHandler = Arc::new(move |request| {
                    let compiled = compiled.clone();
                    Box::pin(async move { compiled.handle(request).await })
                });

                debug!(
                    verb = %method.verb,
                    path = %path,
                    service = id.name(),
                    method = method.name(),
                    "registered route"
                );
                router.route(method.verb.clone(), &path, handler);
            }
        }
    }
}

impl Default for RouteBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{method_callback, ClassOptions, MethodOptions};
    use http::Method;

    struct PathlessService;
    struct ItemsService;

    fn noop_callback() -> crate::metadata::MethodCallback {
        method_callback(|_instance, _args| async move { Ok(serde_json::Value::Null) })
    }

    #[test]
    fn test_pathless_class_contributes_no_routes() {
        let mut registry = MetadataRegistry::new();
        let id = ServiceId::of::<PathlessService>();
        registry.register_method(
            id,
            "orphan",
            MethodOptions {
                callback: Some(noop_callback()),
                ..Default::default()
            },
        );

        let router = RouteBuilder::new().build(&registry, &[id]);
        assert!(router.registered_routes().is_empty());
    }

    #[test]
    fn test_method_without_callback_skipped() {
        let mut registry = MetadataRegistry::new();
        let id = ServiceId::of::<ItemsService>();
        registry.register_class(
            id,
            ClassOptions {
                path: Some("items".to_string()),
                ..Default::default()
            },
        );
        registry.register_method(id, "incomplete", MethodOptions::default());

        let router = RouteBuilder::new().build(&registry, &[id]);
        assert!(router.registered_routes().is_empty());
    }

    #[test]
    fn test_build_is_deterministic() {
        let mut registry = MetadataRegistry::new();
        let id = ServiceId::of::<ItemsService>();
        registry.register_class(
            id,
            ClassOptions {
                path: Some("items".to_string()),
                ..Default::default()
            },
        );
        for (name, verb, path) in [
            ("list", Method::GET, None),
            ("create", Method::POST, None),
            ("get", Method::GET, Some("{id}".to_string())),
        ] {
            registry.register_method(
                id,
                name,
                MethodOptions {
                    verb: Some(verb),
                    path,
                    callback: Some(noop_callback()),
                    ..Default::default()
                },
            );
        }

        let builder = RouteBuilder::new();
        let first = builder.build(&registry, &[id]).registered_routes();
        let second = builder.build(&registry, &[id]).registered_routes();
        assert_eq!(first, second);
        assert_eq!(
            first,
            vec![
                ("/items".to_string(), vec![Method::GET, Method::POST]),
                ("/items/:id".to_string(), vec![Method::GET]),
            ]
        );
    }
}
