//! Service instantiation (the IoC collaborator)
//!
//! The dispatcher reaches the dependency-injection world through one narrow
//! interface: [`ServiceFactory::resolve`]. The default implementation
//! constructs services through the constructor closure captured at
//! registration time; [`ServiceContainer`] offers singleton instances keyed
//! by type for applications that pre-wire their services. The factory is
//! swappable on the application builder at process start.

use crate::error::{ApiError, Result};
use crate::metadata::{ServiceConstructor, ServiceId, ServiceInstance};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

/// Resolves service instances for method invocation and context-injected
/// parameters.
pub trait ServiceFactory: Send + Sync + 'static {
    /// Resolve an instance of the identified service.
    ///
    /// `constructor` is the closure captured at registration time, when the
    /// service declared one; implementations may use it or ignore it.
    fn resolve(
        &self,
        id: ServiceId,
        constructor: Option<&ServiceConstructor>,
    ) -> Result<ServiceInstance>;
}

/// Default factory: direct construction through the registered constructor.
pub struct DefaultServiceFactory;

impl ServiceFactory for DefaultServiceFactory {
    fn resolve(
        &self,
        id: ServiceId,
        constructor: Option<&ServiceConstructor>,
    ) -> Result<ServiceInstance> {
        let constructor = constructor.ok_or_else(|| {
            ApiError::internal(format!(
                "No constructor registered for service `{}`",
                id.name()
            ))
        })?;
        Ok(constructor())
    }
}

/// Singleton container: pre-wired instances keyed by type, falling back to
/// the registered constructor for types it does not hold.
#[derive(Default)]
pub struct ServiceContainer {
    entries: HashMap<TypeId, ServiceInstance>,
}

impl ServiceContainer {
    /// Create an empty container
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a singleton instance
    pub fn register<T: Send + Sync + 'static>(mut self, instance: T) -> Self {
        self.entries.insert(TypeId::of::<T>(), Arc::new(instance));
        self
    }

    /// Whether the container holds an instance of `T`
    pub fn contains<T: 'static>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    /// Fetch a held instance of `T`
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.clone().downcast::<T>().ok())
    }
}

impl ServiceFactory for ServiceContainer {
    fn resolve(
        &self,
        id: ServiceId,
        constructor: Option<&ServiceConstructor>,
    ) -> Result<ServiceInstance> {
        if let Some(entry) = self.entries.get(&id.type_id()) {
            return Ok(entry.clone());
        }
        if let Some(constructor) = constructor {
            return Ok(constructor());
        }
        Err(ApiError::internal(format!(
            "Service `{}` is not registered in the container",
            id.name()
        )))
    }
}
