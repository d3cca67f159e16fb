//! Metadata registry
//!
//! Process-wide store of service metadata, keyed by [`ServiceId`].
//! Registration front ends accumulate descriptors here before routes are
//! built; the route builder reads it; nothing mutates it afterwards. The
//! registry is an explicit instance owned by the application builder —
//! never ambient global state — and [`reset`](MetadataRegistry::reset)
//! exists for test isolation and re-registration.
//!
//! Population happens at startup, strictly before any request is served,
//! so lookups need no locking — only O(1) access by identity.

use crate::metadata::{
    ClassOptions, MethodOptions, ServiceClass, ServiceConstructor, ServiceId, ServiceMethod,
};
use crate::preprocessor::Preprocessor;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Store of accumulated service metadata.
#[derive(Default)]
pub struct MetadataRegistry {
    classes: HashMap<ServiceId, ServiceClass>,
}

impl MetadataRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up or insert the metadata for a service class.
    pub fn get_or_create_class(&mut self, id: ServiceId) -> &mut ServiceClass {
        self.classes.entry(id).or_insert_with(|| ServiceClass::new(id))
    }

    /// Look up or insert the metadata for a service method. Registers the
    /// owning class first if it was never seen.
    pub fn get_or_create_method(&mut self, id: ServiceId, name: &str) -> &mut ServiceMethod {
        self.get_or_create_class(id).get_or_create_method(name)
    }

    /// Merge a class-level descriptor into the stored metadata.
    pub fn register_class(&mut self, id: ServiceId, options: ClassOptions) {
        self.get_or_create_class(id).apply(options);
    }

    /// Merge a method-level descriptor into the stored metadata.
    pub fn register_method(&mut self, id: ServiceId, name: &str, options: MethodOptions) {
        self.get_or_create_method(id, name).apply(options);
    }

    /// Read a class's raw (unresolved) metadata.
    pub fn class(&self, id: ServiceId) -> Option<&ServiceClass> {
        self.classes.get(&id)
    }

    /// Number of registered classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Clear all accumulated metadata. The only sanctioned post-build
    /// mutation path: reset and re-register.
    pub fn reset(&mut self) {
        self.classes.clear();
    }

    /// Resolve a class's effective metadata by walking its explicit
    /// ancestor chain: subclass methods take precedence by name, scalar
    /// fields use nearest-declared-wins, list fields use nearest
    /// non-empty-wins.
    pub(crate) fn resolve(&self, id: ServiceId) -> Option<ResolvedService> {
        self.classes.get(&id)?;

        // Leaf to root, then merged root-first so nearer classes override.
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if !seen.insert(current) {
                break;
            }
            let Some(class) = self.classes.get(&current) else {
                break;
            };
            chain.push(class);
            cursor = class.parent;
        }

        let mut resolved = ResolvedService {
            id,
            base_path: None,
            roles: Vec::new(),
            languages: Vec::new(),
            accepts: Vec::new(),
            preprocessors: Vec::new(),
            constructor: None,
            methods: Vec::new(),
        };

        for class in chain.iter().rev() {
            if class.path.is_some() {
                resolved.base_path = class.path.clone();
            }
            if !class.roles.is_empty() {
                resolved.roles = class.roles.clone();
            }
            if !class.languages.is_empty() {
                resolved.languages = class.languages.clone();
            }
            if !class.accepts.is_empty() {
                resolved.accepts = class.accepts.clone();
            }
            if !class.preprocessors.is_empty() {
                resolved.preprocessors = class.preprocessors.clone();
            }
            if class.constructor.is_some() {
                resolved.constructor = class.constructor.clone();
            }
            for method in class.methods() {
                if let Some(existing) = resolved
                    .methods
                    .iter_mut()
                    .find(|m| m.name() == method.name())
                {
                    *existing = method.clone();
                } else {
                    resolved.methods.push(method.clone());
                }
            }
        }

        Some(resolved)
    }
}

/// A class's effective metadata after inheritance resolution.
pub(crate) struct ResolvedService {
    pub id: ServiceId,
    pub base_path: Option<String>,
    pub roles: Vec<String>,
    pub languages: Vec<String>,
    pub accepts: Vec<String>,
    pub preprocessors: Vec<Arc<dyn Preprocessor>>,
    pub constructor: Option<ServiceConstructor>,
    pub methods: Vec<ServiceMethod>,
}
