// File: src/resolver.rs
//
// Host-function resolution and named variable scopes.
// Host functions are the bridge from scripts into the embedding
// application; scopes surface embedder state to scripts as variables.

use std::sync::Arc;

use ahash::AHashMap;

use crate::containers::ScriptMap;
use crate::errors::HostCallError;
use crate::instance::ScriptInstance;
use crate::value::Value;

/// A native operation exposed to scripts.
///
/// The VM evaluates `parameter_count()` arguments onto the value stack and
/// dispatches; the implementation pops its own parameters and fills in
/// `return_value`. Returning `Ok(false)` halts the current update slice
/// (used by waiting functions). An `Err` aborts the script unless
/// `catches_errors()` — then it is converted to an Error value and pushed
/// as the result instead.
pub trait HostFunction: Send + Sync {
    fn name(&self) -> &str;

    fn parameter_count(&self) -> usize;

    /// Void functions push nothing and are statement-position only.
    fn is_void(&self) -> bool {
        false
    }

    /// Error-handling functions turn their failures into Error values.
    fn catches_errors(&self) -> bool {
        false
    }

    /// One-line usage text for diagnostics and docs.
    fn usage(&self) -> &str {
        ""
    }

    fn execute(
        &self,
        instance: &mut ScriptInstance,
        return_value: &mut Value,
    ) -> Result<bool, HostCallError>;
}

/// Named lookup of host functions. Lookups must be pure: instances may
/// resolve concurrently from different threads.
pub trait HostFunctionResolver: Send + Sync {
    /// Resolves a function by name under a namespace; `None` is the
    /// global pool. Names and namespaces are case-insensitive.
    fn resolve(&self, namespace: Option<&str>, name: &str) -> Option<Arc<dyn HostFunction>>;
}

/// The standard resolver: a global pool plus namespaced pools, all
/// case-insensitive.
#[derive(Default)]
pub struct HostFunctionRegistry {
    global: AHashMap<String, Arc<dyn HostFunction>>,
    namespaces: AHashMap<String, AHashMap<String, Arc<dyn HostFunction>>>,
}

impl HostFunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_functions<I, F>(functions: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: HostFunction + 'static,
    {
        let mut registry = Self::new();
        for function in functions {
            registry.register(function);
        }
        registry
    }

    pub fn register<F: HostFunction + 'static>(&mut self, function: F) {
        self.register_arc(Arc::new(function));
    }

    pub fn register_arc(&mut self, function: Arc<dyn HostFunction>) {
        self.global.insert(function.name().to_ascii_lowercase(), function);
    }

    pub fn register_namespaced<F: HostFunction + 'static>(&mut self, namespace: &str, function: F) {
        self.namespaces
            .entry(namespace.to_ascii_lowercase())
            .or_default()
            .insert(function.name().to_ascii_lowercase(), Arc::new(function));
    }
}

impl HostFunctionResolver for HostFunctionRegistry {
    fn resolve(&self, namespace: Option<&str>, name: &str) -> Option<Arc<dyn HostFunction>> {
        let name = name.to_ascii_lowercase();
        match namespace {
            None => self.global.get(&name).cloned(),
            Some(ns) => self
                .namespaces
                .get(&ns.to_ascii_lowercase())
                .and_then(|pool| pool.get(&name))
                .cloned(),
        }
    }
}

/// Resolvers tried in registration order; the first hit wins.
#[derive(Default)]
pub struct CompositeResolver {
    resolvers: Vec<Arc<dyn HostFunctionResolver>>,
}

impl CompositeResolver {
    pub fn new(resolvers: Vec<Arc<dyn HostFunctionResolver>>) -> Self {
        Self { resolvers }
    }

    pub fn push(&mut self, resolver: Arc<dyn HostFunctionResolver>) {
        self.resolvers.push(resolver);
    }
}

impl HostFunctionResolver for CompositeResolver {
    fn resolve(&self, namespace: Option<&str>, name: &str) -> Option<Arc<dyn HostFunction>> {
        self.resolvers.iter().find_map(|r| r.resolve(namespace, name))
    }
}

// Wraps a resolver so its global pool answers only under one namespace.
pub(crate) struct NamespacedResolver {
    namespace: String,
    inner: Arc<dyn HostFunctionResolver>,
}

impl NamespacedResolver {
    pub fn new(namespace: &str, inner: Arc<dyn HostFunctionResolver>) -> Self {
        Self { namespace: namespace.to_ascii_lowercase(), inner }
    }
}

impl HostFunctionResolver for NamespacedResolver {
    fn resolve(&self, namespace: Option<&str>, name: &str) -> Option<Arc<dyn HostFunction>> {
        match namespace {
            Some(ns) if ns.eq_ignore_ascii_case(&self.namespace) => self.inner.resolve(None, name),
            _ => None,
        }
    }
}

/// A named bag of variables surfaced to the script.
///
/// Consulted (in registration order) for variables not found in the local
/// scope. Reads and writes address names case-insensitively. A scope may
/// declare names read-only, which turns script writes into fatal errors.
pub trait VariableScope: Send {
    fn get_value(&self, name: &str) -> Option<Value>;

    fn set_value(&mut self, name: &str, value: Value);

    fn contains_value(&self, name: &str) -> bool;

    fn is_read_only(&self, name: &str) -> bool {
        false
    }
}

/// Map-backed scope, optionally read-only as a whole.
#[derive(Default)]
pub struct MapScope {
    values: ScriptMap,
    read_only: bool,
}

impl MapScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn with(mut self, name: &str, value: Value) -> Self {
        self.values.set(name, value);
        self
    }
}

impl VariableScope for MapScope {
    fn get_value(&self, name: &str) -> Option<Value> {
        self.values.get(name).cloned()
    }

    fn set_value(&mut self, name: &str, value: Value) {
        self.values.set(name, value);
    }

    fn contains_value(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    fn is_read_only(&self, _name: &str) -> bool {
        self.read_only
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stub(&'static str);

    impl HostFunction for Stub {
        fn name(&self) -> &str {
            self.0
        }
        fn parameter_count(&self) -> usize {
            0
        }
        fn execute(
            &self,
            _instance: &mut ScriptInstance,
            _return_value: &mut Value,
        ) -> Result<bool, HostCallError> {
            Ok(true)
        }
    }

    #[test]
    fn test_registry_is_case_insensitive() {
        let mut registry = HostFunctionRegistry::new();
        registry.register(Stub("GetThing"));
        assert!(registry.resolve(None, "getthing").is_some());
        assert!(registry.resolve(None, "GETTHING").is_some());
        assert!(registry.resolve(None, "other").is_none());
    }

    #[test]
    fn test_namespaced_lookup() {
        let mut registry = HostFunctionRegistry::new();
        registry.register_namespaced("IO", Stub("open"));
        assert!(registry.resolve(Some("io"), "OPEN").is_some());
        assert!(registry.resolve(None, "open").is_none());
        assert!(registry.resolve(Some("net"), "open").is_none());
    }

    #[test]
    fn test_composite_resolution_order() {
        let mut first = HostFunctionRegistry::new();
        first.register(Stub("f"));
        let mut second = HostFunctionRegistry::new();
        second.register(Stub("f"));
        second.register(Stub("g"));
        let composite = CompositeResolver::new(vec![Arc::new(first), Arc::new(second)]);
        assert_eq!(composite.resolve(None, "f").unwrap().name(), "f");
        assert!(composite.resolve(None, "g").is_some());
    }

    #[test]
    fn test_map_scope() {
        let mut scope = MapScope::new().with("Width", Value::Integer(640));
        assert!(scope.contains_value("WIDTH"));
        assert_eq!(scope.get_value("width").unwrap(), Value::Integer(640));
        scope.set_value("width", Value::Integer(800));
        assert_eq!(scope.get_value("Width").unwrap(), Value::Integer(800));
        assert!(!scope.is_read_only("width"));

        let scope = MapScope::new().with("x", Value::Null).read_only();
        assert!(scope.is_read_only("x"));
    }
}
