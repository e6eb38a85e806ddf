// File: src/builder.rs
//
// Fluent assembly of script instances.
// A builder gathers source (or a prebuilt script), host-function
// resolvers, named scopes, a wait handler, an environment, stack
// dimensions, and the runaway limit, then produces a single instance or
// a factory that shares the compiled script and pools stacks.

use std::sync::{Arc, Mutex};

use crate::bytecode::Script;
use crate::environment::ScriptEnvironment;
use crate::errors::{ScriptError, ScriptExecutionError};
use crate::instance::{ScriptInstance, WaitHandler};
use crate::optimizer::optimize;
use crate::parser::parse;
use crate::resolver::{
    CompositeResolver, HostFunctionRegistry, HostFunctionResolver, NamespacedResolver,
    VariableScope,
};
use crate::stack::{
    ScriptInstanceStack, DEFAULT_ACTIVATION_STACK_DEPTH, DEFAULT_VALUE_STACK_DEPTH,
};
use crate::stdlib::CommonFunction;

/// Fluent configuration for creating [`ScriptInstance`]s.
#[derive(Default)]
pub struct ScriptInstanceBuilder {
    source: Option<String>,
    script: Option<Arc<Script>>,
    resolvers: Vec<Arc<dyn HostFunctionResolver>>,
    scopes: Vec<(String, Arc<Mutex<dyn VariableScope>>)>,
    wait_handler: Option<Arc<Mutex<dyn WaitHandler>>>,
    environment: Option<ScriptEnvironment>,
    runaway_limit: u64,
    value_stack_depth: Option<usize>,
    activation_stack_depth: Option<usize>,
}

impl ScriptInstanceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source text to compile. Exclusive with [`Self::with_script`]; the
    /// later call wins.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self.script = None;
        self
    }

    /// A script compiled earlier (its parse-time resolver should match the
    /// resolvers configured here).
    pub fn with_script(mut self, script: Arc<Script>) -> Self {
        self.script = Some(script);
        self.source = None;
        self
    }

    /// Adds a resolver to the global pool. Resolvers are consulted in
    /// registration order.
    pub fn with_host_function_resolver(mut self, resolver: Arc<dyn HostFunctionResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    /// Adds a resolver whose functions are addressed as `namespace.name`.
    pub fn with_namespaced_resolver(
        mut self,
        namespace: &str,
        resolver: Arc<dyn HostFunctionResolver>,
    ) -> Self {
        self.resolvers.push(Arc::new(NamespacedResolver::new(namespace, resolver)));
        self
    }

    /// Registers the common host-function set (print, typeof, wait, ...).
    pub fn with_common_functions(self) -> Self {
        let registry: Arc<HostFunctionRegistry> = Arc::new(CommonFunction::registry());
        self.with_host_function_resolver(registry)
    }

    /// Registers a named scope, consulted for variables not found locally
    /// in registration order.
    pub fn with_scope(mut self, name: &str, scope: Arc<Mutex<dyn VariableScope>>) -> Self {
        self.scopes.push((name.to_ascii_lowercase(), scope));
        self
    }

    pub fn with_wait_handler(mut self, handler: Arc<Mutex<dyn WaitHandler>>) -> Self {
        self.wait_handler = Some(handler);
        self
    }

    pub fn with_environment(mut self, environment: ScriptEnvironment) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Maximum commands per update slice; 0 disables the guard.
    pub fn with_runaway_limit(mut self, limit: u64) -> Self {
        self.runaway_limit = limit;
        self
    }

    pub fn with_stack_depths(mut self, value_depth: usize, activation_depth: usize) -> Self {
        self.value_stack_depth = Some(value_depth);
        self.activation_stack_depth = Some(activation_depth);
        self
    }

    fn combined_resolver(&self) -> Arc<dyn HostFunctionResolver> {
        match self.resolvers.len() {
            0 => Arc::new(HostFunctionRegistry::new()),
            1 => self.resolvers[0].clone(),
            _ => Arc::new(CompositeResolver::new(self.resolvers.clone())),
        }
    }

    fn compile(&self) -> Result<Arc<Script>, ScriptError> {
        if let Some(script) = &self.script {
            return Ok(script.clone());
        }
        let source = self.source.as_ref().ok_or(ScriptExecutionError::NoScript)?;
        let resolver = self.combined_resolver();
        let mut script = optimize(parse(source, Some(resolver.clone()))?);
        script.set_host_resolver(resolver);
        script.set_command_runaway_limit(self.runaway_limit);
        Ok(Arc::new(script))
    }

    fn instance_parts(
        &self,
    ) -> (Arc<dyn HostFunctionResolver>, ScriptEnvironment, usize, usize) {
        (
            self.combined_resolver(),
            self.environment.clone().unwrap_or_else(ScriptEnvironment::standard),
            self.value_stack_depth.unwrap_or(DEFAULT_VALUE_STACK_DEPTH),
            self.activation_stack_depth.unwrap_or(DEFAULT_ACTIVATION_STACK_DEPTH),
        )
    }

    fn effective_runaway_limit(&self, script: &Script) -> u64 {
        if self.runaway_limit > 0 {
            self.runaway_limit
        } else {
            script.command_runaway_limit()
        }
    }

    /// Compiles (if needed) and produces one instance.
    pub fn create_instance(self) -> Result<ScriptInstance, ScriptError> {
        let script = self.compile()?;
        let (resolver, environment, value_depth, activation_depth) = self.instance_parts();
        let resolver = script.host_resolver().cloned().unwrap_or(resolver);
        let runaway_limit = self.effective_runaway_limit(&script);
        Ok(ScriptInstance::new(
            script,
            ScriptInstanceStack::new(value_depth, activation_depth),
            resolver,
            self.scopes,
            self.wait_handler,
            environment,
            runaway_limit,
        ))
    }

    /// Compiles (if needed) and produces a factory that shares the script
    /// and pools instance stacks.
    pub fn build_factory(self) -> Result<ScriptInstanceFactory, ScriptError> {
        let script = self.compile()?;
        let (resolver, environment, value_depth, activation_depth) = self.instance_parts();
        let resolver = script.host_resolver().cloned().unwrap_or(resolver);
        let runaway_limit = self.effective_runaway_limit(&script);
        Ok(ScriptInstanceFactory {
            script,
            resolver,
            scopes: self.scopes,
            wait_handler: self.wait_handler,
            environment,
            runaway_limit,
            value_stack_depth: value_depth,
            activation_stack_depth: activation_depth,
            stack_pool: Mutex::new(Vec::new()),
        })
    }
}

/// Creates instances of one compiled script, reusing released stacks.
///
/// Scopes and the wait handler are shared across all created instances;
/// their thread-safety is the embedder's concern.
pub struct ScriptInstanceFactory {
    script: Arc<Script>,
    resolver: Arc<dyn HostFunctionResolver>,
    scopes: Vec<(String, Arc<Mutex<dyn VariableScope>>)>,
    wait_handler: Option<Arc<Mutex<dyn WaitHandler>>>,
    environment: ScriptEnvironment,
    runaway_limit: u64,
    value_stack_depth: usize,
    activation_stack_depth: usize,
    stack_pool: Mutex<Vec<ScriptInstanceStack>>,
}

impl ScriptInstanceFactory {
    pub fn script(&self) -> &Arc<Script> {
        &self.script
    }

    /// Takes a pooled stack (or allocates one) and builds an instance.
    pub fn create_instance(&self) -> ScriptInstance {
        let stack = self.stack_pool.lock().unwrap().pop().unwrap_or_else(|| {
            ScriptInstanceStack::new(self.value_stack_depth, self.activation_stack_depth)
        });
        ScriptInstance::new(
            self.script.clone(),
            stack,
            self.resolver.clone(),
            self.scopes.clone(),
            self.wait_handler.clone(),
            self.environment.clone(),
            self.runaway_limit,
        )
    }

    /// Returns a finished instance's stack to the pool.
    pub fn release_instance(&self, instance: ScriptInstance) {
        let mut stack = instance.into_stack();
        stack.reset();
        self.stack_pool.lock().unwrap().push(stack);
    }

    pub fn pooled_stacks(&self) -> usize {
        self.stack_pool.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_builder_without_source_fails() {
        let err = ScriptInstanceBuilder::new().create_instance().unwrap_err();
        assert!(matches!(err, ScriptError::Execution(ScriptExecutionError::NoScript)));
    }

    #[test]
    fn test_builder_compiles_and_runs() {
        let mut instance = ScriptInstanceBuilder::new()
            .with_source("main() { return 2 + 2; }")
            .with_environment(ScriptEnvironment::detached())
            .create_instance()
            .unwrap();
        assert_eq!(instance.call_and_return("main", &[]).unwrap(), Value::Integer(4));
    }

    #[test]
    fn test_factory_pools_stacks() {
        let factory = ScriptInstanceBuilder::new()
            .with_source("entry go(x) { return x * 2; }")
            .with_environment(ScriptEnvironment::detached())
            .build_factory()
            .unwrap();

        let mut first = factory.create_instance();
        assert_eq!(first.call_and_return("go", &[Value::Integer(4)]).unwrap(), Value::Integer(8));
        assert_eq!(factory.pooled_stacks(), 0);
        factory.release_instance(first);
        assert_eq!(factory.pooled_stacks(), 1);

        let mut second = factory.create_instance();
        assert_eq!(factory.pooled_stacks(), 0);
        assert_eq!(second.call_and_return("go", &[Value::Integer(5)]).unwrap(), Value::Integer(10));
        factory.release_instance(second);
    }
}
