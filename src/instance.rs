// File: src/instance.rs
//
// The script virtual machine: a single-threaded, cooperatively suspended
// interpreter over a compiled Script. One instance owns its stacks, local
// scopes, and registered closeables; the Script itself is shared and
// immutable.

use std::io;
use std::sync::{Arc, Mutex};

use crate::bytecode::{Command, Script};
use crate::environment::ScriptEnvironment;
use crate::errors::{ScriptError, ScriptExecutionError, ScriptStackError};
use crate::resolver::{HostFunctionResolver, VariableScope};
use crate::stack::ScriptInstanceStack;
use crate::value::{ErrorValue, ObjectRef, Value};

/// Lifecycle states of a [`ScriptInstance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptInstanceState {
    /// Built but not yet pointed at an entry.
    Created,
    /// Initialized; the next update starts executing.
    Init,
    /// Actively stepping inside an update slice.
    Running,
    /// Parked by a wait(); the wait handler gates resumption.
    Waiting,
    /// Parked by suspend(); resume() is required to continue.
    Suspended,
    /// Finished or terminated; closeables have been drained.
    Ended,
}

impl ScriptInstanceState {
    pub fn name(self) -> &'static str {
        match self {
            ScriptInstanceState::Created => "created",
            ScriptInstanceState::Init => "init",
            ScriptInstanceState::Running => "running",
            ScriptInstanceState::Waiting => "waiting",
            ScriptInstanceState::Suspended => "suspended",
            ScriptInstanceState::Ended => "ended",
        }
    }
}

/// Embedder callback deciding when a Waiting instance may continue.
pub trait WaitHandler: Send {
    /// Checked at the top of every update while Waiting; returning true
    /// moves the instance back to Running.
    fn can_continue(&mut self, wait_type: &Value, wait_parameter: &Value) -> bool;

    /// Called once per update while the gate stays closed.
    fn waiting_update(
        &mut self,
        _instance: &mut ScriptInstance,
        _wait_type: &Value,
        _wait_parameter: &Value,
    ) {
    }
}

/// A host resource registered on an instance, closed when the instance
/// ends.
pub trait ScriptCloseable: Send + Sync {
    fn close(&self) -> io::Result<()>;
}

/// A running script: compiled commands plus all mutable execution state.
pub struct ScriptInstance {
    script: Arc<Script>,
    stack: ScriptInstanceStack,
    resolver: Arc<dyn HostFunctionResolver>,
    scopes: Vec<(String, Arc<Mutex<dyn VariableScope>>)>,
    wait_handler: Option<Arc<Mutex<dyn WaitHandler>>>,
    environment: ScriptEnvironment,
    state: ScriptInstanceState,
    wait_type: Value,
    wait_parameter: Value,
    closeables: Vec<Arc<dyn ScriptCloseable>>,
    commands_executed: u64,
    runaway_limit: u64,
}

impl ScriptInstance {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        script: Arc<Script>,
        stack: ScriptInstanceStack,
        resolver: Arc<dyn HostFunctionResolver>,
        scopes: Vec<(String, Arc<Mutex<dyn VariableScope>>)>,
        wait_handler: Option<Arc<Mutex<dyn WaitHandler>>>,
        environment: ScriptEnvironment,
        runaway_limit: u64,
    ) -> Self {
        Self {
            script,
            stack,
            resolver,
            scopes,
            wait_handler,
            environment,
            state: ScriptInstanceState::Created,
            wait_type: Value::Null,
            wait_parameter: Value::Null,
            closeables: Vec::new(),
            commands_executed: 0,
            runaway_limit,
        }
    }

    pub fn state(&self) -> ScriptInstanceState {
        self.state
    }

    pub fn script(&self) -> &Arc<Script> {
        &self.script
    }

    pub fn environment(&self) -> &ScriptEnvironment {
        &self.environment
    }

    pub fn wait_type(&self) -> &Value {
        &self.wait_type
    }

    pub fn wait_parameter(&self) -> &Value {
        &self.wait_parameter
    }

    /// Commands executed during the current (or last) update slice.
    pub fn commands_executed(&self) -> u64 {
        self.commands_executed
    }

    pub(crate) fn into_stack(self) -> ScriptInstanceStack {
        self.stack
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Resets the stacks and points the instance at an entry with its
    /// arguments. Callable from any state.
    pub fn initialize(&mut self, entry_name: &str, args: &[Value]) -> Result<(), ScriptError> {
        let entry = self
            .script
            .entry(entry_name)
            .ok_or_else(|| ScriptExecutionError::EntryNotFound(entry_name.to_string()))?;
        if entry.param_count != args.len() {
            return Err(ScriptExecutionError::EntryArityMismatch {
                name: entry_name.to_string(),
                expected: entry.param_count,
                actual: args.len(),
            }
            .into());
        }
        self.stack.reset();
        self.wait_type = Value::Null;
        self.wait_parameter = Value::Null;
        for arg in args {
            self.stack.push_value(arg.clone()).map_err(ScriptError::from)?;
        }
        self.stack.push_frame(entry.index).map_err(ScriptError::from)?;
        self.state = ScriptInstanceState::Init;
        Ok(())
    }

    /// Initializes and runs the entry to its next suspension point.
    pub fn call(&mut self, entry_name: &str, args: &[Value]) -> Result<(), ScriptError> {
        self.initialize(entry_name, args)?;
        self.update()
    }

    /// Calls an entry and pops its return value. The script must run to
    /// completion within the update.
    pub fn call_and_return(
        &mut self,
        entry_name: &str,
        args: &[Value],
    ) -> Result<Value, ScriptError> {
        self.call(entry_name, args)?;
        if self.state != ScriptInstanceState::Ended {
            return Err(ScriptExecutionError::NotCompleted(self.state.name()).into());
        }
        self.pop_stack_value().map_err(ScriptError::from)
    }

    /// Like [`ScriptInstance::call_and_return`], converting the result to
    /// the requested kind.
    pub fn call_and_return_as(
        &mut self,
        kind: crate::value::Kind,
        entry_name: &str,
        args: &[Value],
    ) -> Result<Value, ScriptError> {
        Ok(self.call_and_return(entry_name, args)?.convert_to(kind))
    }

    /// Advances execution to the next suspension point: completion, a
    /// wait, a suspend, or a fatal error.
    pub fn update(&mut self) -> Result<(), ScriptError> {
        match self.state {
            ScriptInstanceState::Created => Err(ScriptExecutionError::NotInitialized.into()),
            ScriptInstanceState::Ended | ScriptInstanceState::Suspended => Ok(()),
            ScriptInstanceState::Waiting => {
                let Some(handler) = self.wait_handler.clone() else {
                    return Ok(());
                };
                let wait_type = self.wait_type.clone();
                let wait_parameter = self.wait_parameter.clone();
                let resume =
                    handler.lock().unwrap().can_continue(&wait_type, &wait_parameter);
                if resume {
                    self.state = ScriptInstanceState::Running;
                    self.run_slice()
                } else {
                    handler.lock().unwrap().waiting_update(self, &wait_type, &wait_parameter);
                    Ok(())
                }
            }
            ScriptInstanceState::Init | ScriptInstanceState::Running => {
                self.state = ScriptInstanceState::Running;
                self.run_slice()
            }
        }
    }

    /// Parks the instance until the wait handler lets it continue.
    /// Usually called by a host function mid-update.
    pub fn wait(&mut self, wait_type: Value, wait_parameter: Value) {
        self.wait_type = wait_type;
        self.wait_parameter = wait_parameter;
        self.state = ScriptInstanceState::Waiting;
    }

    pub fn suspend(&mut self) {
        if self.state != ScriptInstanceState::Ended {
            self.state = ScriptInstanceState::Suspended;
        }
    }

    pub fn resume(&mut self) {
        if self.state == ScriptInstanceState::Suspended {
            self.state = ScriptInstanceState::Running;
        }
    }

    /// Ends the instance; registered closeables are drained in reverse
    /// registration order.
    pub fn terminate(&mut self) {
        if self.state != ScriptInstanceState::Ended {
            self.finish();
        }
    }

    fn finish(&mut self) {
        self.state = ScriptInstanceState::Ended;
        self.drain_closeables();
    }

    // ------------------------------------------------------------------
    // Closeables
    // ------------------------------------------------------------------

    /// Registers a resource to be closed when the instance ends.
    /// Registering the same handle twice is a no-op.
    pub fn register_closeable(&mut self, closeable: Arc<dyn ScriptCloseable>) {
        let ptr = Arc::as_ptr(&closeable) as *const ();
        if !self.closeables.iter().any(|c| Arc::as_ptr(c) as *const () == ptr) {
            self.closeables.push(closeable);
        }
    }

    /// Unregisters a resource without closing it.
    pub fn unregister_closeable(&mut self, closeable: &Arc<dyn ScriptCloseable>) -> bool {
        self.unregister_closeable_ptr(Arc::as_ptr(closeable) as *const ())
    }

    /// Unregisters the resource behind an object ref without closing it,
    /// so the host can take ownership. Backs the DONOTCLOSE intrinsic.
    pub fn unregister_closeable_for(&mut self, object: &ObjectRef) -> bool {
        self.unregister_closeable_ptr(object.data_ptr())
    }

    fn unregister_closeable_ptr(&mut self, ptr: *const ()) -> bool {
        let before = self.closeables.len();
        self.closeables.retain(|c| Arc::as_ptr(c) as *const () != ptr);
        self.closeables.len() != before
    }

    pub fn closeable_count(&self) -> usize {
        self.closeables.len()
    }

    fn drain_closeables(&mut self) {
        let closeables = std::mem::take(&mut self.closeables);
        for closeable in closeables.into_iter().rev() {
            if let Err(err) = closeable.close() {
                // Close failures convert to Error values published through
                // the environment; they never stop the remaining closes.
                self.environment.log_error(&ErrorValue::new("BadClose", err.to_string()));
            }
        }
    }

    // ------------------------------------------------------------------
    // Host-facing stack access
    // ------------------------------------------------------------------

    pub fn push_stack_value(&mut self, value: Value) -> Result<(), ScriptStackError> {
        self.stack.push_value(value)
    }

    pub fn pop_stack_value(&mut self) -> Result<Value, ScriptStackError> {
        self.stack.pop_value()
    }

    // ------------------------------------------------------------------
    // The step loop
    // ------------------------------------------------------------------

    fn run_slice(&mut self) -> Result<(), ScriptError> {
        self.commands_executed = 0;
        loop {
            let pc = self.stack.pc().map_err(ScriptError::from)?;
            let command = self
                .script
                .command(pc)
                .ok_or(ScriptExecutionError::BadCommandIndex(pc))?
                .clone();
            self.stack.set_pc(pc + 1).map_err(ScriptError::from)?;

            self.commands_executed += 1;
            if self.runaway_limit > 0 && self.commands_executed > self.runaway_limit {
                return Err(ScriptExecutionError::Runaway(self.runaway_limit).into());
            }

            if !self.execute_command(&command)? {
                break;
            }
            if self.state != ScriptInstanceState::Running {
                break;
            }
        }
        Ok(())
    }

    // Executes one command; false halts the current update slice.
    fn execute_command(&mut self, command: &Command) -> Result<bool, ScriptError> {
        match command {
            Command::Noop => {}
            Command::Push(value) => self.stack.push_value(value.clone())?,
            Command::Pop => {
                self.stack.pop_value()?;
            }

            Command::PushVariable(name) => {
                let value = self.resolve_variable(name);
                self.stack.push_value(value)?;
            }
            Command::PopVariable(name) => {
                let value = self.stack.pop_value()?;
                self.write_variable(name, value)?;
            }
            Command::Set(name, literal) => {
                self.write_variable(name, literal.clone())?;
            }
            Command::SetVariable(target, source) => {
                let value = self.resolve_variable(source);
                self.write_variable(target, value)?;
            }

            Command::Jump(label) => self.jump(label)?,
            Command::JumpTrue(label) => {
                if self.stack.pop_value()?.as_boolean() {
                    self.jump(label)?;
                }
            }
            Command::JumpFalse(label) => {
                if !self.stack.pop_value()?.as_boolean() {
                    self.jump(label)?;
                }
            }
            Command::JumpBranch(if_true, if_false) => {
                if self.stack.pop_value()?.as_boolean() {
                    self.jump(if_true)?;
                } else {
                    self.jump(if_false)?;
                }
            }
            Command::Call(label) => {
                let index = self.label_index(label)?;
                self.stack.push_frame(index)?;
            }
            Command::CallHost(name, namespace) => {
                return self.call_host(name, namespace.as_deref());
            }
            Command::Return => {
                let value = self.stack.pop_value()?;
                self.stack.pop_frame()?;
                self.stack.push_value(value)?;
                if self.stack.frame_depth() == 0 {
                    self.finish();
                    return Ok(false);
                }
            }

            Command::PushListNew => self.stack.push_value(Value::new_list())?,
            Command::PushListInit(count) => {
                let mut values = Vec::with_capacity(*count);
                for _ in 0..*count {
                    values.push(self.stack.pop_value()?);
                }
                values.reverse();
                self.stack.push_value(Value::list_of(values))?;
            }
            Command::PushListIndex => {
                let index = self.stack.pop_value()?;
                let base = self.stack.pop_value()?;
                self.stack.push_value(index_get(&base, &index))?;
            }
            Command::PushListIndexContents => {
                let index = self.stack.peek_value(0)?.clone();
                let base = self.stack.peek_value(1)?.clone();
                self.stack.push_value(index_get(&base, &index))?;
            }
            Command::PopList => {
                let value = self.stack.pop_value()?;
                let index = self.stack.pop_value()?;
                let base = self.stack.pop_value()?;
                index_set(&base, &index, value);
            }

            Command::Absolute => self.unary(Value::absolute)?,
            Command::Negate => self.unary(Value::negate)?,
            Command::Not => self.unary(Value::bitwise_not)?,
            Command::LogicalNot => self.unary(Value::logical_not)?,

            Command::Add => self.binary(Value::add)?,
            Command::Subtract => self.binary(Value::subtract)?,
            Command::Multiply => self.binary(Value::multiply)?,
            Command::Divide => self.binary(Value::divide)?,
            Command::Modulo => self.binary(Value::modulo)?,
            Command::And => self.binary(Value::and)?,
            Command::Or => self.binary(Value::or)?,
            Command::Xor => self.binary(Value::xor)?,
            Command::LogicalAnd => self.binary(Value::logical_and)?,
            Command::LogicalOr => self.binary(Value::logical_or)?,
            Command::LeftShift => self.binary(Value::left_shift)?,
            Command::RightShift => self.binary(Value::right_shift)?,
            Command::RightShiftPadded => self.binary(Value::right_shift_padded)?,
            Command::Less => self.binary(Value::less)?,
            Command::LessOrEqual => self.binary(Value::less_or_equal)?,
            Command::Greater => self.binary(Value::greater)?,
            Command::GreaterOrEqual => self.binary(Value::greater_or_equal)?,
            Command::Equal => self.binary(Value::equal)?,
            Command::NotEqual => self.binary(Value::not_equal)?,
            Command::StrictEqual => self.binary(Value::strict_equal)?,
            Command::StrictNotEqual => self.binary(Value::strict_not_equal)?,
        }
        Ok(true)
    }

    fn unary(&mut self, op: fn(&Value) -> Value) -> Result<(), ScriptStackError> {
        let operand = self.stack.pop_value()?;
        self.stack.push_value(op(&operand))
    }

    fn binary(&mut self, op: fn(&Value, &Value) -> Value) -> Result<(), ScriptStackError> {
        let b = self.stack.pop_value()?;
        let a = self.stack.pop_value()?;
        self.stack.push_value(op(&a, &b))
    }

    fn jump(&mut self, label: &str) -> Result<(), ScriptError> {
        let index = self.label_index(label)?;
        self.stack.set_pc(index).map_err(ScriptError::from)
    }

    fn label_index(&self, label: &str) -> Result<usize, ScriptError> {
        self.script
            .label_index(label)
            .ok_or_else(|| ScriptExecutionError::LabelNotFound(label.to_string()).into())
    }

    // ------------------------------------------------------------------
    // Variable resolution
    // ------------------------------------------------------------------

    // Topmost local scope first, then named scopes in registration order.
    // Unresolvable reads produce Null.
    fn resolve_variable(&self, name: &str) -> Value {
        if let Some(value) = self.stack.get_local(name) {
            return value;
        }
        for (_, scope) in &self.scopes {
            let scope = scope.lock().unwrap();
            if scope.contains_value(name) {
                return scope.get_value(name).unwrap_or(Value::Null);
            }
        }
        Value::Null
    }

    // Local scope wins; a named scope that knows the variable takes it
    // next (read-only scopes fault); otherwise the local scope gains it.
    fn write_variable(&mut self, name: &str, value: Value) -> Result<(), ScriptError> {
        if self.stack.contains_local(name) {
            self.stack.set_local(name, value);
            return Ok(());
        }
        for (scope_name, scope) in &self.scopes {
            let mut scope = scope.lock().unwrap();
            if scope.contains_value(name) {
                if scope.is_read_only(name) {
                    return Err(ScriptExecutionError::ReadOnlyScope {
                        scope: scope_name.clone(),
                        name: name.to_string(),
                    }
                    .into());
                }
                scope.set_value(name, value);
                return Ok(());
            }
        }
        self.stack.set_local(name, value);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Host dispatch
    // ------------------------------------------------------------------

    fn call_host(&mut self, name: &str, namespace: Option<&str>) -> Result<bool, ScriptError> {
        let function = self.resolver.resolve(namespace, name).ok_or_else(|| {
            let full = match namespace {
                Some(ns) => format!("{}.{}", ns, name),
                None => name.to_string(),
            };
            ScriptExecutionError::HostFunctionNotFound(full)
        })?;

        let mut return_value = Value::Null;
        match function.execute(self, &mut return_value) {
            Ok(continue_running) => {
                if !function.is_void() {
                    self.stack.push_value(return_value)?;
                }
                Ok(continue_running)
            }
            Err(err) if function.catches_errors() => {
                if !function.is_void() {
                    self.stack.push_value(Value::error(ErrorValue::from(&err)))?;
                }
                Ok(true)
            }
            Err(err) => Err(ScriptExecutionError::HostFunctionFailed {
                name: function.name().to_string(),
                message: err.to_string(),
            }
            .into()),
        }
    }
}

fn index_get(base: &Value, index: &Value) -> Value {
    match base {
        Value::List(list) => {
            let position = index.as_long();
            if position < 0 {
                return Value::Null;
            }
            list.lock().unwrap().get(position as usize).cloned().unwrap_or(Value::Null)
        }
        Value::Map(map) => {
            map.lock().unwrap().get(&index.as_string()).cloned().unwrap_or(Value::Null)
        }
        _ => Value::Null,
    }
}

// Out-of-range list writes and writes into non-containers fail silently.
fn index_set(base: &Value, index: &Value, value: Value) {
    match base {
        Value::List(list) => {
            let position = index.as_long();
            if position >= 0 {
                list.lock().unwrap().set(position as usize, value);
            }
        }
        Value::Map(map) => {
            map.lock().unwrap().set(&index.as_string(), value);
        }
        _ => {}
    }
}

impl std::fmt::Debug for ScriptInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ScriptInstance")
            .field("state", &self.state)
            .field("commands_executed", &self.commands_executed)
            .field("closeables", &self.closeables.len())
            .field("runaway_limit", &self.runaway_limit)
            .finish()
    }
}
