// File: src/errors.rs
//
// Error taxonomy for the RookScript compiler and virtual machine.
// Compile-time failures collect into a single ScriptParseError; runtime
// failures split into execution errors and stack errors so embedders can
// tell script bugs apart from host wiring bugs.

use std::fmt;
use std::io;

use thiserror::Error;

/// A single message collected during parsing, with its source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMessage {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl ParseMessage {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self { line, column, message: message.into() }
    }
}

impl fmt::Display for ParseMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}:{}) {}", self.line, self.column, self.message)
    }
}

/// All messages from a failed parse. No partial script is ever returned;
/// the parser runs to the end of input and reports everything it found.
#[derive(Debug, Clone)]
pub struct ScriptParseError {
    pub messages: Vec<ParseMessage>,
}

impl ScriptParseError {
    pub fn new(messages: Vec<ParseMessage>) -> Self {
        Self { messages }
    }
}

impl fmt::Display for ScriptParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "script parsing failed with {} error(s):", self.messages.len())?;
        for message in &self.messages {
            writeln!(f, "  {}", message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ScriptParseError {}

/// Overflow or underflow on one of the three instance stacks.
///
/// Distinct from [`ScriptExecutionError`] so the embedder can distinguish
/// a script blowing its budget from a host function mis-popping values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptStackError {
    #[error("value stack overflow (depth {0})")]
    ValueStackOverflow(usize),
    #[error("value stack underflow")]
    ValueStackUnderflow,
    #[error("activation stack overflow (depth {0})")]
    ActivationStackOverflow(usize),
    #[error("activation stack underflow")]
    ActivationStackUnderflow,
}

/// Fatal runtime failures. These abort the step loop and propagate to the
/// embedder; recoverable host failures travel as Error values instead.
#[derive(Debug, Clone, Error)]
pub enum ScriptExecutionError {
    #[error("entry point \"{0}\" not found")]
    EntryNotFound(String),
    #[error("entry point \"{name}\" takes {expected} parameter(s), but {actual} were provided")]
    EntryArityMismatch { name: String, expected: usize, actual: usize },
    #[error("label \"{0}\" not found in script")]
    LabelNotFound(String),
    #[error("command index {0} out of script bounds")]
    BadCommandIndex(usize),
    #[error("host function \"{0}\" not found")]
    HostFunctionNotFound(String),
    #[error("host function \"{name}\" failed: {message}")]
    HostFunctionFailed { name: String, message: String },
    #[error("scope \"{scope}\" is read-only; cannot write variable \"{name}\"")]
    ReadOnlyScope { scope: String, name: String },
    #[error("runaway script halted after {0} commands in one update")]
    Runaway(u64),
    #[error("instance has not been initialized with an entry point")]
    NotInitialized,
    #[error("no source or script was provided to the builder")]
    NoScript,
    #[error("script did not run to completion (instance is {0})")]
    NotCompleted(&'static str),
}

/// Top-level error type for compiling and running scripts.
#[derive(Debug, Clone, Error)]
pub enum ScriptError {
    #[error(transparent)]
    Parse(#[from] ScriptParseError),
    #[error(transparent)]
    Execution(#[from] ScriptExecutionError),
    #[error(transparent)]
    Stack(#[from] ScriptStackError),
}

/// A recoverable failure raised by a host function.
///
/// Carries the symbolic error type used by script-facing Error values
/// ("IOError", "BadParameter", "Unavailable", ...) so the VM can convert
/// it when the function declares itself error-handling.
#[derive(Debug, Clone, Error)]
#[error("{error_type}: {message}")]
pub struct HostCallError {
    pub error_type: String,
    pub message: String,
}

impl HostCallError {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self { error_type: error_type.into(), message: message.into() }
    }

    pub fn unavailable(what: &str) -> Self {
        Self::new("Unavailable", format!("{} is not available in this environment", what))
    }

    pub fn bad_parameter(message: impl Into<String>) -> Self {
        Self::new("BadParameter", message)
    }
}

impl From<io::Error> for HostCallError {
    fn from(err: io::Error) -> Self {
        Self::new("IOError", err.to_string())
    }
}

impl From<ScriptStackError> for HostCallError {
    fn from(err: ScriptStackError) -> Self {
        Self::new("StackError", err.to_string())
    }
}
