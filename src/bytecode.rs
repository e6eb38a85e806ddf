// File: src/bytecode.rs
//
// Bytecode command definitions and the compiled Script container.
// A Script is a linear command array plus label, entry, and function
// tables; it is immutable once the parser and optimizer have finished.

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use ahash::AHashMap;

use crate::resolver::HostFunctionResolver;
use crate::value::Value;

/// One executable operation: an opcode plus up to two operands (literal
/// values, variable names, or label names).
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // === Stack ===
    Noop,
    /// Push a literal value.
    Push(Value),
    /// Discard the top value.
    Pop,

    // === Variables ===
    /// Push the value of a variable (local scope, then named scopes).
    PushVariable(String),
    /// Pop the top value into a variable.
    PopVariable(String),
    /// Store a literal into a variable without touching the stack.
    /// Produced by the optimizer from a PUSH / POP_VARIABLE pair.
    Set(String, Value),
    /// Copy one variable into another without touching the stack.
    /// Produced by the optimizer from a PUSH_VARIABLE / POP_VARIABLE pair.
    SetVariable(String, String),

    // === Control ===
    Jump(String),
    /// Pop; jump if truthy.
    JumpTrue(String),
    /// Pop; jump if falsy.
    JumpFalse(String),
    /// Pop; jump to the first label if truthy, else the second.
    JumpBranch(String, String),
    /// Push a frame starting at the label (script function call).
    Call(String),
    /// Call a host function, optionally under a namespace.
    CallHost(String, Option<String>),
    /// Pop the return value, pop the frame, push the value back for the
    /// caller. With no frames left, the script ends.
    Return,

    // === Lists and maps ===
    /// Push a new empty list.
    PushListNew,
    /// Pop N values and push a list of them (in evaluation order).
    PushListInit(usize),
    /// Pop index and container, push the element (Null when absent).
    PushListIndex,
    /// Like PushListIndex, but leaves container and index on the stack.
    /// Used by compound indexed assignment to read the pre-value.
    PushListIndexContents,
    /// Pop value, index, and container; write the element.
    PopList,

    // === Unary operators ===
    Absolute,
    Negate,
    Not,
    LogicalNot,

    // === Binary operators ===
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    And,
    Or,
    Xor,
    LogicalAnd,
    LogicalOr,
    LeftShift,
    RightShift,
    RightShiftPadded,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
}

impl Command {
    /// The disassembly mnemonic for this command.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Command::Noop => "NOOP",
            Command::Push(_) => "PUSH",
            Command::Pop => "POP",
            Command::PushVariable(_) => "PUSH_VARIABLE",
            Command::PopVariable(_) => "POP_VARIABLE",
            Command::Set(_, _) => "SET",
            Command::SetVariable(_, _) => "SET_VARIABLE",
            Command::Jump(_) => "JUMP",
            Command::JumpTrue(_) => "JUMP_TRUE",
            Command::JumpFalse(_) => "JUMP_FALSE",
            Command::JumpBranch(_, _) => "JUMP_BRANCH",
            Command::Call(_) => "CALL",
            Command::CallHost(_, _) => "CALL_HOST",
            Command::Return => "RETURN",
            Command::PushListNew => "PUSH_LIST_NEW",
            Command::PushListInit(_) => "PUSH_LIST_INIT",
            Command::PushListIndex => "PUSH_LIST_INDEX",
            Command::PushListIndexContents => "PUSH_LIST_INDEX_CONTENTS",
            Command::PopList => "POP_LIST",
            Command::Absolute => "ABSOLUTE",
            Command::Negate => "NEGATE",
            Command::Not => "NOT",
            Command::LogicalNot => "LOGICAL_NOT",
            Command::Add => "ADD",
            Command::Subtract => "SUBTRACT",
            Command::Multiply => "MULTIPLY",
            Command::Divide => "DIVIDE",
            Command::Modulo => "MODULO",
            Command::And => "AND",
            Command::Or => "OR",
            Command::Xor => "XOR",
            Command::LogicalAnd => "LOGICAL_AND",
            Command::LogicalOr => "LOGICAL_OR",
            Command::LeftShift => "LEFT_SHIFT",
            Command::RightShift => "RIGHT_SHIFT",
            Command::RightShiftPadded => "RIGHT_SHIFT_PADDED",
            Command::Less => "LESS",
            Command::LessOrEqual => "LESS_OR_EQUAL",
            Command::Greater => "GREATER",
            Command::GreaterOrEqual => "GREATER_OR_EQUAL",
            Command::Equal => "EQUAL",
            Command::NotEqual => "NOT_EQUAL",
            Command::StrictEqual => "STRICT_EQUAL",
            Command::StrictNotEqual => "STRICT_NOT_EQUAL",
        }
    }
}

// Literal operands disassemble with strings quoted so the output is
// unambiguous; everything else uses the value display format.
fn format_literal(value: &Value) -> String {
    match value {
        Value::String(s) => format!("{:?}", s.as_ref()),
        other => other.to_string(),
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.mnemonic())?;
        match self {
            Command::Push(value) => write!(f, " {}", format_literal(value)),
            Command::PushVariable(name) | Command::PopVariable(name) => write!(f, " {}", name),
            Command::Set(name, value) => write!(f, " {} {}", name, format_literal(value)),
            Command::SetVariable(dst, src) => write!(f, " {} {}", dst, src),
            Command::Jump(label)
            | Command::JumpTrue(label)
            | Command::JumpFalse(label)
            | Command::Call(label) => write!(f, " {}", label),
            Command::JumpBranch(if_true, if_false) => write!(f, " {} {}", if_true, if_false),
            Command::CallHost(name, None) => write!(f, " {}", name),
            Command::CallHost(name, Some(ns)) => write!(f, " {} {}", name, ns),
            Command::PushListInit(count) => write!(f, " {}", count),
            _ => Ok(()),
        }
    }
}

/// An entry or function table record: expected parameter count and the
/// command index of its label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptEntry {
    pub param_count: usize,
    pub index: usize,
}

/// The label a named entry resolves to: `main` stays `main`, everything
/// else gets the `entry_` prefix on the lowercased name.
pub fn entry_label(name: &str) -> String {
    let folded = name.to_ascii_lowercase();
    if folded == "main" {
        folded
    } else {
        format!("entry_{}", folded)
    }
}

/// The label a script function resolves to (`function_` prefix).
pub fn function_label(name: &str) -> String {
    format!("function_{}", name.to_ascii_lowercase())
}

/// A compiled script: the command array plus the tables needed to run it.
///
/// Everything but the host-function resolver is fixed at build time; the
/// resolver reference is attached by the builder before execution.
pub struct Script {
    commands: Vec<Command>,
    labels: AHashMap<String, usize>,
    labels_by_index: AHashMap<usize, Vec<String>>,
    entries: AHashMap<String, ScriptEntry>,
    functions: AHashMap<String, ScriptEntry>,
    host_resolver: Option<Arc<dyn HostFunctionResolver>>,
    command_runaway_limit: u64,
}

impl Script {
    pub(crate) fn new(
        commands: Vec<Command>,
        labels: AHashMap<String, usize>,
        labels_by_index: AHashMap<usize, Vec<String>>,
        entries: AHashMap<String, ScriptEntry>,
        functions: AHashMap<String, ScriptEntry>,
    ) -> Self {
        let mut script = Self {
            commands,
            labels,
            labels_by_index,
            entries,
            functions,
            host_resolver: None,
            command_runaway_limit: 0,
        };
        script.refresh_entry_indices();
        script
    }

    // Entry/function table indices follow their labels; the optimizer
    // moves labels, so indices are recomputed from the label table.
    pub(crate) fn refresh_entry_indices(&mut self) {
        for (name, entry) in self.entries.iter_mut() {
            if let Some(&index) = self.labels.get(&entry_label(name)) {
                entry.index = index;
            }
        }
        for (name, function) in self.functions.iter_mut() {
            if let Some(&index) = self.labels.get(&function_label(name)) {
                function.index = index;
            }
        }
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn command(&self, index: usize) -> Option<&Command> {
        self.commands.get(index)
    }

    pub fn label_index(&self, label: &str) -> Option<usize> {
        self.labels.get(label).copied()
    }

    pub fn labels_at(&self, index: usize) -> &[String] {
        self.labels_by_index.get(&index).map(Vec::as_slice).unwrap_or(&[])
    }

    #[allow(clippy::type_complexity)]
    pub(crate) fn take_tables(
        self,
    ) -> (
        Vec<Command>,
        AHashMap<String, usize>,
        AHashMap<usize, Vec<String>>,
        AHashMap<String, ScriptEntry>,
        AHashMap<String, ScriptEntry>,
    ) {
        (self.commands, self.labels, self.labels_by_index, self.entries, self.functions)
    }

    /// Looks up a host-callable entry point, case-insensitively.
    pub fn entry(&self, name: &str) -> Option<ScriptEntry> {
        self.entries.get(&name.to_ascii_lowercase()).copied()
    }

    /// Looks up a script function, case-insensitively.
    pub fn function(&self, name: &str) -> Option<ScriptEntry> {
        self.functions.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn set_host_resolver(&mut self, resolver: Arc<dyn HostFunctionResolver>) {
        self.host_resolver = Some(resolver);
    }

    pub fn host_resolver(&self) -> Option<&Arc<dyn HostFunctionResolver>> {
        self.host_resolver.as_ref()
    }

    pub fn set_command_runaway_limit(&mut self, limit: u64) {
        self.command_runaway_limit = limit;
    }

    pub fn command_runaway_limit(&self) -> u64 {
        self.command_runaway_limit
    }

    /// Renders the script as text: labels flush-left ending in `:`, one
    /// tab-indented command per line. Diagnostic output; never parsed back.
    pub fn disassemble(&self, out: &mut dyn Write) -> io::Result<()> {
        for index in 0..=self.commands.len() {
            for label in self.labels_at(index) {
                writeln!(out, "{}:", label)?;
            }
            if let Some(command) = self.commands.get(index) {
                writeln!(out, "\t{}", command)?;
            }
        }
        Ok(())
    }

    /// Convenience wrapper over [`Script::disassemble`].
    pub fn disassemble_to_string(&self) -> String {
        let mut buffer = Vec::new();
        // Writing to a Vec cannot fail.
        self.disassemble(&mut buffer).unwrap();
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Script")
            .field("commands", &self.commands.len())
            .field("labels", &self.labels.len())
            .field("entries", &self.entries.len())
            .field("functions", &self.functions.len())
            .field("runaway_limit", &self.command_runaway_limit)
            .finish()
    }
}
