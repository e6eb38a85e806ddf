// File: src/optimizer.rs
//
// Single forward-pass peephole optimizer over the raw command list.
// Folds literal-operator chains, collapses push/pop pairs into SET and
// SET_VARIABLE, drops jumps to the next command, and removes code that
// follows a RETURN. Labels delimit basic blocks: crossing one always
// flushes pending state.
//
// Folding applies the same operator semantics the VM uses at runtime, so
// an optimized script computes bit-for-bit the same values.

use ahash::AHashMap;

use crate::bytecode::{Command, Script};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    PushLiterals,
    PushVariable,
    DeadCode,
}

struct Optimizer {
    // label -> index in the *source* command list, for redundant-jump tests
    source_labels: AHashMap<String, usize>,
    out: Vec<Command>,
    out_labels: AHashMap<String, usize>,
    out_labels_by_index: AHashMap<usize, Vec<String>>,
    pending_literals: Vec<Value>,
    pending_variable: Option<String>,
    state: State,
}

/// Optimizes a parsed script, rebuilding its label and entry tables
/// around the rewritten command list.
pub fn optimize(script: Script) -> Script {
    let (commands, labels, labels_by_index, entries, functions) = script.take_tables();
    let mut optimizer = Optimizer {
        source_labels: labels,
        out: Vec::new(),
        out_labels: AHashMap::new(),
        out_labels_by_index: AHashMap::new(),
        pending_literals: Vec::new(),
        pending_variable: None,
        state: State::Init,
    };

    for (index, command) in commands.iter().enumerate() {
        if let Some(marks) = labels_by_index.get(&index) {
            optimizer.flush();
            optimizer.state = State::Init;
            for label in marks {
                optimizer.mark_label(label);
            }
        }
        optimizer.process(command, index);
    }
    optimizer.flush();
    if let Some(marks) = labels_by_index.get(&commands.len()) {
        for label in marks {
            optimizer.mark_label(label);
        }
    }

    Script::new(
        optimizer.out,
        optimizer.out_labels,
        optimizer.out_labels_by_index,
        entries,
        functions,
    )
}

impl Optimizer {
    fn mark_label(&mut self, label: &str) {
        let index = self.out.len();
        self.out_labels.insert(label.to_string(), index);
        self.out_labels_by_index.entry(index).or_default().push(label.to_string());
    }

    fn emit(&mut self, command: Command) {
        self.out.push(command);
    }

    // Emits whatever is pending and drops back to Init.
    fn flush(&mut self) {
        match self.state {
            State::PushLiterals => {
                for literal in self.pending_literals.drain(..) {
                    self.out.push(Command::Push(literal));
                }
            }
            State::PushVariable => {
                if let Some(name) = self.pending_variable.take() {
                    self.out.push(Command::PushVariable(name));
                }
            }
            State::Init | State::DeadCode => {}
        }
        self.state = State::Init;
    }

    fn process(&mut self, command: &Command, index: usize) {
        loop {
            match self.state {
                State::DeadCode => return,

                State::Init => {
                    match command {
                        Command::Push(value) => {
                            self.pending_literals.push(value.clone());
                            self.state = State::PushLiterals;
                        }
                        Command::PushVariable(name) => {
                            self.pending_variable = Some(name.clone());
                            self.state = State::PushVariable;
                        }
                        Command::Return => {
                            self.emit(Command::Return);
                            self.state = State::DeadCode;
                        }
                        Command::Jump(label)
                            if self.source_labels.get(label) == Some(&(index + 1)) =>
                        {
                            // Jump to the very next command; drop it.
                        }
                        other => self.emit(other.clone()),
                    }
                    return;
                }

                State::PushLiterals => {
                    match command {
                        Command::Push(value) => {
                            self.pending_literals.push(value.clone());
                            return;
                        }
                        unary if apply_unary(unary, &Value::Null).is_some() => {
                            let top = self.pending_literals.last_mut().unwrap();
                            *top = apply_unary(unary, top).unwrap();
                            return;
                        }
                        binary
                            if self.pending_literals.len() >= 2
                                && apply_binary(binary, &Value::Null, &Value::Null).is_some() =>
                        {
                            let b = self.pending_literals.pop().unwrap();
                            let a = self.pending_literals.pop().unwrap();
                            self.pending_literals.push(apply_binary(binary, &a, &b).unwrap());
                            return;
                        }
                        Command::PopVariable(name) if self.pending_literals.len() == 1 => {
                            let literal = self.pending_literals.pop().unwrap();
                            self.emit(Command::Set(name.clone(), literal));
                            self.state = State::Init;
                            return;
                        }
                        _ => {
                            self.flush();
                            continue;
                        }
                    }
                }

                State::PushVariable => match command {
                    Command::PopVariable(target) => {
                        let source = self.pending_variable.take().unwrap();
                        self.emit(Command::SetVariable(target.clone(), source));
                        self.state = State::Init;
                        return;
                    }
                    _ => {
                        self.flush();
                        continue;
                    }
                },
            }
        }
    }
}

// Unary fold table; None for anything that is not a pure unary operator.
fn apply_unary(command: &Command, operand: &Value) -> Option<Value> {
    match command {
        Command::Absolute => Some(Value::absolute(operand)),
        Command::Negate => Some(Value::negate(operand)),
        Command::Not => Some(Value::bitwise_not(operand)),
        Command::LogicalNot => Some(Value::logical_not(operand)),
        _ => None,
    }
}

// Binary fold table; None for anything that is not a pure binary operator.
fn apply_binary(command: &Command, a: &Value, b: &Value) -> Option<Value> {
    match command {
        Command::Add => Some(Value::add(a, b)),
        Command::Subtract => Some(Value::subtract(a, b)),
        Command::Multiply => Some(Value::multiply(a, b)),
        Command::Divide => Some(Value::divide(a, b)),
        Command::Modulo => Some(Value::modulo(a, b)),
        Command::And => Some(Value::and(a, b)),
        Command::Or => Some(Value::or(a, b)),
        Command::Xor => Some(Value::xor(a, b)),
        Command::LogicalAnd => Some(Value::logical_and(a, b)),
        Command::LogicalOr => Some(Value::logical_or(a, b)),
        Command::LeftShift => Some(Value::left_shift(a, b)),
        Command::RightShift => Some(Value::right_shift(a, b)),
        Command::RightShiftPadded => Some(Value::right_shift_padded(a, b)),
        Command::Less => Some(Value::less(a, b)),
        Command::LessOrEqual => Some(Value::less_or_equal(a, b)),
        Command::Greater => Some(Value::greater(a, b)),
        Command::GreaterOrEqual => Some(Value::greater_or_equal(a, b)),
        Command::Equal => Some(Value::equal(a, b)),
        Command::NotEqual => Some(Value::not_equal(a, b)),
        Command::StrictEqual => Some(Value::strict_equal(a, b)),
        Command::StrictNotEqual => Some(Value::strict_not_equal(a, b)),
        _ => None,
    }
}
