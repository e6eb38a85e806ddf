// File: src/stdlib.rs
//
// The common host-function set: stdio, type inspection, conversions,
// error-value construction, waiting, and closeable control. Hosts that
// want them call ScriptInstanceBuilder::with_common_functions() or merge
// CommonFunction::registry() into their own resolver.

use crate::errors::HostCallError;
use crate::instance::ScriptInstance;
use crate::resolver::{HostFunction, HostFunctionRegistry};
use crate::value::{ErrorValue, Kind, Value};

/// One variant per common host function. Names resolve case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommonFunction {
    /// PRINT(value): writes to stdout; returns true, or an Unavailable
    /// error value when the environment has no stdout.
    Print,
    /// PRINTLN(value): PRINT with a trailing newline.
    Println,
    /// READLINE(): reads one line from stdin.
    ReadLine,
    /// TYPEOF(value): the kind name ("integer", "list", "error", ...).
    TypeOf,
    /// LENGTH(value): string/container length, 1 otherwise.
    Length,
    /// ISEMPTY(value): emptiness (NaN counts as empty).
    IsEmpty,
    /// TOSTRING(value)
    ToString,
    /// TOINT(value)
    ToInt,
    /// TOFLOAT(value)
    ToFloat,
    /// TOBOOLEAN(value)
    ToBoolean,
    /// ISERROR(value)
    IsError,
    /// ERROR(type, message): builds an error value.
    Error,
    /// ERRORTYPE(value): the error's type, or Null if not an error.
    ErrorType,
    /// ERRORMSG(value): the error's message, or Null if not an error.
    ErrorMsg,
    /// WAIT(type, parameter): parks the instance until the wait handler
    /// lets it continue.
    Wait,
    /// DONOTCLOSE(objectref): unregisters the object's closeable without
    /// closing, so the host can take it over.
    DoNotClose,
}

impl CommonFunction {
    pub const ALL: [CommonFunction; 16] = [
        CommonFunction::Print,
        CommonFunction::Println,
        CommonFunction::ReadLine,
        CommonFunction::TypeOf,
        CommonFunction::Length,
        CommonFunction::IsEmpty,
        CommonFunction::ToString,
        CommonFunction::ToInt,
        CommonFunction::ToFloat,
        CommonFunction::ToBoolean,
        CommonFunction::IsError,
        CommonFunction::Error,
        CommonFunction::ErrorType,
        CommonFunction::ErrorMsg,
        CommonFunction::Wait,
        CommonFunction::DoNotClose,
    ];

    /// A registry holding the whole common set.
    pub fn registry() -> HostFunctionRegistry {
        HostFunctionRegistry::with_functions(Self::ALL)
    }
}

impl HostFunction for CommonFunction {
    fn name(&self) -> &str {
        match self {
            CommonFunction::Print => "print",
            CommonFunction::Println => "println",
            CommonFunction::ReadLine => "readline",
            CommonFunction::TypeOf => "typeof",
            CommonFunction::Length => "length",
            CommonFunction::IsEmpty => "isempty",
            CommonFunction::ToString => "tostring",
            CommonFunction::ToInt => "toint",
            CommonFunction::ToFloat => "tofloat",
            CommonFunction::ToBoolean => "toboolean",
            CommonFunction::IsError => "iserror",
            CommonFunction::Error => "error",
            CommonFunction::ErrorType => "errortype",
            CommonFunction::ErrorMsg => "errormsg",
            CommonFunction::Wait => "wait",
            CommonFunction::DoNotClose => "donotclose",
        }
    }

    fn parameter_count(&self) -> usize {
        match self {
            CommonFunction::ReadLine => 0,
            CommonFunction::Error | CommonFunction::Wait => 2,
            _ => 1,
        }
    }

    fn is_void(&self) -> bool {
        matches!(self, CommonFunction::Wait)
    }

    fn usage(&self) -> &str {
        match self {
            CommonFunction::Print => "PRINT(value) - write a value to standard output",
            CommonFunction::Println => "PRINTLN(value) - write a value and a newline",
            CommonFunction::ReadLine => "READLINE() - read one line from standard input",
            CommonFunction::TypeOf => "TYPEOF(value) - the value's kind name",
            CommonFunction::Length => "LENGTH(value) - string or container length",
            CommonFunction::IsEmpty => "ISEMPTY(value) - true if the value is empty",
            CommonFunction::ToString => "TOSTRING(value) - convert to a string",
            CommonFunction::ToInt => "TOINT(value) - convert to an integer",
            CommonFunction::ToFloat => "TOFLOAT(value) - convert to a float",
            CommonFunction::ToBoolean => "TOBOOLEAN(value) - convert to a boolean",
            CommonFunction::IsError => "ISERROR(value) - true if the value is an error",
            CommonFunction::Error => "ERROR(type, message) - build an error value",
            CommonFunction::ErrorType => "ERRORTYPE(error) - an error value's type",
            CommonFunction::ErrorMsg => "ERRORMSG(error) - an error value's message",
            CommonFunction::Wait => "WAIT(type, parameter) - park until the wait handler resumes",
            CommonFunction::DoNotClose => "DONOTCLOSE(objectref) - release a closeable to the host",
        }
    }

    fn execute(
        &self,
        instance: &mut ScriptInstance,
        return_value: &mut Value,
    ) -> Result<bool, HostCallError> {
        match self {
            CommonFunction::Print | CommonFunction::Println => {
                let value = instance.pop_stack_value()?;
                let mut text = value.as_string();
                if matches!(self, CommonFunction::Println) {
                    text.push('\n');
                }
                *return_value = match instance.environment().print(&text) {
                    Ok(()) => Value::Boolean(true),
                    Err(err) => Value::error(ErrorValue::from(&err)),
                };
            }
            CommonFunction::ReadLine => {
                *return_value = match instance.environment().read_line() {
                    Ok(line) => Value::string(line),
                    Err(err) => Value::error(ErrorValue::from(&err)),
                };
            }
            CommonFunction::TypeOf => {
                let value = instance.pop_stack_value()?;
                *return_value = Value::string(value.kind().name());
            }
            CommonFunction::Length => {
                let value = instance.pop_stack_value()?;
                *return_value = Value::Integer(value.length() as i64);
            }
            CommonFunction::IsEmpty => {
                let value = instance.pop_stack_value()?;
                *return_value = Value::Boolean(value.empty());
            }
            CommonFunction::ToString => {
                let value = instance.pop_stack_value()?;
                *return_value = value.convert_to(Kind::String);
            }
            CommonFunction::ToInt => {
                let value = instance.pop_stack_value()?;
                *return_value = value.convert_to(Kind::Integer);
            }
            CommonFunction::ToFloat => {
                let value = instance.pop_stack_value()?;
                *return_value = value.convert_to(Kind::Float);
            }
            CommonFunction::ToBoolean => {
                let value = instance.pop_stack_value()?;
                *return_value = value.convert_to(Kind::Boolean);
            }
            CommonFunction::IsError => {
                let value = instance.pop_stack_value()?;
                *return_value = Value::Boolean(value.is_error());
            }
            CommonFunction::Error => {
                let message = instance.pop_stack_value()?;
                let error_type = instance.pop_stack_value()?;
                *return_value =
                    Value::error_parts(&error_type.as_string(), &message.as_string());
            }
            CommonFunction::ErrorType => {
                let value = instance.pop_stack_value()?;
                *return_value = match &value {
                    Value::Error(error) => Value::string(error.error_type()),
                    _ => Value::Null,
                };
            }
            CommonFunction::ErrorMsg => {
                let value = instance.pop_stack_value()?;
                *return_value = match &value {
                    Value::Error(error) => Value::string(error.message()),
                    _ => Value::Null,
                };
            }
            CommonFunction::Wait => {
                let parameter = instance.pop_stack_value()?;
                let wait_type = instance.pop_stack_value()?;
                instance.wait(wait_type, parameter);
                return Ok(false);
            }
            CommonFunction::DoNotClose => {
                let value = instance.pop_stack_value()?;
                if let Value::ObjectRef(object) = &value {
                    instance.unregister_closeable_for(object);
                    *return_value = value.clone();
                } else {
                    return Err(HostCallError::bad_parameter(
                        "DONOTCLOSE requires an object ref",
                    ));
                }
            }
        }
        Ok(true)
    }

    fn catches_errors(&self) -> bool {
        // DONOTCLOSE reports misuse as an error value rather than killing
        // the script.
        matches!(self, CommonFunction::DoNotClose)
    }
}
