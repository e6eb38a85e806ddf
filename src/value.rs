// File: src/value.rs
//
// The tagged script value and its operator semantics.
// Every arithmetic, bitwise, comparison, and conversion rule lives here so
// that the VM and the optimizer (which folds literals by constructing
// temporary values) agree bit-for-bit.

use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::containers::{ScriptList, ScriptMap};
use crate::errors::HostCallError;

/// The kind tag of a [`Value`], without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Kind {
    Null,
    Boolean,
    Integer,
    Float,
    String,
    List,
    Map,
    Error,
    ObjectRef,
}

impl Kind {
    /// Script-facing kind name, as returned by the TYPEOF host function.
    pub fn name(self) -> &'static str {
        match self {
            Kind::Null => "null",
            Kind::Boolean => "boolean",
            Kind::Integer => "integer",
            Kind::Float => "float",
            Kind::String => "string",
            Kind::List => "list",
            Kind::Map => "map",
            Kind::Error => "error",
            Kind::ObjectRef => "objectref",
        }
    }
}

/// The recoverable-error value record: a symbolic type, a human-readable
/// message, and a localized variant of that message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorValue {
    error_type: String,
    message: String,
    localized_message: String,
}

impl ErrorValue {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self { error_type: error_type.into(), localized_message: message.clone(), message }
    }

    pub fn with_localized(
        error_type: impl Into<String>,
        message: impl Into<String>,
        localized_message: impl Into<String>,
    ) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
            localized_message: localized_message.into(),
        }
    }

    pub fn error_type(&self) -> &str {
        &self.error_type
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn localized_message(&self) -> &str {
        &self.localized_message
    }
}

impl From<&HostCallError> for ErrorValue {
    fn from(err: &HostCallError) -> Self {
        ErrorValue::new(err.error_type.clone(), err.message.clone())
    }
}

/// A host-owned object exposed to scripts through an opaque handle.
///
/// Implementors provide `as_any` so hosts can downcast handles they get
/// back from the script.
pub trait ScriptObject: Any + Send + Sync {
    fn type_name(&self) -> &str {
        "object"
    }

    fn as_any(&self) -> &dyn Any;
}

/// Opaque, shared handle to a [`ScriptObject`]. Identity is the handle
/// allocation, never the object contents.
#[derive(Clone)]
pub struct ObjectRef(Arc<dyn ScriptObject>);

impl ObjectRef {
    pub fn new<T: ScriptObject>(object: T) -> Self {
        Self(Arc::new(object))
    }

    pub fn from_arc(object: Arc<dyn ScriptObject>) -> Self {
        Self(object)
    }

    pub fn type_name(&self) -> &str {
        self.0.type_name()
    }

    /// The data pointer of the underlying allocation, used for identity
    /// checks against other handle types (e.g. registered closeables).
    pub fn data_ptr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }

    pub fn same_object(&self, other: &ObjectRef) -> bool {
        std::ptr::eq(self.data_ptr(), other.data_ptr())
    }

    pub fn downcast<T: ScriptObject>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ObjectRef({})", self.type_name())
    }
}

/// A script value: one slot in a variable, list element, map entry, or
/// stack cell.
///
/// Scalars carry their payload inline. Strings are immutable and shared;
/// lists, maps, errors, and object refs are shared handles, so pushing or
/// assigning one aliases it and [`Value::copy`] is how a deep copy is made.
#[derive(Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(Arc<str>),
    List(Arc<Mutex<ScriptList>>),
    Map(Arc<Mutex<ScriptMap>>),
    Error(Arc<ErrorValue>),
    ObjectRef(ObjectRef),
}

// Promotion ladder for binary operators: both operands convert to the
// higher of the two kinds. Reference kinds never promote.
enum Promoted {
    Null,
    Boolean(bool, bool),
    Integer(i64, i64),
    Float(f64, f64),
    String(String, String),
    NotNumeric,
}

fn arithmetic_rank(kind: Kind) -> Option<u8> {
    match kind {
        Kind::Null => Some(0),
        Kind::Boolean => Some(1),
        Kind::Integer => Some(2),
        Kind::Float => Some(3),
        Kind::String => Some(4),
        _ => None,
    }
}

fn promote(a: &Value, b: &Value) -> Promoted {
    let (ra, rb) = match (arithmetic_rank(a.kind()), arithmetic_rank(b.kind())) {
        (Some(ra), Some(rb)) => (ra, rb),
        _ => return Promoted::NotNumeric,
    };
    match ra.max(rb) {
        0 => Promoted::Null,
        1 => Promoted::Boolean(a.as_boolean(), b.as_boolean()),
        2 => Promoted::Integer(a.as_long(), b.as_long()),
        3 => Promoted::Float(a.as_double(), b.as_double()),
        _ => Promoted::String(a.as_string(), b.as_string()),
    }
}

impl Value {
    // ------------------------------------------------------------------
    // Constructors
    // ------------------------------------------------------------------

    pub fn string(s: impl AsRef<str>) -> Value {
        Value::String(Arc::from(s.as_ref()))
    }

    pub fn new_list() -> Value {
        Value::List(Arc::new(Mutex::new(ScriptList::new())))
    }

    pub fn list_of(values: Vec<Value>) -> Value {
        Value::List(Arc::new(Mutex::new(ScriptList::from_values(values))))
    }

    pub fn list(list: ScriptList) -> Value {
        Value::List(Arc::new(Mutex::new(list)))
    }

    pub fn new_map() -> Value {
        Value::Map(Arc::new(Mutex::new(ScriptMap::new())))
    }

    pub fn map(map: ScriptMap) -> Value {
        Value::Map(Arc::new(Mutex::new(map)))
    }

    pub fn error(error: ErrorValue) -> Value {
        Value::Error(Arc::new(error))
    }

    pub fn error_parts(error_type: &str, message: &str) -> Value {
        Value::Error(Arc::new(ErrorValue::new(error_type, message)))
    }

    pub fn object<T: ScriptObject>(object: T) -> Value {
        Value::ObjectRef(ObjectRef::new(object))
    }

    // ------------------------------------------------------------------
    // Kind tests
    // ------------------------------------------------------------------

    pub fn kind(&self) -> Kind {
        match self {
            Value::Null => Kind::Null,
            Value::Boolean(_) => Kind::Boolean,
            Value::Integer(_) => Kind::Integer,
            Value::Float(_) => Kind::Float,
            Value::String(_) => Kind::String,
            Value::List(_) => Kind::List,
            Value::Map(_) => Kind::Map,
            Value::Error(_) => Kind::Error,
            Value::ObjectRef(_) => Kind::ObjectRef,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, Value::Boolean(_))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Value::Integer(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Value::Float(_))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn is_object_ref(&self) -> bool {
        matches!(self, Value::ObjectRef(_))
    }

    // ------------------------------------------------------------------
    // Coercions
    // ------------------------------------------------------------------

    /// Truthiness: Null is false; zero, NaN, and empty strings/containers
    /// are false; errors and object refs are true.
    pub fn as_boolean(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Integer(n) => *n != 0,
            Value::Float(f) => !(*f == 0.0 || f.is_nan()),
            Value::String(s) => !s.is_empty(),
            Value::List(l) => !l.lock().unwrap().is_empty(),
            Value::Map(m) => !m.lock().unwrap().is_empty(),
            Value::Error(_) => true,
            Value::ObjectRef(_) => true,
        }
    }

    pub fn as_long(&self) -> i64 {
        match self {
            Value::Null => 0,
            Value::Boolean(b) => *b as i64,
            Value::Integer(n) => *n,
            Value::Float(f) => {
                if f.is_nan() {
                    0
                } else {
                    *f as i64
                }
            }
            Value::String(s) => match s.parse::<i64>() {
                Ok(n) => n,
                Err(_) => s.parse::<f64>().map(|f| f as i64).unwrap_or(0),
            },
            _ => 0,
        }
    }

    pub fn as_double(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::Boolean(b) => *b as i64 as f64,
            Value::Integer(n) => *n as f64,
            Value::Float(f) => *f,
            Value::String(s) => s.parse::<f64>().unwrap_or(f64::NAN),
            _ => f64::NAN,
        }
    }

    pub fn as_string(&self) -> String {
        self.to_string()
    }

    pub fn as_object_ref(&self) -> Option<&ObjectRef> {
        match self {
            Value::ObjectRef(obj) => Some(obj),
            _ => None,
        }
    }

    /// String: Unicode scalar count; containers: element/entry count;
    /// everything else is 1.
    pub fn length(&self) -> usize {
        match self {
            Value::String(s) => s.chars().count(),
            Value::List(l) => l.lock().unwrap().len(),
            Value::Map(m) => m.lock().unwrap().len(),
            _ => 1,
        }
    }

    /// Emptiness is the inverse of truthiness; NaN counts as empty.
    pub fn empty(&self) -> bool {
        !self.as_boolean()
    }

    /// Deep copy for lists and maps, shallow duplicate of the handle for
    /// errors and object refs, plain clone for scalars.
    pub fn copy(&self) -> Value {
        match self {
            Value::List(l) => Value::list(l.lock().unwrap().deep_copy()),
            Value::Map(m) => Value::map(m.lock().unwrap().deep_copy()),
            other => other.clone(),
        }
    }

    /// Converts to the target kind with the scalar conversion rules;
    /// conversion to the value's own kind is an alias.
    pub fn convert_to(&self, kind: Kind) -> Value {
        if self.kind() == kind {
            return self.clone();
        }
        match kind {
            Kind::Null => Value::Null,
            Kind::Boolean => Value::Boolean(self.as_boolean()),
            Kind::Integer => Value::Integer(self.as_long()),
            Kind::Float => Value::Float(self.as_double()),
            Kind::String => Value::string(self.as_string()),
            _ => Value::Null,
        }
    }

    // ------------------------------------------------------------------
    // Equality and ordering
    // ------------------------------------------------------------------

    /// Strict (`===`) equality: same kind, and same raw bits for scalars
    /// (two NaN floats are strictly equal), same text for strings, same
    /// handle for lists, maps, errors, and object refs.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => Arc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Arc::ptr_eq(a, b),
            (Value::Error(a), Value::Error(b)) => Arc::ptr_eq(a, b),
            (Value::ObjectRef(a), Value::ObjectRef(b)) => a.same_object(b),
            _ => false,
        }
    }

    /// Loose ordering predicate behind `== != < <= > >=`.
    ///
    /// Null is less than everything but itself. Lists, maps, and object
    /// refs compare by reference only: identical is Equal, anything else
    /// is Less. If either side is a String, both compare as strings;
    /// otherwise both compare as doubles. `None` is the NaN outcome: all
    /// ordered comparisons and `==` are false, `!=` is true.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self.is_null(), other.is_null()) {
            (true, true) => return Some(Ordering::Equal),
            (true, false) => return Some(Ordering::Less),
            (false, true) => return Some(Ordering::Greater),
            (false, false) => {}
        }
        if self.is_reference_compared() || other.is_reference_compared() {
            return if self.strict_equals(other) {
                Some(Ordering::Equal)
            } else {
                Some(Ordering::Less)
            };
        }
        if self.is_string() || other.is_string() {
            return Some(self.as_string().cmp(&other.as_string()));
        }
        self.as_double().partial_cmp(&other.as_double())
    }

    fn is_reference_compared(&self) -> bool {
        matches!(self, Value::List(_) | Value::Map(_) | Value::ObjectRef(_))
    }

    /// Total order used by `sort` and the sorted-set list operations.
    /// Scalars order before reference kinds; reference kinds order by kind
    /// then handle address; NaN orders after every number and equal to
    /// itself.
    pub fn total_compare(&self, other: &Value) -> Ordering {
        match (self.reference_identity(), other.reference_identity()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => match self.compare(other) {
                Some(ordering) => ordering,
                None => {
                    let a_nan = matches!(self, Value::Float(f) if f.is_nan());
                    let b_nan = matches!(other, Value::Float(f) if f.is_nan());
                    match (a_nan, b_nan) {
                        (true, true) => Ordering::Equal,
                        (true, false) => Ordering::Greater,
                        (false, true) => Ordering::Less,
                        (false, false) => Ordering::Equal,
                    }
                }
            },
        }
    }

    fn reference_identity(&self) -> Option<(u8, usize)> {
        match self {
            Value::List(l) => Some((0, Arc::as_ptr(l) as *const () as usize)),
            Value::Map(m) => Some((1, Arc::as_ptr(m) as *const () as usize)),
            Value::Error(e) => Some((2, Arc::as_ptr(e) as *const () as usize)),
            Value::ObjectRef(o) => Some((3, o.data_ptr() as usize)),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Unary operators
    // ------------------------------------------------------------------

    /// Unary `+`.
    pub fn absolute(operand: &Value) -> Value {
        match operand {
            Value::Null => Value::Null,
            Value::Boolean(b) => Value::Boolean(*b),
            Value::Integer(n) => Value::Integer(n.wrapping_abs()),
            Value::Float(f) => Value::Float(f.abs()),
            _ => Value::Float(f64::NAN),
        }
    }

    /// Unary `-`.
    pub fn negate(operand: &Value) -> Value {
        match operand {
            Value::Null => Value::Null,
            Value::Boolean(b) => Value::Boolean(!*b),
            Value::Integer(n) => Value::Integer(n.wrapping_neg()),
            Value::Float(f) => Value::Float(-*f),
            _ => Value::Float(f64::NAN),
        }
    }

    /// Unary `~`: bitwise complement. Floats complement the raw IEEE bit
    /// pattern.
    pub fn bitwise_not(operand: &Value) -> Value {
        match operand {
            Value::Null => Value::Null,
            Value::Boolean(b) => Value::Boolean(!*b),
            Value::Integer(n) => Value::Integer(!*n),
            Value::Float(f) => Value::Float(f64::from_bits(!f.to_bits())),
            _ => Value::Float(f64::NAN),
        }
    }

    /// Unary `!`: truthiness complement, always a Boolean.
    pub fn logical_not(operand: &Value) -> Value {
        Value::Boolean(!operand.as_boolean())
    }

    // ------------------------------------------------------------------
    // Binary arithmetic
    // ------------------------------------------------------------------

    /// `+`: numeric addition, or concatenation once either side is a
    /// String.
    pub fn add(a: &Value, b: &Value) -> Value {
        match promote(a, b) {
            Promoted::Null => Value::Null,
            Promoted::Boolean(x, y) => Value::Boolean(x || y),
            Promoted::Integer(x, y) => Value::Integer(x.wrapping_add(y)),
            Promoted::Float(x, y) => Value::Float(x + y),
            Promoted::String(x, y) => Value::string(format!("{}{}", x, y)),
            Promoted::NotNumeric => Value::Float(f64::NAN),
        }
    }

    pub fn subtract(a: &Value, b: &Value) -> Value {
        match promote(a, b) {
            Promoted::Null => Value::Null,
            Promoted::Boolean(x, y) => Value::Boolean(x && !y),
            Promoted::Integer(x, y) => Value::Integer(x.wrapping_sub(y)),
            Promoted::Float(x, y) => Value::Float(x - y),
            _ => Value::Float(f64::NAN),
        }
    }

    pub fn multiply(a: &Value, b: &Value) -> Value {
        match promote(a, b) {
            Promoted::Null => Value::Null,
            Promoted::Boolean(x, y) => Value::Boolean(x && y),
            Promoted::Integer(x, y) => Value::Integer(x.wrapping_mul(y)),
            Promoted::Float(x, y) => Value::Float(x * y),
            _ => Value::Float(f64::NAN),
        }
    }

    /// `/`: integer division by zero yields NaN, not a fault.
    pub fn divide(a: &Value, b: &Value) -> Value {
        match promote(a, b) {
            Promoted::Null => Value::Null,
            Promoted::Integer(x, y) => {
                if y == 0 {
                    Value::Float(f64::NAN)
                } else {
                    Value::Integer(x.wrapping_div(y))
                }
            }
            Promoted::Float(x, y) => Value::Float(x / y),
            _ => Value::Float(f64::NAN),
        }
    }

    /// `%`: integer modulo by zero yields NaN, not a fault.
    pub fn modulo(a: &Value, b: &Value) -> Value {
        match promote(a, b) {
            Promoted::Null => Value::Null,
            Promoted::Integer(x, y) => {
                if y == 0 {
                    Value::Float(f64::NAN)
                } else {
                    Value::Integer(x.wrapping_rem(y))
                }
            }
            Promoted::Float(x, y) => Value::Float(x % y),
            _ => Value::Float(f64::NAN),
        }
    }

    // ------------------------------------------------------------------
    // Binary bitwise
    // ------------------------------------------------------------------

    /// `&`: logical on booleans, two's-complement on integers, raw IEEE
    /// bit pattern on floats.
    pub fn and(a: &Value, b: &Value) -> Value {
        match promote(a, b) {
            Promoted::Null => Value::Null,
            Promoted::Boolean(x, y) => Value::Boolean(x && y),
            Promoted::Integer(x, y) => Value::Integer(x & y),
            Promoted::Float(x, y) => Value::Float(f64::from_bits(x.to_bits() & y.to_bits())),
            _ => Value::Float(f64::NAN),
        }
    }

    pub fn or(a: &Value, b: &Value) -> Value {
        match promote(a, b) {
            Promoted::Null => Value::Null,
            Promoted::Boolean(x, y) => Value::Boolean(x || y),
            Promoted::Integer(x, y) => Value::Integer(x | y),
            Promoted::Float(x, y) => Value::Float(f64::from_bits(x.to_bits() | y.to_bits())),
            _ => Value::Float(f64::NAN),
        }
    }

    pub fn xor(a: &Value, b: &Value) -> Value {
        match promote(a, b) {
            Promoted::Null => Value::Null,
            Promoted::Boolean(x, y) => Value::Boolean(x != y),
            Promoted::Integer(x, y) => Value::Integer(x ^ y),
            Promoted::Float(x, y) => Value::Float(f64::from_bits(x.to_bits() ^ y.to_bits())),
            _ => Value::Float(f64::NAN),
        }
    }

    /// `<<`: shift counts mask to the low six bits, like 64-bit shifts do.
    /// Floats shift their raw bit pattern.
    pub fn left_shift(a: &Value, b: &Value) -> Value {
        match promote(a, b) {
            Promoted::Null => Value::Null,
            Promoted::Boolean(x, y) => Value::Integer((x as i64) << shift_count(y as i64)),
            Promoted::Integer(x, y) => Value::Integer(x << shift_count(y)),
            Promoted::Float(x, y) => {
                Value::Float(f64::from_bits(x.to_bits() << shift_count(y as i64)))
            }
            _ => Value::Float(f64::NAN),
        }
    }

    /// `>>`: sign-extending shift.
    pub fn right_shift(a: &Value, b: &Value) -> Value {
        match promote(a, b) {
            Promoted::Null => Value::Null,
            Promoted::Boolean(x, y) => Value::Integer((x as i64) >> shift_count(y as i64)),
            Promoted::Integer(x, y) => Value::Integer(x >> shift_count(y)),
            Promoted::Float(x, y) => {
                let bits = ((x.to_bits() as i64) >> shift_count(y as i64)) as u64;
                Value::Float(f64::from_bits(bits))
            }
            _ => Value::Float(f64::NAN),
        }
    }

    /// `>>>`: zero-filling shift.
    pub fn right_shift_padded(a: &Value, b: &Value) -> Value {
        match promote(a, b) {
            Promoted::Null => Value::Null,
            Promoted::Boolean(x, y) => {
                Value::Integer(((x as i64 as u64) >> shift_count(y as i64)) as i64)
            }
            Promoted::Integer(x, y) => Value::Integer(((x as u64) >> shift_count(y)) as i64),
            Promoted::Float(x, y) => {
                Value::Float(f64::from_bits(x.to_bits() >> shift_count(y as i64)))
            }
            _ => Value::Float(f64::NAN),
        }
    }

    // ------------------------------------------------------------------
    // Logical (non-short-circuit forms)
    // ------------------------------------------------------------------

    pub fn logical_and(a: &Value, b: &Value) -> Value {
        Value::Boolean(a.as_boolean() && b.as_boolean())
    }

    pub fn logical_or(a: &Value, b: &Value) -> Value {
        Value::Boolean(a.as_boolean() || b.as_boolean())
    }

    // ------------------------------------------------------------------
    // Comparison operators (Value results)
    // ------------------------------------------------------------------

    pub fn less(a: &Value, b: &Value) -> Value {
        Value::Boolean(a.compare(b) == Some(Ordering::Less))
    }

    pub fn less_or_equal(a: &Value, b: &Value) -> Value {
        Value::Boolean(matches!(a.compare(b), Some(Ordering::Less) | Some(Ordering::Equal)))
    }

    pub fn greater(a: &Value, b: &Value) -> Value {
        Value::Boolean(a.compare(b) == Some(Ordering::Greater))
    }

    pub fn greater_or_equal(a: &Value, b: &Value) -> Value {
        Value::Boolean(matches!(a.compare(b), Some(Ordering::Greater) | Some(Ordering::Equal)))
    }

    pub fn equal(a: &Value, b: &Value) -> Value {
        Value::Boolean(a.compare(b) == Some(Ordering::Equal))
    }

    pub fn not_equal(a: &Value, b: &Value) -> Value {
        Value::Boolean(a.compare(b) != Some(Ordering::Equal))
    }

    pub fn strict_equal(a: &Value, b: &Value) -> Value {
        Value::Boolean(a.strict_equals(b))
    }

    pub fn strict_not_equal(a: &Value, b: &Value) -> Value {
        Value::Boolean(!a.strict_equals(b))
    }
}

fn shift_count(count: i64) -> u32 {
    (count & 63) as u32
}

/// Float display: NaN / Infinity spelled out, integral values keep a
/// trailing `.0` so they stay distinguishable from Integers.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() }
    } else if value == value.trunc() && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(v) => write!(f, "{}", format_float(*v)),
            Value::String(s) => write!(f, "{}", s),
            Value::List(l) => {
                let list = l.lock().unwrap();
                write!(f, "[")?;
                for (i, value) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, "]")
            }
            Value::Map(m) => {
                let map = m.lock().unwrap();
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            Value::Error(e) => write!(f, "{}: {}", e.error_type(), e.message()),
            Value::ObjectRef(o) => write!(f, "[{}]", o.type_name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Boolean(b) => write!(f, "Boolean({})", b),
            Value::Integer(n) => write!(f, "Integer({})", n),
            Value::Float(v) => write!(f, "Float({})", format_float(*v)),
            Value::String(s) => write!(f, "String({:?})", s.as_ref()),
            Value::List(l) => write!(f, "List[{}]", l.lock().unwrap().len()),
            Value::Map(m) => write!(f, "Map{{{}}}", m.lock().unwrap().len()),
            Value::Error(e) => write!(f, "Error({}: {})", e.error_type(), e.message()),
            Value::ObjectRef(o) => write!(f, "{:?}", o),
        }
    }
}

// Equality between Values (for command operand comparison and test
// assertions) is strict equality.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.as_boolean());
        assert!(!Value::Boolean(false).as_boolean());
        assert!(!Value::Integer(0).as_boolean());
        assert!(!Value::Float(0.0).as_boolean());
        assert!(!Value::Float(f64::NAN).as_boolean());
        assert!(!Value::string("").as_boolean());
        assert!(!Value::new_list().as_boolean());
        assert!(!Value::new_map().as_boolean());
        assert!(Value::Boolean(true).as_boolean());
        assert!(Value::Integer(-1).as_boolean());
        assert!(Value::Float(f64::INFINITY).as_boolean());
        assert!(Value::string("x").as_boolean());
        assert!(Value::error_parts("IOError", "oops").as_boolean());
    }

    #[test]
    fn test_promotion_ladder() {
        // Bool + Int promotes to Int.
        assert_eq!(Value::add(&Value::Boolean(true), &Value::Integer(2)), Value::Integer(3));
        // Int + Float promotes to Float.
        assert_eq!(Value::add(&Value::Integer(1), &Value::Float(0.5)), Value::Float(1.5));
        // Anything + String concatenates.
        assert_eq!(Value::add(&Value::Integer(1), &Value::string("x")), Value::string("1x"));
        assert_eq!(
            Value::add(&Value::string("a"), &Value::string("b")),
            Value::string("ab")
        );
    }

    #[test]
    fn test_string_arithmetic_is_nan() {
        let result = Value::multiply(&Value::string("a"), &Value::Integer(2));
        assert!(matches!(result, Value::Float(f) if f.is_nan()));
        let result = Value::subtract(&Value::string("a"), &Value::string("b"));
        assert!(matches!(result, Value::Float(f) if f.is_nan()));
    }

    #[test]
    fn test_integer_division_by_zero_is_nan() {
        let result = Value::divide(&Value::Integer(10), &Value::Integer(0));
        assert!(matches!(result, Value::Float(f) if f.is_nan()));
        let result = Value::modulo(&Value::Integer(10), &Value::Integer(0));
        assert!(matches!(result, Value::Float(f) if f.is_nan()));
        // Float division by zero follows IEEE.
        assert_eq!(
            Value::divide(&Value::Float(1.0), &Value::Float(0.0)),
            Value::Float(f64::INFINITY)
        );
    }

    #[test]
    fn test_bitwise_float_uses_raw_bits() {
        let a = 1.5f64;
        let b = -2.25f64;
        let expected = f64::from_bits(a.to_bits() & b.to_bits());
        assert_eq!(
            Value::and(&Value::Float(a), &Value::Float(b)),
            Value::Float(expected)
        );
        let expected = f64::from_bits(!a.to_bits());
        assert_eq!(Value::bitwise_not(&Value::Float(a)), Value::Float(expected));
    }

    #[test]
    fn test_shifts() {
        assert_eq!(
            Value::left_shift(&Value::Integer(1), &Value::Integer(4)),
            Value::Integer(16)
        );
        assert_eq!(
            Value::right_shift(&Value::Integer(-16), &Value::Integer(2)),
            Value::Integer(-4)
        );
        assert_eq!(
            Value::right_shift_padded(&Value::Integer(-1), &Value::Integer(60)),
            Value::Integer(15)
        );
        // Shift counts mask to six bits.
        assert_eq!(
            Value::left_shift(&Value::Integer(1), &Value::Integer(64)),
            Value::Integer(1)
        );
    }

    #[test]
    fn test_nan_loose_vs_strict() {
        let nan = Value::Float(f64::NAN);
        // NaN is loosely unequal to everything, including itself...
        assert_eq!(Value::equal(&nan, &nan), Value::Boolean(false));
        assert_eq!(Value::not_equal(&nan, &nan), Value::Boolean(true));
        assert_eq!(Value::less(&nan, &Value::Integer(1)), Value::Boolean(false));
        assert_eq!(Value::greater(&nan, &Value::Integer(1)), Value::Boolean(false));
        // ...but strictly equal to itself (same kind, same bits).
        assert_eq!(Value::strict_equal(&nan, &nan), Value::Boolean(true));
    }

    #[test]
    fn test_null_ordering() {
        assert_eq!(Value::Null.compare(&Value::Null), Some(Ordering::Equal));
        assert_eq!(Value::Null.compare(&Value::Integer(-100)), Some(Ordering::Less));
        assert_eq!(Value::Integer(-100).compare(&Value::Null), Some(Ordering::Greater));
        assert_eq!(Value::Null.compare(&Value::Boolean(false)), Some(Ordering::Less));
    }

    #[test]
    fn test_reference_comparison() {
        let a = Value::new_list();
        let b = a.clone();
        let c = Value::new_list();
        assert_eq!(a.compare(&b), Some(Ordering::Equal));
        assert_eq!(a.compare(&c), Some(Ordering::Less));
        assert_eq!(c.compare(&a), Some(Ordering::Less));
        assert!(a.strict_equals(&b));
        assert!(!a.strict_equals(&c));
    }

    #[test]
    fn test_cross_kind_numeric_compare() {
        assert_eq!(Value::Integer(1).compare(&Value::Float(1.0)), Some(Ordering::Equal));
        assert_eq!(Value::Boolean(true).compare(&Value::Integer(1)), Some(Ordering::Equal));
        assert_eq!(Value::Integer(2).compare(&Value::Float(1.5)), Some(Ordering::Greater));
        // Strict equality requires matching kinds.
        assert!(!Value::Integer(1).strict_equals(&Value::Float(1.0)));
    }

    #[test]
    fn test_string_comparison_is_lexicographic() {
        assert_eq!(Value::string("abc").compare(&Value::string("abd")), Some(Ordering::Less));
        // Numbers against strings compare as strings.
        assert_eq!(Value::Integer(10).compare(&Value::string("10")), Some(Ordering::Equal));
    }

    #[test]
    fn test_copy_is_deep_for_containers() {
        let list = Value::list_of(vec![Value::Integer(1), Value::list_of(vec![Value::Integer(2)])]);
        let copy = list.copy();
        assert!(!list.strict_equals(&copy));
        if let (Value::List(a), Value::List(b)) = (&list, &copy) {
            a.lock().unwrap().set(0, Value::Integer(99));
            assert_eq!(b.lock().unwrap().get(0).unwrap().as_long(), 1);
        } else {
            panic!("expected lists");
        }
    }

    #[test]
    fn test_conversions() {
        assert_eq!(Value::Null.convert_to(Kind::Integer), Value::Integer(0));
        assert_eq!(Value::Null.convert_to(Kind::String), Value::string("null"));
        assert_eq!(Value::Boolean(true).convert_to(Kind::Integer), Value::Integer(1));
        assert_eq!(Value::Float(3.7).convert_to(Kind::Integer), Value::Integer(3));
        assert_eq!(Value::Float(f64::NAN).convert_to(Kind::Integer), Value::Integer(0));
        assert_eq!(Value::string("42").convert_to(Kind::Integer), Value::Integer(42));
        assert_eq!(Value::string("1.5").convert_to(Kind::Float), Value::Float(1.5));
        let nan = Value::string("nope").convert_to(Kind::Float);
        assert!(matches!(nan, Value::Float(f) if f.is_nan()));
        assert_eq!(Value::Integer(9).convert_to(Kind::Boolean), Value::Boolean(true));
    }

    #[test]
    fn test_float_display() {
        assert_eq!(Value::Float(1.0).as_string(), "1.0");
        assert_eq!(Value::Float(1.5).as_string(), "1.5");
        assert_eq!(Value::Float(f64::NAN).as_string(), "NaN");
        assert_eq!(Value::Float(f64::INFINITY).as_string(), "Infinity");
        assert_eq!(Value::Float(f64::NEG_INFINITY).as_string(), "-Infinity");
        assert_eq!(Value::Integer(1).as_string(), "1");
    }

    #[test]
    fn test_list_display() {
        let list = Value::list_of(vec![Value::Integer(1), Value::string("a"), Value::Null]);
        assert_eq!(list.as_string(), "[1, a, null]");
    }

    #[test]
    fn test_length() {
        assert_eq!(Value::string("héllo").length(), 5);
        assert_eq!(Value::list_of(vec![Value::Null, Value::Null]).length(), 2);
        assert_eq!(Value::Integer(12345).length(), 1);
        assert_eq!(Value::Null.length(), 1);
    }

    #[test]
    fn test_sort_total_order_places_nan_last() {
        let mut list = crate::containers::ScriptList::from_values(vec![
            Value::Float(f64::NAN),
            Value::Integer(3),
            Value::Null,
            Value::Integer(1),
        ]);
        list.sort();
        let rendered: Vec<String> = list.iter().map(|v| v.as_string()).collect();
        assert_eq!(rendered, vec!["null", "1", "3", "NaN"]);
    }

    #[test]
    fn test_object_ref_identity() {
        struct Token;
        impl ScriptObject for Token {
            fn type_name(&self) -> &str {
                "token"
            }
            fn as_any(&self) -> &dyn Any {
                self
            }
        }
        let a = Value::object(Token);
        let b = a.clone();
        let c = Value::object(Token);
        assert!(a.strict_equals(&b));
        assert!(!a.strict_equals(&c));
        assert!(a.as_boolean());
        assert_eq!(a.compare(&c), Some(Ordering::Less));
    }
}
