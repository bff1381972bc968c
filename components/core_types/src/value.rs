//! Script value representation.
//!
//! This module provides the closed [`Value`] union together with the handle
//! types it refers to. Heap objects live in an arena owned by the engine
//! context and are referenced here only by their [`ObjectId`].

use std::fmt;
use std::rc::Rc;

use crate::number::number_to_string;

/// Stable index of an object in the engine's object arena.
///
/// Ids stay valid for as long as the object is reachable; the collector
/// only recycles ids of unreachable objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

impl ObjectId {
    /// Returns the arena slot index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identity of a symbol value. Descriptions live in the engine's symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

/// Represents any script value.
///
/// Primitives are stored inline; objects and functions are arena handles.
/// Functions carry their own tag so `typeof` and callability checks never
/// need to consult the heap.
///
/// # Examples
///
/// ```
/// use core_types::Value;
///
/// let undefined = Value::Undefined;
/// let number = Value::Number(42.0);
/// let text = Value::string("hi");
///
/// assert!(!undefined.is_truthy());
/// assert!(number.is_truthy());
/// assert_eq!(text.type_of(), "string");
/// ```
#[derive(Clone)]
pub enum Value {
    /// The undefined value
    Undefined,
    /// The null value
    Null,
    /// A boolean
    Boolean(bool),
    /// IEEE 754 double-precision number
    Number(f64),
    /// Immutable shared string
    String(Rc<str>),
    /// Symbol value
    Symbol(SymbolId),
    /// Non-callable heap object
    Object(ObjectId),
    /// Callable heap object (closure, native, bound function or callable proxy)
    Function(ObjectId),
    /// Engine-internal marker for uninitialised bindings and array holes.
    /// Never observable by script code.
    Hole,
}

impl Value {
    /// Creates a string value.
    pub fn string(s: impl Into<Rc<str>>) -> Self {
        Value::String(s.into())
    }

    /// Returns true if the value is truthy under ToBoolean.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null | Value::Hole => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Symbol(_) | Value::Object(_) | Value::Function(_) => true,
        }
    }

    /// Returns the `typeof` result for this value.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined | Value::Hole => "undefined",
            Value::Null => "object",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    /// Returns true for undefined and null.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Returns true for undefined.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Returns true for objects and functions.
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Function(_))
    }

    /// Returns true if the value carries the callable tag.
    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    /// Returns the arena handle of an object or function.
    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Value::Object(id) | Value::Function(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns the number payload, if any.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// SameValue comparison (distinguishes +0/-0, NaN equals NaN).
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => {
                if a.is_nan() && b.is_nan() {
                    return true;
                }
                a == b && a.is_sign_negative() == b.is_sign_negative()
            }
            _ => self == other,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "Undefined"),
            Value::Null => write!(f, "Null"),
            Value::Boolean(b) => write!(f, "Boolean({})", b),
            Value::Number(n) => write!(f, "Number({})", n),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Symbol(id) => write!(f, "Symbol({})", id.0),
            Value::Object(id) => write!(f, "Object({})", id.0),
            Value::Function(id) => write!(f, "Function({})", id.0),
            Value::Hole => write!(f, "Hole"),
        }
    }
}

/// Strict equality (`===`), except that `Hole` equals itself.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Hole, Value::Hole) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined | Value::Hole => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", number_to_string(*n)),
            Value::String(s) => write!(f, "{}", s),
            Value::Symbol(_) => write!(f, "Symbol()"),
            Value::Object(_) => write!(f, "[object Object]"),
            Value::Function(_) => write!(f, "function () {{ [native code] }}"),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

/// Key of an own property: a string or a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    /// String-keyed property (array indices use their canonical decimal form)
    String(Rc<str>),
    /// Symbol-keyed property
    Symbol(SymbolId),
}

impl PropertyKey {
    /// Returns the array index this key denotes, if it is a canonical
    /// decimal integer below 2^32 - 1.
    pub fn as_array_index(&self) -> Option<u32> {
        match self {
            PropertyKey::String(s) => parse_array_index(s),
            PropertyKey::Symbol(_) => None,
        }
    }

    /// Creates the key for an array index.
    pub fn index(i: u32) -> Self {
        PropertyKey::String(Rc::from(i.to_string()))
    }

    /// Converts the key back into a value (string or symbol).
    pub fn to_value(&self) -> Value {
        match self {
            PropertyKey::String(s) => Value::String(s.clone()),
            PropertyKey::Symbol(id) => Value::Symbol(*id),
        }
    }

    /// Returns true for symbol keys.
    pub fn is_symbol(&self) -> bool {
        matches!(self, PropertyKey::Symbol(_))
    }
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        PropertyKey::String(Rc::from(s))
    }
}

impl From<Rc<str>> for PropertyKey {
    fn from(s: Rc<str>) -> Self {
        PropertyKey::String(s)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::String(s) => write!(f, "{}", s),
            PropertyKey::Symbol(id) => write!(f, "Symbol({})", id.0),
        }
    }
}

fn parse_array_index(s: &str) -> Option<u32> {
    if s.is_empty() || s.len() > 10 {
        return None;
    }
    if s.len() > 1 && s.starts_with('0') {
        return None;
    }
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n: u64 = s.parse().ok()?;
    if n < u32::MAX as u64 {
        Some(n as u32)
    } else {
        None
    }
}
