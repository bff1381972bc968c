//! Constant pool entries

use std::fmt;
use std::rc::Rc;

/// A literal stored in a chunk's constant pool.
///
/// Names used by property and global opcodes are string constants too.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Number literal
    Number(f64),
    /// String literal or identifier name
    String(Rc<str>),
}

impl Constant {
    /// Returns the string payload, if any
    pub fn as_str(&self) -> Option<&Rc<str>> {
        match self {
            Constant::String(s) => Some(s),
            Constant::Number(_) => None,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Number(n) => write!(f, "{}", core_types::number::number_to_string(*n)),
            Constant::String(s) => write!(f, "{:?}", s),
        }
    }
}
