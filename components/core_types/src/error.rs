//! Error taxonomy and engine faults.
//!
//! Engine-raised faults carry an [`ErrorKind`] so they can be turned into
//! the matching Error object once script code observes them.

use std::fmt;

use thiserror::Error;

use crate::{SourcePosition, StackFrame};

/// The kind of error, named after the constructor that creates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Plain `Error`
    Error,
    /// Syntax error reported by an external compiler
    SyntaxError,
    /// Invalid operand or operation (e.g., calling a non-function)
    TypeError,
    /// Unresolvable or uninitialised binding, double `super()`
    ReferenceError,
    /// Numeric or stack bound violation
    RangeError,
    /// Several errors at once (`Promise.any`)
    AggregateError,
    /// Internal engine error
    InternalError,
}

impl ErrorKind {
    /// Returns the constructor name.
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::AggregateError => "AggregateError",
            ErrorKind::InternalError => "InternalError",
        }
    }

    /// All kinds that have a constructor on the global object.
    pub const CONSTRUCTIBLE: [ErrorKind; 6] = [
        ErrorKind::Error,
        ErrorKind::SyntaxError,
        ErrorKind::TypeError,
        ErrorKind::ReferenceError,
        ErrorKind::RangeError,
        ErrorKind::AggregateError,
    ];
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An engine fault with message and stack trace.
///
/// # Examples
///
/// ```
/// use core_types::{JsError, ErrorKind};
///
/// let error = JsError::type_error("x is not a function");
/// assert_eq!(error.kind, ErrorKind::TypeError);
/// assert_eq!(error.message, "x is not a function");
/// ```
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct JsError {
    /// The type of error
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
    /// Call stack at the time of the error, innermost first
    pub stack: Vec<StackFrame>,
    /// Source position where the error occurred
    pub source_position: Option<SourcePosition>,
}

impl JsError {
    /// Creates an error without stack information.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        JsError {
            kind,
            message: message.into(),
            stack: Vec::new(),
            source_position: None,
        }
    }

    /// Shorthand for a TypeError.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, message)
    }

    /// Shorthand for a ReferenceError.
    pub fn reference_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ReferenceError, message)
    }

    /// Shorthand for a RangeError.
    pub fn range_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RangeError, message)
    }

    /// Shorthand for an InternalError.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, message)
    }

    /// Attaches a captured stack; the first frame also provides the position.
    pub fn with_stack(mut self, stack: Vec<StackFrame>) -> Self {
        if self.source_position.is_none() {
            self.source_position = stack.first().map(|frame| SourcePosition {
                line: frame.line,
                column: frame.column,
                offset: 0,
            });
        }
        self.stack = stack;
        self
    }

    /// Renders the `stack` string: the header line followed by one
    /// `    at` line per frame.
    pub fn stack_trace(&self) -> String {
        let mut out = self.to_string();
        for frame in &self.stack {
            out.push_str("\n    at ");
            out.push_str(&frame.to_string());
        }
        out
    }
}
