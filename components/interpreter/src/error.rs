//! Error plumbing
//!
//! Inside the engine every fallible operation returns [`JsResult`]. The
//! error side is an [`Exception`]: either a value thrown by user code or an
//! engine fault that has not been turned into an Error object yet. Faults
//! are materialized lazily, the first time user code can observe them.
//!
//! At the embedder boundary failures surface as [`EngineError`].

use bytecode_system::VerifyError;
use core_types::{ErrorKind, JsError, Value};
use thiserror::Error;

/// A thrown completion travelling through the unwinder
#[derive(Debug, Clone)]
pub enum Exception {
    /// Any value thrown by user code (or an already materialized fault)
    Value(Value),
    /// An engine fault not yet materialized as an Error object
    Error(JsError),
}

impl Exception {
    /// Engine fault of the given kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Exception::Error(JsError::new(kind, message))
    }

    /// TypeError fault
    pub fn type_error(message: impl Into<String>) -> Self {
        Exception::Error(JsError::type_error(message))
    }

    /// ReferenceError fault
    pub fn reference_error(message: impl Into<String>) -> Self {
        Exception::Error(JsError::reference_error(message))
    }

    /// RangeError fault
    pub fn range_error(message: impl Into<String>) -> Self {
        Exception::Error(JsError::range_error(message))
    }

    /// InternalError fault (broken engine invariant)
    pub fn internal(message: impl Into<String>) -> Self {
        Exception::Error(JsError::internal(message))
    }

    /// The fault, if this exception is one
    pub fn as_error(&self) -> Option<&JsError> {
        match self {
            Exception::Error(error) => Some(error),
            Exception::Value(_) => None,
        }
    }
}

impl From<JsError> for Exception {
    fn from(error: JsError) -> Self {
        Exception::Error(error)
    }
}

/// Result of an operation that may throw
pub type JsResult<T> = Result<T, Exception>;

/// Failure reported to the embedder
#[derive(Debug, Error)]
pub enum EngineError {
    /// An exception escaped the outermost frame of an execution unit
    #[error("Uncaught {description}")]
    Uncaught {
        /// Rendering of the thrown value (`name: message` for errors)
        description: String,
        /// The thrown value itself
        value: Value,
    },
    /// The chunk failed verification
    #[error("invalid bytecode: {0}")]
    InvalidBytecode(#[from] VerifyError),
}

impl EngineError {
    /// The thrown value of an uncaught exception
    pub fn thrown_value(&self) -> Option<&Value> {
        match self {
            EngineError::Uncaught { value, .. } => Some(value),
            EngineError::InvalidBytecode(_) => None,
        }
    }
}
