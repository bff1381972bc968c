//! Core value types, number conversions and the error taxonomy.
//!
//! This crate provides the foundational types shared by every engine crate.
//!
//! # Overview
//!
//! - [`Value`] - Tagged representation of script values
//! - [`ObjectId`] - Stable arena index of a heap object
//! - [`PropertyKey`] - String or symbol property key
//! - [`JsError`] - Engine fault with kind, message and stack trace
//! - [`ErrorKind`] - Error constructor taxonomy
//! - [`SourcePosition`] - Source code location
//! - [`StackFrame`] - Call stack frame information
//! - [`number`] - ToInt32/ToUint32, Number-to-String and String-to-Number
//!
//! # Examples
//!
//! ```
//! use core_types::{ErrorKind, JsError, Value};
//!
//! let num = Value::Number(42.0);
//! assert!(num.is_truthy());
//! assert_eq!(num.type_of(), "number");
//!
//! let error = JsError::new(ErrorKind::TypeError, "undefined is not a function");
//! assert_eq!(error.to_string(), "TypeError: undefined is not a function");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
pub mod number;
mod source;
mod value;

pub use error::{ErrorKind, JsError};
pub use source::{SourcePosition, StackFrame};
pub use value::{ObjectId, PropertyKey, SymbolId, Value};
