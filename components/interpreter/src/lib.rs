//! Bytecode interpreter for the execution engine
//!
//! This crate provides the register virtual machine with:
//! - Closures over shared, heap-promoted registers (upvalues)
//! - Inline caching for named property access
//! - Exception unwinding with `finally` override semantics
//! - Generators as suspendable frames
//! - Promises, async functions and the microtask queue
//!
//! # Example
//!
//! ```
//! use core_types::Value;
//! use interpreter::VM;
//!
//! let mut vm = VM::new();
//! let double = vm.register_host_function("double", 1, |vm, _this, args| {
//!     let n = vm.to_number(args.first().unwrap_or(&Value::Undefined))?;
//!     Ok(Value::Number(n * 2.0))
//! });
//! let result = vm.call_function(&double, &Value::Undefined, &[Value::from(21)]).unwrap();
//! assert_eq!(result, Value::from(42));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod call_frame;
pub mod config;
pub mod error;
pub mod inline_cache;
pub mod object;
pub mod upvalue;
pub mod vm;

mod call;
mod dispatch;
mod display;
mod generator;
mod intrinsics;
mod iterator;
mod operations;
mod promise;
mod property;
mod proxy;
mod unwind;

// Re-export main types at crate root
pub use call_frame::{Frame, FunctionTemplate};
pub use config::EngineConfig;
pub use error::{EngineError, Exception, JsResult};
pub use inline_cache::{CacheHit, InlineCache};
pub use intrinsics::Intrinsics;
pub use object::{CoroutineState, NativeFn, ObjectKind, ResumeMode};
pub use operations::PreferredType;
pub use promise::Job;
pub use property::{PropertyDescriptor, MAX_ARRAY_LENGTH};
pub use upvalue::{Closure, Upvalue, UpvalueHandle};
pub use vm::{Task, VM};
