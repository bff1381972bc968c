//! Bytecode system
//!
//! This crate provides the register-based instruction set consumed by the
//! interpreter, the chunk container for compiled functions, a builder for
//! assembling chunks by hand, and the structural verifier.
//!
//! # Features
//!
//! - Register-based bytecode architecture
//! - Per-site inline cache slots on named property access
//! - Upvalue descriptors for closure capture
//! - Label-based chunk assembly
//! - Structural verification before execution
//!
//! # Example
//!
//! ```
//! use bytecode_system::{BinaryOp, ChunkBuilder, Opcode, Verifier};
//!
//! let mut b = ChunkBuilder::script();
//! let lhs = b.register();
//! let rhs = b.register();
//! b.load_number(lhs, 40.0);
//! b.load_number(rhs, 2.0);
//! b.emit(Opcode::Binary { op: BinaryOp::Add, dst: lhs, lhs, rhs });
//! b.emit(Opcode::Return { value: lhs });
//!
//! let chunk = b.finish().unwrap();
//! assert!(Verifier::new().verify(&chunk).is_ok());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod chunk;
pub mod constant;
pub mod instruction;
pub mod opcode;
pub mod verifier;

// Re-export main types at crate root
pub use builder::{BuildError, ChunkBuilder, Label};
pub use chunk::{BytecodeChunk, FunctionInfo, FunctionKind};
pub use constant::Constant;
pub use instruction::Instruction;
pub use opcode::{BinaryOp, MethodKind, Opcode, RegisterId, UnaryOp, UpvalueDescriptor};
pub use verifier::{Verifier, VerifyError};
