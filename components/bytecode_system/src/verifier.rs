//! Structural bytecode verification
//!
//! The engine trusts its input only after this pass: every operand must be
//! in range for the chunk that contains it, so the dispatch loop can index
//! registers, constants and caches without re-checking.

use thiserror::Error;

use crate::chunk::{BytecodeChunk, FunctionKind};
use crate::opcode::Opcode;

/// A structural defect in a chunk
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// Register operand beyond the chunk's register window
    #[error("{function}@{offset}: register r{register} out of range ({count} registers)")]
    RegisterOutOfRange {
        /// Function name
        function: String,
        /// Instruction offset
        offset: usize,
        /// Highest register touched
        register: u32,
        /// Declared register count
        count: u32,
    },
    /// Constant index out of range or of the wrong type
    #[error("{function}@{offset}: invalid constant {index}")]
    BadConstant {
        /// Function name
        function: String,
        /// Instruction offset
        offset: usize,
        /// Constant index
        index: u32,
    },
    /// Jump target past the end of the chunk
    #[error("{function}@{offset}: jump target {target} out of range")]
    JumpOutOfRange {
        /// Function name
        function: String,
        /// Instruction offset
        offset: usize,
        /// Target offset
        target: u32,
    },
    /// Nested function index out of range
    #[error("{function}@{offset}: nested function {index} does not exist")]
    BadFunction {
        /// Function name
        function: String,
        /// Instruction offset
        offset: usize,
        /// Function index
        index: u32,
    },
    /// Upvalue index out of range
    #[error("{function}@{offset}: upvalue {index} does not exist")]
    BadUpvalue {
        /// Function name
        function: String,
        /// Instruction offset
        offset: usize,
        /// Upvalue index
        index: u32,
    },
    /// Inline cache slot out of range
    #[error("{function}@{offset}: cache slot {slot} out of range")]
    BadCacheSlot {
        /// Function name
        function: String,
        /// Instruction offset
        offset: usize,
        /// Slot index
        slot: u32,
    },
    /// Upvalue descriptor that the enclosing function cannot satisfy
    #[error("{function}: capture {index} refers to a missing {what}")]
    BadCapture {
        /// Function name
        function: String,
        /// Descriptor index
        index: usize,
        /// "register" or "upvalue"
        what: &'static str,
    },
    /// Suspension opcode in a function kind that cannot suspend there
    #[error("{function}@{offset}: {opcode} is not allowed in this function")]
    MisplacedSuspension {
        /// Function name
        function: String,
        /// Instruction offset
        offset: usize,
        /// Opcode mnemonic
        opcode: &'static str,
    },
    /// Generator without the end-of-prologue marker
    #[error("{function}: generator has no InitialYield")]
    MissingInitialYield {
        /// Function name
        function: String,
    },
    /// Register window larger than the configured maximum
    #[error("{function}: {count} registers exceeds the limit of {limit}")]
    TooManyRegisters {
        /// Function name
        function: String,
        /// Declared register count
        count: u32,
        /// Configured limit
        limit: u32,
    },
}

/// Bytecode verifier
pub struct Verifier {
    /// Largest register window accepted for a single function
    max_registers: u32,
}

impl Verifier {
    /// Create a verifier with the default register limit
    pub fn new() -> Self {
        Self {
            max_registers: 65_536,
        }
    }

    /// Set the largest register window accepted for a single function
    pub fn with_max_registers(mut self, max: u32) -> Self {
        self.max_registers = max;
        self
    }

    /// Verify `chunk` and, recursively, its nested functions
    pub fn verify(&self, chunk: &BytecodeChunk) -> Result<(), VerifyError> {
        self.verify_function(chunk)?;
        for nested in &chunk.functions {
            self.verify_captures(chunk, nested)?;
            self.verify(nested)?;
        }
        Ok(())
    }

    fn verify_captures(
        &self,
        parent: &BytecodeChunk,
        child: &BytecodeChunk,
    ) -> Result<(), VerifyError> {
        for (index, capture) in child.info.upvalues.iter().enumerate() {
            let ok = if capture.is_local {
                capture.index < parent.register_count
            } else {
                (capture.index as usize) < parent.info.upvalues.len()
            };
            if !ok {
                return Err(VerifyError::BadCapture {
                    function: child.info.name.to_string(),
                    index,
                    what: if capture.is_local {
                        "register"
                    } else {
                        "upvalue"
                    },
                });
            }
        }
        Ok(())
    }

    fn verify_function(&self, chunk: &BytecodeChunk) -> Result<(), VerifyError> {
        let function = || chunk.info.name.to_string();
        if chunk.register_count > self.max_registers {
            return Err(VerifyError::TooManyRegisters {
                function: function(),
                count: chunk.register_count,
                limit: self.max_registers,
            });
        }

        let kind = chunk.info.kind;
        let len = chunk.instructions.len() as u32;
        let mut saw_initial_yield = false;

        for (offset, instruction) in chunk.instructions.iter().enumerate() {
            let op = &instruction.opcode;

            let mut highest: Option<u32> = None;
            op.visit_registers(&mut |reg, count| {
                let last = reg.0.saturating_add(count.saturating_sub(1));
                highest = Some(highest.map_or(last, |h| h.max(last)));
            });
            if let Some(register) = highest {
                if register >= chunk.register_count {
                    return Err(VerifyError::RegisterOutOfRange {
                        function: function(),
                        offset,
                        register,
                        count: chunk.register_count,
                    });
                }
            }

            for target in op.jump_targets() {
                if target > len {
                    return Err(VerifyError::JumpOutOfRange {
                        function: function(),
                        offset,
                        target,
                    });
                }
            }

            let bad_constant = |index: u32, must_be_string: bool| {
                let entry = chunk.constants.get(index as usize);
                let ok = match entry {
                    Some(constant) => !must_be_string || constant.as_str().is_some(),
                    None => false,
                };
                if ok {
                    Ok(())
                } else {
                    Err(VerifyError::BadConstant {
                        function: function(),
                        offset,
                        index,
                    })
                }
            };

            match *op {
                Opcode::LoadConst { index, .. } => bad_constant(index, false)?,
                Opcode::GetGlobal { name, .. }
                | Opcode::GetGlobalOrUndefined { name, .. }
                | Opcode::SetGlobal { name, .. }
                | Opcode::DefineGlobal { name, .. }
                | Opcode::CheckHole { name, .. }
                | Opcode::DeleteNamed { name, .. } => bad_constant(name, true)?,
                Opcode::ThrowError { message, .. } => bad_constant(message, true)?,
                Opcode::GetNamed { name, cache, .. } | Opcode::SetNamed { name, cache, .. } => {
                    bad_constant(name, true)?;
                    if cache >= chunk.cache_slots {
                        return Err(VerifyError::BadCacheSlot {
                            function: function(),
                            offset,
                            slot: cache,
                        });
                    }
                }
                Opcode::CreateClosure { function: index, .. } => {
                    if index as usize >= chunk.functions.len() {
                        return Err(VerifyError::BadFunction {
                            function: function(),
                            offset,
                            index,
                        });
                    }
                }
                Opcode::GetUpvalue { index, .. } | Opcode::SetUpvalue { index, .. } => {
                    if index as usize >= chunk.info.upvalues.len() {
                        return Err(VerifyError::BadUpvalue {
                            function: function(),
                            offset,
                            index,
                        });
                    }
                }
                Opcode::InitialYield => {
                    if kind != FunctionKind::Generator || saw_initial_yield {
                        return Err(misplaced(chunk, offset, op));
                    }
                    saw_initial_yield = true;
                }
                Opcode::Yield { .. } | Opcode::YieldStar { .. } => {
                    if !kind.is_generator() {
                        return Err(misplaced(chunk, offset, op));
                    }
                }
                Opcode::Await { .. } => {
                    if !kind.is_async() {
                        return Err(misplaced(chunk, offset, op));
                    }
                }
                Opcode::SuperCall { .. } => {
                    if !(kind == FunctionKind::DerivedConstructor || kind.is_arrow()) {
                        return Err(misplaced(chunk, offset, op));
                    }
                }
                _ => {}
            }
        }

        if kind.is_generator() && !saw_initial_yield {
            return Err(VerifyError::MissingInitialYield {
                function: function(),
            });
        }
        Ok(())
    }
}

fn misplaced(chunk: &BytecodeChunk, offset: usize, op: &Opcode) -> VerifyError {
    VerifyError::MisplacedSuspension {
        function: chunk.info.name.to_string(),
        offset,
        opcode: op.name(),
    }
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new()
    }
}
