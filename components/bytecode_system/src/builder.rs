//! Chunk assembly with forward labels
//!
//! [`ChunkBuilder`] hands out registers, interns string constants, numbers
//! inline-cache slots and lets jumps refer to labels that are bound later.
//! While building, every jump target field holds a label id; [`finish`]
//! rewrites them into instruction offsets.
//!
//! [`finish`]: ChunkBuilder::finish
//!
//! # Example
//!
//! ```
//! use bytecode_system::{ChunkBuilder, Opcode};
//!
//! let mut b = ChunkBuilder::script();
//! let r = b.register();
//! let done = b.label();
//! b.emit(Opcode::LoadBool { dst: r, value: true });
//! b.emit(Opcode::JumpIfTrue { cond: r, target: done.target() });
//! b.emit(Opcode::LoadInt { dst: r, value: 1 });
//! b.bind(done);
//! b.emit(Opcode::Return { value: r });
//! let chunk = b.finish().unwrap();
//! assert_eq!(chunk.instructions[1].opcode, Opcode::JumpIfTrue { cond: r, target: 3 });
//! ```

use std::collections::HashMap;
use std::rc::Rc;

use core_types::SourcePosition;
use thiserror::Error;

use crate::chunk::{BytecodeChunk, FunctionInfo, FunctionKind};
use crate::constant::Constant;
use crate::opcode::{Opcode, RegisterId, UpvalueDescriptor};

/// A jump destination that may be bound after it is referenced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(u32);

impl Label {
    /// The value to place in an opcode's target field
    pub fn target(self) -> u32 {
        self.0
    }
}

/// Errors detected while finishing a chunk
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// A jump refers to a label that was never bound
    #[error("label {0} is referenced but never bound")]
    UnboundLabel(u32),
    /// A label was bound at two offsets
    #[error("label {0} is bound more than once")]
    LabelBoundTwice(u32),
}

/// Incremental builder for one function's chunk
#[derive(Debug)]
pub struct ChunkBuilder {
    chunk: BytecodeChunk,
    labels: Vec<Option<u32>>,
    strings: HashMap<Rc<str>, u32>,
    position: Option<SourcePosition>,
    rebound: Option<u32>,
}

impl ChunkBuilder {
    /// Start a function chunk
    pub fn new(name: &str, kind: FunctionKind) -> Self {
        Self {
            chunk: BytecodeChunk::with_info(FunctionInfo::new(name, kind)),
            labels: Vec::new(),
            strings: HashMap::new(),
            position: None,
            rebound: None,
        }
    }

    /// Start a top-level script chunk
    pub fn script() -> Self {
        Self::new("main", FunctionKind::Script)
    }

    /// Declare `count` formal parameters (registers `0..count`).
    /// Call before allocating other registers.
    pub fn with_params(mut self, count: u32) -> Self {
        self.chunk.info.param_count = count;
        self.reserve_parameters();
        self
    }

    /// Declare a trailing rest parameter
    pub fn with_rest(mut self) -> Self {
        self.chunk.info.has_rest = true;
        self.reserve_parameters();
        self
    }

    /// Mark the function as sloppy-mode code
    pub fn sloppy(mut self) -> Self {
        self.chunk.info.strict = false;
        self
    }

    fn reserve_parameters(&mut self) {
        let needed = self.chunk.info.param_count + u32::from(self.chunk.info.has_rest);
        self.chunk.register_count = self.chunk.register_count.max(needed);
    }

    /// Register holding formal parameter `index`
    pub fn param(&self, index: u32) -> RegisterId {
        RegisterId(index)
    }

    /// Register holding the rest parameter array
    pub fn rest(&self) -> RegisterId {
        RegisterId(self.chunk.info.param_count)
    }

    /// Add an upvalue descriptor, returning its upvalue index
    pub fn capture(&mut self, descriptor: UpvalueDescriptor) -> u32 {
        self.chunk.info.upvalues.push(descriptor);
        self.chunk.info.upvalues.len() as u32 - 1
    }

    /// Allocate one register
    pub fn register(&mut self) -> RegisterId {
        self.registers(1)
    }

    /// Allocate `count` contiguous registers, returning the first
    pub fn registers(&mut self, count: u32) -> RegisterId {
        let first = RegisterId(self.chunk.register_count);
        self.chunk.register_count += count;
        first
    }

    /// Intern a string constant
    pub fn string(&mut self, s: &str) -> u32 {
        if let Some(&index) = self.strings.get(s) {
            return index;
        }
        let text: Rc<str> = Rc::from(s);
        let index = self.chunk.add_constant(Constant::String(text.clone()));
        self.strings.insert(text, index);
        index
    }

    /// Add a number constant
    pub fn number(&mut self, n: f64) -> u32 {
        self.chunk.add_constant(Constant::Number(n))
    }

    /// Allocate an inline cache slot
    pub fn cache_slot(&mut self) -> u32 {
        self.chunk.cache_slots += 1;
        self.chunk.cache_slots - 1
    }

    /// Add a nested function, returning its index for `CreateClosure`
    pub fn function(&mut self, chunk: BytecodeChunk) -> u32 {
        self.chunk.add_nested_function(chunk)
    }

    /// Create an unbound label
    pub fn label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() as u32 - 1)
    }

    /// Bind `label` to the next instruction
    pub fn bind(&mut self, label: Label) {
        let offset = self.chunk.instructions.len() as u32;
        match self.labels.get_mut(label.0 as usize) {
            Some(slot @ None) => *slot = Some(offset),
            Some(Some(_)) => self.rebound = Some(label.0),
            None => self.rebound = Some(label.0),
        }
    }

    /// Attach a source position to every following instruction
    pub fn at(&mut self, line: u32, column: u32) {
        self.position = Some(SourcePosition::new(line, column));
    }

    /// Emit an instruction, returning its offset
    pub fn emit(&mut self, opcode: Opcode) -> u32 {
        match self.position {
            Some(position) => self.chunk.emit_with_position(opcode, position),
            None => self.chunk.emit(opcode),
        }
    }

    /// Load a number, inline when it is a small integer
    pub fn load_number(&mut self, dst: RegisterId, n: f64) -> u32 {
        if n.fract() == 0.0 && n.abs() <= i32::MAX as f64 && !(n == 0.0 && n.is_sign_negative()) {
            self.emit(Opcode::LoadInt {
                dst,
                value: n as i32,
            })
        } else {
            let index = self.number(n);
            self.emit(Opcode::LoadConst { dst, index })
        }
    }

    /// Load a string constant
    pub fn load_string(&mut self, dst: RegisterId, s: &str) -> u32 {
        let index = self.string(s);
        self.emit(Opcode::LoadConst { dst, index })
    }

    /// `dst = obj.name` with a fresh cache slot
    pub fn get_named(&mut self, dst: RegisterId, obj: RegisterId, name: &str) -> u32 {
        let name = self.string(name);
        let cache = self.cache_slot();
        self.emit(Opcode::GetNamed {
            dst,
            obj,
            name,
            cache,
        })
    }

    /// `obj.name = value` with a fresh cache slot
    pub fn set_named(&mut self, obj: RegisterId, name: &str, value: RegisterId) -> u32 {
        let name = self.string(name);
        let cache = self.cache_slot();
        self.emit(Opcode::SetNamed {
            obj,
            name,
            value,
            cache,
        })
    }

    /// `dst = globalThis[name]`
    pub fn get_global(&mut self, dst: RegisterId, name: &str) -> u32 {
        let name = self.string(name);
        self.emit(Opcode::GetGlobal { dst, name })
    }

    /// Create or overwrite global `name`
    pub fn define_global(&mut self, name: &str, src: RegisterId) -> u32 {
        let name = self.string(name);
        self.emit(Opcode::DefineGlobal { name, src })
    }

    /// Resolve labels and return the finished chunk
    pub fn finish(mut self) -> Result<BytecodeChunk, BuildError> {
        if let Some(label) = self.rebound {
            return Err(BuildError::LabelBoundTwice(label));
        }
        for instruction in &mut self.chunk.instructions {
            for target in instruction.opcode.jump_targets_mut() {
                match self.labels.get(*target as usize).copied().flatten() {
                    Some(offset) => *target = offset,
                    None => return Err(BuildError::UnboundLabel(*target)),
                }
            }
        }
        Ok(self.chunk)
    }
}
