//! Bytecode chunk - compiled function container
//!
//! Contains instructions, constants, nested functions and the metadata the
//! engine needs to build a call frame for the function.

use std::rc::Rc;

use core_types::SourcePosition;

use crate::constant::Constant;
use crate::instruction::Instruction;
use crate::opcode::{Opcode, UpvalueDescriptor};

/// What kind of function a chunk implements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionKind {
    /// Top-level script body
    Script,
    /// Ordinary `function` (callable and constructible)
    Normal,
    /// Arrow function (lexical `this`)
    Arrow,
    /// Object or class method (not constructible)
    Method,
    /// `function*`
    Generator,
    /// `async function` or async method
    Async,
    /// `async () => ...`
    AsyncArrow,
    /// Constructor of a class without `extends`
    ClassConstructor,
    /// Constructor of a class with `extends`
    DerivedConstructor,
}

impl FunctionKind {
    /// Generators suspend at `yield`
    pub fn is_generator(self) -> bool {
        matches!(self, FunctionKind::Generator)
    }

    /// Async functions suspend at `await`
    pub fn is_async(self) -> bool {
        matches!(self, FunctionKind::Async | FunctionKind::AsyncArrow)
    }

    /// Arrow functions inherit `this`, `new.target` and the home object
    pub fn is_arrow(self) -> bool {
        matches!(self, FunctionKind::Arrow | FunctionKind::AsyncArrow)
    }

    /// Functions that have a `[[Construct]]` behaviour
    pub fn is_constructor(self) -> bool {
        matches!(
            self,
            FunctionKind::Normal | FunctionKind::ClassConstructor | FunctionKind::DerivedConstructor
        )
    }

    /// Class constructors throw when called without `new`
    pub fn is_class_constructor(self) -> bool {
        matches!(
            self,
            FunctionKind::ClassConstructor | FunctionKind::DerivedConstructor
        )
    }
}

/// Function metadata consumed when a frame is created
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionInfo {
    /// Function name (empty for anonymous functions)
    pub name: Rc<str>,
    /// Function kind
    pub kind: FunctionKind,
    /// Number of formal parameters; they occupy registers `0..param_count`
    pub param_count: u32,
    /// Whether the last formal is a rest parameter, collected into
    /// register `param_count`
    pub has_rest: bool,
    /// Strict mode code
    pub strict: bool,
    /// Variables captured from enclosing functions, in upvalue index order
    pub upvalues: Vec<UpvalueDescriptor>,
}

impl FunctionInfo {
    /// Create metadata for a function with no parameters
    pub fn new(name: impl Into<Rc<str>>, kind: FunctionKind) -> Self {
        Self {
            name: name.into(),
            kind,
            param_count: 0,
            has_rest: false,
            strict: true,
            upvalues: Vec::new(),
        }
    }
}

/// A compiled bytecode chunk containing instructions and constants
#[derive(Debug, Clone, PartialEq)]
pub struct BytecodeChunk {
    /// Function metadata
    pub info: FunctionInfo,
    /// Sequence of bytecode instructions
    pub instructions: Vec<Instruction>,
    /// Constant pool for literal values and names
    pub constants: Vec<Constant>,
    /// Number of registers needed for execution
    pub register_count: u32,
    /// Number of inline cache slots referenced by property opcodes
    pub cache_slots: u32,
    /// Nested function chunks (for closures)
    pub functions: Vec<Rc<BytecodeChunk>>,
}

impl BytecodeChunk {
    /// Create a new empty script chunk
    pub fn new() -> Self {
        Self::with_info(FunctionInfo::new("main", FunctionKind::Script))
    }

    /// Create an empty chunk with the given metadata
    pub fn with_info(info: FunctionInfo) -> Self {
        let register_count = info.param_count + u32::from(info.has_rest);
        Self {
            info,
            instructions: Vec::new(),
            constants: Vec::new(),
            register_count,
            cache_slots: 0,
            functions: Vec::new(),
        }
    }

    /// Add a nested function and return its index
    pub fn add_nested_function(&mut self, chunk: BytecodeChunk) -> u32 {
        let idx = self.functions.len() as u32;
        self.functions.push(Rc::new(chunk));
        idx
    }

    /// Emit an instruction without source position, returning its offset
    pub fn emit(&mut self, opcode: Opcode) -> u32 {
        self.instructions.push(Instruction::new(opcode));
        self.instructions.len() as u32 - 1
    }

    /// Emit an instruction with source position, returning its offset
    pub fn emit_with_position(&mut self, opcode: Opcode, position: SourcePosition) -> u32 {
        self.instructions
            .push(Instruction::with_position(opcode, position));
        self.instructions.len() as u32 - 1
    }

    /// Add a constant to the constant pool and return its index
    pub fn add_constant(&mut self, value: Constant) -> u32 {
        let idx = self.constants.len() as u32;
        self.constants.push(value);
        idx
    }

    /// Get instruction count
    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    /// Returns the string constant at `index`
    pub fn string_constant(&self, index: u32) -> Option<&Rc<str>> {
        self.constants.get(index as usize).and_then(Constant::as_str)
    }

    /// Source position of the instruction at `offset`, falling back to the
    /// closest preceding instruction that has one
    pub fn position_at(&self, offset: usize) -> Option<SourcePosition> {
        self.instructions
            .get(..=offset.min(self.instructions.len().saturating_sub(1)))?
            .iter()
            .rev()
            .find_map(|instruction| instruction.source_position)
    }
}

impl Default for BytecodeChunk {
    fn default() -> Self {
        Self::new()
    }
}
