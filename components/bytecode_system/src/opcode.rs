//! Bytecode opcodes
//!
//! Defines the register-based instruction set. Every operand names a
//! register of the current frame, an index into the chunk's constant pool,
//! a nested function, an upvalue, an inline-cache slot, or a jump target
//! (an instruction offset within the same chunk).

use core_types::ErrorKind;

/// Register identifier for local variable slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegisterId(pub u32);

impl RegisterId {
    /// Index into the frame's register window
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// The register `n` slots after this one
    pub fn offset(self, n: u32) -> RegisterId {
        RegisterId(self.0 + n)
    }
}

/// Descriptor for a captured variable (upvalue)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UpvalueDescriptor {
    /// true if the variable is a register of the directly enclosing function,
    /// false if it is one of the enclosing function's own upvalues
    pub is_local: bool,
    /// Register index (if local) or upvalue index (if not)
    pub index: u32,
}

impl UpvalueDescriptor {
    /// Create a new upvalue descriptor
    pub fn new(is_local: bool, index: u32) -> Self {
        Self { is_local, index }
    }

    /// Capture a register of the enclosing function
    pub fn local(register: RegisterId) -> Self {
        Self::new(true, register.0)
    }

    /// Capture an upvalue of the enclosing function
    pub fn upvalue(index: u32) -> Self {
        Self::new(false, index)
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `+` (numeric addition or string concatenation)
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `**`
    Exp,
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// `>>>`
    UShr,
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `===`
    StrictEq,
    /// `!==`
    StrictNotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `in`
    In,
    /// `instanceof`
    InstanceOf,
}

impl BinaryOp {
    /// Returns true for the operators that always produce a boolean
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::StrictEq
                | BinaryOp::StrictNotEq
                | BinaryOp::Lt
                | BinaryOp::LtEq
                | BinaryOp::Gt
                | BinaryOp::GtEq
                | BinaryOp::In
                | BinaryOp::InstanceOf
        )
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `+x`
    Plus,
    /// `!x`
    Not,
    /// `~x`
    BitNot,
    /// `typeof x`
    TypeOf,
    /// `void x`
    Void,
}

/// Kind of class element installed by [`Opcode::DefineMethod`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    /// Plain method (non-enumerable data property)
    Method,
    /// `get` accessor
    Getter,
    /// `set` accessor
    Setter,
}

/// Bytecode opcodes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Opcode {
    // Literals and moves
    /// Load constant pool entry `index`
    LoadConst { dst: RegisterId, index: u32 },
    /// Load a small integer
    LoadInt { dst: RegisterId, value: i32 },
    /// Load undefined
    LoadUndefined { dst: RegisterId },
    /// Load null
    LoadNull { dst: RegisterId },
    /// Load a boolean
    LoadBool { dst: RegisterId, value: bool },
    /// Mark a binding as uninitialised (temporal dead zone)
    LoadHole { dst: RegisterId },
    /// Copy a register
    Move { dst: RegisterId, src: RegisterId },

    // Operators
    /// `dst = lhs op rhs`
    Binary {
        op: BinaryOp,
        dst: RegisterId,
        lhs: RegisterId,
        rhs: RegisterId,
    },
    /// `dst = op src`
    Unary {
        op: UnaryOp,
        dst: RegisterId,
        src: RegisterId,
    },

    // Control flow
    /// Unconditional jump
    Jump { target: u32 },
    /// Jump if truthy
    JumpIfTrue { cond: RegisterId, target: u32 },
    /// Jump if falsy
    JumpIfFalse { cond: RegisterId, target: u32 },
    /// Jump if undefined or null
    JumpIfNullish { cond: RegisterId, target: u32 },
    /// Jump if undefined
    JumpIfUndefined { cond: RegisterId, target: u32 },
    /// Jump unless undefined (parameter defaults)
    JumpIfNotUndefined { cond: RegisterId, target: u32 },

    // Bindings
    /// Read a global; ReferenceError if it does not exist
    GetGlobal { dst: RegisterId, name: u32 },
    /// Read a global; undefined if it does not exist (`typeof x`)
    GetGlobalOrUndefined { dst: RegisterId, name: u32 },
    /// Assign an existing global (strict code throws if it does not exist)
    SetGlobal { name: u32, src: RegisterId },
    /// Create or overwrite a global binding
    DefineGlobal { name: u32, src: RegisterId },
    /// Read a captured variable
    GetUpvalue { dst: RegisterId, index: u32 },
    /// Write a captured variable
    SetUpvalue { index: u32, src: RegisterId },
    /// Close open upvalues for registers at or above `from`
    CloseUpvalues { from: RegisterId },
    /// ReferenceError if `src` is still in its temporal dead zone
    CheckHole { src: RegisterId, name: u32 },
    /// Raise an engine error with a constant message
    ThrowError { kind: ErrorKind, message: u32 },

    // Objects and arrays
    /// `dst = {}`
    CreateObject { dst: RegisterId },
    /// `dst = [start, start+1, ..., start+count-1]`
    CreateArray {
        dst: RegisterId,
        start: RegisterId,
        count: u32,
    },
    /// Append one element
    ArrayPush { array: RegisterId, value: RegisterId },
    /// Append every element produced by iterating `iterable`
    SpreadIntoArray {
        array: RegisterId,
        iterable: RegisterId,
    },
    /// `dst = obj.name` through inline cache slot `cache`
    GetNamed {
        dst: RegisterId,
        obj: RegisterId,
        name: u32,
        cache: u32,
    },
    /// `obj.name = value` through inline cache slot `cache`
    SetNamed {
        obj: RegisterId,
        name: u32,
        value: RegisterId,
        cache: u32,
    },
    /// `dst = obj[key]`
    GetIndexed {
        dst: RegisterId,
        obj: RegisterId,
        key: RegisterId,
    },
    /// `obj[key] = value`
    SetIndexed {
        obj: RegisterId,
        key: RegisterId,
        value: RegisterId,
    },
    /// `dst = delete obj.name`
    DeleteNamed {
        dst: RegisterId,
        obj: RegisterId,
        name: u32,
    },
    /// `dst = delete obj[key]`
    DeleteIndexed {
        dst: RegisterId,
        obj: RegisterId,
        key: RegisterId,
    },
    /// Define an own enumerable data property (object literals)
    DefineField {
        obj: RegisterId,
        key: RegisterId,
        value: RegisterId,
    },
    /// Define an own enumerable accessor; undefined halves are left unset
    DefineAccessor {
        obj: RegisterId,
        key: RegisterId,
        getter: RegisterId,
        setter: RegisterId,
    },
    /// Copy own enumerable properties of `src` into `dst` (object spread)
    CopyDataProperties { dst: RegisterId, src: RegisterId },
    /// `dst` = array of enumerable string keys along the chain (for-in)
    EnumerateKeys { dst: RegisterId, obj: RegisterId },

    // Functions
    /// Instantiate nested function `function` capturing its upvalues
    CreateClosure { dst: RegisterId, function: u32 },
    /// `dst = callee.call(this, args[0..argc])`
    Call {
        dst: RegisterId,
        callee: RegisterId,
        this: RegisterId,
        args: RegisterId,
        argc: u32,
    },
    /// Call with the arguments taken from the array in `args`
    CallSpread {
        dst: RegisterId,
        callee: RegisterId,
        this: RegisterId,
        args: RegisterId,
    },
    /// `return callee.call(this, ...)` reusing the current frame slot
    TailCall {
        callee: RegisterId,
        this: RegisterId,
        args: RegisterId,
        argc: u32,
    },
    /// `dst = new callee(args[0..argc])`
    Construct {
        dst: RegisterId,
        callee: RegisterId,
        args: RegisterId,
        argc: u32,
    },
    /// `new` with the arguments taken from the array in `args`
    ConstructSpread {
        dst: RegisterId,
        callee: RegisterId,
        args: RegisterId,
    },
    /// Return from the current function
    Return { value: RegisterId },
    /// Load `this` (ReferenceError before `super()` in derived constructors)
    LoadThis { dst: RegisterId },
    /// Load the lazily created `arguments` object
    LoadArguments { dst: RegisterId },
    /// Load `new.target`
    LoadNewTarget { dst: RegisterId },
    /// Load the running function object (named function expressions)
    LoadCallee { dst: RegisterId },

    // Classes
    /// Turn the constructor closure in `class` into a class: allocate its
    /// prototype object, link it to `heritage` when present
    CreateClass {
        class: RegisterId,
        heritage: Option<RegisterId>,
    },
    /// Install a method or accessor on `target` and set its home object
    DefineMethod {
        target: RegisterId,
        key: RegisterId,
        method: RegisterId,
        kind: MethodKind,
    },
    /// Register the instance field initializer of `class`
    SetFieldInitializer {
        class: RegisterId,
        initializer: RegisterId,
    },
    /// `dst = super(args[0..argc])`
    SuperCall {
        dst: RegisterId,
        args: RegisterId,
        argc: u32,
    },
    /// `dst = super[key]` with `this` as receiver
    SuperGet { dst: RegisterId, key: RegisterId },

    // Exceptions
    /// Throw the value in `value`
    Throw { value: RegisterId },
    /// Push a try region
    EnterTry {
        catch_target: Option<u32>,
        finally_target: Option<u32>,
    },
    /// Pop the innermost try region (normal exit of a try or catch body)
    ExitTry,
    /// Load the exception that entered the current catch body
    GetException { dst: RegisterId },
    /// Enter a finally body with a normal completion
    GotoFinally { target: u32 },
    /// Resume the completion that entered the finally body
    EndFinally,
    /// `break`/`continue` leaving `depth` try regions, running their
    /// finally bodies on the way out. A finally body being executed counts
    /// as one region.
    Leave { target: u32, depth: u32 },

    // Coroutines
    /// End of a generator's parameter prologue; parks the fresh generator
    InitialYield,
    /// `dst = yield value`
    Yield { dst: RegisterId, value: RegisterId },
    /// `dst = yield* iterator` where `iterator` came from GetIterator
    YieldStar {
        dst: RegisterId,
        iterator: RegisterId,
    },
    /// `dst = await value`
    Await { dst: RegisterId, value: RegisterId },

    // Iteration
    /// `dst = iterable[Symbol.iterator]()`, TypeError if not an object
    GetIterator {
        dst: RegisterId,
        iterable: RegisterId,
    },
    /// `dst = iterator.next()`, TypeError if the result is not an object
    IteratorNext {
        dst: RegisterId,
        iterator: RegisterId,
    },
    /// Jump if `result.done` is truthy
    JumpIfDone { result: RegisterId, target: u32 },
    /// `dst = result.value`
    IteratorValue { dst: RegisterId, result: RegisterId },
    /// Call `iterator.return()` if present (early loop exit)
    IteratorClose { iterator: RegisterId },

    /// Do nothing
    Nop,
}

impl Opcode {
    /// Check if this opcode never falls through to the next instruction
    pub fn is_unconditional_terminator(&self) -> bool {
        matches!(
            self,
            Opcode::Jump { .. }
                | Opcode::Return { .. }
                | Opcode::TailCall { .. }
                | Opcode::Throw { .. }
                | Opcode::ThrowError { .. }
                | Opcode::GotoFinally { .. }
                | Opcode::EndFinally
                | Opcode::Leave { .. }
        )
    }

    /// Check if this opcode suspends a coroutine
    pub fn is_suspension(&self) -> bool {
        matches!(
            self,
            Opcode::InitialYield
                | Opcode::Yield { .. }
                | Opcode::YieldStar { .. }
                | Opcode::Await { .. }
        )
    }

    /// Jump targets referenced by this instruction
    pub fn jump_targets(&self) -> Vec<u32> {
        let mut copy = *self;
        let targets = copy.jump_targets_mut().into_iter().map(|t| *t).collect();
        targets
    }

    /// Mutable access to every jump target, used to resolve labels
    pub fn jump_targets_mut(&mut self) -> Vec<&mut u32> {
        match self {
            Opcode::Jump { target }
            | Opcode::JumpIfTrue { target, .. }
            | Opcode::JumpIfFalse { target, .. }
            | Opcode::JumpIfNullish { target, .. }
            | Opcode::JumpIfUndefined { target, .. }
            | Opcode::JumpIfNotUndefined { target, .. }
            | Opcode::JumpIfDone { target, .. }
            | Opcode::GotoFinally { target }
            | Opcode::Leave { target, .. } => vec![target],
            Opcode::EnterTry {
                catch_target,
                finally_target,
            } => catch_target
                .iter_mut()
                .chain(finally_target.iter_mut())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Visit every register operand as `(first, count)`; ranges such as
    /// call arguments are reported once with their length.
    pub fn visit_registers(&self, visit: &mut dyn FnMut(RegisterId, u32)) {
        use Opcode::*;
        match *self {
            LoadConst { dst, .. }
            | LoadInt { dst, .. }
            | LoadUndefined { dst }
            | LoadNull { dst }
            | LoadBool { dst, .. }
            | LoadHole { dst }
            | GetGlobal { dst, .. }
            | GetGlobalOrUndefined { dst, .. }
            | GetUpvalue { dst, .. }
            | CreateObject { dst }
            | CreateClosure { dst, .. }
            | LoadThis { dst }
            | LoadArguments { dst }
            | LoadNewTarget { dst }
            | LoadCallee { dst }
            | GetException { dst } => visit(dst, 1),
            Move { dst, src } | Unary { dst, src, .. } => {
                visit(dst, 1);
                visit(src, 1);
            }
            Binary { dst, lhs, rhs, .. } => {
                visit(dst, 1);
                visit(lhs, 1);
                visit(rhs, 1);
            }
            JumpIfTrue { cond, .. }
            | JumpIfFalse { cond, .. }
            | JumpIfNullish { cond, .. }
            | JumpIfUndefined { cond, .. }
            | JumpIfNotUndefined { cond, .. } => visit(cond, 1),
            SetGlobal { src, .. }
            | DefineGlobal { src, .. }
            | SetUpvalue { src, .. }
            | CheckHole { src, .. } => visit(src, 1),
            CloseUpvalues { from } => visit(from, 1),
            CreateArray { dst, start, count } => {
                visit(dst, 1);
                if count > 0 {
                    visit(start, count);
                }
            }
            ArrayPush { array, value } => {
                visit(array, 1);
                visit(value, 1);
            }
            SpreadIntoArray { array, iterable } => {
                visit(array, 1);
                visit(iterable, 1);
            }
            GetNamed { dst, obj, .. } | DeleteNamed { dst, obj, .. } => {
                visit(dst, 1);
                visit(obj, 1);
            }
            SetNamed { obj, value, .. } => {
                visit(obj, 1);
                visit(value, 1);
            }
            GetIndexed { dst, obj, key } | DeleteIndexed { dst, obj, key } => {
                visit(dst, 1);
                visit(obj, 1);
                visit(key, 1);
            }
            SetIndexed { obj, key, value } | DefineField { obj, key, value } => {
                visit(obj, 1);
                visit(key, 1);
                visit(value, 1);
            }
            DefineAccessor {
                obj,
                key,
                getter,
                setter,
            } => {
                visit(obj, 1);
                visit(key, 1);
                visit(getter, 1);
                visit(setter, 1);
            }
            CopyDataProperties { dst, src } | EnumerateKeys { dst, obj: src } => {
                visit(dst, 1);
                visit(src, 1);
            }
            Call {
                dst,
                callee,
                this,
                args,
                argc,
            } => {
                visit(dst, 1);
                visit(callee, 1);
                visit(this, 1);
                if argc > 0 {
                    visit(args, argc);
                }
            }
            CallSpread {
                dst,
                callee,
                this,
                args,
            } => {
                visit(dst, 1);
                visit(callee, 1);
                visit(this, 1);
                visit(args, 1);
            }
            TailCall {
                callee,
                this,
                args,
                argc,
            } => {
                visit(callee, 1);
                visit(this, 1);
                if argc > 0 {
                    visit(args, argc);
                }
            }
            Construct {
                dst,
                callee,
                args,
                argc,
            } => {
                visit(dst, 1);
                visit(callee, 1);
                if argc > 0 {
                    visit(args, argc);
                }
            }
            ConstructSpread { dst, callee, args } => {
                visit(dst, 1);
                visit(callee, 1);
                visit(args, 1);
            }
            Return { value } | Throw { value } => visit(value, 1),
            CreateClass { class, heritage } => {
                visit(class, 1);
                if let Some(heritage) = heritage {
                    visit(heritage, 1);
                }
            }
            DefineMethod {
                target,
                key,
                method,
                ..
            } => {
                visit(target, 1);
                visit(key, 1);
                visit(method, 1);
            }
            SetFieldInitializer { class, initializer } => {
                visit(class, 1);
                visit(initializer, 1);
            }
            SuperCall { dst, args, argc } => {
                visit(dst, 1);
                if argc > 0 {
                    visit(args, argc);
                }
            }
            SuperGet { dst, key } => {
                visit(dst, 1);
                visit(key, 1);
            }
            Yield { dst, value } | Await { dst, value } => {
                visit(dst, 1);
                visit(value, 1);
            }
            YieldStar { dst, iterator } | IteratorNext { dst, iterator } => {
                visit(dst, 1);
                visit(iterator, 1);
            }
            GetIterator { dst, iterable } => {
                visit(dst, 1);
                visit(iterable, 1);
            }
            JumpIfDone { result, .. } => visit(result, 1),
            IteratorValue { dst, result } => {
                visit(dst, 1);
                visit(result, 1);
            }
            IteratorClose { iterator } => visit(iterator, 1),
            Jump { .. }
            | ThrowError { .. }
            | EnterTry { .. }
            | ExitTry
            | GotoFinally { .. }
            | EndFinally
            | Leave { .. }
            | InitialYield
            | Nop => {}
        }
    }

    /// Short mnemonic for diagnostics
    pub fn name(&self) -> &'static str {
        use Opcode::*;
        match self {
            LoadConst { .. } => "LoadConst",
            LoadInt { .. } => "LoadInt",
            LoadUndefined { .. } => "LoadUndefined",
            LoadNull { .. } => "LoadNull",
            LoadBool { .. } => "LoadBool",
            LoadHole { .. } => "LoadHole",
            Move { .. } => "Move",
            Binary { .. } => "Binary",
            Unary { .. } => "Unary",
            Jump { .. } => "Jump",
            JumpIfTrue { .. } => "JumpIfTrue",
            JumpIfFalse { .. } => "JumpIfFalse",
            JumpIfNullish { .. } => "JumpIfNullish",
            JumpIfUndefined { .. } => "JumpIfUndefined",
            JumpIfNotUndefined { .. } => "JumpIfNotUndefined",
            GetGlobal { .. } => "GetGlobal",
            GetGlobalOrUndefined { .. } => "GetGlobalOrUndefined",
            SetGlobal { .. } => "SetGlobal",
            DefineGlobal { .. } => "DefineGlobal",
            GetUpvalue { .. } => "GetUpvalue",
            SetUpvalue { .. } => "SetUpvalue",
            CloseUpvalues { .. } => "CloseUpvalues",
            CheckHole { .. } => "CheckHole",
            ThrowError { .. } => "ThrowError",
            CreateObject { .. } => "CreateObject",
            CreateArray { .. } => "CreateArray",
            ArrayPush { .. } => "ArrayPush",
            SpreadIntoArray { .. } => "SpreadIntoArray",
            GetNamed { .. } => "GetNamed",
            SetNamed { .. } => "SetNamed",
            GetIndexed { .. } => "GetIndexed",
            SetIndexed { .. } => "SetIndexed",
            DeleteNamed { .. } => "DeleteNamed",
            DeleteIndexed { .. } => "DeleteIndexed",
            DefineField { .. } => "DefineField",
            DefineAccessor { .. } => "DefineAccessor",
            CopyDataProperties { .. } => "CopyDataProperties",
            EnumerateKeys { .. } => "EnumerateKeys",
            CreateClosure { .. } => "CreateClosure",
            Call { .. } => "Call",
            CallSpread { .. } => "CallSpread",
            TailCall { .. } => "TailCall",
            Construct { .. } => "Construct",
            ConstructSpread { .. } => "ConstructSpread",
            Return { .. } => "Return",
            LoadThis { .. } => "LoadThis",
            LoadArguments { .. } => "LoadArguments",
            LoadNewTarget { .. } => "LoadNewTarget",
            LoadCallee { .. } => "LoadCallee",
            CreateClass { .. } => "CreateClass",
            DefineMethod { .. } => "DefineMethod",
            SetFieldInitializer { .. } => "SetFieldInitializer",
            SuperCall { .. } => "SuperCall",
            SuperGet { .. } => "SuperGet",
            Throw { .. } => "Throw",
            EnterTry { .. } => "EnterTry",
            ExitTry => "ExitTry",
            GetException { .. } => "GetException",
            GotoFinally { .. } => "GotoFinally",
            EndFinally => "EndFinally",
            Leave { .. } => "Leave",
            InitialYield => "InitialYield",
            Yield { .. } => "Yield",
            YieldStar { .. } => "YieldStar",
            Await { .. } => "Await",
            GetIterator { .. } => "GetIterator",
            IteratorNext { .. } => "IteratorNext",
            JumpIfDone { .. } => "JumpIfDone",
            IteratorValue { .. } => "IteratorValue",
            IteratorClose { .. } => "IteratorClose",
            Nop => "Nop",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jump_targets_cover_try_regions() {
        let op = Opcode::EnterTry {
            catch_target: Some(4),
            finally_target: Some(9),
        };
        assert_eq!(op.jump_targets(), vec![4, 9]);
        assert!(Opcode::Nop.jump_targets().is_empty());
    }

    #[test]
    fn test_visit_registers_reports_argument_ranges() {
        let op = Opcode::Call {
            dst: RegisterId(0),
            callee: RegisterId(1),
            this: RegisterId(2),
            args: RegisterId(3),
            argc: 4,
        };
        let mut seen = Vec::new();
        op.visit_registers(&mut |reg, count| seen.push((reg.0, count)));
        assert_eq!(seen, vec![(0, 1), (1, 1), (2, 1), (3, 4)]);
    }

    #[test]
    fn test_terminators() {
        assert!(Opcode::EndFinally.is_unconditional_terminator());
        assert!(!Opcode::JumpIfTrue {
            cond: RegisterId(0),
            target: 0
        }
        .is_unconditional_terminator());
        assert!(Opcode::Await {
            dst: RegisterId(0),
            value: RegisterId(0)
        }
        .is_suspension());
    }
}
