//! Call frames and the per-function data they run against
//!
//! A [`Frame`] is the activation record of one bytecode function: its
//! program counter, register window, captured upvalues, the `this` scope,
//! and the try-region and pending-completion stacks the unwinder works on.
//! Frames of suspended coroutines are parked whole inside the coroutine
//! object and pushed back on the VM's frame stack when resumed.

use std::cell::RefCell;
use std::rc::Rc;

use bytecode_system::{BytecodeChunk, FunctionKind, Opcode, RegisterId};
use core_types::{ObjectId, Value};
use memory_manager::Tracer;

use crate::error::Exception;
use crate::inline_cache::InlineCache;
use crate::object::ResumeMode;
use crate::upvalue::{new_upvalue_handle, trace_upvalue, Registers, Upvalue, UpvalueHandle};

/// Compiled function shared by every closure instantiated from it
///
/// The inline caches live here, so all closures created from the same
/// function literal warm the same caches.
#[derive(Debug)]
pub struct FunctionTemplate {
    /// The compiled code
    pub chunk: Rc<BytecodeChunk>,
    /// One cache per `GetNamed`/`SetNamed` site
    pub caches: RefCell<Vec<InlineCache>>,
    /// Templates of the nested function literals, by `CreateClosure` index
    pub nested: Vec<Rc<FunctionTemplate>>,
}

impl FunctionTemplate {
    /// Build the template tree for `chunk` and its nested functions
    pub fn new(chunk: Rc<BytecodeChunk>) -> Rc<Self> {
        let nested = chunk
            .functions
            .iter()
            .map(|function| FunctionTemplate::new(function.clone()))
            .collect();
        let caches = RefCell::new(vec![InlineCache::new(); chunk.cache_slots as usize]);
        Rc::new(Self {
            chunk,
            caches,
            nested,
        })
    }

    /// Function name from the chunk metadata
    pub fn name(&self) -> &str {
        &self.chunk.info.name
    }

    /// Function kind from the chunk metadata
    pub fn kind(&self) -> FunctionKind {
        self.chunk.info.kind
    }

    /// Whether the function body is strict code
    pub fn is_strict(&self) -> bool {
        self.chunk.info.strict
    }

    /// Instruction at `ip`
    pub fn opcode(&self, ip: usize) -> Option<Opcode> {
        self.chunk.instructions.get(ip).map(|instruction| instruction.opcode)
    }
}

/// `this`, `new.target` and the function a frame runs for
///
/// Arrow functions share the scope of the frame that created them, so a
/// `super()` inside an arrow binds `this` for the enclosing constructor.
#[derive(Debug)]
pub struct ThisScope {
    /// `None` until `super()` returns in a derived constructor
    pub this: RefCell<Option<Value>>,
    /// `new.target` (undefined for plain calls)
    pub new_target: Value,
    /// The active function object
    pub function: Option<ObjectId>,
    /// Object whose prototype `super` lookups start from
    pub home_object: Option<ObjectId>,
}

impl ThisScope {
    /// Scope with `this` already bound
    pub fn new(this: Value, new_target: Value, function: Option<ObjectId>) -> Self {
        Self {
            this: RefCell::new(Some(this)),
            new_target,
            function,
            home_object: None,
        }
    }

    /// Scope of a derived constructor, `this` still unbound
    pub fn uninitialized(new_target: Value, function: Option<ObjectId>) -> Self {
        Self {
            this: RefCell::new(None),
            new_target,
            function,
            home_object: None,
        }
    }

    /// Set the home object
    pub fn with_home_object(mut self, home_object: Option<ObjectId>) -> Self {
        self.home_object = home_object;
        self
    }

    /// The bound `this`, if any
    pub fn this_value(&self) -> Option<Value> {
        self.this.borrow().clone()
    }

    /// Bind `this`. Returns false if it was bound already.
    pub fn bind_this(&self, value: Value) -> bool {
        let mut this = self.this.borrow_mut();
        if this.is_some() {
            return false;
        }
        *this = Some(value);
        true
    }

    /// Report the objects the scope refers to
    pub fn trace(&self, tracer: &mut Tracer) {
        if let Some(this) = &*self.this.borrow() {
            tracer.mark_value(this);
        }
        tracer.mark_value(&self.new_target);
        if let Some(function) = self.function {
            tracer.mark(function);
        }
        if let Some(home) = self.home_object {
            tracer.mark(home);
        }
    }
}

/// Entry of a frame's try-region stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryRegion {
    /// Active `try` (or `catch` body guarded by a `finally`)
    Handler {
        /// Start of the catch body
        catch: Option<usize>,
        /// Start of the finally body
        finally: Option<usize>,
    },
    /// A finally body being executed; its pending completion sits at
    /// `completion_depth` on the completion stack
    FinallyBody {
        /// Completion stack height before the completion was pushed
        completion_depth: usize,
    },
}

/// Outcome a finally body resumes when it completes normally
#[derive(Debug, Clone)]
pub enum PendingCompletion {
    /// Fall through after the finally body
    Normal,
    /// Continue returning this value
    Return(Value),
    /// Rethrow
    Throw(Exception),
    /// Continue a `Leave` with the regions still to exit
    Jump {
        /// Final jump target
        target: usize,
        /// Regions still to exit
        depth: u32,
    },
}

/// Where a frame's return value goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnTo {
    /// The frame was pushed by a native caller; the dispatch run ends
    Boundary,
    /// Store into a register of the calling frame
    Caller {
        /// Destination register
        dst: RegisterId,
    },
    /// The call was in tail position of a frame that could not be
    /// replaced; the caller returns the value in turn
    TailReturn,
}

/// How `[[Construct]]` post-processes the return value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructKind {
    /// Plain call
    None,
    /// Base constructor: non-object return values yield `this`
    Base,
    /// Derived constructor: `this` comes from `super()`
    Derived,
}

/// Activation record of a bytecode function
#[derive(Debug)]
pub struct Frame {
    /// Code being executed
    pub template: Rc<FunctionTemplate>,
    /// The function object (None for scripts)
    pub function: Option<ObjectId>,
    /// Next instruction
    pub ip: usize,
    /// Register window, shared with open upvalues
    pub registers: Registers,
    /// Upvalues of the running closure
    pub upvalues: Vec<UpvalueHandle>,
    /// Upvalues aliasing this frame's registers, by register index
    pub open_upvalues: Vec<(usize, UpvalueHandle)>,
    /// `this`, `new.target`, active function and home object
    pub scope: Rc<ThisScope>,
    /// Arguments as passed
    pub arguments: Vec<Value>,
    /// Materialized `arguments` object
    pub arguments_object: Option<ObjectId>,
    /// Active try regions, innermost last
    pub try_regions: Vec<TryRegion>,
    /// Completions pending on finally bodies
    pub completions: Vec<PendingCompletion>,
    /// Exception that entered the current catch body
    pub exception: Option<Value>,
    /// Return destination
    pub return_to: ReturnTo,
    /// Constructor post-processing
    pub construct: ConstructKind,
    /// Generator or async activation this frame belongs to
    pub coroutine: Option<ObjectId>,
    /// Register receiving the value sent into a suspended coroutine
    pub resume_dst: Option<RegisterId>,
    /// Suspended inside `yield*`
    pub delegating: bool,
    /// Resumption waiting to be forwarded to the `yield*` inner iterator
    pub delegation: Option<(ResumeMode, Value)>,
}

impl Frame {
    /// Frame with a fresh register window for `template`
    pub fn new(template: Rc<FunctionTemplate>, scope: Rc<ThisScope>, return_to: ReturnTo) -> Self {
        let registers = vec![Value::Undefined; template.chunk.register_count as usize];
        Self {
            template,
            function: None,
            ip: 0,
            registers: Rc::new(RefCell::new(registers)),
            upvalues: Vec::new(),
            open_upvalues: Vec::new(),
            scope,
            arguments: Vec::new(),
            arguments_object: None,
            try_regions: Vec::new(),
            completions: Vec::new(),
            exception: None,
            return_to,
            construct: ConstructKind::None,
            coroutine: None,
            resume_dst: None,
            delegating: false,
            delegation: None,
        }
    }

    /// Read a register
    pub fn register(&self, register: RegisterId) -> Value {
        self.registers
            .borrow()
            .get(register.index())
            .cloned()
            .unwrap_or(Value::Undefined)
    }

    /// Write a register
    pub fn set_register(&self, register: RegisterId, value: Value) {
        if let Some(slot) = self.registers.borrow_mut().get_mut(register.index()) {
            *slot = value;
        }
    }

    /// `count` registers starting at `first`
    pub fn register_range(&self, first: RegisterId, count: u32) -> Vec<Value> {
        let registers = self.registers.borrow();
        (0..count as usize)
            .map(|i| {
                registers
                    .get(first.index() + i)
                    .cloned()
                    .unwrap_or(Value::Undefined)
            })
            .collect()
    }

    /// Open upvalue for a register, reusing the existing one if the
    /// register was captured before
    pub fn capture_register(&mut self, index: usize) -> UpvalueHandle {
        if let Some((_, handle)) = self.open_upvalues.iter().find(|(i, _)| *i == index) {
            return handle.clone();
        }
        let handle = new_upvalue_handle(Upvalue::new_open(self.registers.clone(), index));
        self.open_upvalues.push((index, handle.clone()));
        handle
    }

    /// Close open upvalues for registers at or above `from`
    pub fn close_upvalues_from(&mut self, from: usize) {
        self.open_upvalues.retain(|(index, handle)| {
            if *index >= from {
                handle.borrow_mut().close();
                false
            } else {
                true
            }
        });
    }

    /// Close every open upvalue; called before the frame is dropped
    pub fn close_all_upvalues(&mut self) {
        self.close_upvalues_from(0);
    }

    /// Whether a tail call may replace this frame
    pub fn can_replace(&self) -> bool {
        self.try_regions.is_empty()
            && self.completions.is_empty()
            && self.construct == ConstructKind::None
            && self.coroutine.is_none()
    }

    /// Report every object the frame keeps alive
    pub fn trace(&self, tracer: &mut Tracer) {
        tracer.mark_values(self.registers.borrow().iter());
        for upvalue in &self.upvalues {
            trace_upvalue(upvalue, tracer);
        }
        self.scope.trace(tracer);
        tracer.mark_values(self.arguments.iter());
        if let Some(id) = self.function {
            tracer.mark(id);
        }
        if let Some(id) = self.arguments_object {
            tracer.mark(id);
        }
        if let Some(id) = self.coroutine {
            tracer.mark(id);
        }
        if let Some(exception) = &self.exception {
            tracer.mark_value(exception);
        }
        if let Some((_, value)) = &self.delegation {
            tracer.mark_value(value);
        }
        for completion in &self.completions {
            match completion {
                PendingCompletion::Return(value) => tracer.mark_value(value),
                PendingCompletion::Throw(Exception::Value(value)) => tracer.mark_value(value),
                _ => {}
            }
        }
    }
}
