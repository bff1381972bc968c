//! Internal slots of heap objects
//!
//! The arena in `memory_manager` stores property tables and prototype
//! links; [`ObjectKind`] is the engine-defined payload next to them. Every
//! variant reports the objects it references through [`Trace`] so the
//! collector can follow closures, parked frames and promise reactions.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use async_runtime::{Aggregate, PromiseRecord, Settlement};
use core_types::{ObjectId, Value};
use memory_manager::{Trace, Tracer};

use crate::call_frame::Frame;
use crate::error::JsResult;
use crate::upvalue::Closure;
use crate::vm::VM;

/// Host function ABI: `(vm, this, arguments)`
pub type NativeFn = fn(&mut VM, &Value, &[Value]) -> JsResult<Value>;

/// Built-in function that reads its own internal slots
pub type InternalFn = fn(&mut VM, ObjectId, &Value, &[Value]) -> JsResult<Value>;

/// `[[Construct]]` of a built-in: `(vm, arguments, new_target)`
pub type NativeConstructorFn = fn(&mut VM, &[Value], &Value) -> JsResult<Value>;

/// Function registered by the embedder
pub type HostFn = Rc<dyn Fn(&mut VM, &Value, &[Value]) -> JsResult<Value>>;

/// Backing store of an array
#[derive(Debug, Clone, Default)]
pub struct ArrayStore {
    /// Elements; `Value::Hole` marks a missing index
    pub elements: Vec<Value>,
    /// Set by `Object.freeze`: indices and length are read-only
    pub frozen: bool,
}

impl ArrayStore {
    /// Array holding `elements`
    pub fn new(elements: Vec<Value>) -> Self {
        Self {
            elements,
            frozen: false,
        }
    }
}

/// How a native function is invoked
#[derive(Clone)]
pub enum NativeCall {
    /// Plain built-in
    Static(NativeFn),
    /// Built-in that needs its own function object (resolving functions,
    /// combinator elements)
    Internal(InternalFn),
    /// Closure supplied by the embedder
    Host(HostFn),
}

impl fmt::Debug for NativeCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeCall::Static(_) => f.write_str("Static"),
            NativeCall::Internal(_) => f.write_str("Internal"),
            NativeCall::Host(_) => f.write_str("Host"),
        }
    }
}

/// Which way a combinator element function reports its input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementRole {
    /// Records a fulfillment value (`all`, `allSettled`)
    Fulfilled,
    /// Records a rejection reason (`allSettled`, `any`)
    Rejected,
}

/// Extra state carried by built-in functions
#[derive(Debug, Clone)]
pub enum NativeData {
    /// No state
    None,
    /// `resolve`/`reject` pair handed to a promise executor or thenable
    Resolving {
        /// Promise being settled
        promise: ObjectId,
        /// Shared by both functions of the pair
        already_resolved: Rc<Cell<bool>>,
        /// This is the `reject` half
        reject: bool,
    },
    /// Per-input function of `Promise.all`/`allSettled`/`any`
    CombinatorElement {
        /// Input position
        index: usize,
        /// Entries collected so far
        aggregate: Rc<RefCell<Aggregate<Value>>>,
        /// Promise returned by the combinator
        capability: ObjectId,
        /// What the element records
        role: ElementRole,
    },
    /// `then`/`catch` step created by `Promise.prototype.finally`
    Finally {
        /// User callback
        on_finally: Value,
        /// Installed as the rejection handler
        rejected: bool,
    },
    /// Returns (or throws) a fixed value, used after `finally` callbacks
    ValueThunk {
        /// Value to produce
        value: Value,
        /// Throw instead of returning
        throw: bool,
    },
}

impl Trace for NativeData {
    fn trace(&self, tracer: &mut Tracer) {
        match self {
            NativeData::None => {}
            NativeData::Resolving { promise, .. } => tracer.mark(*promise),
            NativeData::CombinatorElement {
                aggregate,
                capability,
                ..
            } => {
                tracer.mark(*capability);
                tracer.mark_values(aggregate.borrow().entries());
            }
            NativeData::Finally { on_finally, .. } => tracer.mark_value(on_finally),
            NativeData::ValueThunk { value, .. } => tracer.mark_value(value),
        }
    }
}

/// Built-in or embedder function
#[derive(Debug, Clone)]
pub struct NativeFunction {
    /// Function name
    pub name: Rc<str>,
    /// Call behaviour
    pub call: NativeCall,
    /// Construct behaviour; `None` for non-constructors
    pub construct: Option<NativeConstructorFn>,
    /// Internal state
    pub data: NativeData,
}

impl NativeFunction {
    /// Plain built-in without construct behaviour
    pub fn new(name: &str, call: NativeFn) -> Self {
        Self {
            name: Rc::from(name),
            call: NativeCall::Static(call),
            construct: None,
            data: NativeData::None,
        }
    }

    /// Built-in reading `data` through its own object id
    pub fn internal(name: &str, call: InternalFn, data: NativeData) -> Self {
        Self {
            name: Rc::from(name),
            call: NativeCall::Internal(call),
            construct: None,
            data,
        }
    }

    /// Add construct behaviour
    pub fn with_construct(mut self, construct: NativeConstructorFn) -> Self {
        self.construct = Some(construct);
        self
    }
}

/// Lifecycle of a generator or async activation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoroutineState {
    /// Created, body not entered yet
    SuspendedStart,
    /// Parked at `yield` or `await`
    SuspendedYield,
    /// Frame is on the VM stack
    Running,
    /// Returned or threw; the frame is gone
    Completed,
}

/// What drives a coroutine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoroutineKind {
    /// Resumed by `next`/`return`/`throw`
    Generator,
    /// Resumed by promise reactions; settles `promise` when done
    Async {
        /// The promise returned to the caller
        promise: ObjectId,
    },
}

/// A resumable activation
#[derive(Debug)]
pub struct Coroutine {
    /// Current state
    pub state: CoroutineState,
    /// Parked frame while suspended
    pub frame: Option<Box<Frame>>,
    /// Generator or async function
    pub kind: CoroutineKind,
}

/// How a suspended coroutine is resumed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeMode {
    /// `next(v)` / fulfilled await
    Next,
    /// `throw(e)` / rejected await
    Throw,
    /// `return(v)`
    Return,
}

/// Reaction callback of one side of a `then`
#[derive(Debug, Clone)]
pub enum Handler {
    /// User or built-in function
    Callable(Value),
    /// Missing fulfillment handler: pass the value through
    Identity,
    /// Missing rejection handler: pass the reason through
    Thrower,
    /// Resume an async function suspended at `await`
    AsyncResume(ObjectId),
}

impl Trace for Handler {
    fn trace(&self, tracer: &mut Tracer) {
        match self {
            Handler::Callable(value) => tracer.mark_value(value),
            Handler::AsyncResume(id) => tracer.mark(*id),
            Handler::Identity | Handler::Thrower => {}
        }
    }
}

/// Both handlers of a `then` plus the promise they settle
#[derive(Debug, Clone)]
pub struct ReactionPair {
    /// Derived promise; `None` when the result is discarded
    pub capability: Option<ObjectId>,
    /// Runs on fulfillment
    pub on_fulfilled: Handler,
    /// Runs on rejection
    pub on_rejected: Handler,
}

impl ReactionPair {
    /// The handler for one settlement
    pub fn handler(&self, settlement: Settlement) -> Handler {
        match settlement {
            Settlement::Fulfilled => self.on_fulfilled.clone(),
            Settlement::Rejected => self.on_rejected.clone(),
        }
    }
}

impl Trace for ReactionPair {
    fn trace(&self, tracer: &mut Tracer) {
        if let Some(id) = self.capability {
            tracer.mark(id);
        }
        self.on_fulfilled.trace(tracer);
        self.on_rejected.trace(tracer);
    }
}

/// Internal slots of a promise
pub type PromiseSlot = PromiseRecord<Value, ReactionPair>;

/// Internal slots of an object
#[derive(Debug)]
pub enum ObjectKind {
    /// Plain object
    Ordinary,
    /// Array exotic object
    Array(ArrayStore),
    /// Bytecode closure
    Function(Closure),
    /// Built-in or embedder function
    Native(NativeFunction),
    /// Result of `Function.prototype.bind`
    Bound {
        /// Wrapped function
        target: Value,
        /// Bound `this`
        this: Value,
        /// Bound leading arguments
        args: Vec<Value>,
    },
    /// Materialized `arguments`
    Arguments,
    /// Error instance brand
    Error,
    /// Generator object or async activation
    Coroutine(Coroutine),
    /// Promise
    Promise(PromiseSlot),
    /// Proxy exotic object
    Proxy {
        /// Wrapped object
        target: Value,
        /// Trap table
        handler: Value,
    },
    /// `%ArrayIteratorPrototype%` instance
    ArrayIterator {
        /// Iterated object
        array: Value,
        /// Next index
        index: usize,
        /// Exhausted
        done: bool,
    },
}

impl ObjectKind {
    /// Whether property access must go through the exotic algorithms
    /// instead of the plain property table
    pub fn is_exotic(&self) -> bool {
        matches!(self, ObjectKind::Array(_) | ObjectKind::Proxy { .. })
    }

    /// Whether the object carries the callable tag
    pub fn is_callable(&self) -> bool {
        match self {
            ObjectKind::Function(_) | ObjectKind::Native(_) | ObjectKind::Bound { .. } => true,
            ObjectKind::Proxy { target, .. } => target.is_callable(),
            _ => false,
        }
    }
}

impl Trace for ObjectKind {
    fn trace(&self, tracer: &mut Tracer) {
        match self {
            ObjectKind::Ordinary | ObjectKind::Arguments | ObjectKind::Error => {}
            ObjectKind::Array(store) => tracer.mark_values(store.elements.iter()),
            ObjectKind::Function(closure) => closure.trace(tracer),
            ObjectKind::Native(native) => native.data.trace(tracer),
            ObjectKind::Bound { target, this, args } => {
                tracer.mark_value(target);
                tracer.mark_value(this);
                tracer.mark_values(args.iter());
            }
            ObjectKind::Coroutine(coroutine) => {
                if let Some(frame) = &coroutine.frame {
                    frame.trace(tracer);
                }
                if let CoroutineKind::Async { promise } = coroutine.kind {
                    tracer.mark(promise);
                }
            }
            ObjectKind::Promise(record) => {
                match record.state() {
                    async_runtime::PromiseState::Fulfilled(value)
                    | async_runtime::PromiseState::Rejected(value) => tracer.mark_value(value),
                    async_runtime::PromiseState::Pending => {}
                }
                for reaction in record.reactions() {
                    reaction.trace(tracer);
                }
            }
            ObjectKind::Proxy { target, handler } => {
                tracer.mark_value(target);
                tracer.mark_value(handler);
            }
            ObjectKind::ArrayIterator { array, .. } => tracer.mark_value(array),
        }
    }
}
