//! Virtual Machine for bytecode execution
//!
//! Main entry point for executing bytecode. The [`VM`] is the explicit
//! engine context: it owns the object heap, the intrinsics, the frame
//! stack, the symbol table and the task/microtask queues. Nothing is
//! process-global; dropping the VM tears everything down.

use std::fmt;
use std::rc::Rc;

use async_runtime::{
    perform_microtask_checkpoint, run_until_idle, EventLoop, LoopStats, PromiseState,
    RejectionTracker, Scheduler,
};
use bytecode_system::{BytecodeChunk, Verifier};
use core_types::{ErrorKind, JsError, ObjectId, PropertyKey, SymbolId, Value};
use log::{debug, warn};
use memory_manager::{GcStats, Heap, HeapStats, Property, Tracer};

use crate::call_frame::{Frame, FunctionTemplate, ReturnTo, ThisScope};
use crate::config::EngineConfig;
use crate::dispatch::FrameExit;
use crate::error::{EngineError, Exception, JsResult};
use crate::intrinsics::{self, Intrinsics};
use crate::object::{ArrayStore, HostFn, NativeCall, NativeData, NativeFunction, ObjectKind};
use crate::promise::Job;

/// Host-level task run by [`VM::run_event_loop`]
pub type Task = Box<dyn FnOnce(&mut VM) -> JsResult<()>>;

/// Virtual Machine for executing bytecode
///
/// # Example
///
/// ```
/// use bytecode_system::{BinaryOp, ChunkBuilder, Opcode};
/// use core_types::Value;
/// use interpreter::VM;
///
/// let mut b = ChunkBuilder::script();
/// let a = b.register();
/// let c = b.register();
/// b.load_number(a, -1.0);
/// b.load_number(c, 0.0);
/// b.emit(Opcode::Binary { op: BinaryOp::UShr, dst: a, lhs: a, rhs: c });
/// b.emit(Opcode::Return { value: a });
///
/// let mut vm = VM::new();
/// let result = vm.execute(&b.finish().unwrap()).unwrap();
/// assert_eq!(result, Value::Number(4294967295.0));
/// ```
pub struct VM {
    pub(crate) heap: Heap<ObjectKind>,
    pub(crate) intrinsics: Intrinsics,
    pub(crate) frames: Vec<Frame>,
    pub(crate) symbols: Vec<Option<Rc<str>>>,
    pub(crate) jobs: EventLoop<Job, Task>,
    pub(crate) rejections: RejectionTracker<ObjectId>,
    pub(crate) unhandled: Vec<Value>,
    pub(crate) config: EngineConfig,
    pub(crate) native_depth: usize,
}

impl fmt::Debug for VM {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VM")
            .field("live_objects", &self.heap.len())
            .field("frames", &self.frames.len())
            .field("symbols", &self.symbols.len())
            .field("pending_microtasks", &self.jobs.pending_microtasks())
            .field("pending_tasks", &self.jobs.pending_tasks())
            .field("config", &self.config)
            .finish()
    }
}

impl VM {
    /// Create a new VM instance with the default configuration
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create a VM with the given limits and switches
    pub fn with_config(config: EngineConfig) -> Self {
        let mut heap = Heap::new();
        let mut symbols = Vec::new();
        let intrinsics = intrinsics::install(&mut heap, &mut symbols);
        Self {
            heap,
            intrinsics,
            frames: Vec::with_capacity(64),
            symbols,
            jobs: EventLoop::new(),
            rejections: RejectionTracker::new(),
            unhandled: Vec::new(),
            config,
            native_depth: 0,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Execute a script chunk and return its completion value
    ///
    /// The chunk is verified first (unless disabled) and, when the run
    /// finishes, the microtask queue is drained (unless disabled). An
    /// exception escaping the script or a microtask is reported as
    /// [`EngineError::Uncaught`].
    pub fn execute(&mut self, chunk: &BytecodeChunk) -> Result<Value, EngineError> {
        if self.config.verify_bytecode {
            Verifier::new().verify(chunk)?;
        }
        debug!(
            "executing '{}' ({} instructions)",
            chunk.info.name,
            chunk.instructions.len()
        );

        let template = FunctionTemplate::new(Rc::new(chunk.clone()));
        let global = Value::Object(self.intrinsics.global);
        let scope = Rc::new(ThisScope::new(global, Value::Undefined, None));
        let frame = Frame::new(template, scope, ReturnTo::Boundary);

        let result = self.run_boundary_frame(frame);
        let value = match result {
            Ok(value) => value,
            Err(exception) => return Err(self.uncaught(exception)),
        };

        if self.config.drain_microtasks_on_execute {
            self.run_microtasks()?;
        }
        debug!("finished '{}'", chunk.info.name);
        Ok(value)
    }

    /// Push `frame` as a dispatch boundary and run it to completion
    pub(crate) fn run_boundary_frame(&mut self, frame: Frame) -> JsResult<Value> {
        self.with_native_depth(|vm| {
            vm.check_call_depth()?;
            let base = vm.frames.len();
            vm.push_frame(frame);
            match vm.run_frames(base)? {
                FrameExit::Return(value) => Ok(value),
                _ => Err(Exception::internal("unexpected suspension outside a coroutine")),
            }
        })
    }

    /// Run `f` one native re-entry deeper
    pub(crate) fn with_native_depth<T>(
        &mut self,
        f: impl FnOnce(&mut VM) -> JsResult<T>,
    ) -> JsResult<T> {
        if self.native_depth >= self.config.max_native_depth {
            return Err(Exception::range_error("Maximum call stack size exceeded"));
        }
        self.native_depth += 1;
        let result = f(self);
        self.native_depth -= 1;
        result
    }

    /// RangeError once the frame stack is full
    pub(crate) fn check_call_depth(&self) -> JsResult<()> {
        if self.frames.len() >= self.config.max_call_depth {
            return Err(Exception::range_error("Maximum call stack size exceeded"));
        }
        Ok(())
    }

    /// Turn an escaped exception into the embedder-facing error
    pub(crate) fn uncaught(&mut self, exception: Exception) -> EngineError {
        let value = self.exception_value(exception);
        let description = self.display_value(&value);
        warn!("Uncaught {}", description);
        EngineError::Uncaught { description, value }
    }

    // ---------------------------------------------------------------------
    // Scheduling
    // ---------------------------------------------------------------------

    /// Drain the microtask queue, including jobs enqueued while draining
    pub fn run_microtasks(&mut self) -> Result<usize, EngineError> {
        let result = perform_microtask_checkpoint(self);
        result.map_err(|exception| self.uncaught(exception))
    }

    /// Run host tasks with a microtask checkpoint after each until both
    /// queues are empty
    pub fn run_event_loop(&mut self) -> Result<LoopStats, EngineError> {
        let result = run_until_idle(self);
        result.map_err(|exception| self.uncaught(exception))
    }

    /// Queue a host-level task
    pub fn enqueue_task(&mut self, task: impl FnOnce(&mut VM) -> JsResult<()> + 'static) {
        self.jobs.enqueue_task(Box::new(task));
    }

    /// Queue a microtask
    pub fn enqueue_microtask(&mut self, job: impl FnOnce(&mut VM) -> JsResult<()> + 'static) {
        self.jobs.enqueue_microtask(Job::Host(Box::new(job)));
    }

    /// Drop all queued work, returning `(tasks, microtasks)` dropped
    pub fn discard_pending_jobs(&mut self) -> (usize, usize) {
        let dropped = self.jobs.discard();
        debug!("discarded {} task(s) and {} microtask(s)", dropped.0, dropped.1);
        dropped
    }

    /// Number of queued microtasks
    pub fn pending_microtasks(&self) -> usize {
        self.jobs.pending_microtasks()
    }

    // ---------------------------------------------------------------------
    // Globals and host functions
    // ---------------------------------------------------------------------

    /// The global object
    pub fn global_object(&self) -> Value {
        Value::Object(self.intrinsics.global)
    }

    /// Read an own data property of the global object without running
    /// user code
    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.heap
            .get_own(self.intrinsics.global, &PropertyKey::from(name))
            .and_then(Property::value)
            .cloned()
    }

    /// Create or overwrite a global binding
    pub fn set_global(&mut self, name: &str, value: Value) {
        self.heap
            .define(self.intrinsics.global, PropertyKey::from(name), Property::hidden(value));
    }

    /// Install an embedder function as a global and return it
    pub fn register_host_function(
        &mut self,
        name: &str,
        arity: u32,
        function: impl Fn(&mut VM, &Value, &[Value]) -> JsResult<Value> + 'static,
    ) -> Value {
        let host: HostFn = Rc::new(function);
        let native = NativeFunction {
            name: Rc::from(name),
            call: NativeCall::Host(host),
            construct: None,
            data: NativeData::None,
        };
        let value = self.new_native_function(native, arity);
        self.set_global(name, value.clone());
        value
    }

    /// Allocate a native function object with `name` and `length`
    pub(crate) fn new_native_function(&mut self, native: NativeFunction, arity: u32) -> Value {
        let id = intrinsics::alloc_native(
            &mut self.heap,
            self.intrinsics.function_prototype,
            native,
            arity,
        );
        Value::Function(id)
    }

    // ---------------------------------------------------------------------
    // Allocation helpers
    // ---------------------------------------------------------------------

    /// Allocate a plain object inheriting from `Object.prototype`
    pub fn create_object(&mut self) -> Value {
        Value::Object(self.new_ordinary())
    }

    /// Allocate an array holding `elements`
    pub fn create_array(&mut self, elements: Vec<Value>) -> Value {
        Value::Object(self.heap.allocate(
            Some(self.intrinsics.array_prototype),
            ObjectKind::Array(ArrayStore::new(elements)),
        ))
    }

    /// Create an Error object of `kind`
    pub fn create_error(&mut self, kind: ErrorKind, message: &str) -> Value {
        let stack = self.capture_stack();
        let error = JsError::new(kind, message).with_stack(stack);
        self.error_object(&error)
    }

    pub(crate) fn new_ordinary(&mut self) -> ObjectId {
        self.heap
            .allocate(Some(self.intrinsics.object_prototype), ObjectKind::Ordinary)
    }

    /// `{ value, done }`
    pub(crate) fn iter_result(&mut self, value: Value, done: bool) -> Value {
        let id = self.new_ordinary();
        self.heap.define(id, "value".into(), Property::data(value));
        self.heap
            .define(id, "done".into(), Property::data(Value::Boolean(done)));
        Value::Object(id)
    }

    /// Internal slots of an object
    pub(crate) fn kind(&self, id: ObjectId) -> Option<&ObjectKind> {
        self.heap.kind(id)
    }

    /// Value carrying the right tag for `id`
    pub(crate) fn object_value(&self, id: ObjectId) -> Value {
        match self.kind(id) {
            Some(kind) if kind.is_callable() => Value::Function(id),
            _ => Value::Object(id),
        }
    }

    /// Materialize an engine fault as an Error object
    pub(crate) fn error_object(&mut self, error: &JsError) -> Value {
        let prototype = self.intrinsics.error_prototype(error.kind);
        let id = self.heap.allocate(Some(prototype), ObjectKind::Error);
        self.heap.define(
            id,
            "message".into(),
            Property::hidden(Value::string(error.message.as_str())),
        );
        self.heap.define(
            id,
            "stack".into(),
            Property::hidden(Value::string(error.stack_trace())),
        );
        if error.kind == ErrorKind::InternalError {
            self.heap
                .define(id, "name".into(), Property::hidden(Value::string("InternalError")));
        }
        Value::Object(id)
    }

    /// The thrown value of an exception, materializing faults
    pub(crate) fn exception_value(&mut self, exception: Exception) -> Value {
        match exception {
            Exception::Value(value) => value,
            Exception::Error(error) => self.error_object(&error),
        }
    }

    // ---------------------------------------------------------------------
    // Symbols
    // ---------------------------------------------------------------------

    /// Create a fresh symbol
    pub fn new_symbol(&mut self, description: Option<&str>) -> Value {
        self.symbols.push(description.map(Rc::from));
        Value::Symbol(SymbolId(self.symbols.len() as u32 - 1))
    }

    /// Description of a symbol
    pub fn symbol_description(&self, symbol: SymbolId) -> Option<Rc<str>> {
        self.symbols.get(symbol.0 as usize).cloned().flatten()
    }

    // ---------------------------------------------------------------------
    // Promises
    // ---------------------------------------------------------------------

    /// Settled state of a promise (None for non-promises)
    pub fn promise_state(&self, promise: &Value) -> Option<PromiseState<Value>> {
        match promise.as_object().and_then(|id| self.kind(id)) {
            Some(ObjectKind::Promise(record)) => Some(record.state().clone()),
            _ => None,
        }
    }

    /// Reasons of rejected promises that never got a handler, reported
    /// since the last call
    pub fn take_unhandled_rejections(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.unhandled)
    }

    pub(crate) fn report_unhandled_rejections(&mut self) {
        for promise in self.rejections.take() {
            let reason = match self.kind(promise) {
                Some(ObjectKind::Promise(record)) if !record.is_handled() => match record.state() {
                    PromiseState::Rejected(reason) => reason.clone(),
                    _ => continue,
                },
                _ => continue,
            };
            warn!("Unhandled promise rejection: {}", self.display_value(&reason));
            self.unhandled.push(reason);
        }
    }

    // ---------------------------------------------------------------------
    // Memory
    // ---------------------------------------------------------------------

    /// Free every object unreachable from the VM roots plus `extra_roots`
    ///
    /// Returns `None` while frames or native calls are live: their
    /// registers and locals are not visible to the collector. Closures
    /// captured by host functions and host tasks are not traced either;
    /// objects they hold must be reachable from a global or passed in
    /// `extra_roots`.
    pub fn collect_garbage(&mut self, extra_roots: &[Value]) -> Option<GcStats> {
        if !self.frames.is_empty() || self.native_depth > 0 {
            return None;
        }
        let mut tracer = Tracer::new();
        for id in self.intrinsics.roots() {
            tracer.mark(id);
        }
        tracer.mark_values(extra_roots.iter());
        tracer.mark_values(self.unhandled.iter());
        for promise in self.rejections.iter() {
            tracer.mark(*promise);
        }
        for job in self.jobs.microtasks() {
            job.trace(&mut tracer);
        }
        let stats = self.heap.collect(tracer.into_marked());
        debug!("gc: {} live, {} freed", stats.marked, stats.freed);
        Some(stats)
    }

    /// Allocation counters
    pub fn heap_stats(&self) -> HeapStats {
        self.heap.stats()
    }
}

impl Default for VM {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for VM {
    type Job = Job;
    type Task = Task;
    type Error = Exception;

    fn event_loop(&mut self) -> &mut EventLoop<Job, Task> {
        &mut self.jobs
    }

    fn run_microtask(&mut self, job: Job) -> JsResult<()> {
        self.run_job(job)
    }

    fn run_task(&mut self, task: Task) -> JsResult<()> {
        task(self)
    }

    fn checkpoint_finished(&mut self) {
        if self.config.track_unhandled_rejections {
            self.report_unhandled_rejections();
        }
    }
}
