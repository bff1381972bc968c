//! Promise machinery and async functions
//!
//! Promise state lives in [`PromiseSlot`] records on the heap. Settling a
//! promise turns its reactions into [`Job`]s on the microtask queue; the
//! queue itself is the generic one from `async_runtime`. Async functions
//! are coroutines whose `Await` registers [`Handler::AsyncResume`]
//! reactions on the awaited promise.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use async_runtime::{Aggregate, CombinatorKind, PromiseRecord, Registration, Settlement};
use core_types::{ErrorKind, ObjectId, Value};
use log::{debug, trace};
use memory_manager::{Property, Trace, Tracer};

use crate::call_frame::Frame;
use crate::dispatch::FrameExit;
use crate::error::{Exception, JsResult};
use crate::object::{
    Coroutine, CoroutineKind, CoroutineState, ElementRole, Handler, NativeData, NativeFunction, ObjectKind,
    ReactionPair, ResumeMode,
};
use crate::vm::{Task, VM};

/// A queued microtask
pub enum Job {
    /// Run one handler of a settled promise and settle the derived promise
    Reaction {
        /// Handler for the settlement
        handler: Handler,
        /// Derived promise, if any
        capability: Option<ObjectId>,
        /// How the source promise settled
        settlement: Settlement,
        /// Value or reason of the source promise
        argument: Value,
    },
    /// Call `then` of a thenable used to resolve `promise`
    ResolveThenable {
        /// Promise being resolved
        promise: ObjectId,
        /// The resolution value
        thenable: Value,
        /// Its `then` method
        then: Value,
    },
    /// Microtask queued by the embedder
    Host(Task),
}

impl Job {
    /// Mark the objects a queued job keeps alive
    pub(crate) fn trace(&self, tracer: &mut Tracer) {
        match self {
            Job::Reaction {
                handler,
                capability,
                argument,
                ..
            } => {
                handler.trace(tracer);
                if let Some(id) = capability {
                    tracer.mark(*id);
                }
                tracer.mark_value(argument);
            }
            Job::ResolveThenable {
                promise,
                thenable,
                then,
            } => {
                tracer.mark(*promise);
                tracer.mark_value(thenable);
                tracer.mark_value(then);
            }
            Job::Host(_) => {}
        }
    }
}

impl VM {
    // ---------------------------------------------------------------------
    // Embedder API
    // ---------------------------------------------------------------------

    /// Create a pending promise
    pub fn new_promise(&mut self) -> Value {
        Value::Object(self.new_promise_object())
    }

    /// Resolve `promise` with `value`, adopting the state of thenables
    pub fn resolve_promise(&mut self, promise: &Value, value: Value) -> JsResult<()> {
        let id = self.promise_operand(promise)?;
        self.resolve_promise_internal(id, value)
    }

    /// Reject `promise` with `reason`
    pub fn reject_promise(&mut self, promise: &Value, reason: Value) -> JsResult<()> {
        let id = self.promise_operand(promise)?;
        self.settle_promise(id, Settlement::Rejected, reason)
    }

    fn promise_operand(&self, promise: &Value) -> JsResult<ObjectId> {
        promise
            .as_object()
            .filter(|id| matches!(self.kind(*id), Some(ObjectKind::Promise(_))))
            .ok_or_else(|| {
                Exception::type_error(format!("{} is not a promise", self.display_value(promise)))
            })
    }

    // ---------------------------------------------------------------------
    // Core operations
    // ---------------------------------------------------------------------

    pub(crate) fn new_promise_object(&mut self) -> ObjectId {
        let prototype = self.intrinsics.promise_prototype;
        self.new_promise_with_prototype(prototype)
    }

    pub(crate) fn new_promise_with_prototype(&mut self, prototype: ObjectId) -> ObjectId {
        self.heap
            .allocate(Some(prototype), ObjectKind::Promise(PromiseRecord::new()))
    }

    /// A fresh `resolve`/`reject` pair sharing one already-resolved flag
    pub(crate) fn create_resolving_functions(&mut self, promise: ObjectId) -> (Value, Value) {
        let already_resolved = Rc::new(Cell::new(false));
        let resolve = NativeFunction::internal(
            "",
            resolving_function,
            NativeData::Resolving {
                promise,
                already_resolved: already_resolved.clone(),
                reject: false,
            },
        );
        let reject = NativeFunction::internal(
            "",
            resolving_function,
            NativeData::Resolving {
                promise,
                already_resolved,
                reject: true,
            },
        );
        (
            self.new_native_function(resolve, 1),
            self.new_native_function(reject, 1),
        )
    }

    /// Resolve `promise` with `resolution`: self-resolution rejects,
    /// thenables are adopted through a job, anything else fulfills
    pub(crate) fn resolve_promise_internal(&mut self, promise: ObjectId, resolution: Value) -> JsResult<()> {
        if resolution.as_object() == Some(promise) {
            let error = self.create_error(
                ErrorKind::TypeError,
                "Chaining cycle detected for promise #<Promise>",
            );
            return self.settle_promise(promise, Settlement::Rejected, error);
        }
        if !resolution.is_object() {
            return self.settle_promise(promise, Settlement::Fulfilled, resolution);
        }
        let then = match self.get_property(&resolution, &"then".into()) {
            Ok(then) => then,
            Err(exception) => {
                let reason = self.exception_value(exception);
                return self.settle_promise(promise, Settlement::Rejected, reason);
            }
        };
        if !then.is_callable() {
            return self.settle_promise(promise, Settlement::Fulfilled, resolution);
        }
        self.jobs.enqueue_microtask(Job::ResolveThenable {
            promise,
            thenable: resolution,
            then,
        });
        Ok(())
    }

    /// Fulfill or reject `promise` and schedule its reactions. Settling an
    /// already settled promise does nothing.
    pub(crate) fn settle_promise(&mut self, promise: ObjectId, settlement: Settlement, value: Value) -> JsResult<()> {
        let track = self.config.track_unhandled_rejections;
        let Some(ObjectKind::Promise(record)) = self.heap.kind_mut(promise) else {
            return Err(Exception::internal("settling a non-promise"));
        };
        let reactions = match settlement {
            Settlement::Fulfilled => record.fulfill(value.clone()),
            Settlement::Rejected => record.reject(value.clone()),
        };
        let Some(reactions) = reactions else {
            return Ok(());
        };
        if settlement == Settlement::Rejected && track && !record.is_handled() {
            self.rejections.rejected(promise);
        }
        trace!(
            "promise #{} {} ({} reaction(s))",
            promise.0,
            settlement,
            reactions.len()
        );
        for reaction in reactions {
            self.jobs.enqueue_microtask(Job::Reaction {
                handler: reaction.handler(settlement),
                capability: reaction.capability,
                settlement,
                argument: value.clone(),
            });
        }
        Ok(())
    }

    /// Register a reaction; schedules it at once if `promise` has settled
    pub(crate) fn perform_then(&mut self, promise: ObjectId, reaction: ReactionPair) -> JsResult<()> {
        let Some(ObjectKind::Promise(record)) = self.heap.kind_mut(promise) else {
            return Err(Exception::internal("then on a non-promise"));
        };
        let registration = record.register(reaction);
        self.rejections.handled(&promise);
        if let Registration::Ready {
            reaction,
            settlement,
            value,
        } = registration
        {
            self.jobs.enqueue_microtask(Job::Reaction {
                handler: reaction.handler(settlement),
                capability: reaction.capability,
                settlement,
                argument: value,
            });
        }
        Ok(())
    }

    /// `PromiseResolve(%Promise%, value)`
    pub(crate) fn promise_resolve(&mut self, value: &Value) -> JsResult<ObjectId> {
        if let Some(id) = value.as_object() {
            if matches!(self.kind(id), Some(ObjectKind::Promise(_))) {
                return Ok(id);
            }
        }
        let promise = self.new_promise_object();
        self.resolve_promise_internal(promise, value.clone())?;
        Ok(promise)
    }

    /// Run one microtask
    pub(crate) fn run_job(&mut self, job: Job) -> JsResult<()> {
        match job {
            Job::Reaction {
                handler,
                capability,
                settlement,
                argument,
            } => {
                let outcome = match handler {
                    Handler::Identity => Ok(argument),
                    Handler::Thrower => Err(Exception::Value(argument)),
                    Handler::Callable(function) => {
                        self.call_function(&function, &Value::Undefined, &[argument])
                    }
                    Handler::AsyncResume(coroutine) => {
                        return self.async_resume(coroutine, settlement, argument)
                    }
                };
                let Some(capability) = capability else {
                    if let Err(exception) = outcome {
                        debug!("reaction without a derived promise threw: {:?}", exception);
                    }
                    return Ok(());
                };
                match outcome {
                    Ok(value) => self.resolve_promise_internal(capability, value),
                    Err(exception) => {
                        let reason = self.exception_value(exception);
                        self.settle_promise(capability, Settlement::Rejected, reason)
                    }
                }
            }
            Job::ResolveThenable {
                promise,
                thenable,
                then,
            } => {
                let (resolve, reject) = self.create_resolving_functions(promise);
                if let Err(exception) = self.call_function(&then, &thenable, &[resolve, reject.clone()]) {
                    let reason = self.exception_value(exception);
                    self.call_function(&reject, &Value::Undefined, &[reason])?;
                }
                Ok(())
            }
            Job::Host(task) => task(self),
        }
    }

    // ---------------------------------------------------------------------
    // Combinators
    // ---------------------------------------------------------------------

    /// `Promise.all` / `allSettled` / `any` over `iterable`
    pub(crate) fn promise_combinator(&mut self, kind: CombinatorKind, iterable: &Value) -> JsResult<Value> {
        let capability = self.new_promise_object();
        if let Err(exception) = self.subscribe_combinator(kind, capability, iterable) {
            let reason = self.exception_value(exception);
            self.settle_promise(capability, Settlement::Rejected, reason)?;
        }
        Ok(Value::Object(capability))
    }

    fn subscribe_combinator(&mut self, kind: CombinatorKind, capability: ObjectId, iterable: &Value) -> JsResult<()> {
        let items = self.iterate_to_vec(iterable)?;
        let (resolve, reject) = self.create_resolving_functions(capability);
        let aggregate = Rc::new(RefCell::new(Aggregate::new(kind)));
        for item in items {
            let index = aggregate.borrow_mut().reserve();
            let promise = self.promise_resolve(&item)?;
            let element = |vm: &mut VM, role: ElementRole| {
                let native = NativeFunction::internal(
                    "",
                    combinator_element,
                    NativeData::CombinatorElement {
                        index,
                        aggregate: aggregate.clone(),
                        capability,
                        role,
                    },
                );
                vm.new_native_function(native, 1)
            };
            let (on_fulfilled, on_rejected) = match kind {
                CombinatorKind::All => (element(self, ElementRole::Fulfilled), reject.clone()),
                CombinatorKind::AllSettled => (
                    element(self, ElementRole::Fulfilled),
                    element(self, ElementRole::Rejected),
                ),
                CombinatorKind::Any => (resolve.clone(), element(self, ElementRole::Rejected)),
            };
            self.perform_then(
                promise,
                ReactionPair {
                    capability: None,
                    on_fulfilled: Handler::Callable(on_fulfilled),
                    on_rejected: Handler::Callable(on_rejected),
                },
            )?;
        }
        let complete = aggregate.borrow_mut().finish_iteration();
        if let Some(entries) = complete {
            self.finish_combinator(kind, capability, entries)?;
        }
        Ok(())
    }

    fn finish_combinator(&mut self, kind: CombinatorKind, capability: ObjectId, entries: Vec<Value>) -> JsResult<()> {
        debug!("{} finished with {} entr(ies)", kind.name(), entries.len());
        let list = self.create_array(entries);
        match kind {
            CombinatorKind::All | CombinatorKind::AllSettled => {
                self.resolve_promise_internal(capability, list)
            }
            CombinatorKind::Any => {
                let error = self.create_error(ErrorKind::AggregateError, "All promises were rejected");
                if let Some(id) = error.as_object() {
                    self.heap.define(id, "errors".into(), Property::hidden(list));
                }
                self.settle_promise(capability, Settlement::Rejected, error)
            }
        }
    }

    /// `Promise.race`
    pub(crate) fn promise_race(&mut self, iterable: &Value) -> JsResult<Value> {
        let capability = self.new_promise_object();
        let (resolve, reject) = self.create_resolving_functions(capability);
        let subscribed = self.iterate_to_vec(iterable).and_then(|items| {
            for item in items {
                let promise = self.promise_resolve(&item)?;
                self.perform_then(
                    promise,
                    ReactionPair {
                        capability: None,
                        on_fulfilled: Handler::Callable(resolve.clone()),
                        on_rejected: Handler::Callable(reject.clone()),
                    },
                )?;
            }
            Ok(())
        });
        if let Err(exception) = subscribed {
            let reason = self.exception_value(exception);
            self.settle_promise(capability, Settlement::Rejected, reason)?;
        }
        Ok(Value::Object(capability))
    }

    // ---------------------------------------------------------------------
    // Async functions
    // ---------------------------------------------------------------------

    /// Call of an async function: run the body up to its first `await`
    /// and hand back the result promise
    pub(crate) fn start_async(&mut self, mut frame: Frame) -> JsResult<Value> {
        let promise = self.new_promise_object();
        let coroutine = self.heap.allocate(
            Some(self.intrinsics.object_prototype),
            ObjectKind::Coroutine(Coroutine {
                state: CoroutineState::Running,
                frame: None,
                kind: CoroutineKind::Async { promise },
            }),
        );
        frame.coroutine = Some(coroutine);
        let outcome = self.run_coroutine(frame, ResumeMode::Next, Value::Undefined);
        self.settle_async(coroutine, promise, outcome)?;
        Ok(Value::Object(promise))
    }

    /// Resume an async function parked at `await`
    fn async_resume(&mut self, coroutine: ObjectId, settlement: Settlement, value: Value) -> JsResult<()> {
        let (promise, frame) = match self.heap.kind_mut(coroutine) {
            Some(ObjectKind::Coroutine(Coroutine {
                state: state @ CoroutineState::SuspendedYield,
                frame,
                kind: CoroutineKind::Async { promise },
            })) => {
                *state = CoroutineState::Running;
                (*promise, frame.take())
            }
            _ => return Err(Exception::internal("resuming an async function that is not parked")),
        };
        let Some(frame) = frame else {
            return Err(Exception::internal("parked async function without a frame"));
        };
        let mode = match settlement {
            Settlement::Fulfilled => ResumeMode::Next,
            Settlement::Rejected => ResumeMode::Throw,
        };
        let outcome = self.run_coroutine(*frame, mode, value);
        self.settle_async(coroutine, promise, outcome)
    }

    /// Park at an `await` or settle the result promise
    fn settle_async(&mut self, coroutine: ObjectId, promise: ObjectId, outcome: JsResult<FrameExit>) -> JsResult<()> {
        match outcome {
            Ok(FrameExit::Await { value, frame }) => {
                self.park(coroutine, CoroutineState::SuspendedYield, Some(frame));
                let awaited = self.promise_resolve(&value)?;
                self.perform_then(
                    awaited,
                    ReactionPair {
                        capability: None,
                        on_fulfilled: Handler::AsyncResume(coroutine),
                        on_rejected: Handler::AsyncResume(coroutine),
                    },
                )
            }
            Ok(FrameExit::Return(value)) => {
                self.park(coroutine, CoroutineState::Completed, None);
                self.resolve_promise_internal(promise, value)
            }
            Ok(FrameExit::Yield { .. }) | Ok(FrameExit::InitialYield(_)) => {
                self.park(coroutine, CoroutineState::Completed, None);
                Err(Exception::internal("yield inside an async function"))
            }
            Err(exception) => {
                self.park(coroutine, CoroutineState::Completed, None);
                let reason = self.exception_value(exception);
                self.settle_promise(promise, Settlement::Rejected, reason)
            }
        }
    }

    /// Internal slots of a built-in function
    pub(crate) fn native_data(&self, id: ObjectId) -> JsResult<NativeData> {
        match self.kind(id) {
            Some(ObjectKind::Native(native)) => Ok(native.data.clone()),
            _ => Err(Exception::internal("built-in function expected")),
        }
    }
}

/// Shared body of the `resolve`/`reject` functions
fn resolving_function(vm: &mut VM, own: ObjectId, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let NativeData::Resolving {
        promise,
        already_resolved,
        reject,
    } = vm.native_data(own)?
    else {
        return Err(Exception::internal("resolving function without state"));
    };
    if already_resolved.replace(true) {
        return Ok(Value::Undefined);
    }
    let value = args.first().cloned().unwrap_or(Value::Undefined);
    if reject {
        vm.settle_promise(promise, Settlement::Rejected, value)?;
    } else {
        vm.resolve_promise_internal(promise, value)?;
    }
    Ok(Value::Undefined)
}

/// Per-input function of `all`/`allSettled`/`any`
fn combinator_element(vm: &mut VM, own: ObjectId, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let NativeData::CombinatorElement {
        index,
        aggregate,
        capability,
        role,
    } = vm.native_data(own)?
    else {
        return Err(Exception::internal("combinator element without state"));
    };
    let value = args.first().cloned().unwrap_or(Value::Undefined);
    let kind = aggregate.borrow().kind();
    let entry = if kind == CombinatorKind::AllSettled {
        let record = vm.new_ordinary();
        let (status, field) = match role {
            ElementRole::Fulfilled => ("fulfilled", "value"),
            ElementRole::Rejected => ("rejected", "reason"),
        };
        vm.heap
            .define(record, "status".into(), Property::data(Value::string(status)));
        vm.heap.define(record, field.into(), Property::data(value));
        Value::Object(record)
    } else {
        value
    };
    let complete = aggregate.borrow_mut().record(index, entry);
    if let Some(entries) = complete {
        vm.finish_combinator(kind, capability, entries)?;
    }
    Ok(Value::Undefined)
}
