//! Generator state machine
//!
//! A generator object owns its parked [`Frame`]. Calling a generator
//! function runs the parameter prologue up to `InitialYield` and parks the
//! frame; `next`/`return`/`throw` push it back on the VM stack as the
//! boundary of a nested dispatch run and inject the resumption.

use core_types::{ObjectId, PropertyKey, Value};
use log::{debug, trace};

use crate::call_frame::Frame;
use crate::dispatch::{Flow, FrameExit};
use crate::error::{Exception, JsResult};
use crate::object::{Coroutine, CoroutineKind, CoroutineState, ObjectKind, ResumeMode};
use crate::vm::VM;
use bytecode_system::RegisterId;

impl VM {
    /// Create the generator object for a call of generator function
    /// `function`, running its prologue synchronously
    pub(crate) fn create_generator(&mut self, function: ObjectId, mut frame: Frame) -> JsResult<Value> {
        let fallback = self.intrinsics.generator_prototype;
        let prototype = self.prototype_from_constructor(&Value::Function(function), fallback)?;
        let id = self.heap.allocate(
            Some(prototype),
            ObjectKind::Coroutine(Coroutine {
                state: CoroutineState::Running,
                frame: None,
                kind: CoroutineKind::Generator,
            }),
        );
        frame.coroutine = Some(id);
        match self.run_coroutine(frame, ResumeMode::Next, Value::Undefined) {
            Ok(FrameExit::InitialYield(frame)) => {
                self.park(id, CoroutineState::SuspendedStart, Some(frame));
                Ok(Value::Object(id))
            }
            Ok(_) => {
                self.park(id, CoroutineState::Completed, None);
                Err(Exception::internal("generator prologue did not reach InitialYield"))
            }
            Err(exception) => {
                self.park(id, CoroutineState::Completed, None);
                Err(exception)
            }
        }
    }

    /// `generator.next(v)` / `return(v)` / `throw(v)`
    pub fn resume_generator(&mut self, generator: &Value, mode: ResumeMode, value: Value) -> JsResult<Value> {
        let id = generator
            .as_object()
            .filter(|id| {
                matches!(
                    self.kind(*id),
                    Some(ObjectKind::Coroutine(Coroutine {
                        kind: CoroutineKind::Generator,
                        ..
                    }))
                )
            })
            .ok_or_else(|| {
                Exception::type_error(format!(
                    "{} called on incompatible receiver {}",
                    mode_name(mode),
                    self.display_value(generator)
                ))
            })?;

        let state = match self.kind(id) {
            Some(ObjectKind::Coroutine(coroutine)) => coroutine.state,
            _ => return Err(Exception::internal("generator expected")),
        };
        match state {
            CoroutineState::Running => {
                return Err(Exception::type_error("Generator is already running"));
            }
            CoroutineState::Completed => return self.completed_resumption(mode, value),
            CoroutineState::SuspendedStart if mode != ResumeMode::Next => {
                self.park(id, CoroutineState::Completed, None);
                return self.completed_resumption(mode, value);
            }
            _ => {}
        }

        let frame = match self.heap.kind_mut(id) {
            Some(ObjectKind::Coroutine(coroutine)) => {
                coroutine.state = CoroutineState::Running;
                coroutine.frame.take()
            }
            _ => None,
        };
        let Some(frame) = frame else {
            return Err(Exception::internal("suspended generator without a frame"));
        };
        trace!("resume generator #{} ({:?})", id.0, mode);

        match self.run_coroutine(*frame, mode, value) {
            Ok(FrameExit::Yield {
                value,
                frame,
                delegated,
            }) => {
                self.park(id, CoroutineState::SuspendedYield, Some(frame));
                if delegated {
                    Ok(value)
                } else {
                    Ok(self.iter_result(value, false))
                }
            }
            Ok(FrameExit::Return(value)) => {
                self.park(id, CoroutineState::Completed, None);
                debug!("generator #{} completed", id.0);
                Ok(self.iter_result(value, true))
            }
            Ok(FrameExit::Await { .. }) | Ok(FrameExit::InitialYield(_)) => {
                self.park(id, CoroutineState::Completed, None);
                Err(Exception::internal("unexpected suspension in a generator"))
            }
            Err(exception) => {
                self.park(id, CoroutineState::Completed, None);
                Err(exception)
            }
        }
    }

    /// Result of resuming a generator that has no frame any more
    fn completed_resumption(&mut self, mode: ResumeMode, value: Value) -> JsResult<Value> {
        match mode {
            ResumeMode::Next => Ok(self.iter_result(Value::Undefined, true)),
            ResumeMode::Return => Ok(self.iter_result(value, true)),
            ResumeMode::Throw => Err(Exception::Value(value)),
        }
    }

    /// Store the state (and frame) of coroutine `id`
    pub(crate) fn park(&mut self, id: ObjectId, state: CoroutineState, frame: Option<Box<Frame>>) {
        if let Some(ObjectKind::Coroutine(coroutine)) = self.heap.kind_mut(id) {
            trace!("coroutine #{}: {:?} -> {:?}", id.0, coroutine.state, state);
            coroutine.state = state;
            coroutine.frame = frame;
        }
    }

    /// Push a coroutine frame as a new dispatch boundary, inject the
    /// resumption and run until it suspends or finishes
    pub(crate) fn run_coroutine(&mut self, mut frame: Frame, mode: ResumeMode, value: Value) -> JsResult<FrameExit> {
        let delegating = std::mem::replace(&mut frame.delegating, false);
        if delegating {
            frame.delegation = Some((mode, value.clone()));
        } else if mode == ResumeMode::Next {
            if let Some(dst) = frame.resume_dst.take() {
                frame.set_register(dst, value.clone());
            }
        }
        self.with_native_depth(|vm| {
            vm.check_call_depth()?;
            let base = vm.frames.len();
            vm.push_frame(frame);
            let first = match mode {
                _ if delegating => Ok(Flow::Continue),
                ResumeMode::Next => Ok(Flow::Continue),
                ResumeMode::Throw => Err(Exception::Value(value)),
                ResumeMode::Return => vm.do_return(base, value),
            };
            vm.run_from(base, first)
        })
    }

    /// `YieldStar`: forward the pending resumption to the inner iterator.
    /// Suspends with the inner result object until it reports done.
    pub(crate) fn yield_star(&mut self, base: usize, dst: RegisterId, iterator: RegisterId) -> JsResult<Flow> {
        let iterator = self.reg(iterator);
        let frame = self
            .frames
            .last_mut()
            .ok_or_else(|| Exception::internal("no active frame"))?;
        let (mode, received) = frame
            .delegation
            .take()
            .unwrap_or((ResumeMode::Next, Value::Undefined));

        let result = match mode {
            ResumeMode::Next => self.iterator_next(&iterator, Some(received))?,
            ResumeMode::Throw => match self.get_method(&iterator, &PropertyKey::from("throw"))? {
                Some(throw) => {
                    let result = self.call_function(&throw, &iterator, &[received])?;
                    self.require_iter_result(result)?
                }
                None => {
                    self.iterator_close(&iterator)?;
                    return Err(Exception::type_error(
                        "The iterator does not provide a 'throw' method",
                    ));
                }
            },
            ResumeMode::Return => match self.get_method(&iterator, &PropertyKey::from("return"))? {
                Some(method) => {
                    let result = self.call_function(&method, &iterator, &[received])?;
                    let result = self.require_iter_result(result)?;
                    if self.iter_done(&result)? {
                        let value = self.get_property(&result, &PropertyKey::from("value"))?;
                        return self.do_return(base, value);
                    }
                    result
                }
                None => return self.do_return(base, received),
            },
        };

        if self.iter_done(&result)? {
            let value = self.get_property(&result, &PropertyKey::from("value"))?;
            self.set_reg(dst, value);
            return Ok(Flow::Continue);
        }

        let frame = self
            .frames
            .last_mut()
            .ok_or_else(|| Exception::internal("no active frame"))?;
        // Re-run this instruction on the next resumption
        frame.ip -= 1;
        frame.delegating = true;
        if self.frames.len() != base + 1 {
            return Err(Exception::internal("suspension outside a coroutine frame"));
        }
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| Exception::internal("no active frame"))?;
        Ok(Flow::Exit(FrameExit::Yield {
            value: result,
            frame: Box::new(frame),
            delegated: true,
        }))
    }
}

fn mode_name(mode: ResumeMode) -> &'static str {
    match mode {
        ResumeMode::Next => "Generator.prototype.next",
        ResumeMode::Return => "Generator.prototype.return",
        ResumeMode::Throw => "Generator.prototype.throw",
    }
}
