//! Exception unwinding and completion routing
//!
//! Every frame keeps a stack of [`TryRegion`]s. A throw walks the regions
//! of the top frame innermost-first, then pops frames outward until the
//! boundary of the current dispatch run. `return` and `Leave` route through
//! enclosing finally bodies by parking a [`PendingCompletion`]; `EndFinally`
//! resumes it. Leaving a finally body by `return`, `throw` or `Leave`
//! discards its pending completion, which is what makes a `return` inside
//! `finally` win over the `return` or `throw` it interrupted.

use core_types::{StackFrame, Value};

use crate::call_frame::{ConstructKind, Frame, PendingCompletion, ReturnTo, TryRegion};
use crate::dispatch::{Flow, FrameExit};
use crate::error::{Exception, JsResult};
use crate::vm::VM;

/// Where a throw inside one frame goes
enum Catch {
    /// Jump to a catch body with the exception bound
    Catch(usize),
    /// Run a finally body, rethrowing afterwards
    Finally(usize),
}

impl Frame {
    /// Find the handler for a throw, popping the regions it leaves
    fn route_throw(&mut self) -> Option<Catch> {
        while let Some(region) = self.try_regions.pop() {
            match region {
                TryRegion::Handler {
                    catch: Some(catch),
                    finally,
                } => {
                    if finally.is_some() {
                        self.try_regions.push(TryRegion::Handler {
                            catch: None,
                            finally,
                        });
                    }
                    return Some(Catch::Catch(catch));
                }
                TryRegion::Handler {
                    catch: None,
                    finally: Some(finally),
                } => return Some(Catch::Finally(finally)),
                TryRegion::Handler { .. } => {}
                TryRegion::FinallyBody { completion_depth } => {
                    self.completions.truncate(completion_depth);
                }
            }
        }
        None
    }

    /// Route a completion through the innermost enclosing finally body.
    /// Returns false when no finally body is left in this frame.
    fn route_completion(&mut self, completion: PendingCompletion, mut depth: Option<u32>) -> bool {
        while depth != Some(0) {
            let Some(region) = self.try_regions.pop() else {
                break;
            };
            if let Some(remaining) = depth.as_mut() {
                *remaining -= 1;
            }
            match region {
                TryRegion::Handler {
                    finally: Some(finally),
                    ..
                } => {
                    let completion = match (completion, depth) {
                        (PendingCompletion::Jump { target, .. }, Some(remaining)) => {
                            PendingCompletion::Jump {
                                target,
                                depth: remaining,
                            }
                        }
                        (completion, _) => completion,
                    };
                    self.enter_finally(finally, completion);
                    return true;
                }
                TryRegion::Handler { .. } => {}
                TryRegion::FinallyBody { completion_depth } => {
                    self.completions.truncate(completion_depth);
                }
            }
        }
        false
    }

    fn enter_finally(&mut self, target: usize, completion: PendingCompletion) {
        let completion_depth = self.completions.len();
        self.completions.push(completion);
        self.try_regions
            .push(TryRegion::FinallyBody { completion_depth });
        self.ip = target;
    }
}

impl VM {
    /// Handle a throw. Returns `Ok(None)` when a handler in the run took
    /// it, or the exception when it escaped the boundary frame.
    pub(crate) fn unwind(&mut self, base: usize, exception: Exception) -> JsResult<Option<FrameExit>> {
        while self.frames.len() > base {
            let route = match self.frames.last_mut() {
                Some(frame) => frame.route_throw(),
                None => None,
            };
            match route {
                Some(Catch::Catch(target)) => {
                    let value = self.exception_value(exception);
                    if let Some(frame) = self.frames.last_mut() {
                        frame.exception = Some(value);
                        frame.ip = target;
                    }
                    return Ok(None);
                }
                Some(Catch::Finally(target)) => {
                    if let Some(frame) = self.frames.last_mut() {
                        frame.enter_finally(target, PendingCompletion::Throw(exception));
                    }
                    return Ok(None);
                }
                None => {
                    self.pop_frame();
                }
            }
        }
        Err(exception)
    }

    /// Return `value` from the top frame, running finally bodies first
    pub(crate) fn do_return(&mut self, base: usize, mut value: Value) -> JsResult<Flow> {
        loop {
            let routed = match self.frames.last_mut() {
                Some(frame) => frame.route_completion(PendingCompletion::Return(value.clone()), None),
                None => return Err(Exception::internal("return without a frame")),
            };
            if routed {
                return Ok(Flow::Continue);
            }

            let Some(frame) = self.pop_frame() else {
                return Err(Exception::internal("return without a frame"));
            };
            value = construct_result(&frame, value)?;
            if self.frames.len() <= base {
                return Ok(Flow::Exit(FrameExit::Return(value)));
            }
            match frame.return_to {
                ReturnTo::Boundary => return Ok(Flow::Exit(FrameExit::Return(value))),
                ReturnTo::Caller { dst } => {
                    self.set_reg(dst, value);
                    return Ok(Flow::Continue);
                }
                ReturnTo::TailReturn => {}
            }
        }
    }

    /// `GotoFinally`: enter a finally body with a normal completion
    pub(crate) fn goto_finally(&mut self, target: usize) -> JsResult<()> {
        let frame = self
            .frames
            .last_mut()
            .ok_or_else(|| Exception::internal("no active frame"))?;
        frame.enter_finally(target, PendingCompletion::Normal);
        Ok(())
    }

    /// `EndFinally`: resume the completion that entered the finally body
    pub(crate) fn end_finally(&mut self, base: usize) -> JsResult<Flow> {
        let frame = self
            .frames
            .last_mut()
            .ok_or_else(|| Exception::internal("no active frame"))?;
        let Some(TryRegion::FinallyBody { completion_depth }) = frame.try_regions.pop() else {
            return Err(Exception::internal("EndFinally outside a finally body"));
        };
        let completion = frame.completions.get(completion_depth).cloned();
        frame.completions.truncate(completion_depth);
        match completion {
            Some(PendingCompletion::Normal) => Ok(Flow::Continue),
            Some(PendingCompletion::Return(value)) => self.do_return(base, value),
            Some(PendingCompletion::Throw(exception)) => Err(exception),
            Some(PendingCompletion::Jump { target, depth }) => self.leave(target, depth),
            None => Err(Exception::internal("finally body without a completion")),
        }
    }

    /// `Leave`: exit `depth` regions, running finally bodies on the way
    pub(crate) fn leave(&mut self, target: usize, depth: u32) -> JsResult<Flow> {
        let frame = self
            .frames
            .last_mut()
            .ok_or_else(|| Exception::internal("no active frame"))?;
        let completion = PendingCompletion::Jump { target, depth };
        if !frame.route_completion(completion, Some(depth)) {
            frame.ip = target;
        }
        Ok(Flow::Continue)
    }

    /// Attach the current call stack to a fault that has none yet
    pub(crate) fn attach_stack(&self, exception: Exception) -> Exception {
        match exception {
            Exception::Error(error) if error.stack.is_empty() => {
                Exception::Error(error.with_stack(self.capture_stack()))
            }
            other => other,
        }
    }

    /// Function names and source positions of the live frames, innermost
    /// first
    pub(crate) fn capture_stack(&self) -> Vec<StackFrame> {
        self.frames
            .iter()
            .rev()
            .map(|frame| {
                let position = frame
                    .template
                    .chunk
                    .position_at(frame.ip.saturating_sub(1))
                    .unwrap_or_default();
                let name = frame.template.name();
                StackFrame {
                    function_name: (!name.is_empty()).then(|| name.to_string()),
                    source_url: None,
                    line: position.line,
                    column: position.column,
                }
            })
            .collect()
    }
}

/// Apply the `[[Construct]]` return rules to a popped frame's result
fn construct_result(frame: &Frame, value: Value) -> JsResult<Value> {
    match frame.construct {
        ConstructKind::None => Ok(value),
        ConstructKind::Base => {
            if value.is_object() {
                Ok(value)
            } else {
                Ok(frame.scope.this_value().unwrap_or(Value::Undefined))
            }
        }
        ConstructKind::Derived => {
            if value.is_object() {
                return Ok(value);
            }
            if !value.is_undefined() {
                return Err(Exception::type_error(
                    "Derived constructors may only return object or undefined",
                ));
            }
            frame.scope.this_value().ok_or_else(|| {
                Exception::reference_error(
                    "Must call super constructor in derived class before accessing 'this' or returning from derived constructor",
                )
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytecode_system::{ChunkBuilder, Opcode};

    #[test]
    fn test_finally_return_overrides_catch_return() {
        // try { throw 1 } catch { return "catch" } finally { return "finally" }
        let mut b = ChunkBuilder::script();
        let r = b.register();
        let catch = b.label();
        let finally = b.label();
        b.emit(Opcode::EnterTry {
            catch_target: Some(catch.target()),
            finally_target: Some(finally.target()),
        });
        b.emit(Opcode::LoadInt { dst: r, value: 1 });
        b.emit(Opcode::Throw { value: r });
        b.bind(catch);
        b.load_string(r, "catch");
        b.emit(Opcode::Return { value: r });
        b.bind(finally);
        b.load_string(r, "finally");
        b.emit(Opcode::Return { value: r });

        let mut vm = VM::new();
        assert_eq!(vm.execute(&b.finish().unwrap()).unwrap(), Value::from("finally"));
    }

    #[test]
    fn test_finally_rethrows_after_running() {
        // try { throw "boom" } finally { ran = true }
        let mut b = ChunkBuilder::script();
        let r = b.register();
        let finally = b.label();
        b.emit(Opcode::EnterTry {
            catch_target: None,
            finally_target: Some(finally.target()),
        });
        b.load_string(r, "boom");
        b.emit(Opcode::Throw { value: r });
        b.bind(finally);
        b.emit(Opcode::LoadBool { dst: r, value: true });
        b.define_global("ran", r);
        b.emit(Opcode::EndFinally);

        let mut vm = VM::new();
        let err = vm.execute(&b.finish().unwrap()).unwrap_err();
        assert_eq!(err.thrown_value(), Some(&Value::from("boom")));
        assert_eq!(vm.get_global("ran"), Some(Value::Boolean(true)));
    }

    #[test]
    fn test_leave_runs_finally_then_jumps() {
        // while (true) { try { break } finally { count = 1 } } return count
        let mut b = ChunkBuilder::script();
        let r = b.register();
        let top = b.label();
        let finally = b.label();
        let exit = b.label();
        b.bind(top);
        b.emit(Opcode::EnterTry {
            catch_target: None,
            finally_target: Some(finally.target()),
        });
        b.emit(Opcode::Leave { target: exit.target(), depth: 1 });
        b.bind(finally);
        b.emit(Opcode::LoadInt { dst: r, value: 1 });
        b.emit(Opcode::EndFinally);
        b.emit(Opcode::Jump { target: top.target() });
        b.bind(exit);
        b.emit(Opcode::Return { value: r });

        let mut vm = VM::new();
        assert_eq!(vm.execute(&b.finish().unwrap()).unwrap(), Value::from(1));
    }

    #[test]
    fn test_faults_carry_stack_positions() {
        let mut b = ChunkBuilder::script();
        let r = b.register();
        b.at(3, 7);
        b.get_global(r, "nope");
        let mut vm = VM::new();
        let err = vm.execute(&b.finish().unwrap()).unwrap_err();
        let stack = vm
            .get_property(err.thrown_value().unwrap(), &"stack".into())
            .unwrap();
        assert!(stack.as_str().unwrap().contains("(3:7)"));
    }
}
