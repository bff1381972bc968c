//! Dispatch loop for bytecode execution
//!
//! Fetch-decode-execute over the register instruction set. The loop runs
//! the VM frame stack from a boundary index upward: bytecode calls push
//! frames and keep looping, returns pop them, and the run ends when the
//! boundary frame returns or a coroutine frame suspends.

use std::rc::Rc;

use bytecode_system::{Constant, MethodKind, Opcode, RegisterId};
use core_types::{ErrorKind, ObjectId, PropertyKey, Value};
use memory_manager::Property;
use rustc_hash::FxHashSet;

use crate::call_frame::{Frame, FunctionTemplate, ReturnTo, TryRegion};
use crate::error::{Exception, JsResult};
use crate::object::ObjectKind;
use crate::property::PropertyDescriptor;
use crate::upvalue::Closure;
use crate::vm::VM;

/// How a dispatch run ended
#[derive(Debug)]
pub(crate) enum FrameExit {
    /// The boundary frame returned
    Return(Value),
    /// A generator frame suspended at `yield` (or inside `yield*`)
    Yield {
        /// Yielded value; for `yield*` the inner result object itself
        value: Value,
        /// The parked frame
        frame: Box<Frame>,
        /// Suspended inside `yield*`
        delegated: bool,
    },
    /// An async frame suspended at `await`
    Await {
        /// Awaited operand
        value: Value,
        /// The parked frame
        frame: Box<Frame>,
    },
    /// A fresh generator finished its parameter prologue
    InitialYield(Box<Frame>),
}

/// Result of one instruction
#[derive(Debug)]
pub(crate) enum Flow {
    /// Keep dispatching
    Continue,
    /// Leave the dispatch run
    Exit(FrameExit),
}

impl VM {
    /// Run frames above `base` until the boundary frame returns or suspends
    pub(crate) fn run_frames(&mut self, base: usize) -> JsResult<FrameExit> {
        self.run_from(base, Ok(Flow::Continue))
    }

    /// Like [`VM::run_frames`], with the outcome of the first step supplied
    /// by the caller (used to inject a throw or return into a resumed frame)
    pub(crate) fn run_from(&mut self, base: usize, first: JsResult<Flow>) -> JsResult<FrameExit> {
        let mut outcome = first;
        loop {
            match outcome {
                Ok(Flow::Continue) => {}
                Ok(Flow::Exit(exit)) => return Ok(exit),
                Err(exception) => {
                    let exception = self.attach_stack(exception);
                    if let Some(exit) = self.unwind(base, exception)? {
                        return Ok(exit);
                    }
                }
            }
            outcome = self.step(base);
        }
    }

    /// Fetch and execute one instruction of the top frame
    fn step(&mut self, base: usize) -> JsResult<Flow> {
        let Some(frame) = self.frames.last_mut() else {
            return Err(Exception::internal("dispatch without a frame"));
        };
        let template = frame.template.clone();
        let ip = frame.ip;
        let Some(opcode) = template.opcode(ip) else {
            // Falling off the end returns undefined
            return self.do_return(base, Value::Undefined);
        };
        frame.ip = ip + 1;
        self.execute_op(base, &template, opcode)
    }

    fn execute_op(&mut self, base: usize, template: &Rc<FunctionTemplate>, opcode: Opcode) -> JsResult<Flow> {
        match opcode {
            Opcode::LoadConst { dst, index } => {
                let value = match template.chunk.constants.get(index as usize) {
                    Some(Constant::Number(n)) => Value::Number(*n),
                    Some(Constant::String(s)) => Value::String(s.clone()),
                    None => return Err(Exception::internal("constant index out of range")),
                };
                self.set_reg(dst, value);
            }
            Opcode::LoadInt { dst, value } => self.set_reg(dst, Value::from(value)),
            Opcode::LoadUndefined { dst } => self.set_reg(dst, Value::Undefined),
            Opcode::LoadNull { dst } => self.set_reg(dst, Value::Null),
            Opcode::LoadBool { dst, value } => self.set_reg(dst, Value::Boolean(value)),
            Opcode::LoadHole { dst } => self.set_reg(dst, Value::Hole),
            Opcode::Move { dst, src } => {
                let value = self.reg(src);
                self.set_reg(dst, value);
            }

            Opcode::Binary { op, dst, lhs, rhs } => {
                let (l, r) = (self.reg(lhs), self.reg(rhs));
                let value = self.binary_op(op, &l, &r)?;
                self.set_reg(dst, value);
            }
            Opcode::Unary { op, dst, src } => {
                let operand = self.reg(src);
                let value = self.unary_op(op, &operand)?;
                self.set_reg(dst, value);
            }

            Opcode::Jump { target } => self.jump(target),
            Opcode::JumpIfTrue { cond, target } => {
                if self.reg(cond).is_truthy() {
                    self.jump(target);
                }
            }
            Opcode::JumpIfFalse { cond, target } => {
                if !self.reg(cond).is_truthy() {
                    self.jump(target);
                }
            }
            Opcode::JumpIfNullish { cond, target } => {
                if self.reg(cond).is_nullish() {
                    self.jump(target);
                }
            }
            Opcode::JumpIfUndefined { cond, target } => {
                if self.reg(cond).is_undefined() {
                    self.jump(target);
                }
            }
            Opcode::JumpIfNotUndefined { cond, target } => {
                if !self.reg(cond).is_undefined() {
                    self.jump(target);
                }
            }

            Opcode::GetGlobal { dst, name } => {
                let name = string_operand(template, name)?;
                let key = PropertyKey::String(name.clone());
                let global = self.intrinsics.global;
                if !self.has_property(global, &key)? {
                    return Err(Exception::reference_error(format!("{} is not defined", name)));
                }
                let value = self.get_with_receiver(global, &key, &Value::Object(global))?;
                self.set_reg(dst, value);
            }
            Opcode::GetGlobalOrUndefined { dst, name } => {
                let key = PropertyKey::String(string_operand(template, name)?);
                let global = self.intrinsics.global;
                let value = self.get_with_receiver(global, &key, &Value::Object(global))?;
                self.set_reg(dst, value);
            }
            Opcode::SetGlobal { name, src } => {
                let name = string_operand(template, name)?;
                let key = PropertyKey::String(name.clone());
                let global = self.intrinsics.global;
                let strict = template.is_strict();
                if strict && !self.has_property(global, &key)? {
                    return Err(Exception::reference_error(format!("{} is not defined", name)));
                }
                let value = self.reg(src);
                self.set_property(&Value::Object(global), key, value, strict)?;
            }
            Opcode::DefineGlobal { name, src } => {
                let key = PropertyKey::String(string_operand(template, name)?);
                let value = self.reg(src);
                self.heap
                    .define(self.intrinsics.global, key, Property::data(value));
            }
            Opcode::GetUpvalue { dst, index } => {
                let value = self.upvalue(index)?.borrow().get();
                self.set_reg(dst, value);
            }
            Opcode::SetUpvalue { index, src } => {
                let value = self.reg(src);
                self.upvalue(index)?.borrow_mut().set(value);
            }
            Opcode::CloseUpvalues { from } => self.top_mut()?.close_upvalues_from(from.index()),
            Opcode::CheckHole { src, name } => {
                if matches!(self.reg(src), Value::Hole) {
                    let name = string_operand(template, name)?;
                    return Err(Exception::reference_error(format!(
                        "Cannot access '{}' before initialization",
                        name
                    )));
                }
            }
            Opcode::ThrowError { kind, message } => {
                let message = string_operand(template, message)?;
                return Err(Exception::new(kind, message.to_string()));
            }

            Opcode::CreateObject { dst } => {
                let object = self.create_object();
                self.set_reg(dst, object);
            }
            Opcode::CreateArray { dst, start, count } => {
                let elements = self.top()?.register_range(start, count);
                let array = self.create_array(elements);
                self.set_reg(dst, array);
            }
            Opcode::ArrayPush { array, value } => {
                let id = self.object_operand(array)?;
                let value = self.reg(value);
                self.array_push(id, value)?;
            }
            Opcode::SpreadIntoArray { array, iterable } => {
                let id = self.object_operand(array)?;
                let iterable = self.reg(iterable);
                for value in self.iterate_to_vec(&iterable)? {
                    self.array_push(id, value)?;
                }
            }
            Opcode::GetNamed {
                dst,
                obj,
                name,
                cache,
            } => {
                let key = PropertyKey::String(string_operand(template, name)?);
                let target = self.reg(obj);
                let value = self.get_named_cached(&target, &key, template, cache)?;
                self.set_reg(dst, value);
            }
            Opcode::SetNamed {
                obj,
                name,
                value,
                cache,
            } => {
                let key = PropertyKey::String(string_operand(template, name)?);
                let (target, value) = (self.reg(obj), self.reg(value));
                self.set_named_cached(&target, key, value, template, cache)?;
            }
            Opcode::GetIndexed { dst, obj, key } => {
                let target = self.reg(obj);
                let key = self.reg(key);
                let value = match fast_index(&key) {
                    Some(index) => match self.array_element(&target, index) {
                        Some(value) => value,
                        None => self.get_property(&target, &PropertyKey::index(index))?,
                    },
                    None => {
                        require_object_coercible(&target, &key)?;
                        let key = self.to_property_key(&key)?;
                        self.get_property(&target, &key)?
                    }
                };
                self.set_reg(dst, value);
            }
            Opcode::SetIndexed { obj, key, value } => {
                let target = self.reg(obj);
                let key = self.reg(key);
                if target.is_nullish() {
                    return Err(Exception::type_error(format!(
                        "Cannot set properties of {} (setting '{}')",
                        target,
                        self.display_value(&key)
                    )));
                }
                let key = self.to_property_key(&key)?;
                let value = self.reg(value);
                self.set_property(&target, key, value, template.is_strict())?;
            }
            Opcode::DeleteNamed { dst, obj, name } => {
                let key = PropertyKey::String(string_operand(template, name)?);
                let target = self.reg(obj);
                let deleted = self.delete_property(&target, &key, template.is_strict())?;
                self.set_reg(dst, Value::Boolean(deleted));
            }
            Opcode::DeleteIndexed { dst, obj, key } => {
                let target = self.reg(obj);
                let key = self.reg(key);
                let key = self.to_property_key(&key)?;
                let deleted = self.delete_property(&target, &key, template.is_strict())?;
                self.set_reg(dst, Value::Boolean(deleted));
            }
            Opcode::DefineField { obj, key, value } => {
                let id = self.object_operand(obj)?;
                let key = self.reg(key);
                let key = self.to_property_key(&key)?;
                let value = self.reg(value);
                if !self.create_data_property(id, key.clone(), value)? {
                    return Err(Exception::type_error(format!(
                        "Cannot define property {}",
                        self.display_key(&key)
                    )));
                }
            }
            Opcode::DefineAccessor {
                obj,
                key,
                getter,
                setter,
            } => {
                let id = self.object_operand(obj)?;
                let key = self.reg(key);
                let key = self.to_property_key(&key)?;
                let (getter, setter) = (self.reg(getter), self.reg(setter));
                let desc = PropertyDescriptor {
                    get: (!getter.is_undefined()).then_some(getter),
                    set: (!setter.is_undefined()).then_some(setter),
                    enumerable: Some(true),
                    configurable: Some(true),
                    ..PropertyDescriptor::default()
                };
                self.define_own_property(id, key, desc)?;
            }
            Opcode::CopyDataProperties { dst, src } => {
                let id = self.object_operand(dst)?;
                let source = self.reg(src);
                self.copy_data_properties(id, &source)?;
            }
            Opcode::EnumerateKeys { dst, obj } => {
                let target = self.reg(obj);
                let keys = self.enumerate_keys(&target)?;
                let array = self.create_array(keys);
                self.set_reg(dst, array);
            }

            Opcode::CreateClosure { dst, function } => {
                let closure = self.capture_closure(template, function)?;
                let value = self.instantiate_closure(closure);
                self.set_reg(dst, value);
            }
            Opcode::Call {
                dst,
                callee,
                this,
                args,
                argc,
            } => {
                let (callee, this) = (self.reg(callee), self.reg(this));
                let args = self.top()?.register_range(args, argc);
                if let Some(value) =
                    self.call_from_bytecode(&callee, &this, &args, ReturnTo::Caller { dst })?
                {
                    self.set_reg(dst, value);
                }
            }
            Opcode::CallSpread {
                dst,
                callee,
                this,
                args,
            } => {
                let (callee, this) = (self.reg(callee), self.reg(this));
                let args = self.reg(args);
                let args = self.array_elements(&args)?;
                if let Some(value) =
                    self.call_from_bytecode(&callee, &this, &args, ReturnTo::Caller { dst })?
                {
                    self.set_reg(dst, value);
                }
            }
            Opcode::TailCall {
                callee,
                this,
                args,
                argc,
            } => {
                let (callee, this) = (self.reg(callee), self.reg(this));
                let args = self.top()?.register_range(args, argc);
                return self.tail_call(base, &callee, &this, &args);
            }
            Opcode::Construct {
                dst,
                callee,
                args,
                argc,
            } => {
                let callee = self.reg(callee);
                let args = self.top()?.register_range(args, argc);
                let value = self.construct(&callee, &args, None)?;
                self.set_reg(dst, value);
            }
            Opcode::ConstructSpread { dst, callee, args } => {
                let callee = self.reg(callee);
                let args = self.reg(args);
                let args = self.array_elements(&args)?;
                let value = self.construct(&callee, &args, None)?;
                self.set_reg(dst, value);
            }
            Opcode::Return { value } => {
                let value = self.reg(value);
                return self.do_return(base, value);
            }
            Opcode::LoadThis { dst } => {
                let this = self.top()?.scope.this_value().ok_or_else(|| {
                    Exception::reference_error(
                        "Must call super constructor in derived class before accessing 'this' or returning from derived constructor",
                    )
                })?;
                self.set_reg(dst, this);
            }
            Opcode::LoadArguments { dst } => {
                let arguments = self.arguments_object()?;
                self.set_reg(dst, arguments);
            }
            Opcode::LoadNewTarget { dst } => {
                let new_target = self.top()?.scope.new_target.clone();
                self.set_reg(dst, new_target);
            }
            Opcode::LoadCallee { dst } => {
                let callee = self
                    .top()?
                    .function
                    .map_or(Value::Undefined, Value::Function);
                self.set_reg(dst, callee);
            }

            Opcode::CreateClass { class, heritage } => {
                let heritage = heritage.map(|r| self.reg(r));
                let class = self.reg(class);
                self.create_class(&class, heritage)?;
            }
            Opcode::DefineMethod {
                target,
                key,
                method,
                kind,
            } => {
                let target = self.object_operand(target)?;
                let key = self.reg(key);
                let key = self.to_property_key(&key)?;
                let method = self.reg(method);
                self.define_method(target, key, method, kind)?;
            }
            Opcode::SetFieldInitializer { class, initializer } => {
                let class = self.object_operand(class)?;
                let initializer = self.object_operand(initializer)?;
                let home_object = match self.kind(class) {
                    Some(ObjectKind::Function(closure)) => closure.home_object,
                    _ => None,
                };
                if let Some(ObjectKind::Function(closure)) = self.heap.kind_mut(initializer) {
                    closure.home_object = home_object;
                }
                if let Some(ObjectKind::Function(closure)) = self.heap.kind_mut(class) {
                    closure.field_initializer = Some(initializer);
                }
            }
            Opcode::SuperCall { dst, args, argc } => {
                let args = self.top()?.register_range(args, argc);
                let this = self.super_call(&args)?;
                self.set_reg(dst, this);
            }
            Opcode::SuperGet { dst, key } => {
                let key = self.reg(key);
                let key = self.to_property_key(&key)?;
                let value = self.super_get(&key)?;
                self.set_reg(dst, value);
            }

            Opcode::Throw { value } => return Err(Exception::Value(self.reg(value))),
            Opcode::EnterTry {
                catch_target,
                finally_target,
            } => {
                self.top_mut()?.try_regions.push(TryRegion::Handler {
                    catch: catch_target.map(|t| t as usize),
                    finally: finally_target.map(|t| t as usize),
                });
            }
            Opcode::ExitTry => {
                self.top_mut()?.try_regions.pop();
            }
            Opcode::GetException { dst } => {
                let exception = self.top()?.exception.clone().unwrap_or(Value::Undefined);
                self.set_reg(dst, exception);
            }
            Opcode::GotoFinally { target } => self.goto_finally(target as usize)?,
            Opcode::EndFinally => return self.end_finally(base),
            Opcode::Leave { target, depth } => return self.leave(target as usize, depth),

            Opcode::InitialYield => {
                let frame = self.suspend_top(base)?;
                return Ok(Flow::Exit(FrameExit::InitialYield(frame)));
            }
            Opcode::Yield { dst, value } => {
                let value = self.reg(value);
                self.top_mut()?.resume_dst = Some(dst);
                let frame = self.suspend_top(base)?;
                return Ok(Flow::Exit(FrameExit::Yield {
                    value,
                    frame,
                    delegated: false,
                }));
            }
            Opcode::YieldStar { dst, iterator } => return self.yield_star(base, dst, iterator),
            Opcode::Await { dst, value } => {
                let value = self.reg(value);
                self.top_mut()?.resume_dst = Some(dst);
                let frame = self.suspend_top(base)?;
                return Ok(Flow::Exit(FrameExit::Await { value, frame }));
            }

            Opcode::GetIterator { dst, iterable } => {
                let iterable = self.reg(iterable);
                let iterator = self.get_iterator(&iterable)?;
                self.set_reg(dst, iterator);
            }
            Opcode::IteratorNext { dst, iterator } => {
                let iterator = self.reg(iterator);
                let result = self.iterator_next(&iterator, None)?;
                self.set_reg(dst, result);
            }
            Opcode::JumpIfDone { result, target } => {
                let result = self.reg(result);
                if self.get_property(&result, &PropertyKey::from("done"))?.is_truthy() {
                    self.jump(target);
                }
            }
            Opcode::IteratorValue { dst, result } => {
                let result = self.reg(result);
                let value = self.get_property(&result, &PropertyKey::from("value"))?;
                self.set_reg(dst, value);
            }
            Opcode::IteratorClose { iterator } => {
                let iterator = self.reg(iterator);
                self.iterator_close(&iterator)?;
            }

            Opcode::Nop => {}
        }
        Ok(Flow::Continue)
    }

    // ---------------------------------------------------------------------
    // Frame access
    // ---------------------------------------------------------------------

    fn top(&self) -> JsResult<&Frame> {
        self.frames
            .last()
            .ok_or_else(|| Exception::internal("no active frame"))
    }

    fn top_mut(&mut self) -> JsResult<&mut Frame> {
        self.frames
            .last_mut()
            .ok_or_else(|| Exception::internal("no active frame"))
    }

    pub(crate) fn reg(&self, register: RegisterId) -> Value {
        self.frames
            .last()
            .map_or(Value::Undefined, |frame| frame.register(register))
    }

    pub(crate) fn set_reg(&self, register: RegisterId, value: Value) {
        if let Some(frame) = self.frames.last() {
            frame.set_register(register, value);
        }
    }

    fn jump(&mut self, target: u32) {
        if let Some(frame) = self.frames.last_mut() {
            frame.ip = target as usize;
        }
    }

    fn upvalue(&self, index: u32) -> JsResult<crate::upvalue::UpvalueHandle> {
        self.top()?
            .upvalues
            .get(index as usize)
            .cloned()
            .ok_or_else(|| Exception::internal("upvalue index out of range"))
    }

    fn object_operand(&self, register: RegisterId) -> JsResult<ObjectId> {
        self.reg(register)
            .as_object()
            .ok_or_else(|| Exception::internal("object operand expected"))
    }

    /// Pop the top frame for parking inside its coroutine
    fn suspend_top(&mut self, base: usize) -> JsResult<Box<Frame>> {
        if self.frames.len() != base + 1 || self.top()?.coroutine.is_none() {
            return Err(Exception::internal("suspension outside a coroutine frame"));
        }
        self.frames
            .pop()
            .map(Box::new)
            .ok_or_else(|| Exception::internal("no active frame"))
    }

    // ---------------------------------------------------------------------
    // Instruction helpers
    // ---------------------------------------------------------------------

    /// Resolve the upvalue descriptors of nested function `index` against
    /// the current frame
    fn capture_closure(&mut self, template: &Rc<FunctionTemplate>, index: u32) -> JsResult<Closure> {
        let nested = template
            .nested
            .get(index as usize)
            .cloned()
            .ok_or_else(|| Exception::internal("function index out of range"))?;
        let frame = self.top_mut()?;
        let mut upvalues = Vec::with_capacity(nested.chunk.info.upvalues.len());
        for descriptor in &nested.chunk.info.upvalues {
            let handle = if descriptor.is_local {
                frame.capture_register(descriptor.index as usize)
            } else {
                frame
                    .upvalues
                    .get(descriptor.index as usize)
                    .cloned()
                    .ok_or_else(|| Exception::internal("upvalue index out of range"))?
            };
            upvalues.push(handle);
        }
        let lexical_scope = nested.kind().is_arrow().then(|| frame.scope.clone());
        let mut closure = Closure::new(nested, upvalues);
        closure.lexical_scope = lexical_scope;
        Ok(closure)
    }

    /// `return f(...)`: replace the current frame when nothing in it is
    /// still pending, otherwise call and return the result
    fn tail_call(&mut self, base: usize, callee: &Value, this: &Value, args: &[Value]) -> JsResult<Flow> {
        let Some(id) = self.inline_callee(callee) else {
            let value = self.call_function(callee, this, args)?;
            return self.do_return(base, value);
        };
        let top = self.top()?;
        if top.can_replace() {
            let return_to = top.return_to;
            let frame = self.prepare_frame(id, this, args, return_to)?;
            self.pop_frame();
            self.push_frame(frame);
        } else {
            self.check_call_depth()?;
            let frame = self.prepare_frame(id, this, args, ReturnTo::TailReturn)?;
            self.push_frame(frame);
        }
        Ok(Flow::Continue)
    }

    /// The `arguments` object of the current frame, created on first use
    fn arguments_object(&mut self) -> JsResult<Value> {
        let frame = self.top()?;
        if let Some(id) = frame.arguments_object {
            return Ok(Value::Object(id));
        }
        let arguments = frame.arguments.clone();
        let id = self.heap.allocate(
            Some(self.intrinsics.object_prototype),
            ObjectKind::Arguments,
        );
        let length = Value::Number(arguments.len() as f64);
        for (index, value) in arguments.into_iter().enumerate() {
            self.heap
                .define(id, PropertyKey::index(index as u32), Property::data(value));
        }
        self.heap.define(id, "length".into(), Property::hidden(length));
        self.top_mut()?.arguments_object = Some(id);
        Ok(Value::Object(id))
    }

    /// Fast path for `array[i]` with an in-bounds integer index
    fn array_element(&self, target: &Value, index: u32) -> Option<Value> {
        match target.as_object().and_then(|id| self.kind(id)) {
            Some(ObjectKind::Array(store)) => store
                .elements
                .get(index as usize)
                .filter(|value| !matches!(value, Value::Hole))
                .cloned(),
            _ => None,
        }
    }

    /// Elements of an argument array built by spread code
    pub(crate) fn array_elements(&self, array: &Value) -> JsResult<Vec<Value>> {
        match array.as_object().and_then(|id| self.kind(id)) {
            Some(ObjectKind::Array(store)) => Ok(store
                .elements
                .iter()
                .map(|value| match value {
                    Value::Hole => Value::Undefined,
                    other => other.clone(),
                })
                .collect()),
            _ => Err(Exception::internal("argument array expected")),
        }
    }

    /// Object spread: copy own enumerable properties of `source`
    pub(crate) fn copy_data_properties(&mut self, target: ObjectId, source: &Value) -> JsResult<()> {
        match source {
            Value::Object(id) | Value::Function(id) => {
                let id = *id;
                for key in self.own_keys(id) {
                    let enumerable = self
                        .get_own_property(id, &key)
                        .is_some_and(|property| property.enumerable);
                    if !enumerable {
                        continue;
                    }
                    let value = self.get_with_receiver(id, &key, source)?;
                    self.create_data_property(target, key, value)?;
                }
            }
            Value::String(s) => {
                for (index, unit) in s.encode_utf16().enumerate() {
                    let value = Value::from(String::from_utf16_lossy(&[unit]));
                    self.create_data_property(target, PropertyKey::index(index as u32), value)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// for-in keys: enumerable string keys along the prototype chain,
    /// shadowed keys reported once
    fn enumerate_keys(&mut self, target: &Value) -> JsResult<Vec<Value>> {
        let mut keys = Vec::new();
        let mut seen: FxHashSet<Rc<str>> = FxHashSet::default();
        let mut current = match target {
            Value::Object(id) | Value::Function(id) => Some(*id),
            Value::String(s) => {
                for index in 0..s.encode_utf16().count() {
                    let key: Rc<str> = Rc::from(index.to_string());
                    seen.insert(key.clone());
                    keys.push(Value::String(key));
                }
                Some(self.intrinsics.string_prototype)
            }
            _ => None,
        };
        let mut steps = 0;
        while let Some(id) = current {
            for key in self.own_keys(id) {
                let PropertyKey::String(name) = key.clone() else {
                    continue;
                };
                if !seen.insert(name.clone()) {
                    continue;
                }
                if self
                    .get_own_property(id, &key)
                    .is_some_and(|property| property.enumerable)
                {
                    keys.push(Value::String(name));
                }
            }
            steps += 1;
            if steps > self.config.max_prototype_chain {
                return Err(Exception::range_error(
                    "Maximum prototype chain length exceeded",
                ));
            }
            current = self.get_prototype_of(id)?;
        }
        Ok(keys)
    }

    /// Turn the constructor in `class` into a class with a prototype object
    fn create_class(&mut self, class: &Value, heritage: Option<Value>) -> JsResult<()> {
        let Some(class_id) = class.as_object() else {
            return Err(Exception::internal("class constructor expected"));
        };
        let (prototype_parent, constructor_parent) = match heritage {
            None => (
                Some(self.intrinsics.object_prototype),
                self.intrinsics.function_prototype,
            ),
            Some(Value::Null) => (None, self.intrinsics.function_prototype),
            Some(parent) => {
                let Some(parent_id) = parent.as_object().filter(|_| self.is_constructor(&parent))
                else {
                    return Err(Exception::type_error(format!(
                        "Class extends value {} is not a constructor or null",
                        self.display_value(&parent)
                    )));
                };
                let parent_prototype = self.get_property(&parent, &PropertyKey::from("prototype"))?;
                let prototype_parent = match parent_prototype {
                    Value::Null => None,
                    Value::Object(id) | Value::Function(id) => Some(id),
                    other => {
                        return Err(Exception::type_error(format!(
                            "Class extends value does not have valid prototype property {}",
                            self.display_value(&other)
                        )))
                    }
                };
                (prototype_parent, parent_id)
            }
        };

        let prototype = self.heap.allocate(prototype_parent, ObjectKind::Ordinary);
        self.heap
            .define(prototype, "constructor".into(), Property::hidden(class.clone()));
        self.heap.define(
            class_id,
            "prototype".into(),
            Property::with_attributes(Value::Object(prototype), false, false, false),
        );
        self.heap.set_prototype(class_id, Some(constructor_parent));
        if let Some(ObjectKind::Function(closure)) = self.heap.kind_mut(class_id) {
            closure.home_object = Some(prototype);
        }
        Ok(())
    }

    /// Install a class or object-literal method and set its home object
    fn define_method(
        &mut self,
        target: ObjectId,
        key: PropertyKey,
        method: Value,
        kind: MethodKind,
    ) -> JsResult<()> {
        if let Some(ObjectKind::Function(closure)) =
            method.as_object().and_then(|id| self.heap.kind_mut(id))
        {
            closure.home_object = Some(target);
        }
        let desc = match kind {
            MethodKind::Method => PropertyDescriptor::data(method, true, false, true),
            MethodKind::Getter => PropertyDescriptor {
                get: Some(method),
                enumerable: Some(false),
                configurable: Some(true),
                ..PropertyDescriptor::default()
            },
            MethodKind::Setter => PropertyDescriptor {
                set: Some(method),
                enumerable: Some(false),
                configurable: Some(true),
                ..PropertyDescriptor::default()
            },
        };
        if !self.define_own_property(target, key.clone(), desc)? {
            return Err(Exception::type_error(format!(
                "Cannot redefine property: {}",
                self.display_key(&key)
            )));
        }
        Ok(())
    }

    /// `super(...args)`: construct the parent with the current
    /// `new.target`, then bind `this` once and run the field initializer
    fn super_call(&mut self, args: &[Value]) -> JsResult<Value> {
        let scope = self.top()?.scope.clone();
        let Some(active) = scope.function else {
            return Err(Exception::new(
                ErrorKind::SyntaxError,
                "'super' keyword unexpected here",
            ));
        };
        let parent = self
            .get_prototype_of(active)?
            .map_or(Value::Null, |id| self.object_value(id));
        if !self.is_constructor(&parent) {
            return Err(Exception::type_error(format!(
                "Super constructor {} of anonymous class is not a constructor",
                self.display_value(&parent)
            )));
        }
        let this = self.construct(&parent, args, Some(&scope.new_target))?;
        if !scope.bind_this(this.clone()) {
            return Err(Exception::reference_error(
                "Super constructor may only be called once",
            ));
        }
        self.run_field_initializer(active, &this)?;
        Ok(this)
    }

    /// `super[key]` with the current `this` as receiver
    fn super_get(&mut self, key: &PropertyKey) -> JsResult<Value> {
        let scope = self.top()?.scope.clone();
        let Some(home) = scope.home_object else {
            return Err(Exception::new(
                ErrorKind::SyntaxError,
                "'super' keyword unexpected here",
            ));
        };
        let this = scope.this_value().ok_or_else(|| {
            Exception::reference_error(
                "Must call super constructor in derived class before accessing 'this' or returning from derived constructor",
            )
        })?;
        match self.get_prototype_of(home)? {
            Some(prototype) => self.get_with_receiver(prototype, key, &this),
            None => Err(Exception::type_error(format!(
                "Cannot read properties of null (reading '{}')",
                self.display_key(key)
            ))),
        }
    }
}

fn string_operand(template: &FunctionTemplate, index: u32) -> JsResult<Rc<str>> {
    template
        .chunk
        .string_constant(index)
        .cloned()
        .ok_or_else(|| Exception::internal("string constant expected"))
}

/// Non-negative integral number usable as an array index
fn fast_index(key: &Value) -> Option<u32> {
    match key {
        Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n < f64::from(u32::MAX) => {
            Some(*n as u32)
        }
        _ => None,
    }
}

fn require_object_coercible(target: &Value, key: &Value) -> JsResult<()> {
    if target.is_nullish() {
        return Err(Exception::type_error(format!(
            "Cannot read properties of {} (reading '{}')",
            target, key
        )));
    }
    Ok(())
}
