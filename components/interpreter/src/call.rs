//! Calls, construction and closure instantiation
//!
//! Bytecode-to-bytecode calls push a frame and return to the dispatch loop.
//! Everything else (natives, bound functions, proxies, generators, async
//! functions and calls made from native code) goes through
//! [`VM::call_function`], which runs a nested dispatch boundary.

use std::rc::Rc;

use bytecode_system::{FunctionKind, RegisterId};
use core_types::{ObjectId, PropertyKey, Value};
use log::trace;
use memory_manager::Property;

use crate::call_frame::{ConstructKind, Frame, ReturnTo, ThisScope};
use crate::error::{Exception, JsResult};
use crate::object::{NativeCall, ObjectKind};
use crate::upvalue::Closure;
use crate::vm::VM;

impl VM {
    /// `[[Call]]`
    pub fn call_function(&mut self, callee: &Value, this: &Value, args: &[Value]) -> JsResult<Value> {
        let Some(id) = callee.as_object().filter(|_| callee.is_callable()) else {
            return Err(Exception::type_error(format!(
                "{} is not a function",
                self.display_value(callee)
            )));
        };
        match self.kind(id) {
            Some(ObjectKind::Function(closure)) => {
                let kind = closure.template.kind();
                if kind.is_class_constructor() {
                    return Err(Exception::type_error(format!(
                        "Class constructor {} cannot be invoked without 'new'",
                        closure.template.name()
                    )));
                }
                let frame = self.prepare_frame(id, this, args, ReturnTo::Boundary)?;
                if kind.is_generator() {
                    return self.create_generator(id, frame);
                }
                if kind.is_async() {
                    return self.start_async(frame);
                }
                self.run_boundary_frame(frame)
            }
            Some(ObjectKind::Native(native)) => {
                let call = native.call.clone();
                self.with_native_depth(|vm| match call {
                    NativeCall::Static(f) => f(vm, this, args),
                    NativeCall::Internal(f) => f(vm, id, this, args),
                    NativeCall::Host(f) => f(vm, this, args),
                })
            }
            Some(ObjectKind::Bound {
                target,
                this: bound_this,
                args: bound_args,
            }) => {
                let target = target.clone();
                let bound_this = bound_this.clone();
                let mut combined = bound_args.clone();
                combined.extend_from_slice(args);
                self.with_native_depth(|vm| vm.call_function(&target, &bound_this, &combined))
            }
            Some(ObjectKind::Proxy { .. }) => self.proxy_call(id, this, args),
            _ => Err(Exception::type_error(format!(
                "{} is not a function",
                self.display_value(callee)
            ))),
        }
    }

    /// `[[Construct]]`; `new_target` defaults to `callee`
    pub fn construct(
        &mut self,
        callee: &Value,
        args: &[Value],
        new_target: Option<&Value>,
    ) -> JsResult<Value> {
        let new_target = new_target.cloned().unwrap_or_else(|| callee.clone());
        let not_a_constructor = |vm: &VM| {
            Exception::type_error(format!("{} is not a constructor", vm.display_value(callee)))
        };
        let Some(id) = callee.as_object() else {
            return Err(not_a_constructor(self));
        };
        match self.kind(id) {
            Some(ObjectKind::Function(closure)) => {
                let kind = closure.template.kind();
                let home_object = closure.home_object;
                if !kind.is_constructor() {
                    return Err(not_a_constructor(self));
                }
                if kind == FunctionKind::DerivedConstructor {
                    let scope = ThisScope::uninitialized(new_target, Some(id))
                        .with_home_object(home_object);
                    let mut frame = self.frame_with_scope(id, Rc::new(scope), args, ReturnTo::Boundary)?;
                    frame.construct = ConstructKind::Derived;
                    return self.run_boundary_frame(frame);
                }

                let fallback = self.intrinsics.object_prototype;
                let prototype = self.prototype_from_constructor(&new_target, fallback)?;
                let this = Value::Object(self.heap.allocate(Some(prototype), ObjectKind::Ordinary));
                let scope = ThisScope::new(this.clone(), new_target, Some(id))
                    .with_home_object(home_object);
                let mut frame = self.frame_with_scope(id, Rc::new(scope), args, ReturnTo::Boundary)?;
                frame.construct = ConstructKind::Base;
                if kind == FunctionKind::ClassConstructor {
                    self.run_field_initializer(id, &this)?;
                }
                self.run_boundary_frame(frame)
            }
            Some(ObjectKind::Native(native)) => {
                let construct = native.construct;
                match construct {
                    Some(construct) => {
                        self.with_native_depth(|vm| construct(vm, args, &new_target))
                    }
                    None => Err(not_a_constructor(self)),
                }
            }
            Some(ObjectKind::Bound {
                target,
                args: bound_args,
                ..
            }) => {
                let target = target.clone();
                let mut combined = bound_args.clone();
                combined.extend_from_slice(args);
                let new_target = if new_target == *callee {
                    target.clone()
                } else {
                    new_target
                };
                self.with_native_depth(|vm| vm.construct(&target, &combined, Some(&new_target)))
            }
            Some(ObjectKind::Proxy { .. }) => self.proxy_construct(id, args, &new_target),
            _ => Err(not_a_constructor(self)),
        }
    }

    /// IsConstructor
    pub fn is_constructor(&self, value: &Value) -> bool {
        match value.as_object().and_then(|id| self.kind(id)) {
            Some(ObjectKind::Function(closure)) => closure.template.kind().is_constructor(),
            Some(ObjectKind::Native(native)) => native.construct.is_some(),
            Some(ObjectKind::Bound { target, .. }) | Some(ObjectKind::Proxy { target, .. }) => {
                self.is_constructor(target)
            }
            _ => false,
        }
    }

    /// GetPrototypeFromConstructor
    pub(crate) fn prototype_from_constructor(
        &mut self,
        new_target: &Value,
        fallback: ObjectId,
    ) -> JsResult<ObjectId> {
        let prototype = self.get_property(new_target, &PropertyKey::from("prototype"))?;
        Ok(prototype.as_object().unwrap_or(fallback))
    }

    /// Call from a `Call` instruction. Plain bytecode closures get a frame
    /// pushed on the VM stack and `None` is returned; anything else runs
    /// to completion and its result is returned.
    pub(crate) fn call_from_bytecode(
        &mut self,
        callee: &Value,
        this: &Value,
        args: &[Value],
        return_to: ReturnTo,
    ) -> JsResult<Option<Value>> {
        if let Some(id) = self.inline_callee(callee) {
            self.check_call_depth()?;
            let frame = self.prepare_frame(id, this, args, return_to)?;
            self.push_frame(frame);
            return Ok(None);
        }
        self.call_function(callee, this, args).map(Some)
    }

    /// The closure id if `callee` can run as a frame of the current
    /// dispatch loop
    pub(crate) fn inline_callee(&self, callee: &Value) -> Option<ObjectId> {
        let id = callee.as_object().filter(|_| callee.is_callable())?;
        match self.kind(id) {
            Some(ObjectKind::Function(closure)) => {
                let kind = closure.template.kind();
                let inline = !kind.is_generator() && !kind.is_async() && !kind.is_class_constructor();
                inline.then_some(id)
            }
            _ => None,
        }
    }

    /// Frame for a plain call of closure `function`
    pub(crate) fn prepare_frame(
        &mut self,
        function: ObjectId,
        this: &Value,
        args: &[Value],
        return_to: ReturnTo,
    ) -> JsResult<Frame> {
        let Some(ObjectKind::Function(closure)) = self.kind(function) else {
            return Err(Exception::internal("closure expected"));
        };
        let scope = if closure.template.kind().is_arrow() {
            match &closure.lexical_scope {
                Some(scope) => scope.clone(),
                None => Rc::new(ThisScope::new(Value::Undefined, Value::Undefined, None)),
            }
        } else {
            let this = if !closure.template.is_strict() && this.is_nullish() {
                Value::Object(self.intrinsics.global)
            } else {
                this.clone()
            };
            Rc::new(
                ThisScope::new(this, Value::Undefined, Some(function))
                    .with_home_object(closure.home_object),
            )
        };
        self.frame_with_scope(function, scope, args, return_to)
    }

    /// Frame for closure `function` running under `scope`, with parameters
    /// and the rest array bound
    fn frame_with_scope(
        &mut self,
        function: ObjectId,
        scope: Rc<ThisScope>,
        args: &[Value],
        return_to: ReturnTo,
    ) -> JsResult<Frame> {
        let Some(ObjectKind::Function(closure)) = self.kind(function) else {
            return Err(Exception::internal("closure expected"));
        };
        let template = closure.template.clone();
        let upvalues = closure.upvalues.clone();

        let info = &template.chunk.info;
        let param_count = info.param_count as usize;
        let has_rest = info.has_rest;

        let mut frame = Frame::new(template.clone(), scope, return_to);
        frame.function = Some(function);
        frame.upvalues = upvalues;
        frame.arguments = args.to_vec();
        for (index, arg) in args.iter().take(param_count).enumerate() {
            frame.set_register(RegisterId(index as u32), arg.clone());
        }
        if has_rest {
            let rest = args.get(param_count..).unwrap_or_default().to_vec();
            let array = self.create_array(rest);
            frame.set_register(RegisterId(param_count as u32), array);
        }
        Ok(frame)
    }

    /// Push a frame on the VM stack
    pub(crate) fn push_frame(&mut self, frame: Frame) {
        trace!(
            "push frame '{}' (depth {})",
            frame.template.name(),
            self.frames.len() + 1
        );
        self.frames.push(frame);
    }

    /// Pop the top frame, closing its open upvalues first
    pub(crate) fn pop_frame(&mut self) -> Option<Frame> {
        let mut frame = self.frames.pop()?;
        frame.close_all_upvalues();
        trace!(
            "pop frame '{}' (depth {})",
            frame.template.name(),
            self.frames.len()
        );
        Some(frame)
    }

    /// Allocate the function object for `closure`
    pub(crate) fn instantiate_closure(&mut self, closure: Closure) -> Value {
        let kind = closure.template.kind();
        let name = Value::string(closure.template.name());
        let length = Value::Number(f64::from(closure.template.chunk.info.param_count));
        let id = self.heap.allocate(
            Some(self.intrinsics.function_prototype),
            ObjectKind::Function(closure),
        );
        self.heap.define(
            id,
            "length".into(),
            Property::with_attributes(length, false, false, true),
        );
        self.heap.define(
            id,
            "name".into(),
            Property::with_attributes(name, false, false, true),
        );

        let prototype = match kind {
            FunctionKind::Normal => {
                let prototype = self.new_ordinary();
                self.heap.define(
                    prototype,
                    "constructor".into(),
                    Property::hidden(Value::Function(id)),
                );
                Some(prototype)
            }
            FunctionKind::Generator => Some(self.heap.allocate(
                Some(self.intrinsics.generator_prototype),
                ObjectKind::Ordinary,
            )),
            _ => None,
        };
        if let Some(prototype) = prototype {
            self.heap.define(
                id,
                "prototype".into(),
                Property::with_attributes(Value::Object(prototype), true, false, false),
            );
        }
        Value::Function(id)
    }

    /// Run the instance field initializer of class constructor `class`
    /// against `this`
    pub(crate) fn run_field_initializer(&mut self, class: ObjectId, this: &Value) -> JsResult<()> {
        let initializer = match self.kind(class) {
            Some(ObjectKind::Function(closure)) => closure.field_initializer,
            _ => None,
        };
        if let Some(initializer) = initializer {
            self.call_function(&Value::Function(initializer), this, &[])?;
        }
        Ok(())
    }

    /// `value[key](...args)`
    pub(crate) fn invoke_method(
        &mut self,
        value: &Value,
        key: &PropertyKey,
        args: &[Value],
    ) -> JsResult<Value> {
        let method = self.get_property(value, key)?;
        self.call_function(&method, value, args)
    }
}
