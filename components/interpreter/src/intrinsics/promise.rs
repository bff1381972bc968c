//! `Promise` and `Promise.prototype`

use async_runtime::{CombinatorKind, Settlement};
use core_types::{ObjectId, PropertyKey, Value};

use super::{arg, Installer};
use crate::error::{Exception, JsResult};
use crate::object::{Handler, NativeData, NativeFunction, ObjectKind, ReactionPair};
use crate::vm::VM;

pub(crate) fn install(installer: &mut Installer<'_>, global: ObjectId, prototype: ObjectId) {
    let constructor = installer.constructor("Promise", promise_call, promise_construct, 1, prototype);
    installer.method(constructor, "resolve", resolve, 1);
    installer.method(constructor, "reject", reject, 1);
    installer.method(constructor, "all", all, 1);
    installer.method(constructor, "allSettled", all_settled, 1);
    installer.method(constructor, "any", any, 1);
    installer.method(constructor, "race", race, 1);

    installer.method(prototype, "then", then, 2);
    installer.method(prototype, "catch", catch, 1);
    installer.method(prototype, "finally", finally, 1);
    installer.to_string_tag(prototype, "Promise");
    installer.value(global, "Promise", Value::Function(constructor));
}

fn promise_call(_vm: &mut VM, _this: &Value, _args: &[Value]) -> JsResult<Value> {
    Err(Exception::type_error(
        "Promise constructor cannot be invoked without 'new'",
    ))
}

/// `new Promise(executor)`; a throwing executor rejects the promise
fn promise_construct(vm: &mut VM, args: &[Value], new_target: &Value) -> JsResult<Value> {
    let executor = arg(args, 0);
    if !executor.is_callable() {
        return Err(Exception::type_error(format!(
            "Promise resolver {} is not a function",
            vm.display_value(&executor)
        )));
    }
    let fallback = vm.intrinsics.promise_prototype;
    let prototype = vm.prototype_from_constructor(new_target, fallback)?;
    let promise = vm.new_promise_with_prototype(prototype);
    let (resolve, reject) = vm.create_resolving_functions(promise);
    if let Err(exception) = vm.call_function(&executor, &Value::Undefined, &[resolve, reject.clone()]) {
        let reason = vm.exception_value(exception);
        vm.call_function(&reject, &Value::Undefined, &[reason])?;
    }
    Ok(Value::Object(promise))
}

fn this_promise(vm: &VM, this: &Value, method: &str) -> JsResult<ObjectId> {
    this.as_object()
        .filter(|id| matches!(vm.kind(*id), Some(ObjectKind::Promise(_))))
        .ok_or_else(|| {
            Exception::type_error(format!(
                "Method Promise.prototype.{} called on incompatible receiver {}",
                method,
                vm.display_value(this)
            ))
        })
}

/// `Promise.prototype.then`; the derived promise is always a plain
/// `%Promise%`
fn then(vm: &mut VM, this: &Value, args: &[Value]) -> JsResult<Value> {
    let promise = this_promise(vm, this, "then")?;
    let derived = vm.new_promise_object();
    let on_fulfilled = match arg(args, 0) {
        f if f.is_callable() => Handler::Callable(f),
        _ => Handler::Identity,
    };
    let on_rejected = match arg(args, 1) {
        f if f.is_callable() => Handler::Callable(f),
        _ => Handler::Thrower,
    };
    vm.perform_then(
        promise,
        ReactionPair {
            capability: Some(derived),
            on_fulfilled,
            on_rejected,
        },
    )?;
    Ok(Value::Object(derived))
}

fn catch(vm: &mut VM, this: &Value, args: &[Value]) -> JsResult<Value> {
    vm.invoke_method(this, &PropertyKey::from("then"), &[Value::Undefined, arg(args, 0)])
}

/// `Promise.prototype.finally`: run the callback, then pass the original
/// settlement through unless the callback throws or rejects
fn finally(vm: &mut VM, this: &Value, args: &[Value]) -> JsResult<Value> {
    if !this.is_object() {
        return Err(Exception::type_error(format!(
            "Method Promise.prototype.finally called on incompatible receiver {}",
            vm.display_value(this)
        )));
    }
    let on_finally = arg(args, 0);
    let then_key = PropertyKey::from("then");
    if !on_finally.is_callable() {
        return vm.invoke_method(this, &then_key, &[on_finally.clone(), on_finally]);
    }
    let steps = [false, true].map(|rejected| {
        let data = NativeData::Finally {
            on_finally: on_finally.clone(),
            rejected,
        };
        vm.new_native_function(NativeFunction::internal("", finally_step, data), 1)
    });
    vm.invoke_method(this, &then_key, &steps)
}

fn finally_step(vm: &mut VM, own: ObjectId, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let NativeData::Finally { on_finally, rejected } = vm.native_data(own)? else {
        return Err(Exception::internal("finally step without state"));
    };
    let result = vm.call_function(&on_finally, &Value::Undefined, &[])?;
    let promise = vm.promise_resolve(&result)?;
    let data = NativeData::ValueThunk {
        value: arg(args, 0),
        throw: rejected,
    };
    let thunk = vm.new_native_function(NativeFunction::internal("", value_thunk, data), 0);
    vm.invoke_method(&Value::Object(promise), &PropertyKey::from("then"), &[thunk])
}

fn value_thunk(vm: &mut VM, own: ObjectId, _this: &Value, _args: &[Value]) -> JsResult<Value> {
    match vm.native_data(own)? {
        NativeData::ValueThunk { value, throw: false } => Ok(value),
        NativeData::ValueThunk { value, throw: true } => Err(Exception::Value(value)),
        _ => Err(Exception::internal("value thunk without state")),
    }
}

fn resolve(vm: &mut VM, _this: &Value, args: &[Value]) -> JsResult<Value> {
    vm.promise_resolve(&arg(args, 0)).map(Value::Object)
}

fn reject(vm: &mut VM, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let promise = vm.new_promise_object();
    vm.settle_promise(promise, Settlement::Rejected, arg(args, 0))?;
    Ok(Value::Object(promise))
}

fn all(vm: &mut VM, _this: &Value, args: &[Value]) -> JsResult<Value> {
    vm.promise_combinator(CombinatorKind::All, &arg(args, 0))
}

fn all_settled(vm: &mut VM, _this: &Value, args: &[Value]) -> JsResult<Value> {
    vm.promise_combinator(CombinatorKind::AllSettled, &arg(args, 0))
}

fn any(vm: &mut VM, _this: &Value, args: &[Value]) -> JsResult<Value> {
    vm.promise_combinator(CombinatorKind::Any, &arg(args, 0))
}

fn race(vm: &mut VM, _this: &Value, args: &[Value]) -> JsResult<Value> {
    vm.promise_race(&arg(args, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_runtime::PromiseState;

    fn settled(vm: &VM, promise: &Value) -> Option<(Settlement, Value)> {
        match vm.promise_state(promise)? {
            PromiseState::Pending => None,
            PromiseState::Fulfilled(value) => Some((Settlement::Fulfilled, value)),
            PromiseState::Rejected(reason) => Some((Settlement::Rejected, reason)),
        }
    }

    #[test]
    fn test_executor_throw_rejects() {
        let mut vm = VM::new();
        let executor = vm.register_host_function("executor", 2, |_, _, _| {
            Err(Exception::Value(Value::from("boom")))
        });
        let constructor = vm.get_global("Promise").unwrap();
        let promise = vm.construct(&constructor, &[executor], None).unwrap();
        assert_eq!(
            settled(&vm, &promise),
            Some((Settlement::Rejected, Value::from("boom")))
        );
    }

    #[test]
    fn test_call_without_new_is_type_error() {
        let mut vm = VM::new();
        assert!(promise_call(&mut vm, &Value::Undefined, &[]).is_err());
    }

    #[test]
    fn test_then_without_handlers_passes_value_through() {
        let mut vm = VM::new();
        let source = resolve(&mut vm, &Value::Undefined, &[Value::from(5)]).unwrap();
        let derived = then(&mut vm, &source, &[]).unwrap();
        assert_eq!(settled(&vm, &derived), None);
        vm.run_microtasks().unwrap();
        assert_eq!(settled(&vm, &derived), Some((Settlement::Fulfilled, Value::from(5))));
    }

    #[test]
    fn test_finally_keeps_rejection_reason() {
        let mut vm = VM::new();
        let callback = vm.register_host_function("cleanup", 0, |_, _, _| Ok(Value::from("ignored")));
        let source = reject(&mut vm, &Value::Undefined, &[Value::from("reason")]).unwrap();
        let derived = finally(&mut vm, &source, &[callback]).unwrap();
        let _ = catch(&mut vm, &derived, &[]).unwrap();
        vm.run_microtasks().unwrap();
        assert_eq!(settled(&vm, &derived), Some((Settlement::Rejected, Value::from("reason"))));
    }

    #[test]
    fn test_resolve_returns_existing_promise() {
        let mut vm = VM::new();
        let promise = vm.new_promise();
        let same = resolve(&mut vm, &Value::Undefined, &[promise.clone()]).unwrap();
        assert_eq!(same, promise);
    }

    #[test]
    fn test_then_on_non_promise_is_type_error() {
        let mut vm = VM::new();
        let object = vm.create_object();
        let err = then(&mut vm, &object, &[]).unwrap_err();
        assert!(err.as_error().unwrap().message.contains("incompatible receiver"));
    }
}
