//! `Error` and its native subtypes

use core_types::{ErrorKind, JsError, ObjectId, PropertyKey, Value};
use memory_manager::Property;

use super::{arg, Installer};
use crate::error::{Exception, JsResult};
use crate::object::{NativeConstructorFn, NativeFn, ObjectKind};
use crate::vm::VM;

/// Prototypes created by [`install`]
pub(crate) struct ErrorPrototypes {
    pub error: ObjectId,
    pub type_error: ObjectId,
    pub reference_error: ObjectId,
    pub range_error: ObjectId,
    pub syntax_error: ObjectId,
    pub aggregate_error: ObjectId,
}

macro_rules! native_error {
    ($call:ident, $construct:ident, $kind:expr) => {
        fn $call(vm: &mut VM, _this: &Value, args: &[Value]) -> JsResult<Value> {
            construct_error(vm, $kind, args, &Value::Undefined)
        }

        fn $construct(vm: &mut VM, args: &[Value], new_target: &Value) -> JsResult<Value> {
            construct_error(vm, $kind, args, new_target)
        }
    };
}

native_error!(error_call, error_construct, ErrorKind::Error);
native_error!(type_error_call, type_error_construct, ErrorKind::TypeError);
native_error!(reference_error_call, reference_error_construct, ErrorKind::ReferenceError);
native_error!(range_error_call, range_error_construct, ErrorKind::RangeError);
native_error!(syntax_error_call, syntax_error_construct, ErrorKind::SyntaxError);
native_error!(aggregate_error_call, aggregate_error_construct, ErrorKind::AggregateError);

pub(crate) fn install(
    installer: &mut Installer<'_>,
    global: ObjectId,
    object_prototype: ObjectId,
) -> ErrorPrototypes {
    let error = installer.object(Some(object_prototype));
    let constructor = installer.constructor("Error", error_call, error_construct, 1, error);
    installer.value(error, "name", Value::from("Error"));
    installer.value(error, "message", Value::from(""));
    installer.method(error, "toString", to_string, 0);
    installer.value(global, "Error", Value::Function(constructor));

    let mut subtype = |name: &str, call: NativeFn, construct: NativeConstructorFn, arity: u32| {
        let prototype = installer.object(Some(error));
        let function = installer.constructor(name, call, construct, arity, prototype);
        installer.heap.set_prototype(function, Some(constructor));
        installer.value(prototype, "name", Value::from(name));
        installer.value(prototype, "message", Value::from(""));
        installer.value(global, name, Value::Function(function));
        prototype
    };

    ErrorPrototypes {
        error,
        type_error: subtype("TypeError", type_error_call, type_error_construct, 1),
        reference_error: subtype("ReferenceError", reference_error_call, reference_error_construct, 1),
        range_error: subtype("RangeError", range_error_call, range_error_construct, 1),
        syntax_error: subtype("SyntaxError", syntax_error_call, syntax_error_construct, 1),
        aggregate_error: subtype("AggregateError", aggregate_error_call, aggregate_error_construct, 2),
    }
}

/// Shared body of every error constructor
///
/// `AggregateError` takes the iterable of errors first, so its message
/// and options shift by one.
fn construct_error(vm: &mut VM, kind: ErrorKind, args: &[Value], new_target: &Value) -> JsResult<Value> {
    let fallback = vm.intrinsics.error_prototype(kind);
    let prototype = if new_target.is_undefined() {
        fallback
    } else {
        vm.prototype_from_constructor(new_target, fallback)?
    };
    let id = vm.heap.allocate(Some(prototype), ObjectKind::Error);
    let offset = usize::from(kind == ErrorKind::AggregateError);

    let message = match arg(args, offset) {
        Value::Undefined => None,
        value => Some(vm.to_string(&value)?),
    };
    if let Some(message) = &message {
        vm.heap
            .define(id, "message".into(), Property::hidden(Value::String(message.clone())));
    }

    let options = arg(args, offset + 1);
    if let Some(options_id) = options.as_object() {
        let cause = PropertyKey::from("cause");
        if vm.has_property(options_id, &cause)? {
            let value = vm.get_property(&options, &cause)?;
            vm.heap.define(id, cause, Property::hidden(value));
        }
    }

    if kind == ErrorKind::AggregateError {
        let errors = vm.iterate_to_vec(&arg(args, 0))?;
        let errors = vm.create_array(errors);
        vm.heap.define(id, "errors".into(), Property::hidden(errors));
    }

    let stack = JsError::new(kind, message.as_deref().unwrap_or(""))
        .with_stack(vm.capture_stack())
        .stack_trace();
    vm.heap
        .define(id, "stack".into(), Property::hidden(Value::string(stack)));
    Ok(Value::Object(id))
}

/// `Error.prototype.toString`
fn to_string(vm: &mut VM, this: &Value, _args: &[Value]) -> JsResult<Value> {
    if !this.is_object() {
        return Err(Exception::type_error(format!(
            "Error.prototype.toString requires that 'this' be an Object, got {}",
            vm.display_value(this)
        )));
    }
    let name = match vm.get_property(this, &"name".into())? {
        Value::Undefined => "Error".into(),
        value => vm.to_string(&value)?,
    };
    let message = match vm.get_property(this, &"message".into())? {
        Value::Undefined => "".into(),
        value => vm.to_string(&value)?,
    };
    let rendered = match (name.is_empty(), message.is_empty()) {
        (_, true) => name.to_string(),
        (true, false) => message.to_string(),
        (false, false) => format!("{}: {}", name, message),
    };
    Ok(Value::string(rendered))
}
