//! `Array` and `Array.prototype`

use core_types::{ObjectId, PropertyKey, Value};
use memory_manager::Property;

use super::{arg, symbol, Installer};
use crate::error::{Exception, JsResult};
use crate::object::{ArrayStore, ObjectKind};
use crate::property::MAX_ARRAY_LENGTH;
use crate::vm::VM;

pub(crate) fn install(installer: &mut Installer<'_>, global: ObjectId, prototype: ObjectId) {
    let constructor = installer.constructor("Array", array_call, array_construct, 1, prototype);
    installer.method(constructor, "isArray", is_array, 1);

    installer.method(prototype, "push", push, 1);
    installer.method(prototype, "join", join, 1);
    installer.method(prototype, "toString", to_string, 0);
    let values = installer.method(prototype, "values", values, 0);
    installer.heap.define(
        prototype,
        PropertyKey::Symbol(symbol::ITERATOR),
        Property::hidden(Value::Function(values)),
    );
    installer.value(global, "Array", Value::Function(constructor));
}

fn array_call(vm: &mut VM, _this: &Value, args: &[Value]) -> JsResult<Value> {
    array_construct(vm, args, &Value::Undefined)
}

/// `new Array(len)` makes `len` holes; any other argument list becomes
/// the elements
fn array_construct(vm: &mut VM, args: &[Value], new_target: &Value) -> JsResult<Value> {
    let fallback = vm.intrinsics.array_prototype;
    let prototype = if new_target.is_undefined() {
        fallback
    } else {
        vm.prototype_from_constructor(new_target, fallback)?
    };
    let elements = match args {
        [Value::Number(n)] => {
            if n.fract() != 0.0 || *n < 0.0 || *n > f64::from(MAX_ARRAY_LENGTH) {
                return Err(Exception::range_error("Invalid array length"));
            }
            vec![Value::Hole; *n as usize]
        }
        _ => args.to_vec(),
    };
    Ok(Value::Object(vm.heap.allocate(
        Some(prototype),
        ObjectKind::Array(ArrayStore::new(elements)),
    )))
}

fn is_array(vm: &mut VM, _this: &Value, args: &[Value]) -> JsResult<Value> {
    Ok(Value::Boolean(vm.is_array(&arg(args, 0))))
}

fn this_object(vm: &VM, this: &Value, method: &str) -> JsResult<ObjectId> {
    this.as_object().ok_or_else(|| {
        Exception::type_error(format!(
            "Array.prototype.{} called on {}",
            method,
            vm.display_value(this)
        ))
    })
}

fn push(vm: &mut VM, this: &Value, args: &[Value]) -> JsResult<Value> {
    let id = this_object(vm, this, "push")?;
    if matches!(vm.kind(id), Some(ObjectKind::Array(_))) {
        for value in args {
            vm.array_push(id, value.clone())?;
        }
        return vm.get_property(this, &"length".into());
    }
    let mut length = vm.length_of_array_like(this)?;
    for value in args {
        vm.set_property(this, PropertyKey::index(length as u32), value.clone(), true)?;
        length += 1;
    }
    let length = Value::Number(length as f64);
    vm.set_property(this, "length".into(), length.clone(), true)?;
    Ok(length)
}

fn join(vm: &mut VM, this: &Value, args: &[Value]) -> JsResult<Value> {
    if this.is_nullish() {
        return Err(Exception::type_error(format!(
            "Array.prototype.join called on {}",
            this
        )));
    }
    let separator = match arg(args, 0) {
        Value::Undefined => ",".into(),
        value => vm.to_string(&value)?,
    };
    let length = vm.length_of_array_like(this)?;
    let mut out = String::new();
    for index in 0..length {
        if index > 0 {
            out.push_str(&separator);
        }
        let element = vm.get_property(this, &PropertyKey::index(index as u32))?;
        if !element.is_nullish() {
            out.push_str(&vm.to_string(&element)?);
        }
    }
    Ok(Value::string(out))
}

fn to_string(vm: &mut VM, this: &Value, _args: &[Value]) -> JsResult<Value> {
    let join = vm.get_property(this, &"join".into())?;
    if join.is_callable() {
        return vm.call_function(&join, this, &[]);
    }
    super::object::to_string(vm, this, &[])
}

/// `values` and `[Symbol.iterator]`
fn values(vm: &mut VM, this: &Value, _args: &[Value]) -> JsResult<Value> {
    if this.is_nullish() {
        return Err(Exception::type_error(format!(
            "Array.prototype.values called on {}",
            this
        )));
    }
    Ok(vm.create_array_iterator(this.clone()))
}
