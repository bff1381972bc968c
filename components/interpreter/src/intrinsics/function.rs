//! `Function` and `Function.prototype`

use core_types::{ObjectId, PropertyKey, Value};
use memory_manager::Property;

use super::{arg, symbol, Installer};
use crate::error::{Exception, JsResult};
use crate::object::ObjectKind;
use crate::vm::VM;

pub(crate) fn install(installer: &mut Installer<'_>, global: ObjectId) {
    let prototype = installer.function_prototype;
    let constructor = installer.constructor("Function", function_call, function_construct, 1, prototype);
    installer.method(prototype, "call", call, 1);
    installer.method(prototype, "apply", apply, 2);
    installer.method(prototype, "bind", bind, 1);
    installer.method(prototype, "toString", to_string, 0);
    let has_instance = installer.function("[Symbol.hasInstance]", has_instance, 1);
    installer.constant(
        prototype,
        PropertyKey::Symbol(symbol::HAS_INSTANCE),
        Value::Function(has_instance),
    );
    installer.value(global, "Function", Value::Function(constructor));
}

/// `Function.prototype` itself: accepts anything, returns undefined
pub(crate) fn empty(_vm: &mut VM, _this: &Value, _args: &[Value]) -> JsResult<Value> {
    Ok(Value::Undefined)
}

fn function_call(vm: &mut VM, _this: &Value, args: &[Value]) -> JsResult<Value> {
    function_construct(vm, args, &Value::Undefined)
}

/// No source compiler is attached to the engine
fn function_construct(_vm: &mut VM, _args: &[Value], _new_target: &Value) -> JsResult<Value> {
    Err(Exception::type_error(
        "Code generation from strings is not supported",
    ))
}

fn require_callable(vm: &VM, this: &Value, method: &str) -> JsResult<()> {
    if this.is_callable() {
        Ok(())
    } else {
        Err(Exception::type_error(format!(
            "Function.prototype.{} called on {}, which is not a function",
            method,
            vm.display_value(this)
        )))
    }
}

fn call(vm: &mut VM, this: &Value, args: &[Value]) -> JsResult<Value> {
    require_callable(vm, this, "call")?;
    let rest = args.get(1..).unwrap_or(&[]);
    vm.call_function(this, &arg(args, 0), rest)
}

fn apply(vm: &mut VM, this: &Value, args: &[Value]) -> JsResult<Value> {
    require_callable(vm, this, "apply")?;
    let list = match arg(args, 1) {
        Value::Undefined | Value::Null => Vec::new(),
        array_like if array_like.is_object() => create_list_from_array_like(vm, &array_like)?,
        _ => {
            return Err(Exception::type_error(
                "CreateListFromArrayLike called on non-object",
            ))
        }
    };
    vm.call_function(this, &arg(args, 0), &list)
}

fn create_list_from_array_like(vm: &mut VM, array_like: &Value) -> JsResult<Vec<Value>> {
    let length = vm.length_of_array_like(array_like)?;
    (0..length)
        .map(|index| vm.get_property(array_like, &PropertyKey::index(index as u32)))
        .collect()
}

fn bind(vm: &mut VM, this: &Value, args: &[Value]) -> JsResult<Value> {
    require_callable(vm, this, "bind")?;
    let Some(target) = this.as_object() else {
        return Err(Exception::type_error("Bind must be called on a function"));
    };
    let bound_args = args.get(1..).unwrap_or(&[]).to_vec();
    let prototype = vm.get_prototype_of(target)?;

    let target_length = match vm.get_property(this, &"length".into())? {
        Value::Number(n) if n.is_finite() => n.trunc().max(0.0),
        Value::Number(n) if n == f64::INFINITY => n,
        _ => 0.0,
    };
    let length = (target_length - bound_args.len() as f64).max(0.0);
    let name = match vm.get_property(this, &"name".into())? {
        Value::String(name) => name,
        _ => "".into(),
    };

    let id = vm.heap.allocate(
        prototype,
        ObjectKind::Bound {
            target: this.clone(),
            this: arg(args, 0),
            args: bound_args,
        },
    );
    vm.heap.define(
        id,
        "length".into(),
        Property::with_attributes(Value::Number(length), false, false, true),
    );
    vm.heap.define(
        id,
        "name".into(),
        Property::with_attributes(Value::string(format!("bound {}", name)), false, false, true),
    );
    Ok(Value::Function(id))
}

fn to_string(vm: &mut VM, this: &Value, _args: &[Value]) -> JsResult<Value> {
    let Some(id) = this.as_object().filter(|_| this.is_callable()) else {
        return Err(Exception::type_error(
            "Function.prototype.toString requires that 'this' be a Function",
        ));
    };
    let rendered = match vm.kind(id) {
        Some(ObjectKind::Function(closure)) => {
            let name = closure.template.name().to_string();
            let kind = closure.template.kind();
            if kind.is_class_constructor() {
                format!("class {} {{ [bytecode] }}", name)
            } else if kind.is_generator() {
                format!("function* {}() {{ [bytecode] }}", name)
            } else if kind.is_async() {
                format!("async function {}() {{ [bytecode] }}", name)
            } else {
                format!("function {}() {{ [bytecode] }}", name)
            }
        }
        Some(ObjectKind::Native(native)) => format!("function {}() {{ [native code] }}", native.name),
        _ => "function () { [native code] }".to_string(),
    };
    Ok(Value::string(rendered))
}

fn has_instance(vm: &mut VM, this: &Value, args: &[Value]) -> JsResult<Value> {
    let value = arg(args, 0);
    Ok(Value::Boolean(vm.ordinary_has_instance(this, &value)?))
}
