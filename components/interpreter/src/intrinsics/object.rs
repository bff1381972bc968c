//! `Object` and `Object.prototype`

use core_types::{ObjectId, PropertyKey, Value};
use memory_manager::Property;

use super::{arg, symbol, Installer};
use crate::error::{Exception, JsResult};
use crate::object::ObjectKind;
use crate::property::PropertyDescriptor;
use crate::vm::VM;

pub(crate) fn install(installer: &mut Installer<'_>, global: ObjectId, prototype: ObjectId) {
    let constructor = installer.constructor("Object", object_call, object_construct, 1, prototype);
    installer.method(constructor, "keys", keys, 1);
    installer.method(constructor, "getPrototypeOf", get_prototype_of, 1);
    installer.method(constructor, "setPrototypeOf", set_prototype_of, 2);
    installer.method(constructor, "defineProperty", define_property, 3);
    installer.method(constructor, "getOwnPropertyDescriptor", get_own_property_descriptor, 2);
    installer.method(constructor, "getOwnPropertyNames", get_own_property_names, 1);
    installer.method(constructor, "create", create, 2);
    installer.method(constructor, "freeze", freeze, 1);
    installer.method(constructor, "isFrozen", is_frozen, 1);

    installer.method(prototype, "hasOwnProperty", has_own_property, 1);
    installer.method(prototype, "isPrototypeOf", is_prototype_of, 1);
    installer.method(prototype, "propertyIsEnumerable", property_is_enumerable, 1);
    installer.method(prototype, "toString", to_string, 0);
    installer.method(prototype, "valueOf", value_of, 0);
    installer.value(global, "Object", Value::Function(constructor));
}

fn object_call(vm: &mut VM, _this: &Value, args: &[Value]) -> JsResult<Value> {
    object_construct(vm, args, &Value::Undefined)
}

/// Objects pass through; anything else yields a fresh plain object
fn object_construct(vm: &mut VM, args: &[Value], new_target: &Value) -> JsResult<Value> {
    let value = arg(args, 0);
    if value.is_object() {
        return Ok(value);
    }
    let fallback = vm.intrinsics.object_prototype;
    let prototype = if new_target.is_undefined() {
        fallback
    } else {
        vm.prototype_from_constructor(new_target, fallback)?
    };
    Ok(Value::Object(vm.heap.allocate(Some(prototype), ObjectKind::Ordinary)))
}

/// `RequireObjectCoercible` for the `Object.*` statics
fn require_coercible(value: &Value) -> JsResult<()> {
    if value.is_nullish() {
        return Err(Exception::type_error("Cannot convert undefined or null to object"));
    }
    Ok(())
}

/// Own keys of any value; primitives other than strings have none
fn own_keys_of(vm: &mut VM, value: &Value) -> JsResult<Vec<PropertyKey>> {
    require_coercible(value)?;
    Ok(match value {
        Value::Object(id) | Value::Function(id) => vm.own_keys(*id),
        Value::String(s) => (0..s.chars().count() as u32)
            .map(PropertyKey::index)
            .chain(std::iter::once(PropertyKey::from("length")))
            .collect(),
        _ => Vec::new(),
    })
}

fn keys(vm: &mut VM, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let target = arg(args, 0);
    let mut names = Vec::new();
    for key in own_keys_of(vm, &target)? {
        if key.is_symbol() {
            continue;
        }
        let enumerable = match target.as_object() {
            Some(id) => vm.get_own_property(id, &key).is_some_and(|p| p.enumerable),
            // string indices are enumerable, `length` is not
            None => key.as_array_index().is_some(),
        };
        if enumerable {
            names.push(key.to_value());
        }
    }
    Ok(vm.create_array(names))
}

fn get_own_property_names(vm: &mut VM, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let names = own_keys_of(vm, &arg(args, 0))?
        .into_iter()
        .filter(|key| !key.is_symbol())
        .map(|key| key.to_value())
        .collect();
    Ok(vm.create_array(names))
}

fn get_prototype_of(vm: &mut VM, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let target = arg(args, 0);
    require_coercible(&target)?;
    let prototype = match &target {
        Value::Object(id) | Value::Function(id) => vm.get_prototype_of(*id)?,
        Value::String(_) => Some(vm.intrinsics.string_prototype),
        Value::Number(_) => Some(vm.intrinsics.number_prototype),
        Value::Boolean(_) => Some(vm.intrinsics.boolean_prototype),
        Value::Symbol(_) => Some(vm.intrinsics.symbol_prototype),
        _ => None,
    };
    Ok(prototype.map_or(Value::Null, |id| vm.object_value(id)))
}

fn prototype_argument(vm: &VM, value: &Value) -> JsResult<Option<ObjectId>> {
    match value {
        Value::Null => Ok(None),
        Value::Object(id) | Value::Function(id) => Ok(Some(*id)),
        other => Err(Exception::type_error(format!(
            "Object prototype may only be an Object or null: {}",
            vm.display_value(other)
        ))),
    }
}

fn set_prototype_of(vm: &mut VM, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let target = arg(args, 0);
    require_coercible(&target)?;
    let prototype = prototype_argument(vm, &arg(args, 1))?;
    let Some(id) = target.as_object() else {
        return Ok(target);
    };
    if !vm.set_prototype_of(id, prototype)? {
        let message = if vm.is_extensible(id) {
            "Cyclic __proto__ value".to_string()
        } else {
            format!("{} is not extensible", vm.display_value(&target))
        };
        return Err(Exception::type_error(message));
    }
    Ok(target)
}

/// `ToPropertyDescriptor`
pub(crate) fn to_property_descriptor(vm: &mut VM, value: &Value) -> JsResult<PropertyDescriptor> {
    let Some(id) = value.as_object() else {
        return Err(Exception::type_error(format!(
            "Property description must be an object: {}",
            vm.display_value(value)
        )));
    };
    let field = |vm: &mut VM, name: &str| -> JsResult<Option<Value>> {
        let key = PropertyKey::from(name);
        if vm.has_property(id, &key)? {
            Ok(Some(vm.get_property(value, &key)?))
        } else {
            Ok(None)
        }
    };
    let descriptor = PropertyDescriptor {
        enumerable: field(vm, "enumerable")?.map(|v| v.is_truthy()),
        configurable: field(vm, "configurable")?.map(|v| v.is_truthy()),
        value: field(vm, "value")?,
        writable: field(vm, "writable")?.map(|v| v.is_truthy()),
        get: field(vm, "get")?,
        set: field(vm, "set")?,
    };
    for (name, accessor) in [("Getter", &descriptor.get), ("Setter", &descriptor.set)] {
        if let Some(accessor) = accessor {
            if !accessor.is_undefined() && !accessor.is_callable() {
                return Err(Exception::type_error(format!(
                    "{} must be a function: {}",
                    name,
                    vm.display_value(accessor)
                )));
            }
        }
    }
    if descriptor.is_accessor() && descriptor.is_data() {
        return Err(Exception::type_error(
            "Invalid property descriptor. Cannot both specify accessors and a value or writable attribute",
        ));
    }
    Ok(descriptor)
}

/// `FromPropertyDescriptor`
fn from_property_descriptor(vm: &mut VM, descriptor: &PropertyDescriptor) -> Value {
    let id = vm.new_ordinary();
    let put = |vm: &mut VM, name: &str, value: Value| {
        vm.heap.define(id, name.into(), Property::data(value));
    };
    if let Some(value) = &descriptor.value {
        put(vm, "value", value.clone());
    }
    if let Some(writable) = descriptor.writable {
        put(vm, "writable", Value::Boolean(writable));
    }
    if let Some(get) = &descriptor.get {
        put(vm, "get", get.clone());
    }
    if let Some(set) = &descriptor.set {
        put(vm, "set", set.clone());
    }
    if let Some(enumerable) = descriptor.enumerable {
        put(vm, "enumerable", Value::Boolean(enumerable));
    }
    if let Some(configurable) = descriptor.configurable {
        put(vm, "configurable", Value::Boolean(configurable));
    }
    Value::Object(id)
}

fn define_property(vm: &mut VM, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let target = arg(args, 0);
    let Some(id) = target.as_object() else {
        return Err(Exception::type_error("Object.defineProperty called on non-object"));
    };
    let key = vm.to_property_key(&arg(args, 1))?;
    let descriptor = to_property_descriptor(vm, &arg(args, 2))?;
    if !vm.define_own_property(id, key.clone(), descriptor)? {
        return Err(Exception::type_error(format!(
            "Cannot redefine property: {}",
            vm.display_key(&key)
        )));
    }
    Ok(target)
}

fn get_own_property_descriptor(vm: &mut VM, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let target = arg(args, 0);
    require_coercible(&target)?;
    let key = vm.to_property_key(&arg(args, 1))?;
    let property = match &target {
        Value::Object(id) | Value::Function(id) => vm.get_own_property(*id, &key),
        _ => None,
    };
    Ok(match property {
        Some(property) => from_property_descriptor(vm, &PropertyDescriptor::from_property(&property)),
        None => Value::Undefined,
    })
}

fn create(vm: &mut VM, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let prototype = prototype_argument(vm, &arg(args, 0))?;
    let object = Value::Object(vm.heap.allocate(prototype, ObjectKind::Ordinary));
    let properties = arg(args, 1);
    if !properties.is_undefined() {
        define_properties(vm, &object, &properties)?;
    }
    Ok(object)
}

/// `ObjectDefineProperties`: read every descriptor before defining any
fn define_properties(vm: &mut VM, target: &Value, properties: &Value) -> JsResult<()> {
    let Some(target_id) = target.as_object() else {
        return Err(Exception::internal("defining properties on a primitive"));
    };
    let mut descriptors = Vec::new();
    for key in own_keys_of(vm, properties)? {
        let enumerable = properties
            .as_object()
            .and_then(|id| vm.get_own_property(id, &key))
            .is_some_and(|p| p.enumerable);
        if !enumerable {
            continue;
        }
        let value = vm.get_property(properties, &key)?;
        descriptors.push((key, to_property_descriptor(vm, &value)?));
    }
    for (key, descriptor) in descriptors {
        if !vm.define_own_property(target_id, key.clone(), descriptor)? {
            return Err(Exception::type_error(format!(
                "Cannot redefine property: {}",
                vm.display_key(&key)
            )));
        }
    }
    Ok(())
}

fn freeze(vm: &mut VM, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let target = arg(args, 0);
    if let Some(id) = target.as_object() {
        if !vm.freeze(id) {
            return Err(Exception::type_error("Cannot freeze"));
        }
    }
    Ok(target)
}

fn is_frozen(vm: &mut VM, _this: &Value, args: &[Value]) -> JsResult<Value> {
    Ok(Value::Boolean(match arg(args, 0).as_object() {
        Some(id) => vm.is_frozen(id),
        None => true,
    }))
}

fn has_own_property(vm: &mut VM, this: &Value, args: &[Value]) -> JsResult<Value> {
    let key = vm.to_property_key(&arg(args, 0))?;
    require_coercible(this)?;
    let has = match this {
        Value::Object(id) | Value::Function(id) => vm.get_own_property(*id, &key).is_some(),
        Value::String(s) => {
            key == PropertyKey::from("length")
                || key
                    .as_array_index()
                    .is_some_and(|index| (index as usize) < s.chars().count())
        }
        _ => false,
    };
    Ok(Value::Boolean(has))
}

fn is_prototype_of(vm: &mut VM, this: &Value, args: &[Value]) -> JsResult<Value> {
    let Some(mut current) = arg(args, 0).as_object() else {
        return Ok(Value::Boolean(false));
    };
    require_coercible(this)?;
    let Some(prototype) = this.as_object() else {
        return Ok(Value::Boolean(false));
    };
    for _ in 0..vm.config.max_prototype_chain {
        match vm.get_prototype_of(current)? {
            Some(next) if next == prototype => return Ok(Value::Boolean(true)),
            Some(next) => current = next,
            None => return Ok(Value::Boolean(false)),
        }
    }
    Err(Exception::range_error("Maximum prototype chain length exceeded"))
}

fn property_is_enumerable(vm: &mut VM, this: &Value, args: &[Value]) -> JsResult<Value> {
    let key = vm.to_property_key(&arg(args, 0))?;
    require_coercible(this)?;
    let enumerable = match this {
        Value::Object(id) | Value::Function(id) => {
            vm.get_own_property(*id, &key).is_some_and(|p| p.enumerable)
        }
        Value::String(s) => key
            .as_array_index()
            .is_some_and(|index| (index as usize) < s.chars().count()),
        _ => false,
    };
    Ok(Value::Boolean(enumerable))
}

/// `Object.prototype.toString`: `[object Tag]`
pub(crate) fn to_string(vm: &mut VM, this: &Value, _args: &[Value]) -> JsResult<Value> {
    let builtin = match this {
        Value::Undefined | Value::Hole => return Ok(Value::from("[object Undefined]")),
        Value::Null => return Ok(Value::from("[object Null]")),
        Value::String(_) => "String",
        Value::Number(_) => "Number",
        Value::Boolean(_) => "Boolean",
        Value::Symbol(_) => "Symbol",
        Value::Function(_) => "Function",
        Value::Object(id) => match vm.kind(*id) {
            Some(ObjectKind::Array(_)) => "Array",
            Some(ObjectKind::Error) => "Error",
            Some(ObjectKind::Arguments) => "Arguments",
            _ if vm.is_array(this) => "Array",
            _ => "Object",
        },
    };
    let tag = match vm.get_property(this, &PropertyKey::Symbol(symbol::TO_STRING_TAG))? {
        Value::String(tag) => tag,
        _ => builtin.into(),
    };
    Ok(Value::string(format!("[object {}]", tag)))
}

fn value_of(_vm: &mut VM, this: &Value, _args: &[Value]) -> JsResult<Value> {
    require_coercible(this)?;
    Ok(this.clone())
}
