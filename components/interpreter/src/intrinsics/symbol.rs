//! `Symbol` and the well-known symbols

use std::rc::Rc;

use core_types::{ObjectId, SymbolId, Value};
use memory_manager::Property;

use super::{arg, Installer};
use crate::error::{Exception, JsResult};
use crate::vm::VM;

pub const ITERATOR: SymbolId = SymbolId(0);
pub const ASYNC_ITERATOR: SymbolId = SymbolId(1);
pub const HAS_INSTANCE: SymbolId = SymbolId(2);
pub const TO_PRIMITIVE: SymbolId = SymbolId(3);
pub const TO_STRING_TAG: SymbolId = SymbolId(4);

/// Static property name and description, in id order
const WELL_KNOWN: [(SymbolId, &str, &str); 5] = [
    (ITERATOR, "iterator", "Symbol.iterator"),
    (ASYNC_ITERATOR, "asyncIterator", "Symbol.asyncIterator"),
    (HAS_INSTANCE, "hasInstance", "Symbol.hasInstance"),
    (TO_PRIMITIVE, "toPrimitive", "Symbol.toPrimitive"),
    (TO_STRING_TAG, "toStringTag", "Symbol.toStringTag"),
];

/// Reserve the ids of the well-known symbols; must run on an empty table
pub(crate) fn register_well_known(symbols: &mut Vec<Option<Rc<str>>>) {
    debug_assert!(symbols.is_empty());
    symbols.extend(WELL_KNOWN.iter().map(|(_, _, description)| Some(Rc::from(*description))));
}

pub(crate) fn install(installer: &mut Installer<'_>, global: ObjectId, prototype: ObjectId) {
    let constructor = installer.function("Symbol", symbol_call, 0);
    installer.heap.define(
        constructor,
        "prototype".into(),
        Property::with_attributes(Value::Object(prototype), false, false, false),
    );
    installer.value(prototype, "constructor", Value::Function(constructor));
    for (id, name, _) in WELL_KNOWN {
        installer.constant(constructor, name.into(), Value::Symbol(id));
    }
    installer.method(prototype, "toString", symbol_to_string, 0);
    installer.method(prototype, "valueOf", symbol_value_of, 0);
    installer.to_string_tag(prototype, "Symbol");
    installer.value(global, "Symbol", Value::Function(constructor));
}

/// `Symbol(description)`; there is no `new Symbol`
fn symbol_call(vm: &mut VM, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let description = match arg(args, 0) {
        Value::Undefined => None,
        value => Some(vm.to_string(&value)?),
    };
    Ok(vm.new_symbol(description.as_deref()))
}

fn this_symbol(vm: &VM, this: &Value, method: &str) -> JsResult<SymbolId> {
    match this {
        Value::Symbol(id) => Ok(*id),
        other => Err(Exception::type_error(format!(
            "Symbol.prototype.{} requires that 'this' be a Symbol, got {}",
            method,
            vm.display_value(other)
        ))),
    }
}

fn symbol_to_string(vm: &mut VM, this: &Value, _args: &[Value]) -> JsResult<Value> {
    let id = this_symbol(vm, this, "toString")?;
    let description = vm.symbol_description(id).unwrap_or_else(|| Rc::from(""));
    Ok(Value::string(format!("Symbol({})", description)))
}

fn symbol_value_of(vm: &mut VM, this: &Value, _args: &[Value]) -> JsResult<Value> {
    this_symbol(vm, this, "valueOf").map(Value::Symbol)
}
