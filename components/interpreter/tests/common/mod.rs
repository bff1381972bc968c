//! Helpers shared by the integration test files

#![allow(dead_code)]

use bytecode_system::{BytecodeChunk, ChunkBuilder, Opcode};
use core_types::{PropertyKey, Value};
use interpreter::{Exception, VM};

/// Run a script that instantiates `chunk` as global `name` and return the
/// function object
pub fn define_function(vm: &mut VM, name: &str, chunk: BytecodeChunk) -> Value {
    let mut b = ChunkBuilder::script();
    let r = b.register();
    let function = b.function(chunk);
    b.emit(Opcode::CreateClosure { dst: r, function });
    b.define_global(name, r);
    b.emit(Opcode::Return { value: r });
    vm.execute(&b.finish().unwrap()).unwrap()
}

/// `value[key]`
pub fn get(vm: &mut VM, value: &Value, key: &str) -> Value {
    vm.get_property(value, &PropertyKey::from(key)).unwrap()
}

/// `value[key](...args)`
pub fn invoke(vm: &mut VM, value: &Value, key: &str, args: &[Value]) -> Value {
    let method = get(vm, value, key);
    vm.call_function(&method, value, args).unwrap()
}

/// `(result.value, result.done)`
pub fn unpack(vm: &mut VM, result: &Value) -> (Value, bool) {
    let value = get(vm, result, "value");
    let done = get(vm, result, "done");
    (value, done.is_truthy())
}

/// `Name: message` of a thrown completion, whether or not the fault was
/// materialized as an Error object yet
pub fn describe(vm: &VM, exception: &Exception) -> String {
    match exception {
        Exception::Error(error) => error.to_string(),
        Exception::Value(value) => vm.display_value(value),
    }
}
