//! Integration tests for interpreter
//!
//! Whole programs exercising classes, closures, iteration, object
//! literals and proxies together.

use bytecode_system::{BinaryOp, BytecodeChunk, ChunkBuilder, FunctionKind, MethodKind, Opcode, RegisterId};
use core_types::{PropertyKey, Value};
use interpreter::VM;

fn run(chunk: BytecodeChunk) -> Value {
    let mut vm = VM::new();
    vm.execute(&chunk).unwrap()
}

fn next(register: RegisterId, offset: u32) -> RegisterId {
    RegisterId(register.0 + offset)
}

/// `function name() { return "<text>" + <suffix> }` where the suffix is
/// `super.name()` when `call_super` is set
fn speak_method(text: &str, call_super: bool) -> BytecodeChunk {
    let mut b = ChunkBuilder::new("speak", FunctionKind::Method);
    let (out, key, f, this) = (b.register(), b.register(), b.register(), b.register());
    b.load_string(out, text);
    if call_super {
        b.load_string(key, "speak");
        b.emit(Opcode::SuperGet { dst: f, key });
        b.emit(Opcode::LoadThis { dst: this });
        b.emit(Opcode::Call { dst: f, callee: f, this, args: f, argc: 0 });
        b.emit(Opcode::Binary { op: BinaryOp::Add, dst: out, lhs: f, rhs: out });
    }
    b.emit(Opcode::Return { value: out });
    b.finish().unwrap()
}

#[test]
fn test_class_hierarchy_with_super_method() {
    // class Animal { speak() { return "generic" } }
    // class Dog extends Animal { constructor() { super() } speak() { return super.speak() + " woof" } }
    // return new Dog().speak()
    let animal = ChunkBuilder::new("Animal", FunctionKind::ClassConstructor);
    let mut dog = ChunkBuilder::new("Dog", FunctionKind::DerivedConstructor);
    let t = dog.register();
    dog.emit(Opcode::SuperCall { dst: t, args: t, argc: 0 });
    dog.emit(Opcode::LoadUndefined { dst: t });
    dog.emit(Opcode::Return { value: t });

    let mut b = ChunkBuilder::script();
    let (a, d, proto, key, method, instance, f) = (
        b.register(),
        b.register(),
        b.register(),
        b.register(),
        b.register(),
        b.register(),
        b.register(),
    );
    let animal = b.function(animal.finish().unwrap());
    let dog = b.function(dog.finish().unwrap());
    let animal_speak = b.function(speak_method("generic", false));
    let dog_speak = b.function(speak_method(" woof", true));

    b.emit(Opcode::CreateClosure { dst: a, function: animal });
    b.emit(Opcode::CreateClass { class: a, heritage: None });
    b.get_named(proto, a, "prototype");
    b.load_string(key, "speak");
    b.emit(Opcode::CreateClosure { dst: method, function: animal_speak });
    b.emit(Opcode::DefineMethod { target: proto, key, method, kind: MethodKind::Method });

    b.emit(Opcode::CreateClosure { dst: d, function: dog });
    b.emit(Opcode::CreateClass { class: d, heritage: Some(a) });
    b.get_named(proto, d, "prototype");
    b.emit(Opcode::CreateClosure { dst: method, function: dog_speak });
    b.emit(Opcode::DefineMethod { target: proto, key, method, kind: MethodKind::Method });

    b.emit(Opcode::Construct { dst: instance, callee: d, args: instance, argc: 0 });
    b.get_named(f, instance, "speak");
    b.emit(Opcode::Call { dst: f, callee: f, this: instance, args: f, argc: 0 });
    b.emit(Opcode::Return { value: f });

    assert_eq!(run(b.finish().unwrap()), Value::from("generic woof"));
}

#[test]
fn test_class_fields_run_per_instance() {
    // class Point { x = 1; y = ++created } ... return [new Point().x, new Point().y]
    let mut init = ChunkBuilder::new("<fields>", FunctionKind::Method);
    let (this, v, one) = (init.register(), init.register(), init.register());
    init.emit(Opcode::LoadThis { dst: this });
    init.emit(Opcode::LoadInt { dst: v, value: 1 });
    init.set_named(this, "x", v);
    init.get_global(v, "created");
    init.emit(Opcode::LoadInt { dst: one, value: 1 });
    init.emit(Opcode::Binary { op: BinaryOp::Add, dst: v, lhs: v, rhs: one });
    init.define_global("created", v);
    init.set_named(this, "y", v);

    let point = ChunkBuilder::new("Point", FunctionKind::ClassConstructor);

    let mut b = ChunkBuilder::script();
    let (class, initializer, zero) = (b.register(), b.register(), b.register());
    let items = b.registers(2);
    let (first, array) = (b.register(), b.register());
    let point = b.function(point.finish().unwrap());
    let init = b.function(init.finish().unwrap());
    b.emit(Opcode::LoadInt { dst: zero, value: 0 });
    b.define_global("created", zero);
    b.emit(Opcode::CreateClosure { dst: class, function: point });
    b.emit(Opcode::CreateClass { class, heritage: None });
    b.emit(Opcode::CreateClosure { dst: initializer, function: init });
    b.emit(Opcode::SetFieldInitializer { class, initializer });
    b.emit(Opcode::Construct { dst: first, callee: class, args: first, argc: 0 });
    b.get_named(items, first, "x");
    b.emit(Opcode::Construct { dst: first, callee: class, args: first, argc: 0 });
    b.get_named(next(items, 1), first, "y");
    b.emit(Opcode::CreateArray { dst: array, start: items, count: 2 });
    b.emit(Opcode::Return { value: array });

    let mut vm = VM::new();
    let result = vm.execute(&b.finish().unwrap()).unwrap();
    assert_eq!(vm.display_value(&result), "1,2");
}

#[test]
fn test_loop_closures_capture_each_iteration() {
    // const fns = []; for (let i = 0; i < 3; i++) fns.push(() => i * 10);
    // return fns.map(f => f())
    let mut inner = ChunkBuilder::new("", FunctionKind::Arrow);
    let (value, ten) = (inner.register(), inner.register());
    inner.capture(bytecode_system::UpvalueDescriptor::local(RegisterId(2)));
    inner.emit(Opcode::GetUpvalue { dst: value, index: 0 });
    inner.emit(Opcode::LoadInt { dst: ten, value: 10 });
    inner.emit(Opcode::Binary { op: BinaryOp::Mul, dst: value, lhs: value, rhs: ten });
    inner.emit(Opcode::Return { value });

    let mut b = ChunkBuilder::script();
    let (fns, i, binding, limit, cond, f, one) = (
        b.register(),
        b.register(),
        b.register(),
        b.register(),
        b.register(),
        b.register(),
        b.register(),
    );
    assert_eq!(binding, RegisterId(2));
    let (results, n, index, out) = (b.register(), b.register(), b.register(), b.register());
    let closure = b.function(inner.finish().unwrap());
    let head = b.label();
    let exit = b.label();
    let call_head = b.label();
    let call_exit = b.label();

    b.emit(Opcode::CreateArray { dst: fns, start: fns, count: 0 });
    b.emit(Opcode::LoadInt { dst: i, value: 0 });
    b.emit(Opcode::LoadInt { dst: limit, value: 3 });
    b.emit(Opcode::LoadInt { dst: one, value: 1 });
    b.bind(head);
    b.emit(Opcode::Binary { op: BinaryOp::Lt, dst: cond, lhs: i, rhs: limit });
    b.emit(Opcode::JumpIfFalse { cond, target: exit.target() });
    b.emit(Opcode::Move { dst: binding, src: i });
    b.emit(Opcode::CreateClosure { dst: f, function: closure });
    b.emit(Opcode::ArrayPush { array: fns, value: f });
    b.emit(Opcode::CloseUpvalues { from: binding });
    b.emit(Opcode::Binary { op: BinaryOp::Add, dst: i, lhs: i, rhs: one });
    b.emit(Opcode::Jump { target: head.target() });
    b.bind(exit);

    b.emit(Opcode::CreateArray { dst: results, start: results, count: 0 });
    b.emit(Opcode::LoadInt { dst: index, value: 0 });
    b.bind(call_head);
    b.get_named(n, fns, "length");
    b.emit(Opcode::Binary { op: BinaryOp::Lt, dst: cond, lhs: index, rhs: n });
    b.emit(Opcode::JumpIfFalse { cond, target: call_exit.target() });
    b.emit(Opcode::GetIndexed { dst: f, obj: fns, key: index });
    b.emit(Opcode::Call { dst: out, callee: f, this: f, args: out, argc: 0 });
    b.emit(Opcode::ArrayPush { array: results, value: out });
    b.emit(Opcode::Binary { op: BinaryOp::Add, dst: index, lhs: index, rhs: one });
    b.emit(Opcode::Jump { target: call_head.target() });
    b.bind(call_exit);
    b.emit(Opcode::Return { value: results });

    let mut vm = VM::new();
    let result = vm.execute(&b.finish().unwrap()).unwrap();
    assert_eq!(vm.display_value(&result), "0,10,20");
}

#[test]
fn test_object_spread_and_key_enumeration() {
    // const base = { a: 1, b: 2 }; const copy = { ...base, c: 3 }; return keys of copy
    let mut b = ChunkBuilder::script();
    let (base, copy, v, key, keys) = (b.register(), b.register(), b.register(), b.register(), b.register());
    b.emit(Opcode::CreateObject { dst: base });
    b.emit(Opcode::LoadInt { dst: v, value: 1 });
    b.load_string(key, "a");
    b.emit(Opcode::DefineField { obj: base, key, value: v });
    b.emit(Opcode::LoadInt { dst: v, value: 2 });
    b.load_string(key, "b");
    b.emit(Opcode::DefineField { obj: base, key, value: v });
    b.emit(Opcode::CreateObject { dst: copy });
    b.emit(Opcode::CopyDataProperties { dst: copy, src: base });
    b.emit(Opcode::LoadInt { dst: v, value: 3 });
    b.load_string(key, "c");
    b.emit(Opcode::DefineField { obj: copy, key, value: v });
    b.emit(Opcode::EnumerateKeys { dst: keys, obj: copy });
    b.define_global("copy", copy);
    b.emit(Opcode::Return { value: keys });

    let mut vm = VM::new();
    let keys = vm.execute(&b.finish().unwrap()).unwrap();
    assert_eq!(vm.display_value(&keys), "a,b,c");
    let copy = vm.get_global("copy").unwrap();
    assert_eq!(vm.get_property(&copy, &"b".into()).unwrap(), Value::from(2));
}

#[test]
fn test_getter_defined_in_literal() {
    // const o = { get twice() { return this.n * 2 }, n: 21 }; return o.twice
    let mut getter = ChunkBuilder::new("get twice", FunctionKind::Method);
    let (this, n, two) = (getter.register(), getter.register(), getter.register());
    getter.emit(Opcode::LoadThis { dst: this });
    getter.get_named(n, this, "n");
    getter.emit(Opcode::LoadInt { dst: two, value: 2 });
    getter.emit(Opcode::Binary { op: BinaryOp::Mul, dst: n, lhs: n, rhs: two });
    getter.emit(Opcode::Return { value: n });

    let mut b = ChunkBuilder::script();
    let (o, key, g, none, out) = (b.register(), b.register(), b.register(), b.register(), b.register());
    let function = b.function(getter.finish().unwrap());
    b.emit(Opcode::CreateObject { dst: o });
    b.load_string(key, "twice");
    b.emit(Opcode::CreateClosure { dst: g, function });
    b.emit(Opcode::LoadUndefined { dst: none });
    b.emit(Opcode::DefineAccessor { obj: o, key, getter: g, setter: none });
    b.emit(Opcode::LoadInt { dst: out, value: 21 });
    b.load_string(key, "n");
    b.emit(Opcode::DefineField { obj: o, key, value: out });
    b.get_named(out, o, "twice");
    b.emit(Opcode::Return { value: out });

    assert_eq!(run(b.finish().unwrap()), Value::from(42));
}

#[test]
fn test_arguments_and_spread_call() {
    // function count() { return arguments.length } return count(...[1, 2], 3)
    let mut count = ChunkBuilder::new("count", FunctionKind::Normal).sloppy();
    let (args, n) = (count.register(), count.register());
    count.emit(Opcode::LoadArguments { dst: args });
    count.get_named(n, args, "length");
    count.emit(Opcode::Return { value: n });

    let mut b = ChunkBuilder::script();
    let items = b.registers(2);
    let (inner, list, extra, f, out) = (b.register(), b.register(), b.register(), b.register(), b.register());
    let function = b.function(count.finish().unwrap());
    b.emit(Opcode::LoadInt { dst: items, value: 1 });
    b.emit(Opcode::LoadInt { dst: next(items, 1), value: 2 });
    b.emit(Opcode::CreateArray { dst: inner, start: items, count: 2 });
    b.emit(Opcode::CreateArray { dst: list, start: list, count: 0 });
    b.emit(Opcode::SpreadIntoArray { array: list, iterable: inner });
    b.emit(Opcode::LoadInt { dst: extra, value: 3 });
    b.emit(Opcode::ArrayPush { array: list, value: extra });
    b.emit(Opcode::CreateClosure { dst: f, function });
    b.emit(Opcode::CallSpread { dst: out, callee: f, this: f, args: list });
    b.emit(Opcode::Return { value: out });

    assert_eq!(run(b.finish().unwrap()), Value::from(3));
}

#[test]
fn test_proxy_get_trap_intercepts_bytecode_reads() {
    let mut vm = VM::new();
    vm.register_host_function("trapGet", 3, |vm, _this, args| {
        let key = args.get(1).cloned().unwrap_or(Value::Undefined);
        let key = vm.to_string(&key)?;
        Ok(Value::string(format!("intercepted {}", key)))
    });

    // const p = new Proxy({}, { get: trapGet }); return p.anything
    let mut b = ChunkBuilder::script();
    let args = b.registers(2);
    let (ctor, trap, proxy) = (b.register(), b.register(), b.register());
    b.emit(Opcode::CreateObject { dst: args });
    b.emit(Opcode::CreateObject { dst: next(args, 1) });
    b.get_global(trap, "trapGet");
    b.set_named(next(args, 1), "get", trap);
    b.get_global(ctor, "Proxy");
    b.emit(Opcode::Construct { dst: proxy, callee: ctor, args, argc: 2 });
    b.get_named(proxy, proxy, "anything");
    b.emit(Opcode::Return { value: proxy });

    let result = vm.execute(&b.finish().unwrap()).unwrap();
    assert_eq!(result, Value::from("intercepted anything"));
}

#[test]
fn test_symbol_keyed_properties() {
    let mut vm = VM::new();
    let symbol = vm.new_symbol(Some("secret"));
    let object = vm.create_object();
    let key = vm.to_property_key(&symbol).unwrap();
    vm.set_property(&object, key.clone(), Value::from(1), true).unwrap();
    vm.set_property(&object, "visible".into(), Value::from(2), true).unwrap();

    assert_eq!(vm.get_property(&object, &key).unwrap(), Value::from(1));
    let id = object.as_object().unwrap();
    let keys = vm.own_keys(id);
    assert_eq!(keys.len(), 2);
    assert_eq!(keys[0], PropertyKey::from("visible"));
}
