//! Tests for function call execution
//!
//! Tests cover:
//! - Calls with arguments and return values
//! - Recursion through a global binding
//! - Tail calls running in constant frame depth
//! - Closures sharing captured variables
//! - Call depth limits and recovery

mod common;

use bytecode_system::{BinaryOp, BytecodeChunk, ChunkBuilder, FunctionKind, Opcode, UpvalueDescriptor};
use common::{define_function, describe, get};
use core_types::{ErrorKind, Value};
use interpreter::{EngineConfig, Exception, VM};

/// function add(a, b) { return a + b; }
fn add_function() -> BytecodeChunk {
    let mut b = ChunkBuilder::new("add", FunctionKind::Normal).with_params(2);
    let (a, c, out) = (b.param(0), b.param(1), b.register());
    b.emit(Opcode::Binary { op: BinaryOp::Add, dst: out, lhs: a, rhs: c });
    b.emit(Opcode::Return { value: out });
    b.finish().unwrap()
}

/// function fact(n) { if (n <= 1) return 1; return n * fact(n - 1); }
fn factorial_function() -> BytecodeChunk {
    let mut b = ChunkBuilder::new("fact", FunctionKind::Normal).with_params(1);
    let n = b.param(0);
    let (one, cond, f, arg, this, out) = (
        b.register(),
        b.register(),
        b.register(),
        b.register(),
        b.register(),
        b.register(),
    );
    let recurse = b.label();
    b.load_number(one, 1.0);
    b.emit(Opcode::Binary { op: BinaryOp::LtEq, dst: cond, lhs: n, rhs: one });
    b.emit(Opcode::JumpIfFalse { cond, target: recurse.target() });
    b.emit(Opcode::Return { value: one });
    b.bind(recurse);
    b.get_global(f, "fact");
    b.emit(Opcode::Binary { op: BinaryOp::Sub, dst: arg, lhs: n, rhs: one });
    b.emit(Opcode::LoadUndefined { dst: this });
    b.emit(Opcode::Call { dst: out, callee: f, this, args: arg, argc: 1 });
    b.emit(Opcode::Binary { op: BinaryOp::Mul, dst: out, lhs: n, rhs: out });
    b.emit(Opcode::Return { value: out });
    b.finish().unwrap()
}

/// function countdown(n) { if (n === 0) return "done"; return countdown(n - 1); }
/// with the recursive call either in tail position or not
fn countdown_function(tail: bool) -> BytecodeChunk {
    let mut b = ChunkBuilder::new("countdown", FunctionKind::Normal).with_params(1);
    let n = b.param(0);
    let (zero, one, cond, f, this, arg) = (
        b.register(),
        b.register(),
        b.register(),
        b.register(),
        b.register(),
        b.register(),
    );
    let recurse = b.label();
    b.load_number(zero, 0.0);
    b.load_number(one, 1.0);
    b.emit(Opcode::Binary { op: BinaryOp::StrictEq, dst: cond, lhs: n, rhs: zero });
    b.emit(Opcode::JumpIfFalse { cond, target: recurse.target() });
    b.load_string(cond, "done");
    b.emit(Opcode::Return { value: cond });
    b.bind(recurse);
    b.get_global(f, "countdown");
    b.emit(Opcode::LoadUndefined { dst: this });
    b.emit(Opcode::Binary { op: BinaryOp::Sub, dst: arg, lhs: n, rhs: one });
    if tail {
        b.emit(Opcode::TailCall { callee: f, this, args: arg, argc: 1 });
    } else {
        b.emit(Opcode::Call { dst: arg, callee: f, this, args: arg, argc: 1 });
        b.emit(Opcode::Return { value: arg });
    }
    b.finish().unwrap()
}

/// function makeCounter() { let count = 0; return () => ++count; }
fn counter_factory() -> BytecodeChunk {
    let mut inner = ChunkBuilder::new("increment", FunctionKind::Arrow);
    inner.capture(UpvalueDescriptor::local(bytecode_system::RegisterId(0)));
    let (value, one) = (inner.register(), inner.register());
    inner.emit(Opcode::GetUpvalue { dst: value, index: 0 });
    inner.load_number(one, 1.0);
    inner.emit(Opcode::Binary { op: BinaryOp::Add, dst: value, lhs: value, rhs: one });
    inner.emit(Opcode::SetUpvalue { index: 0, src: value });
    inner.emit(Opcode::Return { value });

    let mut b = ChunkBuilder::new("makeCounter", FunctionKind::Normal);
    let (count, f) = (b.register(), b.register());
    let function = b.function(inner.finish().unwrap());
    b.emit(Opcode::LoadInt { dst: count, value: 0 });
    b.emit(Opcode::CreateClosure { dst: f, function });
    b.emit(Opcode::Return { value: f });
    b.finish().unwrap()
}

#[test]
fn test_call_with_arguments() {
    let mut vm = VM::new();
    let add = define_function(&mut vm, "add", add_function());
    let result = vm
        .call_function(&add, &Value::Undefined, &[Value::from(2), Value::from(3)])
        .unwrap();
    assert_eq!(result, Value::from(5));
}

#[test]
fn test_missing_arguments_are_undefined() {
    let mut vm = VM::new();
    let add = define_function(&mut vm, "add", add_function());
    let result = vm.call_function(&add, &Value::Undefined, &[Value::from(1)]).unwrap();
    assert!(result.as_number().unwrap().is_nan());
}

#[test]
fn test_string_concatenation_through_call() {
    let mut vm = VM::new();
    let add = define_function(&mut vm, "add", add_function());
    let result = vm
        .call_function(&add, &Value::Undefined, &[Value::from("a"), Value::from(1)])
        .unwrap();
    assert_eq!(result, Value::from("a1"));
}

#[test]
fn test_recursive_factorial() {
    let mut vm = VM::new();
    let fact = define_function(&mut vm, "fact", factorial_function());
    let result = vm.call_function(&fact, &Value::Undefined, &[Value::from(10)]).unwrap();
    assert_eq!(result, Value::from(3_628_800));
}

#[test]
fn test_function_metadata() {
    let mut vm = VM::new();
    let add = define_function(&mut vm, "add", add_function());
    assert_eq!(get(&mut vm, &add, "name"), Value::from("add"));
    assert_eq!(get(&mut vm, &add, "length"), Value::from(2));
    let prototype = get(&mut vm, &add, "prototype");
    assert_eq!(get(&mut vm, &prototype, "constructor"), add);
}

#[test]
fn test_tail_calls_run_in_constant_depth() {
    let mut vm = VM::with_config(EngineConfig::default().with_max_call_depth(32));
    let countdown = define_function(&mut vm, "countdown", countdown_function(true));
    let result = vm
        .call_function(&countdown, &Value::Undefined, &[Value::from(5_000)])
        .unwrap();
    assert_eq!(result, Value::from("done"));
}

#[test]
fn test_deep_recursion_is_range_error_and_vm_recovers() {
    let mut vm = VM::with_config(EngineConfig::default().with_max_call_depth(32));
    let countdown = define_function(&mut vm, "countdown", countdown_function(false));

    let err = vm
        .call_function(&countdown, &Value::Undefined, &[Value::from(5_000)])
        .unwrap_err();
    assert_eq!(err.as_error().map(|e| e.kind), Some(ErrorKind::RangeError));
    assert_eq!(describe(&vm, &err), "RangeError: Maximum call stack size exceeded");

    let result = vm
        .call_function(&countdown, &Value::Undefined, &[Value::from(10)])
        .unwrap();
    assert_eq!(result, Value::from("done"));
}

#[test]
fn test_closures_share_captured_variable() {
    let mut vm = VM::new();
    let factory = define_function(&mut vm, "makeCounter", counter_factory());
    let first = vm.call_function(&factory, &Value::Undefined, &[]).unwrap();
    let second = vm.call_function(&factory, &Value::Undefined, &[]).unwrap();

    let mut tick = |counter: &Value| vm.call_function(counter, &Value::Undefined, &[]).unwrap();
    assert_eq!(tick(&first), Value::from(1));
    assert_eq!(tick(&first), Value::from(2));
    assert_eq!(tick(&second), Value::from(1));
    assert_eq!(tick(&first), Value::from(3));
}

#[test]
fn test_call_through_host_function_reenters_bytecode() {
    let mut vm = VM::new();
    let add = define_function(&mut vm, "add", add_function());
    vm.register_host_function("twice", 1, |vm, _this, args| {
        let f = args.first().cloned().unwrap_or(Value::Undefined);
        let once = vm.call_function(&f, &Value::Undefined, &[Value::from(1), Value::from(2)])?;
        vm.call_function(&f, &Value::Undefined, &[once, Value::from(10)])
    });

    // return twice(add)
    let mut b = ChunkBuilder::script();
    let (f, this, arg, out) = (b.register(), b.register(), b.register(), b.register());
    b.get_global(f, "twice");
    b.get_global(arg, "add");
    b.emit(Opcode::LoadUndefined { dst: this });
    b.emit(Opcode::Call { dst: out, callee: f, this, args: arg, argc: 1 });
    b.emit(Opcode::Return { value: out });
    let result = vm.execute(&b.finish().unwrap()).unwrap();
    assert_eq!(result, Value::from(13));
    assert!(add.is_callable());
}

#[test]
fn test_calling_undefined_names_the_callee() {
    let mut vm = VM::new();
    let err = vm
        .call_function(&Value::Undefined, &Value::Undefined, &[])
        .unwrap_err();
    assert!(matches!(&err, Exception::Error(e) if e.kind == ErrorKind::TypeError));
    assert_eq!(describe(&vm, &err), "TypeError: undefined is not a function");
}

#[test]
fn test_bound_function_from_bytecode() {
    let mut vm = VM::new();
    let add = define_function(&mut vm, "add", add_function());
    let bind = get(&mut vm, &add, "bind");
    let bound = vm
        .call_function(&bind, &add, &[Value::Null, Value::from(100)])
        .unwrap();
    vm.set_global("addHundred", bound);

    // return addHundred(5)
    let mut b = ChunkBuilder::script();
    let (f, this, arg, out) = (b.register(), b.register(), b.register(), b.register());
    b.get_global(f, "addHundred");
    b.emit(Opcode::LoadUndefined { dst: this });
    b.load_number(arg, 5.0);
    b.emit(Opcode::Call { dst: out, callee: f, this, args: arg, argc: 1 });
    b.emit(Opcode::Return { value: out });
    assert_eq!(vm.execute(&b.finish().unwrap()).unwrap(), Value::from(105));
}
