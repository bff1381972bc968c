//! Contract tests for interpreter API
//!
//! These tests pin the embedder-facing behavior of [`VM`].

use bytecode_system::{BytecodeChunk, ChunkBuilder, FunctionKind, Opcode, RegisterId, VerifyError};
use core_types::{ErrorKind, Value};
use interpreter::{EngineConfig, EngineError, VM};

fn return_number(n: f64) -> BytecodeChunk {
    let mut b = ChunkBuilder::script();
    let r = b.register();
    b.load_number(r, n);
    b.emit(Opcode::Return { value: r });
    b.finish().unwrap()
}

/// VM::execute() runs a chunk and returns its completion value
#[test]
fn test_execute_returns_completion_value() {
    let mut vm = VM::new();
    assert_eq!(vm.execute(&return_number(42.0)).unwrap(), Value::from(42));
    assert_eq!(vm.execute(&return_number(0.5)).unwrap(), Value::Number(0.5));
}

/// Falling off the end of a script yields undefined
#[test]
fn test_empty_script_returns_undefined() {
    let mut vm = VM::new();
    let chunk = ChunkBuilder::script().finish().unwrap();
    assert_eq!(vm.execute(&chunk).unwrap(), Value::Undefined);
}

/// Malformed bytecode is rejected before any instruction runs
#[test]
fn test_execute_rejects_invalid_bytecode() {
    let mut chunk = ChunkBuilder::script().finish().unwrap();
    chunk.emit(Opcode::LoadBool {
        dst: RegisterId(0),
        value: true,
    });
    chunk.emit(Opcode::Return { value: RegisterId(0) });

    let mut vm = VM::new();
    let err = vm.execute(&chunk).unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidBytecode(VerifyError::RegisterOutOfRange { .. })
    ));
    assert!(err.thrown_value().is_none());
}

/// `yield` outside a generator never reaches the dispatch loop
#[test]
fn test_yield_outside_generator_is_invalid() {
    let mut b = ChunkBuilder::new("f", FunctionKind::Normal);
    let r = b.register();
    b.emit(Opcode::Yield { dst: r, value: r });
    let mut outer = ChunkBuilder::script();
    outer.function(b.finish().unwrap());
    let chunk = outer.finish().unwrap();

    let mut vm = VM::new();
    match vm.execute(&chunk) {
        Err(EngineError::InvalidBytecode(error)) => {
            assert!(matches!(error, VerifyError::MisplacedSuspension { .. }))
        }
        other => panic!("expected InvalidBytecode, got {:?}", other),
    }
}

/// Uncaught exceptions carry a rendered description and the value
#[test]
fn test_uncaught_error_description() {
    let mut b = ChunkBuilder::script();
    let message = b.string("limit reached");
    b.emit(Opcode::ThrowError {
        kind: ErrorKind::RangeError,
        message,
    });

    let mut vm = VM::new();
    let err = vm.execute(&b.finish().unwrap()).unwrap_err();
    let EngineError::Uncaught { description, value } = &err else {
        panic!("expected Uncaught");
    };
    assert_eq!(description, "RangeError: limit reached");
    let range_error = vm.get_global("RangeError").unwrap();
    assert!(vm.instance_of(value, &range_error).unwrap());
}

/// The VM stays usable after an uncaught exception
#[test]
fn test_vm_reusable_after_uncaught() {
    let mut b = ChunkBuilder::script();
    let r = b.register();
    b.emit(Opcode::LoadNull { dst: r });
    b.emit(Opcode::Throw { value: r });

    let mut vm = VM::new();
    assert!(vm.execute(&b.finish().unwrap()).is_err());
    assert_eq!(vm.execute(&return_number(7.0)).unwrap(), Value::from(7));
}

/// Globals set by the embedder are visible to bytecode and vice versa
#[test]
fn test_globals_are_shared_with_bytecode() {
    let mut vm = VM::new();
    vm.set_global("input", Value::from(20));

    let mut b = ChunkBuilder::script();
    let (x, y) = (b.register(), b.register());
    b.get_global(x, "input");
    b.emit(Opcode::LoadInt { dst: y, value: 22 });
    b.emit(Opcode::Binary {
        op: bytecode_system::BinaryOp::Add,
        dst: x,
        lhs: x,
        rhs: y,
    });
    b.define_global("output", x);
    b.emit(Opcode::Return { value: x });

    vm.execute(&b.finish().unwrap()).unwrap();
    assert_eq!(vm.get_global("output"), Some(Value::from(42)));
    let global = vm.global_object();
    assert_eq!(vm.get_property(&global, &"output".into()).unwrap(), Value::from(42));
}

/// Reading a missing global is a ReferenceError in bytecode
#[test]
fn test_missing_global_is_reference_error() {
    let mut b = ChunkBuilder::script();
    let r = b.register();
    b.get_global(r, "nowhere");
    b.emit(Opcode::Return { value: r });

    let mut vm = VM::new();
    let err = vm.execute(&b.finish().unwrap()).unwrap_err();
    assert_eq!(err.to_string(), "Uncaught ReferenceError: nowhere is not defined");
}

/// Host functions are callable and constructible only as declared
#[test]
fn test_host_function_contract() {
    let mut vm = VM::new();
    let f = vm.register_host_function("identity", 1, |_, _, args| {
        Ok(args.first().cloned().unwrap_or(Value::Undefined))
    });
    assert!(f.is_callable());
    assert!(!vm.is_constructor(&f));
    assert_eq!(vm.get_global("identity"), Some(f.clone()));
    assert_eq!(
        vm.call_function(&f, &Value::Undefined, &[Value::from("same")]).unwrap(),
        Value::from("same")
    );
    assert!(vm.construct(&f, &[], None).is_err());
}

/// collect_garbage frees unreachable objects and keeps rooted ones
#[test]
fn test_collect_garbage_when_idle() {
    let mut vm = VM::new();
    for _ in 0..10 {
        vm.create_object();
    }
    let kept = vm.create_object();
    vm.set_property(&kept, "v".into(), Value::from(1), true).unwrap();
    let rooted_elsewhere = vm.create_array(vec![Value::from("r")]);
    vm.set_global("kept", kept.clone());

    let before = vm.heap_stats();
    let stats = vm.collect_garbage(&[rooted_elsewhere.clone()]).unwrap();
    assert!(stats.freed >= 10);
    let after = vm.heap_stats();
    assert!(after.live < before.live);
    assert_eq!(after.collections, before.collections + 1);

    assert_eq!(vm.get_property(&kept, &"v".into()).unwrap(), Value::from(1));
    assert_eq!(vm.display_value(&rooted_elsewhere), "r");
}

/// Collection is refused while a host function runs inside the VM
#[test]
fn test_collect_garbage_refused_during_execution() {
    let mut vm = VM::new();
    let probe = vm.register_host_function("probe", 0, |vm, _, _| {
        Ok(Value::Boolean(vm.collect_garbage(&[]).is_none()))
    });
    let refused = vm.call_function(&probe, &Value::Undefined, &[]).unwrap();
    assert_eq!(refused, Value::Boolean(true));
}

/// Configured call depth is honored
#[test]
fn test_call_depth_limit_is_configurable() {
    let mut vm = VM::with_config(EngineConfig::default().with_max_native_depth(8));
    let f = vm.register_host_function("recurse", 0, |vm, _, _| {
        let me = vm.get_global("recurse").unwrap_or(Value::Undefined);
        vm.call_function(&me, &Value::Undefined, &[])
    });
    let err = vm.call_function(&f, &Value::Undefined, &[]).unwrap_err();
    assert_eq!(err.as_error().map(|e| e.kind), Some(ErrorKind::RangeError));
}

/// discard_pending_jobs drops queued work without running it
#[test]
fn test_discard_pending_jobs() {
    let mut vm = VM::new();
    vm.enqueue_task(|_| panic!("task should not run"));
    vm.enqueue_microtask(|_| panic!("microtask should not run"));
    assert_eq!(vm.discard_pending_jobs(), (1, 1));
    assert_eq!(vm.run_event_loop().unwrap().tasks, 0);
}

/// Queued promise reactions keep their handlers alive across a collection
#[test]
fn test_collect_garbage_keeps_queued_reaction_handlers() {
    let mut vm = VM::new();
    let promise = vm.new_promise();
    let handler = vm.register_host_function("onSettled", 1, |vm, _, args| {
        vm.set_global("seen", args.first().cloned().unwrap_or(Value::Undefined));
        Ok(Value::Undefined)
    });
    let then = vm.get_property(&promise, &"then".into()).unwrap();
    vm.call_function(&then, &promise, &[handler]).unwrap();
    vm.set_global("onSettled", Value::Undefined);
    vm.resolve_promise(&promise, Value::from("kept")).unwrap();
    assert_eq!(vm.pending_microtasks(), 1);

    vm.collect_garbage(&[]).unwrap();
    assert_eq!(vm.run_microtasks().unwrap(), 1);
    assert_eq!(vm.get_global("seen"), Some(Value::from("kept")));
}
