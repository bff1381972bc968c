//! Tests for the bytecode verifier

use bytecode_system::{
    ChunkBuilder, FunctionKind, Opcode, UpvalueDescriptor, Verifier, VerifyError,
};

#[test]
fn test_valid_closure_capture_passes() {
    let mut inner = ChunkBuilder::new("inner", FunctionKind::Arrow);
    let up = inner.capture(UpvalueDescriptor::local(bytecode_system::RegisterId(0)));
    let r = inner.register();
    inner.emit(Opcode::GetUpvalue { dst: r, index: up });
    inner.emit(Opcode::Return { value: r });
    let inner = inner.finish().unwrap();

    let mut outer = ChunkBuilder::script();
    let x = outer.register();
    let f = outer.function(inner);
    outer.emit(Opcode::CreateClosure { dst: x, function: f });
    outer.emit(Opcode::Return { value: x });
    let chunk = outer.finish().unwrap();

    assert_eq!(Verifier::new().verify(&chunk), Ok(()));
}

#[test]
fn test_capture_of_missing_register_fails() {
    let mut inner = ChunkBuilder::new("inner", FunctionKind::Arrow);
    inner.capture(UpvalueDescriptor::local(bytecode_system::RegisterId(5)));
    let inner = inner.finish().unwrap();

    let mut outer = ChunkBuilder::script();
    outer.register();
    outer.function(inner);
    let chunk = outer.finish().unwrap();

    assert!(matches!(
        Verifier::new().verify(&chunk),
        Err(VerifyError::BadCapture { what: "register", .. })
    ));
}

#[test]
fn test_named_access_requires_string_constant() {
    let mut b = ChunkBuilder::script();
    let r = b.register();
    let number = b.number(1.5);
    let cache = b.cache_slot();
    b.emit(Opcode::GetNamed {
        dst: r,
        obj: r,
        name: number,
        cache,
    });
    let chunk = b.finish().unwrap();
    assert!(matches!(
        Verifier::new().verify(&chunk),
        Err(VerifyError::BadConstant { index: 0, .. })
    ));
}

#[test]
fn test_yield_only_in_generators() {
    let mut b = ChunkBuilder::new("f", FunctionKind::Normal);
    let r = b.register();
    b.emit(Opcode::Yield { dst: r, value: r });
    let chunk = b.finish().unwrap();
    assert!(matches!(
        Verifier::new().verify(&chunk),
        Err(VerifyError::MisplacedSuspension { opcode: "Yield", .. })
    ));
}

#[test]
fn test_register_limit() {
    let mut b = ChunkBuilder::script();
    b.registers(10);
    let chunk = b.finish().unwrap();
    assert!(matches!(
        Verifier::new().with_max_registers(8).verify(&chunk),
        Err(VerifyError::TooManyRegisters { count: 10, limit: 8, .. })
    ));
}
