//! Contract tests for the instruction set consumed by the interpreter

use bytecode_system::{BinaryOp, FunctionKind, Opcode, RegisterId};

/// Every opcode that transfers control carries its targets in jump_targets
#[test]
fn test_control_transfer_opcodes_expose_targets() {
    let r = RegisterId(0);
    let ops = [
        Opcode::Jump { target: 1 },
        Opcode::JumpIfTrue { cond: r, target: 1 },
        Opcode::JumpIfFalse { cond: r, target: 1 },
        Opcode::JumpIfNullish { cond: r, target: 1 },
        Opcode::JumpIfUndefined { cond: r, target: 1 },
        Opcode::JumpIfNotUndefined { cond: r, target: 1 },
        Opcode::JumpIfDone { result: r, target: 1 },
        Opcode::GotoFinally { target: 1 },
        Opcode::Leave { target: 1, depth: 1 },
    ];
    for op in ops {
        assert_eq!(op.jump_targets(), vec![1], "{}", op.name());
    }
}

/// Comparison operators are the ones producing booleans
#[test]
fn test_comparison_classification() {
    assert!(BinaryOp::InstanceOf.is_comparison());
    assert!(BinaryOp::LtEq.is_comparison());
    assert!(!BinaryOp::UShr.is_comparison());
}

/// Function kinds map onto the call protocol the interpreter implements
#[test]
fn test_function_kind_protocol() {
    assert!(FunctionKind::Normal.is_constructor());
    assert!(!FunctionKind::Arrow.is_constructor());
    assert!(!FunctionKind::Method.is_constructor());
    assert!(!FunctionKind::Generator.is_constructor());
    assert!(FunctionKind::DerivedConstructor.is_class_constructor());
    assert!(FunctionKind::AsyncArrow.is_arrow() && FunctionKind::AsyncArrow.is_async());
}

/// Opcodes are plain data so the dispatch loop can copy them out of a chunk
#[test]
fn test_opcodes_are_copy() {
    fn assert_copy<T: Copy>() {}
    assert_copy::<Opcode>();
}
