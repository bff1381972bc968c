//! Tests for ChunkBuilder label resolution and allocation

use bytecode_system::{BuildError, ChunkBuilder, Constant, FunctionKind, Opcode, RegisterId};

#[test]
fn test_backward_and_forward_labels_resolve() {
    let mut b = ChunkBuilder::script();
    let r = b.register();
    let top = b.label();
    let exit = b.label();
    b.bind(top); // 0
    b.emit(Opcode::JumpIfFalse {
        cond: r,
        target: exit.target(),
    }); // 0
    b.emit(Opcode::Jump {
        target: top.target(),
    }); // 1
    b.bind(exit);
    b.emit(Opcode::Return { value: r }); // 2
    let chunk = b.finish().unwrap();

    assert_eq!(
        chunk.instructions[0].opcode,
        Opcode::JumpIfFalse { cond: r, target: 2 }
    );
    assert_eq!(chunk.instructions[1].opcode, Opcode::Jump { target: 0 });
}

#[test]
fn test_binding_a_label_twice_fails() {
    let mut b = ChunkBuilder::script();
    let l = b.label();
    b.bind(l);
    b.emit(Opcode::Nop);
    b.bind(l);
    assert_eq!(b.finish(), Err(BuildError::LabelBoundTwice(0)));
}

#[test]
fn test_try_region_targets_resolve() {
    let mut b = ChunkBuilder::script();
    let catch = b.label();
    let finally = b.label();
    b.emit(Opcode::EnterTry {
        catch_target: Some(catch.target()),
        finally_target: Some(finally.target()),
    });
    b.bind(catch);
    b.emit(Opcode::Nop);
    b.bind(finally);
    b.emit(Opcode::EndFinally);
    let chunk = b.finish().unwrap();
    assert_eq!(
        chunk.instructions[0].opcode,
        Opcode::EnterTry {
            catch_target: Some(1),
            finally_target: Some(2)
        }
    );
}

#[test]
fn test_nested_functions_and_cache_slots() {
    let mut inner = ChunkBuilder::new("inner", FunctionKind::Arrow);
    let r = inner.register();
    inner.emit(Opcode::Return { value: r });
    let inner = inner.finish().unwrap();

    let mut b = ChunkBuilder::script();
    let obj = b.register();
    let index = b.function(inner);
    b.get_named(obj, obj, "x");
    b.set_named(obj, "x", obj);
    let chunk = b.finish().unwrap();

    assert_eq!(index, 0);
    assert_eq!(chunk.cache_slots, 2);
    assert_eq!(chunk.functions[0].info.name.as_ref(), "inner");
    assert_eq!(chunk.constants, vec![Constant::String("x".into())]);
    assert_eq!(obj, RegisterId(0));
}

#[test]
fn test_source_positions_follow_at() {
    let mut b = ChunkBuilder::script();
    let r = b.register();
    b.emit(Opcode::LoadNull { dst: r });
    b.at(3, 9);
    b.emit(Opcode::Throw { value: r });
    let chunk = b.finish().unwrap();
    assert!(chunk.instructions[0].source_position.is_none());
    assert_eq!(
        chunk.instructions[1].source_position.map(|p| (p.line, p.column)),
        Some((3, 9))
    );
}
