//! Unit tests for interpreter components

use std::cell::RefCell;
use std::rc::Rc;

use bytecode_system::{ChunkBuilder, FunctionKind, Opcode};
use core_types::{ErrorKind, ObjectId, PropertyKey, Value};
use interpreter::upvalue::new_upvalue_handle;
use interpreter::{CacheHit, EngineConfig, InlineCache, PropertyDescriptor, Upvalue, VM};
use memory_manager::ShapeId;

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_config_from_partial_json() {
    let config: EngineConfig =
        serde_json::from_str(r#"{ "max_call_depth": 64, "inline_caches": false }"#).unwrap();
    assert_eq!(config.max_call_depth, 64);
    assert!(!config.inline_caches);
    assert_eq!(config.max_native_depth, EngineConfig::default().max_native_depth);
    assert!(config.verify_bytecode);
}

#[test]
fn test_config_round_trips_through_json() {
    let config = EngineConfig::default().with_max_prototype_chain(12);
    let text = serde_json::to_string(&config).unwrap();
    let back: EngineConfig = serde_json::from_str(&text).unwrap();
    assert_eq!(back, config);
}

#[test]
fn test_vm_keeps_its_config() {
    let vm = VM::with_config(EngineConfig::default().with_verify_bytecode(false));
    assert!(!vm.config().verify_bytecode);
}

// ============================================================================
// Inline caches
// ============================================================================

#[test]
fn test_cache_starts_uninitialized() {
    let cache = InlineCache::new();
    assert_eq!(cache, InlineCache::Uninitialized);
    assert_eq!(cache.lookup(ShapeId(1)), None);
}

#[test]
fn test_cache_monomorphic_then_polymorphic() {
    let mut cache = InlineCache::new();
    cache.update(ShapeId(1), CacheHit::Own(0));
    assert!(matches!(cache, InlineCache::Monomorphic { .. }));
    assert_eq!(cache.lookup(ShapeId(1)), Some(CacheHit::Own(0)));
    assert_eq!(cache.lookup(ShapeId(2)), None);

    cache.update(ShapeId(2), CacheHit::Own(3));
    assert!(matches!(cache, InlineCache::Polymorphic { .. }));
    assert_eq!(cache.lookup(ShapeId(1)), Some(CacheHit::Own(0)));
    assert_eq!(cache.lookup(ShapeId(2)), Some(CacheHit::Own(3)));
}

#[test]
fn test_cache_goes_megamorphic_past_limit() {
    let mut cache = InlineCache::new();
    for shape in 0..4 {
        cache.update(ShapeId(shape), CacheHit::Own(shape));
    }
    assert!(!cache.is_megamorphic());
    cache.update(ShapeId(4), CacheHit::Own(4));
    assert!(cache.is_megamorphic());
    assert_eq!(cache.lookup(ShapeId(0)), None);
}

#[test]
fn test_cache_evicts_stale_entry() {
    let mut cache = InlineCache::new();
    let holder = ObjectId(7);
    cache.update(
        ShapeId(1),
        CacheHit::Prototype {
            holder,
            holder_shape: ShapeId(9),
            offset: 0,
        },
    );
    cache.evict(ShapeId(1));
    assert_eq!(cache, InlineCache::Uninitialized);
}

// ============================================================================
// Upvalues
// ============================================================================

#[test]
fn test_open_upvalue_aliases_register() {
    let registers = Rc::new(RefCell::new(vec![Value::from(1), Value::from(2)]));
    let mut upvalue = Upvalue::new_open(registers.clone(), 1);
    assert!(upvalue.is_open());

    upvalue.set(Value::from(20));
    assert_eq!(registers.borrow()[1], Value::from(20));
    registers.borrow_mut()[1] = Value::from(21);
    assert_eq!(upvalue.get(), Value::from(21));
}

#[test]
fn test_closed_upvalue_detaches_from_register() {
    let registers = Rc::new(RefCell::new(vec![Value::from("kept")]));
    let handle = new_upvalue_handle(Upvalue::new_open(registers.clone(), 0));
    handle.borrow_mut().close();
    registers.borrow_mut()[0] = Value::from("changed");

    let upvalue = handle.borrow();
    assert!(!upvalue.is_open());
    assert_eq!(upvalue.get(), Value::from("kept"));
}

// ============================================================================
// Property access through inline caches
// ============================================================================

/// `function getX(o) { return o.x }` with a single cached site
fn install_get_x(vm: &mut VM) -> Value {
    let mut inner = ChunkBuilder::new("getX", FunctionKind::Normal).with_params(1);
    let (o, out) = (inner.param(0), inner.register());
    inner.get_named(out, o, "x");
    inner.emit(Opcode::Return { value: out });

    let mut b = ChunkBuilder::script();
    let r = b.register();
    let function = b.function(inner.finish().unwrap());
    b.emit(Opcode::CreateClosure { dst: r, function });
    b.emit(Opcode::Return { value: r });
    vm.execute(&b.finish().unwrap()).unwrap()
}

fn cache_staleness_scenario(config: EngineConfig) {
    let mut vm = VM::with_config(config);
    let get_x = install_get_x(&mut vm);
    let read = |vm: &mut VM, target: &Value| {
        vm.call_function(&get_x, &Value::Undefined, &[target.clone()]).unwrap()
    };

    let proto = vm.create_object();
    vm.set_property(&proto, "x".into(), Value::from(1), true).unwrap();
    let object = vm.create_object();
    let id = object.as_object().unwrap();
    assert!(vm.set_prototype_of(id, proto.as_object()).unwrap());

    assert_eq!(read(&mut vm, &object), Value::from(1));
    assert_eq!(read(&mut vm, &object), Value::from(1));

    // prototype property changed behind the cached receiver shape
    vm.set_property(&proto, "x".into(), Value::from(2), true).unwrap();
    assert_eq!(read(&mut vm, &object), Value::from(2));

    // own property shadows the prototype
    vm.set_property(&object, "x".into(), Value::from(3), true).unwrap();
    assert_eq!(read(&mut vm, &object), Value::from(3));

    // deleting the shadow exposes the prototype again
    assert!(vm.delete_property(&object, &"x".into(), true).unwrap());
    assert_eq!(read(&mut vm, &object), Value::from(2));

    // swapping the prototype
    let other = vm.create_object();
    vm.set_property(&other, "x".into(), Value::from(9), true).unwrap();
    assert!(vm.set_prototype_of(id, other.as_object()).unwrap());
    assert_eq!(read(&mut vm, &object), Value::from(9));

    // accessor replacing a cached data property
    let getter = vm.register_host_function("getter", 0, |_, _, _| Ok(Value::from("computed")));
    let other_id = other.as_object().unwrap();
    let accessor = PropertyDescriptor {
        get: Some(getter),
        ..PropertyDescriptor::default()
    };
    assert!(vm.define_own_property(other_id, "x".into(), accessor).unwrap());
    assert_eq!(read(&mut vm, &object), Value::from("computed"));

    // many receiver shapes at one site
    for i in 0..8 {
        let receiver = vm.create_object();
        vm.set_property(&receiver, PropertyKey::from(format!("pad{}", i).as_str()), Value::Null, true)
            .unwrap();
        vm.set_property(&receiver, "x".into(), Value::from(i), true).unwrap();
        assert_eq!(read(&mut vm, &receiver), Value::from(i));
    }
}

#[test]
fn test_cached_reads_observe_every_mutation() {
    cache_staleness_scenario(EngineConfig::default());
}

#[test]
fn test_uncached_reads_match_cached_reads() {
    cache_staleness_scenario(EngineConfig::default().with_inline_caches(false));
}

#[test]
fn test_prototype_cycle_is_rejected() {
    let mut vm = VM::new();
    let a = vm.create_object().as_object().unwrap();
    let b = vm.create_object().as_object().unwrap();
    assert!(vm.set_prototype_of(b, Some(a)).unwrap());
    assert!(!vm.set_prototype_of(a, Some(b)).unwrap());
    assert!(!vm.set_prototype_of(a, Some(a)).unwrap());
}

#[test]
fn test_non_extensible_rejects_new_properties() {
    let mut vm = VM::new();
    let object = vm.create_object();
    let id = object.as_object().unwrap();
    vm.set_property(&object, "a".into(), Value::from(1), true).unwrap();
    assert!(vm.prevent_extensions(id));
    assert!(!vm.is_extensible(id));

    let err = vm.set_property(&object, "b".into(), Value::from(2), true).unwrap_err();
    assert_eq!(err.as_error().map(|e| e.kind), Some(ErrorKind::TypeError));
    // sloppy writes fail silently
    vm.set_property(&object, "b".into(), Value::from(2), false).unwrap();
    assert_eq!(vm.get_own_property(id, &"b".into()), None);
    // existing properties stay writable
    vm.set_property(&object, "a".into(), Value::from(5), true).unwrap();
    assert_eq!(vm.get_property(&object, &"a".into()).unwrap(), Value::from(5));
}

#[test]
fn test_frozen_object_rejects_writes() {
    let mut vm = VM::new();
    let object = vm.create_object();
    let id = object.as_object().unwrap();
    vm.set_property(&object, "a".into(), Value::from(1), true).unwrap();
    assert!(vm.freeze(id));
    assert!(vm.is_frozen(id));
    assert!(vm.set_property(&object, "a".into(), Value::from(2), true).is_err());
    assert!(!vm.delete_property(&object, &"a".into(), false).unwrap());
    assert_eq!(vm.get_property(&object, &"a".into()).unwrap(), Value::from(1));
}

#[test]
fn test_array_length_tracks_elements() {
    let mut vm = VM::new();
    let array = vm.create_array(vec![Value::from(1), Value::from(2), Value::from(3)]);
    assert!(vm.is_array(&array));
    assert_eq!(vm.get_property(&array, &"length".into()).unwrap(), Value::from(3));

    vm.set_property(&array, PropertyKey::index(5), Value::from(6), true).unwrap();
    assert_eq!(vm.get_property(&array, &"length".into()).unwrap(), Value::from(6));
    assert_eq!(vm.display_value(&array), "1,2,3,,,6");

    vm.set_property(&array, "length".into(), Value::from(1), true).unwrap();
    assert_eq!(vm.display_value(&array), "1");
}

// ============================================================================
// Conversions
// ============================================================================

#[test]
fn test_symbols_refuse_implicit_string_conversion() {
    let mut vm = VM::new();
    let symbol = vm.new_symbol(Some("s"));
    let err = vm.to_string(&symbol).unwrap_err();
    assert_eq!(err.as_error().map(|e| e.kind), Some(ErrorKind::TypeError));
    assert_eq!(vm.display_value(&symbol), "Symbol(s)");
}

#[test]
fn test_loose_equality_coerces() {
    let mut vm = VM::new();
    assert!(vm.loose_equals(&Value::from("1"), &Value::from(1)).unwrap());
    assert!(vm.loose_equals(&Value::Null, &Value::Undefined).unwrap());
    assert!(!vm.loose_equals(&Value::Null, &Value::from(0)).unwrap());
}

#[test]
fn test_object_to_primitive_uses_value_of() {
    let mut vm = VM::new();
    let object = vm.create_object();
    let value_of = vm.register_host_function("valueOf", 0, |_, _, _| Ok(Value::from(41)));
    vm.set_property(&object, "valueOf".into(), value_of, true).unwrap();
    assert_eq!(vm.to_number(&object).unwrap(), 41.0);
    assert_eq!(&*vm.to_string(&object).unwrap(), "[object Object]");
}
