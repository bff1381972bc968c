//! Contract tests for the heap API consumed by the interpreter

use core_types::{ObjectId, Value};
use memory_manager::{Heap, Property, PropertySlot, Trace, Tracer};

#[derive(Debug)]
struct Slots(Vec<Value>);

impl Trace for Slots {
    fn trace(&self, tracer: &mut Tracer) {
        tracer.mark_values(&self.0);
    }
}

/// Prototype changes move the object to a class of its own
#[test]
fn test_prototype_change_invalidates_shape() {
    let mut heap: Heap<Slots> = Heap::new();
    let p1 = heap.allocate(None, Slots(vec![]));
    let p2 = heap.allocate(None, Slots(vec![]));
    let a = heap.allocate(Some(p1), Slots(vec![]));
    let b = heap.allocate(Some(p1), Slots(vec![]));
    assert_eq!(heap.shape_of(a), heap.shape_of(b));

    heap.set_prototype(b, Some(p2));
    assert_ne!(heap.shape_of(a), heap.shape_of(b));
    assert_eq!(heap.prototype_of(b), Some(p2));
}

/// Objects created with different prototypes never share a shape
#[test]
fn test_shape_implies_prototype() {
    let mut heap: Heap<Slots> = Heap::new();
    let p1 = heap.allocate(None, Slots(vec![]));
    let p2 = heap.allocate(None, Slots(vec![]));
    let a = heap.allocate(Some(p1), Slots(vec![]));
    let b = heap.allocate(Some(p2), Slots(vec![]));
    heap.define(a, "x".into(), Property::data(Value::Null));
    heap.define(b, "x".into(), Property::data(Value::Null));
    assert_ne!(heap.shape_of(a), heap.shape_of(b));
}

/// Lookup reports the slot offset used by inline caches
#[test]
fn test_lookup_reports_offsets() {
    let mut heap: Heap<Slots> = Heap::new();
    let a = heap.allocate(None, Slots(vec![]));
    heap.define(a, "x".into(), Property::data(Value::Number(1.0)));
    heap.define(a, "y".into(), Property::data(Value::Number(2.0)));
    let object = heap.get(a).unwrap();
    let (offset, property) = object.lookup(&"y".into()).unwrap();
    assert_eq!(offset, 1);
    assert!(matches!(
        property.slot,
        PropertySlot::Data { value: Value::Number(n), writable: true } if n == 2.0
    ));
    assert_eq!(object.property_at(offset).map(|(k, _)| k.clone()), Some("y".into()));
}

/// Values held in internal slots are traced
#[test]
fn test_slot_references_survive_collection() {
    let mut heap: Heap<Slots> = Heap::new();
    let child = heap.allocate(None, Slots(vec![]));
    let parent = heap.allocate(None, Slots(vec![Value::Function(child)]));
    let garbage = heap.allocate(None, Slots(vec![]));
    let stats = heap.collect([parent]);
    assert_eq!(stats.freed, 1);
    assert!(heap.contains(child));
    assert!(!heap.contains(garbage));
    assert!(heap.get(ObjectId(999)).is_none());
}

/// Extensibility is recorded but not enforced by the heap
#[test]
fn test_prevent_extensions_flag() {
    let mut heap: Heap<Slots> = Heap::new();
    let a = heap.allocate(None, Slots(vec![]));
    assert!(heap.is_extensible(a));
    heap.prevent_extensions(a);
    assert!(!heap.is_extensible(a));
}
