//! Tracing mark-sweep collection over the object arena.
//!
//! Marking is tri-color: roots start gray, scanning an object blackens it
//! and grays every white object it references. Sweeping frees every slot
//! still white and recycles its id.

use core_types::{ObjectId, Value};

use crate::heap::Heap;
use crate::property::PropertySlot;

/// Mark colors for tri-color marking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MarkColor {
    /// Unmarked (not yet visited)
    White = 0,
    /// Reachable, needs scanning
    Gray = 1,
    /// Fully processed (reachable, all references scanned)
    Black = 2,
}

/// Collects the object references reachable from a value.
#[derive(Debug, Default)]
pub struct Tracer {
    worklist: Vec<ObjectId>,
}

impl Tracer {
    /// Creates a tracer with nothing reported.
    pub fn new() -> Self {
        Self::default()
    }

    /// The objects reported so far, for use as collection roots.
    pub fn into_marked(self) -> Vec<ObjectId> {
        self.worklist
    }

    /// Reports a referenced object.
    pub fn mark(&mut self, id: ObjectId) {
        self.worklist.push(id);
    }

    /// Reports the object referenced by `value`, if any.
    pub fn mark_value(&mut self, value: &Value) {
        if let Some(id) = value.as_object() {
            self.worklist.push(id);
        }
    }

    /// Reports every object referenced by `values`.
    pub fn mark_values<'a>(&mut self, values: impl IntoIterator<Item = &'a Value>) {
        for value in values {
            self.mark_value(value);
        }
    }
}

/// Implemented by internal-slot payloads that hold references.
pub trait Trace {
    /// Report every object reference held by `self`.
    fn trace(&self, tracer: &mut Tracer);
}

impl Trace for () {
    fn trace(&self, _tracer: &mut Tracer) {}
}

impl Trace for Value {
    fn trace(&self, tracer: &mut Tracer) {
        tracer.mark_value(self);
    }
}

/// Result of one collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Objects found reachable
    pub marked: usize,
    /// Objects freed
    pub freed: usize,
}

impl<K: Trace> Heap<K> {
    /// Frees every object not reachable from `roots`.
    pub fn collect(&mut self, roots: impl IntoIterator<Item = ObjectId>) -> GcStats {
        let mut colors = vec![MarkColor::White; self.objects.len()];
        let mut tracer = Tracer::default();
        tracer.worklist.extend(roots);

        let mut marked = 0;
        while let Some(id) = tracer.worklist.pop() {
            let Some(color) = colors.get_mut(id.index()) else {
                continue;
            };
            if *color != MarkColor::White {
                continue;
            }
            let Some(object) = self.objects.get(id.index()).and_then(Option::as_ref) else {
                continue;
            };
            *color = MarkColor::Gray;

            if let Some(prototype) = object.prototype {
                tracer.mark(prototype);
            }
            for property in object.properties.values() {
                match &property.slot {
                    PropertySlot::Data { value, .. } => tracer.mark_value(value),
                    PropertySlot::Accessor { getter, setter } => {
                        tracer.mark_value(getter);
                        tracer.mark_value(setter);
                    }
                }
            }
            object.kind.trace(&mut tracer);

            colors[id.index()] = MarkColor::Black;
            marked += 1;
        }

        let mut freed = 0;
        for (index, color) in colors.iter().enumerate() {
            if *color == MarkColor::White && self.objects[index].is_some() {
                self.objects[index] = None;
                self.free.push(index as u32);
                self.shapes.forget_prototype(ObjectId(index as u32));
                freed += 1;
            }
        }

        self.stats.live -= freed;
        self.stats.allocated_since_gc = 0;
        self.stats.collections += 1;
        GcStats { marked, freed }
    }
}
