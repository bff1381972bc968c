//! Object arena.
//!
//! Objects are addressed by stable [`ObjectId`] indices instead of
//! pointers, so cyclic graphs (prototype chains, closures referring to each
//! other) never dangle. Every layout-changing mutation goes through the
//! heap so the object's hidden class stays in sync with its property table.

use core_types::{ObjectId, PropertyKey, Value};

use crate::hidden_class::{ShapeId, ShapeTable};
use crate::object::JSObject;
use crate::property::{Property, PropertySlot};

/// Allocation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Objects currently allocated
    pub live: usize,
    /// Objects allocated since the heap was created
    pub allocated_total: usize,
    /// Objects allocated since the last collection
    pub allocated_since_gc: usize,
    /// Collections performed
    pub collections: usize,
}

/// Arena of objects with internal-slot payload `K`
#[derive(Debug)]
pub struct Heap<K> {
    pub(crate) objects: Vec<Option<JSObject<K>>>,
    pub(crate) free: Vec<u32>,
    pub(crate) shapes: ShapeTable,
    pub(crate) stats: HeapStats,
}

impl<K> Heap<K> {
    /// Creates an empty heap.
    pub fn new() -> Self {
        Heap {
            objects: Vec::new(),
            free: Vec::new(),
            shapes: ShapeTable::new(),
            stats: HeapStats::default(),
        }
    }

    /// Allocates an object with no own properties.
    pub fn allocate(&mut self, prototype: Option<ObjectId>, kind: K) -> ObjectId {
        let shape = self.shapes.root(prototype);
        let object = JSObject::new(shape, prototype, kind);
        self.stats.live += 1;
        self.stats.allocated_total += 1;
        self.stats.allocated_since_gc += 1;
        match self.free.pop() {
            Some(index) => {
                self.objects[index as usize] = Some(object);
                ObjectId(index)
            }
            None => {
                self.objects.push(Some(object));
                ObjectId(self.objects.len() as u32 - 1)
            }
        }
    }

    /// Returns the object, if `id` is live.
    pub fn get(&self, id: ObjectId) -> Option<&JSObject<K>> {
        self.objects.get(id.index()).and_then(Option::as_ref)
    }

    /// Returns the object mutably; only the internal slots are writable
    /// from outside this crate.
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut JSObject<K>> {
        self.objects.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Internal slots of the object.
    pub fn kind(&self, id: ObjectId) -> Option<&K> {
        self.get(id).map(|object| &object.kind)
    }

    /// Internal slots of the object, mutably.
    pub fn kind_mut(&mut self, id: ObjectId) -> Option<&mut K> {
        self.get_mut(id).map(|object| &mut object.kind)
    }

    /// Returns true if `id` refers to a live object.
    pub fn contains(&self, id: ObjectId) -> bool {
        self.get(id).is_some()
    }

    /// Prototype of the object (None for null or a dead id).
    pub fn prototype_of(&self, id: ObjectId) -> Option<ObjectId> {
        self.get(id).and_then(JSObject::prototype)
    }

    /// Hidden class of the object.
    pub fn shape_of(&self, id: ObjectId) -> Option<ShapeId> {
        self.get(id).map(JSObject::shape)
    }

    /// Own property by key.
    pub fn get_own(&self, id: ObjectId, key: &PropertyKey) -> Option<&Property> {
        self.get(id).and_then(|object| object.get_own(key))
    }

    /// Inserts or replaces an own property.
    ///
    /// Appending a key follows the shared transition tree; replacing a
    /// property with one of a different kind or attributes moves the
    /// object to a unique class. Replacing only the value keeps the class.
    pub fn define(&mut self, id: ObjectId, key: PropertyKey, property: Property) -> bool {
        let Some(object) = self.objects.get_mut(id.index()).and_then(Option::as_mut) else {
            return false;
        };
        match object.properties.get_mut(&key) {
            Some(existing) => {
                let same_layout = existing.same_layout(&property);
                *existing = property;
                if !same_layout {
                    let count = object.properties.len() as u32;
                    object.shape = self.shapes.unique(object.prototype, count);
                }
            }
            None => {
                object.shape = self.shapes.transition(object.shape, &key);
                object.properties.insert(key, property);
            }
        }
        true
    }

    /// Overwrites the value of the data property at `offset`.
    /// Returns false if there is no data property there.
    pub fn set_value_at(&mut self, id: ObjectId, offset: usize, value: Value) -> bool {
        let Some(object) = self.get_mut(id) else {
            return false;
        };
        match object.properties.get_index_mut(offset) {
            Some((_, Property {
                slot: PropertySlot::Data { value: slot, .. },
                ..
            })) => {
                *slot = value;
                true
            }
            _ => false,
        }
    }

    /// Removes an own property, preserving the order of the remaining ones.
    pub fn remove(&mut self, id: ObjectId, key: &PropertyKey) -> Option<Property> {
        let object = self.objects.get_mut(id.index()).and_then(Option::as_mut)?;
        let removed = object.properties.shift_remove(key)?;
        let count = object.properties.len() as u32;
        object.shape = self.shapes.unique(object.prototype, count);
        Some(removed)
    }

    /// Replaces the prototype link. Cycle and extensibility checks are the
    /// caller's responsibility.
    pub fn set_prototype(&mut self, id: ObjectId, prototype: Option<ObjectId>) -> bool {
        let Some(object) = self.objects.get_mut(id.index()).and_then(Option::as_mut) else {
            return false;
        };
        if object.prototype != prototype {
            object.prototype = prototype;
            let count = object.properties.len() as u32;
            object.shape = self.shapes.unique(prototype, count);
        }
        true
    }

    /// Forbids adding new own properties.
    pub fn prevent_extensions(&mut self, id: ObjectId) -> bool {
        match self.get_mut(id) {
            Some(object) => {
                object.extensible = false;
                true
            }
            None => false,
        }
    }

    /// Whether new own properties may be added.
    pub fn is_extensible(&self, id: ObjectId) -> bool {
        self.get(id).map(JSObject::is_extensible).unwrap_or(false)
    }

    /// Own keys in insertion order.
    pub fn own_keys(&self, id: ObjectId) -> Vec<PropertyKey> {
        self.get(id)
            .map(|object| object.properties.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// The hidden class table.
    pub fn shapes(&self) -> &ShapeTable {
        &self.shapes
    }

    /// Allocation counters.
    pub fn stats(&self) -> HeapStats {
        self.stats
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.stats.live
    }

    /// Returns true if no object is live.
    pub fn is_empty(&self) -> bool {
        self.stats.live == 0
    }
}

impl<K> Default for Heap<K> {
    fn default() -> Self {
        Self::new()
    }
}
