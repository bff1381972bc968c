//! Heap object representation
//!
//! A [`JSObject`] is an insertion-ordered own-property table, a prototype
//! link, an extensible flag, the hidden class describing its layout, and an
//! engine-defined internal-slot payload `K`.

use core_types::{ObjectId, PropertyKey};
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;

use crate::hidden_class::ShapeId;
use crate::property::Property;

/// Insertion-ordered property table; a property's index is its slot offset.
pub type PropertyMap = IndexMap<PropertyKey, Property, FxBuildHasher>;

/// Heap object with hidden class-based property storage
#[derive(Debug)]
pub struct JSObject<K> {
    pub(crate) shape: ShapeId,
    pub(crate) prototype: Option<ObjectId>,
    pub(crate) properties: PropertyMap,
    pub(crate) extensible: bool,
    /// Internal slots (array storage, closure, promise state, ...)
    pub kind: K,
}

impl<K> JSObject<K> {
    pub(crate) fn new(shape: ShapeId, prototype: Option<ObjectId>, kind: K) -> Self {
        JSObject {
            shape,
            prototype,
            properties: PropertyMap::default(),
            extensible: true,
            kind,
        }
    }

    /// Hidden class of the object
    pub fn shape(&self) -> ShapeId {
        self.shape
    }

    /// Prototype link
    pub fn prototype(&self) -> Option<ObjectId> {
        self.prototype
    }

    /// Whether new own properties may be added
    pub fn is_extensible(&self) -> bool {
        self.extensible
    }

    /// Own property by key
    pub fn get_own(&self, key: &PropertyKey) -> Option<&Property> {
        self.properties.get(key)
    }

    /// Own property with its slot offset
    pub fn lookup(&self, key: &PropertyKey) -> Option<(usize, &Property)> {
        self.properties
            .get_full(key)
            .map(|(offset, _, property)| (offset, property))
    }

    /// Own property at a slot offset
    pub fn property_at(&self, offset: usize) -> Option<(&PropertyKey, &Property)> {
        self.properties.get_index(offset)
    }

    /// Own properties in insertion order
    pub fn properties(&self) -> impl Iterator<Item = (&PropertyKey, &Property)> {
        self.properties.iter()
    }

    /// Number of own properties
    pub fn property_count(&self) -> usize {
        self.properties.len()
    }
}
