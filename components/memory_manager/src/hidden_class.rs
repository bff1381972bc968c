//! Hidden classes (shapes) for inline-cached property access.
//!
//! Objects that received the same own keys in the same order, starting
//! from the same prototype, share a hidden class. A shape id therefore
//! identifies both the property layout (key -> slot offset) and the
//! prototype, which is what inline caches key on.
//!
//! Layout changes other than appending a key (delete, attribute change,
//! prototype change) move the object to a fresh *unique* class that no
//! other object shares, so caches keyed on the old class stop matching.

use core_types::{ObjectId, PropertyKey};
use rustc_hash::FxHashMap;

/// Identity of a hidden class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeId(pub u32);

/// A node of the transition tree.
#[derive(Debug)]
pub struct HiddenClass {
    /// Prototype shared by every object of this class
    pub prototype: Option<ObjectId>,
    /// Number of own properties in the layout
    pub property_count: u32,
    /// Classes reached by appending one key
    transitions: FxHashMap<PropertyKey, ShapeId>,
    /// Unique classes never share transitions with other objects
    unique: bool,
}

impl HiddenClass {
    /// Returns true for classes that belong to a single object.
    pub fn is_unique(&self) -> bool {
        self.unique
    }
}

/// Owner of every hidden class.
///
/// # Example
///
/// ```
/// use memory_manager::ShapeTable;
///
/// let mut shapes = ShapeTable::new();
/// let root = shapes.root(None);
/// let with_x = shapes.transition(root, &"x".into());
/// let again = shapes.transition(root, &"x".into());
/// assert_eq!(with_x, again);
/// assert_ne!(root, with_x);
/// ```
#[derive(Debug, Default)]
pub struct ShapeTable {
    classes: Vec<HiddenClass>,
    roots: FxHashMap<Option<ObjectId>, ShapeId>,
}

impl ShapeTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, class: HiddenClass) -> ShapeId {
        self.classes.push(class);
        ShapeId(self.classes.len() as u32 - 1)
    }

    /// Returns the empty class for objects with the given prototype.
    pub fn root(&mut self, prototype: Option<ObjectId>) -> ShapeId {
        if let Some(&id) = self.roots.get(&prototype) {
            return id;
        }
        let id = self.push(HiddenClass {
            prototype,
            property_count: 0,
            transitions: FxHashMap::default(),
            unique: false,
        });
        self.roots.insert(prototype, id);
        id
    }

    /// Returns the class reached from `from` by appending `key`.
    pub fn transition(&mut self, from: ShapeId, key: &PropertyKey) -> ShapeId {
        if let Some(&next) = self
            .classes
            .get(from.0 as usize)
            .and_then(|class| class.transitions.get(key))
        {
            return next;
        }
        let (prototype, property_count) = match self.classes.get(from.0 as usize) {
            Some(class) => (class.prototype, class.property_count),
            None => (None, 0),
        };
        let next = self.push(HiddenClass {
            prototype,
            property_count: property_count + 1,
            transitions: FxHashMap::default(),
            unique: false,
        });
        if let Some(class) = self.classes.get_mut(from.0 as usize) {
            class.transitions.insert(key.clone(), next);
        }
        next
    }

    /// Allocates a class no other object shares.
    pub fn unique(&mut self, prototype: Option<ObjectId>, property_count: u32) -> ShapeId {
        self.push(HiddenClass {
            prototype,
            property_count,
            transitions: FxHashMap::default(),
            unique: true,
        })
    }

    /// Looks up a class.
    pub fn get(&self, id: ShapeId) -> Option<&HiddenClass> {
        self.classes.get(id.0 as usize)
    }

    /// Number of classes ever created.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Returns true if no class was created yet.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Drops root entries for prototypes that were collected, so a recycled
    /// object id never inherits a stale layout.
    pub fn forget_prototype(&mut self, prototype: ObjectId) {
        self.roots.remove(&Some(prototype));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roots_are_per_prototype() {
        let mut shapes = ShapeTable::new();
        let a = shapes.root(Some(ObjectId(1)));
        let b = shapes.root(Some(ObjectId(2)));
        assert_ne!(a, b);
        assert_eq!(shapes.root(Some(ObjectId(1))), a);
        assert_eq!(shapes.get(a).and_then(|c| c.prototype), Some(ObjectId(1)));
    }

    #[test]
    fn test_key_order_matters() {
        let mut shapes = ShapeTable::new();
        let root = shapes.root(None);
        let xy = {
            let x = shapes.transition(root, &"x".into());
            shapes.transition(x, &"y".into())
        };
        let yx = {
            let y = shapes.transition(root, &"y".into());
            shapes.transition(y, &"x".into())
        };
        assert_ne!(xy, yx);
        assert_eq!(shapes.get(xy).map(|c| c.property_count), Some(2));
    }

    #[test]
    fn test_unique_classes_are_never_reused() {
        let mut shapes = ShapeTable::new();
        let a = shapes.unique(None, 0);
        let b = shapes.unique(None, 0);
        assert_ne!(a, b);
        assert!(shapes.get(a).map(HiddenClass::is_unique).unwrap_or(false));
    }

    #[test]
    fn test_forgotten_root_is_recreated() {
        let mut shapes = ShapeTable::new();
        let proto = Some(ObjectId(9));
        let first = shapes.root(proto);
        shapes.forget_prototype(ObjectId(9));
        assert_ne!(shapes.root(proto), first);
    }
}
