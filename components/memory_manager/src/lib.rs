//! Memory Manager - object arena, hidden classes and tracing collection
//!
//! This component provides:
//! - An arena of objects addressed by stable [`ObjectId`](core_types::ObjectId) handles
//! - Hidden classes (shapes) kept in sync with every layout change
//! - Insertion-ordered own-property tables with data and accessor records
//! - Tri-color mark-sweep collection driven by caller-supplied roots
//!
//! The internal-slot payload of an object is a type parameter so the
//! interpreter can define its own slots and report their references
//! through [`Trace`].

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod gc;
pub mod heap;
pub mod hidden_class;
pub mod object;
pub mod property;

// Re-export main types
pub use gc::{GcStats, MarkColor, Trace, Tracer};
pub use heap::{Heap, HeapStats};
pub use hidden_class::{HiddenClass, ShapeId, ShapeTable};
pub use object::{JSObject, PropertyMap};
pub use property::{Property, PropertySlot};
