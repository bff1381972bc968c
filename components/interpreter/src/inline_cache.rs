//! Inline caching system for property access optimization
//!
//! Provides mono/poly/megamorphic caching states for fast named property
//! lookups. A cache entry is keyed by the receiver's shape, which fixes
//! both the receiver's layout and its prototype, and records where the
//! property was found.

use arrayvec::ArrayVec;
use core_types::ObjectId;
use memory_manager::ShapeId;

/// Polymorphic caches hold at most this many shapes
pub const POLYMORPHIC_LIMIT: usize = 4;

/// Where a cached property lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheHit {
    /// Own data property at this slot offset
    Own(u32),
    /// Data property of the receiver's direct prototype
    Prototype {
        /// The prototype object
        holder: ObjectId,
        /// Shape the prototype had when the entry was recorded
        holder_shape: ShapeId,
        /// Slot offset in the prototype
        offset: u32,
    },
}

/// Inline cache for property access optimization
///
/// Transitions through states as more shapes are encountered.
#[derive(Debug, Clone, PartialEq)]
pub enum InlineCache {
    /// No shape cached yet
    Uninitialized,
    /// Single shape cached (most common case)
    Monomorphic {
        /// The cached receiver shape
        shape: ShapeId,
        /// Where the property was found for that shape
        hit: CacheHit,
    },
    /// Multiple shapes cached (up to 4)
    Polymorphic {
        /// List of (shape, hit) pairs
        entries: ArrayVec<(ShapeId, CacheHit), POLYMORPHIC_LIMIT>,
    },
    /// Too many shapes, always use the full lookup
    Megamorphic,
}

impl InlineCache {
    /// Create a new uninitialized cache
    pub fn new() -> Self {
        InlineCache::Uninitialized
    }

    /// Look up the recorded location for a receiver shape
    pub fn lookup(&self, shape: ShapeId) -> Option<CacheHit> {
        match self {
            InlineCache::Uninitialized | InlineCache::Megamorphic => None,
            InlineCache::Monomorphic {
                shape: cached_shape,
                hit,
            } => (*cached_shape == shape).then_some(*hit),
            InlineCache::Polymorphic { entries } => entries
                .iter()
                .find(|(s, _)| *s == shape)
                .map(|(_, hit)| *hit),
        }
    }

    /// Record a location for a receiver shape
    ///
    /// Transitions cache state as needed:
    /// - Uninitialized → Monomorphic
    /// - Monomorphic → Polymorphic (if different shape)
    /// - Polymorphic → Megamorphic (if > 4 shapes)
    pub fn update(&mut self, shape: ShapeId, hit: CacheHit) {
        match self {
            InlineCache::Uninitialized => {
                *self = InlineCache::Monomorphic { shape, hit };
            }
            InlineCache::Monomorphic {
                shape: cached_shape,
                hit: cached_hit,
            } => {
                if *cached_shape == shape {
                    *cached_hit = hit;
                } else {
                    let mut entries = ArrayVec::new();
                    entries.push((*cached_shape, *cached_hit));
                    entries.push((shape, hit));
                    *self = InlineCache::Polymorphic { entries };
                }
            }
            InlineCache::Polymorphic { entries } => {
                if let Some(entry) = entries.iter_mut().find(|(s, _)| *s == shape) {
                    entry.1 = hit;
                } else if entries.try_push((shape, hit)).is_err() {
                    *self = InlineCache::Megamorphic;
                }
            }
            InlineCache::Megamorphic => {}
        }
    }

    /// Drop the entry for a shape whose recorded location went stale
    pub fn evict(&mut self, shape: ShapeId) {
        match self {
            InlineCache::Monomorphic {
                shape: cached_shape,
                ..
            } if *cached_shape == shape => *self = InlineCache::Uninitialized,
            InlineCache::Polymorphic { entries } => entries.retain(|(s, _)| *s != shape),
            _ => {}
        }
    }

    /// Returns true once the cache gave up on this site
    pub fn is_megamorphic(&self) -> bool {
        matches!(self, InlineCache::Megamorphic)
    }
}

impl Default for InlineCache {
    fn default() -> Self {
        Self::new()
    }
}
