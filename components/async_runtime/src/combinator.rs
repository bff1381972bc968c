//! Bookkeeping for the promise combinators.
//!
//! `Promise.all`, `Promise.allSettled` and `Promise.any` collect one entry
//! per input and finish when the last input has reported. An [`Aggregate`]
//! starts with one outstanding count for the iteration itself, so inputs
//! that settle synchronously cannot finish it before every input was seen.

/// Which combinator an aggregate belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CombinatorKind {
    /// `Promise.all`: collects fulfillment values
    All,
    /// `Promise.allSettled`: collects status records
    AllSettled,
    /// `Promise.any`: collects rejection reasons
    Any,
}

impl CombinatorKind {
    /// Name of the static method.
    pub fn name(self) -> &'static str {
        match self {
            CombinatorKind::All => "Promise.all",
            CombinatorKind::AllSettled => "Promise.allSettled",
            CombinatorKind::Any => "Promise.any",
        }
    }
}

/// Entries collected so far by one combinator call.
///
/// # Examples
///
/// ```
/// use async_runtime::{Aggregate, CombinatorKind};
///
/// let mut all = Aggregate::new(CombinatorKind::All);
/// let first = all.reserve();
/// let second = all.reserve();
/// assert_eq!(all.record(second, "b"), None);
/// assert_eq!(all.record(first, "a"), None);
/// // Every input reported; closing the iteration completes the list
/// assert_eq!(all.finish_iteration(), Some(vec!["a", "b"]));
/// ```
#[derive(Debug)]
pub struct Aggregate<V> {
    kind: CombinatorKind,
    entries: Vec<Option<V>>,
    remaining: usize,
}

impl<V> Aggregate<V> {
    /// Creates an aggregate with the iteration still open.
    pub fn new(kind: CombinatorKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
            remaining: 1,
        }
    }

    /// The combinator this aggregate belongs to.
    pub fn kind(&self) -> CombinatorKind {
        self.kind
    }

    /// Reserves the entry for the next input, returning its index.
    pub fn reserve(&mut self) -> usize {
        self.entries.push(None);
        self.remaining += 1;
        self.entries.len() - 1
    }

    /// Records the entry for input `index`. Returns the complete list once
    /// the last outstanding input reports. A second report for the same
    /// input is ignored.
    pub fn record(&mut self, index: usize, value: V) -> Option<Vec<V>> {
        match self.entries.get_mut(index) {
            Some(slot @ None) => *slot = Some(value),
            _ => return None,
        }
        self.release()
    }

    /// Marks the input iteration as finished. Returns the complete list if
    /// every input had already reported (including when there were none).
    pub fn finish_iteration(&mut self) -> Option<Vec<V>> {
        self.release()
    }

    /// Number of inputs reserved so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no input was reserved.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries reported so far.
    pub fn entries(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().flatten()
    }

    /// Returns true once the list was handed out.
    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }

    fn release(&mut self) -> Option<Vec<V>> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        if self.remaining > 0 {
            return None;
        }
        Some(std::mem::take(&mut self.entries).into_iter().flatten().collect())
    }
}
