//! Promise records.
//!
//! A [`PromiseRecord`] holds the state of one promise and the reactions
//! registered while it is pending. It is generic over the settled value `V`
//! and the reaction payload `R`, so it knows nothing about how reactions
//! run: settling hands the queued reactions back to the caller, which turns
//! them into microtasks in registration order.

use std::fmt;

/// The state of a promise.
///
/// A promise transitions at most once, from `Pending` to either settled
/// state.
#[derive(Debug, Clone, PartialEq)]
pub enum PromiseState<V> {
    /// Neither fulfilled nor rejected yet.
    Pending,
    /// Fulfilled with a value.
    Fulfilled(V),
    /// Rejected with a reason.
    Rejected(V),
}

impl<V> PromiseState<V> {
    /// Returns true while the promise has not settled.
    pub fn is_pending(&self) -> bool {
        matches!(self, PromiseState::Pending)
    }
}

/// Which way a promise settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Settlement {
    /// The promise was fulfilled.
    Fulfilled,
    /// The promise was rejected.
    Rejected,
}

impl fmt::Display for Settlement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Settlement::Fulfilled => write!(f, "fulfilled"),
            Settlement::Rejected => write!(f, "rejected"),
        }
    }
}

/// Outcome of registering a reaction.
#[derive(Debug, PartialEq)]
pub enum Registration<V, R> {
    /// The promise is pending; the reaction was queued on it.
    Queued,
    /// The promise had already settled; the caller must schedule the
    /// reaction itself.
    Ready {
        /// The reaction that was registered
        reaction: R,
        /// How the promise settled
        settlement: Settlement,
        /// The settled value or reason
        value: V,
    },
}

/// State and pending reactions of one promise.
///
/// # Examples
///
/// ```
/// use async_runtime::{PromiseRecord, PromiseState, Registration};
///
/// let mut record: PromiseRecord<i32, &str> = PromiseRecord::new();
/// assert_eq!(record.register("first"), Registration::Queued);
/// assert_eq!(record.register("second"), Registration::Queued);
///
/// // Settling returns the queued reactions in registration order
/// assert_eq!(record.fulfill(42), Some(vec!["first", "second"]));
/// assert_eq!(record.state(), &PromiseState::Fulfilled(42));
///
/// // A second settle attempt is a no-op
/// assert_eq!(record.reject(7), None);
/// ```
#[derive(Debug)]
pub struct PromiseRecord<V, R> {
    state: PromiseState<V>,
    reactions: Vec<R>,
    handled: bool,
}

impl<V: Clone, R> PromiseRecord<V, R> {
    /// Creates a pending promise with no reactions.
    pub fn new() -> Self {
        Self {
            state: PromiseState::Pending,
            reactions: Vec::new(),
            handled: false,
        }
    }

    /// Current state.
    pub fn state(&self) -> &PromiseState<V> {
        &self.state
    }

    /// Returns true while the promise has not settled.
    pub fn is_pending(&self) -> bool {
        self.state.is_pending()
    }

    /// Number of reactions waiting for the promise to settle.
    pub fn pending_reactions(&self) -> usize {
        self.reactions.len()
    }

    /// Reactions waiting for the promise to settle, in registration order.
    pub fn reactions(&self) -> impl Iterator<Item = &R> {
        self.reactions.iter()
    }

    /// Fulfills the promise. Returns the reactions to schedule, or `None`
    /// if the promise had already settled.
    pub fn fulfill(&mut self, value: V) -> Option<Vec<R>> {
        self.settle(PromiseState::Fulfilled(value))
    }

    /// Rejects the promise. Returns the reactions to schedule, or `None`
    /// if the promise had already settled.
    pub fn reject(&mut self, reason: V) -> Option<Vec<R>> {
        self.settle(PromiseState::Rejected(reason))
    }

    fn settle(&mut self, state: PromiseState<V>) -> Option<Vec<R>> {
        if !self.state.is_pending() {
            return None;
        }
        self.state = state;
        Some(std::mem::take(&mut self.reactions))
    }

    /// Registers a reaction. Registering any reaction marks the promise as
    /// handled.
    pub fn register(&mut self, reaction: R) -> Registration<V, R> {
        self.handled = true;
        match &self.state {
            PromiseState::Pending => {
                self.reactions.push(reaction);
                Registration::Queued
            }
            PromiseState::Fulfilled(value) => Registration::Ready {
                reaction,
                settlement: Settlement::Fulfilled,
                value: value.clone(),
            },
            PromiseState::Rejected(reason) => Registration::Ready {
                reaction,
                settlement: Settlement::Rejected,
                value: reason.clone(),
            },
        }
    }

    /// Whether a reaction was ever registered.
    pub fn is_handled(&self) -> bool {
        self.handled
    }

    /// Marks the promise as handled without registering a reaction.
    pub fn mark_handled(&mut self) {
        self.handled = true;
    }
}

impl<V: Clone, R> Default for PromiseRecord<V, R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Promises rejected while nobody was listening.
///
/// Rejections are recorded as they happen; a handler attached before the
/// next checkpoint removes the entry again. What survives a checkpoint is
/// reported once.
#[derive(Debug)]
pub struct RejectionTracker<K> {
    pending: Vec<K>,
}

impl<K: PartialEq> RejectionTracker<K> {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Records a rejection that had no handler.
    pub fn rejected(&mut self, promise: K) {
        if !self.pending.contains(&promise) {
            self.pending.push(promise);
        }
    }

    /// Records that a handler was attached to `promise`.
    pub fn handled(&mut self, promise: &K) {
        self.pending.retain(|p| p != promise);
    }

    /// Removes and returns every rejection still unhandled.
    pub fn take(&mut self) -> Vec<K> {
        std::mem::take(&mut self.pending)
    }

    /// Returns true if nothing is awaiting report.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// The recorded promises.
    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.pending.iter()
    }
}

impl<K: PartialEq> Default for RejectionTracker<K> {
    fn default() -> Self {
        Self::new()
    }
}
