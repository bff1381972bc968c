//! Unit tests for PromiseRecord

use async_runtime::{PromiseRecord, PromiseState, Registration, Settlement};

#[test]
fn new_promise_is_pending() {
    let promise: PromiseRecord<i32, ()> = PromiseRecord::new();
    assert!(promise.is_pending());
    assert_eq!(promise.pending_reactions(), 0);
}

#[test]
fn fulfill_changes_state_once() {
    let mut promise: PromiseRecord<i32, ()> = PromiseRecord::new();
    assert_eq!(promise.fulfill(42), Some(vec![]));
    assert_eq!(promise.fulfill(43), None);
    assert_eq!(promise.reject(1), None);
    assert_eq!(promise.state(), &PromiseState::Fulfilled(42));
}

#[test]
fn reject_hands_back_reactions_in_order() {
    let mut promise: PromiseRecord<&str, u8> = PromiseRecord::new();
    for reaction in 1..=3 {
        assert_eq!(promise.register(reaction), Registration::Queued);
    }
    assert_eq!(promise.reject("boom"), Some(vec![1, 2, 3]));
    assert_eq!(promise.pending_reactions(), 0);
}

#[test]
fn register_on_fulfilled_promise_is_ready() {
    let mut promise: PromiseRecord<i32, char> = PromiseRecord::new();
    promise.fulfill(7);
    assert_eq!(
        promise.register('r'),
        Registration::Ready {
            reaction: 'r',
            settlement: Settlement::Fulfilled,
            value: 7,
        }
    );
}

#[test]
fn mark_handled_without_reaction() {
    let mut promise: PromiseRecord<i32, ()> = PromiseRecord::new();
    promise.mark_handled();
    assert!(promise.is_handled());
}

#[test]
fn settlement_display() {
    assert_eq!(Settlement::Fulfilled.to_string(), "fulfilled");
    assert_eq!(Settlement::Rejected.to_string(), "rejected");
}
