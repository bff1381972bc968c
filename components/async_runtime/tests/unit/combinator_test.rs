//! Unit tests for combinator aggregation

use async_runtime::{Aggregate, CombinatorKind};

#[test]
fn synchronous_reports_wait_for_iteration_end() {
    let mut all = Aggregate::new(CombinatorKind::All);
    let a = all.reserve();
    assert_eq!(all.record(a, 1), None);
    let b = all.reserve();
    assert_eq!(all.record(b, 2), None);
    assert!(!all.is_complete());
    assert_eq!(all.finish_iteration(), Some(vec![1, 2]));
}

#[test]
fn entries_keep_input_order() {
    let mut all = Aggregate::new(CombinatorKind::All);
    let indices: Vec<usize> = (0..3).map(|_| all.reserve()).collect();
    assert_eq!(all.finish_iteration(), None);
    assert_eq!(all.record(indices[2], "c"), None);
    assert_eq!(all.record(indices[0], "a"), None);
    assert_eq!(all.record(indices[1], "b"), Some(vec!["a", "b", "c"]));
}

#[test]
fn kind_names() {
    assert_eq!(CombinatorKind::Any.name(), "Promise.any");
    assert_eq!(Aggregate::<()>::new(CombinatorKind::AllSettled).kind(), CombinatorKind::AllSettled);
}
