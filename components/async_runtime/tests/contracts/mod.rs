//! Contract tests for async_runtime
//!
//! The interpreter relies on these guarantees when it builds promises,
//! combinators and its job loop on top of this crate.

use async_runtime::{
    perform_microtask_checkpoint, Aggregate, CombinatorKind, EventLoop, PromiseRecord,
    Registration, RejectionTracker, Scheduler,
};

mod promise_contract {
    use super::*;

    #[test]
    fn settle_is_idempotent() {
        let mut promise: PromiseRecord<u8, u8> = PromiseRecord::new();
        promise.register(1);
        assert_eq!(promise.fulfill(1), Some(vec![1]));
        assert_eq!(promise.fulfill(2), None);
        assert_eq!(promise.reject(3), None);
    }

    #[test]
    fn late_registration_is_not_queued() {
        let mut promise: PromiseRecord<u8, u8> = PromiseRecord::new();
        promise.reject(9);
        assert!(matches!(promise.register(1), Registration::Ready { value: 9, .. }));
        assert_eq!(promise.pending_reactions(), 0);
    }
}

mod rejection_contract {
    use super::*;

    #[test]
    fn handled_before_checkpoint_is_not_reported() {
        let mut tracker = RejectionTracker::new();
        tracker.rejected("p");
        tracker.handled(&"p");
        assert!(tracker.take().is_empty());
    }
}

mod combinator_contract {
    use super::*;

    #[test]
    fn empty_input_completes_immediately() {
        let mut all: Aggregate<u8> = Aggregate::new(CombinatorKind::All);
        assert_eq!(all.finish_iteration(), Some(vec![]));
    }
}

mod event_loop_contract {
    use super::*;

    struct Nested {
        jobs: EventLoop<bool, ()>,
        inner_result: Option<usize>,
    }

    impl Scheduler for Nested {
        type Job = bool;
        type Task = ();
        type Error = ();

        fn event_loop(&mut self) -> &mut EventLoop<bool, ()> {
            &mut self.jobs
        }

        fn run_microtask(&mut self, reenter: bool) -> Result<(), ()> {
            if reenter {
                self.jobs.enqueue_microtask(false);
                self.inner_result = Some(perform_microtask_checkpoint(self)?);
            }
            Ok(())
        }

        fn run_task(&mut self, _task: ()) -> Result<(), ()> {
            Ok(())
        }
    }

    #[test]
    fn nested_checkpoint_defers_to_outer_drain() {
        let mut n = Nested {
            jobs: EventLoop::new(),
            inner_result: None,
        };
        n.jobs.enqueue_microtask(true);
        assert_eq!(perform_microtask_checkpoint(&mut n), Ok(2));
        assert_eq!(n.inner_result, Some(0));
    }
}
