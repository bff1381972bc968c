//! Unit tests for the event loop

use async_runtime::{perform_microtask_checkpoint, run_until_idle, EventLoop, Scheduler};

struct Counter {
    jobs: EventLoop<u32, u32>,
    seen: Vec<u32>,
}

impl Scheduler for Counter {
    type Job = u32;
    type Task = u32;
    type Error = ();

    fn event_loop(&mut self) -> &mut EventLoop<u32, u32> {
        &mut self.jobs
    }

    fn run_microtask(&mut self, job: u32) -> Result<(), ()> {
        self.seen.push(job);
        if job > 0 {
            self.jobs.enqueue_microtask(job - 1);
        }
        Ok(())
    }

    fn run_task(&mut self, task: u32) -> Result<(), ()> {
        self.seen.push(100 + task);
        self.jobs.enqueue_microtask(0);
        Ok(())
    }
}

fn counter() -> Counter {
    Counter {
        jobs: EventLoop::new(),
        seen: Vec::new(),
    }
}

#[test]
fn checkpoint_on_empty_queue_runs_nothing() {
    let mut c = counter();
    assert_eq!(perform_microtask_checkpoint(&mut c), Ok(0));
    assert_eq!(c.jobs.stats().checkpoints, 0);
}

#[test]
fn chained_microtasks_drain_completely() {
    let mut c = counter();
    c.jobs.enqueue_microtask(3);
    assert_eq!(perform_microtask_checkpoint(&mut c), Ok(4));
    assert_eq!(c.seen, vec![3, 2, 1, 0]);
    assert!(c.jobs.is_idle());
}

#[test]
fn microtasks_run_before_next_task() {
    let mut c = counter();
    c.jobs.enqueue_task(1);
    c.jobs.enqueue_task(2);
    let stats = run_until_idle(&mut c).unwrap();
    assert_eq!(c.seen, vec![101, 0, 102, 0]);
    assert_eq!(stats.tasks, 2);
    assert_eq!(stats.checkpoints, 2);
}
