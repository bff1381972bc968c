//! Event loop implementation.
//!
//! The event loop owns the task and microtask queues. It does not own the
//! context jobs run against: the embedding engine implements [`Scheduler`]
//! and the free functions [`perform_microtask_checkpoint`] and
//! [`run_until_idle`] drive it. Each turn of the loop:
//! 1. Takes the oldest task from the task queue and runs it
//! 2. Drains the microtask queue, including microtasks enqueued meanwhile
//! 3. Repeats until both queues are empty

use log::{debug, trace};

use crate::task_queue::{MicrotaskQueue, TaskQueue};

/// Counters kept across the lifetime of an event loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Tasks run
    pub tasks: usize,
    /// Microtasks run
    pub microtasks: usize,
    /// Checkpoints that ran at least one microtask
    pub checkpoints: usize,
}

/// Task and microtask queues.
///
/// # Examples
///
/// ```
/// use async_runtime::{perform_microtask_checkpoint, EventLoop, Scheduler};
///
/// struct Log {
///     jobs: EventLoop<&'static str, ()>,
///     ran: Vec<&'static str>,
/// }
///
/// impl Scheduler for Log {
///     type Job = &'static str;
///     type Task = ();
///     type Error = ();
///
///     fn event_loop(&mut self) -> &mut EventLoop<&'static str, ()> {
///         &mut self.jobs
///     }
///     fn run_microtask(&mut self, job: &'static str) -> Result<(), ()> {
///         self.ran.push(job);
///         if job == "a" {
///             self.jobs.enqueue_microtask("c");
///         }
///         Ok(())
///     }
///     fn run_task(&mut self, _task: ()) -> Result<(), ()> {
///         Ok(())
///     }
/// }
///
/// let mut log = Log { jobs: EventLoop::new(), ran: vec![] };
/// log.jobs.enqueue_microtask("a");
/// log.jobs.enqueue_microtask("b");
/// assert_eq!(perform_microtask_checkpoint(&mut log), Ok(3));
/// assert_eq!(log.ran, vec!["a", "b", "c"]);
/// ```
#[derive(Debug)]
pub struct EventLoop<J, T> {
    task_queue: TaskQueue<T>,
    microtask_queue: MicrotaskQueue<J>,
    in_checkpoint: bool,
    stats: LoopStats,
}

impl<J, T> EventLoop<J, T> {
    /// Creates an event loop with empty queues.
    pub fn new() -> Self {
        Self {
            task_queue: TaskQueue::new(),
            microtask_queue: MicrotaskQueue::new(),
            in_checkpoint: false,
            stats: LoopStats::default(),
        }
    }

    /// Adds a task to the task queue.
    pub fn enqueue_task(&mut self, task: T) {
        self.task_queue.enqueue(task);
    }

    /// Adds a microtask to the microtask queue.
    pub fn enqueue_microtask(&mut self, job: J) {
        self.microtask_queue.enqueue(job);
    }

    /// Returns true if the task queue is empty.
    pub fn is_task_queue_empty(&self) -> bool {
        self.task_queue.is_empty()
    }

    /// Returns true if the microtask queue is empty.
    pub fn is_microtask_queue_empty(&self) -> bool {
        self.microtask_queue.is_empty()
    }

    /// Returns true if there is no queued work at all.
    pub fn is_idle(&self) -> bool {
        self.task_queue.is_empty() && self.microtask_queue.is_empty()
    }

    /// Number of queued microtasks.
    pub fn pending_microtasks(&self) -> usize {
        self.microtask_queue.len()
    }

    /// Number of queued tasks.
    pub fn pending_tasks(&self) -> usize {
        self.task_queue.len()
    }

    /// Queued microtasks, oldest first.
    pub fn microtasks(&self) -> impl Iterator<Item = &J> {
        self.microtask_queue.iter()
    }

    /// Queued tasks, oldest first.
    pub fn tasks(&self) -> impl Iterator<Item = &T> {
        self.task_queue.iter()
    }

    /// Drops all queued work, returning `(tasks, microtasks)` dropped.
    pub fn discard(&mut self) -> (usize, usize) {
        (self.task_queue.clear(), self.microtask_queue.clear())
    }

    /// Returns true while a checkpoint is draining the microtask queue.
    pub fn in_checkpoint(&self) -> bool {
        self.in_checkpoint
    }

    /// Lifetime counters.
    pub fn stats(&self) -> LoopStats {
        self.stats
    }
}

impl<J, T> Default for EventLoop<J, T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A context able to run the jobs queued on its event loop.
pub trait Scheduler {
    /// Microtask type
    type Job;
    /// Host task type
    type Task;
    /// Error that stops the loop
    type Error;

    /// The event loop holding this context's queues.
    fn event_loop(&mut self) -> &mut EventLoop<Self::Job, Self::Task>;

    /// Runs one microtask to completion.
    fn run_microtask(&mut self, job: Self::Job) -> Result<(), Self::Error>;

    /// Runs one host task to completion.
    fn run_task(&mut self, task: Self::Task) -> Result<(), Self::Error>;

    /// Called after each checkpoint that drained the queue.
    fn checkpoint_finished(&mut self) {}
}

/// Drains the microtask queue, including microtasks enqueued while
/// draining. Returns how many ran.
///
/// A checkpoint requested while another is draining returns `Ok(0)`; the
/// outer checkpoint picks up the work. An error stops the drain and leaves
/// the remaining microtasks queued.
pub fn perform_microtask_checkpoint<S: Scheduler>(scheduler: &mut S) -> Result<usize, S::Error> {
    if scheduler.event_loop().in_checkpoint {
        return Ok(0);
    }
    scheduler.event_loop().in_checkpoint = true;

    let mut ran = 0;
    let result = loop {
        let Some(job) = scheduler.event_loop().microtask_queue.dequeue() else {
            break Ok(ran);
        };
        ran += 1;
        scheduler.event_loop().stats.microtasks += 1;
        if let Err(error) = scheduler.run_microtask(job) {
            break Err(error);
        }
    };

    let event_loop = scheduler.event_loop();
    event_loop.in_checkpoint = false;
    if ran > 0 {
        event_loop.stats.checkpoints += 1;
        trace!("microtask checkpoint ran {} job(s)", ran);
    }
    if result.is_ok() {
        scheduler.checkpoint_finished();
    }
    result
}

/// Runs tasks one at a time, with a microtask checkpoint before the first
/// and after each, until both queues are empty.
pub fn run_until_idle<S: Scheduler>(scheduler: &mut S) -> Result<LoopStats, S::Error> {
    let before = scheduler.event_loop().stats;
    perform_microtask_checkpoint(scheduler)?;
    while let Some(task) = scheduler.event_loop().task_queue.dequeue() {
        scheduler.event_loop().stats.tasks += 1;
        scheduler.run_task(task)?;
        perform_microtask_checkpoint(scheduler)?;
    }
    let after = scheduler.event_loop().stats;
    let delta = LoopStats {
        tasks: after.tasks - before.tasks,
        microtasks: after.microtasks - before.microtasks,
        checkpoints: after.checkpoints - before.checkpoints,
    };
    debug!(
        "event loop idle after {} task(s), {} microtask(s)",
        delta.tasks, delta.microtasks
    );
    Ok(delta)
}
