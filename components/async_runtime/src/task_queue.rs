//! Task and microtask queue management.
//!
//! Both queues are plain FIFO queues of jobs. The event loop runs tasks one
//! at a time and drains the microtask queue completely after each task.

use std::collections::VecDeque;

/// A FIFO queue of jobs.
#[derive(Debug)]
pub struct JobQueue<J> {
    queue: VecDeque<J>,
}

/// Queue of host-level tasks.
pub type TaskQueue<T> = JobQueue<T>;

/// Queue of microtasks (promise reactions and other engine jobs).
pub type MicrotaskQueue<J> = JobQueue<J>;

impl<J> JobQueue<J> {
    /// Creates a new empty queue.
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// Adds a job to the end of the queue.
    pub fn enqueue(&mut self, job: J) {
        self.queue.push_back(job);
    }

    /// Removes and returns the oldest job.
    pub fn dequeue(&mut self) -> Option<J> {
        self.queue.pop_front()
    }

    /// Returns true if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns the number of queued jobs.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Drops every queued job, returning how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }

    /// Queued jobs, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &J> {
        self.queue.iter()
    }
}

impl<J> Default for JobQueue<J> {
    fn default() -> Self {
        Self::new()
    }
}
