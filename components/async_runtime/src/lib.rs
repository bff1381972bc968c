//! Async runtime for the execution engine.
//!
//! This crate provides the value-agnostic half of promise scheduling:
//! - [`PromiseRecord`] - one promise's state and pending reactions
//! - [`RejectionTracker`] - rejections nobody handled
//! - [`Aggregate`] - bookkeeping for `Promise.all`/`allSettled`/`any`
//! - [`EventLoop`] - task and microtask queues, driven through [`Scheduler`]
//!
//! The engine supplies the value, reaction and job types and implements
//! [`Scheduler`] to run them.
//!
//! # Examples
//!
//! ```
//! use async_runtime::{PromiseRecord, Registration, Settlement};
//!
//! let mut promise: PromiseRecord<&str, u32> = PromiseRecord::new();
//! promise.fulfill("done");
//! match promise.register(1) {
//!     Registration::Ready { settlement, value, .. } => {
//!         assert_eq!(settlement, Settlement::Fulfilled);
//!         assert_eq!(value, "done");
//!     }
//!     Registration::Queued => unreachable!(),
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod combinator;
pub mod event_loop;
pub mod promise;
pub mod task_queue;

// Re-export main types at crate root
pub use combinator::{Aggregate, CombinatorKind};
pub use event_loop::{perform_microtask_checkpoint, run_until_idle, EventLoop, LoopStats, Scheduler};
pub use promise::{PromiseRecord, PromiseState, Registration, RejectionTracker, Settlement};
pub use task_queue::{JobQueue, MicrotaskQueue, TaskQueue};
