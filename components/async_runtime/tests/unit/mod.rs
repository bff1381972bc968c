//! Unit tests for async_runtime

mod combinator_test;
mod event_loop_test;
mod promise_test;
