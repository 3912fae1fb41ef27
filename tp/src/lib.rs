//! TimeoutPoll - generic interval-driven task polling
//!
//! A [`TimeoutPoll`] runs an async task on a self-rescheduling timer chain:
//! each iteration awaits the task to completion before arming the next delay,
//! so iterations never overlap and the wall-clock period is roughly
//! `interval + task duration`.
//!
//! The loop is cancelable and resumable. `pause()` is a flag write, not a
//! timer cancellation: a timer that was already armed still fires, notices
//! the loop is inactive, and does nothing. This makes pausing race-tolerant
//! and cheap. `reset()` additionally clears the armed timer and zeroes the
//! iteration counter.
//!
//! The runner has no opinion about what the task does; catching and
//! reporting task failures is the caller's job.

mod poll;

pub use poll::{DEFAULT_INTERVAL, PollOptions, PollTask, TimeoutPoll};
