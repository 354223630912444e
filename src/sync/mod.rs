//! Synchronization primitives layered on the scheduler.

mod condvar;

pub use condvar::Condvar;
