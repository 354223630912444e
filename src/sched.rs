//! Scheduler Collaborator
//!
//! The kernel tables never switch contexts themselves. They ask the platform
//! scheduler to start a freshly loaded process, to put the current thread to
//! sleep, to make a sleeping thread runnable again, and finally to power the
//! machine off.

use crate::proc::{Pid, StartInfo};

/// Opaque identity of a schedulable thread.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
#[repr(transparent)]
pub struct ThreadId(pub u64);

/// Threading primitives the kernel depends on.
///
/// # Wake permits
/// `unblock` on a thread that is not blocked yet must not be lost: the
/// thread's next `block_current` returns immediately instead. The condition
/// variable relies on this to release its lock before blocking. Spurious
/// returns from `block_current` are allowed.
pub trait Scheduler: Send + Sync {
    /// Begin concurrent execution of process `pid`.
    fn start(&self, pid: Pid, start: StartInfo);

    /// Thread currently executing kernel code.
    fn current_thread(&self) -> ThreadId;

    /// Suspend the current thread until it is unblocked.
    fn block_current(&self);

    /// Make `thread` runnable.
    fn unblock(&self, thread: ThreadId);

    /// Stop the machine. Nothing is flushed.
    fn halt(&self);
}
