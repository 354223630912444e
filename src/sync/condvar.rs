//! Condition Variable
//!
//! Lets a thread sleep until some state guarded by a `spin::Mutex` changes,
//! without spinning. Waiters queue their [`ThreadId`] and block through the
//! scheduler; notifiers drain the queue and unblock them.
//!
//! The guard is dropped between enqueueing and blocking. A notification in
//! that window is not lost thanks to the scheduler's wake-permit contract,
//! and callers must re-check their predicate in a loop after every wakeup.

use alloc::collections::VecDeque;
use alloc::sync::Arc;

use spin::{Mutex, MutexGuard};

use crate::sched::{Scheduler, ThreadId};

/// A condition variable built on scheduler block/unblock.
pub struct Condvar {
    waiters: Mutex<VecDeque<ThreadId>>,
    scheduler: Arc<dyn Scheduler>,
}

impl Condvar {
    /// Create a condition variable that sleeps through `scheduler`.
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            waiters: Mutex::new(VecDeque::new()),
            scheduler,
        }
    }

    /// Release `guard`, sleep until notified, then reacquire `lock`.
    ///
    /// `guard` must have been obtained from `lock`.
    pub fn wait<'a, T>(&self, guard: MutexGuard<'a, T>, lock: &'a Mutex<T>) -> MutexGuard<'a, T> {
        let me = self.scheduler.current_thread();
        self.waiters.lock().push_back(me);
        drop(guard);
        self.scheduler.block_current();
        let guard = lock.lock();
        // A spurious return leaves us queued; take ourselves out so a later
        // notify does not hand out a stale permit.
        self.waiters.lock().retain(|&t| t != me);
        guard
    }

    /// Wake one waiter.
    pub fn notify_one(&self) {
        if let Some(thread) = self.waiters.lock().pop_front() {
            self.scheduler.unblock(thread);
        }
    }

    /// Wake every waiter.
    pub fn notify_all(&self) {
        let mut waiters = self.waiters.lock();
        for thread in waiters.drain(..) {
            self.scheduler.unblock(thread);
        }
    }

    /// Number of queued waiters.
    pub fn waiter_count(&self) -> usize {
        self.waiters.lock().len()
    }
}
