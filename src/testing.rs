//! Host-side collaborators for unit tests.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::vec::Vec;

use alloc::string::String;

use crate::console::Console;
use crate::error::LoadError;
use crate::mm::AddressSpace;
use crate::proc::{Loader, Pid, ProgramImage, StartInfo};
use crate::sched::{Scheduler, ThreadId};

static NEXT_THREAD: AtomicU64 = AtomicU64::new(1);

std::thread_local! {
    static THREAD_ID: Cell<u64> = Cell::new(0);
}

/// Scheduler for unit tests. `start` only records the pid and
/// `block_current` yields, which the spurious-wakeup rule allows: waiters
/// simply poll their predicate.
#[derive(Default)]
pub struct YieldScheduler {
    started: Mutex<Vec<Pid>>,
    halted: AtomicBool,
}

impl YieldScheduler {
    pub fn started(&self) -> Vec<Pid> {
        self.started.lock().unwrap().clone()
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }
}

impl Scheduler for YieldScheduler {
    fn start(&self, pid: Pid, _start: StartInfo) {
        self.started.lock().unwrap().push(pid);
    }

    fn current_thread(&self) -> ThreadId {
        THREAD_ID.with(|id| {
            if id.get() == 0 {
                id.set(NEXT_THREAD.fetch_add(1, Ordering::Relaxed));
            }
            ThreadId(id.get())
        })
    }

    fn block_current(&self) {
        std::thread::yield_now();
    }

    fn unblock(&self, _thread: ThreadId) {}

    fn halt(&self) {
        self.halted.store(true, Ordering::SeqCst);
    }
}

/// Loader that knows a fixed set of program names.
pub struct StaticLoader {
    programs: Vec<&'static str>,
}

impl StaticLoader {
    pub fn new(programs: &[&'static str]) -> Self {
        Self {
            programs: programs.to_vec(),
        }
    }
}

impl Loader for StaticLoader {
    fn load(&self, name: &str, args: &[String]) -> Result<ProgramImage, LoadError> {
        if !self.programs.iter().any(|p| *p == name) {
            return Err(LoadError::NotFound);
        }
        ProgramImage::new(AddressSpace::new(8), 0, args)
    }
}

/// Console without input that records output.
#[derive(Default)]
pub struct BufferConsole {
    pub output: Mutex<Vec<u8>>,
}

impl Console for BufferConsole {
    fn read(&self, _buf: &mut [u8]) -> usize {
        0
    }

    fn write(&self, data: &[u8]) -> usize {
        self.output.lock().unwrap().extend_from_slice(data);
        data.len()
    }
}
