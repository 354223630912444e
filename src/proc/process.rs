//! Per-process kernel state.

use alloc::string::String;

use spin::Mutex;

use super::Pid;
use crate::fs::FdTable;
use crate::mm::AddressSpace;

/// Resources a running process owns.
///
/// Held behind an `Arc` by the process table; syscall handlers clone the
/// handle and lock only the part they need, never the table itself.
#[derive(Debug)]
pub struct Process {
    pid: Pid,
    name: String,
    fds: Mutex<FdTable>,
    space: Mutex<AddressSpace>,
}

impl Process {
    pub(crate) fn new(pid: Pid, name: String, space: AddressSpace, fd_capacity: usize) -> Self {
        Self {
            pid,
            name,
            fds: Mutex::new(FdTable::new(fd_capacity)),
            space: Mutex::new(space),
        }
    }

    #[inline]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Program name the process was spawned from.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Descriptor table.
    #[inline]
    pub fn fds(&self) -> &Mutex<FdTable> {
        &self.fds
    }

    /// User memory.
    #[inline]
    pub fn space(&self) -> &Mutex<AddressSpace> {
        &self.space
    }
}
