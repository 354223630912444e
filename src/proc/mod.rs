//! Process Management
//!
//! User processes, their lifecycle and the table that tracks them.
//!
//! # Lifecycle
//! ```text
//!   spawn ──► Running ──exit/terminate──► Zombie ──join──► Reaped (discarded)
//! ```
//!
//! A process owns its descriptor table and address space while Running.
//! Parents collect a child's [`ExitStatus`] exactly once through `join`.

pub mod loader;
mod process;
mod table;

use alloc::string::String;
use core::fmt;

use crate::config::ABNORMAL_EXIT_STATUS;
use crate::exception::ExceptionCause;
use crate::mm::VirtAddr;

pub use loader::{Loader, ProgramImage};
pub use process::Process;
pub use table::{ExitReport, ProcessTable};

/// Process identifier. Allocated in increasing order and never reused.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
#[repr(transparent)]
pub struct Pid(pub u32);

impl Pid {
    /// Raw value as returned to user space.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid {}", self.0)
    }
}

/// Everything the scheduler needs to enter a freshly loaded program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartInfo {
    pub program: String,
    pub entry: usize,
    pub stack_pointer: usize,
    pub argc: usize,
    pub argv: VirtAddr,
}

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// The process called `exit` with this code.
    Normal(i32),
    /// The process was killed by an exception.
    Abnormal(ExceptionCause),
}

impl ExitStatus {
    /// Status code as seen by a joining parent.
    pub const fn code(self) -> i32 {
        match self {
            Self::Normal(code) => code,
            Self::Abnormal(_) => ABNORMAL_EXIT_STATUS,
        }
    }

    pub const fn is_normal(self) -> bool {
        matches!(self, Self::Normal(_))
    }
}

/// Lifecycle state of a process record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    Zombie,
    Reaped,
}
