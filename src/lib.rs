//! userprog - User Program Support for a Teaching Kernel
//!
//! The kernel side of the user-program syscalls: file descriptors backed by
//! a shared open-file registry, and a process table with spawn/join/exit.
//!
//! # Architecture
//! ```text
//!   trap ─► exception ─► syscall::dispatch ─┬─► FdTable ─► OpenFileRegistry ─► FileSystem
//!                                           └─► ProcessTable ─► Loader, Scheduler
//! ```
//!
//! # Collaborators
//! The platform supplies storage ([`storage::FileSystem`]), executable
//! loading ([`proc::Loader`]), threading ([`sched::Scheduler`]) and a
//! [`console::Console`]. [`storage::RamFs`] is provided for hosts without a
//! disk.
//!
//! # Security Features
//! - Every user pointer is checked against the caller's address space
//! - Faults kill only the faulting process
//! - Halting is restricted to the root process by default

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod config;
pub mod console;
pub mod error;
pub mod exception;
pub mod fs;
pub mod kernel;
pub mod logging;
pub mod mm;
pub mod proc;
pub mod sched;
pub mod storage;
pub mod sync;
pub mod syscall;

#[cfg(test)]
mod testing;

pub use config::{HaltPolicy, KernelConfig};
pub use error::{KResult, KernelError, LoadError, StorageError};
pub use kernel::Kernel;
pub use proc::{ExitStatus, Pid};
pub use syscall::Disposition;
