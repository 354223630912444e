//! User Exception Handling
//!
//! Entry point for every exception raised by a user process.
//!
//! # Exception Causes
//! - Syscall: dispatched to the syscall layer, result written back to `v0`
//! - Page fault, TLB miss, read-only, bus error, address error: bad access
//! - Overflow, illegal instruction: bad execution
//!
//! # Security Considerations
//! - Any cause other than a syscall terminates only the offending process,
//!   with an abnormal exit status its parent can collect through `join`
//! - Unknown cause codes are treated as illegal instructions

use log::warn;

use crate::kernel::Kernel;
use crate::proc::Pid;
use crate::syscall::{self, Disposition};

/// Register state saved on trap entry that the kernel reads or writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrapFrame {
    /// Syscall number on entry, return value on exit.
    pub v0: usize,
    /// Syscall arguments.
    pub a: [usize; 4],
    /// Faulting virtual address, for memory exceptions.
    pub bad_vaddr: usize,
    /// Program counter of the trapping instruction.
    pub pc: usize,
}

impl TrapFrame {
    /// Frame for a syscall trap.
    pub const fn syscall(number: usize, args: [usize; 4]) -> Self {
        Self {
            v0: number,
            a: args,
            bad_vaddr: 0,
            pc: 0,
        }
    }

    /// Syscall return value as a signed integer.
    pub const fn return_value(&self) -> isize {
        self.v0 as isize
    }
}

/// Exception cause decoded from the cause register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExceptionCause {
    Syscall = 0,
    PageFault = 1,
    TlbMiss = 2,
    ReadOnly = 3,
    BusError = 4,
    AddressError = 5,
    Overflow = 6,
    IllegalInstruction = 7,
}

impl From<u32> for ExceptionCause {
    fn from(cause: u32) -> Self {
        match cause {
            0 => ExceptionCause::Syscall,
            1 => ExceptionCause::PageFault,
            2 => ExceptionCause::TlbMiss,
            3 => ExceptionCause::ReadOnly,
            4 => ExceptionCause::BusError,
            5 => ExceptionCause::AddressError,
            6 => ExceptionCause::Overflow,
            _ => ExceptionCause::IllegalInstruction,
        }
    }
}

impl ExceptionCause {
    /// Whether the exception was caused by a bad memory access.
    pub const fn is_memory_fault(self) -> bool {
        matches!(
            self,
            Self::PageFault | Self::TlbMiss | Self::ReadOnly | Self::BusError | Self::AddressError
        )
    }
}

/// Handle an exception raised by process `pid`.
///
/// Returns how the trapping thread should continue: back to user mode with
/// the result in `frame.v0`, or not at all.
pub fn handle_exception(
    kernel: &Kernel,
    pid: Pid,
    cause: ExceptionCause,
    frame: &mut TrapFrame,
) -> Disposition {
    match cause {
        ExceptionCause::Syscall => {
            let disposition = syscall::dispatch(kernel, pid, frame.v0, frame.a);
            if let Disposition::Resume(value) = disposition {
                frame.v0 = value as usize;
            }
            disposition
        }
        _ => {
            if cause.is_memory_fault() {
                warn!(
                    "[EXCEPTION] {} {:?} at {:#x} (pc {:#x})",
                    pid, cause, frame.bad_vaddr, frame.pc
                );
            } else {
                warn!("[EXCEPTION] {} {:?} (pc {:#x})", pid, cause, frame.pc);
            }
            kernel.terminate(pid, cause)
        }
    }
}
