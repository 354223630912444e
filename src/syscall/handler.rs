//! System Call Handler
//!
//! Dispatches system calls and implements individual syscall handlers.
//!
//! # Security Considerations
//! - All syscall numbers are validated against the whitelist
//! - Unknown syscalls return ENOSYS
//! - Pointer arguments are validated against the caller's address space
//!   before any descriptor or process state changes

use alloc::vec;

use log::{debug, trace};

use super::validate;
use crate::error::{KResult, KernelError};
use crate::fs::{Fd, OpenMode};
use crate::kernel::Kernel;
use crate::mm::{PageFlags, VirtAddr};
use crate::proc::{ExitStatus, Pid};

/// System call numbers
pub mod numbers {
    pub const SYS_HALT: usize = 0;
    pub const SYS_EXIT: usize = 1;
    pub const SYS_EXEC: usize = 2;
    pub const SYS_JOIN: usize = 3;
    pub const SYS_CREAT: usize = 4;
    pub const SYS_OPEN: usize = 5;
    pub const SYS_READ: usize = 6;
    pub const SYS_WRITE: usize = 7;
    pub const SYS_CLOSE: usize = 8;
    pub const SYS_UNLINK: usize = 9;
}

/// What happens to the calling thread after a syscall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Return to user mode with this value.
    Resume(isize),
    /// The process is gone; the thread must not return to user mode.
    Exited,
    /// The machine is halting.
    Halted,
}

impl Disposition {
    fn from_result(result: KResult<isize>) -> Self {
        Self::Resume(result.unwrap_or_else(KernelError::errno))
    }
}

/// Dispatch a system call
///
/// # Arguments
/// * `kernel` - Kernel state
/// * `pid` - Calling process
/// * `syscall_num` - System call number (from v0)
/// * `args` - Raw argument registers (a0-a3)
///
/// # Security
/// - Unknown syscall numbers are rejected with ENOSYS
/// - Each handler validates its own arguments
pub fn dispatch(kernel: &Kernel, pid: Pid, syscall_num: usize, args: [usize; 4]) -> Disposition {
    if kernel.is_halted() {
        return Disposition::Halted;
    }
    trace!("[SYSCALL] {} #{} {:x?}", pid, syscall_num, args);

    match syscall_num {
        numbers::SYS_HALT => match kernel.halt(pid) {
            Ok(()) => Disposition::Halted,
            Err(e) => {
                debug!("[SYSCALL] halt from {} refused: {}", pid, e);
                Disposition::Resume(e.errno())
            }
        },
        numbers::SYS_EXIT => kernel.exit_process(pid, ExitStatus::Normal(args[0] as i32)),
        numbers::SYS_EXEC => Disposition::from_result(sys_exec(kernel, pid, args[0], args[1], args[2])),
        numbers::SYS_JOIN => Disposition::from_result(sys_join(kernel, pid, args[0], args[1])),
        numbers::SYS_CREAT => Disposition::from_result(sys_open(kernel, pid, args[0], OpenMode::CREAT)),
        numbers::SYS_OPEN => Disposition::from_result(sys_open(kernel, pid, args[0], OpenMode::empty())),
        numbers::SYS_READ => Disposition::from_result(sys_read(kernel, pid, args[0], args[1], args[2])),
        numbers::SYS_WRITE => Disposition::from_result(sys_write(kernel, pid, args[0], args[1], args[2])),
        numbers::SYS_CLOSE => Disposition::from_result(sys_close(kernel, pid, args[0])),
        numbers::SYS_UNLINK => Disposition::from_result(sys_unlink(kernel, pid, args[0])),
        _ => {
            debug!("[SYSCALL] Unknown syscall: {}", syscall_num);
            Disposition::Resume(KernelError::UnknownSyscall.errno())
        }
    }
}

fn fd_arg(raw: usize) -> KResult<Fd> {
    Fd::from_raw(raw).ok_or(KernelError::InvalidDescriptor)
}

/// Exec system call
///
/// Spawns `name` as a child of the caller with `argc` arguments read from
/// the pointer array at `argv`. Returns the child's pid.
fn sys_exec(kernel: &Kernel, pid: Pid, name: usize, argc: usize, argv: usize) -> KResult<isize> {
    let process = kernel.processes().process(pid)?;
    let (name, args) = {
        let space = process.space().lock();
        let name = validate::read_user_string(&space, name)?;
        let args = validate::read_user_args(&space, argc, argv)?;
        (name, args)
    };
    debug!("[SYSCALL] exec('{}', {:?}) from {}", name, args, pid);
    let child = kernel.processes().spawn(Some(pid), &name, &args)?;
    Ok(child.as_usize() as isize)
}

/// Join system call
///
/// Waits for child `child` and returns its exit status, also storing it at
/// `status_ptr` when that is non-null.
///
/// # Security
/// The status pointer is validated before the caller blocks, so a bad
/// pointer never consumes the child's status.
fn sys_join(kernel: &Kernel, pid: Pid, child: usize, status_ptr: usize) -> KResult<isize> {
    let child = u32::try_from(child).map(Pid).map_err(|_| KernelError::NotAChild)?;
    let process = kernel.processes().process(pid)?;
    let status_addr = VirtAddr::new(status_ptr);
    if !status_addr.is_null() {
        process
            .space()
            .lock()
            .check(status_addr, core::mem::size_of::<u32>(), PageFlags::WRITE)?;
    }

    let code = kernel.processes().join(pid, child)?.code();
    if !status_addr.is_null() {
        process.space().lock().write_u32(status_addr, code as u32)?;
    }
    Ok(code as isize)
}

/// Creat/open system call
///
/// Binds the named file to the caller's lowest free descriptor.
fn sys_open(kernel: &Kernel, pid: Pid, name: usize, mode: OpenMode) -> KResult<isize> {
    let process = kernel.processes().process(pid)?;
    let name = validate::read_user_string(&process.space().lock(), name)?;
    let fd = process.fds().lock().open(kernel.registry(), &name, mode)?;
    Ok(fd.index() as isize)
}

/// Read system call
///
/// Reads up to `len` bytes from `fd` into the user buffer at `buf`.
///
/// # Security
/// - The whole destination range is validated before the descriptor is read
/// - Data lands in a kernel buffer first, so a failed read writes nothing
/// - The file cursor only advances once the copy-out succeeded
fn sys_read(kernel: &Kernel, pid: Pid, fd: usize, buf: usize, len: usize) -> KResult<isize> {
    let process = kernel.processes().process(pid)?;
    let range = validate::validate_user_write(&process.space().lock(), buf, len)?;
    let fd = fd_arg(fd)?;

    let mut data = vec![0u8; range.len()];
    let n = process
        .fds()
        .lock()
        .read_with(fd, &mut data, kernel.console(), |bytes| {
            range.fill(&mut process.space().lock(), bytes)
        })?;
    Ok(n as isize)
}

/// Write system call
///
/// Writes `len` bytes from the user buffer at `buf` to `fd`.
///
/// # Security
/// - Buffer is validated and copied in before the descriptor is touched
fn sys_write(kernel: &Kernel, pid: Pid, fd: usize, buf: usize, len: usize) -> KResult<isize> {
    let process = kernel.processes().process(pid)?;
    let data = validate::copy_from_user(&process.space().lock(), buf, len)?;
    let fd = fd_arg(fd)?;

    let n = process
        .fds()
        .lock()
        .write(fd, data.as_bytes(), kernel.console())?;
    Ok(n as isize)
}

/// Close system call
fn sys_close(kernel: &Kernel, pid: Pid, fd: usize) -> KResult<isize> {
    let process = kernel.processes().process(pid)?;
    process.fds().lock().close(fd_arg(fd)?, kernel.registry())?;
    Ok(0)
}

/// Unlink system call
///
/// Deletes the named file now, or once its last descriptor closes.
fn sys_unlink(kernel: &Kernel, pid: Pid, name: usize) -> KResult<isize> {
    let process = kernel.processes().process(pid)?;
    let name = validate::read_user_string(&process.space().lock(), name)?;
    kernel.registry().unlink(&name)?;
    Ok(0)
}
