//! Kernel Configuration
//!
//! Compile-time limits shared by the descriptor layer, the address-space
//! code and the syscall validator, plus the handful of runtime switches a
//! boot path may want to change.

/// Number of descriptor slots in every process.
pub const FD_TABLE_SIZE: usize = 16;

/// Descriptor bound to the console input at process creation.
pub const STDIN_FD: usize = 0;

/// Descriptor bound to the console output at process creation.
pub const STDOUT_FD: usize = 1;

/// First descriptor handed out by `creat`/`open`.
pub const FIRST_USER_FD: usize = 2;

/// Longest user string (file or program name, argument) the kernel copies
/// in, not counting the NUL terminator.
pub const MAX_STRING_LEN: usize = 256;

/// Largest `argc` accepted by `exec`.
pub const MAX_ARGS: usize = 16;

/// Width of a user pointer stored in memory (argv entries, join status).
pub const USER_PTR_SIZE: usize = 4;

/// Exit status reported by `join` for a process killed by an exception.
pub const ABNORMAL_EXIT_STATUS: i32 = i32::MIN;

/// Who may call `halt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltPolicy {
    /// Only the first process started by the kernel.
    RootOnly,
    /// Any running process.
    AnyProcess,
}

/// Runtime configuration handed to [`crate::Kernel::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    /// Who may halt the machine.
    pub halt_policy: HaltPolicy,
    /// Halt once the last running process exits.
    pub halt_when_idle: bool,
    /// Descriptor slots per process, including the two console slots.
    pub fd_capacity: usize,
}

impl KernelConfig {
    /// Configuration used when nothing else is specified.
    pub const fn new() -> Self {
        Self {
            halt_policy: HaltPolicy::RootOnly,
            halt_when_idle: true,
            fd_capacity: FD_TABLE_SIZE,
        }
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::new()
    }
}
