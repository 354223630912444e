//! Kernel Error Types
//!
//! Every fallible kernel operation returns [`KernelError`]. Nothing in this
//! crate aborts the machine on one of these; the syscall layer turns them into
//! negative errno-style return values for the calling process.

use core::fmt;

/// Errors reported by the storage collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// No object with that name exists.
    NotFound,
    /// The medium is full.
    NoSpace,
    /// Any other I/O failure.
    Io,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "no such file"),
            Self::NoSpace => write!(f, "no space left on device"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

/// Errors reported by the executable loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadError {
    /// The executable does not exist.
    NotFound,
    /// The image is malformed or fragmented.
    BadFormat,
    /// Arguments do not fit in the argument page.
    ArgumentsTooLong,
    /// Not enough physical pages for the image.
    OutOfMemory,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "executable not found"),
            Self::BadFormat => write!(f, "malformed executable"),
            Self::ArgumentsTooLong => write!(f, "arguments too long"),
            Self::OutOfMemory => write!(f, "insufficient physical memory"),
        }
    }
}

/// Error type for every kernel table operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// Named file is not present.
    NotFound,
    /// Name is still held by a file awaiting deletion.
    AlreadyExists,
    /// Descriptor is out of range, unallocated or used in the wrong direction.
    InvalidDescriptor,
    /// Descriptor table is full.
    NoFreeDescriptors,
    /// User pointer range is outside the caller's address space.
    InvalidAddress,
    /// Target of `join` is not an unreaped child of the caller.
    NotAChild,
    /// No running process with that id.
    NoSuchProcess,
    /// Executable could not be loaded.
    Load(LoadError),
    /// Storage collaborator failure, passed through.
    Storage(StorageError),
    /// Malformed syscall argument.
    InvalidArgument,
    /// Caller is not allowed to perform the operation.
    PermissionDenied,
    /// Unknown system call number.
    UnknownSyscall,
}

impl KernelError {
    /// Negative value returned to user space for this error.
    pub const fn errno(self) -> isize {
        match self {
            Self::PermissionDenied => -1,
            Self::NotFound => -2,
            Self::NoSuchProcess => -3,
            Self::Storage(StorageError::NoSpace) => -28,
            Self::Storage(StorageError::NotFound) => -2,
            Self::Storage(StorageError::Io) => -5,
            Self::Load(_) => -8,
            Self::InvalidDescriptor => -9,
            Self::NotAChild => -10,
            Self::InvalidAddress => -14,
            Self::AlreadyExists => -17,
            Self::InvalidArgument => -22,
            Self::NoFreeDescriptors => -24,
            Self::UnknownSyscall => -38,
        }
    }
}

impl From<StorageError> for KernelError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => Self::NotFound,
            other => Self::Storage(other),
        }
    }
}

impl From<LoadError> for KernelError {
    fn from(err: LoadError) -> Self {
        Self::Load(err)
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "file not found"),
            Self::AlreadyExists => write!(f, "name is pending deletion"),
            Self::InvalidDescriptor => write!(f, "invalid file descriptor"),
            Self::NoFreeDescriptors => write!(f, "descriptor table full"),
            Self::InvalidAddress => write!(f, "invalid user address"),
            Self::NotAChild => write!(f, "not a child of the caller"),
            Self::NoSuchProcess => write!(f, "no such process"),
            Self::Load(e) => write!(f, "load failed: {}", e),
            Self::Storage(e) => write!(f, "storage error: {}", e),
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::PermissionDenied => write!(f, "permission denied"),
            Self::UnknownSyscall => write!(f, "unknown system call"),
        }
    }
}

/// Result alias used throughout the kernel.
pub type KResult<T> = Result<T, KernelError>;
