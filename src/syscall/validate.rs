//! System Call Input Validation
//!
//! Every user pointer is checked against the caller's [`AddressSpace`] and
//! copied into kernel memory before any table is touched.
//!
//! # Security Principles
//! - Validate ALL inputs before use
//! - Fail-secure: a bad range is `InvalidAddress`, never a partial copy
//! - No TOCTOU: the kernel works on its own copy of user bytes
//! - Strings are length-limited and must be NUL-terminated UTF-8

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::config::{MAX_ARGS, MAX_STRING_LEN, USER_PTR_SIZE};
use crate::error::{KResult, KernelError};
use crate::mm::{AddressSpace, PageFlags, VirtAddr};

/// Kernel copy of a user buffer.
#[derive(Debug)]
pub struct UserBuffer {
    bytes: Vec<u8>,
}

impl UserBuffer {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A user range validated as writable.
///
/// Holds no reference to the space, so the lock can be dropped while the
/// kernel fills its own buffer.
#[derive(Debug, Clone, Copy)]
pub struct UserRange {
    addr: VirtAddr,
    len: usize,
}

impl UserRange {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy `data` to the start of the range.
    ///
    /// `data` must not be longer than the validated range.
    pub fn fill(&self, space: &mut AddressSpace, data: &[u8]) -> KResult<()> {
        if data.len() > self.len {
            return Err(KernelError::InvalidArgument);
        }
        space.copy_out(self.addr, data)
    }
}

/// Copy `len` bytes at `ptr` into the kernel.
pub fn copy_from_user(space: &AddressSpace, ptr: usize, len: usize) -> KResult<UserBuffer> {
    let addr = VirtAddr::new(ptr);
    space.check(addr, len, PageFlags::READ)?;
    let mut bytes = vec![0u8; len];
    space.copy_in(addr, &mut bytes)?;
    Ok(UserBuffer { bytes })
}

/// Validate that `[ptr, ptr + len)` may be written by the kernel.
pub fn validate_user_write(space: &AddressSpace, ptr: usize, len: usize) -> KResult<UserRange> {
    let addr = VirtAddr::new(ptr);
    space.check(addr, len, PageFlags::WRITE)?;
    Ok(UserRange { addr, len })
}

/// Read a NUL-terminated name or argument.
pub fn read_user_string(space: &AddressSpace, ptr: usize) -> KResult<String> {
    space.read_cstr(VirtAddr::new(ptr), MAX_STRING_LEN)
}

/// Read `argc` strings through the pointer array at `argv`.
///
/// `argc` arrives as a raw register, so a negative count shows up as a huge
/// value and is rejected with the other out-of-range counts.
pub fn read_user_args(space: &AddressSpace, argc: usize, argv: usize) -> KResult<Vec<String>> {
    if argc > MAX_ARGS {
        return Err(KernelError::InvalidArgument);
    }
    let mut args = Vec::with_capacity(argc);
    for i in 0..argc {
        let slot = argv
            .checked_add(i * USER_PTR_SIZE)
            .ok_or(KernelError::InvalidAddress)?;
        let ptr = space.read_u32(VirtAddr::new(slot))? as usize;
        args.push(read_user_string(space, ptr)?);
    }
    Ok(args)
}
