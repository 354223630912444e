//! File Descriptor Table
//!
//! Per-process map from small integers to open streams.
//!
//! # Design
//! - Fixed number of slots, addressed by [`Fd`] indices
//! - Slots 0 and 1 hold the console streams from creation on; allocation
//!   starts at [`Fd::FIRST_USER`], so they are never handed out again even
//!   after being closed
//! - Each descriptor carries its own cursor; the storage object behind it is
//!   shared through the [`OpenFileRegistry`]

use alloc::sync::Arc;
use alloc::vec::Vec;

use log::{debug, trace};

use super::registry::{OpenFile, OpenFileRegistry};
use super::OpenMode;
use crate::config::{FIRST_USER_FD, STDIN_FD, STDOUT_FD};
use crate::console::Console;
use crate::error::{KResult, KernelError};

/// A descriptor number.
///
/// Newtype so arbitrary integers from user registers are converted exactly
/// once.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[repr(transparent)]
pub struct Fd(u32);

impl Fd {
    /// Console input.
    pub const STDIN: Self = Self(STDIN_FD as u32);

    /// Console output.
    pub const STDOUT: Self = Self(STDOUT_FD as u32);

    /// First descriptor available to `open`.
    pub const FIRST_USER: Self = Self(FIRST_USER_FD as u32);

    /// Convert a raw syscall argument. Returns `None` for values that cannot
    /// be a descriptor in any table (including negative numbers passed
    /// through a register).
    #[inline]
    pub fn from_raw(raw: usize) -> Option<Self> {
        u32::try_from(raw).ok().map(Self)
    }

    /// Get the index value.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// What a descriptor is connected to.
#[derive(Debug, Clone)]
enum Stream {
    ConsoleIn,
    ConsoleOut,
    File(Arc<OpenFile>),
}

/// One allocated slot.
#[derive(Debug, Clone)]
struct Descriptor {
    stream: Stream,
    cursor: usize,
}

impl Descriptor {
    const fn new(stream: Stream) -> Self {
        Self { stream, cursor: 0 }
    }
}

/// Descriptor table of one process.
#[derive(Debug)]
pub struct FdTable {
    slots: Vec<Option<Descriptor>>,
}

impl FdTable {
    /// Create a table with `capacity` slots, the first two bound to the
    /// console.
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity.max(FIRST_USER_FD));
        slots.resize_with(capacity.max(FIRST_USER_FD), || None);
        slots[STDIN_FD] = Some(Descriptor::new(Stream::ConsoleIn));
        slots[STDOUT_FD] = Some(Descriptor::new(Stream::ConsoleOut));
        Self { slots }
    }

    /// Total number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Whether `fd` is allocated.
    pub fn is_open(&self, fd: Fd) -> bool {
        self.lookup(fd).is_ok()
    }

    /// Allocated descriptors in ascending order.
    pub fn open_fds(&self) -> Vec<Fd> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(i, _)| Fd(i as u32))
            .collect()
    }

    /// Current cursor of `fd`.
    pub fn cursor(&self, fd: Fd) -> KResult<usize> {
        self.lookup(fd).map(|d| d.cursor)
    }

    /// Lowest free slot at or above [`Fd::FIRST_USER`].
    pub fn find_free(&self) -> Option<Fd> {
        (FIRST_USER_FD..self.slots.len())
            .find(|&i| self.slots[i].is_none())
            .map(|i| Fd(i as u32))
    }

    /// Open `name` through `registry` and bind it to the lowest free slot.
    ///
    /// The slot is found before the registry is touched, so a full table
    /// never leaves a dangling reference behind.
    pub fn open(&mut self, registry: &OpenFileRegistry, name: &str, mode: OpenMode) -> KResult<Fd> {
        let fd = self.find_free().ok_or(KernelError::NoFreeDescriptors)?;
        let file = registry.acquire(name, mode)?;
        self.slots[fd.index()] = Some(Descriptor::new(Stream::File(file)));
        debug!("[FD] open '{}' -> {}", name, fd.index());
        Ok(fd)
    }

    /// Read from `fd` at its cursor, advancing it by the bytes returned.
    ///
    /// Zero means end of file (or no console input pending).
    pub fn read(&mut self, fd: Fd, buf: &mut [u8], console: &dyn Console) -> KResult<usize> {
        self.read_with(fd, buf, console, |_| Ok(()))
    }

    /// Read into `buf` and hand the bytes to `deliver`. The cursor only
    /// moves once `deliver` succeeded.
    ///
    /// Console input cannot be pushed back, so bytes taken from stdin are
    /// gone even if `deliver` fails.
    pub fn read_with<F>(&mut self, fd: Fd, buf: &mut [u8], console: &dyn Console, deliver: F) -> KResult<usize>
    where
        F: FnOnce(&[u8]) -> KResult<()>,
    {
        let desc = self.lookup_mut(fd)?;
        let n = match &desc.stream {
            Stream::ConsoleIn => console.read(buf),
            Stream::ConsoleOut => return Err(KernelError::InvalidDescriptor),
            Stream::File(file) => file.read_at(desc.cursor, buf)?,
        }
        .min(buf.len());
        deliver(&buf[..n])?;
        desc.cursor += n;
        trace!("[FD] read {} -> {} bytes", fd.index(), n);
        Ok(n)
    }

    /// Write `data` to `fd` at its cursor, advancing it by the bytes
    /// written.
    pub fn write(&mut self, fd: Fd, data: &[u8], console: &dyn Console) -> KResult<usize> {
        let desc = self.lookup_mut(fd)?;
        let n = match &desc.stream {
            Stream::ConsoleOut => console.write(data),
            Stream::ConsoleIn => return Err(KernelError::InvalidDescriptor),
            Stream::File(file) => file.write_at(desc.cursor, data)?,
        }
        .min(data.len());
        desc.cursor += n;
        trace!("[FD] write {} -> {} bytes", fd.index(), n);
        Ok(n)
    }

    /// Close `fd`, releasing its registry reference.
    pub fn close(&mut self, fd: Fd, registry: &OpenFileRegistry) -> KResult<()> {
        self.lookup(fd)?;
        if let Some(Descriptor {
            stream: Stream::File(file),
            ..
        }) = self.slots[fd.index()].take()
        {
            registry.release(&file);
        }
        debug!("[FD] close {}", fd.index());
        Ok(())
    }

    /// Release every open descriptor. Returns how many files were released.
    pub fn close_all(&mut self, registry: &OpenFileRegistry) -> usize {
        let mut released = 0;
        for slot in self.slots.iter_mut() {
            if let Some(Descriptor {
                stream: Stream::File(file),
                ..
            }) = slot.take()
            {
                registry.release(&file);
                released += 1;
            }
        }
        released
    }

    fn lookup(&self, fd: Fd) -> KResult<&Descriptor> {
        self.slots
            .get(fd.index())
            .and_then(Option::as_ref)
            .ok_or(KernelError::InvalidDescriptor)
    }

    fn lookup_mut(&mut self, fd: Fd) -> KResult<&mut Descriptor> {
        self.slots
            .get_mut(fd.index())
            .and_then(Option::as_mut)
            .ok_or(KernelError::InvalidDescriptor)
    }
}
