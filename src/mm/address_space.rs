//! Process Address Spaces
//!
//! A process's user memory as the kernel sees it: a run of fixed-size pages
//! starting at virtual address 0, each with its own access flags. The loader
//! fills pages through [`AddressSpace::load`]; syscalls only ever move bytes
//! with the checked [`AddressSpace::copy_in`] / [`AddressSpace::copy_out`].
//!
//! # Security Properties
//! - Every user range is bounds- and overflow-checked before any byte moves
//! - Copy-in requires `READ`, copy-out requires `WRITE` on every page touched
//! - A failed check leaves both the space and the kernel buffer untouched

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use bitflags::bitflags;

use super::address::{VirtAddr, PAGE_SIZE};
use crate::error::{KResult, KernelError};

bitflags! {
    /// Access rights of one user page.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageFlags: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const EXECUTE = 1 << 2;
    }
}

struct Page {
    frame: Box<[u8]>,
    flags: PageFlags,
}

impl Page {
    fn new(flags: PageFlags) -> Self {
        Self {
            frame: vec![0u8; PAGE_SIZE].into_boxed_slice(),
            flags,
        }
    }
}

/// User memory of one process.
pub struct AddressSpace {
    pages: Vec<Page>,
}

impl AddressSpace {
    /// Create a zeroed space of `num_pages` read/write pages.
    pub fn new(num_pages: usize) -> Self {
        let pages = (0..num_pages)
            .map(|_| Page::new(PageFlags::READ | PageFlags::WRITE))
            .collect();
        Self { pages }
    }

    /// Number of mapped pages.
    #[inline]
    pub fn num_pages(&self) -> usize {
        self.pages.len()
    }

    /// Size in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.pages.len() * PAGE_SIZE
    }

    /// Access flags of page `vpn`.
    pub fn flags(&self, vpn: usize) -> Option<PageFlags> {
        self.pages.get(vpn).map(|p| p.flags)
    }

    /// Change the access flags of page `vpn`.
    pub fn set_flags(&mut self, vpn: usize, flags: PageFlags) -> KResult<()> {
        let page = self.pages.get_mut(vpn).ok_or(KernelError::InvalidAddress)?;
        page.flags = flags;
        Ok(())
    }

    /// Validate that `[addr, addr + len)` is mapped with `required` rights.
    ///
    /// Zero-length ranges are always valid. A null start is rejected for any
    /// non-empty range.
    pub fn check(&self, addr: VirtAddr, len: usize, required: PageFlags) -> KResult<()> {
        if len == 0 {
            return Ok(());
        }
        if addr.is_null() {
            return Err(KernelError::InvalidAddress);
        }
        self.check_range(addr, len)?;
        let first = addr.page_number();
        let last = (addr.as_usize() + len - 1) / PAGE_SIZE;
        if self.pages[first..=last]
            .iter()
            .all(|p| p.flags.contains(required))
        {
            Ok(())
        } else {
            Err(KernelError::InvalidAddress)
        }
    }

    /// Copy user bytes at `addr` into `buf`.
    pub fn copy_in(&self, addr: VirtAddr, buf: &mut [u8]) -> KResult<()> {
        self.check(addr, buf.len(), PageFlags::READ)?;
        let mut done = 0;
        while done < buf.len() {
            let at = VirtAddr::new(addr.as_usize() + done);
            let page = &self.pages[at.page_number()];
            let off = at.page_offset();
            let amount = (PAGE_SIZE - off).min(buf.len() - done);
            buf[done..done + amount].copy_from_slice(&page.frame[off..off + amount]);
            done += amount;
        }
        Ok(())
    }

    /// Copy `data` out to user memory at `addr`.
    pub fn copy_out(&mut self, addr: VirtAddr, data: &[u8]) -> KResult<()> {
        self.check(addr, data.len(), PageFlags::WRITE)?;
        self.store(addr, data);
        Ok(())
    }

    /// Loader-side write that ignores page flags and allows address 0.
    pub fn load(&mut self, addr: VirtAddr, data: &[u8]) -> KResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.check_range(addr, data.len())?;
        self.store(addr, data);
        Ok(())
    }

    /// Read a NUL-terminated UTF-8 string of at most `max_len` bytes.
    ///
    /// # Errors
    /// - `InvalidAddress` if the string runs off readable memory
    /// - `InvalidArgument` if no terminator appears within `max_len + 1`
    ///   bytes or the bytes are not UTF-8
    pub fn read_cstr(&self, addr: VirtAddr, max_len: usize) -> KResult<String> {
        if addr.is_null() {
            return Err(KernelError::InvalidAddress);
        }
        let mut bytes = Vec::new();
        let mut at = addr;
        while bytes.len() <= max_len {
            let mut byte = [0u8; 1];
            self.copy_in(at, &mut byte)?;
            if byte[0] == 0 {
                return String::from_utf8(bytes).map_err(|_| KernelError::InvalidArgument);
            }
            bytes.push(byte[0]);
            at = at.checked_add(1).ok_or(KernelError::InvalidAddress)?;
        }
        Err(KernelError::InvalidArgument)
    }

    /// Read a little-endian 32-bit word.
    pub fn read_u32(&self, addr: VirtAddr) -> KResult<u32> {
        let mut word = [0u8; 4];
        self.copy_in(addr, &mut word)?;
        Ok(u32::from_le_bytes(word))
    }

    /// Write a little-endian 32-bit word.
    pub fn write_u32(&mut self, addr: VirtAddr, value: u32) -> KResult<()> {
        self.copy_out(addr, &value.to_le_bytes())
    }

    fn check_range(&self, addr: VirtAddr, len: usize) -> KResult<()> {
        let end = addr.checked_add(len).ok_or(KernelError::InvalidAddress)?;
        if end.as_usize() > self.size() {
            return Err(KernelError::InvalidAddress);
        }
        Ok(())
    }

    fn store(&mut self, addr: VirtAddr, data: &[u8]) {
        let mut done = 0;
        while done < data.len() {
            let at = VirtAddr::new(addr.as_usize() + done);
            let page = &mut self.pages[at.page_number()];
            let off = at.page_offset();
            let amount = (PAGE_SIZE - off).min(data.len() - done);
            page.frame[off..off + amount].copy_from_slice(&data[done..done + amount]);
            done += amount;
        }
    }
}

impl core::fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "AddressSpace({} pages)", self.pages.len())
    }
}
