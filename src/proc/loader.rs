//! Executable Loader Collaborator
//!
//! Turning an executable file into a populated address space is the
//! loader's business. The kernel only needs the finished [`ProgramImage`].
//!
//! # Image Layout
//! ```text
//!   0                                      size - PAGE_SIZE        size
//!   ┌──────────────── code / data / stack ──────┬──── argument page ────┐
//!   │                                           │ argv[0..argc] │ strs  │
//!   └───────────────────────────────────────────┴───────────────────────┘
//!                                  stack_pointer ┘
//! ```
//! `argv` entries are 4-byte little-endian pointers to NUL-terminated strings
//! stored right after the pointer array.

use alloc::string::String;

use log::trace;

use crate::config::USER_PTR_SIZE;
use crate::error::LoadError;
use crate::mm::{AddressSpace, VirtAddr, PAGE_SIZE};

/// Loads executables by name.
pub trait Loader: Send + Sync {
    /// Build the image for `name` started with `args`.
    fn load(&self, name: &str, args: &[String]) -> Result<ProgramImage, LoadError>;
}

/// A loaded program ready to run.
#[derive(Debug)]
pub struct ProgramImage {
    pub space: AddressSpace,
    pub entry: usize,
    pub stack_pointer: usize,
    pub argc: usize,
    pub argv: VirtAddr,
}

impl ProgramImage {
    /// Finish an image whose code is already in `space` by writing `args`
    /// into its last page.
    ///
    /// The stack starts just below the argument page.
    pub fn new(mut space: AddressSpace, entry: usize, args: &[String]) -> Result<Self, LoadError> {
        let pages = space.num_pages();
        if pages == 0 {
            return Err(LoadError::OutOfMemory);
        }

        let needed: usize = args.iter().map(|a| USER_PTR_SIZE + a.len() + 1).sum();
        if needed > PAGE_SIZE {
            return Err(LoadError::ArgumentsTooLong);
        }

        let base = (pages - 1) * PAGE_SIZE;
        let mut entry_at = base;
        let mut string_at = base + args.len() * USER_PTR_SIZE;
        for arg in args {
            let ptr = u32::try_from(string_at).map_err(|_| LoadError::OutOfMemory)?;
            space
                .load(VirtAddr::new(entry_at), &ptr.to_le_bytes())
                .map_err(|_| LoadError::OutOfMemory)?;
            entry_at += USER_PTR_SIZE;

            space
                .load(VirtAddr::new(string_at), arg.as_bytes())
                .map_err(|_| LoadError::OutOfMemory)?;
            string_at += arg.len();
            space
                .load(VirtAddr::new(string_at), &[0])
                .map_err(|_| LoadError::OutOfMemory)?;
            string_at += 1;
        }
        trace!("[LOADER] {} args in page {}", args.len(), pages - 1);

        Ok(Self {
            space,
            entry,
            stack_pointer: base,
            argc: args.len(),
            argv: VirtAddr::new(base),
        })
    }
}
