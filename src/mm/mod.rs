//! Memory management module
//!
//! Provides:
//! - User virtual address arithmetic
//! - Per-process address spaces with page-granular access checks
//!
//! # Security Principles
//! - All user ranges are bounds-checked before bytes move
//! - Kernel code never dereferences user addresses directly

mod address;
mod address_space;

pub use address::{VirtAddr, PAGE_SHIFT, PAGE_SIZE};
pub use address_space::{AddressSpace, PageFlags};
