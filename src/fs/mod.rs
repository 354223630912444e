//! File Layer
//!
//! Two tables sit between the syscall dispatcher and the storage
//! collaborator:
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌────────────────────┐
//! │ FdTable (P1) │──┐  │ FdTable (P2) │──┐  │                    │
//! │ 0,1: console │  │  │ 0,1: console │  ├─▶│ OpenFileRegistry   │──▶ FileSystem
//! │ 2..: files   │  └─────────────────────┘  │ name → entry, refs │
//! └──────────────┘                           └────────────────────┘
//! ```
//!
//! Each process owns a descriptor table; all tables share one registry, so
//! descriptors for the same name in different processes reach the same
//! storage object.

pub mod fd_table;
pub mod registry;

use bitflags::bitflags;

pub use fd_table::{Fd, FdTable};
pub use registry::{OpenFile, OpenFileRegistry};

bitflags! {
    /// How a name is opened.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenMode: u8 {
        /// Create the file if it does not exist.
        const CREATE = 1 << 0;
        /// Discard existing contents.
        const TRUNCATE = 1 << 1;
    }
}

impl OpenMode {
    /// Mode used by `creat`.
    pub const CREAT: Self = Self::CREATE.union(Self::TRUNCATE);
}
