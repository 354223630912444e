//! Storage Collaborator
//!
//! The kernel never touches blocks or directories itself. It asks a flat,
//! name-addressed file system for objects and does positioned I/O on them.
//!
//! # Contract
//! - `create` makes a new empty object or truncates an existing one
//! - `open` fails with [`StorageError::NotFound`] for unknown names
//! - `read_at`/`write_at` may transfer fewer bytes than asked; a short write
//!   is reported by the return value, not by an error

pub mod ramfs;

use alloc::boxed::Box;

use crate::error::StorageError;

pub use ramfs::RamFs;

/// A flat file system.
pub trait FileSystem: Send + Sync {
    /// Create (or truncate) `name` and return a handle to it.
    fn create(&self, name: &str) -> Result<Box<dyn StorageFile>, StorageError>;

    /// Open an existing object.
    fn open(&self, name: &str) -> Result<Box<dyn StorageFile>, StorageError>;

    /// Delete `name` from the medium.
    fn remove(&self, name: &str) -> Result<(), StorageError>;
}

/// Handle to one storage object.
pub trait StorageFile: Send + Sync {
    /// Read up to `buf.len()` bytes at `pos`. Returns 0 at end of file.
    fn read_at(&self, pos: usize, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write `data` at `pos`, extending the object as needed.
    fn write_at(&self, pos: usize, data: &[u8]) -> Result<usize, StorageError>;

    /// Drop the object's contents.
    fn truncate(&self) -> Result<(), StorageError>;

    /// Current length in bytes.
    fn len(&self) -> usize;

    /// Whether the object holds no bytes.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
