//! Open File Registry
//!
//! Global arena of every file some process currently has open, keyed by
//! name. Each entry counts the descriptors referring to it and remembers
//! whether the name was unlinked while open.
//!
//! # Lifecycle
//! - First `acquire` of a name opens (or creates) the storage object and
//!   registers it with one reference
//! - Later `acquire`s share the same [`OpenFile`] and bump the count
//! - `release` drops a reference; at zero the entry leaves the registry and,
//!   if it was marked for deletion, the storage object is removed
//!
//! Counting is explicit rather than left to `Arc` drop so that the moment of
//! deletion is exactly the last `close`.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::sync::Arc;

use log::{debug, warn};
use spin::{Mutex, RwLock};

use super::OpenMode;
use crate::error::{KResult, KernelError, StorageError};
use crate::storage::{FileSystem, StorageFile};

/// One open storage object, shared by every descriptor naming it.
pub struct OpenFile {
    name: String,
    file: Box<dyn StorageFile>,
    /// Writers hold this exclusively, so one `write` never interleaves with
    /// another and readers never observe half of one.
    io_lock: RwLock<()>,
}

impl OpenFile {
    fn new(name: &str, file: Box<dyn StorageFile>) -> Self {
        Self {
            name: name.to_string(),
            file,
            io_lock: RwLock::new(()),
        }
    }

    /// Canonical name the entry is registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read at `pos` into `buf`.
    pub fn read_at(&self, pos: usize, buf: &mut [u8]) -> KResult<usize> {
        let _guard = self.io_lock.read();
        Ok(self.file.read_at(pos, buf)?)
    }

    /// Write `data` at `pos` under the entry's write lock.
    pub fn write_at(&self, pos: usize, data: &[u8]) -> KResult<usize> {
        let _guard = self.io_lock.write();
        Ok(self.file.write_at(pos, data)?)
    }

    /// Current length of the storage object.
    pub fn len(&self) -> usize {
        let _guard = self.io_lock.read();
        self.file.len()
    }

    /// Whether the storage object is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn truncate(&self) -> Result<(), StorageError> {
        let _guard = self.io_lock.write();
        self.file.truncate()
    }
}

impl core::fmt::Debug for OpenFile {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "OpenFile({:?})", self.name)
    }
}

struct Entry {
    file: Arc<OpenFile>,
    refs: usize,
    pending_delete: bool,
}

/// Registry of open files, shared by all processes.
pub struct OpenFileRegistry {
    fs: Arc<dyn FileSystem>,
    entries: Mutex<BTreeMap<String, Entry>>,
}

impl OpenFileRegistry {
    /// Create an empty registry over `fs`.
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Look up `name`, opening or creating it as `mode` allows, and take a
    /// reference on the shared entry.
    ///
    /// # Errors
    /// - `NotFound` if the name is absent (or pending deletion) and `mode`
    ///   lacks `CREATE`
    /// - `AlreadyExists` if `CREATE` is asked for a name pending deletion
    /// - `Storage` for collaborator failures; no reference is taken
    pub fn acquire(&self, name: &str, mode: OpenMode) -> KResult<Arc<OpenFile>> {
        let mut entries = self.entries.lock();

        if let Some(entry) = entries.get_mut(name) {
            if entry.pending_delete {
                return Err(if mode.contains(OpenMode::CREATE) {
                    KernelError::AlreadyExists
                } else {
                    KernelError::NotFound
                });
            }
            if mode.contains(OpenMode::TRUNCATE) {
                entry.file.truncate()?;
            }
            entry.refs += 1;
            debug!("[REGISTRY] '{}' refs -> {}", name, entry.refs);
            return Ok(entry.file.clone());
        }

        let file = if !mode.contains(OpenMode::CREATE) {
            self.fs.open(name)?
        } else if mode.contains(OpenMode::TRUNCATE) {
            self.fs.create(name)?
        } else {
            match self.fs.open(name) {
                Err(StorageError::NotFound) => self.fs.create(name)?,
                other => other?,
            }
        };

        let file = Arc::new(OpenFile::new(name, file));
        entries.insert(
            name.to_string(),
            Entry {
                file: file.clone(),
                refs: 1,
                pending_delete: false,
            },
        );
        debug!("[REGISTRY] '{}' registered", name);
        Ok(file)
    }

    /// Drop one reference to `file`.
    ///
    /// The last release removes the entry; a pending deletion is then
    /// carried out on the medium. Deletion failures are logged, the
    /// bookkeeping still completes.
    pub fn release(&self, file: &Arc<OpenFile>) {
        let mut entries = self.entries.lock();
        let name = file.name();

        let Some(entry) = entries.get_mut(name) else {
            warn!("[REGISTRY] release of unregistered '{}'", name);
            return;
        };
        if !Arc::ptr_eq(&entry.file, file) {
            warn!("[REGISTRY] stale handle for '{}'", name);
            return;
        }

        entry.refs -= 1;
        debug!("[REGISTRY] '{}' refs -> {}", name, entry.refs);
        if entry.refs > 0 {
            return;
        }

        let pending_delete = entry.pending_delete;
        entries.remove(name);
        if pending_delete {
            match self.fs.remove(name) {
                Ok(()) => debug!("[REGISTRY] '{}' deleted on last close", name),
                Err(e) => warn!("[REGISTRY] deferred delete of '{}' failed: {}", name, e),
            }
        }
    }

    /// Flag an open file for deletion at its last release.
    pub fn mark_for_delete(&self, name: &str) -> KResult<()> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(name).ok_or(KernelError::NotFound)?;
        entry.pending_delete = true;
        debug!("[REGISTRY] '{}' marked for delete ({} refs)", name, entry.refs);
        Ok(())
    }

    /// Remove `name`: deferred while it is open, immediate otherwise.
    pub fn unlink(&self, name: &str) -> KResult<()> {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(name) {
            if entry.pending_delete {
                return Err(KernelError::NotFound);
            }
            entry.pending_delete = true;
            debug!("[REGISTRY] '{}' unlinked while open", name);
            return Ok(());
        }
        self.fs.remove(name)?;
        debug!("[REGISTRY] '{}' unlinked", name);
        Ok(())
    }

    /// Reference count of `name`, if registered.
    pub fn ref_count(&self, name: &str) -> Option<usize> {
        self.entries.lock().get(name).map(|e| e.refs)
    }

    /// Whether `name` is registered and marked for deletion.
    pub fn is_pending_delete(&self, name: &str) -> bool {
        self.entries
            .lock()
            .get(name)
            .map_or(false, |e| e.pending_delete)
    }

    /// Number of registered entries.
    pub fn open_count(&self) -> usize {
        self.entries.lock().len()
    }

    /// Forget every entry without touching the medium. Used at halt.
    pub(crate) fn clear(&self) {
        self.entries.lock().clear();
    }
}
