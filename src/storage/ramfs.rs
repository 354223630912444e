//! RAM File System
//!
//! In-memory implementation of [`FileSystem`]. Objects live in a name-keyed
//! map; handles share the object's bytes, so two opens of the same name see
//! each other's writes.
//!
//! An optional per-file capacity makes writes past the limit short, which is
//! how the descriptor layer's short-write path gets exercised.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;

use log::trace;
use spin::{Mutex, RwLock};

use super::{FileSystem, StorageFile};
use crate::error::StorageError;

/// Bytes of one stored object.
#[derive(Debug, Default)]
struct Node {
    data: RwLock<Vec<u8>>,
}

/// In-memory flat file system.
#[derive(Debug, Default)]
pub struct RamFs {
    nodes: Mutex<BTreeMap<String, Arc<Node>>>,
    file_capacity: Option<usize>,
}

impl RamFs {
    /// Create an empty file system with unbounded files.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty file system whose files stop growing at `capacity`
    /// bytes.
    pub fn with_file_capacity(capacity: usize) -> Self {
        Self {
            nodes: Mutex::new(BTreeMap::new()),
            file_capacity: Some(capacity),
        }
    }

    /// Whether `name` exists on the medium.
    pub fn exists(&self, name: &str) -> bool {
        self.nodes.lock().contains_key(name)
    }

    /// Copy of the bytes stored under `name`.
    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.nodes.lock().get(name).map(|n| n.data.read().clone())
    }

    /// Number of objects on the medium.
    pub fn file_count(&self) -> usize {
        self.nodes.lock().len()
    }

    fn handle(&self, node: Arc<Node>) -> Box<dyn StorageFile> {
        Box::new(RamFile {
            node,
            capacity: self.file_capacity,
        })
    }
}

impl FileSystem for RamFs {
    fn create(&self, name: &str) -> Result<Box<dyn StorageFile>, StorageError> {
        let mut nodes = self.nodes.lock();
        let node = nodes
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Node::default()))
            .clone();
        node.data.write().clear();
        trace!("[RAMFS] create '{}'", name);
        Ok(self.handle(node))
    }

    fn open(&self, name: &str) -> Result<Box<dyn StorageFile>, StorageError> {
        let node = self
            .nodes
            .lock()
            .get(name)
            .cloned()
            .ok_or(StorageError::NotFound)?;
        Ok(self.handle(node))
    }

    fn remove(&self, name: &str) -> Result<(), StorageError> {
        match self.nodes.lock().remove(name) {
            Some(_) => {
                trace!("[RAMFS] remove '{}'", name);
                Ok(())
            }
            None => Err(StorageError::NotFound),
        }
    }
}

struct RamFile {
    node: Arc<Node>,
    capacity: Option<usize>,
}

impl StorageFile for RamFile {
    fn read_at(&self, pos: usize, buf: &mut [u8]) -> Result<usize, StorageError> {
        let data = self.node.data.read();
        if pos >= data.len() {
            return Ok(0);
        }
        let len = buf.len().min(data.len() - pos);
        buf[..len].copy_from_slice(&data[pos..pos + len]);
        Ok(len)
    }

    fn write_at(&self, pos: usize, src: &[u8]) -> Result<usize, StorageError> {
        let mut data = self.node.data.write();
        let limit = self.capacity.unwrap_or(usize::MAX);
        if pos >= limit {
            return if src.is_empty() {
                Ok(0)
            } else {
                Err(StorageError::NoSpace)
            };
        }
        let len = src.len().min(limit - pos);
        let end = pos + len;
        if data.len() < end {
            data.resize(end, 0);
        }
        data[pos..end].copy_from_slice(&src[..len]);
        Ok(len)
    }

    fn truncate(&self) -> Result<(), StorageError> {
        self.node.data.write().clear();
        Ok(())
    }

    fn len(&self) -> usize {
        self.node.data.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing() {
        let fs = RamFs::new();
        assert_eq!(fs.open("nope").err(), Some(StorageError::NotFound));
    }

    #[test]
    fn test_handles_share_bytes() {
        let fs = RamFs::new();
        let a = fs.create("f").unwrap();
        let b = fs.open("f").unwrap();
        assert_eq!(a.write_at(0, b"hello").unwrap(), 5);

        let mut buf = [0u8; 8];
        assert_eq!(b.read_at(1, &mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"ello");
        assert_eq!(b.read_at(5, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_write_past_end_zero_fills() {
        let fs = RamFs::new();
        let f = fs.create("gap").unwrap();
        f.write_at(3, b"x").unwrap();
        assert_eq!(fs.contents("gap").unwrap(), vec![0, 0, 0, b'x']);
    }

    #[test]
    fn test_create_truncates_existing() {
        let fs = RamFs::new();
        fs.create("t").unwrap().write_at(0, b"data").unwrap();
        let again = fs.create("t").unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn test_capacity_short_write() {
        let fs = RamFs::with_file_capacity(4);
        let f = fs.create("small").unwrap();
        assert_eq!(f.write_at(2, b"abcd").unwrap(), 2);
        assert_eq!(f.write_at(4, b"z"), Err(StorageError::NoSpace));
    }

    #[test]
    fn test_remove() {
        let fs = RamFs::new();
        fs.create("gone").unwrap();
        fs.remove("gone").unwrap();
        assert!(!fs.exists("gone"));
        assert_eq!(fs.remove("gone"), Err(StorageError::NotFound));
    }
}
