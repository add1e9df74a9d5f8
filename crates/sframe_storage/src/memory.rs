//! In-memory byte store for testing.

use crate::error::{StorageError, StorageResult};
use crate::traits::{AppendWrite, RandomRead};
use parking_lot::RwLock;

/// An in-memory byte store.
///
/// Stores all data in a `Vec<u8>` and is suitable for:
/// - Unit tests of the segment codecs
/// - Writing segment fixtures without touching the file system
///
/// # Example
///
/// ```rust
/// use sframe_storage::{AppendWrite, RandomRead, MemoryStore};
///
/// let mut store = MemoryStore::new();
/// let offset = store.append(b"test data").unwrap();
/// assert_eq!(offset, 0);
/// assert_eq!(store.size().unwrap(), 9);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<Vec<u8>>,
}

impl MemoryStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with pre-existing content.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Returns a copy of all bytes in the store.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

impl RandomRead for MemoryStore {
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> StorageResult<()> {
        let data = self.data.read();
        let size = data.len() as u64;
        let start = offset as usize;
        let end = start.saturating_add(buf.len());

        if offset > size || end > data.len() {
            return Err(StorageError::ReadPastEnd {
                offset,
                len: buf.len(),
                size,
            });
        }

        buf.copy_from_slice(&data[start..end]);
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }
}

impl AppendWrite for MemoryStore {
    fn append(&mut self, new_data: &[u8]) -> StorageResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(new_data);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }
}
