//! Bounded file-handle pool.
//!
//! The pool bounds the number of file descriptors this layer keeps open by
//! tracking weak references to shared read handles in insertion order.
//! Eviction only drops the pool's tracking entry: a handle stays alive for
//! as long as any strong holder (a segment mid-read, an external caller)
//! still references it.

use crate::error::{BlockError, BlockResult};
use sframe_storage::{FileStore, RandomRead};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Weak};

/// A shared read handle on a segment file.
pub(crate) type SharedHandle = Arc<dyn RandomRead>;

/// Tracks open read handles with capacity-based eviction.
pub(crate) struct FileHandlePool {
    capacity: usize,
    handles: VecDeque<Weak<dyn RandomRead>>,
}

impl FileHandlePool {
    /// Creates a pool tracking at most `capacity` handles.
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            handles: VecDeque::new(),
        }
    }

    /// Opens a new read handle on `path` and tracks it.
    ///
    /// At capacity, expired entries are purged first; if the pool is still
    /// full, the oldest-inserted entries are evicted outright.
    pub(crate) fn open(&mut self, path: &str) -> BlockResult<SharedHandle> {
        if self.handles.len() >= self.capacity {
            self.handles.retain(|weak| weak.strong_count() > 0);
        }
        while self.handles.len() >= self.capacity {
            self.handles.pop_front();
        }

        let store = FileStore::open(Path::new(path))
            .map_err(|source| BlockError::open_failure(path, source))?;
        let handle: SharedHandle = Arc::new(store);
        self.handles.push_back(Arc::downgrade(&handle));
        Ok(handle)
    }

    /// Returns a strong handle for a segment, reusing the segment's cached
    /// weak handle when it is still alive.
    pub(crate) fn handle_for_segment(
        &mut self,
        path: &str,
        cached: &mut Weak<dyn RandomRead>,
    ) -> BlockResult<SharedHandle> {
        if let Some(handle) = cached.upgrade() {
            return Ok(handle);
        }
        let handle = self.open(path)?;
        *cached = Arc::downgrade(&handle);
        Ok(handle)
    }

    /// Number of tracking entries currently held (live or expired).
    #[cfg(test)]
    pub(crate) fn tracked(&self) -> usize {
        self.handles.len()
    }
}

impl std::fmt::Debug for FileHandlePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileHandlePool")
            .field("capacity", &self.capacity)
            .field("tracked", &self.handles.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str) -> String {
        let path = dir.join(name);
        fs::write(&path, b"0123456789").unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn open_missing_path_fails() {
        let mut pool = FileHandlePool::new(4);
        let result = pool.open("/definitely/not/here");
        assert!(matches!(result, Err(BlockError::OpenFailure { .. })));
    }

    #[test]
    fn purge_makes_room_before_eviction() {
        let dir = tempdir().unwrap();
        let mut pool = FileHandlePool::new(2);

        // Two handles opened and immediately dropped leave expired entries.
        for name in ["a", "b"] {
            let path = touch(dir.path(), name);
            drop(pool.open(&path).unwrap());
        }
        assert_eq!(pool.tracked(), 2);

        let path = touch(dir.path(), "c");
        let _live = pool.open(&path).unwrap();
        assert_eq!(pool.tracked(), 1);
    }

    #[test]
    fn eviction_never_closes_live_handles() {
        let dir = tempdir().unwrap();
        let mut pool = FileHandlePool::new(2);

        let first_path = touch(dir.path(), "first");
        let first = pool.open(&first_path).unwrap();

        for i in 0..7 {
            let path = touch(dir.path(), &format!("seg-{i}"));
            let _handle = pool.open(&path).unwrap();
        }

        // The first handle was evicted from tracking long ago but must
        // remain readable through the strong reference.
        let bytes = first.read_at(0, 10).unwrap();
        assert_eq!(&bytes, b"0123456789");
        assert!(pool.tracked() <= 2);
    }

    #[test]
    fn segment_cache_reuses_live_handle() {
        let dir = tempdir().unwrap();
        let mut pool = FileHandlePool::new(4);
        let path = touch(dir.path(), "seg");

        let mut cached: Weak<dyn RandomRead> = Weak::<FileStore>::new();
        let first = pool.handle_for_segment(&path, &mut cached).unwrap();
        let second = pool.handle_for_segment(&path, &mut cached).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(pool.tracked(), 1);
    }

    #[test]
    fn segment_cache_reopens_after_drop() {
        let dir = tempdir().unwrap();
        let mut pool = FileHandlePool::new(4);
        let path = touch(dir.path(), "seg");

        let mut cached: Weak<dyn RandomRead> = Weak::<FileStore>::new();
        drop(pool.handle_for_segment(&path, &mut cached).unwrap());
        assert!(cached.upgrade().is_none());

        let reopened = pool.handle_for_segment(&path, &mut cached).unwrap();
        assert_eq!(reopened.read_at(0, 2).unwrap(), b"01");
    }
}
