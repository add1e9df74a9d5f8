//! File-backed byte store.

use crate::error::{StorageError, StorageResult};
use crate::traits::{AppendWrite, RandomRead};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A file-backed byte store.
///
/// One `FileStore` wraps one open file descriptor. Reads share the file's
/// seek position, so positional reads are serialized by an internal lock;
/// multiple threads may read through the same handle concurrently without
/// corrupting each other's offsets.
///
/// # Example
///
/// ```no_run
/// use sframe_storage::{FileStore, RandomRead};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("segment-0000")).unwrap();
/// let bytes = store.read_at(0, 16).unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    file: Mutex<File>,
    size: Mutex<u64>,
}

impl FileStore {
    /// Opens an existing file for reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be opened.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new().read(true).open(path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            size: Mutex::new(size),
        })
    }

    /// Creates (or truncates) a file for writing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            size: Mutex::new(0),
        })
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RandomRead for FileStore {
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> StorageResult<()> {
        let size = *self.size.lock();
        let end = offset.saturating_add(buf.len() as u64);

        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd {
                offset,
                len: buf.len(),
                size,
            });
        }

        if buf.is_empty() {
            return Ok(());
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;

        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(*self.size.lock())
    }
}

impl AppendWrite for FileStore {
    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let mut size = self.size.lock();
        if data.is_empty() {
            return Ok(*size);
        }

        let mut file = self.file.lock();
        let offset = *size;
        file.seek(SeekFrom::End(0))?;
        file.write_all(data)?;
        *size += data.len() as u64;

        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.file.lock().flush()?;
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_missing_file_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nope.bin");
        assert!(FileStore::open(&path).is_err());
    }

    #[test]
    fn create_append_and_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bin");

        let mut store = FileStore::create(&path).unwrap();

        let offset1 = store.append(b"hello").unwrap();
        assert_eq!(offset1, 0);

        let offset2 = store.append(b" world").unwrap();
        assert_eq!(offset2, 5);

        assert_eq!(store.size().unwrap(), 11);

        let data = store.read_at(0, 11).unwrap();
        assert_eq!(&data, b"hello world");
    }

    #[test]
    fn read_partial() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bin");

        let mut store = FileStore::create(&path).unwrap();
        store.append(b"hello world").unwrap();

        let data = store.read_at(6, 5).unwrap();
        assert_eq!(&data, b"world");
    }

    #[test]
    fn read_past_end_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bin");

        let mut store = FileStore::create(&path).unwrap();
        store.append(b"hello").unwrap();

        let result = store.read_at(10, 5);
        assert!(matches!(result, Err(StorageError::ReadPastEnd { .. })));
    }

    #[test]
    fn reopen_sealed_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bin");

        {
            let mut store = FileStore::create(&path).unwrap();
            store.append(b"sealed data").unwrap();
            store.sync().unwrap();
        }

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.size().unwrap(), 11);

        let data = store.read_at(0, 11).unwrap();
        assert_eq!(&data, b"sealed data");
    }

    #[test]
    fn read_into_caller_buffer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bin");

        let mut store = FileStore::create(&path).unwrap();
        store.append(b"abcdef").unwrap();

        let mut buf = vec![0u8; 3];
        store.read_exact_at(2, &mut buf).unwrap();
        assert_eq!(&buf, b"cde");
    }

    #[test]
    fn empty_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bin");

        let mut store = FileStore::create(&path).unwrap();
        store.append(b"hello").unwrap();

        let data = store.read_at(2, 0).unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn path_accessor() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bin");

        let store = FileStore::create(&path).unwrap();
        assert_eq!(store.path(), path);
    }
}
