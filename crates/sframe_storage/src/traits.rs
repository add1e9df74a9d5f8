//! Store trait definitions.

use crate::error::StorageResult;

/// A shared, positionally-readable byte store.
///
/// Readers are handed out behind `Arc` (the block layer's file-handle pool
/// tracks them with weak references), so all methods take `&self` and
/// implementations serialize access to any shared seek position internally.
///
/// # Invariants
///
/// - `read_exact_at` fills the whole destination buffer or fails
/// - `size` is stable for sealed files (segments are written once)
pub trait RandomRead: Send + Sync {
    /// Reads exactly `buf.len()` bytes starting at `offset` into `buf`.
    ///
    /// # Errors
    ///
    /// Returns an error if the read would extend beyond the current size
    /// or if an I/O error occurs. On error the buffer contents are
    /// unspecified.
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> StorageResult<()>;

    /// Returns the current size of the store in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Reads `len` bytes starting at `offset` into a fresh buffer.
    ///
    /// Convenience wrapper over [`RandomRead::read_exact_at`] for callers
    /// that do not recycle buffers.
    ///
    /// # Errors
    ///
    /// Same conditions as [`RandomRead::read_exact_at`].
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_exact_at(offset, &mut buf)?;
        Ok(buf)
    }
}

/// An append-only byte sink.
///
/// Segment and index files are written once by a single owner and then
/// sealed, so writers take `&mut self` and are not shared.
pub trait AppendWrite {
    /// Appends data to the end of the store.
    ///
    /// Returns the offset where the data was written.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Flushes all pending writes to the OS.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Syncs all data and metadata to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&mut self) -> StorageResult<()>;
}
