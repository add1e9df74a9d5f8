//! Segment files and their footers.
//!
//! A v2 segment file is a sequence of raw data blocks (each optionally
//! LZ4-compressed) followed by a serialized footer describing, for every
//! column stored in the file, the ordered [`BlockInfo`] records for that
//! column's blocks. The file ends with a trailing 8-byte little-endian
//! footer byte-length; readers locate the footer by reading
//! `file_size - 8` for the length and `file_size - 8 - footer_len` for the
//! footer start.

pub(crate) mod footer;
pub mod writer;

use crate::error::{BlockError, BlockResult};
use crate::pool::FileHandlePool;
use parking_lot::Mutex;
use sframe_storage::RandomRead;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{OnceLock, Weak};

/// Flag bit marking a block body as LZ4-compressed on disk.
pub const LZ4_COMPRESSED: u64 = 1;

/// Flag bit marking a block body as typed (element-tagged) data.
pub const TYPED_BLOCK: u64 = 2;

/// LZ4 cannot expand a compressed body by more than roughly 255x, so a
/// footer that declares a larger decoded size cannot come from a real
/// writer.
const MAX_LZ4_EXPANSION: u64 = 256;

/// Footer entry for one physical block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockInfo {
    /// Byte offset of the block within the segment file.
    pub offset: u64,
    /// On-disk length in bytes (post-compression).
    pub length: u64,
    /// Decoded, in-memory length in bytes.
    pub block_size: u64,
    /// Number of elements the block decodes to.
    pub num_elem: u64,
    /// Flags bitfield ([`LZ4_COMPRESSED`], [`TYPED_BLOCK`]).
    pub flags: u64,
}

impl BlockInfo {
    /// Whether the block body is LZ4-compressed on disk.
    #[must_use]
    pub fn is_lz4_compressed(&self) -> bool {
        self.flags & LZ4_COMPRESSED != 0
    }

    /// Whether the block body holds typed, element-tagged data.
    #[must_use]
    pub fn is_typed(&self) -> bool {
        self.flags & TYPED_BLOCK != 0
    }
}

/// Parsed footer of one segment file, immutable once built.
#[derive(Debug)]
pub(crate) struct SegmentFooter {
    /// `blocks[column][block]` footer entries.
    pub(crate) blocks: Vec<Vec<BlockInfo>>,
    /// Total byte size of the segment file.
    pub(crate) file_size: u64,
}

impl SegmentFooter {
    /// Checks every block record against the file's data region, so
    /// readers can size buffers from [`BlockInfo`] without re-validating.
    ///
    /// Errors carry a plain description; the caller attaches the path.
    fn validate(&self, footer_len: u64) -> Result<(), String> {
        let data_end = self.file_size - 8 - footer_len;
        for (column, blocks) in self.blocks.iter().enumerate() {
            for (block, info) in blocks.iter().enumerate() {
                let in_bounds = info
                    .offset
                    .checked_add(info.length)
                    .is_some_and(|end| end <= data_end);
                if !in_bounds {
                    return Err(format!(
                        "column {column} block {block} extends past the data region \
                         (offset {}, length {}, {data_end} data bytes)",
                        info.offset, info.length
                    ));
                }
                if info.is_lz4_compressed() {
                    if info.block_size > info.length.saturating_mul(MAX_LZ4_EXPANSION) {
                        return Err(format!(
                            "column {column} block {block} declares a decoded size of {} \
                             for {} compressed bytes",
                            info.block_size, info.length
                        ));
                    }
                } else if info.block_size != info.length {
                    return Err(format!(
                        "column {column} block {block} declares a decoded size of {} \
                         for {} stored bytes",
                        info.block_size, info.length
                    ));
                }
            }
        }
        Ok(())
    }
}

/// In-memory representation of one open physical segment file.
///
/// Owned by the [`crate::BlockManager`]; callers only ever see the
/// segment's id. The footer is parsed lazily on first access via
/// double-checked initialization: a lock-free fast path on `footer`, and a
/// slow path that re-checks under the segment's handle lock so concurrent
/// first accesses block on exactly one parse.
pub(crate) struct Segment {
    path: String,
    io_lock_index: Option<usize>,
    refs: AtomicU64,
    /// Cached weak file handle. The mutex also serializes seek+read
    /// sequences within this segment.
    handle: Mutex<Weak<dyn RandomRead>>,
    footer: OnceLock<SegmentFooter>,
    #[cfg(test)]
    footer_parses: AtomicU64,
}

impl Segment {
    pub(crate) fn new(path: String, io_lock_index: Option<usize>) -> Self {
        Self {
            path,
            io_lock_index,
            refs: AtomicU64::new(0),
            handle: Mutex::new(Weak::<sframe_storage::FileStore>::new()),
            footer: OnceLock::new(),
            #[cfg(test)]
            footer_parses: AtomicU64::new(0),
        }
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn io_lock_index(&self) -> Option<usize> {
        self.io_lock_index
    }

    /// Increments the reference count, returning the new count.
    pub(crate) fn retain(&self) -> u64 {
        self.refs.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Decrements the reference count, returning the new count.
    pub(crate) fn release(&self) -> u64 {
        self.refs.fetch_sub(1, Ordering::SeqCst) - 1
    }

    #[cfg(test)]
    pub(crate) fn ref_count(&self) -> u64 {
        self.refs.load(Ordering::SeqCst)
    }

    /// Parses the segment footer if it has not been parsed yet.
    ///
    /// Idempotent once initialized; a failed parse leaves the segment
    /// uninitialized and is reported as [`BlockError::CorruptSegment`].
    pub(crate) fn init(&self, pool: &Mutex<FileHandlePool>) -> BlockResult<()> {
        if self.footer.get().is_some() {
            return Ok(());
        }

        let mut cached = self.handle.lock();
        if self.footer.get().is_some() {
            return Ok(());
        }

        let handle = pool.lock().handle_for_segment(&self.path, &mut cached)?;

        let file_size = handle
            .size()
            .map_err(|e| BlockError::corrupt_segment(&self.path, e.to_string()))?;
        if file_size < 8 {
            return Err(BlockError::corrupt_segment(
                &self.path,
                "file too short to hold a footer length",
            ));
        }

        let mut len_buf = [0u8; 8];
        handle
            .read_exact_at(file_size - 8, &mut len_buf)
            .map_err(|e| BlockError::corrupt_segment(&self.path, e.to_string()))?;
        let footer_len = u64::from_le_bytes(len_buf);

        if footer_len.saturating_add(8) > file_size {
            return Err(BlockError::corrupt_segment(
                &self.path,
                format!("footer length {footer_len} exceeds file size {file_size}"),
            ));
        }

        let footer_bytes = handle
            .read_at(file_size - 8 - footer_len, footer_len as usize)
            .map_err(|e| BlockError::corrupt_segment(&self.path, e.to_string()))?;
        #[cfg(test)]
        self.footer_parses.fetch_add(1, Ordering::SeqCst);
        let blocks = footer::decode_footer(&footer_bytes)
            .map_err(|message| BlockError::corrupt_segment(&self.path, message))?;

        let parsed = SegmentFooter { blocks, file_size };
        parsed
            .validate(footer_len)
            .map_err(|message| BlockError::corrupt_segment(&self.path, message))?;

        tracing::debug!(path = %self.path, columns = parsed.blocks.len(), "parsed segment footer");
        let _ = self.footer.set(parsed);
        Ok(())
    }

    /// Number of times the footer deserialization actually ran.
    #[cfg(test)]
    pub(crate) fn footer_parses(&self) -> u64 {
        self.footer_parses.load(Ordering::SeqCst)
    }

    /// Returns the parsed footer.
    ///
    /// Requires [`Segment::init`] to have succeeded; the footer is
    /// immutable afterwards and needs no locking to read.
    pub(crate) fn footer(&self) -> BlockResult<&SegmentFooter> {
        self.footer
            .get()
            .ok_or_else(|| BlockError::invalid_handle(format!("segment {} not initialized", self.path)))
    }

    /// Number of columns recorded in the footer.
    pub(crate) fn num_columns(&self) -> BlockResult<usize> {
        Ok(self.footer()?.blocks.len())
    }

    /// Footer entry for one block.
    pub(crate) fn block_info(&self, column: usize, block: usize) -> BlockResult<BlockInfo> {
        let footer = self.footer()?;
        let column_blocks =
            footer
                .blocks
                .get(column)
                .ok_or_else(|| BlockError::ColumnOutOfRange {
                    column,
                    ncolumns: footer.blocks.len(),
                })?;
        column_blocks.get(block).copied().ok_or_else(|| {
            BlockError::invalid_handle(format!(
                "block {block} out of range ({} blocks in column {column})",
                column_blocks.len()
            ))
        })
    }

    /// Acquires the segment's handle lock and a strong file handle,
    /// reopening through the pool if the cached handle expired.
    pub(crate) fn locked_handle(
        &self,
        pool: &Mutex<FileHandlePool>,
    ) -> BlockResult<(parking_lot::MutexGuard<'_, Weak<dyn RandomRead>>, crate::pool::SharedHandle)>
    {
        let mut cached = self.handle.lock();
        let handle = pool.lock().handle_for_segment(&self.path, &mut cached)?;
        Ok((cached, handle))
    }

    /// Drops the cached weak handle so the underlying file closes as soon
    /// as no strong holder remains.
    pub(crate) fn drop_handle(&self) {
        *self.handle.lock() = Weak::<sframe_storage::FileStore>::new();
    }
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("path", &self.path)
            .field("refs", &self.refs.load(Ordering::SeqCst))
            .field("initialized", &self.footer.get().is_some())
            .finish_non_exhaustive()
    }
}
