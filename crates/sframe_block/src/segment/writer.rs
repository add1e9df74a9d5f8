//! Segment writer.
//!
//! Segment files are written once by a single writer, sealed with a footer,
//! and then only read. The writer appends blocks (optionally
//! LZ4-compressing them), accumulates per-column [`BlockInfo`] records, and
//! emits the footer plus the trailing footer-length field on close.

use crate::error::{BlockError, BlockResult};
use crate::segment::{footer, BlockInfo, LZ4_COMPRESSED, TYPED_BLOCK};
use crate::value::{encode_typed_block, Value};
use sframe_storage::{AppendWrite, FileStore};
use std::path::Path;

/// Writes one v2 segment file.
///
/// ```no_run
/// use sframe_block::{SegmentWriter, Value};
///
/// let mut writer = SegmentWriter::create("seg-0000", 2)?;
/// writer.write_typed_block(0, &[Value::Integer(1), Value::Integer(2)], true)?;
/// writer.write_block(1, b"raw payload", 1, false)?;
/// writer.close()?;
/// # Ok::<(), sframe_block::BlockError>(())
/// ```
pub struct SegmentWriter {
    path: String,
    sink: Box<dyn AppendWrite>,
    blocks: Vec<Vec<BlockInfo>>,
}

impl SegmentWriter {
    /// Creates a segment file at `path` holding `num_columns` columns.
    ///
    /// # Errors
    ///
    /// Returns [`BlockError::OpenFailure`] if the file cannot be created.
    pub fn create(path: &str, num_columns: usize) -> BlockResult<Self> {
        let store = FileStore::create(Path::new(path))
            .map_err(|source| BlockError::open_failure(path, source))?;
        Ok(Self::with_sink(path, Box::new(store), num_columns))
    }

    /// Creates a writer over an arbitrary sink. `path` is only used in
    /// error messages.
    #[must_use]
    pub fn with_sink(path: &str, sink: Box<dyn AppendWrite>, num_columns: usize) -> Self {
        Self {
            path: path.to_string(),
            sink,
            blocks: vec![Vec::new(); num_columns],
        }
    }

    /// Appends one raw block to `column`.
    ///
    /// `num_elem` records how many elements the block decodes to. With
    /// `compress` set, the body is stored LZ4-compressed and the footer
    /// records both the on-disk and the decoded length.
    ///
    /// # Errors
    ///
    /// Returns [`BlockError::ColumnOutOfRange`] for an unknown column and
    /// [`BlockError::IoFailure`] if the write does not complete.
    pub fn write_block(
        &mut self,
        column: usize,
        data: &[u8],
        num_elem: u64,
        compress: bool,
    ) -> BlockResult<()> {
        self.write_block_with_flags(column, data, num_elem, compress, 0)
    }

    /// Appends one typed block to `column`, encoding `values` with the
    /// element-tagged codec.
    ///
    /// # Errors
    ///
    /// Same conditions as [`SegmentWriter::write_block`], plus
    /// [`BlockError::Malformed`] for a string value too long to encode.
    pub fn write_typed_block(
        &mut self,
        column: usize,
        values: &[Value],
        compress: bool,
    ) -> BlockResult<()> {
        let body = encode_typed_block(values)?;
        self.write_block_with_flags(column, &body, values.len() as u64, compress, TYPED_BLOCK)
    }

    fn write_block_with_flags(
        &mut self,
        column: usize,
        data: &[u8],
        num_elem: u64,
        compress: bool,
        mut flags: u64,
    ) -> BlockResult<()> {
        if column >= self.blocks.len() {
            return Err(BlockError::ColumnOutOfRange {
                column,
                ncolumns: self.blocks.len(),
            });
        }

        let stored;
        let body: &[u8] = if compress {
            flags |= LZ4_COMPRESSED;
            stored = lz4_flex::compress(data);
            &stored
        } else {
            data
        };

        let offset = self
            .sink
            .append(body)
            .map_err(|e| BlockError::io_failure(&self.path, e.to_string()))?;

        self.blocks[column].push(BlockInfo {
            offset,
            length: body.len() as u64,
            block_size: data.len() as u64,
            num_elem,
            flags,
        });
        Ok(())
    }

    /// Per-column element totals written so far.
    #[must_use]
    pub fn column_sizes(&self) -> Vec<u64> {
        self.blocks
            .iter()
            .map(|column| column.iter().map(|b| b.num_elem).sum())
            .collect()
    }

    /// Seals the segment: writes the footer and the trailing footer-length
    /// field, then syncs.
    ///
    /// # Errors
    ///
    /// Returns [`BlockError::IoFailure`] if the footer write or sync does
    /// not complete (e.g., disk full).
    pub fn close(mut self) -> BlockResult<()> {
        let footer_bytes = footer::encode_footer(&self.blocks);

        self.seal(&footer_bytes)
            .map_err(|e| BlockError::io_failure(&self.path, e.to_string()))?;

        tracing::debug!(path = %self.path, columns = self.blocks.len(), "sealed segment");
        Ok(())
    }

    fn seal(&mut self, footer_bytes: &[u8]) -> sframe_storage::StorageResult<()> {
        self.sink.append(footer_bytes)?;
        self.sink
            .append(&(footer_bytes.len() as u64).to_le_bytes())?;
        self.sink.flush()?;
        self.sink.sync()
    }
}

impl std::fmt::Debug for SegmentWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentWriter")
            .field("path", &self.path)
            .field("columns", &self.blocks.len())
            .finish_non_exhaustive()
    }
}
