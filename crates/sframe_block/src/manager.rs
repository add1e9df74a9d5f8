//! The block manager: a reference-counted open-segment registry.
//!
//! The manager owns the `path -> segment_id` and `segment_id -> Segment`
//! maps, serves raw and typed block reads through the file-handle pool, and
//! throttles concurrent large reads against the same physical path through
//! a fixed, hash-sharded array of I/O rate-limit locks.
//!
//! There is deliberately no global instance: callers construct a
//! [`BlockManager`] (typically one per session/runtime) and share it via
//! `Arc`, which keeps teardown explicit and lets tests run isolated
//! managers side by side.

use crate::buffer::BufferPool;
use crate::config::BlockManagerConfig;
use crate::error::{BlockError, BlockResult};
use crate::filename::parse_segment_filename;
use crate::pool::FileHandlePool;
use crate::segment::{BlockInfo, Segment};
use crate::value::{decode_typed_block, Value};
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::{debug, trace};

/// Number of I/O rate-limit lock shards.
///
/// A coarse approximation of per-physical-device throttling: paths hash
/// into one of these shards, and large reads on the same shard serialize.
const NUM_IO_LOCKS: usize = 16;

/// Identifies one logical column's stream of blocks within an open segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnAddress {
    /// Id assigned to the segment when its path was first opened.
    pub segment_id: u64,
    /// Column index within the segment file.
    pub column_id: usize,
}

/// Identifies one specific block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockAddress {
    /// Id assigned to the segment when its path was first opened.
    pub segment_id: u64,
    /// Column index within the segment file.
    pub column_id: usize,
    /// Block index within the column.
    pub block_id: usize,
}

impl BlockAddress {
    /// Addresses block `block_id` of an open column.
    #[must_use]
    pub fn new(column: ColumnAddress, block_id: usize) -> Self {
        Self {
            segment_id: column.segment_id,
            column_id: column.column_id,
            block_id,
        }
    }
}

#[derive(Default)]
struct Registry {
    by_path: HashMap<String, u64>,
    segments: HashMap<u64, Arc<Segment>>,
    next_id: u64,
}

/// Serves block reads from open segment files.
///
/// See the crate-level docs for the open/read/close flow. All operations
/// are synchronous and safe to call from multiple threads; reads of
/// different segments proceed in parallel, while reads within one segment
/// serialize on that segment's lock (the file handle's seek position is
/// shared).
pub struct BlockManager {
    config: BlockManagerConfig,
    registry: Mutex<Registry>,
    pool: Mutex<FileHandlePool>,
    io_locks: [Mutex<()>; NUM_IO_LOCKS],
    buffers: BufferPool,
}

impl Default for BlockManager {
    fn default() -> Self {
        Self::new(BlockManagerConfig::default())
    }
}

impl BlockManager {
    /// Creates a manager with the given configuration.
    #[must_use]
    pub fn new(config: BlockManagerConfig) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            pool: Mutex::new(FileHandlePool::new(config.file_handle_pool_size)),
            io_locks: std::array::from_fn(|_| Mutex::new(())),
            buffers: BufferPool::new(config.buffer_pool_retained),
            config,
        }
    }

    /// Opens one logical column and increments its segment's reference
    /// count.
    ///
    /// `column_file` is a segment filename, optionally suffixed `:N`; an
    /// absent suffix addresses column 0. Opening the same path again
    /// reuses the existing segment id.
    ///
    /// # Errors
    ///
    /// - [`BlockError::OpenFailure`] if the file cannot be opened
    /// - [`BlockError::CorruptSegment`] if the footer cannot be parsed
    /// - [`BlockError::ColumnOutOfRange`] if the suffix exceeds the
    ///   footer's column count
    ///
    /// A failed open never leaves a half-registered segment behind.
    pub fn open_column(&self, column_file: &str) -> BlockResult<ColumnAddress> {
        let (path, column) = parse_segment_filename(column_file);
        let column_id = column.unwrap_or(0);

        // Register (or reuse) under the manager lock; the footer I/O below
        // happens under the per-segment lock only.
        let (segment_id, segment) = {
            let mut registry = self.registry.lock();
            if let Some(&id) = registry.by_path.get(&path) {
                let segment = Arc::clone(&registry.segments[&id]);
                segment.retain();
                (id, segment)
            } else {
                let id = registry.next_id;
                registry.next_id += 1;
                let segment = Arc::new(Segment::new(path.clone(), self.io_lock_for(&path)));
                segment.retain();
                registry.by_path.insert(path, id);
                registry.segments.insert(id, Arc::clone(&segment));
                (id, segment)
            }
        };

        if let Err(e) = segment.init(&self.pool) {
            self.release_segment(segment_id);
            return Err(e);
        }

        let ncolumns = segment.num_columns()?;
        if column_id >= ncolumns {
            self.release_segment(segment_id);
            return Err(BlockError::ColumnOutOfRange {
                column: column_id,
                ncolumns,
            });
        }

        trace!(segment_id, column_id, path = segment.path(), "opened column");
        Ok(ColumnAddress {
            segment_id,
            column_id,
        })
    }

    /// Closes one logical column, decrementing its segment's reference
    /// count. When the count reaches zero the segment is deregistered and
    /// its cached file handle is released.
    ///
    /// # Errors
    ///
    /// Returns [`BlockError::InvalidHandle`] if the address's segment is
    /// not open (closing more times than opening is a caller bug).
    pub fn close_column(&self, address: ColumnAddress) -> BlockResult<()> {
        let mut registry = self.registry.lock();
        let segment = registry
            .segments
            .get(&address.segment_id)
            .cloned()
            .ok_or_else(|| {
                BlockError::invalid_handle(format!("segment {} is not open", address.segment_id))
            })?;

        if segment.release() == 0 {
            registry.by_path.remove(segment.path());
            // The handle itself only closes once every strong holder is
            // gone; dropping the cache stops this segment keeping it open.
            segment.drop_handle();
            registry.segments.remove(&address.segment_id);
            debug!(
                segment_id = address.segment_id,
                path = segment.path(),
                "closed last reference to segment"
            );
        }
        Ok(())
    }

    /// Number of blocks in an open column.
    ///
    /// # Errors
    ///
    /// Returns [`BlockError::InvalidHandle`] for an unknown segment id and
    /// [`BlockError::ColumnOutOfRange`] for a bad column index.
    pub fn num_blocks_in_column(&self, address: ColumnAddress) -> BlockResult<usize> {
        let segment = self.segment(address.segment_id)?;
        let footer = segment.footer()?;
        footer
            .blocks
            .get(address.column_id)
            .map(Vec::len)
            .ok_or_else(|| BlockError::ColumnOutOfRange {
                column: address.column_id,
                ncolumns: footer.blocks.len(),
            })
    }

    /// Footer entry for one block.
    ///
    /// # Errors
    ///
    /// Same conditions as [`BlockManager::num_blocks_in_column`], plus
    /// [`BlockError::InvalidHandle`] for a bad block index.
    pub fn get_block_info(&self, address: BlockAddress) -> BlockResult<BlockInfo> {
        self.segment(address.segment_id)?
            .block_info(address.column_id, address.block_id)
    }

    /// The full `blocks[column][block]` table of an open segment.
    ///
    /// # Errors
    ///
    /// Returns [`BlockError::InvalidHandle`] for an unknown segment id.
    pub fn get_all_block_info(&self, segment_id: u64) -> BlockResult<Vec<Vec<BlockInfo>>> {
        Ok(self.segment(segment_id)?.footer()?.blocks.clone())
    }

    /// Reads one block, decompressing it if the footer marks it LZ4.
    ///
    /// Returns `Ok(None)` on a short or failed raw read: callers treat
    /// that as "column unreadable" and apply their own retry policy. The
    /// returned buffer comes from the manager's buffer pool; hand it back
    /// via [`BlockManager::release_buffer`] when done.
    ///
    /// # Errors
    ///
    /// Address misuse surfaces as in [`BlockManager::get_block_info`];
    /// a block that fails to decompress is [`BlockError::CorruptSegment`].
    pub fn read_block(&self, address: BlockAddress) -> BlockResult<Option<Vec<u8>>> {
        let segment = self.segment(address.segment_id)?;
        let info = segment.block_info(address.column_id, address.block_id)?;

        let mut buf = self.buffers.acquire(info.length as usize);
        let read_result = {
            // The segment lock covers the seek+read; the rate-limit shard,
            // when taken, covers the raw read only.
            let (guard, handle) = segment.locked_handle(&self.pool)?;
            let throttle = self.config.throttle_local_reads
                && info.length >= self.config.rate_limit_min_read;
            let result = match segment.io_lock_index() {
                Some(index) if throttle => {
                    let _io = self.io_locks[index % NUM_IO_LOCKS].lock();
                    handle.read_exact_at(info.offset, &mut buf)
                }
                _ => handle.read_exact_at(info.offset, &mut buf),
            };
            drop(guard);
            result
        };

        if let Err(e) = read_result {
            trace!(?address, error = %e, "block read failed");
            self.buffers.release(buf);
            return Ok(None);
        }

        if !info.is_lz4_compressed() {
            return Ok(Some(buf));
        }

        // Decompression happens outside the segment lock.
        let mut decoded = self.buffers.acquire(info.block_size as usize);
        match lz4_flex::decompress_into(&buf, &mut decoded) {
            Ok(n) if n as u64 == info.block_size => {
                self.buffers.release(buf);
                Ok(Some(decoded))
            }
            Ok(n) => {
                self.buffers.release(buf);
                self.buffers.release(decoded);
                Err(BlockError::corrupt_segment(
                    segment.path(),
                    format!("block decompressed to {n} bytes, expected {}", info.block_size),
                ))
            }
            Err(e) => {
                self.buffers.release(buf);
                self.buffers.release(decoded);
                Err(BlockError::corrupt_segment(segment.path(), e.to_string()))
            }
        }
    }

    /// Reads one typed block, appending its decoded elements to `out`.
    ///
    /// Returns `false` when the underlying raw read failed (same soft
    /// failure as [`BlockManager::read_block`] returning `None`), `true`
    /// with elements appended otherwise.
    ///
    /// # Errors
    ///
    /// As [`BlockManager::read_block`], plus [`BlockError::Malformed`] if
    /// the block is not marked typed or its body does not decode.
    pub fn read_typed_block(
        &self,
        address: BlockAddress,
        out: &mut Vec<Value>,
    ) -> BlockResult<bool> {
        let info = self.get_block_info(address)?;
        if !info.is_typed() {
            return Err(BlockError::malformed(format!(
                "block {address:?} is not a typed block"
            )));
        }

        let Some(buf) = self.read_block(address)? else {
            return Ok(false);
        };
        let decoded = decode_typed_block(&buf, info.num_elem, out);
        self.buffers.release(buf);
        decoded?;
        Ok(true)
    }

    /// Returns a buffer obtained from [`BlockManager::read_block`] to the
    /// buffer pool.
    pub fn release_buffer(&self, buf: Vec<u8>) {
        self.buffers.release(buf);
    }

    /// Number of segments currently open.
    #[must_use]
    pub fn num_open_segments(&self) -> usize {
        self.registry.lock().segments.len()
    }

    fn segment(&self, segment_id: u64) -> BlockResult<Arc<Segment>> {
        self.registry
            .lock()
            .segments
            .get(&segment_id)
            .cloned()
            .ok_or_else(|| {
                BlockError::invalid_handle(format!("segment {segment_id} is not open"))
            })
    }

    /// Drops one reference taken during a failed `open_column`.
    fn release_segment(&self, segment_id: u64) {
        let mut registry = self.registry.lock();
        let Some(segment) = registry.segments.get(&segment_id).cloned() else {
            return;
        };
        if segment.release() == 0 {
            registry.by_path.remove(segment.path());
            segment.drop_handle();
            registry.segments.remove(&segment_id);
        }
    }

    /// Picks the rate-limit shard for a path, or none for paths whose
    /// storage class needs no throttling (URL-addressed remote storage).
    fn io_lock_for(&self, path: &str) -> Option<usize> {
        if path.contains("://") {
            return None;
        }
        let mut hasher = DefaultHasher::new();
        path.hash(&mut hasher);
        Some((hasher.finish() % NUM_IO_LOCKS as u64) as usize)
    }
}

impl std::fmt::Debug for BlockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockManager")
            .field("open_segments", &self.num_open_segments())
            .finish_non_exhaustive()
    }
}
