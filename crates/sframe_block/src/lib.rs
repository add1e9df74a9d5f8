//! # SFrame Block Management
//!
//! Block-management layer for the SFrame columnar storage engine.
//!
//! This crate maps logical columns onto physical on-disk segment files and
//! serves compressed, typed data blocks under concurrent access with
//! bounded resource usage. It provides:
//!
//! - The v2 segment container format: data blocks plus a trailing binary
//!   footer describing `blocks[column][block]`
//! - The index-file codec (JSON preferred, legacy INI readable)
//! - A bounded file-handle pool with weak-reference reuse
//! - A buffer pool recycling read/decompression buffers
//! - [`BlockManager`]: a reference-counted open-segment registry serving
//!   raw and typed block reads
//!
//! ## Addressing
//!
//! A logical column is addressed as `path` or `path:N` where `N` is the
//! column's index within a multi-column segment file. Opening a column
//! yields a [`ColumnAddress`]; blocks within it are addressed by
//! [`BlockAddress`].
//!
//! ## Example
//!
//! ```no_run
//! use sframe_block::{BlockAddress, BlockManager};
//!
//! let manager = BlockManager::default();
//! let column = manager.open_column("data/seg-0000:0")?;
//! for block_id in 0..manager.num_blocks_in_column(column)? {
//!     let addr = BlockAddress::new(column, block_id);
//!     if let Some(bytes) = manager.read_block(addr)? {
//!         // ... consume bytes ...
//!         manager.release_buffer(bytes);
//!     }
//! }
//! manager.close_column(column)?;
//! # Ok::<(), sframe_block::BlockError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod buffer;
mod config;
mod error;
mod filename;
mod index;
mod manager;
mod pool;
mod segment;
mod value;

pub use config::BlockManagerConfig;
pub use error::{BlockError, BlockResult};
pub use filename::{format_segment_filename, parse_segment_filename};
pub use index::{
    read_group_index, read_single_column_index, write_group_index, GroupIndexFileInfo,
    IndexFileInfo, INDEX_FORMAT_VERSION,
};
pub use manager::{BlockAddress, BlockManager, ColumnAddress};
pub use segment::writer::SegmentWriter;
pub use segment::{BlockInfo, LZ4_COMPRESSED, TYPED_BLOCK};
pub use value::Value;
