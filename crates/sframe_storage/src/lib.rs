//! # SFrame Storage
//!
//! Byte-stream abstraction consumed by the SFrame block-management layer.
//!
//! This crate provides the lowest-level storage abstraction for SFrame
//! segment and index files. Stores are **opaque byte streams** - they do
//! not interpret the data they hold; the block layer owns all file format
//! interpretation.
//!
//! ## Design Principles
//!
//! - Readers ([`RandomRead`]) expose positional reads and are `Send + Sync`
//!   so handles can be shared across threads behind `Arc`
//! - Writers ([`AppendWrite`]) are append-only: segment files are written
//!   once, sealed, and then only read
//! - No knowledge of segment footers, blocks, or index files
//!
//! ## Available Stores
//!
//! - [`MemoryStore`] - For testing and ephemeral storage
//! - [`FileStore`] - For persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use sframe_storage::{AppendWrite, RandomRead, MemoryStore};
//!
//! let mut store = MemoryStore::new();
//! let offset = store.append(b"hello world").unwrap();
//! let data = store.read_at(offset, 11).unwrap();
//! assert_eq!(&data, b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod traits;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use traits::{AppendWrite, RandomRead};
