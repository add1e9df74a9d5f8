//! Block-manager configuration.

/// Configuration for a [`crate::BlockManager`].
#[derive(Debug, Clone)]
pub struct BlockManagerConfig {
    /// Maximum number of file handles tracked by the handle pool.
    pub file_handle_pool_size: usize,

    /// Minimum on-disk block length, in bytes, before a read is throttled
    /// through the I/O rate-limit locks.
    pub rate_limit_min_read: u64,

    /// Whether reads of local segment files are throttled at all.
    /// Remote (URL-addressed) paths are never throttled.
    pub throttle_local_reads: bool,

    /// Maximum number of idle buffers retained by the buffer pool.
    pub buffer_pool_retained: usize,
}

impl Default for BlockManagerConfig {
    fn default() -> Self {
        Self {
            file_handle_pool_size: 128,
            rate_limit_min_read: 2 * 1024 * 1024, // 2 MB
            throttle_local_reads: true,
            buffer_pool_retained: 64,
        }
    }
}

impl BlockManagerConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the file-handle pool capacity.
    #[must_use]
    pub const fn file_handle_pool_size(mut self, size: usize) -> Self {
        self.file_handle_pool_size = size;
        self
    }

    /// Sets the minimum block length for rate-limited reads.
    #[must_use]
    pub const fn rate_limit_min_read(mut self, bytes: u64) -> Self {
        self.rate_limit_min_read = bytes;
        self
    }

    /// Sets whether local reads are throttled.
    #[must_use]
    pub const fn throttle_local_reads(mut self, value: bool) -> Self {
        self.throttle_local_reads = value;
        self
    }

    /// Sets the buffer-pool retention limit.
    #[must_use]
    pub const fn buffer_pool_retained(mut self, count: usize) -> Self {
        self.buffer_pool_retained = count;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = BlockManagerConfig::default();
        assert_eq!(config.file_handle_pool_size, 128);
        assert!(config.throttle_local_reads);
    }

    #[test]
    fn builder_pattern() {
        let config = BlockManagerConfig::new()
            .file_handle_pool_size(8)
            .throttle_local_reads(false)
            .rate_limit_min_read(0);

        assert_eq!(config.file_handle_pool_size, 8);
        assert!(!config.throttle_local_reads);
        assert_eq!(config.rate_limit_min_read, 0);
    }
}
