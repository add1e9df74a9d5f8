//! Buffer pool for read and decompression buffers.

use parking_lot::Mutex;

/// Largest buffer capacity worth keeping around, in bytes. Oversized
/// buffers from unusually large blocks are dropped instead of retained.
const MAX_RETAINED_CAPACITY: usize = 16 * 1024 * 1024;

/// Recycles byte buffers to avoid allocation churn on the read path.
///
/// Every raw block read and every decompression goes through a buffer; the
/// pool keeps a bounded free list so steady-state reads reuse allocations.
#[derive(Debug)]
pub(crate) struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
    max_retained: usize,
}

impl BufferPool {
    /// Creates a pool retaining at most `max_retained` idle buffers.
    pub(crate) fn new(max_retained: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            max_retained,
        }
    }

    /// Returns a zero-filled buffer of exactly `len` bytes, reusing a
    /// pooled allocation when one is available.
    pub(crate) fn acquire(&self, len: usize) -> Vec<u8> {
        let mut buf = self.free.lock().pop().unwrap_or_default();
        buf.clear();
        buf.resize(len, 0);
        buf
    }

    /// Returns a buffer to the pool.
    pub(crate) fn release(&self, buf: Vec<u8>) {
        if buf.capacity() > MAX_RETAINED_CAPACITY {
            return;
        }
        let mut free = self.free.lock();
        if free.len() < self.max_retained {
            free.push(buf);
        }
    }

    #[cfg(test)]
    pub(crate) fn idle(&self) -> usize {
        self.free.lock().len()
    }
}
