//! A named, bounded pool of equally-sized byte blocks.
//!
//! `allocate` never blocks: it either hands back a free block or reports
//! exhaustion. Blocks are pre-allocated at construction time, so there is
//! no steady-state allocator traffic; the free list itself is protected by
//! a short-held `parking_lot` mutex rather than the classic tagged-pointer
//! Treiber stack, which gives the same "never blocks the sender, never
//! tears a read" contract without `unsafe`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

struct PoolInner {
    name: &'static str,
    block_size: usize,
    capacity: usize,
    free: Mutex<Vec<Vec<u8>>>,
    outstanding: AtomicUsize,
}

/// A fixed-capacity set of `block_size`-byte blocks.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    /// Create a pool of `capacity` blocks, each `block_size` bytes.
    pub fn new(name: &'static str, block_size: usize, capacity: usize) -> Self {
        let free = (0..capacity).map(|_| vec![0u8; block_size]).collect();
        Self {
            inner: Arc::new(PoolInner {
                name,
                block_size,
                capacity,
                free: Mutex::new(free),
                outstanding: AtomicUsize::new(0),
            }),
        }
    }

    /// Name this pool was constructed with, used in log messages.
    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Size in bytes of each block handed out by this pool.
    pub fn block_size(&self) -> usize {
        self.inner.block_size
    }

    /// Total number of blocks this pool owns, free or outstanding.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Number of blocks currently checked out.
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::Relaxed)
    }

    /// Take a block from the free list, or `None` if the pool is exhausted.
    pub fn allocate(&self) -> Option<PoolBlock> {
        let buf = self.inner.free.lock().pop()?;
        self.inner.outstanding.fetch_add(1, Ordering::Relaxed);
        Some(PoolBlock {
            pool: self.inner.clone(),
            buf: Some(buf),
        })
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        let outstanding = self.outstanding.load(Ordering::Relaxed);
        if outstanding != 0 {
            tracing::warn!(
                pool = self.name,
                outstanding,
                "pool dropped with outstanding blocks"
            );
        }
    }
}

/// An owned block checked out of a [`Pool`]. Returned to the pool's free
/// list unconditionally when dropped, including on error paths.
pub struct PoolBlock {
    pool: Arc<PoolInner>,
    buf: Option<Vec<u8>>,
}

impl PoolBlock {
    pub fn as_slice(&self) -> &[u8] {
        self.buf.as_deref().expect("block freed while borrowed")
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().expect("block freed while borrowed")
    }

    pub fn capacity(&self) -> usize {
        self.pool.block_size
    }
}

impl Drop for PoolBlock {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.free.lock().push(buf);
            self.pool.outstanding.fetch_sub(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhaustion_returns_none() {
        let pool = Pool::new("test", 64, 3);
        let blocks: Vec<_> = (0..3).map(|_| pool.allocate().unwrap()).collect();
        assert!(pool.allocate().is_none());
        assert_eq!(pool.outstanding(), 3);
        drop(blocks);
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn freed_block_is_reallocatable() {
        let pool = Pool::new("test", 16, 1);
        let block = pool.allocate().unwrap();
        drop(block);
        assert!(pool.allocate().is_some());
    }

    #[test]
    fn concurrent_allocate_free_preserves_capacity() {
        use std::thread;

        let pool = Pool::new("contention", 32, 8);
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let pool = pool.clone();
                thread::spawn(move || {
                    for _ in 0..2_000 {
                        if let Some(mut block) = pool.allocate() {
                            block.as_mut_slice()[0] = 0xAB;
                            drop(block);
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(pool.outstanding(), 0);
    }
}
