//! Move-only packet buffer backed by a pool block, plus a reference-counted
//! wrapper used when one received datagram must fan out to several holders.

use std::sync::Arc;

use super::pool::{Pool, PoolBlock};

/// An owned, pool-backed byte buffer with a current length `<= capacity`.
/// A `Packet` has exactly one owner at a time; the backing block returns to
/// its pool when the `Packet` is dropped.
pub struct Packet {
    block: PoolBlock,
    len: usize,
}

impl Packet {
    /// Allocate a packet from `pool`, or `None` if the pool is exhausted.
    pub fn allocate(pool: &Pool) -> Option<Self> {
        let block = pool.allocate()?;
        Some(Self { block, len: 0 })
    }

    /// Allocate a packet from `pool` and copy `data` into it.
    ///
    /// Returns `None` if the pool is exhausted or `data` exceeds the pool's
    /// block size.
    pub fn copy_from(pool: &Pool, data: &[u8]) -> Option<Self> {
        if data.len() > pool.block_size() {
            return None;
        }
        let mut packet = Self::allocate(pool)?;
        packet.capacity_mut_slice()[..data.len()].copy_from_slice(data);
        packet.set_len(data.len());
        Some(packet)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.block.capacity()
    }

    /// Set the number of valid bytes in the buffer. Panics if `len` exceeds capacity.
    pub fn set_len(&mut self, len: usize) {
        assert!(len <= self.capacity(), "packet length exceeds block capacity");
        self.len = len;
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.block.as_slice()[..self.len]
    }

    /// Mutable view of the valid prefix (`0..len`).
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        let len = self.len;
        &mut self.block.as_mut_slice()[..len]
    }

    /// Mutable view of the full block, used to write data before calling
    /// [`Packet::set_len`].
    pub fn capacity_mut_slice(&mut self) -> &mut [u8] {
        self.block.as_mut_slice()
    }
}

/// A shared, reference-counted handle to a [`Packet`], used when a single
/// received datagram must be delivered to more than one listener.
#[derive(Clone)]
pub struct RefCountedPacket {
    inner: Arc<Packet>,
}

impl RefCountedPacket {
    pub fn new(packet: Packet) -> Self {
        Self {
            inner: Arc::new(packet),
        }
    }

    /// Borrow the underlying packet.
    pub fn get(&self) -> &Packet {
        &self.inner
    }

    /// Number of holders currently sharing this packet.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Reclaim the owned `Packet` if this is the last holder, otherwise
    /// return the shared handle unchanged.
    pub fn release(self) -> Result<Packet, Self> {
        Arc::try_unwrap(self.inner).map_err(|inner| Self { inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_from_respects_capacity() {
        let pool = Pool::new("test", 4, 1);
        assert!(Packet::copy_from(&pool, &[1, 2, 3, 4, 5]).is_none());
        let packet = Packet::copy_from(&pool, &[1, 2, 3]).unwrap();
        assert_eq!(packet.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn ref_counted_release_requires_sole_owner() {
        let pool = Pool::new("test", 16, 1);
        let packet = Packet::copy_from(&pool, b"hi").unwrap();
        let shared = RefCountedPacket::new(packet);
        let clone = shared.clone();
        assert_eq!(shared.ref_count(), 2);
        let shared = shared.release().expect_err("still shared, must not release");
        drop(clone);
        assert_eq!(shared.ref_count(), 1);
        assert!(shared.release().is_ok());
    }
}
