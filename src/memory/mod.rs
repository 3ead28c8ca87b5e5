//! Fixed-size block allocation.
//!
//! Packets and engine jobs are allocated from a [`Pool`] instead of the
//! global allocator so that steady-state media processing never touches
//! `malloc`/`free` on the hot path.

mod packet;
mod pool;

pub use packet::{Packet, RefCountedPacket};
pub use pool::{Pool, PoolBlock};
