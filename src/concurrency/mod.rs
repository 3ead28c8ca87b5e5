//! Lock-free cross-thread primitives.
//!
//! [`MpmcQueue`] moves commands and endpoint receive-jobs between threads
//! without blocking a full producer. [`PublishSlot`] exposes the engine's
//! latest stats snapshot to any reader without ever handing back a torn
//! value.

mod publish;
mod queue;

pub use publish::PublishSlot;
pub use queue::MpmcQueue;
