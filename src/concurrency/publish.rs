//! Single-writer, many-reader publish slot.
//!
//! Wraps [`arc_swap::ArcSwap`]: the writer swaps in a whole new `Arc<T>`
//! each publish, so a reader's [`PublishSlot::load`] always sees a
//! complete, consistent snapshot — never a torn mix of two writes.

use std::sync::Arc;

use arc_swap::ArcSwap;

pub struct PublishSlot<T> {
    slot: ArcSwap<T>,
}

impl<T> PublishSlot<T> {
    pub fn new(initial: T) -> Self {
        Self {
            slot: ArcSwap::from_pointee(initial),
        }
    }

    /// Publish a new snapshot. Never blocks a concurrent reader.
    pub fn publish(&self, value: T) {
        self.slot.store(Arc::new(value));
    }

    /// Load the latest published snapshot.
    pub fn load(&self) -> Arc<T> {
        self.slot.load_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readers_see_whole_snapshots() {
        let slot = PublishSlot::new(0u64);
        assert_eq!(*slot.load(), 0);
        slot.publish(42);
        assert_eq!(*slot.load(), 42);
    }
}
