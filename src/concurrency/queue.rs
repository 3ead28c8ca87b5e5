//! Bounded multi-producer multi-consumer queue.
//!
//! Built on [`ringbuf`]'s heap ring buffer. The buffer itself is wait-free
//! for a single producer/consumer pair; multiple producers are serialised
//! behind a short-held `parking_lot` spinlock-free mutex so that a full
//! queue never blocks — `push` simply reports failure rather than
//! spinning or waiting on a condvar.

use parking_lot::Mutex;
use ringbuf::{HeapRb, Rb};

/// A bounded FIFO queue safe to push to and pop from from any thread.
pub struct MpmcQueue<T> {
    buf: Mutex<HeapRb<T>>,
    capacity: usize,
}

impl<T> MpmcQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Mutex::new(HeapRb::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.buf.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Push `value` onto the queue. Returns `false` (and hands `value`
    /// back is not possible since the queue takes ownership only on
    /// success) if the queue was full.
    pub fn push(&self, value: T) -> Result<(), T> {
        self.buf.lock().push(value)
    }

    /// Pop the oldest value, or `None` if the queue is empty.
    pub fn pop(&self) -> Option<T> {
        self.buf.lock().pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn fifo_order_single_producer() {
        let q = MpmcQueue::new(4);
        assert!(q.push(1).is_ok());
        assert!(q.push(2).is_ok());
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn push_fails_when_full() {
        let q = MpmcQueue::new(2);
        assert!(q.push(1).is_ok());
        assert!(q.push(2).is_ok());
        assert_eq!(q.push(3), Err(3));
    }

    #[test]
    fn concurrent_push_preserves_multiset() {
        let q = Arc::new(MpmcQueue::new(4096));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let q = q.clone();
                thread::spawn(move || {
                    for i in 0..500 {
                        while q.push(t * 1000 + i).is_err() {
                            std::thread::yield_now();
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let mut popped = Vec::new();
        while let Some(v) = q.pop() {
            popped.push(v);
        }
        assert_eq!(popped.len(), 8 * 500);
    }
}
