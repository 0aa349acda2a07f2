//! Shared work queue for one page batch.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crate::models::ItemReference;

/// Thread-safe FIFO of pending item references.
///
/// Dequeue is non-blocking: a worker that observes an empty queue exits
/// instead of waiting. Each reference is handed out exactly once, and a
/// failed extraction is not re-enqueued.
#[derive(Debug, Default)]
pub struct WorkQueue {
    items: Mutex<VecDeque<ItemReference>>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_refs(refs: impl IntoIterator<Item = ItemReference>) -> Self {
        Self {
            items: Mutex::new(refs.into_iter().collect()),
        }
    }

    /// Add a reference. Only called during batch setup, before workers
    /// start.
    pub fn enqueue(&self, item: ItemReference) {
        self.lock().push_back(item);
    }

    /// Pop the oldest pending reference, `None` when the queue is empty.
    pub fn try_dequeue(&self) -> Option<ItemReference> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<ItemReference>> {
        // A panicked worker cannot leave the deque half-updated; popping
        // past a poisoned lock is sound.
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;

    #[test]
    fn dequeue_preserves_fifo_order() {
        let queue = WorkQueue::new();
        queue.enqueue(ItemReference::new("https://x/1"));
        queue.enqueue(ItemReference::new("https://x/2"));

        assert_eq!(queue.try_dequeue().unwrap().url(), "https://x/1");
        assert_eq!(queue.try_dequeue().unwrap().url(), "https://x/2");
        assert!(queue.try_dequeue().is_none());
    }

    #[test]
    fn concurrent_dequeue_hands_out_each_item_exactly_once() {
        let total = 500usize;
        let queue = Arc::new(WorkQueue::from_refs(
            (0..total).map(|i| ItemReference::new(format!("https://x/{i}"))),
        ));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let queue = queue.clone();
            handles.push(std::thread::spawn(move || {
                let mut seen = Vec::new();
                while let Some(item) = queue.try_dequeue() {
                    seen.push(item);
                }
                seen
            }));
        }

        let mut all: Vec<ItemReference> = Vec::new();
        for handle in handles {
            all.extend(handle.join().unwrap());
        }

        assert_eq!(all.len(), total);
        let unique: HashSet<&str> = all.iter().map(|item| item.url()).collect();
        assert_eq!(unique.len(), total);
        assert!(queue.is_empty());
    }
}
