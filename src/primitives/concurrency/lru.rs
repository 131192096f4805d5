//! Deduplicating queue keyed by node id.
//!
//! Re-enqueuing a node that is still queued refreshes its request and moves
//! it to the most recent end instead of adding a second entry. Dequeue takes
//! the least recently enqueued entry and skips entries that aged past
//! `max_age` epochs. Map and recency list are guarded by one mutex.

use std::num::NonZeroUsize;
use std::sync::Arc;

use ::lru::LruCache;
use parking_lot::Mutex;

use crate::types::NodeId;

use super::{AdviseConsumer, AdviseProducer, AdviseRequest, Epoch, Full};

struct Shared {
    entries: Mutex<LruCache<NodeId, AdviseRequest>>,
    max_age: u32,
    epoch: Epoch,
}

/// Producer end of an LRU queue.
pub struct LruProducer {
    shared: Arc<Shared>,
}

/// Consumer end of an LRU queue.
pub struct LruConsumer {
    shared: Arc<Shared>,
}

/// Creates an LRU queue with at most `capacity` live entries.
pub fn channel(capacity: usize, max_age: u32) -> (LruProducer, LruConsumer) {
    let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
    let shared = Arc::new(Shared {
        entries: Mutex::new(LruCache::new(capacity)),
        max_age,
        epoch: Epoch::default(),
    });
    (
        LruProducer {
            shared: Arc::clone(&shared),
        },
        LruConsumer { shared },
    )
}

impl LruProducer {
    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.shared.entries.lock().len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AdviseProducer for LruProducer {
    /// Never fails; at capacity the least recent entry is evicted.
    fn enqueue(&mut self, mut request: AdviseRequest) -> Result<(), Full> {
        let mut entries = self.shared.entries.lock();
        request.epoch = self.shared.epoch.current();
        entries.put(request.node, request);
        Ok(())
    }

    fn increment_epoch(&mut self) -> u32 {
        self.shared.epoch.increment()
    }

    fn current_epoch(&self) -> u32 {
        self.shared.epoch.current()
    }
}

impl AdviseConsumer for LruConsumer {
    fn dequeue(&mut self) -> Option<AdviseRequest> {
        let mut entries = self.shared.entries.lock();
        // Read under the lock so no entry carries an epoch newer than `current`.
        let current = self.shared.epoch.current();
        while let Some((_, request)) = entries.pop_lru() {
            if current.wrapping_sub(request.epoch) <= self.shared.max_age {
                return Some(request);
            }
        }
        None
    }

    fn current_epoch(&self) -> u32 {
        self.shared.epoch.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;

    fn req(node: u64, epoch: u32) -> AdviseRequest {
        AdviseRequest {
            node: NodeId(node),
            epoch,
            direction: Direction::Out,
        }
    }

    #[test]
    fn reenqueue_refreshes_instead_of_duplicating() {
        let (mut tx, mut rx) = channel(8, 100);
        tx.enqueue(req(1, 0)).unwrap();
        tx.increment_epoch();
        tx.enqueue(req(2, 0)).unwrap();
        tx.increment_epoch();
        tx.enqueue(req(1, 0)).unwrap();
        assert_eq!(tx.len(), 2);
        assert_eq!(rx.dequeue(), Some(req(2, 1)));
        assert_eq!(rx.dequeue(), Some(req(1, 2)));
        assert_eq!(rx.dequeue(), None);
    }

    #[test]
    fn aged_entries_are_dropped() {
        let (mut tx, mut rx) = channel(8, 2);
        tx.enqueue(req(1, 0)).unwrap();
        for _ in 0..3 {
            tx.increment_epoch();
        }
        tx.enqueue(req(2, 0)).unwrap();
        tx.increment_epoch();
        assert_eq!(rx.dequeue(), Some(req(2, 3)));
        assert!(tx.is_empty());
    }

    #[test]
    fn caller_epoch_is_replaced_on_enqueue() {
        let (mut tx, mut rx) = channel(8, 2);
        tx.increment_epoch();
        // A far-future epoch would wrap past max_age if it were kept.
        tx.enqueue(req(5, 1_000)).unwrap();
        assert_eq!(rx.dequeue(), Some(req(5, 1)));
    }

    #[test]
    fn capacity_evicts_least_recent() {
        let (mut tx, mut rx) = channel(2, 10);
        tx.enqueue(req(1, 0)).unwrap();
        tx.enqueue(req(2, 0)).unwrap();
        tx.enqueue(req(3, 0)).unwrap();
        assert_eq!(rx.dequeue().map(|r| r.node), Some(NodeId(2)));
        assert_eq!(rx.dequeue().map(|r| r.node), Some(NodeId(3)));
    }
}
