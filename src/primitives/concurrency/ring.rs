//! Fixed-capacity lossy ring.
//!
//! Enqueue never blocks and never fails: once the producer is a full lap
//! ahead it overwrites the oldest unconsumed request. Each slot carries a
//! state word `position << 2 | flag`; the consumer accepts a slot only if the
//! word names the position it expects and is unchanged after the payload has
//! been read.

use std::sync::atomic::{fence, AtomicU64, Ordering};
use std::sync::Arc;

use super::{AdviseConsumer, AdviseProducer, AdviseRequest, Epoch, Full};

const WRITING: u64 = 0b01;
const FULL: u64 = 0b10;

struct Slot {
    state: AtomicU64,
    node: AtomicU64,
    meta: AtomicU64,
}

struct Shared {
    slots: Box<[Slot]>,
    tail: AtomicU64,
    epoch: Epoch,
}

/// Producer end of a ring queue.
pub struct RingProducer {
    shared: Arc<Shared>,
    tail: u64,
}

/// Consumer end of a ring queue.
pub struct RingConsumer {
    shared: Arc<Shared>,
    head: u64,
    dropped: u64,
}

/// Creates a ring holding the newest `capacity` requests.
pub fn channel(capacity: usize) -> (RingProducer, RingConsumer) {
    let slots = (0..capacity.max(1))
        .map(|_| Slot {
            state: AtomicU64::new(0),
            node: AtomicU64::new(0),
            meta: AtomicU64::new(0),
        })
        .collect();
    let shared = Arc::new(Shared {
        slots,
        tail: AtomicU64::new(0),
        epoch: Epoch::default(),
    });
    (
        RingProducer {
            shared: Arc::clone(&shared),
            tail: 0,
        },
        RingConsumer {
            shared,
            head: 0,
            dropped: 0,
        },
    )
}

impl Shared {
    #[inline]
    fn capacity(&self) -> u64 {
        self.slots.len() as u64
    }

    #[inline]
    fn slot(&self, pos: u64) -> &Slot {
        &self.slots[(pos % self.capacity()) as usize]
    }
}

impl RingConsumer {
    /// Requests overwritten before this consumer reached them.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl AdviseProducer for RingProducer {
    fn enqueue(&mut self, mut request: AdviseRequest) -> Result<(), Full> {
        request.epoch = self.shared.epoch.current();
        let pos = self.tail;
        let slot = self.shared.slot(pos);
        slot.state.store(pos << 2 | WRITING, Ordering::Relaxed);
        fence(Ordering::Release);
        slot.node.store(request.node.0, Ordering::Relaxed);
        slot.meta.store(request.meta(), Ordering::Relaxed);
        slot.state.store(pos << 2 | FULL, Ordering::Release);
        self.tail = pos + 1;
        self.shared.tail.store(self.tail, Ordering::Release);
        Ok(())
    }

    fn increment_epoch(&mut self) -> u32 {
        self.shared.epoch.increment()
    }

    fn current_epoch(&self) -> u32 {
        self.shared.epoch.current()
    }
}

impl AdviseConsumer for RingConsumer {
    fn dequeue(&mut self) -> Option<AdviseRequest> {
        loop {
            let tail = self.shared.tail.load(Ordering::Acquire);
            if self.head >= tail {
                return None;
            }
            let capacity = self.shared.capacity();
            if tail - self.head > capacity {
                self.dropped += tail - capacity - self.head;
                self.head = tail - capacity;
            }
            let expected = self.head << 2 | FULL;
            let slot = self.shared.slot(self.head);
            if slot.state.load(Ordering::Acquire) != expected {
                // Producer is rewriting this slot for a later lap.
                std::hint::spin_loop();
                continue;
            }
            let node = slot.node.load(Ordering::Relaxed);
            let meta = slot.meta.load(Ordering::Relaxed);
            fence(Ordering::Acquire);
            if slot.state.load(Ordering::Relaxed) != expected {
                continue;
            }
            self.head += 1;
            return Some(AdviseRequest::from_parts(node, meta));
        }
    }

    fn current_epoch(&self) -> u32 {
        self.shared.epoch.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, NodeId};

    fn req(node: u64) -> AdviseRequest {
        AdviseRequest {
            node: NodeId(node),
            epoch: 0,
            direction: Direction::In,
        }
    }

    #[test]
    fn keeps_newest_capacity_items() {
        let (mut tx, mut rx) = channel(4);
        for n in 0..10 {
            tx.enqueue(req(n)).unwrap();
        }
        let drained: Vec<u64> = std::iter::from_fn(|| rx.dequeue()).map(|r| r.node.0).collect();
        assert_eq!(drained, vec![6, 7, 8, 9]);
        assert_eq!(rx.dropped(), 6);
    }

    #[test]
    fn interleaved_use_loses_nothing_within_capacity() {
        let (mut tx, mut rx) = channel(2);
        for n in 0..50 {
            tx.enqueue(req(n)).unwrap();
            if n % 2 == 1 {
                assert_eq!(rx.dequeue().map(|r| r.node.0), Some(n - 1));
                assert_eq!(rx.dequeue().map(|r| r.node.0), Some(n));
            }
        }
        assert_eq!(rx.dequeue(), None);
        assert_eq!(rx.dropped(), 0);
    }
}
