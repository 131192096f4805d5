//! Unbounded FIFO built from fixed-size blocks.
//!
//! The producer fills the tail block and links a fresh one when it runs out
//! of slots; the consumer drains blocks in link order. A drained block goes
//! back to the arena one block later than it could, so the consumer never
//! hands back the block it has just stepped off.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use super::arena::{SlabArena, NIL};
use super::{AdviseConsumer, AdviseProducer, AdviseRequest, Epoch, Full};

struct Slot {
    node: AtomicU64,
    meta: AtomicU64,
}

struct Block {
    slots: Box<[Slot]>,
    next: AtomicU32,
}

impl Block {
    fn new(size: usize) -> Self {
        Self {
            slots: (0..size)
                .map(|_| Slot {
                    node: AtomicU64::new(0),
                    meta: AtomicU64::new(0),
                })
                .collect(),
            next: AtomicU32::new(NIL),
        }
    }
}

struct Shared {
    arena: SlabArena<Block>,
    block_size: usize,
    /// Requests fully written by the producer.
    published: AtomicU64,
    epoch: Epoch,
}

/// Producer end of a block queue.
pub struct BlockProducer {
    shared: Arc<Shared>,
    block: u32,
    pos: usize,
    written: u64,
}

/// Consumer end of a block queue.
pub struct BlockConsumer {
    shared: Arc<Shared>,
    block: u32,
    pos: usize,
    consumed: u64,
    deferred: Option<u32>,
}

/// Creates a block queue with `block_size` slots per block and at most `max_blocks` blocks.
pub fn channel(block_size: usize, max_blocks: usize) -> (BlockProducer, BlockConsumer) {
    let block_size = block_size.max(1);
    let arena = SlabArena::new(max_blocks.max(1));
    // The first block is created eagerly so both ends start on it.
    let first = arena.alloc(|| Block::new(block_size)).map_or(0, |(idx, _)| idx);
    let shared = Arc::new(Shared {
        arena,
        block_size,
        published: AtomicU64::new(0),
        epoch: Epoch::default(),
    });
    (
        BlockProducer {
            shared: Arc::clone(&shared),
            block: first,
            pos: 0,
            written: 0,
        },
        BlockConsumer {
            shared,
            block: first,
            pos: 0,
            consumed: 0,
            deferred: None,
        },
    )
}

impl BlockProducer {
    /// Blocks created so far, including reused ones only once.
    pub fn blocks_created(&self) -> usize {
        self.shared.arena.created()
    }

    fn next_block(&mut self) -> Option<u32> {
        let size = self.shared.block_size;
        let (index, block) = self.shared.arena.alloc(|| Block::new(size))?;
        block.next.store(NIL, Ordering::Relaxed);
        let current = self.shared.arena.get(self.block)?;
        current.next.store(index, Ordering::Release);
        Some(index)
    }
}

impl AdviseProducer for BlockProducer {
    fn enqueue(&mut self, mut request: AdviseRequest) -> Result<(), Full> {
        request.epoch = self.shared.epoch.current();
        if self.pos == self.shared.block_size {
            self.block = self.next_block().ok_or(Full(request))?;
            self.pos = 0;
        }
        let block = self.shared.arena.get(self.block).ok_or(Full(request))?;
        let slot = &block.slots[self.pos];
        slot.node.store(request.node.0, Ordering::Relaxed);
        slot.meta.store(request.meta(), Ordering::Relaxed);
        self.pos += 1;
        self.written += 1;
        self.shared.published.store(self.written, Ordering::Release);
        Ok(())
    }

    fn increment_epoch(&mut self) -> u32 {
        self.shared.epoch.increment()
    }

    fn current_epoch(&self) -> u32 {
        self.shared.epoch.current()
    }
}

impl AdviseConsumer for BlockConsumer {
    fn dequeue(&mut self) -> Option<AdviseRequest> {
        if self.consumed == self.shared.published.load(Ordering::Acquire) {
            return None;
        }
        if self.pos == self.shared.block_size {
            let next = self.shared.arena.get(self.block)?.next.load(Ordering::Acquire);
            if next == NIL {
                return None;
            }
            if let Some(drained) = self.deferred.replace(self.block) {
                self.shared.arena.release(drained);
            }
            self.block = next;
            self.pos = 0;
        }
        let slot = &self.shared.arena.get(self.block)?.slots[self.pos];
        let request = AdviseRequest::from_parts(
            slot.node.load(Ordering::Relaxed),
            slot.meta.load(Ordering::Relaxed),
        );
        self.pos += 1;
        self.consumed += 1;
        Some(request)
    }

    fn current_epoch(&self) -> u32 {
        self.shared.epoch.current()
    }
}
