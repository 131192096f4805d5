#![forbid(unsafe_code)]

//! Single-producer/single-consumer queues carrying advise requests.
//!
//! Every queue is split into a producer handle and a consumer handle. Both
//! handles take `&mut self` for their side of the protocol, so a handle can
//! only be driven by the thread that owns it; moving a handle to another
//! thread moves the role with it. All variants share an epoch counter that
//! the producer advances and either side can read.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::{Direction, LaminaError, NodeId, Result};

mod arena;
pub mod block;
pub mod lru;
pub mod ring;

/// Advisory request for one node's adjacency.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct AdviseRequest {
    /// Node whose adjacency will be read soon.
    pub node: NodeId,
    /// Producer epoch at the time of the request; queues stamp it on enqueue.
    pub epoch: u32,
    /// Direction of the traversal.
    pub direction: Direction,
}

impl AdviseRequest {
    /// Packs epoch and direction into one word.
    pub(crate) fn meta(&self) -> u64 {
        (u64::from(self.epoch) << 1) | self.direction.index() as u64
    }

    pub(crate) fn from_parts(node: u64, meta: u64) -> Self {
        let direction = if meta & 1 == 0 {
            Direction::Out
        } else {
            Direction::In
        };
        Self {
            node: NodeId(node),
            epoch: (meta >> 1) as u32,
            direction,
        }
    }
}

/// Enqueue rejected; the request is handed back.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("advise queue full (node {})", .0.node)]
pub struct Full(pub AdviseRequest);

impl From<Full> for LaminaError {
    fn from(_: Full) -> Self {
        LaminaError::QueueFull
    }
}

/// Epoch counter shared by both ends of a queue.
#[derive(Clone, Debug, Default)]
pub struct Epoch(Arc<AtomicU32>);

impl Epoch {
    /// Current epoch.
    #[inline]
    pub fn current(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }

    /// Advances the epoch, wrapping on overflow, and returns the new value.
    #[inline]
    pub fn increment(&self) -> u32 {
        self.0.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }
}

/// Producing end of an advise queue.
pub trait AdviseProducer: Send {
    /// Appends a request stamped with the current epoch; fails only if the
    /// queue cannot grow.
    fn enqueue(&mut self, request: AdviseRequest) -> std::result::Result<(), Full>;

    /// Advances the shared epoch and returns the new value.
    fn increment_epoch(&mut self) -> u32;

    /// Current shared epoch.
    fn current_epoch(&self) -> u32;
}

/// Consuming end of an advise queue.
pub trait AdviseConsumer: Send {
    /// Takes the next request, or `None` if nothing is queued.
    fn dequeue(&mut self) -> Option<AdviseRequest>;

    /// Current shared epoch.
    fn current_epoch(&self) -> u32;
}

/// Queue implementation backing an advise channel.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueKind {
    /// Unbounded FIFO of slab blocks.
    #[default]
    Block,
    /// Fixed-capacity ring that overwrites the oldest request.
    Ring,
    /// Deduplicating LRU keyed by node.
    Lru,
}

/// Queue selection and sizing.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Which implementation to use.
    pub kind: QueueKind,
    /// Requests per block (block queue).
    pub block_size: usize,
    /// Blocks the arena may allocate before enqueue fails; at least 3 (block queue).
    pub max_blocks: usize,
    /// Slots in the ring (ring queue).
    pub ring_capacity: usize,
    /// Live entries before the least recent is evicted (LRU queue).
    pub lru_capacity: usize,
    /// Entries older than this many epochs are dropped on dequeue (LRU queue).
    pub lru_max_age: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            kind: QueueKind::Block,
            block_size: 1024,
            max_blocks: 4096,
            ring_capacity: 4096,
            lru_capacity: 4096,
            lru_max_age: 64,
        }
    }
}

impl QueueConfig {
    /// Rejects sizes no queue can be built with.
    pub fn validate(&self) -> Result<()> {
        match self.kind {
            QueueKind::Block if self.block_size == 0 => {
                Err(LaminaError::Invalid("queue.block_size must be non-zero"))
            }
            // Producer block, consumer block and the deferred block must fit.
            QueueKind::Block if self.max_blocks < 3 || self.max_blocks >= arena::NIL as usize => {
                Err(LaminaError::Invalid("queue.max_blocks out of range"))
            }
            QueueKind::Ring if self.ring_capacity == 0 => {
                Err(LaminaError::Invalid("queue.ring_capacity must be non-zero"))
            }
            QueueKind::Lru if self.lru_capacity == 0 => {
                Err(LaminaError::Invalid("queue.lru_capacity must be non-zero"))
            }
            _ => Ok(()),
        }
    }
}

/// Boxed producer handle.
pub type DynProducer = Box<dyn AdviseProducer>;
/// Boxed consumer handle.
pub type DynConsumer = Box<dyn AdviseConsumer>;

/// Builds the queue described by `config` and splits it into its two ends.
pub fn advise_channel(config: &QueueConfig) -> Result<(DynProducer, DynConsumer)> {
    config.validate()?;
    let ends: (DynProducer, DynConsumer) = match config.kind {
        QueueKind::Block => {
            let (tx, rx) = block::channel(config.block_size, config.max_blocks);
            (Box::new(tx), Box::new(rx))
        }
        QueueKind::Ring => {
            let (tx, rx) = ring::channel(config.ring_capacity);
            (Box::new(tx), Box::new(rx))
        }
        QueueKind::Lru => {
            let (tx, rx) = lru::channel(config.lru_capacity, config.lru_max_age);
            (Box::new(tx), Box::new(rx))
        }
    };
    Ok(ends)
}
