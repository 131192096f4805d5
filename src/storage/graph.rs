//! Both adjacency directions of a store, published as immutable snapshots.
//!
//! Sealing a level builds new level stacks off to the side and then swaps the
//! published snapshot pointer. Readers clone the pointer when they open a
//! cursor, so a cursor keeps the level set it began with no matter how many
//! levels are sealed while it is being drained.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};
use tracing::info;

use crate::types::{Direction, EdgeRef, LaminaError, NodeId, Result};

use super::csr::MultiLevelCsr;
use super::iter::EdgeCursor;
use super::level::{LevelData, LevelHandle, VertexEntry};
use super::overlay::WritableOverlay;

/// Immutable view of every level sealed at one point in time.
#[derive(Clone, Debug, Default)]
pub struct GraphSnapshot {
    out: MultiLevelCsr,
    inc: MultiLevelCsr,
}

impl GraphSnapshot {
    /// Level stack of `direction`.
    #[inline]
    pub fn csr(&self, direction: Direction) -> &MultiLevelCsr {
        match direction {
            Direction::Out => &self.out,
            Direction::In => &self.inc,
        }
    }

    /// Exclusive upper bound of node ids.
    pub fn max_nodes(&self) -> u64 {
        self.out.max_nodes().max(self.inc.max_nodes())
    }

    /// Number of sealed levels.
    pub fn num_levels(&self) -> usize {
        self.out.num_levels()
    }

    /// Every node id, in id order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> {
        (0..self.max_nodes()).map(NodeId)
    }

    /// Cursor over `node`'s edges in `direction`.
    pub fn begin(&self, direction: Direction, node: NodeId) -> Result<EdgeCursor> {
        EdgeCursor::begin(self.csr(direction), node)
    }

    /// Cursor over `node`'s outgoing edges.
    pub fn begin_out(&self, node: NodeId) -> Result<EdgeCursor> {
        self.begin(Direction::Out, node)
    }

    /// Cursor over `node`'s incoming edges.
    pub fn begin_in(&self, node: NodeId) -> Result<EdgeCursor> {
        self.begin(Direction::In, node)
    }

    /// Cursor over `node`'s edges at a single level.
    pub fn begin_within_level(
        &self,
        direction: Direction,
        node: NodeId,
        level: usize,
    ) -> Result<EdgeCursor> {
        EdgeCursor::begin_within_level(self.csr(direction), node, level)
    }

    /// Logical degree of `node` in `direction`.
    pub fn degree(&self, direction: Direction, node: NodeId) -> Result<u64> {
        let csr = self.csr(direction);
        csr.check_node(node)?;
        Ok(csr.degree(node))
    }

    /// Outgoing degree of `node`.
    pub fn out_degree(&self, node: NodeId) -> Result<u64> {
        self.degree(Direction::Out, node)
    }

    /// Incoming degree of `node`.
    pub fn in_degree(&self, node: NodeId) -> Result<u64> {
        self.degree(Direction::In, node)
    }

    /// Target of a global edge reference in `direction`.
    pub fn edge_target(&self, direction: Direction, edge: EdgeRef) -> Option<NodeId> {
        self.csr(direction).target(edge)
    }

    /// Byte span `(start_offset, length)` of `node`'s range in one level's edge table.
    pub fn byte_range(&self, direction: Direction, level: usize, node: NodeId) -> Result<(u64, u64)> {
        self.csr(direction).byte_range(level, node)
    }
}

/// Multi-level CSR graph store.
///
/// Reads never block on sealing beyond the pointer swap; sealing is
/// serialized among appenders.
#[derive(Debug, Default)]
pub struct Graph {
    current: RwLock<Arc<GraphSnapshot>>,
    seal_lock: Mutex<()>,
    // Mirrors `current.max_nodes()` so the advise path stays lock-free.
    max_nodes: AtomicU64,
}

impl Graph {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently published snapshot.
    pub fn snapshot(&self) -> Arc<GraphSnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Exclusive upper bound of node ids.
    pub fn max_nodes(&self) -> u64 {
        self.max_nodes.load(Ordering::Acquire)
    }

    /// Number of sealed levels.
    pub fn num_levels(&self) -> usize {
        self.current.read().num_levels()
    }

    /// Cursor over `node`'s outgoing edges in the current snapshot.
    pub fn begin_out(&self, node: NodeId) -> Result<EdgeCursor> {
        self.snapshot().begin_out(node)
    }

    /// Cursor over `node`'s incoming edges in the current snapshot.
    pub fn begin_in(&self, node: NodeId) -> Result<EdgeCursor> {
        self.snapshot().begin_in(node)
    }

    /// Advances `cursor`, returning the next target or `None` once exhausted.
    pub fn next(&self, cursor: &mut EdgeCursor) -> Option<NodeId> {
        cursor.next()
    }

    /// Seals one level in each direction and publishes the result.
    ///
    /// The two vertex tables are padded to the same node count so both
    /// directions agree on `max_nodes`.
    pub fn seal_level(&self, out: LevelData, inc: LevelData) -> Result<LevelHandle> {
        let guard = self.seal_lock.lock();
        self.publish(&guard, out, inc)
    }

    /// Seals the overlay's pending edges as a new level and clears the overlay.
    pub fn checkpoint(&self, overlay: &mut WritableOverlay) -> Result<LevelHandle> {
        let guard = self.seal_lock.lock();
        let base = self.max_nodes();
        if overlay.adds_nodes() && overlay.base_nodes() != base {
            return Err(LaminaError::Invalid("overlay node ids collide with a newer level"));
        }
        let (out, inc) = overlay.level_data()?;
        let handle = self.publish(&guard, out, inc)?;
        overlay.reset(handle.max_nodes);
        Ok(handle)
    }

    fn publish(
        &self,
        _guard: &MutexGuard<'_, ()>,
        mut out: LevelData,
        mut inc: LevelData,
    ) -> Result<LevelHandle> {
        let nodes = out.node_count().max(inc.node_count());
        out.vertices.resize(nodes, VertexEntry::empty());
        inc.vertices.resize(nodes, VertexEntry::empty());
        let edges = out.edge_count();
        let base = self.snapshot();
        let next = GraphSnapshot {
            out: base.out.with_level(out)?,
            inc: base.inc.with_level(inc)?,
        };
        let handle = LevelHandle {
            index: next.num_levels() - 1,
            max_nodes: next.max_nodes(),
        };
        *self.current.write() = Arc::new(next);
        self.max_nodes.store(handle.max_nodes, Ordering::Release);
        info!(
            level = handle.index,
            max_nodes = handle.max_nodes,
            edges,
            "graph.level_sealed"
        );
        Ok(handle)
    }
}
