//! Writable overlay for edges that have not been sealed yet.
//!
//! The overlay buffers new nodes and edges on top of a graph. Cursors opened
//! on it share the node's pending list and keep reading that version even if
//! more edges are appended afterwards. [`Graph::checkpoint`] seals the
//! buffered edges as the next level.
//!
//! [`Graph::checkpoint`]: super::graph::Graph::checkpoint

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::trace;

use crate::types::{Direction, EdgeRef, LaminaError, NodeId, Result};

use super::graph::Graph;
use super::iter::{EdgeCursor, PendingEdge};
use super::level::{degree_of, LevelData, VertexEntry};

type PendingLists = BTreeMap<u64, Arc<Vec<PendingEdge>>>;

/// Buffered edge appends over a sealed graph.
#[derive(Debug, Default)]
pub struct WritableOverlay {
    base_nodes: u64,
    node_count: u64,
    next_edge: u64,
    out: PendingLists,
    inc: PendingLists,
}

impl WritableOverlay {
    /// Starts an empty overlay over the graph's current node range.
    pub fn new(graph: &Graph) -> Self {
        Self::with_base(graph.max_nodes())
    }

    /// Starts an empty overlay over a graph with `base_nodes` nodes.
    pub fn with_base(base_nodes: u64) -> Self {
        Self {
            base_nodes,
            node_count: base_nodes,
            ..Self::default()
        }
    }

    /// Node bound of the graph the overlay was opened over.
    pub fn base_nodes(&self) -> u64 {
        self.base_nodes
    }

    /// Exclusive upper bound of node ids visible through the overlay.
    pub fn max_nodes(&self) -> u64 {
        self.node_count
    }

    /// Number of pending edges.
    pub fn edge_count(&self) -> u64 {
        self.next_edge
    }

    /// Returns true if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.next_edge == 0 && !self.adds_nodes()
    }

    pub(crate) fn adds_nodes(&self) -> bool {
        self.node_count > self.base_nodes
    }

    /// Allocates the next node id.
    pub fn add_node(&mut self) -> NodeId {
        let node = NodeId(self.node_count);
        self.node_count += 1;
        node
    }

    /// Buffers the edge `src -> dst`.
    ///
    /// Both directions receive the same overlay edge reference.
    pub fn add_edge(&mut self, src: NodeId, dst: NodeId) -> Result<EdgeRef> {
        for node in [src, dst] {
            if node.0 >= self.node_count {
                return Err(LaminaError::NodeOutOfRange {
                    node,
                    max_nodes: self.node_count,
                });
            }
        }
        let edge = EdgeRef(EdgeRef::OVERLAY_FLAG | self.next_edge);
        self.next_edge += 1;
        push(&mut self.out, src, PendingEdge { target: dst, edge });
        push(&mut self.inc, dst, PendingEdge { target: src, edge });
        trace!(src = src.0, dst = dst.0, edge = %edge, "overlay.edge_added");
        Ok(edge)
    }

    /// Pending edges of `node` in `direction`.
    pub fn pending_degree(&self, direction: Direction, node: NodeId) -> u64 {
        self.lists(direction)
            .get(&node.0)
            .map_or(0, |list| list.len() as u64)
    }

    /// Cursor over `node`'s pending edges in `direction`.
    pub fn begin(&self, direction: Direction, node: NodeId) -> Result<EdgeCursor> {
        if node.0 >= self.node_count {
            return Err(LaminaError::NodeOutOfRange {
                node,
                max_nodes: self.node_count,
            });
        }
        let edges = self
            .lists(direction)
            .get(&node.0)
            .cloned()
            .unwrap_or_default();
        Ok(EdgeCursor::pending(node, edges))
    }

    /// Cursor over `node`'s pending outgoing edges.
    pub fn begin_out(&self, node: NodeId) -> Result<EdgeCursor> {
        self.begin(Direction::Out, node)
    }

    /// Cursor over `node`'s pending incoming edges.
    pub fn begin_in(&self, node: NodeId) -> Result<EdgeCursor> {
        self.begin(Direction::In, node)
    }

    /// Packs the buffered edges into one level per direction.
    pub(crate) fn level_data(&self) -> Result<(LevelData, LevelData)> {
        Ok((
            pack(&self.out, self.node_count)?,
            pack(&self.inc, self.node_count)?,
        ))
    }

    /// Drops all buffered state; the overlay now sits over `base_nodes` nodes.
    pub(crate) fn reset(&mut self, base_nodes: u64) {
        *self = Self::with_base(base_nodes);
    }

    fn lists(&self, direction: Direction) -> &PendingLists {
        match direction {
            Direction::Out => &self.out,
            Direction::In => &self.inc,
        }
    }
}

fn push(lists: &mut PendingLists, owner: NodeId, edge: PendingEdge) {
    // Cursors holding the old Arc keep their version.
    Arc::make_mut(lists.entry(owner.0).or_default()).push(edge);
}

fn pack(lists: &PendingLists, node_count: u64) -> Result<LevelData> {
    let mut vertices = vec![VertexEntry::empty(); node_count as usize];
    let mut targets = Vec::with_capacity(lists.values().map(|l| l.len()).sum());
    for (&node, list) in lists {
        if list.is_empty() {
            continue;
        }
        vertices[node as usize] = VertexEntry::new(targets.len() as u64, degree_of(list.len())?);
        targets.extend(list.iter().map(|p| p.target));
    }
    Ok(LevelData::new(vertices, targets))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_edge_checks_both_endpoints() {
        let mut overlay = WritableOverlay::with_base(2);
        assert!(overlay.add_edge(NodeId(0), NodeId(1)).is_ok());
        assert!(matches!(
            overlay.add_edge(NodeId(0), NodeId(2)),
            Err(LaminaError::NodeOutOfRange { max_nodes: 2, .. })
        ));
        let fresh = overlay.add_node();
        assert_eq!(fresh, NodeId(2));
        assert!(overlay.add_edge(NodeId(0), fresh).is_ok());
    }

    #[test]
    fn pending_cursor_keeps_its_version() {
        let mut overlay = WritableOverlay::with_base(3);
        overlay.add_edge(NodeId(0), NodeId(1)).unwrap();
        let mut cursor = overlay.begin_out(NodeId(0)).unwrap();
        overlay.add_edge(NodeId(0), NodeId(2)).unwrap();
        assert!(cursor.is_writable());
        assert_eq!(cursor.next(), Some(NodeId(1)));
        assert_eq!(cursor.next(), None);
        let all: Vec<_> = overlay.begin_out(NodeId(0)).unwrap().collect();
        assert_eq!(all, vec![NodeId(1), NodeId(2)]);
    }

    #[test]
    fn edges_share_refs_across_directions() {
        let mut overlay = WritableOverlay::with_base(2);
        let edge = overlay.add_edge(NodeId(1), NodeId(0)).unwrap();
        assert!(edge.is_overlay());
        let mut inc = overlay.begin_in(NodeId(0)).unwrap();
        assert_eq!(inc.next_edge(), Some(edge));
        assert_eq!(inc.last_node(), Some(NodeId(1)));
        assert_eq!(overlay.pending_degree(Direction::Out, NodeId(1)), 1);
        assert_eq!(overlay.pending_degree(Direction::Out, NodeId(0)), 0);
    }

    #[test]
    fn level_data_packs_node_order() {
        let mut overlay = WritableOverlay::with_base(3);
        overlay.add_edge(NodeId(2), NodeId(0)).unwrap();
        overlay.add_edge(NodeId(0), NodeId(1)).unwrap();
        overlay.add_edge(NodeId(2), NodeId(1)).unwrap();
        let (out, inc) = overlay.level_data().unwrap();
        assert_eq!(out.targets, vec![NodeId(1), NodeId(0), NodeId(1)]);
        assert_eq!(out.vertices[2], VertexEntry::new(1, 2));
        assert!(out.vertices[1].is_empty());
        assert_eq!(inc.targets, vec![NodeId(2), NodeId(0), NodeId(2)]);
        out.validate(3).unwrap();
        inc.validate(3).unwrap();
    }
}
