//! Multi-level CSR: the ordered level stack of one direction.
//!
//! A node's logical adjacency is the concatenation of its per-level ranges,
//! oldest level first. The stack itself is immutable; appending a level
//! produces a new stack that shares every existing level.

use std::sync::Arc;

use tracing::debug;

use crate::types::{EdgeRef, LaminaError, NodeId, Result};

use super::level::{Level, LevelData};

/// Immutable level stack for one direction.
#[derive(Clone, Debug)]
pub struct MultiLevelCsr {
    levels: Arc<[Arc<Level>]>,
    max_nodes: u64,
    edge_count: u64,
}

impl Default for MultiLevelCsr {
    fn default() -> Self {
        Self {
            levels: Vec::new().into(),
            max_nodes: 0,
            edge_count: 0,
        }
    }
}

impl MultiLevelCsr {
    /// A stack with no levels.
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclusive upper bound of the node ids covered by any level.
    #[inline]
    pub fn max_nodes(&self) -> u64 {
        self.max_nodes
    }

    /// Total edges across all levels.
    pub fn edge_count(&self) -> u64 {
        self.edge_count
    }

    /// Number of sealed levels.
    #[inline]
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// All levels, oldest first.
    pub fn levels(&self) -> &[Arc<Level>] {
        &self.levels
    }

    /// Level at `index`.
    pub fn level(&self, index: usize) -> Result<&Arc<Level>> {
        self.levels.get(index).ok_or(LaminaError::LevelOutOfRange {
            level: index,
            levels: self.levels.len(),
        })
    }

    /// Fails with `NodeOutOfRange` unless `node < max_nodes`.
    pub fn check_node(&self, node: NodeId) -> Result<()> {
        if node.0 >= self.max_nodes {
            return Err(LaminaError::NodeOutOfRange {
                node,
                max_nodes: self.max_nodes,
            });
        }
        Ok(())
    }

    /// Logical degree: sum of the node's per-level degrees.
    pub fn degree(&self, node: NodeId) -> u64 {
        self.levels
            .iter()
            .map(|level| u64::from(level.degree(node)))
            .sum()
    }

    /// Degree of `node` at a single level.
    pub fn level_degree(&self, node: NodeId, level: usize) -> Result<u32> {
        Ok(self.level(level)?.degree(node))
    }

    /// First level at or after `from` where `node` has edges.
    #[inline]
    pub fn next_nonempty_level(&self, node: NodeId, from: usize) -> Option<usize> {
        self.levels
            .get(from..)?
            .iter()
            .position(|level| level.degree(node) > 0)
            .map(|offset| from + offset)
    }

    /// Resolves a global edge reference to its target.
    pub fn target(&self, edge: EdgeRef) -> Option<NodeId> {
        if edge.is_nil() || edge.is_overlay() || edge.0 >= self.edge_count {
            return None;
        }
        let idx = self
            .levels
            .partition_point(|level| level.edge_base() <= edge.0)
            .checked_sub(1)?;
        self.levels[idx].target(edge)
    }

    /// Byte span `(start_offset, length)` of `node`'s range in level `level`.
    pub fn byte_range(&self, level: usize, node: NodeId) -> Result<(u64, u64)> {
        self.check_node(node)?;
        Ok(self.level(level)?.byte_range(node))
    }

    /// Validates and seals `data`, returning a stack with the new level on top.
    pub fn with_level(&self, data: LevelData) -> Result<MultiLevelCsr> {
        let max_nodes = self.max_nodes.max(data.node_count() as u64);
        data.validate(max_nodes)?;
        let index = self.levels.len();
        let added = data.edge_count() as u64;
        let level = Arc::new(Level::seal(index, self.edge_count, data)?);
        let mut levels = Vec::with_capacity(index + 1);
        levels.extend(self.levels.iter().cloned());
        levels.push(level);
        debug!(level = index, edges = added, max_nodes, "csr.level_sealed");
        Ok(MultiLevelCsr {
            levels: levels.into(),
            max_nodes,
            edge_count: self.edge_count + added,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u64]) -> Vec<NodeId> {
        raw.iter().copied().map(NodeId).collect()
    }

    fn two_levels() -> MultiLevelCsr {
        let l0 = LevelData::from_adjacency(&[ids(&[1]), vec![], ids(&[0, 1])]).unwrap();
        let l1 = LevelData::from_adjacency(&[vec![], vec![], ids(&[3]), ids(&[2])]).unwrap();
        MultiLevelCsr::new().with_level(l0).unwrap().with_level(l1).unwrap()
    }

    #[test]
    fn max_nodes_grows_with_levels() {
        let csr = two_levels();
        assert_eq!(csr.num_levels(), 2);
        assert_eq!(csr.max_nodes(), 4);
        assert_eq!(csr.edge_count(), 5);
        assert!(csr.check_node(NodeId(3)).is_ok());
        assert!(matches!(
            csr.check_node(NodeId(4)),
            Err(LaminaError::NodeOutOfRange { max_nodes: 4, .. })
        ));
    }

    #[test]
    fn degree_sums_levels() {
        let csr = two_levels();
        assert_eq!(csr.degree(NodeId(2)), 3);
        assert_eq!(csr.level_degree(NodeId(2), 1).unwrap(), 1);
        assert_eq!(csr.degree(NodeId(1)), 0);
        assert!(csr.level_degree(NodeId(0), 2).is_err());
    }

    #[test]
    fn nonempty_level_scan_skips_empty_ranges() {
        let csr = two_levels();
        assert_eq!(csr.next_nonempty_level(NodeId(3), 0), Some(1));
        assert_eq!(csr.next_nonempty_level(NodeId(0), 1), None);
        assert_eq!(csr.next_nonempty_level(NodeId(1), 0), None);
        assert_eq!(csr.next_nonempty_level(NodeId(2), 5), None);
    }

    #[test]
    fn global_edges_resolve_across_levels() {
        let csr = two_levels();
        let targets: Vec<_> = (0..5).map(|e| csr.target(EdgeRef(e)).unwrap()).collect();
        assert_eq!(targets, ids(&[1, 0, 1, 3, 2]));
        assert_eq!(csr.target(EdgeRef(5)), None);
        assert_eq!(csr.target(EdgeRef::NIL), None);
    }

    #[test]
    fn sealing_leaves_old_stack_untouched() {
        let base = MultiLevelCsr::new()
            .with_level(LevelData::from_adjacency(&[ids(&[0])]).unwrap())
            .unwrap();
        let grown = base
            .with_level(LevelData::from_adjacency(&[ids(&[1]), vec![]]).unwrap())
            .unwrap();
        assert_eq!(base.num_levels(), 1);
        assert_eq!(base.degree(NodeId(0)), 1);
        assert_eq!(grown.degree(NodeId(0)), 2);
        assert!(Arc::ptr_eq(&base.levels()[0], &grown.levels()[0]));
    }

    #[test]
    fn malformed_level_is_rejected() {
        let bad = LevelData::new(vec![crate::storage::level::VertexEntry::new(0, 2)], ids(&[0]));
        assert!(MultiLevelCsr::new().with_level(bad).is_err());
    }
}
