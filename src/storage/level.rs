//! Level tables: one immutable vertex-table + edge-table pair.
//!
//! A level is the unit of versioning. Ingestion hands over a [`LevelData`]
//! whose vertex entries index into its own target array; sealing validates it,
//! rebases the entries onto the direction's global edge numbering and copies
//! the targets into a read-only [`EdgeRegion`].

use std::io;
use std::ops::Range;

use crate::primitives::io::{EdgeRegion, EDGE_SLOT_LEN};
use crate::types::{Direction, EdgeRef, LaminaError, NodeId, Result};

/// Per-node, per-level adjacency descriptor.
///
/// The half-open range `[adjacency_start, adjacency_start + degree)` holds the
/// node's targets at this level. Entries with a zero degree carry no range.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct VertexEntry {
    /// First edge of the node's range.
    pub adjacency_start: EdgeRef,
    /// Number of edges in the range.
    pub degree: u32,
}

impl VertexEntry {
    /// Entry with a non-empty range starting at `start`.
    pub const fn new(start: u64, degree: u32) -> Self {
        Self {
            adjacency_start: EdgeRef(start),
            degree,
        }
    }

    /// Entry for a node without edges at this level.
    pub const fn empty() -> Self {
        Self {
            adjacency_start: EdgeRef::NIL,
            degree: 0,
        }
    }

    /// Returns true if the node has no edges at this level.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.degree == 0
    }
}

/// Unsealed level contents as produced by ingestion.
///
/// `vertices[n].adjacency_start` is an offset into `targets`. Nodes past
/// `vertices.len()` have no edges at this level.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LevelData {
    /// One entry per node id covered by the level.
    pub vertices: Vec<VertexEntry>,
    /// Packed targets of all nodes, in node order.
    pub targets: Vec<NodeId>,
}

impl LevelData {
    /// Wraps prepared CSR arrays.
    pub fn new(vertices: Vec<VertexEntry>, targets: Vec<NodeId>) -> Self {
        Self { vertices, targets }
    }

    /// A level that covers `node_count` nodes and adds no edges.
    pub fn empty(node_count: usize) -> Self {
        Self {
            vertices: vec![VertexEntry::empty(); node_count],
            targets: Vec::new(),
        }
    }

    /// Packs per-node adjacency lists; `lists[n]` holds node `n`'s targets.
    ///
    /// Fails if a list is longer than a [`VertexEntry`] degree can express.
    pub fn from_adjacency<L: AsRef<[NodeId]>>(lists: &[L]) -> Result<Self> {
        let total = lists.iter().map(|l| l.as_ref().len()).sum();
        let mut vertices = Vec::with_capacity(lists.len());
        let mut targets = Vec::with_capacity(total);
        for list in lists {
            let list = list.as_ref();
            if list.is_empty() {
                vertices.push(VertexEntry::empty());
                continue;
            }
            vertices.push(VertexEntry::new(targets.len() as u64, degree_of(list.len())?));
            targets.extend_from_slice(list);
        }
        Ok(Self { vertices, targets })
    }

    /// Groups `(source, target)` pairs by the node that owns them in `direction`.
    ///
    /// Edge order within a node follows the input order.
    pub fn from_edges(
        node_count: usize,
        edges: &[(NodeId, NodeId)],
        direction: Direction,
    ) -> Result<Self> {
        let mut lists: Vec<Vec<NodeId>> = vec![Vec::new(); node_count];
        for &(src, dst) in edges {
            let (owner, target) = match direction {
                Direction::Out => (src, dst),
                Direction::In => (dst, src),
            };
            let idx = owner.0 as usize;
            if idx >= lists.len() {
                lists.resize_with(idx + 1, Vec::new);
            }
            lists[idx].push(target);
        }
        Self::from_adjacency(&lists)
    }

    /// Number of node ids the level describes.
    pub fn node_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of edges the level adds.
    pub fn edge_count(&self) -> usize {
        self.targets.len()
    }

    /// Checks the CSR layout against the node bound the store will have after sealing.
    ///
    /// Non-empty ranges must be in node order and must not overlap.
    pub(crate) fn validate(&self, max_nodes: u64) -> Result<()> {
        let mut last_end = 0u64;
        for entry in &self.vertices {
            if entry.is_empty() {
                continue;
            }
            let start = entry.adjacency_start;
            if start.is_nil() {
                return Err(LaminaError::Corruption("non-empty vertex entry without a range"));
            }
            if start.0 < last_end {
                return Err(LaminaError::Corruption("adjacency ranges overlap or are out of order"));
            }
            let end = start
                .0
                .checked_add(u64::from(entry.degree))
                .ok_or(LaminaError::Corruption("adjacency range overflows"))?;
            if end > self.targets.len() as u64 {
                return Err(LaminaError::Corruption("adjacency range past edge table"));
            }
            last_end = end;
        }
        if self.targets.iter().any(|t| t.0 >= max_nodes) {
            return Err(LaminaError::Corruption("edge target past max_nodes"));
        }
        Ok(())
    }
}

/// Degree of a list of `len` edges, if it fits a [`VertexEntry`].
pub(crate) fn degree_of(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| LaminaError::Invalid("adjacency list longer than u32::MAX edges"))
}

/// A sealed level of one direction.
#[derive(Debug)]
pub struct Level {
    index: usize,
    edge_base: u64,
    vertices: Box<[VertexEntry]>,
    edges: EdgeRegion,
}

impl Level {
    /// Seals validated data as level `index`, numbering its edges from `edge_base`.
    pub(crate) fn seal(index: usize, edge_base: u64, data: LevelData) -> Result<Self> {
        let edges = EdgeRegion::from_targets(&data.targets)?;
        let vertices = data
            .vertices
            .into_iter()
            .map(|entry| {
                if entry.is_empty() {
                    VertexEntry::empty()
                } else {
                    VertexEntry::new(edge_base + entry.adjacency_start.0, entry.degree)
                }
            })
            .collect();
        Ok(Self {
            index,
            edge_base,
            vertices,
            edges,
        })
    }

    /// Position of the level, oldest first.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Global reference of the level's first edge slot.
    pub fn edge_base(&self) -> u64 {
        self.edge_base
    }

    /// Number of node ids the level's vertex table covers.
    pub fn node_count(&self) -> u64 {
        self.vertices.len() as u64
    }

    /// Number of edges stored in the level.
    pub fn edge_count(&self) -> u64 {
        self.edges.len() as u64
    }

    /// Backing region of the edge table.
    pub fn region(&self) -> &EdgeRegion {
        &self.edges
    }

    /// Vertex entry for `node`; nodes the level does not cover get an empty entry.
    #[inline]
    pub fn entry(&self, node: NodeId) -> VertexEntry {
        usize::try_from(node.0)
            .ok()
            .and_then(|idx| self.vertices.get(idx))
            .copied()
            .unwrap_or_else(VertexEntry::empty)
    }

    /// Degree of `node` at this level.
    #[inline]
    pub fn degree(&self, node: NodeId) -> u32 {
        self.entry(node).degree
    }

    /// Global edge range of `node` at this level.
    pub fn edge_range(&self, node: NodeId) -> Range<u64> {
        let entry = self.entry(node);
        if entry.is_empty() {
            return self.edge_base..self.edge_base;
        }
        let start = entry.adjacency_start.0;
        start..start + u64::from(entry.degree)
    }

    /// Returns true if `edge` is one of this level's slots.
    #[inline]
    pub fn contains_edge(&self, edge: EdgeRef) -> bool {
        !edge.is_nil() && edge.0 >= self.edge_base && edge.0 - self.edge_base < self.edge_count()
    }

    /// Target stored at global edge `edge`.
    #[inline]
    pub fn target(&self, edge: EdgeRef) -> Option<NodeId> {
        if !self.contains_edge(edge) {
            return None;
        }
        self.edges.get((edge.0 - self.edge_base) as usize)
    }

    /// Byte span `(start_offset, length)` of `node`'s range in this level's edge table.
    pub fn byte_range(&self, node: NodeId) -> (u64, u64) {
        let range = self.edge_range(node);
        let start = (range.start - self.edge_base) * EDGE_SLOT_LEN as u64;
        let len = (range.end - range.start) * EDGE_SLOT_LEN as u64;
        (start, len)
    }

    /// Issues a residency hint over global edge range `edges`.
    pub fn advise(&self, edges: Range<u64>) -> io::Result<()> {
        let start = edges.start.saturating_sub(self.edge_base) as usize;
        let end = edges.end.saturating_sub(self.edge_base) as usize;
        self.edges.advise_will_need(start..end)
    }

    /// Checks that `node`'s range lies inside the edge table.
    pub(crate) fn check_entry(&self, node: NodeId) -> Result<()> {
        let range = self.edge_range(node);
        if range.end > self.edge_base + self.edge_count() || range.start < self.edge_base {
            return Err(LaminaError::Corruption("vertex entry points outside its level"));
        }
        Ok(())
    }
}

/// Identifies a sealed level.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LevelHandle {
    /// Position of the level, oldest first.
    pub index: usize,
    /// Node id bound after the level was sealed.
    pub max_nodes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u64]) -> Vec<NodeId> {
        raw.iter().copied().map(NodeId).collect()
    }

    #[test]
    fn from_adjacency_packs_in_node_order() {
        let data = LevelData::from_adjacency(&[ids(&[1, 2]), vec![], ids(&[0])]).unwrap();
        assert_eq!(data.node_count(), 3);
        assert_eq!(data.targets, ids(&[1, 2, 0]));
        assert_eq!(data.vertices[0], VertexEntry::new(0, 2));
        assert!(data.vertices[1].is_empty());
        assert_eq!(data.vertices[2], VertexEntry::new(2, 1));
        data.validate(3).unwrap();
    }

    #[test]
    fn from_edges_groups_by_direction() {
        let edges = [(NodeId(0), NodeId(2)), (NodeId(1), NodeId(2)), (NodeId(0), NodeId(1))];
        let out = LevelData::from_edges(3, &edges, Direction::Out).unwrap();
        assert_eq!(out.targets, ids(&[2, 1, 2]));
        let inc = LevelData::from_edges(3, &edges, Direction::In).unwrap();
        assert_eq!(inc.targets, ids(&[0, 0, 1]));
        assert!(inc.vertices[0].is_empty());
        assert_eq!(inc.vertices[2], VertexEntry::new(1, 2));
    }

    #[test]
    fn validate_rejects_malformed_layouts() {
        let past_end = LevelData::new(vec![VertexEntry::new(0, 3)], ids(&[0, 0]));
        assert!(matches!(past_end.validate(1), Err(LaminaError::Corruption(_))));

        let unordered = LevelData::new(
            vec![VertexEntry::new(1, 1), VertexEntry::new(0, 1)],
            ids(&[0, 1]),
        );
        assert!(matches!(unordered.validate(2), Err(LaminaError::Corruption(_))));

        let bad_target = LevelData::new(vec![VertexEntry::new(0, 1)], ids(&[5]));
        assert!(matches!(bad_target.validate(2), Err(LaminaError::Corruption(_))));

        let nil_start = LevelData::new(
            vec![VertexEntry {
                adjacency_start: EdgeRef::NIL,
                degree: 1,
            }],
            ids(&[0]),
        );
        assert!(nil_start.validate(1).is_err());
    }

    #[test]
    fn validate_rejects_overlapping_ranges() {
        // Node 1's range starts inside node 0's.
        let overlapping = LevelData::new(
            vec![VertexEntry::new(0, 2), VertexEntry::new(1, 1)],
            ids(&[0, 1, 2]),
        );
        assert!(matches!(overlapping.validate(3), Err(LaminaError::Corruption(_))));

        let adjacent = LevelData::new(
            vec![VertexEntry::new(0, 2), VertexEntry::empty(), VertexEntry::new(2, 1)],
            ids(&[0, 1, 2]),
        );
        adjacent.validate(3).unwrap();
    }

    #[test]
    fn degree_must_fit_u32() {
        assert_eq!(degree_of(7).unwrap(), 7);
        assert_eq!(degree_of(u32::MAX as usize).unwrap(), u32::MAX);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn oversized_degree_is_invalid() {
        assert!(matches!(
            degree_of(u32::MAX as usize + 1),
            Err(LaminaError::Invalid(_))
        ));
    }

    #[test]
    fn sealed_level_uses_global_edges() {
        let data = LevelData::from_adjacency(&[ids(&[4]), ids(&[3, 2])]).unwrap();
        let level = Level::seal(1, 10, data).unwrap();
        assert_eq!(level.edge_range(NodeId(1)), 11..13);
        assert_eq!(level.target(EdgeRef(12)), Some(NodeId(2)));
        assert_eq!(level.target(EdgeRef(9)), None);
        assert_eq!(level.target(EdgeRef(13)), None);
        assert_eq!(level.byte_range(NodeId(1)), (8, 16));
        assert_eq!(level.degree(NodeId(7)), 0);
        assert_eq!(level.edge_range(NodeId(7)), 10..10);
        level.check_entry(NodeId(1)).unwrap();
        level.advise(11..13).unwrap();
    }
}
