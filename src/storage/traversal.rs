//! Traversals composed from edge cursors.

use std::sync::Arc;

use crate::types::{NodeId, Result};

use super::graph::GraphSnapshot;
use super::iter::EdgeCursor;

/// Out-neighbours of `a` that are also out-neighbours of `b`.
///
/// Yields in `a`'s adjacency order; a target repeated in `a`'s list is
/// yielded once per occurrence.
#[derive(Debug)]
pub struct CommonNeighbors {
    outer: EdgeCursor,
    inner: EdgeCursor,
}

impl CommonNeighbors {
    /// Pairs the adjacencies of `a` and `b` from the same snapshot.
    pub fn new(snapshot: Arc<GraphSnapshot>, a: NodeId, b: NodeId) -> Result<Self> {
        Ok(Self {
            outer: snapshot.begin_out(a)?,
            inner: snapshot.begin_out(b)?,
        })
    }
}

impl Iterator for CommonNeighbors {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let inner = &self.inner;
        self.outer
            .by_ref()
            .find(|candidate| inner.clone().any(|n| n == *candidate))
    }
}
