//! Edge iteration protocol.
//!
//! An [`EdgeCursor`] walks one node's adjacency. Cursors over sealed levels
//! hold their own copy of the level stack they were opened against, so levels
//! sealed afterwards are never observed. The state machine has two states:
//! positioned inside one level's range, or exhausted. Consuming the last edge
//! of a range moves the cursor to the next non-empty level of the node, or to
//! exhausted when none is left.

use std::sync::Arc;

use crate::types::{EdgeRef, LaminaError, NodeId, Result};

use super::csr::MultiLevelCsr;

/// Edge appended to a writable overlay and not yet sealed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PendingEdge {
    /// Target node.
    pub target: NodeId,
    /// Overlay edge reference.
    pub edge: EdgeRef,
}

/// Position metadata of a cursor inside its current level.
///
/// `prev` is the edge just before the cursor position in the node's range at
/// this level, `next` the edge the cursor will return next. Either is
/// [`EdgeRef::NIL`] at the range boundary.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LevelSpan {
    /// Level the cursor is positioned in.
    pub level: usize,
    /// Edge preceding the cursor position within the level.
    pub prev: EdgeRef,
    /// Edge following the cursor position within the level.
    pub next: EdgeRef,
    /// Exclusive end of the node's range at this level.
    pub end: EdgeRef,
}

impl LevelSpan {
    /// Global edges left in the current level.
    pub fn remaining(&self) -> std::ops::Range<u64> {
        if self.next.is_nil() {
            return self.end.0..self.end.0;
        }
        self.next.0..self.end.0
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum CursorState {
    Positioned {
        level: usize,
        start: u64,
        next: u64,
        end: u64,
    },
    Exhausted,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Scope {
    AllLevels,
    SingleLevel,
}

/// Cursor over sealed levels.
#[derive(Clone, Debug)]
struct CsrCursor {
    csr: MultiLevelCsr,
    state: CursorState,
    scope: Scope,
}

/// Cursor over an overlay's pending edges for one node.
#[derive(Clone, Debug)]
struct OverlayCursor {
    edges: Arc<Vec<PendingEdge>>,
    pos: usize,
}

#[derive(Clone, Debug)]
enum CursorOwner {
    ReadOnly(CsrCursor),
    Writable(OverlayCursor),
}

/// Iteration state for one node's adjacency.
#[derive(Clone, Debug)]
pub struct EdgeCursor {
    node: NodeId,
    owner: CursorOwner,
    last_node: Option<NodeId>,
    last_edge: EdgeRef,
}

impl EdgeCursor {
    /// Opens a cursor before the first edge of `node`, at the oldest level holding any.
    pub(crate) fn begin(csr: &MultiLevelCsr, node: NodeId) -> Result<Self> {
        csr.check_node(node)?;
        let state = match csr.next_nonempty_level(node, 0) {
            Some(level) => position_at(csr, node, level)?,
            None => CursorState::Exhausted,
        };
        Ok(Self::read_only(csr, node, state, Scope::AllLevels))
    }

    /// Opens a cursor restricted to `node`'s range at `level`.
    pub(crate) fn begin_within_level(csr: &MultiLevelCsr, node: NodeId, level: usize) -> Result<Self> {
        csr.check_node(node)?;
        let sealed = csr.level(level)?;
        let state = if sealed.degree(node) > 0 {
            position_at(csr, node, level)?
        } else {
            CursorState::Exhausted
        };
        Ok(Self::read_only(csr, node, state, Scope::SingleLevel))
    }

    /// Opens a cursor over pending overlay edges.
    pub(crate) fn pending(node: NodeId, edges: Arc<Vec<PendingEdge>>) -> Self {
        Self {
            node,
            owner: CursorOwner::Writable(OverlayCursor { edges, pos: 0 }),
            last_node: None,
            last_edge: EdgeRef::NIL,
        }
    }

    fn read_only(csr: &MultiLevelCsr, node: NodeId, state: CursorState, scope: Scope) -> Self {
        Self {
            node,
            owner: CursorOwner::ReadOnly(CsrCursor {
                csr: csr.clone(),
                state,
                scope,
            }),
            last_node: None,
            last_edge: EdgeRef::NIL,
        }
    }

    /// Node whose adjacency the cursor walks.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Target of the edge most recently returned.
    pub fn last_node(&self) -> Option<NodeId> {
        self.last_node
    }

    /// Edge most recently returned, or [`EdgeRef::NIL`] before the first.
    pub fn last_edge(&self) -> EdgeRef {
        self.last_edge
    }

    /// Returns true if the cursor owns pending overlay edges.
    pub fn is_writable(&self) -> bool {
        matches!(self.owner, CursorOwner::Writable(_))
    }

    /// Returns true once every edge has been returned.
    pub fn is_exhausted(&self) -> bool {
        match &self.owner {
            CursorOwner::ReadOnly(cursor) => cursor.state == CursorState::Exhausted,
            CursorOwner::Writable(cursor) => cursor.pos >= cursor.edges.len(),
        }
    }

    /// Returns true if another edge is available.
    pub fn has_next(&self) -> bool {
        !self.is_exhausted()
    }

    /// Level the cursor is positioned in; `None` when exhausted or over an overlay.
    pub fn level(&self) -> Option<usize> {
        match &self.owner {
            CursorOwner::ReadOnly(CsrCursor {
                state: CursorState::Positioned { level, .. },
                ..
            }) => Some(*level),
            _ => None,
        }
    }

    /// Edges immediately before and after the cursor position in its current level.
    pub fn level_span(&self) -> Option<LevelSpan> {
        let CursorOwner::ReadOnly(CsrCursor {
            state: CursorState::Positioned {
                level,
                start,
                next,
                end,
            },
            ..
        }) = &self.owner
        else {
            return None;
        };
        let prev = if *next > *start {
            EdgeRef(*next - 1)
        } else {
            EdgeRef::NIL
        };
        Some(LevelSpan {
            level: *level,
            prev,
            next: EdgeRef(*next),
            end: EdgeRef(*end),
        })
    }

    /// Number of edges the cursor will still return.
    pub fn remaining(&self) -> u64 {
        match &self.owner {
            CursorOwner::Writable(cursor) => cursor.edges.len().saturating_sub(cursor.pos) as u64,
            CursorOwner::ReadOnly(cursor) => match cursor.state {
                CursorState::Exhausted => 0,
                CursorState::Positioned { level, next, end, .. } => {
                    let here = end - next;
                    if cursor.scope == Scope::SingleLevel {
                        return here;
                    }
                    let later: u64 = cursor.csr.levels()[level + 1..]
                        .iter()
                        .map(|l| u64::from(l.degree(self.node)))
                        .sum();
                    here + later
                }
            },
        }
    }

    /// Advances to the next edge and returns its reference.
    ///
    /// Returns `None` once exhausted, and keeps returning `None` afterwards.
    pub fn next_edge(&mut self) -> Option<EdgeRef> {
        let node = self.node;
        let (edge, target) = match &mut self.owner {
            CursorOwner::ReadOnly(cursor) => cursor.advance(node)?,
            CursorOwner::Writable(cursor) => {
                let pending = *cursor.edges.get(cursor.pos)?;
                cursor.pos += 1;
                (pending.edge, pending.target)
            }
        };
        self.last_edge = edge;
        self.last_node = Some(target);
        Some(edge)
    }
}

impl CsrCursor {
    fn advance(&mut self, node: NodeId) -> Option<(EdgeRef, NodeId)> {
        let CursorState::Positioned {
            level,
            start,
            next,
            end,
        } = self.state
        else {
            return None;
        };
        let edge = EdgeRef(next);
        let Some(target) = self.csr.levels()[level].target(edge) else {
            self.state = CursorState::Exhausted;
            return None;
        };
        self.state = if next + 1 < end {
            CursorState::Positioned {
                level,
                start,
                next: next + 1,
                end,
            }
        } else if self.scope == Scope::SingleLevel {
            CursorState::Exhausted
        } else {
            match self.csr.next_nonempty_level(node, level + 1) {
                // Entries were range-checked when their level was sealed.
                Some(following) => position_at(&self.csr, node, following)
                    .unwrap_or(CursorState::Exhausted),
                None => CursorState::Exhausted,
            }
        };
        Some((edge, target))
    }
}

fn position_at(csr: &MultiLevelCsr, node: NodeId, level: usize) -> Result<CursorState> {
    let sealed = csr.level(level)?;
    sealed.check_entry(node)?;
    let range = sealed.edge_range(node);
    if range.is_empty() {
        return Err(LaminaError::Corruption("positioned on an empty range"));
    }
    Ok(CursorState::Positioned {
        level,
        start: range.start,
        next: range.start,
        end: range.end,
    })
}

impl Iterator for EdgeCursor {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_edge()?;
        self.last_node
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.remaining()).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}
