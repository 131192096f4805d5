//! Multi-level CSR graph store.
//!
//! Sealed levels are immutable; a node's adjacency is the concatenation of its
//! ranges across levels, oldest first. Readers work against snapshots and
//! never observe a level sealed after they started.

/// Level stack of one direction.
///
/// Global edge numbering, degree sums and byte ranges across levels.
pub mod csr;

/// Edge iteration protocol.
pub mod iter;

/// Sealed level tables and their unsealed input form.
pub mod level;

mod graph;
mod overlay;
mod traversal;

/// Snapshot-publishing graph store.
pub use graph::{Graph, GraphSnapshot};

pub use csr::MultiLevelCsr;
pub use iter::{EdgeCursor, LevelSpan, PendingEdge};
pub use level::{Level, LevelData, LevelHandle, VertexEntry};

/// Buffered appends that become the next level on checkpoint.
pub use overlay::WritableOverlay;

pub use traversal::CommonNeighbors;
