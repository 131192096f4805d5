#![forbid(unsafe_code)]

//! Identifier newtypes and the crate-wide error type.

use std::fmt;

/// Dense, zero-based vertex identifier.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct NodeId(pub u64);

/// Offset into the logical edge array of one direction.
///
/// Edge references are global: the edges of level `k` follow the edges of all
/// older levels, so a reference identifies both the level and the slot.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct EdgeRef(pub u64);

impl EdgeRef {
    /// Sentinel denoting "no edge".
    pub const NIL: EdgeRef = EdgeRef(u64::MAX);

    /// Bit marking references handed out by a writable overlay.
    pub(crate) const OVERLAY_FLAG: u64 = 1 << 63;

    /// Returns true for the "no edge" sentinel.
    #[inline]
    pub const fn is_nil(self) -> bool {
        self.0 == u64::MAX
    }

    /// Returns true if the edge lives in a writable overlay rather than a sealed level.
    #[inline]
    pub const fn is_overlay(self) -> bool {
        !self.is_nil() && self.0 & Self::OVERLAY_FLAG != 0
    }
}

impl Default for EdgeRef {
    fn default() -> Self {
        EdgeRef::NIL
    }
}

/// Adjacency direction.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Outgoing edges (source to target).
    Out,
    /// Incoming edges (target to source).
    In,
}

impl Direction {
    /// Both directions, outgoing first.
    pub const ALL: [Direction; 2] = [Direction::Out, Direction::In];

    /// Stable small index, used for per-direction arrays.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Direction::Out => 0,
            Direction::In => 1,
        }
    }

    /// Label used in log fields.
    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::Out => "out",
            Direction::In => "in",
        }
    }
}

/// Errors surfaced by the store, the queues and the advisor.
#[derive(thiserror::Error, Debug)]
pub enum LaminaError {
    /// Underlying OS error (mapping edge tables, reading config files).
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    /// Level data that violates the CSR layout.
    #[error("corruption: {0}")]
    Corruption(&'static str),
    /// Invalid argument or option.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
    /// Iteration requested on a node outside `[0, max_nodes)`.
    #[error("node {node} out of range (max_nodes = {max_nodes})")]
    NodeOutOfRange {
        /// Requested node.
        node: NodeId,
        /// Exclusive upper bound at the time of the request.
        max_nodes: u64,
    },
    /// Level index outside the sealed level set.
    #[error("level {level} out of range ({levels} levels sealed)")]
    LevelOutOfRange {
        /// Requested level.
        level: usize,
        /// Number of sealed levels.
        levels: usize,
    },
    /// `advise` or `stop` called on an advisor that was already stopped.
    #[error("advisor already stopped")]
    AdvisorStopped,
    /// A bounded queue could not accept another request.
    #[error("advise queue full")]
    QueueFull,
    /// Configuration could not be loaded or parsed.
    #[error("config: {0}")]
    Config(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, LaminaError>;

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EdgeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nil() {
            f.write_str("nil")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<u64> for NodeId {
    fn from(value: u64) -> Self {
        NodeId(value)
    }
}

impl From<NodeId> for u64 {
    fn from(value: NodeId) -> Self {
        value.0
    }
}
