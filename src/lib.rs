//! Lamina: a multi-level CSR graph store with a prefetch advisor.
//!
//! Edges are appended as immutable levels; cursors walk a node's adjacency
//! across levels in age order and never see levels sealed after they were
//! opened. The advisor hints upcoming adjacency ranges to the OS from a
//! background thread fed through single-producer/single-consumer queues.

#![warn(missing_docs)]

pub mod advisor;
pub mod config;
pub mod logging;
pub mod primitives;
pub mod storage;
pub mod types;

pub use advisor::{AdvisePolicy, Advisor, AdvisorOptions};
pub use storage::{EdgeCursor, Graph, GraphSnapshot, LevelData, WritableOverlay};
pub use types::{Direction, EdgeRef, LaminaError, NodeId, Result};
