//! Low-level building blocks for the store and the advisor.

/// Single-producer/single-consumer advise queues.
///
/// Block, ring and LRU variants behind one producer/consumer contract.
pub mod concurrency;

/// Memory regions backing edge tables.
pub mod io;
