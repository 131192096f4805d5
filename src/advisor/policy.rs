//! Turns one advise request into the edge ranges to hint.

use std::ops::{ControlFlow, Range};

use crate::primitives::concurrency::AdviseRequest;
use crate::storage::{GraphSnapshot, Level};
use crate::types::EdgeRef;

use super::options::{AdvisePolicy, AdvisorOptions};

/// Planner state; the sequential policy remembers how far each direction was hinted.
#[derive(Debug)]
pub(crate) struct HintPlanner {
    policy: AdvisePolicy,
    all_levels: bool,
    min_neighbor_degree: u32,
    max_hint_edges: u64,
    window_edges: u64,
    hinted_upto: [u64; 2],
}

impl HintPlanner {
    pub(crate) fn new(options: &AdvisorOptions) -> Self {
        Self {
            policy: options.policy,
            all_levels: options.all_levels,
            min_neighbor_degree: options.min_neighbor_degree,
            max_hint_edges: options.max_hint_edges(),
            window_edges: options.window_edges(),
            hinted_upto: [0; 2],
        }
    }

    /// Calls `emit` with each `(level, global edge range)` to hint.
    ///
    /// Planning stops as soon as `emit` breaks. Empty ranges are never emitted.
    pub(crate) fn plan<F>(
        &mut self,
        snapshot: &GraphSnapshot,
        request: AdviseRequest,
        emit: &mut F,
    ) -> ControlFlow<()>
    where
        F: FnMut(&Level, Range<u64>) -> ControlFlow<()>,
    {
        let csr = snapshot.csr(request.direction);
        if csr.check_node(request.node).is_err() {
            return ControlFlow::Continue(());
        }
        let levels = if self.all_levels {
            csr.levels()
        } else {
            csr.levels().get(..1).unwrap_or_default()
        };
        match self.policy {
            AdvisePolicy::NodeOnly => {
                for level in levels {
                    let range = level.edge_range(request.node);
                    if !range.is_empty() {
                        emit(level.as_ref(), range)?;
                    }
                }
            }
            AdvisePolicy::Complete => {
                for level in levels {
                    self.plan_two_hop(level, request, emit)?;
                }
            }
            AdvisePolicy::Sequential => {
                if let Some(level) = csr.levels().first() {
                    self.plan_window(level, request, emit)?;
                }
            }
        }
        ControlFlow::Continue(())
    }

    fn plan_two_hop<F>(&self, level: &Level, request: AdviseRequest, emit: &mut F) -> ControlFlow<()>
    where
        F: FnMut(&Level, Range<u64>) -> ControlFlow<()>,
    {
        let own = level.edge_range(request.node);
        if own.is_empty() {
            return ControlFlow::Continue(());
        }
        emit(level, own.clone())?;
        for edge in own {
            let Some(neighbor) = level.target(EdgeRef(edge)) else {
                continue;
            };
            if level.degree(neighbor) < self.min_neighbor_degree {
                continue;
            }
            let range = level.edge_range(neighbor);
            if range.is_empty() {
                continue;
            }
            let end = range.end.min(range.start + self.max_hint_edges);
            emit(level, range.start..end)?;
        }
        ControlFlow::Continue(())
    }

    /// Hints the next window of the table; the requested node only picks the direction.
    fn plan_window<F>(&mut self, level: &Level, request: AdviseRequest, emit: &mut F) -> ControlFlow<()>
    where
        F: FnMut(&Level, Range<u64>) -> ControlFlow<()>,
    {
        let upto = &mut self.hinted_upto[request.direction.index()];
        let table_end = level.edge_base() + level.edge_count();
        let start = (*upto).max(level.edge_base());
        if start >= table_end {
            return ControlFlow::Continue(());
        }
        let end = (start + self.window_edges).min(table_end);
        emit(level, start..end)?;
        *upto = end;
        ControlFlow::Continue(())
    }
}
