//! Prefetch advisor.
//!
//! Traversal threads call [`Advisor::advise`] with the node they are about to
//! expand. In background mode the request goes through an SPSC queue to a
//! worker thread that turns it into residency hints over the node's edge
//! ranges; in inline mode the hints are issued before `advise` returns.
//! Requests that are too many epochs old by the time the worker sees them are
//! dropped. Hint failures only show up in logs and metrics.

use std::ops::{ControlFlow, Range};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::primitives::concurrency::{advise_channel, AdviseRequest, DynConsumer, DynProducer};
use crate::primitives::io::EDGE_SLOT_LEN;
use crate::storage::{Graph, Level};
use crate::types::{Direction, LaminaError, NodeId, Result};

mod hint;
mod metrics;
mod options;
mod policy;

pub use hint::{HintRecord, MadviseHint, RecordingHint, ResidencyHint};
pub use metrics::{AdvisorMetrics, AdvisorStats, CounterMetrics, NoopMetrics};
pub use options::{AdvisePolicy, AdvisorOptions, IdleStrategy};

use policy::HintPlanner;

/// Result of processing one request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HintOutcome {
    /// The request was older than the staleness threshold.
    Stale,
    /// Hints were issued; failed hints count in `calls`.
    Hinted {
        /// Hint calls made.
        calls: usize,
        /// Bytes covered by successful hints.
        bytes: u64,
    },
}

/// Turns requests into residency hints against the graph's current snapshot.
pub struct HintWorker {
    graph: Arc<Graph>,
    planner: HintPlanner,
    sink: Arc<dyn ResidencyHint>,
    metrics: Arc<dyn AdvisorMetrics>,
    staleness_threshold: u32,
    failures: u64,
}

impl HintWorker {
    /// Creates a worker; `options` selects policy, limits and staleness threshold.
    pub fn new(
        graph: Arc<Graph>,
        options: &AdvisorOptions,
        sink: Arc<dyn ResidencyHint>,
        metrics: Arc<dyn AdvisorMetrics>,
    ) -> Self {
        Self {
            graph,
            planner: HintPlanner::new(options),
            sink,
            metrics,
            staleness_threshold: options.staleness_threshold,
            failures: 0,
        }
    }

    /// Returns true if `request` is too old at `current_epoch`.
    #[inline]
    pub fn is_stale(&self, request: &AdviseRequest, current_epoch: u32) -> bool {
        current_epoch.wrapping_sub(request.epoch) > self.staleness_threshold
    }

    /// Processes `request` as seen at `current_epoch`.
    pub fn process(&mut self, request: AdviseRequest, current_epoch: u32) -> HintOutcome {
        self.process_with(request, current_epoch, || true)
    }

    /// Like [`process`](Self::process), but `keep_going` is consulted before
    /// every hint and ends the request early once it returns false.
    fn process_with(
        &mut self,
        request: AdviseRequest,
        current_epoch: u32,
        mut keep_going: impl FnMut() -> bool,
    ) -> HintOutcome {
        if self.is_stale(&request, current_epoch) {
            self.metrics.request_stale();
            trace!(
                node = request.node.0,
                epoch = request.epoch,
                current_epoch,
                "advisor.request_stale"
            );
            return HintOutcome::Stale;
        }
        let snapshot = self.graph.snapshot();
        let sink = Arc::clone(&self.sink);
        let metrics = Arc::clone(&self.metrics);
        let failures = &mut self.failures;
        let mut calls = 0usize;
        let mut bytes = 0u64;
        let _ = self.planner.plan(
            &snapshot,
            request,
            &mut |level: &Level, edges: Range<u64>| {
                if !keep_going() {
                    return ControlFlow::Break(());
                }
                calls += 1;
                let len = (edges.end - edges.start) * EDGE_SLOT_LEN as u64;
                match sink.will_need(level, edges) {
                    Ok(()) => {
                        bytes += len;
                        metrics.hint_issued(len);
                    }
                    Err(err) => {
                        *failures += 1;
                        metrics.hint_failed();
                        if *failures == 1 {
                            warn!(level = level.index(), error = %err, "advisor.hint_failed");
                        } else {
                            debug!(level = level.index(), error = %err, "advisor.hint_failed");
                        }
                    }
                }
                ControlFlow::Continue(())
            },
        );
        HintOutcome::Hinted { calls, bytes }
    }
}

struct Background {
    producer: DynProducer,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
    idle: IdleStrategy,
}

enum Mode {
    Inline { worker: HintWorker, epoch: u32 },
    Background(Background),
    Stopped,
}

/// Prefetch advisor bound to one graph.
///
/// One traversal thread drives an advisor; `advise` takes `&mut self`.
pub struct Advisor {
    graph: Arc<Graph>,
    metrics: Arc<dyn AdvisorMetrics>,
    mode: Mode,
}

impl Advisor {
    /// Starts an advisor with default options, OS hints and no metrics.
    pub fn new(graph: Arc<Graph>, policy: AdvisePolicy, background: bool) -> Result<Self> {
        Self::with_options(graph, AdvisorOptions::new(policy, background))
    }

    /// Starts an advisor with `options`, OS hints and no metrics.
    pub fn with_options(graph: Arc<Graph>, options: AdvisorOptions) -> Result<Self> {
        Self::start(graph, options, Arc::new(MadviseHint), Arc::new(NoopMetrics))
    }

    /// Starts an advisor with explicit hint sink and metrics.
    pub fn start(
        graph: Arc<Graph>,
        options: AdvisorOptions,
        sink: Arc<dyn ResidencyHint>,
        metrics: Arc<dyn AdvisorMetrics>,
    ) -> Result<Self> {
        options.validate()?;
        let worker = HintWorker::new(Arc::clone(&graph), &options, sink, Arc::clone(&metrics));
        let mode = if options.background {
            let (producer, consumer) = advise_channel(&options.queue)?;
            let stop = Arc::new(AtomicBool::new(false));
            let idle = options.idle;
            let park_timeout = options.park_timeout();
            let worker_stop = Arc::clone(&stop);
            let handle = thread::Builder::new()
                .name("lamina-advisor".into())
                .spawn(move || run_worker(worker, consumer, worker_stop, idle, park_timeout))?;
            Mode::Background(Background {
                producer,
                stop,
                handle,
                idle,
            })
        } else {
            Mode::Inline { worker, epoch: 0 }
        };
        debug!(
            policy = options.policy.as_str(),
            background = options.background,
            queue = ?options.queue.kind,
            "advisor.started"
        );
        Ok(Self {
            graph,
            metrics,
            mode,
        })
    }

    /// Returns true while the advisor accepts requests.
    pub fn is_running(&self) -> bool {
        !matches!(self.mode, Mode::Stopped)
    }

    /// Requests a hint for `node`'s adjacency in `direction`.
    ///
    /// Never waits for the worker. A request the queue cannot take is dropped.
    pub fn advise(&mut self, node: NodeId, direction: Direction) -> Result<()> {
        if !self.is_running() {
            return Err(LaminaError::AdvisorStopped);
        }
        let max_nodes = self.graph.max_nodes();
        if node.0 >= max_nodes {
            return Err(LaminaError::NodeOutOfRange { node, max_nodes });
        }
        match &mut self.mode {
            Mode::Inline { worker, epoch } => {
                let request = AdviseRequest {
                    node,
                    epoch: *epoch,
                    direction,
                };
                worker.process(request, *epoch);
                *epoch = epoch.wrapping_add(1);
            }
            Mode::Background(bg) => {
                let request = AdviseRequest {
                    node,
                    epoch: bg.producer.current_epoch(),
                    direction,
                };
                match bg.producer.enqueue(request) {
                    Ok(()) => self.metrics.request_enqueued(),
                    Err(full) => {
                        self.metrics.request_dropped();
                        trace!(node = full.0.node.0, "advisor.queue_full");
                    }
                }
                bg.producer.increment_epoch();
                if bg.idle == IdleStrategy::Park {
                    bg.handle.thread().unpark();
                }
            }
            Mode::Stopped => return Err(LaminaError::AdvisorStopped),
        }
        Ok(())
    }

    /// Requests a hint for `node`'s outgoing adjacency.
    pub fn advise_out(&mut self, node: NodeId) -> Result<()> {
        self.advise(node, Direction::Out)
    }

    /// Stops the worker and waits for it to exit.
    ///
    /// Requests still queued are dropped. A second call fails with
    /// [`LaminaError::AdvisorStopped`].
    pub fn stop(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.mode, Mode::Stopped) {
            Mode::Stopped => Err(LaminaError::AdvisorStopped),
            Mode::Inline { .. } => {
                debug!("advisor.stopped");
                Ok(())
            }
            Mode::Background(bg) => {
                shutdown(bg)?;
                debug!("advisor.stopped");
                Ok(())
            }
        }
    }
}

impl Drop for Advisor {
    fn drop(&mut self) {
        if let Mode::Background(bg) = std::mem::replace(&mut self.mode, Mode::Stopped) {
            let _ = shutdown(bg);
        }
    }
}

fn shutdown(bg: Background) -> Result<()> {
    bg.stop.store(true, Ordering::Release);
    bg.handle.thread().unpark();
    bg.handle
        .join()
        .map_err(|_| LaminaError::Invalid("advisor worker panicked"))
}

fn run_worker(
    mut worker: HintWorker,
    mut consumer: DynConsumer,
    stop: Arc<AtomicBool>,
    idle: IdleStrategy,
    park_timeout: Duration,
) {
    debug!("advisor.worker_started");
    while !stop.load(Ordering::Acquire) {
        let Some(request) = consumer.dequeue() else {
            match idle {
                IdleStrategy::Spin => std::hint::spin_loop(),
                IdleStrategy::Yield => thread::yield_now(),
                IdleStrategy::Park => thread::park_timeout(park_timeout),
            }
            continue;
        };
        let current = consumer.current_epoch();
        let threshold = worker.staleness_threshold;
        worker.process_with(request, current, || {
            !stop.load(Ordering::Relaxed)
                && consumer.current_epoch().wrapping_sub(request.epoch) <= threshold
        });
    }
    debug!("advisor.worker_exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LevelData;

    fn graph() -> Arc<Graph> {
        let lists: Vec<Vec<NodeId>> = vec![
            vec![NodeId(1), NodeId(2)],
            vec![NodeId(0)],
            vec![NodeId(0), NodeId(1), NodeId(2)],
        ];
        let graph = Graph::new();
        graph
            .seal_level(LevelData::from_adjacency(&lists).unwrap(), LevelData::empty(3))
            .unwrap();
        Arc::new(graph)
    }

    fn request(node: u64, epoch: u32) -> AdviseRequest {
        AdviseRequest {
            node: NodeId(node),
            epoch,
            direction: Direction::Out,
        }
    }

    #[test]
    fn staleness_boundary_is_exclusive() {
        let sink = RecordingHint::new();
        let options = AdvisorOptions::default().with_staleness_threshold(3);
        let mut worker = HintWorker::new(graph(), &options, Arc::new(sink.clone()), Arc::new(NoopMetrics));
        assert_eq!(worker.process(request(0, 10), 14), HintOutcome::Stale);
        assert_eq!(
            worker.process(request(0, 10), 13),
            HintOutcome::Hinted { calls: 1, bytes: 16 }
        );
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn staleness_survives_epoch_wrap() {
        let options = AdvisorOptions::default().with_staleness_threshold(2);
        let worker = HintWorker::new(graph(), &options, Arc::new(MadviseHint), Arc::new(NoopMetrics));
        assert!(!worker.is_stale(&request(0, u32::MAX), 1));
        assert!(worker.is_stale(&request(0, u32::MAX - 2), 1));
    }

    #[test]
    fn failed_hints_are_counted_not_raised() {
        let metrics = Arc::new(CounterMetrics::default());
        let options = AdvisorOptions::default().with_policy(AdvisePolicy::Complete);
        let mut worker = HintWorker::new(
            graph(),
            &options,
            Arc::new(RecordingHint::failing()),
            Arc::clone(&metrics) as Arc<dyn AdvisorMetrics>,
        );
        assert_eq!(
            worker.process(request(0, 0), 0),
            HintOutcome::Hinted { calls: 3, bytes: 0 }
        );
        assert_eq!(metrics.snapshot().failures, 3);
    }

    #[test]
    fn request_ends_when_keep_going_turns_false() {
        let sink = RecordingHint::new();
        let options = AdvisorOptions::default().with_policy(AdvisePolicy::Complete);
        let mut worker = HintWorker::new(graph(), &options, Arc::new(sink.clone()), Arc::new(NoopMetrics));
        let mut budget = 1;
        let outcome = worker.process_with(request(0, 0), 0, || {
            budget -= 1;
            budget >= 0
        });
        assert_eq!(outcome, HintOutcome::Hinted { calls: 1, bytes: 16 });
        assert_eq!(sink.len(), 1);
        assert_eq!(worker.process(request(0, 0), 0), HintOutcome::Hinted { calls: 3, bytes: 48 });
    }

    #[test]
    fn inline_advisor_hints_before_returning() {
        let sink = RecordingHint::new();
        let mut advisor = Advisor::start(
            graph(),
            AdvisorOptions::new(AdvisePolicy::NodeOnly, false),
            Arc::new(sink.clone()),
            Arc::new(NoopMetrics),
        )
        .unwrap();
        advisor.advise_out(NodeId(2)).unwrap();
        assert_eq!(sink.calls(), vec![HintRecord { level: 0, offset: 24, len: 24 }]);
        assert!(matches!(
            advisor.advise_out(NodeId(3)),
            Err(LaminaError::NodeOutOfRange { .. })
        ));
        advisor.stop().unwrap();
        assert!(matches!(advisor.stop(), Err(LaminaError::AdvisorStopped)));
        assert!(matches!(
            advisor.advise_out(NodeId(0)),
            Err(LaminaError::AdvisorStopped)
        ));
    }
}
