use std::sync::atomic::{AtomicU64, Ordering};

/// Hooks for counting advisor activity.
///
/// Every hook is called on the hot path of either `advise` or the worker, so
/// implementations must not block.
pub trait AdvisorMetrics: Send + Sync {
    /// A request was accepted by the queue.
    fn request_enqueued(&self);

    /// A request was dropped because the queue could not take it.
    fn request_dropped(&self);

    /// A request was discarded as stale.
    fn request_stale(&self);

    /// A residency hint covering `bytes` was issued.
    fn hint_issued(&self, bytes: u64);

    /// A residency hint failed.
    fn hint_failed(&self);
}

/// Discards every event.
#[derive(Default, Debug)]
pub struct NoopMetrics;

impl AdvisorMetrics for NoopMetrics {
    fn request_enqueued(&self) {}
    fn request_dropped(&self) {}
    fn request_stale(&self) {}
    fn hint_issued(&self, _bytes: u64) {}
    fn hint_failed(&self) {}
}

/// Atomic counters for every advisor event.
#[derive(Default, Debug)]
pub struct CounterMetrics {
    /// Requests accepted by the queue.
    pub enqueued: AtomicU64,
    /// Requests the queue rejected.
    pub dropped: AtomicU64,
    /// Requests discarded as stale.
    pub stale: AtomicU64,
    /// Hints issued.
    pub hints: AtomicU64,
    /// Bytes covered by issued hints.
    pub hinted_bytes: AtomicU64,
    /// Hints that failed.
    pub failures: AtomicU64,
}

/// Point-in-time copy of [`CounterMetrics`].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct AdvisorStats {
    /// Requests accepted by the queue.
    pub enqueued: u64,
    /// Requests the queue rejected.
    pub dropped: u64,
    /// Requests discarded as stale.
    pub stale: u64,
    /// Hints issued.
    pub hints: u64,
    /// Bytes covered by issued hints.
    pub hinted_bytes: u64,
    /// Hints that failed.
    pub failures: u64,
}

impl CounterMetrics {
    /// Reads every counter.
    pub fn snapshot(&self) -> AdvisorStats {
        AdvisorStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            hints: self.hints.load(Ordering::Relaxed),
            hinted_bytes: self.hinted_bytes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

impl AdvisorMetrics for CounterMetrics {
    fn request_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    fn request_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    fn request_stale(&self) {
        self.stale.fetch_add(1, Ordering::Relaxed);
    }

    fn hint_issued(&self, bytes: u64) {
        self.hints.fetch_add(1, Ordering::Relaxed);
        self.hinted_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    fn hint_failed(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }
}
