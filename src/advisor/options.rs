use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::primitives::concurrency::QueueConfig;
use crate::primitives::io::EDGE_SLOT_LEN;
use crate::types::{LaminaError, Result};

/// Which ranges a request turns into residency hints.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisePolicy {
    /// The requested node's own range.
    #[default]
    NodeOnly,
    /// The node's range plus the range of each of its neighbours.
    Complete,
    /// A window sliding forward through the edge table in storage order.
    Sequential,
}

impl AdvisePolicy {
    /// Label used in log fields.
    pub const fn as_str(self) -> &'static str {
        match self {
            AdvisePolicy::NodeOnly => "node_only",
            AdvisePolicy::Complete => "complete",
            AdvisePolicy::Sequential => "sequential",
        }
    }
}

/// What the background worker does while its queue is empty.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdleStrategy {
    /// Busy-poll.
    Spin,
    /// Yield the time slice between polls.
    Yield,
    /// Park until the producer unparks the worker or the timeout elapses.
    #[default]
    Park,
}

/// Configuration for an [`super::Advisor`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorOptions {
    /// Hint policy.
    pub policy: AdvisePolicy,
    /// Run a background worker; `false` hints inline inside `advise`.
    pub background: bool,
    /// Requests more than this many epochs old are discarded.
    pub staleness_threshold: u32,
    /// Complete policy: neighbours with a smaller degree are not hinted.
    pub min_neighbor_degree: u32,
    /// Complete policy: cap on the bytes hinted per neighbour range.
    pub max_hint_bytes: u64,
    /// Sequential policy: bytes hinted per window.
    pub window_bytes: u64,
    /// Hint the node's range in every level instead of level 0 only.
    pub all_levels: bool,
    /// Idle behaviour of the background worker.
    pub idle: IdleStrategy,
    /// Park timeout in microseconds for [`IdleStrategy::Park`].
    pub park_timeout_us: u64,
    /// Queue between `advise` and the worker.
    pub queue: QueueConfig,
}

impl Default for AdvisorOptions {
    fn default() -> Self {
        Self {
            policy: AdvisePolicy::NodeOnly,
            background: true,
            staleness_threshold: 5,
            min_neighbor_degree: 0,
            max_hint_bytes: 1 << 20,
            window_bytes: 2 << 20,
            all_levels: false,
            idle: IdleStrategy::Park,
            park_timeout_us: 500,
            queue: QueueConfig::default(),
        }
    }
}

impl AdvisorOptions {
    /// Default options with `policy` and worker mode set.
    pub fn new(policy: AdvisePolicy, background: bool) -> Self {
        Self {
            policy,
            background,
            ..Self::default()
        }
    }

    /// Sets the hint policy.
    pub fn with_policy(mut self, policy: AdvisePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Selects background or inline hinting.
    pub fn with_background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }

    /// Sets the staleness threshold in epochs.
    pub fn with_staleness_threshold(mut self, epochs: u32) -> Self {
        self.staleness_threshold = epochs;
        self
    }

    /// Sets the complete-policy neighbour filter and per-range cap.
    pub fn with_neighbor_limits(mut self, min_degree: u32, max_hint_bytes: u64) -> Self {
        self.min_neighbor_degree = min_degree;
        self.max_hint_bytes = max_hint_bytes;
        self
    }

    /// Sets the sequential-policy window.
    pub fn with_window_bytes(mut self, bytes: u64) -> Self {
        self.window_bytes = bytes;
        self
    }

    /// Hints every level instead of level 0 only.
    pub fn with_all_levels(mut self, all_levels: bool) -> Self {
        self.all_levels = all_levels;
        self
    }

    /// Sets the idle strategy.
    pub fn with_idle(mut self, idle: IdleStrategy) -> Self {
        self.idle = idle;
        self
    }

    /// Sets the queue configuration.
    pub fn with_queue(mut self, queue: QueueConfig) -> Self {
        self.queue = queue;
        self
    }

    /// Parses options from a TOML table and validates them.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let options: Self = toml::from_str(source)
            .map_err(|err| LaminaError::Config(format!("failed to parse advisor options: {err}")))?;
        options.validate()?;
        Ok(options)
    }

    /// Rejects option combinations the advisor cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_hint_bytes < EDGE_SLOT_LEN as u64 {
            return Err(LaminaError::Invalid("max_hint_bytes must cover at least one edge"));
        }
        if self.window_bytes < EDGE_SLOT_LEN as u64 {
            return Err(LaminaError::Invalid("window_bytes must cover at least one edge"));
        }
        if self.idle == IdleStrategy::Park && self.park_timeout_us == 0 {
            return Err(LaminaError::Invalid("park_timeout_us must be non-zero"));
        }
        if self.background {
            self.queue.validate()?;
        }
        Ok(())
    }

    /// Park timeout as a duration.
    pub fn park_timeout(&self) -> Duration {
        Duration::from_micros(self.park_timeout_us)
    }

    pub(crate) fn max_hint_edges(&self) -> u64 {
        (self.max_hint_bytes / EDGE_SLOT_LEN as u64).max(1)
    }

    pub(crate) fn window_edges(&self) -> u64 {
        (self.window_bytes / EDGE_SLOT_LEN as u64).max(1)
    }
}
