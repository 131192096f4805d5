//! Sinks that receive residency hints.

use std::io;
use std::ops::Range;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::primitives::io::EDGE_SLOT_LEN;
use crate::storage::Level;

/// Receives "will be needed soon" hints for ranges of a level's edge table.
pub trait ResidencyHint: Send + Sync {
    /// Hints the global edge range `edges` of `level`.
    fn will_need(&self, level: &Level, edges: Range<u64>) -> io::Result<()>;
}

/// Forwards hints to the OS through the level's edge mapping.
#[derive(Copy, Clone, Debug, Default)]
pub struct MadviseHint;

impl ResidencyHint for MadviseHint {
    fn will_need(&self, level: &Level, edges: Range<u64>) -> io::Result<()> {
        level.advise(edges)
    }
}

/// One recorded hint: byte span within a level's edge table.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct HintRecord {
    /// Level index.
    pub level: usize,
    /// Byte offset into the level's edge table.
    pub offset: u64,
    /// Length in bytes.
    pub len: u64,
}

/// Records every hint instead of issuing it.
#[derive(Clone, Debug, Default)]
pub struct RecordingHint {
    calls: Arc<Mutex<Vec<HintRecord>>>,
    fail: bool,
}

impl RecordingHint {
    /// A recorder whose hints succeed.
    pub fn new() -> Self {
        Self::default()
    }

    /// A recorder whose hints are recorded and then reported as failed.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Every hint recorded so far, in issue order.
    pub fn calls(&self) -> Vec<HintRecord> {
        self.calls.lock().clone()
    }

    /// Number of hints recorded so far.
    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns true if no hint was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResidencyHint for RecordingHint {
    fn will_need(&self, level: &Level, edges: Range<u64>) -> io::Result<()> {
        let slot = EDGE_SLOT_LEN as u64;
        self.calls.lock().push(HintRecord {
            level: level.index(),
            offset: edges.start.saturating_sub(level.edge_base()) * slot,
            len: edges.end.saturating_sub(edges.start) * slot,
        });
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::Other, "recorded hint failure"));
        }
        Ok(())
    }
}
