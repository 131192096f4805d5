#![forbid(unsafe_code)]

//! Memory regions backing sealed edge tables.
//!
//! Every sealed edge table lives in its own read-only mapping so that the
//! advisor can issue residency hints over exact byte spans of it. Targets are
//! stored as fixed-width little-endian slots.

use std::io;
use std::ops::Range;

use memmap2::{Mmap, MmapMut};

use crate::types::{LaminaError, NodeId, Result};

/// Width in bytes of one edge-table slot.
pub const EDGE_SLOT_LEN: usize = 8;

/// Read-only, page-backed array of edge targets.
pub struct EdgeRegion {
    map: Option<Mmap>,
    slots: usize,
}

impl EdgeRegion {
    /// Copies `targets` into a fresh anonymous mapping and seals it read-only.
    pub fn from_targets(targets: &[NodeId]) -> Result<Self> {
        if targets.is_empty() {
            return Ok(Self::empty());
        }
        let bytes = targets
            .len()
            .checked_mul(EDGE_SLOT_LEN)
            .ok_or(LaminaError::Invalid("edge table too large"))?;
        let mut map = MmapMut::map_anon(bytes).map_err(LaminaError::from)?;
        for (slot, target) in map.chunks_exact_mut(EDGE_SLOT_LEN).zip(targets) {
            slot.copy_from_slice(&target.0.to_le_bytes());
        }
        let map = map.make_read_only().map_err(LaminaError::from)?;
        Ok(Self {
            map: Some(map),
            slots: targets.len(),
        })
    }

    /// A region holding no edges and no mapping.
    pub fn empty() -> Self {
        Self {
            map: None,
            slots: 0,
        }
    }

    /// Number of edge slots.
    pub fn len(&self) -> usize {
        self.slots
    }

    /// Returns true if the region holds no edges.
    pub fn is_empty(&self) -> bool {
        self.slots == 0
    }

    /// Size of the region in bytes.
    pub fn byte_len(&self) -> usize {
        self.slots * EDGE_SLOT_LEN
    }

    /// Reads the target stored in `slot`.
    #[inline]
    pub fn get(&self, slot: usize) -> Option<NodeId> {
        let map = self.map.as_ref()?;
        let off = slot.checked_mul(EDGE_SLOT_LEN)?;
        let bytes = map.get(off..off + EDGE_SLOT_LEN)?;
        let mut buf = [0u8; EDGE_SLOT_LEN];
        buf.copy_from_slice(bytes);
        Some(NodeId(u64::from_le_bytes(buf)))
    }

    /// Converts a slot range to the byte span it occupies, clamped to the region.
    pub fn byte_span(&self, slots: Range<usize>) -> Range<usize> {
        let end = slots.end.min(self.slots);
        let start = slots.start.min(end);
        start * EDGE_SLOT_LEN..end * EDGE_SLOT_LEN
    }

    /// Tells the OS the slots in `slots` will be read soon.
    ///
    /// Out-of-range slots are clamped away; an empty span is a no-op.
    pub fn advise_will_need(&self, slots: Range<usize>) -> io::Result<()> {
        let span = self.byte_span(slots);
        if span.is_empty() {
            return Ok(());
        }
        let Some(map) = self.map.as_ref() else {
            return Ok(());
        };
        advise_map(map, span)
    }
}

#[cfg(unix)]
fn advise_map(map: &Mmap, span: Range<usize>) -> io::Result<()> {
    map.advise_range(memmap2::Advice::WillNeed, span.start, span.len())
}

#[cfg(not(unix))]
fn advise_map(_map: &Mmap, _span: Range<usize>) -> io::Result<()> {
    Ok(())
}

impl std::fmt::Debug for EdgeRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeRegion")
            .field("slots", &self.slots)
            .field("mapped", &self.map.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_read_back_in_order() {
        let targets = [NodeId(9), NodeId(2), NodeId(u64::MAX - 1)];
        let region = EdgeRegion::from_targets(&targets).unwrap();
        assert_eq!(region.len(), 3);
        assert_eq!(region.byte_len(), 24);
        for (slot, expected) in targets.iter().enumerate() {
            assert_eq!(region.get(slot), Some(*expected));
        }
        assert_eq!(region.get(3), None);
    }

    #[test]
    fn empty_region_has_no_slots() {
        let region = EdgeRegion::from_targets(&[]).unwrap();
        assert!(region.is_empty());
        assert_eq!(region.get(0), None);
        region.advise_will_need(0..10).unwrap();
    }

    #[test]
    fn byte_span_is_clamped() {
        let targets: Vec<NodeId> = (0..16).map(NodeId).collect();
        let region = EdgeRegion::from_targets(&targets).unwrap();
        assert_eq!(region.byte_span(2..4), 16..32);
        assert_eq!(region.byte_span(10..40), 80..128);
        assert!(region.byte_span(40..50).is_empty());
    }

    #[test]
    fn advise_accepts_unaligned_spans() {
        let targets: Vec<NodeId> = (0..4096).map(NodeId).collect();
        let region = EdgeRegion::from_targets(&targets).unwrap();
        region.advise_will_need(3..1000).unwrap();
        region.advise_will_need(4000..5000).unwrap();
    }
}
