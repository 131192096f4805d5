//! Fixed-capacity arena of lazily created slabs addressed by index.
//!
//! Releasing a slab pushes its index on a lock-free free-list; nothing is
//! ever deallocated before the arena itself is dropped.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::OnceLock;

/// Index meaning "no slab".
pub(crate) const NIL: u32 = u32::MAX;

pub(crate) struct SlabArena<T> {
    slabs: Box<[OnceLock<T>]>,
    next_free: Box<[AtomicU32]>,
    free_head: AtomicU32,
    created: AtomicUsize,
}

impl<T> SlabArena<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            slabs: (0..capacity).map(|_| OnceLock::new()).collect(),
            next_free: (0..capacity).map(|_| AtomicU32::new(NIL)).collect(),
            free_head: AtomicU32::new(NIL),
            created: AtomicUsize::new(0),
        }
    }

    /// Slab at `index`, if it has been created.
    #[inline]
    pub(crate) fn get(&self, index: u32) -> Option<&T> {
        self.slabs.get(index as usize)?.get()
    }

    /// Reuses a released slab or creates a new one with `init`.
    ///
    /// Returns `None` once every slab exists and none is free. Only one
    /// thread may allocate at a time.
    pub(crate) fn alloc(&self, init: impl FnOnce() -> T) -> Option<(u32, &T)> {
        if let Some(index) = self.pop_free() {
            return Some((index, self.get(index)?));
        }
        let index = self.created.load(Ordering::Relaxed);
        let cell = self.slabs.get(index)?;
        self.created.store(index + 1, Ordering::Relaxed);
        Some((index as u32, cell.get_or_init(init)))
    }

    /// Returns a slab to the free-list. Only one thread may release at a time.
    pub(crate) fn release(&self, index: u32) {
        let Some(link) = self.next_free.get(index as usize) else {
            return;
        };
        let mut head = self.free_head.load(Ordering::Relaxed);
        loop {
            link.store(head, Ordering::Relaxed);
            match self.free_head.compare_exchange_weak(
                head,
                index,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => head = actual,
            }
        }
    }

    /// Number of slabs created so far.
    pub(crate) fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    fn pop_free(&self) -> Option<u32> {
        let mut head = self.free_head.load(Ordering::Acquire);
        loop {
            if head == NIL {
                return None;
            }
            // Only the allocating thread pops, so `head` stays on the list
            // until this CAS and its link cannot change underneath us.
            let next = self.next_free[head as usize].load(Ordering::Relaxed);
            match self.free_head.compare_exchange_weak(
                head,
                next,
                Ordering::Acquire,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(head),
                Err(actual) => head = actual,
            }
        }
    }
}
