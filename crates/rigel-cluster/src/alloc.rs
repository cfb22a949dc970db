//! Scratch tier allocator
//!
//! A bump allocator over each on-chip tier. `allocate` either hands out a
//! fresh range or reports exhaustion; `release` is accepted for call-site
//! symmetry but individual ranges are never recycled. The whole arena is
//! reclaimed when the cluster powers off, which is the model the pipeline
//! is written against: carve once at bring-up, run, tear down.

use rigel_soc::mem::{align_up, ChipAddr, ScratchTier};
use std::sync::atomic::{AtomicUsize, Ordering};

/// One carved scratch range.
#[derive(Debug, Clone, Copy)]
pub struct ScratchAlloc {
    /// Tagged base address of the range
    pub addr: ChipAddr,
    /// Length in bytes, rounded up to the allocation unit
    pub len: usize,
}

/// Bump allocator over both scratch tiers.
#[derive(Debug)]
pub struct ScratchArena {
    shared_top: AtomicUsize,
    local_top: AtomicUsize,
    shared_capacity: usize,
    local_capacity: usize,
}

impl ScratchArena {
    /// New arena over empty tiers of the given capacities.
    #[must_use]
    pub fn new(shared_capacity: usize, local_capacity: usize) -> Self {
        Self {
            shared_top: AtomicUsize::new(0),
            local_top: AtomicUsize::new(0),
            shared_capacity,
            local_capacity,
        }
    }

    fn top(&self, tier: ScratchTier) -> &AtomicUsize {
        match tier {
            ScratchTier::Shared => &self.shared_top,
            ScratchTier::Local => &self.local_top,
        }
    }

    fn capacity(&self, tier: ScratchTier) -> usize {
        match tier {
            ScratchTier::Shared => self.shared_capacity,
            ScratchTier::Local => self.local_capacity,
        }
    }

    /// Carve `len` bytes (rounded up to the allocation unit) from a tier.
    ///
    /// Returns `None` when the tier cannot satisfy the request; the tier is
    /// unchanged in that case. First use of a fresh range reads as zero;
    /// nothing beyond that is guaranteed about scratch contents.
    ///
    /// # Panics
    ///
    /// Panics if `len` is zero.
    pub fn allocate(&self, tier: ScratchTier, len: usize) -> Option<ScratchAlloc> {
        assert!(len > 0, "zero-length scratch allocation");
        let rounded = align_up(len);
        let capacity = self.capacity(tier);
        let mut base = 0;
        self.top(tier)
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |top| {
                base = top;
                top.checked_add(rounded).filter(|end| *end <= capacity)
            })
            .ok()?;
        tracing::trace!(?tier, base, len = rounded, "scratch carved");
        Some(ScratchAlloc {
            addr: ChipAddr::new(tier, base),
            len: rounded,
        })
    }

    /// Hand a range back.
    ///
    /// Accepted and ignored: ranges live until the cluster powers off.
    pub fn release(&self, alloc: ScratchAlloc) {
        tracing::trace!(tier = ?alloc.addr.tier, base = alloc.addr.offset, "scratch released");
    }

    /// Bytes still free in a tier.
    #[must_use]
    pub fn remaining(&self, tier: ScratchTier) -> usize {
        self.capacity(tier) - self.top(tier).load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocations_do_not_overlap() {
        let arena = ScratchArena::new(64, 64);
        let a = arena.allocate(ScratchTier::Shared, 16).unwrap();
        let b = arena.allocate(ScratchTier::Shared, 16).unwrap();
        assert_eq!(a.addr.tier, ScratchTier::Shared);
        assert!(b.addr.offset >= a.addr.offset + a.len);
    }

    #[test]
    fn tiers_are_independent_address_spaces() {
        let arena = ScratchArena::new(64, 64);
        let shared = arena.allocate(ScratchTier::Shared, 32).unwrap();
        let local = arena.allocate(ScratchTier::Local, 32).unwrap();
        assert_eq!(shared.addr.offset, 0);
        assert_eq!(local.addr.offset, 0);
    }

    #[test]
    fn lengths_round_up_to_the_allocation_unit() {
        let arena = ScratchArena::new(64, 64);
        let a = arena.allocate(ScratchTier::Local, 5).unwrap();
        assert_eq!(a.len, 8);
        let b = arena.allocate(ScratchTier::Local, 1).unwrap();
        assert_eq!(b.addr.offset, 8);
    }

    #[test]
    fn exhaustion_returns_none_and_leaves_the_tier_unchanged() {
        let arena = ScratchArena::new(32, 32);
        assert!(arena.allocate(ScratchTier::Shared, 24).is_some());
        let before = arena.remaining(ScratchTier::Shared);
        assert!(arena.allocate(ScratchTier::Shared, 16).is_none());
        assert_eq!(arena.remaining(ScratchTier::Shared), before);
        // A smaller request still fits.
        assert!(arena.allocate(ScratchTier::Shared, 8).is_some());
    }

    #[test]
    fn release_does_not_recycle() {
        let arena = ScratchArena::new(32, 32);
        let a = arena.allocate(ScratchTier::Shared, 16).unwrap();
        arena.release(a);
        assert_eq!(arena.remaining(ScratchTier::Shared), 16);
    }

    #[test]
    #[should_panic(expected = "zero-length")]
    fn zero_length_allocation_is_fatal() {
        let arena = ScratchArena::new(32, 32);
        let _ = arena.allocate(ScratchTier::Local, 0);
    }
}
