//! On-chip memory banks
//!
//! Raw byte arenas standing in for the cluster's scratch RAM. Banks are
//! deliberately not `Vec<u8>` behind a lock: every core and the transfer
//! engine touch a bank concurrently, each through its own disjoint range,
//! exactly as the silicon would be used. Bounds are asserted on every
//! access; range disjointness is the caller's contract.

use rigel_soc::mem::{ChipAddr, ScratchTier, Tier};

/// One physical memory bank: a fixed-size raw byte arena.
///
/// Banks are zero-filled at power-on. Contents of scratch banks are lost
/// when the cluster powers off; scratch addresses are not stable across a
/// close/reopen cycle.
pub struct MemoryBank {
    /// Arena base pointer
    ptr: *mut u8,
    /// Arena size in bytes
    size: usize,
    /// Which tier this bank backs
    tier: Tier,
}

impl std::fmt::Debug for MemoryBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBank")
            .field("ptr", &format_args!("{:p}", self.ptr))
            .field("size", &self.size)
            .field("tier", &self.tier)
            .finish()
    }
}

// SAFETY: Send - MemoryBank owns its allocation exclusively. Moving it between
// threads does not invalidate the pointer; there is no thread-local state.
unsafe impl Send for MemoryBank {}

// SAFETY: Sync - all accessors are bounds-checked, and callers (allocator,
// pipeline, transfer engine) only ever touch disjoint ranges concurrently.
// The bank itself never hands out overlapping mutable views.
unsafe impl Sync for MemoryBank {}

impl MemoryBank {
    /// Allocate a zero-filled bank of `size` bytes.
    #[must_use]
    pub fn new(tier: Tier, size: usize) -> Self {
        let arena = vec![0u8; size].into_boxed_slice();
        let ptr = Box::into_raw(arena).cast::<u8>();
        tracing::debug!(tier = tier.label(), size, "memory bank powered");
        Self { ptr, size, tier }
    }

    /// Copy `src` into the bank at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `offset + src.len()` exceeds the bank size.
    pub fn copy_in(&self, offset: usize, src: &[u8]) {
        assert!(
            offset + src.len() <= self.size,
            "bank write out of bounds: {}+{} > {}",
            offset,
            src.len(),
            self.size
        );
        // SAFETY: range checked above; src is a live slice; caller holds the
        // only active claim on [offset, offset+len) per the bank contract.
        unsafe {
            std::ptr::copy_nonoverlapping(src.as_ptr(), self.ptr.add(offset), src.len());
        }
    }

    /// Copy `dst.len()` bytes out of the bank at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `offset + dst.len()` exceeds the bank size.
    pub fn copy_out(&self, offset: usize, dst: &mut [u8]) {
        assert!(
            offset + dst.len() <= self.size,
            "bank read out of bounds: {}+{} > {}",
            offset,
            dst.len(),
            self.size
        );
        // SAFETY: range checked above; dst is a live exclusive slice.
        unsafe {
            std::ptr::copy_nonoverlapping(self.ptr.add(offset), dst.as_mut_ptr(), dst.len());
        }
    }

    /// Run `f` over `len` bytes of the bank starting at `offset`, in place.
    ///
    /// This is how a core works on bytes resident in its scratch: no copy
    /// out, no copy back.
    ///
    /// # Panics
    ///
    /// Panics if `offset + len` exceeds the bank size.
    pub fn modify<R>(&self, offset: usize, len: usize, f: impl FnOnce(&mut [u8]) -> R) -> R {
        assert!(
            offset + len <= self.size,
            "bank modify out of bounds: {offset}+{len} > {}",
            self.size
        );
        // SAFETY: range checked above; the caller holds the only active claim
        // on [offset, offset+len), so the view is exclusive for f's duration.
        let view = unsafe { std::slice::from_raw_parts_mut(self.ptr.add(offset), len) };
        f(view)
    }

    /// Bank size in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Which tier this bank backs.
    #[must_use]
    pub const fn tier(&self) -> Tier {
        self.tier
    }
}

impl Drop for MemoryBank {
    fn drop(&mut self) {
        // SAFETY: ptr/size came from Box::into_raw in new(); Drop runs once.
        unsafe {
            drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                self.ptr, self.size,
            )));
        }
        tracing::debug!(tier = self.tier.label(), "memory bank released");
    }
}

/// Raw copy between two distinct banks.
///
/// # Panics
///
/// Panics if either range is out of bounds.
pub(crate) fn copy_between(
    src: &MemoryBank,
    src_offset: usize,
    dst: &MemoryBank,
    dst_offset: usize,
    len: usize,
) {
    assert!(
        src_offset + len <= src.size,
        "source range out of bounds: {src_offset}+{len} > {}",
        src.size
    );
    assert!(
        dst_offset + len <= dst.size,
        "destination range out of bounds: {dst_offset}+{len} > {}",
        dst.size
    );
    // SAFETY: ranges checked above; src and dst are separate allocations, so
    // the regions cannot overlap.
    unsafe {
        std::ptr::copy_nonoverlapping(src.ptr.add(src_offset), dst.ptr.add(dst_offset), len);
    }
}

/// The cluster's two on-chip banks.
#[derive(Debug)]
pub struct ChipMemory {
    shared: MemoryBank,
    local: MemoryBank,
}

impl ChipMemory {
    /// Power both scratch banks.
    #[must_use]
    pub fn new(shared_bytes: usize, local_bytes: usize) -> Self {
        Self {
            shared: MemoryBank::new(Tier::Shared, shared_bytes),
            local: MemoryBank::new(Tier::Local, local_bytes),
        }
    }

    /// The bank backing one scratch tier.
    #[must_use]
    pub fn bank(&self, tier: ScratchTier) -> &MemoryBank {
        match tier {
            ScratchTier::Shared => &self.shared,
            ScratchTier::Local => &self.local,
        }
    }

    /// Synchronous on-chip move between the two scratch tiers.
    ///
    /// Runs in the calling core's instruction stream: when this returns, the
    /// bytes are in place. There is no completion handle. Moves within one
    /// tier go through [`MemoryBank::modify`] instead.
    ///
    /// # Panics
    ///
    /// Panics if the tiers are the same or either range is out of bounds.
    pub fn copy_onchip(&self, src: ChipAddr, dst: ChipAddr, len: usize) {
        assert!(
            src.tier != dst.tier,
            "on-chip copy must cross tiers: both ends are {:?}",
            src.tier
        );
        copy_between(
            self.bank(src.tier),
            src.offset,
            self.bank(dst.tier),
            dst.offset,
            len,
        );
    }
}
