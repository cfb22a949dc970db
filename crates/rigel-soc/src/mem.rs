//! Three-tier memory map.
//!
//! ```text
//! External   8 MB    backing store, reachable only through the transfer engine
//! Shared     512 KB  staging scratch, visible to every core in the cluster
//! Local      64 KB   working scratch, core-adjacent, fastest
//! ```
//!
//! Capacity shrinks and speed grows toward `Local`. Results are durable only
//! in `External`; both scratch tiers lose their contents when the cluster
//! powers off.

/// Default External tier capacity in bytes (8 MB on the reference board).
pub const EXTERNAL_BYTES: usize = 8 * 1024 * 1024;

/// Default Shared staging scratch capacity in bytes.
pub const SHARED_BYTES: usize = 512 * 1024;

/// Default Local working scratch capacity in bytes.
pub const LOCAL_BYTES: usize = 64 * 1024;

/// Scratch allocation granularity in bytes. All allocations round up to this.
pub const ALIGN_BYTES: usize = 4;

/// Default staging chunk for the cipher pipeline.
///
/// Two Shared staging slots plus one Local working buffer of this size per
/// core fit the default tier capacities with room to spare.
pub const STAGE_CHUNK_BYTES: usize = 4096;

/// One level of the memory hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Off-cluster backing store. Large, slow, durable for the run.
    External,
    /// On-chip staging scratch shared by all cores.
    Shared,
    /// On-chip working scratch adjacent to the cores.
    Local,
}

impl Tier {
    /// All tiers, outermost first.
    pub const ALL: [Tier; 3] = [Tier::External, Tier::Shared, Tier::Local];

    /// Default capacity of this tier in bytes.
    #[must_use]
    pub const fn default_capacity(self) -> usize {
        match self {
            Tier::External => EXTERNAL_BYTES,
            Tier::Shared => SHARED_BYTES,
            Tier::Local => LOCAL_BYTES,
        }
    }

    /// Modeled word-access cost in cycles.
    ///
    /// Used for documentation and the CLI memory map; the software cluster
    /// does not delay individual accesses.
    #[must_use]
    pub const fn word_latency_cycles(self) -> u32 {
        match self {
            Tier::External => 120,
            Tier::Shared => 8,
            Tier::Local => 1,
        }
    }

    /// Lowercase tier name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Tier::External => "external",
            Tier::Shared => "shared",
            Tier::Local => "local",
        }
    }
}

/// On-chip scratch address space: the two tiers the allocator can carve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScratchTier {
    /// The Shared staging tier.
    Shared,
    /// The Local working tier.
    Local,
}

impl ScratchTier {
    /// The memory-map tier this scratch space lives in.
    #[must_use]
    pub const fn tier(self) -> Tier {
        match self {
            ScratchTier::Shared => Tier::Shared,
            ScratchTier::Local => Tier::Local,
        }
    }
}

/// Tagged on-chip address: a byte offset within one scratch tier.
///
/// Offsets in the two tiers are independent address spaces; the tag keeps a
/// Shared offset from ever being used against the Local bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipAddr {
    /// Which scratch tier the offset addresses.
    pub tier: ScratchTier,
    /// Byte offset within that tier.
    pub offset: usize,
}

impl ChipAddr {
    /// Build an address from a tier and byte offset.
    #[must_use]
    pub const fn new(tier: ScratchTier, offset: usize) -> Self {
        Self { tier, offset }
    }
}

/// Round `len` up to the scratch allocation granularity.
#[must_use]
pub const fn align_up(len: usize) -> usize {
    (len + ALIGN_BYTES - 1) & !(ALIGN_BYTES - 1)
}
