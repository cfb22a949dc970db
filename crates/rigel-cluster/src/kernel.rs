//! The cipher boundary
//!
//! The cluster stages bytes and runs the team; what happens to a chunk in
//! local scratch is someone else's algorithm. [`CipherKernel`] is that
//! seam. Implementations live outside this crate (see `rigel-ciphers` for
//! the real ones); [`IdentityKernel`] stays here so the staging path can be
//! exercised end to end without any cryptography in the loop.

/// Cipher selector, matching the wire numbering callers pass around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherAlgo {
    /// ChaCha20 stream cipher (selector 0, the reference workload).
    ChaCha20,
    /// AES-128 in counter mode (selector 1).
    Aes128Ctr,
    /// Identity pass-through (selector 2): staging only, bytes unchanged.
    Identity,
}

impl CipherAlgo {
    /// The small-integer selector for this algorithm.
    #[must_use]
    pub const fn selector(self) -> u8 {
        match self {
            CipherAlgo::ChaCha20 => 0,
            CipherAlgo::Aes128Ctr => 1,
            CipherAlgo::Identity => 2,
        }
    }

    /// Algorithm for a selector, `None` for an unknown value.
    #[must_use]
    pub const fn from_selector(selector: u8) -> Option<Self> {
        match selector {
            0 => Some(CipherAlgo::ChaCha20),
            1 => Some(CipherAlgo::Aes128Ctr),
            2 => Some(CipherAlgo::Identity),
            _ => None,
        }
    }
}

/// A stream transform applied to staged chunks.
///
/// The pipeline hands every implementation the same three facts: the run's
/// key and IV, and the chunk's byte offset within the processed range. An
/// implementation must derive everything from those, because chunks of one
/// run are transformed on different cores in an order nobody promises, and
/// the results have to match a single sequential pass.
pub trait CipherKernel: Send + Sync {
    /// Transform `chunk` in place.
    ///
    /// `stream_offset` is the chunk's first byte position within the
    /// processed range, for keystream alignment.
    fn apply(&self, key: &[u8; 32], iv: &[u8; 12], stream_offset: u64, chunk: &mut [u8]);

    /// Short name for logs and reports.
    fn name(&self) -> &'static str;
}

/// Pass-through kernel: the staging pipeline with the cipher removed.
///
/// A run with this kernel must reproduce its input bytes exactly, which is
/// what the round-trip tests lean on.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityKernel;

impl CipherKernel for IdentityKernel {
    fn apply(&self, _key: &[u8; 32], _iv: &[u8; 12], _stream_offset: u64, _chunk: &mut [u8]) {}

    fn name(&self) -> &'static str {
        "identity"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_roundtrip() {
        for algo in [CipherAlgo::ChaCha20, CipherAlgo::Aes128Ctr, CipherAlgo::Identity] {
            assert_eq!(CipherAlgo::from_selector(algo.selector()), Some(algo));
        }
    }

    #[test]
    fn unknown_selector_is_none() {
        assert_eq!(CipherAlgo::from_selector(3), None);
        assert_eq!(CipherAlgo::from_selector(255), None);
    }

    #[test]
    fn identity_leaves_bytes_alone() {
        let mut chunk = [1u8, 2, 3, 4];
        IdentityKernel.apply(&[0; 32], &[0; 12], 0, &mut chunk);
        assert_eq!(chunk, [1, 2, 3, 4]);
    }
}
