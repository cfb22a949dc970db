//! Error types for cluster operations

use rigel_soc::mem::ScratchTier;
use thiserror::Error;

/// Result type alias for cluster operations
pub type Result<T> = std::result::Result<T, ClusterError>;

/// Errors that can occur during cluster operations
///
/// Programming errors (forking beyond the team, transfer bounds violations,
/// overlapping top-level tasks) are asserts, not variants: they fail fast
/// instead of surfacing as recoverable errors.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// The cluster could not be claimed
    #[error("Cluster unavailable: {reason}")]
    DeviceUnavailable {
        /// Why the claim failed
        reason: String,
    },

    /// Rejected configuration
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// What was wrong with it
        reason: String,
    },

    /// A scratch tier could not satisfy an allocation
    #[error("Out of {tier:?} scratch: requested {requested} bytes, {available} available")]
    ScratchExhausted {
        /// Tier that ran out
        tier: ScratchTier,
        /// Bytes asked for
        requested: usize,
        /// Bytes still free in that tier
        available: usize,
    },

    /// A host-side access fell outside the external device
    #[error("External range {offset}+{len} exceeds capacity {capacity}")]
    ExternalOutOfRange {
        /// Start of the access
        offset: usize,
        /// Length of the access
        len: usize,
        /// Device capacity in bytes
        capacity: usize,
    },
}

impl ClusterError {
    /// Create a device unavailable error
    pub fn device_unavailable(reason: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a scratch exhausted error
    #[must_use]
    pub fn scratch_exhausted(tier: ScratchTier, requested: usize, available: usize) -> Self {
        Self::ScratchExhausted {
            tier,
            requested,
            available,
        }
    }
}
