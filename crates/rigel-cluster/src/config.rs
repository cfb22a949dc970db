//! Cluster configuration
//!
//! Defaults come from the `rigel-soc` silicon model; nothing here is baked
//! into the runtime at compile time.

use crate::error::{ClusterError, Result};
use rigel_soc::cluster::CLUSTER_CORES;
use rigel_soc::mem::{ALIGN_BYTES, LOCAL_BYTES, SHARED_BYTES};
use std::time::Duration;

/// Cluster bring-up configuration
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Worker cores to power, 1 to [`CLUSTER_CORES`]
    pub cores: usize,

    /// Shared staging scratch capacity in bytes
    pub shared_bytes: usize,

    /// Local working scratch capacity in bytes
    pub local_bytes: usize,

    /// Injected in-flight latency per transfer
    ///
    /// `None` completes transfers as fast as the host can copy. A concrete
    /// value holds every transfer in flight for at least that long, which
    /// makes "the bytes are not there until `wait` returns" observable.
    pub staging_latency: Option<Duration>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            cores: CLUSTER_CORES,
            shared_bytes: SHARED_BYTES,
            local_bytes: LOCAL_BYTES,
            staging_latency: None,
        }
    }
}

impl ClusterConfig {
    /// Set an injected in-flight transfer latency.
    #[must_use]
    pub fn with_staging_latency(mut self, latency: Duration) -> Self {
        self.staging_latency = Some(latency);
        self
    }

    /// Check the configuration against the silicon model.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::InvalidConfig`] if the core count is zero or
    /// above the physical team, or if either scratch tier is smaller than one
    /// allocation unit.
    pub fn validate(&self) -> Result<()> {
        if self.cores == 0 {
            return Err(ClusterError::invalid_config("core count must be at least 1"));
        }
        if self.cores > CLUSTER_CORES {
            return Err(ClusterError::invalid_config(format!(
                "{} cores requested, the cluster has {CLUSTER_CORES}",
                self.cores
            )));
        }
        if self.shared_bytes < ALIGN_BYTES {
            return Err(ClusterError::invalid_config(format!(
                "shared scratch of {} bytes is below the {ALIGN_BYTES}-byte allocation unit",
                self.shared_bytes
            )));
        }
        if self.local_bytes < ALIGN_BYTES {
            return Err(ClusterError::invalid_config(format!(
                "local scratch of {} bytes is below the {ALIGN_BYTES}-byte allocation unit",
                self.local_bytes
            )));
        }
        Ok(())
    }
}
