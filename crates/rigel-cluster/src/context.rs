//! Run context
//!
//! Binds one opened cluster to one unit of work: key, IV, cipher selector,
//! and the per-core scratch layout, all fixed at initialization. The
//! context consumes the [`Cluster`], one run per bring-up, and releasing
//! the context (or just dropping it) is what powers the cluster back off
//! on every path.

use crate::alloc::ScratchArena;
use crate::cluster::{Cluster, Leader};
use crate::dma::TransferStats;
use crate::error::{ClusterError, Result};
use crate::extmem::ExternalMemory;
use crate::kernel::{CipherAlgo, CipherKernel};
use crate::perf::ClusterCounters;
use crate::pipeline;
use rigel_soc::mem::{ChipAddr, ScratchTier, STAGE_CHUNK_BYTES};
use std::sync::Arc;
use tracing::{debug, info};

/// Parameters fixed for the lifetime of one run context.
#[derive(Debug, Clone)]
pub struct RunParams {
    /// 256-bit run key.
    pub key: [u8; 32],
    /// 96-bit IV.
    pub iv: [u8; 12],
    /// Which cipher the run is for (informational; the kernel passed to
    /// [`RunContext::run_cipher`] does the actual work).
    pub algo: CipherAlgo,
    /// Staging chunk size in bytes.
    pub chunk_bytes: usize,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            key: [0; 32],
            iv: [0; 12],
            algo: CipherAlgo::ChaCha20,
            chunk_bytes: STAGE_CHUNK_BYTES,
        }
    }
}

/// Per-core scratch layout: two Shared staging slots for the ping-pong
/// prefetch and one Local working buffer, each one chunk long.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Lane {
    pub(crate) stage: [ChipAddr; 2],
    pub(crate) work: ChipAddr,
}

/// An initialized run: cluster, parameters, external device, carved lanes.
#[derive(Debug)]
pub struct RunContext {
    cluster: Cluster,
    params: RunParams,
    ext: Arc<ExternalMemory>,
    lanes: Vec<Lane>,
}

impl RunContext {
    /// Consume a powered cluster and prepare it for staged cipher runs.
    ///
    /// Copies the run parameters into the context and carves every core's
    /// staging and working scratch up front, so a run that would not fit
    /// fails here, before any work is submitted. On error the cluster is
    /// dropped and powers off; the caller can open a fresh one.
    ///
    /// # Errors
    ///
    /// [`ClusterError::InvalidConfig`] for a zero chunk size;
    /// [`ClusterError::ScratchExhausted`] when a tier cannot hold the
    /// per-core buffers.
    pub fn initialize(
        cluster: Cluster,
        params: RunParams,
        ext: Arc<ExternalMemory>,
    ) -> Result<Self> {
        if params.chunk_bytes == 0 {
            return Err(ClusterError::invalid_config("chunk size must be nonzero"));
        }

        let cores = cluster.config().cores;
        let chunk = params.chunk_bytes;
        let arena = cluster.arena();
        let mut lanes = Vec::with_capacity(cores);
        for _ in 0..cores {
            let stage0 = Self::carve(arena, ScratchTier::Shared, chunk)?;
            let stage1 = Self::carve(arena, ScratchTier::Shared, chunk)?;
            let work = Self::carve(arena, ScratchTier::Local, chunk)?;
            lanes.push(Lane {
                stage: [stage0, stage1],
                work,
            });
        }

        info!(
            cores,
            chunk,
            algo = params.algo.selector(),
            ext_capacity = ext.capacity(),
            "run context initialized"
        );
        Ok(Self {
            cluster,
            params,
            ext,
            lanes,
        })
    }

    fn carve(arena: &ScratchArena, tier: ScratchTier, chunk: usize) -> Result<ChipAddr> {
        arena
            .allocate(tier, chunk)
            .map(|a| a.addr)
            .ok_or_else(|| ClusterError::scratch_exhausted(tier, chunk, arena.remaining(tier)))
    }

    /// The parameters this context was initialized with.
    #[must_use]
    pub const fn params(&self) -> &RunParams {
        &self.params
    }

    /// The external device the context stages against.
    #[must_use]
    pub const fn ext(&self) -> &Arc<ExternalMemory> {
        &self.ext
    }

    /// Dispatch one top-level task; see [`Cluster::submit`].
    pub fn submit<R, F>(&self, entry: F) -> R
    where
        F: FnOnce(Leader<'_>) -> R,
    {
        self.cluster.submit(entry)
    }

    /// Stage `ext[base .. base + len]` through scratch, transform every
    /// chunk with `kernel`, and stream the results back out.
    ///
    /// The whole range is processed when this returns: chunks are owned
    /// round-robin across the team, each core ping-pongs its two staging
    /// slots so the next fetch overlaps the current transform, and one team
    /// barrier closes the episode after every core has drained its
    /// outbound transfers.
    ///
    /// # Panics
    ///
    /// Panics if the range does not fit the external device.
    pub fn run_cipher(&self, kernel: &dyn CipherKernel, base: usize, len: usize) {
        assert!(
            base.checked_add(len).is_some_and(|end| end <= self.ext.capacity()),
            "run range out of bounds: {base}+{len} > {}",
            self.ext.capacity()
        );
        let cores = self.cluster.config().cores;
        debug!(base, len, cores, cipher = kernel.name(), "cipher run");
        self.submit(|mut leader| {
            leader.fork(cores, |core| {
                pipeline::run_core(
                    core,
                    &self.params,
                    &self.ext,
                    &self.lanes[core.index()],
                    kernel,
                    base,
                    len,
                );
            });
        });
    }

    /// A counter bank over this cluster's shared instrumentation state.
    #[must_use]
    pub fn counters(&self) -> ClusterCounters {
        ClusterCounters::new(Arc::clone(self.cluster.perf()))
    }

    /// Transfer accounting since the cluster was opened.
    #[must_use]
    pub fn transfer_stats(&self) -> TransferStats {
        self.cluster.dma().stats()
    }

    /// Tear the run down and power the cluster off.
    ///
    /// Dropping the context does the same; the method gives teardown a name
    /// at the call site. After this returns, a fresh [`Cluster::open`]
    /// succeeds.
    pub fn close(self) {
        debug!("run context closed");
        drop(self);
    }
}
