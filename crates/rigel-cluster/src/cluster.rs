//! Cluster lifecycle and fork-join engine
//!
//! One physical cluster exists per process. `open` claims it, powers the
//! scratch banks, and starts the transfer engine; dropping (or `close`)
//! releases everything and frees the claim for the next open. A second open
//! while one cluster is live fails with a distinct error: the device is
//! busy, not broken.
//!
//! Work enters through [`Cluster::submit`]: exactly one top-level task,
//! run to completion on the calling thread as the team leader. Only the
//! leader can [`fork`](Leader::fork), so nested forks are unrepresentable.

use crate::alloc::ScratchArena;
use crate::config::ClusterConfig;
use crate::dma::DmaEngine;
use crate::error::{ClusterError, Result};
use crate::mem::ChipMemory;
use crate::perf::PerfState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use tracing::{debug, info};

/// Process-wide power slot modeling the single physical cluster.
static CLUSTER_POWER: AtomicBool = AtomicBool::new(false);

/// Where the current submission is in its fork-join cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Episode {
    /// No fork has happened yet.
    Idle,
    /// A team is in flight.
    Forked,
    /// The last team ran to completion.
    Joined,
}

/// A powered cluster.
#[derive(Debug)]
pub struct Cluster {
    config: ClusterConfig,
    chip: Arc<ChipMemory>,
    arena: ScratchArena,
    dma: DmaEngine,
    perf: Arc<PerfState>,
    task_active: AtomicBool,
}

impl Cluster {
    /// Validate the configuration, claim the power slot, and bring the
    /// cluster up: scratch banks powered, transfer engine running.
    ///
    /// # Errors
    ///
    /// [`ClusterError::InvalidConfig`] for a rejected configuration;
    /// [`ClusterError::DeviceUnavailable`] when another cluster is already
    /// powered in this process.
    pub fn open(config: &ClusterConfig) -> Result<Self> {
        config.validate()?;
        if CLUSTER_POWER.swap(true, Ordering::SeqCst) {
            return Err(ClusterError::device_unavailable(
                "the cluster is already powered on",
            ));
        }

        let chip = Arc::new(ChipMemory::new(config.shared_bytes, config.local_bytes));
        let arena = ScratchArena::new(config.shared_bytes, config.local_bytes);
        let perf = Arc::new(PerfState::new());
        let dma = DmaEngine::start(Arc::clone(&chip), config.staging_latency, Arc::clone(&perf))
            .map_err(|e| {
                CLUSTER_POWER.store(false, Ordering::SeqCst);
                e
            })?;

        info!(
            cores = config.cores,
            shared = config.shared_bytes,
            local = config.local_bytes,
            "cluster powered on"
        );
        Ok(Self {
            config: config.clone(),
            chip,
            arena,
            dma,
            perf,
            task_active: AtomicBool::new(false),
        })
    }

    /// The configuration this cluster was opened with.
    #[must_use]
    pub const fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// The scratch allocator.
    #[must_use]
    pub const fn arena(&self) -> &ScratchArena {
        &self.arena
    }

    /// The transfer engine.
    #[must_use]
    pub const fn dma(&self) -> &DmaEngine {
        &self.dma
    }

    pub(crate) fn chip(&self) -> &Arc<ChipMemory> {
        &self.chip
    }

    pub(crate) fn perf(&self) -> &Arc<PerfState> {
        &self.perf
    }

    /// Run one top-level task to completion on the calling thread.
    ///
    /// The calling thread becomes the cluster leader for the duration.
    /// `submit` returns only when the task and everything it forked or
    /// waited on has finished. Sequential submissions are fine; overlapping
    /// ones are a defect.
    ///
    /// # Panics
    ///
    /// Panics if another top-level task is still running.
    pub fn submit<R, F>(&self, entry: F) -> R
    where
        F: FnOnce(Leader<'_>) -> R,
    {
        assert!(
            !self.task_active.swap(true, Ordering::SeqCst),
            "a cluster task is already active"
        );
        debug!("task dispatched");
        let leader = Leader {
            cluster: self,
            episode: Episode::Idle,
        };
        let out = entry(leader);
        self.task_active.store(false, Ordering::SeqCst);
        debug!("task complete");
        out
    }

    /// Power the cluster off. Equivalent to dropping it; the name makes
    /// teardown visible at the call site.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for Cluster {
    fn drop(&mut self) {
        self.dma.shutdown();
        CLUSTER_POWER.store(false, Ordering::SeqCst);
        info!("cluster powered off");
    }
}

/// The leader of a submitted task: core 0's view of the cluster.
///
/// Holding a `Leader` is the capability to fork. Cores never get one, which
/// is what makes nested forks impossible to write.
pub struct Leader<'c> {
    cluster: &'c Cluster,
    episode: Episode,
}

impl<'c> Leader<'c> {
    /// Run `work` on a team of `cores` cores and join them all.
    ///
    /// `work` runs once per core, `work(&core)` with core indices
    /// `0..cores`; the leader itself runs core 0. All cores have returned
    /// when `fork` returns.
    ///
    /// # Panics
    ///
    /// Panics if `cores` is zero or exceeds the opened team, or if an
    /// episode is already in flight.
    pub fn fork<F>(&mut self, cores: usize, work: F)
    where
        F: Fn(&Core<'_>) + Send + Sync,
    {
        let team = self.cluster.config.cores;
        assert!(cores >= 1, "fork of an empty team");
        assert!(
            cores <= team,
            "fork of {cores} cores exceeds the {team}-core team"
        );
        assert!(
            self.episode != Episode::Forked,
            "fork while an episode is in flight"
        );
        self.episode = Episode::Forked;
        debug!(cores, "team forked");

        let barrier = Barrier::new(cores);
        let cluster = self.cluster;
        std::thread::scope(|scope| {
            for index in 1..cores {
                let barrier = &barrier;
                let work = &work;
                scope.spawn(move || {
                    let core = Core {
                        index,
                        team: cores,
                        cluster,
                        barrier,
                    };
                    work(&core);
                });
            }
            let leader_core = Core {
                index: 0,
                team: cores,
                cluster,
                barrier: &barrier,
            };
            work(&leader_core);
        });

        self.episode = Episode::Joined;
        debug!(cores, "team joined");
    }

    /// Where the task is in its fork-join cycle.
    #[must_use]
    pub const fn episode(&self) -> Episode {
        self.episode
    }

    /// Cores available to fork.
    #[must_use]
    pub const fn team_size(&self) -> usize {
        self.cluster.config.cores
    }

    /// The transfer engine, for leader-driven staging.
    #[must_use]
    pub const fn dma(&self) -> &'c DmaEngine {
        &self.cluster.dma
    }

    /// The scratch allocator.
    #[must_use]
    pub const fn arena(&self) -> &'c ScratchArena {
        &self.cluster.arena
    }

    /// The on-chip banks.
    #[must_use]
    pub fn chip(&self) -> &'c ChipMemory {
        self.cluster.chip()
    }
}

/// One core's view of a forked episode.
pub struct Core<'a> {
    index: usize,
    team: usize,
    cluster: &'a Cluster,
    barrier: &'a Barrier,
}

impl<'a> Core<'a> {
    /// This core's index, `0..team_size`.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Cores in this episode.
    #[must_use]
    pub const fn team_size(&self) -> usize {
        self.team
    }

    /// Block until every core in the episode has arrived, then release
    /// them all together.
    ///
    /// Every core must reach the same barrier: a core that skips it leaves
    /// the rest of the team blocked forever. That is the silicon contract;
    /// nothing detects it at run time.
    pub fn barrier(&self) {
        self.barrier.wait();
    }

    /// The transfer engine.
    #[must_use]
    pub const fn dma(&self) -> &'a DmaEngine {
        &self.cluster.dma
    }

    /// The on-chip banks.
    #[must_use]
    pub fn chip(&self) -> &'a ChipMemory {
        self.cluster.chip()
    }

    pub(crate) fn perf(&self) -> &'a PerfState {
        self.cluster.perf()
    }
}
