//! Software-modeled driver for the Rigel RV8 compute cluster.
//!
//! One process, one cluster: eight worker cores, a three-tier memory
//! system, a DMA engine for the external tier, and a counter bank that
//! reports what a run cost. The whole device is modeled in process memory,
//! so the crate runs anywhere while keeping the programming model of the
//! silicon: explicit staging, explicit transfers, explicit joins.
//!
//! # Memory tiers
//!
//! ```text
//! External   8 MB    ~120 cycles/word   DMA engine, asynchronous
//!    │
//! Shared   512 KB      ~8 cycles/word   on-chip copy, synchronous
//!    │
//! Local     64 KB       ~1 cycle/word   kernels run here
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! use rigel_cluster::prelude::*;
//! use std::sync::Arc;
//!
//! # fn main() -> std::result::Result<(), rigel_cluster::ClusterError> {
//! let cluster = Cluster::open(&ClusterConfig::default())?;
//!
//! let ext = Arc::new(ExternalMemory::new(1 << 20));
//! ext.write(0, &[0xA5; 4096])?;
//!
//! let ctx = RunContext::initialize(cluster, RunParams::default(), Arc::clone(&ext))?;
//! ctx.run_cipher(&IdentityKernel, 0, 4096);
//!
//! let stats = ctx.transfer_stats();
//! println!("{} bytes in, {} bytes out", stats.inbound_bytes, stats.outbound_bytes);
//! ctx.close();
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

mod alloc;
mod cluster;
mod config;
mod context;
mod dma;
mod error;
mod extmem;
mod kernel;
pub mod mem;
mod perf;
mod pipeline;

/// Device geometry constants (re-exported from rigel-soc).
pub mod soc {
    pub use rigel_soc::cluster::{nanos_to_cycles, CLUSTER_CORES, NOMINAL_CLOCK_HZ};
    pub use rigel_soc::mem::{Tier, ALIGN_BYTES, STAGE_CHUNK_BYTES};
}

pub use alloc::{ScratchAlloc, ScratchArena};
pub use cluster::{Cluster, Core, Episode, Leader};
pub use config::ClusterConfig;
pub use context::{RunContext, RunParams};
pub use dma::{chunk_spans, Direction, DmaEngine, Transfer, TransferStats};
pub use error::{ClusterError, Result};
pub use extmem::ExternalMemory;
pub use kernel::{CipherAlgo, CipherKernel, IdentityKernel};
pub use perf::{
    measure, ClusterCounters, CounterBank, EventMask, MeasureSpec, PerfEvent, PerfReport,
};
pub use rigel_soc::mem::{ChipAddr, ScratchTier};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        measure, ChipAddr, CipherAlgo, CipherKernel, Cluster, ClusterConfig, ClusterError,
        CounterBank, Direction, ExternalMemory, IdentityKernel, MeasureSpec, PerfEvent, Result,
        RunContext, RunParams, ScratchTier,
    };
}
