// SPDX-License-Identifier: AGPL-3.0-only

//! Transfer engine
//!
//! Asynchronous staging between the external device and on-chip scratch.
//! `submit` returns a [`Transfer`] immediately; the copy happens on the
//! engine's worker thread. The handle is consumed by [`Transfer::wait`],
//! so every transfer is waited on exactly once. There is no poll and no
//! cancellation.
//!
//! Synchronous moves between the two on-chip tiers are not transfers; see
//! [`ChipMemory::copy_onchip`](crate::mem::ChipMemory::copy_onchip).

use crate::error::{ClusterError, Result};
use crate::extmem::ExternalMemory;
use crate::mem::{copy_between, ChipMemory};
use crate::perf::PerfState;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use rigel_soc::mem::ChipAddr;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Which way a transfer moves bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// External device into on-chip scratch.
    ExtToChip,
    /// On-chip scratch out to the external device.
    ChipToExt,
}

/// Per-direction transfer accounting, counted at completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// Bytes landed on-chip.
    pub inbound_bytes: u64,
    /// Completed inbound requests.
    pub inbound_requests: u64,
    /// Bytes landed in the external device.
    pub outbound_bytes: u64,
    /// Completed outbound requests.
    pub outbound_requests: u64,
}

#[derive(Debug, Default)]
struct Totals {
    inbound_bytes: std::sync::atomic::AtomicU64,
    inbound_requests: std::sync::atomic::AtomicU64,
    outbound_bytes: std::sync::atomic::AtomicU64,
    outbound_requests: std::sync::atomic::AtomicU64,
}

impl Totals {
    fn record(&self, direction: Direction, len: usize) {
        use std::sync::atomic::Ordering::SeqCst;
        let bytes = len as u64;
        match direction {
            Direction::ExtToChip => {
                self.inbound_bytes.fetch_add(bytes, SeqCst);
                self.inbound_requests.fetch_add(1, SeqCst);
            }
            Direction::ChipToExt => {
                self.outbound_bytes.fetch_add(bytes, SeqCst);
                self.outbound_requests.fetch_add(1, SeqCst);
            }
        }
    }

    fn snapshot(&self) -> TransferStats {
        use std::sync::atomic::Ordering::SeqCst;
        TransferStats {
            inbound_bytes: self.inbound_bytes.load(SeqCst),
            inbound_requests: self.inbound_requests.load(SeqCst),
            outbound_bytes: self.outbound_bytes.load(SeqCst),
            outbound_requests: self.outbound_requests.load(SeqCst),
        }
    }
}

struct Job {
    direction: Direction,
    ext: Arc<ExternalMemory>,
    ext_offset: usize,
    chip: ChipAddr,
    len: usize,
    done: Sender<()>,
}

/// An in-flight transfer.
///
/// The destination range holds no defined bytes until [`Transfer::wait`]
/// returns. Dropping the handle without waiting violates the staging
/// contract; nothing detects it, the bytes simply land at some later point.
#[must_use = "a transfer must be waited on before its destination is touched"]
pub struct Transfer {
    done: Receiver<()>,
    direction: Direction,
    len: usize,
    perf: Arc<PerfState>,
}

impl Transfer {
    /// Block the calling core until the copy has physically happened.
    ///
    /// Consumes the handle: a transfer is waited on exactly once. Time spent
    /// blocked here is charged to the load-stall counter when a measurement
    /// window is open.
    pub fn wait(self) {
        let blocked = Instant::now();
        self.done
            .recv()
            .expect("transfer engine stopped with a transfer in flight");
        self.perf.record_stall(blocked.elapsed());
        trace!(direction = ?self.direction, len = self.len, "transfer landed");
    }

    /// Bytes this transfer moves.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Transfer direction.
    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }
}

/// The staging engine: one worker thread draining a submission queue.
#[derive(Debug)]
pub struct DmaEngine {
    jobs: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
    chip: Arc<ChipMemory>,
    totals: Arc<Totals>,
    perf: Arc<PerfState>,
}

impl DmaEngine {
    /// Start the engine over the given on-chip banks.
    ///
    /// `latency` holds every transfer in flight for at least that long
    /// before the copy lands, so tests can observe the wait gate.
    pub(crate) fn start(
        chip: Arc<ChipMemory>,
        latency: Option<Duration>,
        perf: Arc<PerfState>,
    ) -> Result<Self> {
        let (jobs, queue) = unbounded::<Job>();
        let totals = Arc::new(Totals::default());
        let worker_chip = Arc::clone(&chip);
        let worker_totals = Arc::clone(&totals);
        let worker = std::thread::Builder::new()
            .name("rigel-dma".into())
            .spawn(move || run_worker(&queue, &worker_chip, latency, &worker_totals))
            .map_err(|e| {
                ClusterError::device_unavailable(format!("transfer engine thread: {e}"))
            })?;
        debug!(?latency, "transfer engine started");
        Ok(Self {
            jobs: Some(jobs),
            worker: Some(worker),
            chip,
            totals,
            perf,
        })
    }

    /// Queue one transfer and return its handle immediately.
    ///
    /// # Panics
    ///
    /// Panics if `len` is zero or either end of the copy falls outside its
    /// memory. Bounds violations are defects in the submitting code, never
    /// runtime conditions to recover from.
    pub fn submit(
        &self,
        direction: Direction,
        ext: &Arc<ExternalMemory>,
        ext_offset: usize,
        chip: ChipAddr,
        len: usize,
    ) -> Transfer {
        assert!(len > 0, "zero-length transfer");
        assert!(
            ext_offset + len <= ext.capacity(),
            "external range out of bounds: {ext_offset}+{len} > {}",
            ext.capacity()
        );
        let bank = self.chip.bank(chip.tier);
        assert!(
            chip.offset + len <= bank.size(),
            "chip range out of bounds: {}+{len} > {} in {:?}",
            chip.offset,
            bank.size(),
            chip.tier
        );

        let (done, landed) = bounded(1);
        self.jobs
            .as_ref()
            .expect("transfer engine already stopped")
            .send(Job {
                direction,
                ext: Arc::clone(ext),
                ext_offset,
                chip,
                len,
                done,
            })
            .expect("transfer engine queue closed");
        trace!(?direction, ext_offset, chip_offset = chip.offset, len, "transfer submitted");
        Transfer {
            done: landed,
            direction,
            len,
            perf: Arc::clone(&self.perf),
        }
    }

    /// Accounting snapshot across both directions.
    #[must_use]
    pub fn stats(&self) -> TransferStats {
        self.totals.snapshot()
    }

    /// Close the queue and join the worker. Idempotent; also runs on drop.
    pub(crate) fn shutdown(&mut self) {
        if let Some(jobs) = self.jobs.take() {
            drop(jobs);
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
            debug!("transfer engine stopped");
        }
    }
}

impl Drop for DmaEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(
    queue: &Receiver<Job>,
    chip: &ChipMemory,
    latency: Option<Duration>,
    totals: &Totals,
) {
    while let Ok(job) = queue.recv() {
        if let Some(hold) = latency {
            std::thread::sleep(hold);
        }
        let bank = chip.bank(job.chip.tier);
        match job.direction {
            Direction::ExtToChip => {
                copy_between(job.ext.bank(), job.ext_offset, bank, job.chip.offset, job.len);
            }
            Direction::ChipToExt => {
                copy_between(bank, job.chip.offset, job.ext.bank(), job.ext_offset, job.len);
            }
        }
        totals.record(job.direction, job.len);
        // A dropped handle is a contract violation upstream; the copy still
        // landed, so completion just goes unobserved.
        if job.done.send(()).is_err() {
            warn!(direction = ?job.direction, len = job.len, "transfer completed with no waiter");
        }
    }
}

/// Tile `len` bytes into `chunk`-sized spans.
///
/// Every span is `chunk` bytes except the last, which is exactly
/// `len % chunk` when that is nonzero. Yields `(offset, span_len)` pairs;
/// a zero `len` yields nothing.
///
/// # Panics
///
/// Panics if `chunk` is zero.
pub fn chunk_spans(len: usize, chunk: usize) -> impl Iterator<Item = (usize, usize)> {
    assert!(chunk > 0, "zero-length chunk");
    (0..len)
        .step_by(chunk)
        .map(move |offset| (offset, chunk.min(len - offset)))
}
