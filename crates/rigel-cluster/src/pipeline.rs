//! Per-core staging pipeline
//!
//! Each core owns every `team`-th chunk of the run range and drives it
//! through a two-slot ping-pong: while the current chunk is copied to Local
//! and transformed, the next chunk is already inbound into the other Shared
//! staging slot. A staging slot is reused for a fetch only after the
//! outbound transfer that last read from it has been waited on, so no
//! transfer ever sees a buffer the core is still writing.

use crate::cluster::Core;
use crate::context::{Lane, RunParams};
use crate::dma::{chunk_spans, Direction, Transfer};
use crate::extmem::ExternalMemory;
use crate::kernel::CipherKernel;
use rigel_soc::mem::ScratchTier;
use std::sync::Arc;

/// One core's share of a staged cipher run.
pub(crate) fn run_core(
    core: &Core<'_>,
    params: &RunParams,
    ext: &Arc<ExternalMemory>,
    lane: &Lane,
    kernel: &dyn CipherKernel,
    base: usize,
    len: usize,
) {
    let me = core.index();
    let team = core.team_size();
    let chip = core.chip();
    let dma = core.dma();

    let spans: Vec<(usize, usize)> = chunk_spans(len, params.chunk_bytes)
        .enumerate()
        .filter(|(k, _)| k % team == me)
        .map(|(_, span)| span)
        .collect();

    let mut inbound: Option<Transfer> = spans
        .first()
        .map(|&(off, n)| dma.submit(Direction::ExtToChip, ext, base + off, lane.stage[0], n));
    let mut outbound: [Option<Transfer>; 2] = [None, None];

    for (i, &(off, n)) in spans.iter().enumerate() {
        let slot = i % 2;

        if let Some(t) = inbound.take() {
            t.wait();
        }

        // Kick the next fetch into the other slot before transforming, so
        // the DMA engine works while the core does. The slot is free once
        // its previous outbound has landed.
        if let Some(&(next_off, next_n)) = spans.get(i + 1) {
            let other = (i + 1) % 2;
            if let Some(t) = outbound[other].take() {
                t.wait();
            }
            inbound = Some(dma.submit(
                Direction::ExtToChip,
                ext,
                base + next_off,
                lane.stage[other],
                next_n,
            ));
        }

        chip.copy_onchip(lane.stage[slot], lane.work, n);
        core.perf().record_onchip(n);

        chip.bank(ScratchTier::Local).modify(lane.work.offset, n, |bytes| {
            kernel.apply(&params.key, &params.iv, off as u64, bytes);
        });
        core.perf().record_touch(n);

        chip.copy_onchip(lane.work, lane.stage[slot], n);
        core.perf().record_onchip(n);

        outbound[slot] = Some(dma.submit(
            Direction::ChipToExt,
            ext,
            base + off,
            lane.stage[slot],
            n,
        ));
    }

    for t in outbound.into_iter().flatten() {
        t.wait();
    }

    // The whole team closes the episode together; the range is fully
    // written back once every core reaches this point.
    core.barrier();
}
