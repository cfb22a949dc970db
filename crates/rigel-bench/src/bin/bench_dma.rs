//! Transfer-engine throughput benchmark: sustained staging in and out of
//! shared scratch.
//!
//! The engine is software-modeled, so the numbers track host memcpy and
//! the injected staging latency, not silicon. Useful for sizing chunk and
//! latency parameters relative to each other.
//!
//! Usage:
//!   cargo run --bin bench_dma
//!   cargo run --bin bench_dma -- --size-kb 64 --iterations 200

use anyhow::Result;
use rigel_cluster::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

const DEFAULT_TRANSFER_KB: usize = 4;
const DEFAULT_ITERATIONS: usize = 500;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let transfer_kb = parse_arg(&args, "--size-kb", DEFAULT_TRANSFER_KB);
    let iterations = parse_arg(&args, "--iterations", DEFAULT_ITERATIONS);
    let transfer_bytes = transfer_kb * 1024;

    println!("Transfer engine throughput benchmark");
    println!("====================================");
    println!("Transfer size : {transfer_kb} KB");
    println!("Iterations    : {iterations}");
    println!();

    let cluster = Cluster::open(&ClusterConfig::default())?;
    let ext = Arc::new(ExternalMemory::new(transfer_bytes));
    ext.write(0, &vec![0xA5u8; transfer_bytes])?;

    let stage = cluster
        .arena()
        .allocate(ScratchTier::Shared, transfer_bytes)
        .ok_or_else(|| anyhow::anyhow!("{transfer_kb} KB does not fit shared scratch"))?
        .addr;

    // Warmup
    for _ in 0..10 {
        cluster
            .dma()
            .submit(Direction::ExtToChip, &ext, 0, stage, transfer_bytes)
            .wait();
    }

    // Inbound benchmark
    let t0 = Instant::now();
    for _ in 0..iterations {
        cluster
            .dma()
            .submit(Direction::ExtToChip, &ext, 0, stage, transfer_bytes)
            .wait();
    }
    let in_elapsed = t0.elapsed();

    // Outbound benchmark
    let t0 = Instant::now();
    for _ in 0..iterations {
        cluster
            .dma()
            .submit(Direction::ChipToExt, &ext, 0, stage, transfer_bytes)
            .wait();
    }
    let out_elapsed = t0.elapsed();

    // Combined (interleaved in + out, the staging pattern of a real run)
    let t0 = Instant::now();
    for _ in 0..iterations {
        cluster
            .dma()
            .submit(Direction::ExtToChip, &ext, 0, stage, transfer_bytes)
            .wait();
        cluster
            .dma()
            .submit(Direction::ChipToExt, &ext, 0, stage, transfer_bytes)
            .wait();
    }
    let combined_elapsed = t0.elapsed();

    let total_one_way = (iterations * transfer_bytes) as f64;
    let total_two_way = (iterations * transfer_bytes * 2) as f64;

    println!("Results");
    println!("-------");
    print_throughput("In only ", in_elapsed, total_one_way, transfer_bytes);
    print_throughput("Out only", out_elapsed, total_one_way, transfer_bytes);
    print_throughput("In+Out  ", combined_elapsed, total_two_way, transfer_bytes);

    cluster.close();
    Ok(())
}

fn print_throughput(label: &str, elapsed: Duration, bytes: f64, transfer_bytes: usize) {
    let secs = elapsed.as_secs_f64();
    let mb_s = (bytes / 1_048_576.0) / secs;
    let per_transfer_us = (secs / (bytes / transfer_bytes as f64)) * 1e6;
    println!(
        "  {}: {:.1} MB/s  ({:.0} µs / {} KB transfer)",
        label,
        mb_s,
        per_transfer_us,
        transfer_bytes / 1024
    );
}

fn parse_arg(args: &[String], flag: &str, default: usize) -> usize {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
