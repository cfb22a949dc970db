// SPDX-License-Identifier: AGPL-3.0-only

//! Staged cipher benchmark: the reference workload end to end.
//!
//! Fills external memory, stages it through shared and local scratch on
//! all cores, applies the selected stream cipher, and reports averaged
//! counter readings over the measured passes plus transfer totals.
//!
//! Usage:
//!   cargo run --bin bench_cipher
//!   cargo run --bin bench_cipher -- --len 262144 --cipher 1 --repeat 5

use anyhow::Result;
use rigel_ciphers::kernel_for;
use rigel_cluster::prelude::*;
use rigel_cluster::EventMask;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_LEN: usize = 131_072;
const DEFAULT_CHUNK: usize = rigel_cluster::soc::STAGE_CHUNK_BYTES;
const DEFAULT_WARMUP: u32 = 1;
const DEFAULT_REPEAT: u32 = 3;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let len = parse_arg(&args, "--len", DEFAULT_LEN);
    let chunk = parse_arg(&args, "--chunk", DEFAULT_CHUNK);
    let selector = parse_arg(&args, "--cipher", 0u8);
    let warmup = parse_arg(&args, "--warmup", DEFAULT_WARMUP);
    let repeat = parse_arg(&args, "--repeat", DEFAULT_REPEAT);
    anyhow::ensure!(repeat > 0, "--repeat must be at least 1");

    let Some(algo) = CipherAlgo::from_selector(selector) else {
        anyhow::bail!("unknown cipher selector {selector}");
    };
    let kernel = kernel_for(algo);

    println!("Staged cipher benchmark");
    println!("=======================");
    println!("Cipher  : {} (selector {selector})", kernel.name());
    println!("Buffer  : {len} bytes");
    println!("Chunk   : {chunk} bytes");
    println!("Passes  : {warmup} warm-up + {repeat} measured");
    println!();

    let cluster = Cluster::open(&ClusterConfig::default())?;
    let ext = Arc::new(ExternalMemory::new(len));
    ext.write(0, &vec![0xA5u8; len])?;

    let key: [u8; 32] = std::array::from_fn(|i| i as u8);
    let params = RunParams {
        key,
        iv: [0; 12],
        algo,
        chunk_bytes: chunk,
    };
    let ctx = match RunContext::initialize(cluster, params, Arc::clone(&ext)) {
        Ok(ctx) => ctx,
        Err(err) => {
            eprintln!("cluster initialization failed: {err}");
            std::process::exit(2);
        }
    };

    let spec = MeasureSpec {
        warmup,
        repeat,
        events: EventMask::all(),
    };
    let mut bank = ctx.counters();
    let report = measure(&mut bank, &spec, || ctx.run_cipher(kernel.as_ref(), 0, len));

    println!("Averaged counters ({repeat} measured passes)");
    println!("------------------------------------");
    for event in PerfEvent::ALL {
        println!("  {:<8}: {}", event.label(), report.average(event));
    }

    let stats = ctx.transfer_stats();
    println!();
    println!("Transfer totals (all passes)");
    println!("----------------------------");
    println!(
        "  in  : {} bytes / {} requests",
        stats.inbound_bytes, stats.inbound_requests
    );
    println!(
        "  out : {} bytes / {} requests",
        stats.outbound_bytes, stats.outbound_requests
    );

    ctx.close();
    Ok(())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
