//! Staged pipeline tests
//!
//! End-to-end runs through open, initialize, run, read back, close. The
//! power slot is process-wide state, so every test takes `power_lock` to
//! serialize against the others in this binary.

use rigel_cluster::prelude::*;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

static LOCK: Mutex<()> = Mutex::new(());

fn power_lock() -> MutexGuard<'static, ()> {
    LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

#[test]
fn identity_round_trip() {
    let _guard = power_lock();
    let cluster = Cluster::open(&ClusterConfig::default()).expect("open");
    let ext = Arc::new(ExternalMemory::new(64 * 1024));
    let payload: Vec<u8> = (0..10_000).map(|i| (i % 251) as u8).collect();
    ext.write(0, &payload).unwrap();

    let params = RunParams {
        chunk_bytes: 512,
        ..RunParams::default()
    };
    let ctx = RunContext::initialize(cluster, params, Arc::clone(&ext)).expect("initialize");
    ctx.run_cipher(&IdentityKernel, 0, payload.len());

    let out = ext.snapshot(0, payload.len()).unwrap();
    assert_eq!(&out[..], &payload[..]);

    // 10_000 bytes in 512-byte chunks: 19 full spans plus a 272-byte tail.
    let stats = ctx.transfer_stats();
    assert_eq!(stats.inbound_bytes, 10_000);
    assert_eq!(stats.outbound_bytes, 10_000);
    assert_eq!(stats.inbound_requests, 20);
    assert_eq!(stats.outbound_requests, 20);
    ctx.close();
}

#[test]
fn round_robin_covers_uneven_split() {
    let _guard = power_lock();
    // 8 spans over a 3-core team: cores own 3 / 3 / 2 chunks.
    let config = ClusterConfig {
        cores: 3,
        ..ClusterConfig::default()
    };
    let cluster = Cluster::open(&config).expect("open");
    let ext = Arc::new(ExternalMemory::new(16 * 1024));
    let payload: Vec<u8> = (0..8192).map(|i| (i & 0xFF) as u8).collect();
    ext.write(0, &payload).unwrap();

    let params = RunParams {
        chunk_bytes: 1024,
        ..RunParams::default()
    };
    let ctx = RunContext::initialize(cluster, params, Arc::clone(&ext)).expect("initialize");
    ctx.run_cipher(&IdentityKernel, 0, 8192);

    let out = ext.snapshot(0, 8192).unwrap();
    assert_eq!(&out[..], &payload[..]);

    let stats = ctx.transfer_stats();
    assert_eq!(stats.inbound_requests, 8);
    assert_eq!(stats.outbound_requests, 8);
    assert_eq!(stats.inbound_bytes, 8192);
    assert_eq!(stats.outbound_bytes, 8192);
    ctx.close();
}

#[test]
fn empty_run_completes_without_transfers() {
    let _guard = power_lock();
    let cluster = Cluster::open(&ClusterConfig::default()).expect("open");
    let ext = Arc::new(ExternalMemory::new(4096));
    let ctx = RunContext::initialize(cluster, RunParams::default(), ext).expect("initialize");
    ctx.run_cipher(&IdentityKernel, 0, 0);
    let stats = ctx.transfer_stats();
    assert_eq!(stats.inbound_requests, 0);
    assert_eq!(stats.outbound_requests, 0);
    ctx.close();
}

#[test]
fn wait_blocks_until_transfer_lands() {
    let _guard = power_lock();
    let config = ClusterConfig::default().with_staging_latency(Duration::from_millis(200));
    let cluster = Cluster::open(&config).expect("open");
    let ext = Arc::new(ExternalMemory::new(4096));
    ext.write(0, &[0x5A; 1024]).unwrap();

    let stage = cluster
        .arena()
        .allocate(ScratchTier::Shared, 1024)
        .expect("scratch")
        .addr;
    let started = Instant::now();
    let transfer = cluster.dma().submit(Direction::ExtToChip, &ext, 0, stage, 1024);
    transfer.wait();
    assert!(
        started.elapsed() >= Duration::from_millis(150),
        "wait returned before the modeled staging latency elapsed"
    );

    // After wait the payload is visible in scratch.
    let mut landed = vec![0u8; 1024];
    cluster.submit(|leader| {
        leader
            .chip()
            .bank(ScratchTier::Shared)
            .copy_out(stage.offset, &mut landed);
    });
    assert_eq!(landed, vec![0x5A; 1024]);
    cluster.close();
}

#[test]
fn measured_run_reports_exact_words() {
    let _guard = power_lock();
    let cluster = Cluster::open(&ClusterConfig::default()).expect("open");
    let ext = Arc::new(ExternalMemory::new(16 * 1024));
    ext.write(0, &[7u8; 8192]).unwrap();

    let params = RunParams {
        chunk_bytes: 1024,
        ..RunParams::default()
    };
    let ctx = RunContext::initialize(cluster, params, ext).expect("initialize");
    let mut bank = ctx.counters();
    let report = measure(&mut bank, &MeasureSpec::default(), || {
        ctx.run_cipher(&IdentityKernel, 0, 8192);
    });

    // Per pass: 8 chunks of 256 words, each copied in, touched, copied out.
    assert_eq!(report.average(PerfEvent::Loads), 3 * 8 * 256);
    assert_eq!(report.average(PerfEvent::Stores), 3 * 8 * 256);
    assert!(report.average(PerfEvent::Cycles) > 0);
    assert!(report.average(PerfEvent::ActiveCycles) <= report.average(PerfEvent::Cycles));
    assert_eq!(report.average(PerfEvent::Instructions), 0);
    assert_eq!(report.average(PerfEvent::IcacheMisses), 0);
    ctx.close();
}

#[test]
fn initialize_reports_scratch_exhaustion() {
    let _guard = power_lock();
    let cluster = Cluster::open(&ClusterConfig::default()).expect("open");
    let ext = Arc::new(ExternalMemory::new(1024));
    let params = RunParams {
        chunk_bytes: 512 * 1024,
        ..RunParams::default()
    };
    let err = RunContext::initialize(cluster, params, ext).expect_err("must not fit");
    match err {
        ClusterError::ScratchExhausted {
            tier, requested, ..
        } => {
            assert_eq!(tier, ScratchTier::Shared);
            assert_eq!(requested, 512 * 1024);
        }
        other => panic!("unexpected error: {other}"),
    }

    // The failed initialization dropped the cluster and released the slot.
    let cluster = Cluster::open(&ClusterConfig::default()).expect("reopen after failure");
    cluster.close();
}

#[test]
fn close_frees_the_power_slot() {
    let _guard = power_lock();
    let cluster = Cluster::open(&ClusterConfig::default()).expect("first open");
    cluster.close();
    let cluster = Cluster::open(&ClusterConfig::default()).expect("reopen");
    cluster.close();
}

#[test]
fn second_open_is_device_unavailable() {
    let _guard = power_lock();
    let cluster = Cluster::open(&ClusterConfig::default()).expect("open");
    let err = Cluster::open(&ClusterConfig::default()).expect_err("slot is taken");
    assert!(matches!(err, ClusterError::DeviceUnavailable { .. }));
    cluster.close();
}
