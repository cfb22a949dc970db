//! Cluster cipher round-trips
//!
//! The staged pipeline splits a run across cores and chunks; these tests
//! pin down that the result is byte-identical to one sequential pass of
//! the same cipher, and that a second run decrypts back to the input.
//! The power slot is process-wide, so tests serialize on `power_lock`.

use rigel_ciphers::kernel_for;
use rigel_cluster::prelude::*;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

static LOCK: Mutex<()> = Mutex::new(());

fn power_lock() -> MutexGuard<'static, ()> {
    LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

const KEY: [u8; 32] = [0x11; 32];
const IV: [u8; 12] = [0x7E; 12];

/// One full open / initialize / run / close cycle; returns the device
/// contents after the run.
fn cluster_pass(algo: CipherAlgo, payload: &[u8], chunk_bytes: usize) -> Vec<u8> {
    let cluster = Cluster::open(&ClusterConfig::default()).expect("open");
    let ext = Arc::new(ExternalMemory::new(payload.len()));
    ext.write(0, payload).unwrap();

    let params = RunParams {
        key: KEY,
        iv: IV,
        algo,
        chunk_bytes,
    };
    let ctx = RunContext::initialize(cluster, params, Arc::clone(&ext)).expect("initialize");
    let kernel = kernel_for(algo);
    ctx.run_cipher(kernel.as_ref(), 0, payload.len());

    let out = ext.snapshot(0, payload.len()).unwrap().to_vec();
    ctx.close();
    out
}

fn serial_pass(algo: CipherAlgo, payload: &[u8]) -> Vec<u8> {
    let mut buf = payload.to_vec();
    kernel_for(algo).apply(&KEY, &IV, 0, &mut buf);
    buf
}

fn assert_cluster_matches_serial(algo: CipherAlgo) {
    let _guard = power_lock();
    let plain: Vec<u8> = (0..=255u8).cycle().take(20_000).collect();

    // Chunk size off any cipher block size, so per-chunk seeks land
    // mid-block on most cores.
    let encrypted = cluster_pass(algo, &plain, 768);
    assert_eq!(encrypted, serial_pass(algo, &plain));
    assert_ne!(encrypted, plain);

    let decrypted = cluster_pass(algo, &encrypted, 768);
    assert_eq!(decrypted, plain);
}

#[test]
fn chacha20_matches_one_sequential_pass() {
    assert_cluster_matches_serial(CipherAlgo::ChaCha20);
}

#[test]
fn aes128ctr_matches_one_sequential_pass() {
    assert_cluster_matches_serial(CipherAlgo::Aes128Ctr);
}

#[test]
fn identity_selector_stages_without_transforming() {
    let _guard = power_lock();
    let plain: Vec<u8> = (0..=255u8).cycle().take(5_000).collect();
    let out = cluster_pass(CipherAlgo::Identity, &plain, 512);
    assert_eq!(out, plain);
}
