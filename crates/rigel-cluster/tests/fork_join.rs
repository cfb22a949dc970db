//! Fork-join tests
//!
//! Team dispatch, barrier synchronization, and episode bookkeeping. The
//! power slot is process-wide, so every test serializes on `power_lock`.

use rigel_cluster::prelude::*;
use rigel_cluster::Episode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

static LOCK: Mutex<()> = Mutex::new(());

fn power_lock() -> MutexGuard<'static, ()> {
    LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

#[test]
fn fork_runs_every_core_exactly_once() {
    let _guard = power_lock();
    let cluster = Cluster::open(&ClusterConfig::default()).expect("open");
    let hits = AtomicUsize::new(0);
    let mask = AtomicUsize::new(0);
    cluster.submit(|mut leader| {
        leader.fork(8, |core| {
            hits.fetch_add(1, Ordering::SeqCst);
            mask.fetch_or(1 << core.index(), Ordering::SeqCst);
            assert_eq!(core.team_size(), 8);
        });
    });
    assert_eq!(hits.load(Ordering::SeqCst), 8);
    assert_eq!(mask.load(Ordering::SeqCst), 0xFF);
    cluster.close();
}

#[test]
fn barrier_publishes_writes_across_the_team() {
    let _guard = power_lock();
    let cluster = Cluster::open(&ClusterConfig::default()).expect("open");
    let base = cluster
        .arena()
        .allocate(ScratchTier::Shared, 4)
        .expect("scratch")
        .addr
        .offset;

    cluster.submit(|mut leader| {
        leader.fork(4, |core| {
            let idx = core.index();
            let tag = 0xB0 + idx as u8;
            core.chip().bank(ScratchTier::Shared).copy_in(base + idx, &[tag]);
            core.barrier();
            // Every neighbour's tag is visible after the rendezvous.
            let neighbour = (idx + 1) % 4;
            let mut got = [0u8; 1];
            core.chip()
                .bank(ScratchTier::Shared)
                .copy_out(base + neighbour, &mut got);
            assert_eq!(got[0], 0xB0 + neighbour as u8);
        });
    });
    cluster.close();
}

#[test]
fn episode_moves_idle_to_joined() {
    let _guard = power_lock();
    let cluster = Cluster::open(&ClusterConfig::default()).expect("open");
    cluster.submit(|mut leader| {
        assert_eq!(leader.episode(), Episode::Idle);
        leader.fork(2, |_core| {});
        assert_eq!(leader.episode(), Episode::Joined);
    });
    cluster.close();
}

#[test]
fn task_may_fork_twice_in_sequence() {
    let _guard = power_lock();
    let cluster = Cluster::open(&ClusterConfig::default()).expect("open");
    let total = AtomicUsize::new(0);
    cluster.submit(|mut leader| {
        leader.fork(3, |core| {
            total.fetch_add(core.index() + 1, Ordering::SeqCst);
        });
        leader.fork(5, |core| {
            total.fetch_add(core.index() + 1, Ordering::SeqCst);
        });
    });
    // 1+2+3 from the first episode, 1+..+5 from the second.
    assert_eq!(total.load(Ordering::SeqCst), 6 + 15);
    cluster.close();
}

#[test]
#[should_panic(expected = "exceeds")]
fn oversized_fork_panics() {
    let _guard = power_lock();
    let config = ClusterConfig {
        cores: 4,
        ..ClusterConfig::default()
    };
    let cluster = Cluster::open(&config).expect("open");
    cluster.submit(|mut leader| leader.fork(5, |_core| {}));
}

#[test]
fn sequential_submits_reuse_the_cluster() {
    let _guard = power_lock();
    let cluster = Cluster::open(&ClusterConfig::default()).expect("open");
    for _ in 0..3 {
        let total = AtomicUsize::new(0);
        cluster.submit(|mut leader| {
            leader.fork(8, |core| {
                total.fetch_add(core.index() + 1, Ordering::SeqCst);
            });
        });
        assert_eq!(total.load(Ordering::SeqCst), 36);
    }
    cluster.close();
}

#[test]
fn fork_joins_under_a_timeout() {
    let _guard = power_lock();
    let (tx, rx) = std::sync::mpsc::channel();
    let handle = std::thread::spawn(move || {
        let cluster = Cluster::open(&ClusterConfig::default()).expect("open");
        cluster.submit(|mut leader| {
            leader.fork(8, |core| {
                core.barrier();
            });
        });
        cluster.close();
        tx.send(()).unwrap();
    });
    rx.recv_timeout(Duration::from_secs(5))
        .expect("fork-join did not complete");
    handle.join().unwrap();
}
