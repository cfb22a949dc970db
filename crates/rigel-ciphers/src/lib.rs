//! Stream-cipher kernels for the Rigel staged pipeline.
//!
//! `rigel-cluster` stages chunks through scratch and runs the team; this
//! crate supplies the transforms that run on each staged chunk. Every
//! kernel builds its cipher from the run key and IV and seeks the
//! keystream to the chunk's offset, so chunks may be processed on any
//! core in any order and still match one sequential pass.
//!
//! Selector numbering follows [`CipherAlgo`]: 0 is ChaCha20 (the
//! reference workload), 1 is AES-128-CTR, 2 is the identity pass-through.

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

use chacha20::cipher::generic_array::GenericArray;
use chacha20::cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};
use chacha20::ChaCha20;
use rigel_cluster::{CipherAlgo, CipherKernel, IdentityKernel};
use tracing::debug;

type Aes128Ctr = ctr::Ctr32LE<aes::Aes128>;

/// ChaCha20 keystream kernel (selector 0).
#[derive(Debug, Clone, Copy, Default)]
pub struct ChaCha20Kernel;

impl CipherKernel for ChaCha20Kernel {
    fn apply(&self, key: &[u8; 32], iv: &[u8; 12], stream_offset: u64, chunk: &mut [u8]) {
        let mut cipher = ChaCha20::new(
            GenericArray::from_slice(key),
            GenericArray::from_slice(iv),
        );
        cipher.seek(stream_offset);
        cipher.apply_keystream(chunk);
    }

    fn name(&self) -> &'static str {
        "chacha20"
    }
}

/// AES-128 counter-mode kernel (selector 1).
///
/// Keyed from the first 16 bytes of the 32-byte run key; the 12-byte IV
/// fills the leading bytes of the 16-byte counter block.
#[derive(Debug, Clone, Copy, Default)]
pub struct Aes128CtrKernel;

impl CipherKernel for Aes128CtrKernel {
    fn apply(&self, key: &[u8; 32], iv: &[u8; 12], stream_offset: u64, chunk: &mut [u8]) {
        let mut block_iv = [0u8; 16];
        block_iv[..12].copy_from_slice(iv);
        let mut cipher = Aes128Ctr::new(
            GenericArray::from_slice(&key[..16]),
            GenericArray::from_slice(&block_iv),
        );
        cipher.seek(stream_offset);
        cipher.apply_keystream(chunk);
    }

    fn name(&self) -> &'static str {
        "aes128ctr"
    }
}

/// The kernel behind a selector.
#[must_use]
pub fn kernel_for(algo: CipherAlgo) -> Box<dyn CipherKernel> {
    debug!(selector = algo.selector(), "cipher kernel selected");
    match algo {
        CipherAlgo::ChaCha20 => Box::new(ChaCha20Kernel),
        CipherAlgo::Aes128Ctr => Box::new(Aes128CtrKernel),
        CipherAlgo::Identity => Box::new(IdentityKernel),
    }
}
