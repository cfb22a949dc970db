//! `rigel` - command-line interface for the Rigel RV8 software cluster.
//!
//! ```text
//! USAGE:
//!   rigel info                       Cluster geometry and memory tiers
//!   rigel encrypt <in> <out>         Run a file through the staged cipher
//!          --key-hex <64 chars> --iv-hex <24 chars> [--algo 0|1|2]
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use rigel_ciphers::kernel_for;
use rigel_cluster::prelude::*;
use rigel_cluster::soc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rigel", about = "Rigel RV8 software cluster CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Print cluster geometry and the memory tier map.
    Info,
    /// Encrypt (or decrypt) a file through the staged cluster pipeline.
    Encrypt {
        /// Input file.
        input: PathBuf,
        /// Output file.
        output: PathBuf,
        /// 256-bit key as 64 hex characters.
        #[arg(long)]
        key_hex: String,
        /// 96-bit IV as 24 hex characters.
        #[arg(long)]
        iv_hex: String,
        /// Cipher selector: 0 ChaCha20, 1 AES-128-CTR, 2 identity.
        #[arg(long, default_value_t = 0)]
        algo: u8,
        /// Staging chunk size in bytes.
        #[arg(long)]
        chunk: Option<usize>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Cmd::Info => cmd_info(),
        Cmd::Encrypt {
            input,
            output,
            key_hex,
            iv_hex,
            algo,
            chunk,
        } => cmd_encrypt(&input, &output, &key_hex, &iv_hex, algo, chunk)?,
    }

    Ok(())
}

fn cmd_info() {
    println!("Rigel RV8 software cluster");
    println!("Cores  : {}", soc::CLUSTER_CORES);
    println!(
        "Clock  : {} MHz (nominal)",
        soc::NOMINAL_CLOCK_HZ / 1_000_000
    );
    println!();
    println!("Memory tiers");
    for tier in soc::Tier::ALL {
        println!(
            "  {:<8} {:>9} bytes  ~{} cycles/word",
            tier.label(),
            tier.default_capacity(),
            tier.word_latency_cycles()
        );
    }
}

fn cmd_encrypt(
    input: &Path,
    output: &Path,
    key_hex: &str,
    iv_hex: &str,
    selector: u8,
    chunk: Option<usize>,
) -> Result<()> {
    let algo = CipherAlgo::from_selector(selector)
        .ok_or_else(|| anyhow::anyhow!("unknown cipher selector {selector}"))?;
    let key = parse_hex_array::<32>(key_hex)?;
    let iv = parse_hex_array::<12>(iv_hex)?;
    let data = std::fs::read(input)?;

    let cluster = Cluster::open(&ClusterConfig::default())?;
    let ext = Arc::new(ExternalMemory::new(data.len()));
    ext.write(0, &data)?;

    let params = RunParams {
        key,
        iv,
        algo,
        chunk_bytes: chunk.unwrap_or(soc::STAGE_CHUNK_BYTES),
    };
    let ctx = RunContext::initialize(cluster, params, Arc::clone(&ext))?;
    let kernel = kernel_for(algo);
    ctx.run_cipher(kernel.as_ref(), 0, data.len());

    let out = ext.snapshot(0, data.len())?;
    std::fs::write(output, &out)?;
    ctx.close();

    println!(
        "{} bytes through {} -> {}",
        data.len(),
        kernel.name(),
        output.display()
    );
    Ok(())
}

fn parse_hex_array<const N: usize>(hex: &str) -> Result<[u8; N]> {
    anyhow::ensure!(hex.is_ascii(), "expected ASCII hex");
    anyhow::ensure!(
        hex.len() == 2 * N,
        "expected {} hex characters, got {}",
        2 * N,
        hex.len()
    );
    let mut out = [0u8; N];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[2 * i..2 * i + 2], 16)
            .map_err(|_| anyhow::anyhow!("invalid hex at offset {}", 2 * i))?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_parsing_accepts_exact_lengths() {
        let key = parse_hex_array::<4>("00ff10a5").unwrap();
        assert_eq!(key, [0x00, 0xFF, 0x10, 0xA5]);
        assert!(parse_hex_array::<4>("00ff10").is_err());
        assert!(parse_hex_array::<4>("00ff10zz").is_err());
        assert!(parse_hex_array::<4>("00ff10a5aa").is_err());
    }

    #[test]
    fn encrypt_then_decrypt_restores_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let plain_path = dir.path().join("plain.bin");
        let enc_path = dir.path().join("enc.bin");
        let dec_path = dir.path().join("dec.bin");

        let plain: Vec<u8> = (0..=255u8).cycle().take(12_345).collect();
        std::fs::write(&plain_path, &plain).unwrap();

        let key_hex = "11".repeat(32);
        let iv_hex = "7e".repeat(12);
        cmd_encrypt(&plain_path, &enc_path, &key_hex, &iv_hex, 0, None).unwrap();
        let encrypted = std::fs::read(&enc_path).unwrap();
        assert_ne!(encrypted, plain);

        cmd_encrypt(&enc_path, &dec_path, &key_hex, &iv_hex, 0, None).unwrap();
        assert_eq!(std::fs::read(&dec_path).unwrap(), plain);
    }
}
