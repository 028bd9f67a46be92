// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Command-line driver: key generation, signing, verification, benchmarking.
//!
//! Key persistence is out of scope, so `sign` and `verify` derive all state
//! deterministically from an explicit seed.

use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use amss::hash::{self, stats, HashConfig, KEY_SIZE};
use amss::wots::SEED_SIZE;
use amss::{Amss, AmssConfig, PubKey, Signature, SEED_LEN};

#[derive(Parser)]
#[command(name = "amss", about = "Forward-secure hash-based signatures")]
struct Cli {
    /// Print debug-level log output.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a keypair and print the packed public key.
    Keygen {
        #[command(flatten)]
        params: Params,
        /// 48-byte seed as hex; drawn from the OS when omitted.
        #[arg(long)]
        seed: Option<String>,
    },
    /// Sign a message with a seed-derived key and print the packed signature.
    Sign {
        #[command(flatten)]
        params: Params,
        /// 48-byte seed as hex.
        #[arg(long)]
        seed: String,
        #[arg(long)]
        message: String,
        /// Burn this many leaves before signing.
        #[arg(long, default_value_t = 0)]
        skip: u32,
    },
    /// Verify a packed signature against a packed public key.
    Verify {
        /// Packed public key as hex.
        #[arg(long)]
        pubkey: String,
        #[arg(long)]
        message: String,
        /// Packed signature as hex.
        #[arg(long)]
        signature: String,
    },
    /// Measure generate/sign/verify timings and hash-call counts over a full key.
    Bench {
        #[command(flatten)]
        params: Params,
    },
}

#[derive(Args)]
struct Params {
    /// Hash backend: sha2-256, sha3-256, shake-128, shake-256, blake2b-{128,160,192,224,256}.
    #[arg(long, default_value = "sha2-256")]
    hash: String,

    /// Winternitz code base w.
    #[arg(long, default_value_t = 16)]
    base: u16,

    /// Merkle tree height h; the key signs 2^h messages.
    #[arg(long, default_value_t = 10)]
    height: usize,
}

impl Params {
    fn config(&self) -> Result<AmssConfig> {
        let hash = parse_hash(&self.hash)?;
        return AmssConfig::new(hash, self.base, self.height).map_err(Into::into);
    }
}

fn parse_hash(name: &str) -> Result<HashConfig> {
    let cfg = match name.to_ascii_lowercase().as_str() {
        "sha2-256" => hash::SHA2_256,
        "sha3-256" => hash::SHA3_256,
        "shake-128" => hash::SHAKE_128,
        "shake-256" => hash::SHAKE_256,
        "blake2b-128" => hash::BLAKE2B_128,
        "blake2b-160" => hash::BLAKE2B_160,
        "blake2b-192" => hash::BLAKE2B_192,
        "blake2b-224" => hash::BLAKE2B_224,
        "blake2b-256" => hash::BLAKE2B_256,
        _ => bail!("unknown hash '{}'", name),
    };
    Ok(cfg)
}

fn parse_seed(hex_seed: Option<&str>) -> Result<[u8; SEED_LEN]> {
    let mut seed = [0u8; SEED_LEN];
    match hex_seed {
        Some(s) => {
            let bytes = hex::decode(s).context("seed is not valid hex")?;
            if bytes.len() != SEED_LEN {
                bail!("seed must be {} bytes, got {}", SEED_LEN, bytes.len());
            }
            seed.copy_from_slice(&bytes);
        }
        None => getrandom::getrandom(&mut seed).map_err(|e| anyhow!("no OS entropy: {}", e))?,
    }
    Ok(seed)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).with_writer(std::io::stderr).init();

    match cli.command {
        Command::Keygen { params, seed } => keygen(&params, seed.as_deref()),
        Command::Sign { params, seed, message, skip } => sign(&params, &seed, &message, skip),
        Command::Verify { pubkey, message, signature } => verify(&pubkey, &message, &signature),
        Command::Bench { params } => bench(&params),
    }
}

fn print_sizes(config: &AmssConfig) {
    println!(
        "sizes:  pk={} B  sk={} B  sig={} B ({} chain hashes + {} path hashes)",
        config.pubkey_encoded_len(),
        SEED_SIZE + KEY_SIZE,
        config.sig_encoded_len(),
        config.wots.num_chains(),
        config.tree.height,
    );
}

fn keygen(params: &Params, seed: Option<&str>) -> Result<()> {
    let config = params.config()?;
    let seed = parse_seed(seed)?;
    let mut amss = Amss::new(config)?;
    let pubkey = amss.generate(&seed);
    println!("scheme: {} w={} h={}", config.wots.hash.name(), params.base, params.height);
    println!("seed:   {}", hex::encode(&seed[..]));
    println!("pubkey: {}", hex::encode(pubkey.to_bytes()));
    print_sizes(&config);
    Ok(())
}

fn sign(params: &Params, seed: &str, message: &str, skip: u32) -> Result<()> {
    let config = params.config()?;
    let seed = parse_seed(Some(seed))?;
    let mut amss = Amss::new(config)?;
    let pubkey = amss.generate(&seed);
    let digest = config.wots.hash.hash(message.as_bytes());
    for _ in 0..skip {
        amss.sign(&digest)?;
    }
    let sig = amss.sign(&digest)?;
    println!("leaf:      {}", sig.leaf_idx());
    println!("remaining: {}", amss.remaining());
    println!("pubkey:    {}", hex::encode(pubkey.to_bytes()));
    println!("signature: {}", hex::encode(sig.to_bytes()));
    Ok(())
}

fn verify(pubkey_hex: &str, message: &str, sig_hex: &str) -> Result<()> {
    let pubkey_bytes = hex::decode(pubkey_hex).context("public key is not valid hex")?;
    let pubkey = PubKey::from_bytes(&pubkey_bytes)?;
    let sig_bytes = hex::decode(sig_hex).context("signature is not valid hex")?;
    let sig = Signature::from_bytes(&pubkey.config, &sig_bytes)?;
    let digest = pubkey.config.wots.hash.hash(message.as_bytes());
    if !sig.verify(&pubkey, &digest) {
        bail!("signature invalid");
    }
    println!("signature valid (leaf {})", sig.leaf_idx());
    Ok(())
}

/// Wall-clock profile of one operation across repeated calls.
struct Profile {
    samples: u32,
    total: Duration,
    min: Duration,
    max: Duration,
}

impl Profile {
    fn new() -> Self {
        Self { samples: 0, total: Duration::ZERO, min: Duration::MAX, max: Duration::ZERO }
    }

    fn record(&mut self, dt: Duration) {
        self.samples += 1;
        self.total += dt;
        self.min = self.min.min(dt);
        self.max = self.max.max(dt);
    }

    fn print(&self, name: &str) {
        if self.samples == 0 {
            println!("{:8} no samples", name);
            return;
        }
        println!(
            "{:8} calls={}  min/avg/max = {}/{}/{} us  total = {} us",
            name,
            self.samples,
            self.min.as_micros(),
            (self.total / self.samples).as_micros(),
            self.max.as_micros(),
            self.total.as_micros(),
        );
    }
}

fn bench(params: &Params) -> Result<()> {
    let config = params.config()?;
    let mut amss = Amss::new(config)?;
    let mut seed = [0u8; SEED_LEN];
    seed[0] = b'x';

    println!("benchmark: {} w={} h={}", config.wots.hash.name(), params.base, params.height);
    print_sizes(&config);

    stats::reset();
    let start = Instant::now();
    let pubkey = amss.generate(&seed);
    println!(
        "generate  {} us  ({} hash calls, {} B processed)",
        start.elapsed().as_micros(),
        stats::calls(),
        stats::bytes_processed(),
    );

    let mut prof_sign = Profile::new();
    let mut prof_verify = Profile::new();
    stats::reset();
    for idx in 0..config.tree.num_leaves() {
        let digest = config.wots.hash.hash(&(idx as u32).to_le_bytes());

        let start = Instant::now();
        let sig = amss.sign(&digest)?;
        prof_sign.record(start.elapsed());

        let start = Instant::now();
        let is_valid = sig.verify(&pubkey, &digest);
        prof_verify.record(start.elapsed());
        if !is_valid {
            bail!("signature {} failed to verify", idx);
        }
    }
    println!(
        "sign+verify  {} hash calls, {} B processed",
        stats::calls(),
        stats::bytes_processed(),
    );
    prof_sign.print("sign");
    prof_verify.print("verify");
    Ok(())
}
