// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Winternitz One-Time Signature (WOTS) engine.
//!
//! A signature reveals, per hash chain, a prefix whose length is one digit of
//! the base-w message encoding (plus a two-digit checksum); the public key is
//! a keyed hash over all chain endpoints. Chains and chain positions are
//! domain-separated through the hash key: byte 0 carries the chain index,
//! byte 1 the position within the chain.

use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::error::AmssError;
use crate::hash::{HashConfig, HashKey};

/// Size of the WOTS secret seed in bytes.
pub const SEED_SIZE: usize = 32;

/// Number of checksum digits appended to the code digits.
pub const CSUM_DIGITS: usize = 2;

/// Chain-tag value reserved for seed expansion. No chain may use this index,
/// which bounds the chain count to 255.
const SEED_TAG: u8 = 0xFF;

/// WOTS parameter set: hash choice plus the code base w.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WotsConfig {
    pub hash: HashConfig,
    pub code_base: u16,
    log2w: usize,
    code_digits: usize,
    csum_base: u16,
}

impl WotsConfig {
    /// Builds and validates a parameter set. Only (hash size, code base)
    /// pairs with a defined checksum base are accepted.
    pub fn new(hash: HashConfig, code_base: u16) -> Result<Self, AmssError> {
        hash.validate()?;
        let log2w = match code_base {
            4 => 2,
            16 => 4,
            32 => 5,
            256 => 8,
            _ => {
                return Err(AmssError::ConfigInvalid(format!(
                    "code base {} not supported",
                    code_base
                )))
            }
        };
        let csum_base = csum_base_for(hash.size, code_base)?;
        let code_digits = (8 * hash.size + log2w - 1) / log2w;
        if code_digits + CSUM_DIGITS > usize::from(SEED_TAG) {
            return Err(AmssError::ConfigInvalid(format!(
                "{} chains exceed the chain-tag range",
                code_digits + CSUM_DIGITS
            )));
        }
        Ok(Self { hash, code_base, log2w, code_digits, csum_base })
    }

    /// Number of hash chains, i.e. number of hashes in a signature.
    pub fn num_chains(&self) -> usize {
        return self.code_digits + CSUM_DIGITS;
    }

    /// Number of base-w digits covering the message digest.
    pub fn code_digits(&self) -> usize {
        return self.code_digits;
    }

    /// Radix of the two checksum digits.
    pub fn csum_base(&self) -> u16 {
        return self.csum_base;
    }

    /// Byte length of the packed chain values in a signature.
    pub fn sig_len(&self) -> usize {
        return self.num_chains() * self.hash.size;
    }

    /// Chain length (number of positions) of chain `idx`.
    fn chain_len(&self, idx: usize) -> usize {
        if idx < self.code_digits {
            self.code_base as usize
        } else {
            self.csum_base as usize
        }
    }

    /// Splits a message digest into code digits plus the two checksum digits,
    /// most significant first.
    pub fn encode(&self, msg_digest: &[u8]) -> Vec<u8> {
        assert_eq!(msg_digest.len(), self.hash.size, "digest width does not match the hash config");
        let mut digits = base_w(msg_digest, self.log2w, self.code_digits);
        let csum: u32 = digits.iter().map(|&d| self.code_base as u32 - 1 - u32::from(d)).sum();
        let base = u32::from(self.csum_base);
        debug_assert!(csum < base * base);
        digits.push((csum / base) as u8);
        digits.push((csum % base) as u8);
        return digits;
    }
}

/// Checksum radix per (hash size, code base); each entry satisfies
/// ceil(sqrt(code_digits * (w - 1))), so the maximum checksum fits in two
/// digits and the signing work is balanced across the chains.
fn csum_base_for(size: usize, code_base: u16) -> Result<u16, AmssError> {
    let base = match (size, code_base) {
        (16, 4) => 14,
        (16, 16) => 22,
        (16, 256) => 64,
        (20, 4) => 16,
        (20, 16) => 25,
        (20, 32) => 32,
        (20, 256) => 72,
        (32, 4) => 20,
        (32, 16) => 31,
        (32, 256) => 91,
        _ => {
            return Err(AmssError::ConfigInvalid(format!(
                "no checksum base for {}-byte hashes with code base {}",
                size, code_base
            )))
        }
    };
    Ok(base)
}

/// Converts a byte string into `len` base-2^log2w digits, most significant first.
fn base_w(bytes: &[u8], log2w: usize, len: usize) -> Vec<u8> {
    let mut digits = Vec::with_capacity(len + CSUM_DIGITS);
    let mut input = bytes.iter();
    let mut acc: u32 = 0;
    let mut bits = 0;
    for _ in 0..len {
        while bits < log2w {
            acc = (acc << 8) | u32::from(input.next().copied().unwrap_or(0));
            bits += 8;
        }
        bits -= log2w;
        digits.push(((acc >> bits) & ((1 << log2w) - 1)) as u8);
    }
    return digits;
}

/// Applies `steps` chain steps to `value`, starting at position `start` of
/// chain `idx`.
fn chain(
    config: &WotsConfig,
    hashkey: &HashKey,
    idx: usize,
    start: usize,
    steps: usize,
    value: &[u8],
) -> Vec<u8> {
    debug_assert!(start + steps < config.chain_len(idx));
    let mut key = *hashkey;
    key.bytes[0] = idx as u8;
    let mut node = value.to_vec();
    for pos in start..start + steps {
        key.bytes[1] = pos as u8;
        node = config.hash.keyhash(Some(&key), &node);
    }
    return node;
}

/// Recovers the public root implied by a signature: every chain is run from
/// its revealed position to its end and the endpoints are compressed under
/// the hash key.
pub fn root_from_sig(
    config: &WotsConfig,
    hashkey: &HashKey,
    msg_digest: &[u8],
    sig: &[u8],
) -> Vec<u8> {
    assert_eq!(sig.len(), config.sig_len(), "signature length does not match the parameter set");
    let n = config.hash.size;
    let digits = config.encode(msg_digest);
    let mut endpoints = vec![0u8; config.sig_len()];
    for (idx, &digit) in digits.iter().enumerate() {
        let steps = config.chain_len(idx) - 1 - digit as usize;
        let end = chain(config, hashkey, idx, digit as usize, steps, &sig[idx * n..(idx + 1) * n]);
        endpoints[idx * n..(idx + 1) * n].copy_from_slice(&end);
    }
    return config.hash.keyhash(Some(hashkey), &endpoints);
}

/// WOTS key state. Acts as both a keypair and a verification scratchpad: a
/// secret-key import enables signing, a public-key import enables verifying.
#[derive(Debug, Clone)]
pub struct Wots {
    pub config: WotsConfig,
    seed: [u8; SEED_SIZE],
    pub hashkey: HashKey,
    pub root: Vec<u8>,
    has_seckey: bool,
    has_pubkey: bool,
}

impl Wots {
    /// Creates an empty state for the given parameters.
    pub fn new(config: WotsConfig) -> Self {
        Self {
            config,
            seed: [0; SEED_SIZE],
            hashkey: HashKey::default(),
            root: vec![0; config.hash.size],
            has_seckey: false,
            has_pubkey: false,
        }
    }

    /// Installs a signing seed; any previously computed public root is dropped.
    pub fn import_seckey(&mut self, seed: &[u8; SEED_SIZE], hashkey: HashKey) {
        self.seed.copy_from_slice(seed);
        self.hashkey = hashkey;
        self.has_seckey = true;
        self.has_pubkey = false;
    }

    /// Installs a public root for verification.
    pub fn import_pubkey(&mut self, root: &[u8], hashkey: HashKey) {
        assert_eq!(root.len(), self.config.hash.size, "root width does not match the hash config");
        self.root.copy_from_slice(root);
        self.hashkey = hashkey;
        self.has_pubkey = true;
        self.has_seckey = false;
    }

    /// Computes the public root by running every chain to its end.
    pub fn generate_pubkey(&mut self) {
        assert!(self.has_seckey, "no secret key imported");
        let n = self.config.hash.size;
        let mut heads = self.chain_heads();
        let mut endpoints = vec![0u8; self.config.sig_len()];
        for idx in 0..self.config.num_chains() {
            let steps = self.config.chain_len(idx) - 1;
            let end = chain(&self.config, &self.hashkey, idx, 0, steps, &heads[idx * n..(idx + 1) * n]);
            endpoints[idx * n..(idx + 1) * n].copy_from_slice(&end);
        }
        heads.zeroize();
        self.root = self.config.hash.keyhash(Some(&self.hashkey), &endpoints);
        self.has_pubkey = true;
    }

    /// Signs a message digest, writing `sig_len()` bytes of chain values.
    pub fn sign(&self, msg_digest: &[u8], sig_out: &mut [u8]) {
        assert!(self.has_seckey, "no secret key imported");
        assert_eq!(sig_out.len(), self.config.sig_len(), "signature buffer has the wrong length");
        let n = self.config.hash.size;
        let digits = self.config.encode(msg_digest);
        let mut heads = self.chain_heads();
        for (idx, &digit) in digits.iter().enumerate() {
            let value = chain(
                &self.config,
                &self.hashkey,
                idx,
                0,
                digit as usize,
                &heads[idx * n..(idx + 1) * n],
            );
            sig_out[idx * n..(idx + 1) * n].copy_from_slice(&value);
        }
        heads.zeroize();
    }

    /// Recovers the public root implied by a signature over `msg_digest`.
    pub fn root_from_sig(&self, msg_digest: &[u8], sig: &[u8]) -> Vec<u8> {
        return root_from_sig(&self.config, &self.hashkey, msg_digest, sig);
    }

    /// Verifies a signature against the stored public root.
    pub fn verify(&self, msg_digest: &[u8], sig: &[u8]) -> bool {
        assert!(self.has_pubkey, "no public key imported");
        let recovered = self.root_from_sig(msg_digest, sig);
        return recovered.ct_eq(&self.root).unwrap_u8() == 1;
    }

    /// Expands the seed into all chain heads, packed one hash per chain.
    /// Head i+1 is derived from head i XOR seed, so a single stored seed
    /// yields independent heads.
    fn chain_heads(&self) -> Vec<u8> {
        let n = self.config.hash.size;
        let mut key = self.hashkey;
        key.bytes[0] = SEED_TAG;
        let mut heads = vec![0u8; self.config.sig_len()];
        let mut head = self.config.hash.keyhash(Some(&key), &self.seed);
        heads[..n].copy_from_slice(&head);
        for idx in 1..self.config.num_chains() {
            let mut preimage = head;
            for (byte, seed_byte) in preimage.iter_mut().zip(self.seed.iter()) {
                *byte ^= seed_byte;
            }
            head = self.config.hash.keyhash(Some(&key), &preimage);
            preimage.zeroize();
            heads[idx * n..(idx + 1) * n].copy_from_slice(&head);
        }
        return heads;
    }
}

impl Drop for Wots {
    fn drop(&mut self) {
        self.seed.zeroize();
    }
}
