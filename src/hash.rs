// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Keyed-hash oracle over the supported backends.
//!
//! Every hash invocation in the crate goes through [`HashConfig`], so the
//! algorithm and output width are fixed once per key lifetime and threaded
//! explicitly instead of living in process-wide state. The optional 16-byte
//! key is prepended to the input for the SHA family and passed to BLAKE2b's
//! native keying interface.

use crate::error::AmssError;

/// Size of the domain-separation key in bytes.
pub const KEY_SIZE: usize = 16;

/// Largest supported hash output width in bytes.
pub const MAX_HASH_SIZE: usize = 64;

/// Supported hash algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgo {
    Sha2,
    Sha3,
    Shake128,
    Shake256,
    Blake2b,
}

impl HashAlgo {
    pub(crate) fn to_id(self) -> u8 {
        match self {
            HashAlgo::Sha2 => 0,
            HashAlgo::Sha3 => 1,
            HashAlgo::Shake128 => 2,
            HashAlgo::Shake256 => 3,
            HashAlgo::Blake2b => 4,
        }
    }

    pub(crate) fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(HashAlgo::Sha2),
            1 => Some(HashAlgo::Sha3),
            2 => Some(HashAlgo::Shake128),
            3 => Some(HashAlgo::Shake256),
            4 => Some(HashAlgo::Blake2b),
            _ => None,
        }
    }
}

/// Hash algorithm plus output width in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashConfig {
    pub algo: HashAlgo,
    pub size: usize,
}

pub const SHA2_256: HashConfig = HashConfig { algo: HashAlgo::Sha2, size: 32 };
pub const SHA3_256: HashConfig = HashConfig { algo: HashAlgo::Sha3, size: 32 };
pub const SHAKE_128: HashConfig = HashConfig { algo: HashAlgo::Shake128, size: 16 };
pub const SHAKE_256: HashConfig = HashConfig { algo: HashAlgo::Shake256, size: 32 };
pub const BLAKE2B_128: HashConfig = HashConfig { algo: HashAlgo::Blake2b, size: 16 };
pub const BLAKE2B_160: HashConfig = HashConfig { algo: HashAlgo::Blake2b, size: 20 };
pub const BLAKE2B_192: HashConfig = HashConfig { algo: HashAlgo::Blake2b, size: 24 };
pub const BLAKE2B_224: HashConfig = HashConfig { algo: HashAlgo::Blake2b, size: 28 };
pub const BLAKE2B_256: HashConfig = HashConfig { algo: HashAlgo::Blake2b, size: 32 };

/// 16-byte key used to domain-separate hash invocations.
/// Byte 0 carries the chain tag, byte 1 the in-chain position tag; the
/// remaining bytes are fixed at key setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HashKey {
    pub bytes: [u8; KEY_SIZE],
}

impl HashKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Builds a key from a slice of exactly [`KEY_SIZE`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut key = Self::default();
        key.bytes.copy_from_slice(bytes);
        return key;
    }
}

impl HashConfig {
    /// Checks that the output width is representable by the chosen backend.
    pub fn validate(&self) -> Result<(), AmssError> {
        let max = match self.algo {
            HashAlgo::Sha2 | HashAlgo::Sha3 => 32,
            HashAlgo::Shake128 | HashAlgo::Shake256 | HashAlgo::Blake2b => MAX_HASH_SIZE,
        };
        if self.size == 0 || self.size > max {
            return Err(AmssError::ConfigInvalid(format!(
                "{}-byte output not supported by {:?}",
                self.size, self.algo
            )));
        }
        Ok(())
    }

    /// Keyed hash of `input`, truncated to the configured width.
    pub fn keyhash(&self, key: Option<&HashKey>, input: &[u8]) -> Vec<u8> {
        stats::record(input.len());
        match self.algo {
            HashAlgo::Sha2 => sha2_hash(self.size, key, input),
            HashAlgo::Sha3 => sha3_hash(self.size, key, input),
            HashAlgo::Shake128 => shake128_hash(self.size, key, input),
            HashAlgo::Shake256 => shake256_hash(self.size, key, input),
            HashAlgo::Blake2b => blake2b_hash(self.size, key, input),
        }
    }

    /// Unkeyed hash of `input`.
    pub fn hash(&self, input: &[u8]) -> Vec<u8> {
        return self.keyhash(None, input);
    }

    /// Display name, e.g. `SHA2_256`.
    pub fn name(&self) -> String {
        let algo = match self.algo {
            HashAlgo::Sha2 => "SHA2",
            HashAlgo::Sha3 => "SHA3",
            HashAlgo::Shake128 => "SHAKE128",
            HashAlgo::Shake256 => "SHAKE256",
            HashAlgo::Blake2b => "BLAKE2B",
        };
        return format!("{}_{}", algo, self.size * 8);
    }
}

fn sha2_hash(size: usize, key: Option<&HashKey>, input: &[u8]) -> Vec<u8> {
    use sha2::{Digest, Sha256};

    let mut sha = Sha256::new();
    if let Some(key) = key {
        sha.update(&key.bytes);
    }
    sha.update(input);
    return sha.finalize()[..size].to_vec();
}

fn sha3_hash(size: usize, key: Option<&HashKey>, input: &[u8]) -> Vec<u8> {
    use sha3::{Digest, Sha3_256};

    let mut sha = Sha3_256::new();
    if let Some(key) = key {
        sha.update(&key.bytes);
    }
    sha.update(input);
    return sha.finalize()[..size].to_vec();
}

fn shake128_hash(size: usize, key: Option<&HashKey>, input: &[u8]) -> Vec<u8> {
    use sha3::digest::{ExtendableOutput, Update, XofReader};
    use sha3::Shake128;

    let mut shake = Shake128::default();
    if let Some(key) = key {
        shake.update(&key.bytes);
    }
    shake.update(input);
    let mut output = vec![0u8; size];
    shake.finalize_xof().read(&mut output);
    return output;
}

fn shake256_hash(size: usize, key: Option<&HashKey>, input: &[u8]) -> Vec<u8> {
    use sha3::digest::{ExtendableOutput, Update, XofReader};
    use sha3::Shake256;

    let mut shake = Shake256::default();
    if let Some(key) = key {
        shake.update(&key.bytes);
    }
    shake.update(input);
    let mut output = vec![0u8; size];
    shake.finalize_xof().read(&mut output);
    return output;
}

fn blake2b_hash(size: usize, key: Option<&HashKey>, input: &[u8]) -> Vec<u8> {
    use blake2::digest::{Update, VariableOutput};
    use blake2::VarBlake2b;

    let mut blake = match key {
        Some(key) => VarBlake2b::new_keyed(&key.bytes, size),
        None => VarBlake2b::new(size).expect("output size checked at config time"),
    };
    blake.update(input);
    let mut output = vec![0u8; size];
    blake.finalize_variable(|digest| output.copy_from_slice(digest));
    return output;
}

/// Hash-call statistics for benchmark reporting.
pub mod stats {
    use std::sync::atomic::{AtomicU64, Ordering};

    static CALLS: AtomicU64 = AtomicU64::new(0);
    static BYTES: AtomicU64 = AtomicU64::new(0);

    pub(super) fn record(input_len: usize) {
        CALLS.fetch_add(1, Ordering::Relaxed);
        BYTES.fetch_add(input_len as u64, Ordering::Relaxed);
    }

    /// Number of hash invocations since the last reset.
    pub fn calls() -> u64 {
        CALLS.load(Ordering::Relaxed)
    }

    /// Total input bytes processed since the last reset.
    pub fn bytes_processed() -> u64 {
        BYTES.load(Ordering::Relaxed)
    }

    pub fn reset() {
        CALLS.store(0, Ordering::Relaxed);
        BYTES.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [HashConfig; 9] = [
        SHA2_256, SHA3_256, SHAKE_128, SHAKE_256, BLAKE2B_128, BLAKE2B_160, BLAKE2B_192,
        BLAKE2B_224, BLAKE2B_256,
    ];

    #[test]
    fn output_has_configured_width() {
        for cfg in &ALL {
            assert_eq!(cfg.hash(b"input").len(), cfg.size);
            assert_eq!(cfg.keyhash(Some(&HashKey::default()), b"input").len(), cfg.size);
        }
    }

    #[test]
    fn digests_are_deterministic_and_algorithm_dependent() {
        for cfg in &ALL {
            assert_eq!(cfg.hash(b"input"), cfg.hash(b"input"));
            assert_ne!(cfg.hash(b"input"), cfg.hash(b"inpu%"));
        }
        assert_ne!(SHA2_256.hash(b"input"), SHA3_256.hash(b"input"));
        assert_ne!(SHA2_256.hash(b"input"), SHAKE_256.hash(b"input"));
        assert_ne!(SHA2_256.hash(b"input"), BLAKE2B_256.hash(b"input"));
    }

    #[test]
    fn sha2_matches_reference_vector() {
        let expected = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
        assert_eq!(hex::encode(SHA2_256.hash(b"abc")), expected);
    }

    #[test]
    fn key_changes_the_digest() {
        let key = HashKey::from_bytes(*b"hashkeyshashkeys");
        for cfg in &ALL {
            assert_ne!(cfg.keyhash(Some(&key), b"input"), cfg.hash(b"input"));
            assert_ne!(
                cfg.keyhash(Some(&key), b"input"),
                cfg.keyhash(Some(&HashKey::default()), b"input")
            );
        }
    }

    #[test]
    fn keyed_sha_equals_prefixed_input() {
        let key = HashKey::from_bytes([0xA5; KEY_SIZE]);
        let mut prefixed = key.bytes.to_vec();
        prefixed.extend_from_slice(b"input");
        assert_eq!(SHA2_256.keyhash(Some(&key), b"input"), SHA2_256.hash(&prefixed));
        assert_eq!(SHAKE_128.keyhash(Some(&key), b"input"), SHAKE_128.hash(&prefixed));
    }

    #[test]
    fn shake_width_is_a_truncation() {
        let wide = HashConfig { algo: HashAlgo::Shake128, size: 32 };
        let narrow = SHAKE_128;
        assert_eq!(wide.hash(b"input")[..16], narrow.hash(b"input")[..]);
    }

    #[test]
    fn oversized_widths_rejected() {
        assert!(HashConfig { algo: HashAlgo::Sha2, size: 33 }.validate().is_err());
        assert!(HashConfig { algo: HashAlgo::Blake2b, size: 65 }.validate().is_err());
        assert!(HashConfig { algo: HashAlgo::Shake256, size: 0 }.validate().is_err());
        assert!(HashConfig { algo: HashAlgo::Blake2b, size: 64 }.validate().is_ok());
    }

    #[test]
    fn stats_count_calls_and_bytes() {
        let calls = stats::calls();
        let bytes = stats::bytes_processed();
        SHA2_256.hash(b"1234");
        SHA2_256.hash(b"12345678");
        assert!(stats::calls() >= calls + 2);
        assert!(stats::bytes_processed() >= bytes + 12);
    }
}
