// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Forward-secure many-time signature scheme: one Winternitz keypair per
//! Merkle leaf, a secret seed that is destructively evolved after every
//! signature, and incremental growth of the next bottom subtree so that
//! per-signature work stays flat across the key's lifetime.

use subtle::ConstantTimeEq;
use tracing::{debug, warn};
use zeroize::Zeroize;

use crate::error::AmssError;
use crate::hash::{HashAlgo, HashConfig, HashKey, KEY_SIZE};
use crate::merkle::{MerkleConfig, Path, Tree};
use crate::wots::{self, Wots, WotsConfig, SEED_SIZE};

/// Length of the key-generation seed: 32 secret bytes plus the 16-byte hash key.
pub const SEED_LEN: usize = SEED_SIZE + KEY_SIZE;

/// Combined parameter set for the scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmssConfig {
    pub wots: WotsConfig,
    pub tree: MerkleConfig,
}

impl AmssConfig {
    /// Validates and derives the full parameter set.
    pub fn new(hash: HashConfig, code_base: u16, height: usize) -> Result<Self, AmssError> {
        Ok(Self { wots: WotsConfig::new(hash, code_base)?, tree: MerkleConfig::new(hash, height)? })
    }

    /// Top-subtree height of the fractal split.
    pub fn top_height(&self) -> usize {
        return self.tree.height / 2;
    }

    /// Byte length of a packed signature.
    pub fn sig_encoded_len(&self) -> usize {
        return 2 + self.wots.sig_len() + self.tree.height * self.tree.hash.size;
    }

    /// Byte length of a packed public key.
    pub fn pubkey_encoded_len(&self) -> usize {
        return 4 + KEY_SIZE + self.tree.hash.size;
    }

    fn descriptor(&self) -> [u8; 4] {
        [
            self.wots.hash.algo.to_id(),
            self.wots.hash.size as u8,
            self.wots.code_base.trailing_zeros() as u8,
            self.tree.height as u8,
        ]
    }

    fn from_descriptor(desc: &[u8]) -> Result<Self, AmssError> {
        let algo = HashAlgo::from_id(desc[0]).ok_or(AmssError::Malformed("public key"))?;
        if desc[2] > 8 {
            return Err(AmssError::Malformed("public key"));
        }
        let hash = HashConfig { algo, size: usize::from(desc[1]) };
        return Self::new(hash, 1u16 << desc[2], usize::from(desc[3]));
    }
}

/// Public key: parameter set, hash key, and the Merkle root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubKey {
    pub config: AmssConfig,
    pub hashkey: HashKey,
    pub root: Vec<u8>,
}

impl PubKey {
    /// Packs the key as descriptor ‖ hashkey ‖ root.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.config.pubkey_encoded_len());
        out.extend_from_slice(&self.config.descriptor());
        out.extend_from_slice(&self.hashkey.bytes);
        out.extend_from_slice(&self.root);
        return out;
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AmssError> {
        if bytes.len() < 4 + KEY_SIZE {
            return Err(AmssError::Malformed("public key"));
        }
        let config = AmssConfig::from_descriptor(&bytes[..4])?;
        if bytes.len() != config.pubkey_encoded_len() {
            return Err(AmssError::Malformed("public key"));
        }
        Ok(Self {
            config,
            hashkey: HashKey::from_slice(&bytes[4..4 + KEY_SIZE]),
            root: bytes[4 + KEY_SIZE..].to_vec(),
        })
    }
}

/// Signature: the revealed WOTS chain values plus the authentication path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub chains: Vec<u8>,
    pub path: Path,
}

impl Signature {
    /// Allocates an empty signature for the given parameters.
    pub fn new(config: &AmssConfig) -> Self {
        Self { chains: vec![0; config.wots.sig_len()], path: Path::new(&config.tree) }
    }

    /// Leaf index this signature consumed.
    pub fn leaf_idx(&self) -> u16 {
        return self.path.leaf_idx;
    }

    /// Packs the signature as leaf_idx (LE) ‖ chain values ‖ path hashes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.chains.len() + self.path.hashes.len());
        out.extend_from_slice(&self.path.leaf_idx.to_le_bytes());
        out.extend_from_slice(&self.chains);
        out.extend_from_slice(&self.path.hashes);
        return out;
    }

    pub fn from_bytes(config: &AmssConfig, bytes: &[u8]) -> Result<Self, AmssError> {
        if bytes.len() != config.sig_encoded_len() {
            return Err(AmssError::Malformed("signature"));
        }
        let leaf_idx = u16::from_le_bytes([bytes[0], bytes[1]]);
        let split = 2 + config.wots.sig_len();
        Ok(Self {
            chains: bytes[2..split].to_vec(),
            path: Path { leaf_idx, hashes: bytes[split..].to_vec() },
        })
    }

    /// Verifies the signature against `pubkey` for the given message digest.
    pub fn verify(&self, pubkey: &PubKey, msg_digest: &[u8]) -> bool {
        let config = &pubkey.config;
        if msg_digest.len() != config.wots.hash.size
            || self.chains.len() != config.wots.sig_len()
            || self.path.hashes.len() != config.tree.height * config.tree.hash.size
            || usize::from(self.path.leaf_idx) >= config.tree.num_leaves()
        {
            return false;
        }
        let wots_root = wots::root_from_sig(&config.wots, &pubkey.hashkey, msg_digest, &self.chains);
        let tree_root = self.path.root_from_leaf(&config.tree.hash, &wots_root);
        let is_valid = tree_root.ct_eq(&pubkey.root).unwrap_u8() == 1;
        if !is_valid {
            warn!(leaf_idx = self.path.leaf_idx, "signature rejected");
        }
        return is_valid;
    }
}

/// Signing state. Signing is not reentrant: every call consumes a leaf and
/// destructively evolves the secret, so an instance must have a single owner.
#[derive(Debug, Clone)]
pub struct Amss {
    pub config: AmssConfig,
    secret_key: [u8; SEED_SIZE],
    hashkey: HashKey,
    tree: Tree,
    wots: Wots,
}

impl Amss {
    /// Allocates internal buffers; no key material yet.
    pub fn new(config: AmssConfig) -> Result<Self, AmssError> {
        Ok(Self {
            config,
            secret_key: [0; SEED_SIZE],
            hashkey: HashKey::default(),
            tree: Tree::new(config.tree, config.top_height())?,
            wots: Wots::new(config.wots),
        })
    }

    /// Deterministic one-shot key generation from a 48-byte seed. Builds the
    /// full Merkle tree once; the per-leaf seeds are reproduced on demand
    /// while signing.
    pub fn generate(&mut self, seed: &[u8; SEED_LEN]) -> PubKey {
        self.secret_key.copy_from_slice(&seed[..SEED_SIZE]);
        self.hashkey = HashKey::from_slice(&seed[SEED_SIZE..]);
        self.tree.reset();

        let mut wots_seed = self.secret_key;
        for _ in 0..self.config.tree.num_leaves() {
            self.wots.import_seckey(&wots_seed, self.hashkey);
            self.wots.generate_pubkey();
            let leaf = self.wots.root.clone();
            self.tree.add(&leaf);
            next_key(&mut wots_seed, &self.hashkey, &self.config.wots.hash);
        }
        wots_seed.zeroize();

        debug!(
            leaves = self.config.tree.num_leaves(),
            root = %hex::encode(&self.tree.root()[..8]),
            "key generation complete"
        );
        return self.export_pubkey();
    }

    /// Current public key.
    pub fn export_pubkey(&self) -> PubKey {
        PubKey { config: self.config, hashkey: self.hashkey, root: self.tree.root().to_vec() }
    }

    /// Number of unused signature slots.
    pub fn remaining(&self) -> usize {
        if !self.tree.is_full {
            return 0;
        }
        return self.config.tree.num_leaves() - self.tree.leaf_idx;
    }

    /// Signs a message digest, consuming one leaf.
    ///
    /// The secret is evolved before the signature is assembled, so an aborted
    /// call burns its slot rather than risking one-time key reuse.
    pub fn sign(&mut self, msg_digest: &[u8]) -> Result<Signature, AmssError> {
        assert!(self.tree.is_full, "sign called before key generation");
        assert_eq!(msg_digest.len(), self.config.wots.hash.size, "digest width does not match the hash config");
        let num_leaves = self.config.tree.num_leaves();
        if self.tree.leaf_idx >= num_leaves {
            return Err(AmssError::Exhausted(num_leaves as u64));
        }
        let leaf_idx = self.tree.leaf_idx;
        let mut sig = Signature::new(&self.config);

        // one-time signature under the current leaf's key
        self.wots.import_seckey(&self.secret_key, self.hashkey);
        self.wots.sign(msg_digest, &mut sig.chains);
        next_key(&mut self.secret_key, &self.hashkey, &self.config.wots.hash);

        // leaf hash for the path generator; recomputing the WOTS public key
        // is only needed for even leaves past the block start
        let cursor = self.tree.exist().leaf_idx;
        let leaf_hash = if leaf_idx & 1 == 0 {
            if cursor == 0 {
                self.tree.exist().left_node(0).to_vec()
            } else {
                self.wots.root_from_sig(msg_digest, &sig.chains)
            }
        } else {
            self.tree.exist().right_node(cursor - 1).to_vec()
        };
        self.tree.generate_path(&leaf_hash, &mut sig.path);
        debug!(leaf_idx, leaf = %hex::encode(&leaf_hash[..8]), "leaf signed");

        // amortized construction of the next bottom subtree
        let grow_idx = self.tree.grow_leaf_idx();
        if grow_idx != 0 {
            let mut grow_key = self.secret_key;
            for _ in self.tree.leaf_idx..grow_idx {
                next_key(&mut grow_key, &self.hashkey, &self.config.wots.hash);
            }
            self.wots.import_seckey(&grow_key, self.hashkey);
            grow_key.zeroize();
            self.wots.generate_pubkey();
            let leaf = self.wots.root.clone();
            self.tree.grow(&leaf);
        }

        return Ok(sig);
    }
}

impl Drop for Amss {
    fn drop(&mut self) {
        self.secret_key.zeroize();
    }
}

/// Forward-secure seed step: the first hash-width bytes are replaced by a
/// keyed hash of the full 32-byte value and the preimage is discarded.
fn next_key(secret: &mut [u8; SEED_SIZE], hashkey: &HashKey, cfg: &HashConfig) {
    let digest = cfg.keyhash(Some(hashkey), &secret[..]);
    secret[..digest.len()].copy_from_slice(&digest);
}
