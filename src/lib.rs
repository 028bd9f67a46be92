// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Forward-secure many-time signatures built from hash primitives alone:
//! Winternitz one-time chains composed under a fractal Merkle tree whose
//! single root authenticates every one-time key. The secret state advances
//! through a one-way step after each signature, so compromising a signer
//! never exposes keys for already-used leaves.
//!
//! Memory stays bounded independently of the key's capacity: only the top
//! subtree and two rotating bottom subtrees are resident, and each signature
//! performs one unit of construction work for the next block of leaves.

pub mod amss;
pub mod error;
pub mod hash;
pub mod merkle;
pub mod wots;

pub use crate::amss::{Amss, AmssConfig, PubKey, Signature, SEED_LEN};
pub use crate::error::AmssError;
pub use crate::hash::{HashAlgo, HashConfig, HashKey};
pub use crate::merkle::{MerkleConfig, Path, Tree};
pub use crate::wots::{Wots, WotsConfig};
