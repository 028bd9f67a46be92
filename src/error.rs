// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Error taxonomy for key setup, signing, and wire decoding.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmssError {
    /// Signing was attempted after every leaf of the key was consumed.
    /// Non-recoverable for this key.
    #[error("all {0} signature slots exhausted")]
    Exhausted(u64),

    /// Unsupported (algorithm, hash size, code base, height) combination.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// A packed public key or signature failed structural decoding.
    #[error("malformed {0} encoding")]
    Malformed(&'static str),
}
