// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

use criterion::*;
use rand::{thread_rng, RngCore};

use amss::hash::{HashKey, SHA2_256};
use amss::wots::{Wots, WotsConfig, SEED_SIZE};

fn signer() -> Wots {
    let config = WotsConfig::new(SHA2_256, 16).unwrap();
    let mut wots = Wots::new(config);
    let mut seed = [0u8; SEED_SIZE];
    seed[0] = b'x';
    wots.import_seckey(&seed, HashKey::from_bytes(*b"hashkeyshashkeys"));
    return wots;
}

/// Digest with the average digit weight for w = 16.
fn average_digest() -> Vec<u8> {
    let mut digest = vec![0x88u8; 32];
    for byte in digest[16..].iter_mut() {
        *byte = 0x77;
    }
    return digest;
}

fn wots_encode(c: &mut Criterion) {
    let mut rng = thread_rng();
    let config = WotsConfig::new(SHA2_256, 16).unwrap();
    c.bench_function("WOTS (SHA2-256, w=16) Encode", |b| {
        b.iter_batched(
            || {
                let mut digest = vec![0u8; 32];
                rng.fill_bytes(&mut digest);
                digest
            },
            |digest| config.encode(&digest),
            BatchSize::SmallInput,
        )
    });
}

fn wots_keygen(c: &mut Criterion) {
    c.bench_function("WOTS (SHA2-256, w=16) KeyGen", |b| {
        b.iter(|| {
            let mut wots = signer();
            wots.generate_pubkey();
            wots
        })
    });
}

fn wots_sign(c: &mut Criterion) {
    let wots = signer();
    let digest = average_digest();
    let mut sig = vec![0u8; wots.config.sig_len()];
    println!("Signature Size: {} Bytes", sig.len());
    c.bench_function("WOTS (SHA2-256, w=16) Sign", |b| b.iter(|| wots.sign(&digest, &mut sig)));
}

fn wots_verify(c: &mut Criterion) {
    let mut wots = signer();
    wots.generate_pubkey();
    let digest = average_digest();
    let mut sig = vec![0u8; wots.config.sig_len()];
    wots.sign(&digest, &mut sig);
    c.bench_function("WOTS (SHA2-256, w=16) Verify", |b| b.iter(|| wots.verify(&digest, &sig)));
}

criterion_group!(benches, wots_encode, wots_keygen, wots_sign, wots_verify);
criterion_main!(benches);
