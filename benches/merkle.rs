// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

use criterion::*;

use amss::hash::{HashConfig, SHA2_256};
use amss::merkle::{MerkleConfig, Path, Tree};

const HEIGHT: usize = 10;
const TOP_HEIGHT: usize = 5;

/// Iterated-hash leaf sequence, first leaf all 0x88.
fn leaf_chain(cfg: &HashConfig, count: usize) -> Vec<Vec<u8>> {
    let mut leaves = Vec::with_capacity(count);
    let mut digest = vec![0x88u8; cfg.size];
    for _ in 0..count {
        leaves.push(digest.clone());
        digest = cfg.hash(&digest);
    }
    return leaves;
}

fn full_tree() -> (Tree, Vec<Vec<u8>>) {
    let config = MerkleConfig::new(SHA2_256, HEIGHT).unwrap();
    let mut tree = Tree::new(config, TOP_HEIGHT).unwrap();
    let leaves = leaf_chain(&config.hash, config.num_leaves());
    for leaf in &leaves {
        tree.add(leaf);
    }
    return (tree, leaves);
}

fn merkle_build(c: &mut Criterion) {
    let config = MerkleConfig::new(SHA2_256, HEIGHT).unwrap();
    let leaves = leaf_chain(&config.hash, config.num_leaves());
    c.bench_function("Merkle (h=10, ht=5) Build", |b| {
        b.iter(|| {
            let mut tree = Tree::new(config, TOP_HEIGHT).unwrap();
            for leaf in &leaves {
                tree.add(leaf);
            }
            tree
        })
    });
}

fn merkle_path(c: &mut Criterion) {
    let (tree, leaves) = full_tree();
    println!("Resident tree buffers: {} Bytes", tree.aux_bytes());
    let mut path = Path::new(&tree.config);
    c.bench_function("Merkle (h=10, ht=5) Path + Grow", |b| {
        b.iter_batched(
            || tree.clone(),
            |mut tree| {
                tree.generate_path(&leaves[0], &mut path);
                let grow_idx = tree.grow_leaf_idx();
                if grow_idx != 0 {
                    tree.grow(&leaves[grow_idx]);
                }
                tree
            },
            BatchSize::SmallInput,
        )
    });
}

fn merkle_root_from_path(c: &mut Criterion) {
    let (mut tree, leaves) = full_tree();
    let mut path = Path::new(&tree.config);
    tree.generate_path(&leaves[0], &mut path);
    c.bench_function("Merkle (h=10) RootFromPath", |b| {
        b.iter(|| path.root_from_leaf(&tree.config.hash, &leaves[0]))
    });
}

criterion_group!(benches, merkle_build, merkle_path, merkle_root_from_path);
criterion_main!(benches);
