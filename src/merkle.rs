// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Fractal Merkle tree.
//!
//! A height-h tree is split into a static top subtree over the roots of the
//! 2^ht bottom blocks plus two rotating bottom subtrees: `exist` serves
//! authentication paths for the block currently being signed while `desire`
//! is grown one leaf at a time for the next block. Only those three subtrees
//! are ever resident, so the working set stays O(h + 2^(h - ht)) hashes
//! instead of the 2^h leaves of a materialized tree.

use tracing::debug;

use crate::error::AmssError;
use crate::hash::HashConfig;

/// Tallest supported tree; leaf indices must fit the 16-bit wire field.
pub const MAX_HEIGHT: usize = 16;

/// Hash choice plus total tree height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MerkleConfig {
    pub hash: HashConfig,
    pub height: usize,
}

impl MerkleConfig {
    pub fn new(hash: HashConfig, height: usize) -> Result<Self, AmssError> {
        hash.validate()?;
        if height == 0 || height > MAX_HEIGHT {
            return Err(AmssError::ConfigInvalid(format!(
                "tree height {} outside 1..={}",
                height, MAX_HEIGHT
            )));
        }
        Ok(Self { hash, height })
    }

    /// Number of leaves, i.e. signatures the tree authenticates.
    pub fn num_leaves(&self) -> usize {
        return 1 << self.height;
    }
}

/// Fixed-width hash storage with index-checked node access.
#[derive(Debug, Clone)]
struct NodeArray {
    bytes: Vec<u8>,
    width: usize,
}

impl NodeArray {
    fn new(nodes: usize, width: usize) -> Self {
        Self { bytes: vec![0; nodes * width], width }
    }

    fn node(&self, idx: usize) -> &[u8] {
        &self.bytes[idx * self.width..(idx + 1) * self.width]
    }

    fn set(&mut self, idx: usize, hash: &[u8]) {
        self.bytes[idx * self.width..(idx + 1) * self.width].copy_from_slice(hash);
    }
}

/// Partially filled binary hash tree of fixed height.
///
/// `left_nodes` holds one node per level: while filling, the most recent left
/// child (the combining partner for the next right child); while serving
/// paths, the left node of the pair the signing cursor currently sits in.
/// `right_nodes` holds every right node of the block at its in-order slot.
/// While the subtree fills, `root` buffers the block's first leaf; the
/// fill-completing insert moves that leaf into `left_nodes[0]` and only then
/// stores the real root, so a fresh signing cursor starts with its level-0
/// left node already cached.
#[derive(Debug, Clone)]
pub struct Subtree {
    height: usize,
    left_nodes: NodeArray,
    right_nodes: NodeArray,
    root: Vec<u8>,
    pub(crate) leaf_idx: usize,
    pub(crate) is_full: bool,
}

impl Subtree {
    fn new(cfg: &HashConfig, height: usize) -> Self {
        Self {
            height,
            left_nodes: NodeArray::new(height, cfg.size),
            right_nodes: NodeArray::new((1 << height) - 1, cfg.size),
            root: vec![0; cfg.size],
            leaf_idx: 0,
            is_full: false,
        }
    }

    /// In-order slot of the right node with odd intra-level index `idx` at `level`.
    fn right_slot(level: usize, idx: usize) -> usize {
        return (idx << level) - 1;
    }

    pub(crate) fn root(&self) -> &[u8] {
        &self.root
    }

    pub(crate) fn left_node(&self, level: usize) -> &[u8] {
        self.left_nodes.node(level)
    }

    pub(crate) fn right_node(&self, slot: usize) -> &[u8] {
        self.right_nodes.node(slot)
    }

    fn reset(&mut self) {
        self.leaf_idx = 0;
        self.is_full = false;
    }

    /// Inserts the next leaf and propagates completed pairs upward.
    /// Inserting into a full subtree is a no-op.
    fn add(&mut self, cfg: &HashConfig, leaf: &[u8]) {
        if self.is_full {
            return;
        }
        if self.leaf_idx == 0 {
            // park the first leaf until the fill completes
            self.root.copy_from_slice(leaf);
        }
        let mut node = leaf.to_vec();
        let mut level = 0;
        let mut idx = self.leaf_idx;
        while idx & 1 == 1 {
            self.right_nodes.set(Self::right_slot(level, idx), &node);
            node = hash2(cfg, self.left_nodes.node(level), &node);
            idx >>= 1;
            level += 1;
        }
        if level == self.height {
            // final insert: restore the parked first leaf, then store the root
            if self.height > 0 {
                let first_leaf = self.root.clone();
                self.left_nodes.set(0, &first_leaf);
            }
            self.root = node;
        } else {
            self.left_nodes.set(level, &node);
        }
        self.leaf_idx += 1;
        if self.leaf_idx == 1 << self.height {
            self.is_full = true;
            self.leaf_idx = 0;
        }
    }

    /// Writes the `height` sibling hashes for the leaf at the signing cursor,
    /// refreshing the left-node column as the cursor crosses into new pairs.
    /// The cursor itself is advanced by the owning tree.
    fn write_auth(&mut self, cfg: &HashConfig, leaf: &[u8], out: &mut [u8]) {
        let n = cfg.size;
        debug_assert_eq!(out.len(), self.height * n);
        let mut node = leaf.to_vec();
        for level in 0..self.height {
            let idx = self.leaf_idx >> level;
            let slot = &mut out[level * n..(level + 1) * n];
            if idx & 1 == 0 {
                slot.copy_from_slice(self.right_nodes.node(Self::right_slot(level, idx + 1)));
                self.left_nodes.set(level, &node);
                node = hash2(cfg, &node, slot);
            } else {
                slot.copy_from_slice(self.left_nodes.node(level));
                node = hash2(cfg, slot, &node);
            }
        }
    }
}

/// Hashes the concatenation of two sibling nodes into their parent.
fn hash2(cfg: &HashConfig, left: &[u8], right: &[u8]) -> Vec<u8> {
    return cfg.hash(&[left, right].concat());
}

/// Authentication path: one sibling hash per level, bottom to top, plus the
/// leaf index it authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    pub leaf_idx: u16,
    pub hashes: Vec<u8>,
}

impl Path {
    pub fn new(config: &MerkleConfig) -> Self {
        Self { leaf_idx: 0, hashes: vec![0; config.height * config.hash.size] }
    }

    /// Recomputes the root implied by this path for the given leaf hash.
    pub fn root_from_leaf(&self, cfg: &HashConfig, leaf: &[u8]) -> Vec<u8> {
        let mut node = leaf.to_vec();
        for (level, sibling) in self.hashes.chunks(cfg.size).enumerate() {
            node = if (usize::from(self.leaf_idx) >> level) & 1 == 0 {
                hash2(cfg, &node, sibling)
            } else {
                hash2(cfg, sibling, &node)
            };
        }
        return node;
    }
}

/// Fractal Merkle tree: the top subtree over block roots plus the
/// exist/desire bottom pair.
#[derive(Debug, Clone)]
pub struct Tree {
    pub config: MerkleConfig,
    top_height: usize,
    top: Subtree,
    exist: Subtree,
    desire: Subtree,
    /// Next leaf position: the construction frontier while building, the
    /// signing position afterwards.
    pub leaf_idx: usize,
    pub is_full: bool,
}

impl Tree {
    /// Builds an empty tree split `top_height` levels above the rotating
    /// bottom pair. At least one bottom level is required.
    pub fn new(config: MerkleConfig, top_height: usize) -> Result<Self, AmssError> {
        if top_height >= config.height {
            return Err(AmssError::ConfigInvalid(format!(
                "top height {} leaves no bottom levels in a height-{} tree",
                top_height, config.height
            )));
        }
        let bottom = config.height - top_height;
        Ok(Self {
            config,
            top_height,
            top: Subtree::new(&config.hash, top_height),
            exist: Subtree::new(&config.hash, bottom),
            desire: Subtree::new(&config.hash, bottom),
            leaf_idx: 0,
            is_full: false,
        })
    }

    /// Height of the rotating bottom subtrees.
    pub fn bottom_height(&self) -> usize {
        return self.config.height - self.top_height;
    }

    /// Root hash; authoritative once construction has finished.
    pub fn root(&self) -> &[u8] {
        self.top.root()
    }

    pub(crate) fn exist(&self) -> &Subtree {
        &self.exist
    }

    /// Clears all construction state.
    pub fn reset(&mut self) {
        self.top.reset();
        self.exist.reset();
        self.desire.reset();
        self.leaf_idx = 0;
        self.is_full = false;
    }

    /// Ingests the next leaf during construction. The first block lands in
    /// `exist`; later blocks pass through `desire`, whose root moves into the
    /// top subtree each time it completes.
    pub fn add(&mut self, leaf: &[u8]) {
        if self.is_full {
            return;
        }
        let cfg = self.config.hash;
        let first_block = self.leaf_idx < (1 << self.bottom_height());
        let sub = if first_block { &mut self.exist } else { &mut self.desire };
        let was_full = sub.is_full;
        sub.add(&cfg, leaf);
        if !was_full && sub.is_full {
            let block_root = sub.root().to_vec();
            self.top.add(&cfg, &block_root);
            if !first_block {
                self.desire.reset();
            }
        }
        self.leaf_idx += 1;
        if self.leaf_idx == self.config.num_leaves() {
            self.is_full = true;
            self.leaf_idx = 0;
        }
    }

    /// Emits the authentication path for the current signing position and
    /// advances the cursors. `leaf` must be the hash stored at that position.
    pub fn generate_path(&mut self, leaf: &[u8], path: &mut Path) {
        debug_assert!(self.is_full, "path requested before construction finished");
        let cfg = self.config.hash;
        let split = self.bottom_height() * cfg.size;
        path.leaf_idx = self.leaf_idx as u16;
        self.exist.write_auth(&cfg, leaf, &mut path.hashes[..split]);
        self.exist.leaf_idx += 1;
        let block_root = self.exist.root().to_vec();
        self.top.write_auth(&cfg, &block_root, &mut path.hashes[split..]);
        self.leaf_idx += 1;
    }

    /// Leaf index the next growth step must ingest into `desire`, or 0 when
    /// no growth is required for this signature. One step per signature keeps
    /// `desire` completing exactly when `exist` runs out.
    pub fn grow_leaf_idx(&self) -> usize {
        if self.top_height == 0 || self.leaf_idx == 0 {
            return 0;
        }
        let hb = self.bottom_height();
        let signed = self.leaf_idx - 1;
        let target = (((signed >> hb) + 1) << hb) + self.desire.leaf_idx;
        if self.desire.is_full || target >= self.config.num_leaves() {
            return 0;
        }
        return target;
    }

    /// Ingests one leaf into `desire`; when it completes, the bottom pair
    /// rotates and the top cursor moves to the next block.
    pub fn grow(&mut self, leaf: &[u8]) {
        let cfg = self.config.hash;
        let was_full = self.desire.is_full;
        self.desire.add(&cfg, leaf);
        if !was_full && self.desire.is_full {
            std::mem::swap(&mut self.exist, &mut self.desire);
            self.desire.reset();
            self.top.leaf_idx += 1;
            debug!(block = self.top.leaf_idx, "bottom subtree pair rotated");
        }
    }

    /// Bytes of hash material resident across the three subtrees.
    pub fn aux_bytes(&self) -> usize {
        let rights = |h: usize| (1usize << h) - 1;
        let nodes = self.top_height
            + rights(self.top_height)
            + 2 * (self.bottom_height() + rights(self.bottom_height()))
            + 3;
        return nodes * self.config.hash.size;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::SHA2_256;

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

    fn full_tree(height: usize, top_height: usize) -> (Tree, Vec<Vec<u8>>) {
        let config = MerkleConfig::new(SHA2_256, height).unwrap();
        let mut tree = Tree::new(config, top_height).unwrap();
        let leaves = leaf_chain(&config.hash, config.num_leaves());
        for leaf in &leaves {
            tree.add(leaf);
        }
        assert_eq!(tree.is_full, true);
        assert_eq!(tree.leaf_idx, 0);
        return (tree, leaves);
    }

    #[test]
    fn subtree_fills_and_ignores_extra_leaves() {
        let cfg = SHA2_256;
        let mut sub = Subtree::new(&cfg, 3);
        let leaves = leaf_chain(&cfg, 8);
        for leaf in &leaves {
            assert_eq!(sub.is_full, false);
            sub.add(&cfg, leaf);
        }
        assert_eq!(sub.is_full, true);
        assert_eq!(sub.leaf_idx, 0);

        let root = sub.root().to_vec();
        sub.add(&cfg, &leaves[3]);
        assert_eq!(sub.root(), &root[..]);
        assert_eq!(sub.leaf_idx, 0);

        // the block's first leaf is cached for a fresh signing cursor
        assert_eq!(sub.left_node(0), &leaves[0][..]);
    }

    #[test]
    fn subtree_root_matches_flat_computation() {
        let cfg = SHA2_256;
        let mut sub = Subtree::new(&cfg, 2);
        let leaves = leaf_chain(&cfg, 4);
        for leaf in &leaves {
            sub.add(&cfg, leaf);
        }
        let left = hash2(&cfg, &leaves[0], &leaves[1]);
        let right = hash2(&cfg, &leaves[2], &leaves[3]);
        assert_eq!(sub.root(), &hash2(&cfg, &left, &right)[..]);

        // right nodes sit at their in-order slots
        assert_eq!(sub.right_node(0), &leaves[1][..]);
        assert_eq!(sub.right_node(1), &right[..]);
        assert_eq!(sub.right_node(2), &leaves[3][..]);
    }

    #[test]
    fn fractal_split_matches_single_subtree() {
        let (all_bottom, _) = full_tree(8, 0);
        let (half, _) = full_tree(8, 4);
        assert_eq!(all_bottom.root(), half.root());
    }

    #[test]
    fn path_round_trip_over_every_leaf() {
        // the walk crosses every exist/desire rotation
        for &(height, top_height) in &[(6, 3), (5, 2), (4, 0)] {
            let (mut tree, leaves) = full_tree(height, top_height);
            let root = tree.root().to_vec();
            let mut path = Path::new(&tree.config);
            for (idx, leaf) in leaves.iter().enumerate() {
                tree.generate_path(leaf, &mut path);
                assert_eq!(usize::from(path.leaf_idx), idx);
                assert_eq!(path.root_from_leaf(&tree.config.hash, leaf), root);
                let grow_idx = tree.grow_leaf_idx();
                if grow_idx != 0 {
                    tree.grow(&leaves[grow_idx]);
                }
            }
            assert_eq!(tree.grow_leaf_idx(), 0);
            assert_eq!(tree.leaf_idx, tree.config.num_leaves());
        }
    }

    #[test]
    fn growth_is_scheduled_once_per_signature() {
        let (mut tree, leaves) = full_tree(6, 3);
        let mut path = Path::new(&tree.config);
        // during the first block the scheduler asks for leaves 8..=15 in order
        for idx in 0..8 {
            tree.generate_path(&leaves[idx], &mut path);
            let grow_idx = tree.grow_leaf_idx();
            assert_eq!(grow_idx, 8 + idx);
            tree.grow(&leaves[grow_idx]);
        }
        // the rotation armed the next block's first left node
        assert_eq!(tree.exist().left_node(0), &leaves[8][..]);
    }

    #[test]
    fn wrong_leaf_index_changes_recovered_root() {
        let (mut tree, leaves) = full_tree(4, 2);
        let root = tree.root().to_vec();
        let mut path = Path::new(&tree.config);
        tree.generate_path(&leaves[0], &mut path);
        assert_eq!(path.root_from_leaf(&tree.config.hash, &leaves[0]), root);
        path.leaf_idx = 1;
        assert_ne!(path.root_from_leaf(&tree.config.hash, &leaves[0]), root);
    }

    #[test]
    fn reset_rebuilds_the_same_root() {
        let (mut tree, leaves) = full_tree(4, 2);
        let root = tree.root().to_vec();
        let mut path = Path::new(&tree.config);
        for leaf in leaves.iter().take(3) {
            tree.generate_path(leaf, &mut path);
            let grow_idx = tree.grow_leaf_idx();
            if grow_idx != 0 {
                tree.grow(&leaves[grow_idx]);
            }
        }
        tree.reset();
        for leaf in &leaves {
            tree.add(leaf);
        }
        assert_eq!(tree.root(), &root[..]);
    }

    #[test]
    fn rejects_degenerate_shapes() {
        assert!(MerkleConfig::new(SHA2_256, 0).is_err());
        assert!(MerkleConfig::new(SHA2_256, MAX_HEIGHT + 1).is_err());
        let config = MerkleConfig::new(SHA2_256, 4).unwrap();
        assert!(Tree::new(config, 4).is_err());
        assert!(Tree::new(config, 3).is_ok());
    }
}
