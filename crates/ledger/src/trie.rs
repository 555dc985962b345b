//! Immutable sparse Merkle trie with structural sharing.
//!
//! Updates produce a new trie that shares unchanged subtrees with its
//! parent, so a forest of sibling versions stays cheap. Leaves are stored
//! at the highest position that uniquely contains them; hashing lifts a
//! leaf through the empty levels below its position, which keeps the root
//! identical to the full-depth equivalent.

use std::sync::Arc;

use crate::hash::{interim_hash, leaf_hash, EMPTY_HASHES, TREE_DEPTH};
use crate::proof::{TrieBatchProof, TrieProof};
use crate::{Path, Value};

#[derive(Debug)]
enum Node {
    Empty,
    Leaf { path: Path, value: Value },
    Interim { left: Arc<Node>, right: Arc<Node>, hash: [u8; 32] },
}

fn empty_node() -> Arc<Node> {
    Arc::new(Node::Empty)
}

/// Hash of a leaf lifted through `height` empty levels.
fn lifted_leaf_hash(path: &Path, value: &Value, height: usize) -> [u8; 32] {
    let mut h = leaf_hash(path, value);
    for level in 0..height {
        let bit = path.bit(TREE_DEPTH - 1 - level);
        h = if bit {
            interim_hash(&EMPTY_HASHES[level], &h)
        } else {
            interim_hash(&h, &EMPTY_HASHES[level])
        };
    }
    h
}

fn node_hash(node: &Node, height: usize) -> [u8; 32] {
    match node {
        Node::Empty => EMPTY_HASHES[height],
        Node::Leaf { path, value } => lifted_leaf_hash(path, value, height),
        Node::Interim { hash, .. } => *hash,
    }
}

/// One version of the register ledger.
#[derive(Clone, Debug)]
pub struct Trie {
    root: Arc<Node>,
    root_hash: [u8; 32],
}

impl Trie {
    /// The trie with no allocated registers.
    pub fn empty() -> Trie {
        Trie {
            root: empty_node(),
            root_hash: EMPTY_HASHES[TREE_DEPTH],
        }
    }

    /// The root hash of this version.
    pub fn root_hash(&self) -> [u8; 32] {
        self.root_hash
    }

    /// Reads the values at `paths`; unallocated registers read as the
    /// empty value. Caller order is preserved.
    pub fn read(&self, paths: &[Path]) -> Vec<Value> {
        paths.iter().map(|p| self.get(p)).collect()
    }

    fn get(&self, path: &Path) -> Value {
        let mut node = &self.root;
        let mut height = TREE_DEPTH;
        loop {
            match &**node {
                Node::Empty => return Vec::new(),
                Node::Leaf { path: p, value } => {
                    return if p == path { value.clone() } else { Vec::new() };
                }
                Node::Interim { left, right, .. } => {
                    let depth = TREE_DEPTH - height;
                    node = if path.bit(depth) { right } else { left };
                    height -= 1;
                }
            }
        }
    }

    /// Produces a new version with the given registers written. Multiple
    /// writes to the same path keep the last value; writing the empty
    /// value deallocates the register.
    pub fn update(&self, paths: &[Path], values: &[Value]) -> Trie {
        let mut batch: Vec<(Path, Value)> = Vec::with_capacity(paths.len());
        // last write wins per path
        for (path, value) in paths.iter().zip(values.iter()) {
            if let Some(entry) = batch.iter_mut().find(|(p, _)| p == path) {
                entry.1 = value.clone();
            } else {
                batch.push((*path, value.clone()));
            }
        }
        batch.sort_by(|a, b| a.0.cmp(&b.0));
        let root = update_node(&self.root, TREE_DEPTH, batch);
        let root_hash = node_hash(&root, TREE_DEPTH);
        Trie { root, root_hash }
    }

    /// The allocated registers of this version, in path order.
    pub fn leaves(&self) -> Vec<(Path, Value)> {
        let mut out = Vec::new();
        collect_leaves(&self.root, &mut out);
        out
    }

    /// Extracts a batch proof for `paths` against this version.
    pub fn prove(&self, paths: &[Path]) -> TrieBatchProof {
        TrieBatchProof {
            proofs: paths.iter().map(|p| self.prove_path(p)).collect(),
        }
    }

    fn prove_path(&self, path: &Path) -> TrieProof {
        let mut flags = [0u8; 32];
        let mut interims: Vec<[u8; 32]> = Vec::new();
        let mut payload: Value = Vec::new();
        let mut inclusion = false;

        let mut node = &self.root;
        let mut height = TREE_DEPTH;
        loop {
            match &**node {
                Node::Empty => break,
                Node::Leaf { path: p, value } => {
                    if p == path {
                        payload = value.clone();
                        inclusion = true;
                        break;
                    }
                    // Another leaf shares this subtree. Its lifted hash is
                    // the single non-default sibling, at the first depth
                    // where the two paths diverge.
                    let mut depth = TREE_DEPTH - height;
                    while depth < TREE_DEPTH && path.bit(depth) == p.bit(depth) {
                        depth += 1;
                    }
                    let sibling_height = TREE_DEPTH - depth - 1;
                    let sibling = lifted_leaf_hash(p, value, sibling_height);
                    if sibling != EMPTY_HASHES[sibling_height] {
                        flags[depth / 8] |= 1 << (7 - depth % 8);
                        interims.push(sibling);
                    }
                    break;
                }
                Node::Interim { left, right, .. } => {
                    let depth = TREE_DEPTH - height;
                    let (next, sibling) = if path.bit(depth) {
                        (right, left)
                    } else {
                        (left, right)
                    };
                    let sibling_hash = node_hash(sibling, height - 1);
                    if sibling_hash != EMPTY_HASHES[height - 1] {
                        flags[depth / 8] |= 1 << (7 - depth % 8);
                        interims.push(sibling_hash);
                    }
                    node = next;
                    height -= 1;
                }
            }
        }

        TrieProof {
            path: *path,
            payload,
            inclusion,
            steps: TREE_DEPTH as u16,
            flags,
            interims,
        }
    }
}

// in-order traversal visits leaves in ascending path order
fn collect_leaves(node: &Node, out: &mut Vec<(Path, Value)>) {
    match node {
        Node::Empty => {}
        Node::Leaf { path, value } => out.push((*path, value.clone())),
        Node::Interim { left, right, .. } => {
            collect_leaves(left, out);
            collect_leaves(right, out);
        }
    }
}

fn update_node(node: &Arc<Node>, height: usize, mut batch: Vec<(Path, Value)>) -> Arc<Node> {
    if batch.is_empty() {
        return Arc::clone(node);
    }
    if height == 0 {
        let (path, value) = batch.pop().expect("non-empty batch");
        return if value.is_empty() {
            empty_node()
        } else {
            Arc::new(Node::Leaf { path, value })
        };
    }
    // a single write into an empty subtree settles as a compact leaf
    if batch.len() == 1 && matches!(&**node, Node::Empty) {
        let (path, value) = batch.pop().expect("non-empty batch");
        return if value.is_empty() {
            empty_node()
        } else {
            Arc::new(Node::Leaf { path, value })
        };
    }

    let (left_child, right_child) = match &**node {
        Node::Interim { left, right, .. } => (Arc::clone(left), Arc::clone(right)),
        Node::Leaf { path, value } => {
            // keep the resident leaf unless the batch overwrites it
            if !batch.iter().any(|(p, _)| p == path) {
                let pos = batch.partition_point(|(p, _)| p < path);
                batch.insert(pos, (*path, value.clone()));
            }
            (empty_node(), empty_node())
        }
        Node::Empty => (empty_node(), empty_node()),
    };

    let depth = TREE_DEPTH - height;
    let split = batch.partition_point(|(p, _)| !p.bit(depth));
    let right_batch = batch.split_off(split);
    let left_batch = batch;

    let new_left = update_node(&left_child, height - 1, left_batch);
    let new_right = update_node(&right_child, height - 1, right_batch);

    if matches!(&*new_left, Node::Empty) && matches!(&*new_right, Node::Empty) {
        return empty_node();
    }
    let hash = interim_hash(
        &node_hash(&new_left, height - 1),
        &node_hash(&new_right, height - 1),
    );
    Arc::new(Node::Interim {
        left: new_left,
        right: new_right,
        hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::empty_root_hash;

    fn path(seed: u8) -> Path {
        Path(cascade_types::identifier::digest(&[seed]))
    }

    #[test]
    fn empty_trie_has_default_root() {
        assert_eq!(Trie::empty().root_hash(), empty_root_hash());
    }

    #[test]
    fn written_values_read_back() {
        let trie = Trie::empty().update(
            &[path(1), path(2)],
            &[vec![10], vec![20]],
        );
        assert_eq!(trie.read(&[path(1), path(2), path(3)]), vec![vec![10], vec![20], vec![]]);
    }

    #[test]
    fn update_is_persistent() {
        let v1 = Trie::empty().update(&[path(1)], &[vec![1]]);
        let v2 = v1.update(&[path(1)], &[vec![2]]);
        assert_eq!(v1.read(&[path(1)]), vec![vec![1]]);
        assert_eq!(v2.read(&[path(1)]), vec![vec![2]]);
        assert_ne!(v1.root_hash(), v2.root_hash());
    }

    #[test]
    fn last_write_wins_within_batch() {
        let a = Trie::empty().update(&[path(1), path(1)], &[vec![1], vec![2]]);
        let b = Trie::empty().update(&[path(1)], &[vec![2]]);
        assert_eq!(a.root_hash(), b.root_hash());
    }

    #[test]
    fn deletion_restores_prior_root() {
        let base = Trie::empty().update(&[path(1)], &[vec![1]]);
        let grown = base.update(&[path(2)], &[vec![2]]);
        let shrunk = grown.update(&[path(2)], &[vec![]]);
        assert_eq!(shrunk.root_hash(), base.root_hash());
    }

    #[test]
    fn root_is_insertion_order_independent() {
        let a = Trie::empty()
            .update(&[path(1)], &[vec![1]])
            .update(&[path(2)], &[vec![2]]);
        let b = Trie::empty()
            .update(&[path(2)], &[vec![2]])
            .update(&[path(1)], &[vec![1]]);
        assert_eq!(a.root_hash(), b.root_hash());
    }

    #[test]
    fn proofs_verify_against_root() {
        let trie = Trie::empty().update(
            &[path(1), path(2), path(3)],
            &[vec![1], vec![2], vec![3]],
        );
        let proof = trie.prove(&[path(1), path(9)]);
        for p in &proof.proofs {
            assert!(p.verify(&trie.root_hash()));
        }
        assert!(proof.proofs[0].inclusion);
        assert!(!proof.proofs[1].inclusion);
    }

    #[test]
    fn tampered_proof_fails_verification() {
        let trie = Trie::empty().update(&[path(1)], &[vec![1]]);
        let mut proof = trie.prove(&[path(1)]).proofs.remove(0);
        proof.payload = vec![9];
        assert!(!proof.verify(&trie.root_hash()));
    }
}
