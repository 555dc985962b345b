//! Partial tries reconstructed from batch proofs.
//!
//! A partial trie answers reads and writes for exactly the paths its proof
//! witnesses. Witnessed interior hashes stand in for the unexpanded
//! regions of the ledger, so the root can be recomputed after updates
//! without the full trie. Touching any path outside the witnessed set
//! fails with the distinguished missing-path error.

use std::collections::{BTreeMap, HashMap};

use cascade_types::StateCommitment;

use crate::hash::{interim_hash, leaf_hash, EMPTY_HASHES, TREE_DEPTH};
use crate::proof::TrieBatchProof;
use crate::{LedgerError, Path, Value, PATH_LEN};

/// An in-memory trie fragment anchored to a state commitment.
#[derive(Debug)]
pub struct PartialTrie {
    root_hash: [u8; 32],
    /// Witnessed leaves; an empty value records proven absence.
    leaves: BTreeMap<Path, Value>,
    /// Hashes of unexpanded subtrees, keyed by (prefix bit count, prefix).
    siblings: HashMap<(u16, Path), [u8; 32]>,
}

impl PartialTrie {
    /// Reconstructs a partial trie from an encoded batch proof anchored at
    /// `start`.
    pub fn new(proof_bytes: &[u8], start: StateCommitment) -> Result<PartialTrie, LedgerError> {
        let batch = TrieBatchProof::from_bytes(proof_bytes)?;
        PartialTrie::from_proof(&batch, start)
    }

    /// Reconstructs a partial trie from a decoded batch proof.
    pub fn from_proof(
        batch: &TrieBatchProof,
        start: StateCommitment,
    ) -> Result<PartialTrie, LedgerError> {
        let mut trie = PartialTrie {
            root_hash: *start.as_bytes(),
            leaves: BTreeMap::new(),
            siblings: HashMap::new(),
        };
        if batch.proofs.is_empty() {
            return Ok(trie);
        }

        for proof in &batch.proofs {
            if !proof.verify(start.as_bytes()) {
                return Err(LedgerError::MalformedProof(format!(
                    "proof for path {} does not anchor to the start state",
                    proof.path
                )));
            }
            let payload = if proof.inclusion {
                proof.payload.clone()
            } else {
                Vec::new()
            };
            if let Some(existing) = trie.leaves.get(&proof.path) {
                if *existing != payload {
                    return Err(LedgerError::Conflict(format!(
                        "contradictory witnesses for path {}",
                        proof.path
                    )));
                }
            } else {
                trie.leaves.insert(proof.path, payload);
            }

            let mut interim = 0usize;
            for depth in 0..TREE_DEPTH {
                if !proof.flag(depth) {
                    continue;
                }
                let hash = proof.interims[interim];
                interim += 1;
                let key = ((depth + 1) as u16, sibling_prefix(&proof.path, depth));
                if let Some(existing) = trie.siblings.get(&key) {
                    if *existing != hash {
                        return Err(LedgerError::Conflict(format!(
                            "contradictory sibling witness at depth {depth} for path {}",
                            proof.path
                        )));
                    }
                } else {
                    trie.siblings.insert(key, hash);
                }
            }
        }

        // cross-proof consistency: the union must reproduce the anchor
        if trie.compute_root() != *start.as_bytes() {
            return Err(LedgerError::Conflict(
                "witness set does not reconstruct the start state".to_string(),
            ));
        }
        Ok(trie)
    }

    /// The current root of the fragment.
    pub fn root_hash(&self) -> [u8; 32] {
        self.root_hash
    }

    /// Reads the witnessed values at `paths`, caller order preserved.
    ///
    /// Fails with [`LedgerError::MissingPaths`] listing every unwitnessed
    /// path if any read falls outside the fragment.
    pub fn get(&self, paths: &[Path]) -> Result<Vec<Value>, LedgerError> {
        let missing: Vec<Path> = paths
            .iter()
            .filter(|p| !self.leaves.contains_key(p))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(LedgerError::MissingPaths { paths: missing });
        }
        Ok(paths.iter().map(|p| self.leaves[p].clone()).collect())
    }

    /// Writes `values` at `paths` and returns the new root.
    ///
    /// Every written path must be witnessed; otherwise nothing is applied
    /// and [`LedgerError::MissingPaths`] lists the uncovered paths. Later
    /// writes to the same path win.
    pub fn set(&mut self, paths: &[Path], values: &[Value]) -> Result<[u8; 32], LedgerError> {
        if paths.len() != values.len() {
            return Err(LedgerError::InvalidUpdate(format!(
                "{} paths but {} values",
                paths.len(),
                values.len()
            )));
        }
        let missing: Vec<Path> = paths
            .iter()
            .filter(|p| !self.leaves.contains_key(p))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(LedgerError::MissingPaths { paths: missing });
        }
        for (path, value) in paths.iter().zip(values.iter()) {
            self.leaves.insert(*path, value.clone());
        }
        self.root_hash = self.compute_root();
        Ok(self.root_hash)
    }

    fn compute_root(&self) -> [u8; 32] {
        let paths: Vec<Path> = self.leaves.keys().copied().collect();
        self.subtree_hash(0, Path::default(), &paths)
    }

    fn subtree_hash(&self, depth: usize, prefix: Path, paths: &[Path]) -> [u8; 32] {
        if paths.is_empty() {
            return self
                .siblings
                .get(&(depth as u16, prefix))
                .copied()
                .unwrap_or(EMPTY_HASHES[TREE_DEPTH - depth]);
        }
        if depth == TREE_DEPTH {
            return leaf_hash(&paths[0], &self.leaves[&paths[0]]);
        }
        let split = paths.partition_point(|p| !p.bit(depth));
        let (lefts, rights) = paths.split_at(split);
        let left_prefix = prefix;
        let mut right_prefix = prefix;
        right_prefix.0[depth / 8] |= 1 << (7 - depth % 8);
        interim_hash(
            &self.subtree_hash(depth + 1, left_prefix, lefts),
            &self.subtree_hash(depth + 1, right_prefix, rights),
        )
    }
}

/// The position of the off-path subtree entered by diverging from `path`
/// at `depth`: the first `depth` bits of the path, then the flipped bit.
fn sibling_prefix(path: &Path, depth: usize) -> Path {
    let mut out = [0u8; PATH_LEN];
    let full_bytes = depth / 8;
    out[..full_bytes].copy_from_slice(&path.0[..full_bytes]);
    let rem = depth % 8;
    if rem > 0 {
        out[full_bytes] = path.0[full_bytes] & !(0xffu8 >> rem);
    }
    if !path.bit(depth) {
        out[depth / 8] |= 1 << (7 - depth % 8);
    }
    Path(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Trie;

    fn path(seed: u8) -> Path {
        Path(cascade_types::identifier::digest(&[seed]))
    }

    fn populated_trie() -> Trie {
        Trie::empty().update(
            &[path(1), path(2), path(3), path(4)],
            &[vec![1], vec![2], vec![3], vec![4]],
        )
    }

    #[test]
    fn witnessed_reads_succeed() {
        let trie = populated_trie();
        let proof = trie.prove(&[path(1), path(2)]);
        let partial =
            PartialTrie::from_proof(&proof, StateCommitment(trie.root_hash())).unwrap();
        let values = partial.get(&[path(2), path(1)]).unwrap();
        assert_eq!(values, vec![vec![2], vec![1]]);
    }

    #[test]
    fn unwitnessed_reads_report_every_missing_path() {
        let trie = populated_trie();
        let proof = trie.prove(&[path(1)]);
        let partial =
            PartialTrie::from_proof(&proof, StateCommitment(trie.root_hash())).unwrap();
        let err = partial.get(&[path(1), path(3), path(4)]).unwrap_err();
        match err {
            LedgerError::MissingPaths { paths } => {
                assert_eq!(paths, vec![path(3), path(4)]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn updates_track_the_full_trie_root() {
        let trie = populated_trie();
        let proof = trie.prove(&[path(1), path(3)]);
        let mut partial =
            PartialTrie::from_proof(&proof, StateCommitment(trie.root_hash())).unwrap();

        let new_root = partial
            .set(&[path(1), path(3)], &[vec![10], vec![30]])
            .unwrap();
        let expected = trie.update(&[path(1), path(3)], &[vec![10], vec![30]]);
        assert_eq!(new_root, expected.root_hash());
        assert_eq!(partial.get(&[path(1)]).unwrap(), vec![vec![10]]);
    }

    #[test]
    fn exclusion_witness_allows_fresh_allocation() {
        let trie = populated_trie();
        let proof = trie.prove(&[path(9)]);
        let mut partial =
            PartialTrie::from_proof(&proof, StateCommitment(trie.root_hash())).unwrap();

        assert_eq!(partial.get(&[path(9)]).unwrap(), vec![Vec::<u8>::new()]);
        let new_root = partial.set(&[path(9)], &[vec![99]]).unwrap();
        assert_eq!(
            new_root,
            trie.update(&[path(9)], &[vec![99]]).root_hash()
        );
    }

    #[test]
    fn unwitnessed_updates_are_rejected_without_side_effects() {
        let trie = populated_trie();
        let proof = trie.prove(&[path(1)]);
        let mut partial =
            PartialTrie::from_proof(&proof, StateCommitment(trie.root_hash())).unwrap();
        let before = partial.root_hash();

        let err = partial
            .set(&[path(1), path(2)], &[vec![10], vec![20]])
            .unwrap_err();
        assert!(err.is_missing_paths());
        assert_eq!(partial.root_hash(), before);
    }

    #[test]
    fn proof_must_anchor_to_the_start_state() {
        let trie = populated_trie();
        let proof = trie.prove(&[path(1)]);
        let err = PartialTrie::from_proof(&proof, StateCommitment([7u8; 32]));
        assert!(matches!(err, Err(LedgerError::MalformedProof(_))));
    }

    #[test]
    fn empty_proof_yields_inert_fragment() {
        let start = StateCommitment([5u8; 32]);
        let partial = PartialTrie::new(&TrieBatchProof::default().to_bytes(), start).unwrap();
        assert_eq!(partial.root_hash(), *start.as_bytes());
        assert!(partial.get(&[path(1)]).is_err());
    }
}
