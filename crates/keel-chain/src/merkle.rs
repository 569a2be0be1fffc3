//! Merkle inclusion proof replay and generation.
//!
//! A proof is an ordered list of sibling steps from a transaction hash up to
//! a block's Merkle root. The tree follows the ledger convention: nodes are
//! `hash256(left ∥ right)` and an odd row is folded by hashing its last
//! element with itself — expressed in proofs as a `Duplicate` step rather
//! than repeating the hash.
//!
//! Replay refuses two adjacent steps carrying the same literal sibling hash
//! before touching the hashes at all: mutated trees that exploit duplicate
//! folding (CVE-2012-2459) can otherwise prove a transaction into a block
//! twice. Proof depth is capped at
//! [`MAX_PROOF_DEPTH`](keel_core::constants::MAX_PROOF_DEPTH).

use keel_core::constants::MAX_PROOF_DEPTH;
use keel_core::error::{IntegrityError, KeelError, PolicyError};
use keel_core::hashes::hash256;
use keel_core::types::Hash256;

/// Which side a sibling hash is on relative to the running hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// Sibling is concatenated on the left.
    Left,
    /// Sibling is concatenated on the right.
    Right,
}

/// The sibling at one level: a literal hash, or the odd-row fold marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sibling {
    Hash(Hash256),
    /// `"*"` in the envelope: hash the running value with itself.
    Duplicate,
}

/// One step of an inclusion proof.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProofStep {
    pub sibling: Sibling,
    pub side: Side,
}

/// Replay a proof from a txid (internal order) to the implied root.
pub fn replay(txid: &Hash256, steps: &[ProofStep]) -> Hash256 {
    let mut cur = *txid;
    for step in steps {
        let sibling = match step.sibling {
            Sibling::Hash(h) => h,
            Sibling::Duplicate => cur,
        };
        let mut concat = [0u8; 64];
        match step.side {
            Side::Left => {
                concat[..32].copy_from_slice(sibling.as_bytes());
                concat[32..].copy_from_slice(cur.as_bytes());
            }
            Side::Right => {
                concat[..32].copy_from_slice(cur.as_bytes());
                concat[32..].copy_from_slice(sibling.as_bytes());
            }
        }
        cur = hash256(&concat);
    }
    cur
}

/// Verify a proof against an expected Merkle root.
///
/// Policy checks (depth cap, adjacent duplicate siblings) run before any
/// hashing; only then is the path replayed and compared to `root` in
/// constant time.
pub fn verify(txid: &Hash256, steps: &[ProofStep], root: &Hash256) -> Result<(), KeelError> {
    if steps.len() > MAX_PROOF_DEPTH {
        return Err(PolicyError::ProofTooDeep(steps.len()).into());
    }
    for (i, pair) in steps.windows(2).enumerate() {
        if let (Sibling::Hash(a), Sibling::Hash(b)) = (pair[0].sibling, pair[1].sibling) {
            if a.ct_eq(&b) {
                return Err(PolicyError::DuplicateSibling(i).into());
            }
        }
    }
    if !replay(txid, steps).ct_eq(root) {
        return Err(IntegrityError::MerkleMismatch.into());
    }
    Ok(())
}

/// Compute the Merkle root of a full block's txid list.
///
/// Returns `None` for an empty list; a single-transaction block's root is
/// the txid itself.
pub fn compute_root(txids: &[Hash256]) -> Option<Hash256> {
    if txids.is_empty() {
        return None;
    }
    let mut layer = txids.to_vec();
    while layer.len() > 1 {
        layer = next_layer(&layer);
    }
    Some(layer[0])
}

/// Build the inclusion proof for `txids[index]`.
///
/// Odd-row folds become `Duplicate` steps. Returns `None` when the index is
/// out of bounds or the list is empty.
pub fn build_path(txids: &[Hash256], index: usize) -> Option<Vec<ProofStep>> {
    if txids.is_empty() || index >= txids.len() {
        return None;
    }
    let mut path = Vec::new();
    let mut layer = txids.to_vec();
    let mut pos = index;
    while layer.len() > 1 {
        let sibling_pos = pos ^ 1;
        let step = if sibling_pos < layer.len() {
            ProofStep {
                sibling: Sibling::Hash(layer[sibling_pos]),
                side: if pos % 2 == 0 { Side::Right } else { Side::Left },
            }
        } else {
            // Last element of an odd row pairs with itself.
            ProofStep { sibling: Sibling::Duplicate, side: Side::Right }
        };
        path.push(step);
        layer = next_layer(&layer);
        pos /= 2;
    }
    Some(path)
}

fn next_layer(layer: &[Hash256]) -> Vec<Hash256> {
    let mut next = Vec::with_capacity(layer.len().div_ceil(2));
    let mut i = 0;
    while i < layer.len() {
        let left = layer[i];
        let right = if i + 1 < layer.len() { layer[i + 1] } else { left };
        let mut concat = [0u8; 64];
        concat[..32].copy_from_slice(left.as_bytes());
        concat[32..].copy_from_slice(right.as_bytes());
        next.push(hash256(&concat));
        i += 2;
    }
    next
}
