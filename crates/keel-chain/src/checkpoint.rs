//! Trust anchor and difficulty floor.
//!
//! A [`Checkpoint`] is a compiled-in `{height, hash, nBits}` triple. It
//! serves two roles: an identity check for the anchor of a loaded header
//! chain, and the source of the static difficulty floor applied when no
//! chain is loaded. Deployments rebase by swapping the constants; every
//! verification entry point also accepts an explicit checkpoint so tests
//! and alternate deployments never depend on the compiled-in values.
//!
//! The dynamic floor (from a loaded chain's tip) lives in an explicit
//! [`VerifierContext`] rather than module state. A context is immutable
//! after construction and is built once before signing begins, so sharing
//! it across threads needs no further synchronization.

use num_bigint::BigUint;
use num_traits::One;

use keel_core::constants::DIFFICULTY_TOLERANCE;
use keel_core::error::{IntegrityError, PolicyError};
use keel_core::types::Hash256;

use crate::chainfile::ChainView;
use crate::header::{BlockHeader, compact_to_target};

/// A pinned block used as the verification trust anchor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Checkpoint {
    pub height: u32,
    /// Block hash in internal order.
    pub hash: Hash256,
    /// Compact target at the checkpoint, feeding the static floor.
    pub bits: u32,
}

/// The compiled-in mainnet checkpoint.
///
/// Display form of the hash:
/// `0000000000000000024a7cd19ab3f81d6f61d2a35f8ab0e4346a0aea4ad3c0b1`.
pub const MAINNET_CHECKPOINT: Checkpoint = Checkpoint {
    height: 935_000,
    hash: Hash256([
        0xb1, 0xc0, 0xd3, 0x4a, 0xea, 0x0a, 0x6a, 0x34, 0xe4, 0xb0, 0x8a, 0x5f, 0xa3, 0xd2,
        0x61, 0x6f, 0x1d, 0xf8, 0xb3, 0x9a, 0xd1, 0x7c, 0x4a, 0x02, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00,
    ]),
    bits: 0x1804_eaa5,
};

/// The floor target derived from a reference `nBits`: eight times the
/// reference target, clamped to 256 bits. Headers claiming an easier
/// (larger) target than the floor are rejected.
pub fn floor_target_for(bits: u32) -> BigUint {
    let max = (BigUint::one() << 256u32) - BigUint::one();
    (compact_to_target(bits) * BigUint::from(DIFFICULTY_TOLERANCE)).min(max)
}

/// Immutable verification context: checkpoint, effective difficulty floor,
/// and optionally a verified header chain.
#[derive(Clone, Debug)]
pub struct VerifierContext {
    checkpoint: Checkpoint,
    floor_target: BigUint,
    chain: Option<ChainView>,
}

impl VerifierContext {
    /// Context with the static floor from the checkpoint's `nBits`.
    pub fn new(checkpoint: Checkpoint) -> Self {
        Self {
            floor_target: floor_target_for(checkpoint.bits),
            checkpoint,
            chain: None,
        }
    }

    /// Context carrying a verified chain; the floor becomes dynamic,
    /// derived from the chain tip's `nBits` (or the checkpoint's when the
    /// chain holds no headers).
    pub fn with_chain(checkpoint: Checkpoint, chain: ChainView) -> Self {
        let reference_bits = chain.tip().map_or(checkpoint.bits, |tip| tip.bits);
        Self {
            floor_target: floor_target_for(reference_bits),
            checkpoint,
            chain: Some(chain),
        }
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    pub fn chain(&self) -> Option<&ChainView> {
        self.chain.as_ref()
    }

    /// The effective floor target.
    pub fn floor_target(&self) -> &BigUint {
        &self.floor_target
    }

    /// Reject headers whose claimed target is easier than the floor.
    pub fn check_difficulty_floor(&self, header: &BlockHeader) -> Result<(), PolicyError> {
        if header.target() > self.floor_target {
            return Err(PolicyError::BelowDifficultyFloor);
        }
        Ok(())
    }

    /// When a chain is loaded, require the block hash to appear in it.
    /// Without a chain this check is vacuous.
    pub fn check_chain_membership(&self, block_hash: &Hash256) -> Result<(), IntegrityError> {
        match &self.chain {
            Some(chain) if !chain.contains(block_hash) => {
                Err(IntegrityError::HeaderNotInChain)
            }
            _ => Ok(()),
        }
    }
}
