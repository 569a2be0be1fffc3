//! Checkpoint-anchored header chain files.
//!
//! Wire layout: `anchorHeight(4 LE) ∥ anchorHash(32) ∥ headerCount(4 LE) ∥
//! header[0] … header[N-1]`, each header 80 raw bytes. Verification is
//! all-or-nothing: a truncated file, a broken link, a failed proof of work
//! or an out-of-policy header anywhere rejects the whole file.

use std::collections::HashMap;

use num_bigint::BigUint;
use num_traits::Zero;
use tracing::debug;

use keel_core::error::{DecodeError, IntegrityError, KeelError};
use keel_core::types::Hash256;

use crate::checkpoint::{Checkpoint, floor_target_for};
use crate::header::{BlockHeader, HEADER_SIZE};

/// A verified, immutable view over a dense run of headers above an anchor.
///
/// `headers[i]` sits at height `anchor_height + 1 + i`. The hash index also
/// contains the anchor itself.
#[derive(Clone, Debug)]
pub struct ChainView {
    anchor_height: u32,
    anchor_hash: Hash256,
    headers: Vec<BlockHeader>,
    index: HashMap<Hash256, u32>,
    cumulative_work: BigUint,
}

impl ChainView {
    /// Parse and verify a chain file against a checkpoint.
    ///
    /// Checks, in order: structural decode, anchor identity (when the
    /// anchor height equals the checkpoint height), per-header linkage,
    /// proof of work, the static difficulty floor from the checkpoint, and
    /// timestamp bounds. Nothing is accepted partially.
    pub fn verify(bytes: &[u8], checkpoint: &Checkpoint, now: u64) -> Result<Self, KeelError> {
        let (anchor_height, anchor_hash, headers) = parse_chain_file(bytes)?;

        if anchor_height == checkpoint.height && !anchor_hash.ct_eq(&checkpoint.hash) {
            return Err(IntegrityError::AnchorMismatch.into());
        }

        let floor = floor_target_for(checkpoint.bits);
        let mut prev_hash = anchor_hash;
        for (i, header) in headers.iter().enumerate() {
            if !header.prev_block.ct_eq(&prev_hash) {
                return Err(IntegrityError::ChainLinkBroken(i).into());
            }
            header.check_pow()?;
            if header.target() > floor {
                return Err(keel_core::error::PolicyError::BelowDifficultyFloor.into());
            }
            header.check_timestamp(now)?;
            prev_hash = header.block_hash();
        }

        let cumulative_work = headers.iter().fold(BigUint::zero(), |acc, h| acc + h.work());

        let mut index = HashMap::with_capacity(headers.len() + 1);
        index.insert(anchor_hash, anchor_height);
        for (i, header) in headers.iter().enumerate() {
            index.insert(header.block_hash(), anchor_height + 1 + i as u32);
        }

        debug!(
            anchor_height,
            headers = headers.len(),
            "header chain verified"
        );

        Ok(Self { anchor_height, anchor_hash, headers, index, cumulative_work })
    }

    pub fn anchor_height(&self) -> u32 {
        self.anchor_height
    }

    pub fn anchor_hash(&self) -> &Hash256 {
        &self.anchor_hash
    }

    /// Number of headers above the anchor.
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// The last header, if any headers were loaded.
    pub fn tip(&self) -> Option<&BlockHeader> {
        self.headers.last()
    }

    /// Height of the tip (the anchor height when no headers are loaded).
    pub fn tip_height(&self) -> u32 {
        self.anchor_height + self.headers.len() as u32
    }

    /// Whether a block hash appears in the chain (anchor included).
    pub fn contains(&self, block_hash: &Hash256) -> bool {
        self.index.contains_key(block_hash)
    }

    /// Height of a block hash, if present.
    pub fn height_of(&self, block_hash: &Hash256) -> Option<u32> {
        self.index.get(block_hash).copied()
    }

    /// Total expected work over the loaded headers.
    pub fn cumulative_work(&self) -> &BigUint {
        &self.cumulative_work
    }
}

/// Structural decode of a chain file. Truncation anywhere is rejected, as
/// are trailing bytes after the declared header count.
fn parse_chain_file(
    bytes: &[u8],
) -> Result<(u32, Hash256, Vec<BlockHeader>), DecodeError> {
    let truncated = |e: DecodeError| match e {
        DecodeError::UnexpectedEof { .. } => DecodeError::ChainFileTruncated,
        other => other,
    };

    let mut r = keel_core::encoding::ByteReader::new(bytes);
    let anchor_height = r.read_u32_le().map_err(truncated)?;
    let anchor_hash = r.read_hash().map_err(truncated)?;
    let count = r.read_u32_le().map_err(truncated)? as usize;

    let mut headers = Vec::with_capacity(count.min(1 << 20));
    for _ in 0..count {
        let raw = r.take(HEADER_SIZE).map_err(truncated)?;
        headers.push(BlockHeader::parse(raw)?);
    }
    r.finish()?;
    Ok((anchor_height, anchor_hash, headers))
}
