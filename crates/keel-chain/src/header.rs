//! Block header codec, compact targets, and proof of work.
//!
//! A header is exactly 80 bytes: `version(4 LE) ∥ prevBlock(32) ∥
//! merkleRoot(32) ∥ timestamp(4 LE) ∥ nBits(4 LE) ∥ nonce(4 LE)`, with the
//! two embedded hashes in internal byte order. The header hash is displayed
//! byte-reversed, which is also the big-endian integer the proof-of-work
//! predicate compares against the target.

use num_bigint::BigUint;
use num_traits::{One, Zero};

use keel_core::constants::{GENESIS_TIMESTAMP, MAX_FUTURE_DRIFT};
use keel_core::encoding::ByteReader;
use keel_core::error::{DecodeError, IntegrityError, PolicyError};
use keel_core::hashes::hash256;
use keel_core::types::Hash256;

/// Serialized header size.
pub const HEADER_SIZE: usize = 80;

/// A parsed 80-byte block header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: i32,
    /// Hash of the previous block, internal order.
    pub prev_block: Hash256,
    /// Merkle root over the block's transactions, internal order.
    pub merkle_root: Hash256,
    pub timestamp: u32,
    /// Compact difficulty target.
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    /// Parse exactly 80 bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() != HEADER_SIZE {
            return Err(DecodeError::HeaderLength(bytes.len()));
        }
        let mut r = ByteReader::new(bytes);
        let header = Self {
            version: r.read_u32_le()? as i32,
            prev_block: r.read_hash()?,
            merkle_root: r.read_hash()?,
            timestamp: r.read_u32_le()?,
            bits: r.read_u32_le()?,
            nonce: r.read_u32_le()?,
        };
        r.finish()?;
        Ok(header)
    }

    /// Serialize back to the 80-byte wire form.
    pub fn serialize(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&(self.version as u32).to_le_bytes());
        out[4..36].copy_from_slice(self.prev_block.as_bytes());
        out[36..68].copy_from_slice(self.merkle_root.as_bytes());
        out[68..72].copy_from_slice(&self.timestamp.to_le_bytes());
        out[72..76].copy_from_slice(&self.bits.to_le_bytes());
        out[76..80].copy_from_slice(&self.nonce.to_le_bytes());
        out
    }

    /// The header hash (`hash256` of the serialization), internal order.
    pub fn block_hash(&self) -> Hash256 {
        hash256(&self.serialize())
    }

    /// The difficulty target this header claims to satisfy.
    pub fn target(&self) -> BigUint {
        compact_to_target(self.bits)
    }

    /// Expected work contributed by a block at this target.
    pub fn work(&self) -> BigUint {
        work_from_target(&self.target())
    }

    /// Proof-of-work predicate: the header hash, read as the big-endian
    /// integer of its displayed form, must not exceed the target.
    pub fn check_pow(&self) -> Result<(), IntegrityError> {
        let hash_value = BigUint::from_bytes_le(self.block_hash().as_bytes());
        if hash_value > self.target() {
            return Err(IntegrityError::PowFailed);
        }
        Ok(())
    }

    /// Timestamp sanity: not before genesis, not more than two hours ahead
    /// of the supplied wall clock.
    pub fn check_timestamp(&self, now: u64) -> Result<(), PolicyError> {
        if self.timestamp < GENESIS_TIMESTAMP {
            return Err(PolicyError::TimestampBeforeGenesis(self.timestamp));
        }
        if u64::from(self.timestamp) > now.saturating_add(MAX_FUTURE_DRIFT) {
            return Err(PolicyError::TimestampTooFar(self.timestamp));
        }
        Ok(())
    }
}

/// Decode a compact `nBits` target: `EE·2²⁴ + M` becomes
/// `M >> 8·(3−EE)` for small exponents, `M << 8·(EE−3)` otherwise,
/// bounded to 256 bits. A set sign bit yields a zero target.
pub fn compact_to_target(bits: u32) -> BigUint {
    if bits & 0x0080_0000 != 0 {
        // The mantissa is a signed quantity that may not be negative.
        return BigUint::zero();
    }
    let exponent = (bits >> 24) as usize;
    let mantissa = BigUint::from(bits & 0x007f_ffff);
    let target = if exponent <= 3 {
        mantissa >> (8 * (3 - exponent))
    } else {
        mantissa << (8 * (exponent - 3))
    };
    let max = (BigUint::one() << 256u32) - BigUint::one();
    target.min(max)
}

/// Expected work for a target: `⌊2²⁵⁶ / (target + 1)⌋`.
pub fn work_from_target(target: &BigUint) -> BigUint {
    (BigUint::one() << 256u32) / (target + BigUint::one())
}
