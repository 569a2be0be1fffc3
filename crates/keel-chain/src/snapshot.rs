//! Signed header-snapshot envelopes.
//!
//! A snapshot is a flat JSON record distributing a run of headers out of
//! band: `{version, startHeight, endHeight, anchorHash, headers,
//! cumulativeWork, timestamp, signerPubKey, signature}`. The signature
//! authenticates **distribution only** — it says a whitelisted publisher
//! produced the bundle, never that the headers are the canonical chain.
//! Consensus-grade checks (linkage, proof of work, recomputed work) run
//! independently of the signature.
//!
//! The signed message is `hash256` of the deterministic serialization:
//! heights as 8-byte big-endian, the anchor hash as 32 raw bytes, the
//! headers as raw concatenated bytes, the cumulative work as 32-byte
//! big-endian, and the timestamp as 8-byte big-endian.

use num_bigint::BigUint;
use num_traits::Zero;
use tracing::warn;

use keel_core::constants::{MAX_FUTURE_DRIFT, SNAPSHOT_STALE_SECS};
use keel_core::curve;
use keel_core::ecdsa::{self, Signature};
use keel_core::encoding::{self, decode_hex, decode_hex_exact};
use keel_core::error::{DecodeError, IntegrityError, KeelError, PolicyError, SchemaError};
use keel_core::hashes::hash256;
use keel_core::keys::PublicKey;
use keel_core::schema::{as_object, get_str, get_u64};
use keel_core::types::Hash256;

use crate::header::{BlockHeader, HEADER_SIZE};

/// A parsed (not yet verified) snapshot record.
#[derive(Clone, Debug)]
pub struct HeaderSnapshot {
    pub start_height: u64,
    pub end_height: u64,
    /// Hash the first header must chain from, internal order.
    pub anchor_hash: Hash256,
    pub headers: Vec<BlockHeader>,
    /// Publisher-declared cumulative work over `headers`.
    pub cumulative_work: BigUint,
    /// Publisher wall-clock time, seconds since the epoch.
    pub timestamp: u64,
    /// Compressed SEC1 signer key, kept raw for whitelist comparison.
    pub signer_pubkey: [u8; 33],
    pub signature: Signature,
}

impl HeaderSnapshot {
    /// Parse the JSON surface. Schema failures name the offending field;
    /// nothing semantic is checked yet.
    pub fn parse(bytes: &[u8]) -> Result<Self, KeelError> {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|_| SchemaError::InvalidJson)?;
        let obj = as_object(&value)?;

        let version = get_u64(obj, "version")?;
        if version != 1 {
            return Err(SchemaError::UnsupportedVersion(version).into());
        }

        let start_height = get_u64(obj, "startHeight")?;
        let end_height = get_u64(obj, "endHeight")?;
        let anchor_hash = Hash256::from_display_hex(get_str(obj, "anchorHash")?)?;

        let headers_hex = get_str(obj, "headers")?;
        let header_bytes = decode_hex(headers_hex)?;
        if header_bytes.len() % HEADER_SIZE != 0 {
            return Err(DecodeError::HeaderLength(header_bytes.len() % HEADER_SIZE).into());
        }
        let headers = header_bytes
            .chunks(HEADER_SIZE)
            .map(BlockHeader::parse)
            .collect::<Result<Vec<_>, _>>()?;

        let work_bytes = decode_hex(get_str(obj, "cumulativeWork")?)?;
        if work_bytes.len() > 32 {
            return Err(DecodeError::HexLength { expected: 32, got: work_bytes.len() }.into());
        }
        let cumulative_work = BigUint::from_bytes_be(&work_bytes);

        let timestamp = get_u64(obj, "timestamp")?;

        let signer_bytes = decode_hex_exact(get_str(obj, "signerPubKey")?, 33)?;
        let mut signer_pubkey = [0u8; 33];
        signer_pubkey.copy_from_slice(&signer_bytes);

        let signature = Signature::from_der(&decode_hex(get_str(obj, "signature")?)?)?;

        Ok(Self {
            start_height,
            end_height,
            anchor_hash,
            headers,
            cumulative_work,
            timestamp,
            signer_pubkey,
            signature,
        })
    }

    /// The deterministic byte string whose `hash256` is signed.
    pub fn canonical_message(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + 8 + 32 + self.headers.len() * HEADER_SIZE + 32 + 8);
        out.extend_from_slice(&self.start_height.to_be_bytes());
        out.extend_from_slice(&self.end_height.to_be_bytes());
        out.extend_from_slice(self.anchor_hash.as_bytes());
        for header in &self.headers {
            out.extend_from_slice(&header.serialize());
        }
        out.extend_from_slice(&curve::to_32_bytes(&self.cumulative_work));
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out
    }

    /// Full verification against a caller-supplied signer whitelist.
    ///
    /// Checks, in order: height range vs header count, timestamp bounds
    /// (stale snapshots warn, they do not fail), signer membership,
    /// internal chain consistency with proof of work, recomputed
    /// cumulative work, and finally the distribution signature.
    pub fn verify(&self, allowed_signers: &[[u8; 33]], now: u64) -> Result<(), KeelError> {
        let span = self
            .end_height
            .checked_sub(self.start_height)
            .map(|d| d + 1);
        if span != Some(self.headers.len() as u64) {
            return Err(PolicyError::SnapshotRangeMismatch.into());
        }

        if self.timestamp > now.saturating_add(MAX_FUTURE_DRIFT) {
            return Err(PolicyError::SnapshotTimestampTooFar(self.timestamp).into());
        }
        if now.saturating_sub(self.timestamp) > SNAPSHOT_STALE_SECS {
            warn!(
                timestamp = self.timestamp,
                "snapshot is more than thirty days old"
            );
        }

        if !allowed_signers
            .iter()
            .any(|allowed| encoding::ct_eq(allowed, &self.signer_pubkey))
        {
            return Err(PolicyError::SignerNotAllowed.into());
        }

        let mut prev = self.anchor_hash;
        for (i, header) in self.headers.iter().enumerate() {
            if !header.prev_block.ct_eq(&prev) {
                return Err(IntegrityError::ChainLinkBroken(i).into());
            }
            header.check_pow()?;
            prev = header.block_hash();
        }

        let computed = self
            .headers
            .iter()
            .fold(BigUint::zero(), |acc, h| acc + h.work());
        if computed != self.cumulative_work {
            return Err(IntegrityError::WorkMismatch {
                declared: self.cumulative_work.to_str_radix(16),
                computed: computed.to_str_radix(16),
            }
            .into());
        }

        let signer = PublicKey::from_bytes(&self.signer_pubkey)?;
        let z = hash256(&self.canonical_message());
        if !ecdsa::verify(z.as_bytes(), &self.signature, signer.point()) {
            return Err(IntegrityError::SnapshotSignature.into());
        }
        Ok(())
    }
}
