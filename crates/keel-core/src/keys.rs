//! Secret and public key handling.
//!
//! Secret scalars arrive as Wallet-Import-Format strings and live in a
//! zeroizing container; they are never represented as `String` and every
//! intermediate buffer is wiped. Public keys are curve points with SEC1
//! serialization helpers.

use num_bigint::BigUint;
use num_traits::Zero;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::constants::WIF_VERSION;
use crate::curve::{Point, curve_order, generator};
use crate::encoding::base58check_decode;
use crate::error::{CryptoError, DecodeError, KeelError};
use crate::hashes::hash160;

/// A secp256k1 secret key with its WIF compression marker.
///
/// The scalar is zeroized on drop. `Debug` never prints key material.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretKey {
    bytes: [u8; 32],
    compressed: bool,
}

impl SecretKey {
    /// Build from a raw scalar, enforcing `1 ≤ d < n`.
    pub fn from_bytes(bytes: [u8; 32], compressed: bool) -> Result<Self, CryptoError> {
        let d = BigUint::from_bytes_be(&bytes);
        if d.is_zero() || d >= *curve_order() {
            return Err(CryptoError::InvalidSecretKey);
        }
        Ok(Self { bytes, compressed })
    }

    /// Decode a Wallet-Import-Format string.
    ///
    /// Expects version byte `0x80`, a 32-byte scalar, and an optional
    /// trailing `0x01` compression marker. The decoded payload is wiped
    /// before returning on every path.
    pub fn from_wif(wif: &str) -> Result<Self, KeelError> {
        let (version, mut payload) = base58check_decode(wif)?;
        let result = Self::from_wif_payload(version, &payload);
        payload.zeroize();
        result
    }

    fn from_wif_payload(version: u8, payload: &[u8]) -> Result<Self, KeelError> {
        if version != WIF_VERSION {
            return Err(DecodeError::WifVersion(version).into());
        }
        let compressed = match payload.len() {
            32 => false,
            33 if payload[32] == 0x01 => true,
            len => return Err(DecodeError::WifLength(len).into()),
        };
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&payload[..32]);
        let key = Self::from_bytes(bytes, compressed);
        bytes.zeroize();
        Ok(key?)
    }

    /// The raw scalar bytes. Handle with care; used by the deterministic
    /// nonce derivation.
    pub fn bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Whether the WIF carried the compression marker.
    pub fn compressed(&self) -> bool {
        self.compressed
    }

    /// The scalar as an integer.
    pub(crate) fn scalar(&self) -> BigUint {
        BigUint::from_bytes_be(&self.bytes)
    }

    /// Derive the public key `dG`.
    pub fn public_key(&self) -> PublicKey {
        PublicKey { point: generator().mul(&self.scalar()) }
    }
}

impl Clone for SecretKey {
    fn clone(&self) -> Self {
        Self { bytes: self.bytes, compressed: self.compressed }
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("bytes", &"[REDACTED]")
            .field("compressed", &self.compressed)
            .finish()
    }
}

/// A secp256k1 public key (never the identity).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey {
    point: Point,
}

impl PublicKey {
    /// Wrap a parsed point; the identity is not a valid public key.
    pub fn from_point(point: Point) -> Result<Self, CryptoError> {
        if point.is_infinity() {
            return Err(CryptoError::InvalidPublicKey);
        }
        Ok(Self { point })
    }

    /// Parse a SEC1 encoding (33 or 65 bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        Self::from_point(Point::parse(bytes)?)
    }

    /// The underlying curve point.
    pub fn point(&self) -> &Point {
        &self.point
    }

    /// Compressed SEC1 bytes (`02/03 ∥ x`).
    pub fn serialize_compressed(&self) -> [u8; 33] {
        self.point
            .serialize_compressed()
            .expect("public keys are never the identity")
    }

    /// `hash160` of the compressed serialization: the P2PKH pubkey hash.
    pub fn pubkey_hash(&self) -> [u8; 20] {
        hash160(&self.serialize_compressed())
    }
}
