//! Shared value types.
//!
//! Hashes live in **internal byte order** (the order they come out of the
//! hash function and the order they are serialized in headers and
//! transactions). User-facing hex is byte-reversed; [`Hash256::display_hex`]
//! and [`Hash256::from_display_hex`] perform the flip.

use std::fmt;
use subtle::ConstantTimeEq;

use crate::encoding;
use crate::error::DecodeError;

/// A 32-byte hash in internal byte order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// The zero hash (32 zero bytes).
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create a Hash256 from a byte array in internal order.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The underlying bytes in internal order.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The same hash with its bytes reversed.
    pub fn reversed(&self) -> Self {
        let mut out = self.0;
        out.reverse();
        Self(out)
    }

    /// Render as user-facing hex (byte-reversed).
    pub fn display_hex(&self) -> String {
        encoding::encode_hex(&self.reversed().0)
    }

    /// Parse user-facing hex (byte-reversed) into internal order.
    ///
    /// Rejects anything that is not exactly 64 hex characters.
    pub fn from_display_hex(s: &str) -> Result<Self, DecodeError> {
        Ok(Self::from_internal_hex(s)?.reversed())
    }

    /// Parse hex that is already in internal byte order.
    pub fn from_internal_hex(s: &str) -> Result<Self, DecodeError> {
        let bytes = encoding::decode_hex_exact(s, 32)?;
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }

    /// Constant-time equality, for use on every verification decision.
    pub fn ct_eq(&self, other: &Self) -> bool {
        self.0.as_slice().ct_eq(other.0.as_slice()).into()
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_hex())
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
