//! Byte-level encodings shared across the toolkit.
//!
//! Covers strict hex, little-endian cursor reads over untrusted buffers,
//! the ledger's variable-length integer, Base58Check, and constant-time
//! byte comparison. Every decoder is total: malformed input maps to a typed
//! [`DecodeError`], never a panic.

use subtle::ConstantTimeEq;

use crate::error::DecodeError;
use crate::types::Hash256;

// ---------------------------------------------------------------------
// Hex
// ---------------------------------------------------------------------

/// Encode bytes as lowercase hex.
pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Decode hex, strictly: even length, case-insensitive, non-hex rejected.
pub fn decode_hex(s: &str) -> Result<Vec<u8>, DecodeError> {
    hex::decode(s).map_err(|e| match e {
        hex::FromHexError::OddLength => DecodeError::HexOddLength,
        hex::FromHexError::InvalidHexCharacter { index, .. } => {
            DecodeError::HexInvalidChar(index)
        }
        // Unreachable for Vec output, kept total.
        hex::FromHexError::InvalidStringLength => DecodeError::HexOddLength,
    })
}

/// Decode hex that must produce exactly `len` bytes.
pub fn decode_hex_exact(s: &str, len: usize) -> Result<Vec<u8>, DecodeError> {
    let bytes = decode_hex(s)?;
    if bytes.len() != len {
        return Err(DecodeError::HexLength { expected: len, got: bytes.len() });
    }
    Ok(bytes)
}

// ---------------------------------------------------------------------
// Cursor reads
// ---------------------------------------------------------------------

/// Bounds-checked forward-only reader over an untrusted byte buffer.
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Consume exactly `n` bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::UnexpectedEof { need: n, have: self.remaining() });
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16, DecodeError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32_le(&mut self) -> Result<u32, DecodeError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u64_le(&mut self) -> Result<u64, DecodeError> {
        let b = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(u64::from_le_bytes(buf))
    }

    /// Read a 32-byte hash in internal order.
    pub fn read_hash(&mut self) -> Result<Hash256, DecodeError> {
        let b = self.take(32)?;
        let mut buf = [0u8; 32];
        buf.copy_from_slice(b);
        Ok(Hash256(buf))
    }

    /// Read a ledger varint, rejecting non-minimal encodings.
    pub fn read_varint(&mut self) -> Result<u64, DecodeError> {
        let eof = |e: DecodeError| match e {
            DecodeError::UnexpectedEof { .. } => DecodeError::VarIntTruncated,
            other => other,
        };
        let tag = self.read_u8().map_err(eof)?;
        match tag {
            0xfd => {
                let v = self.read_u16_le().map_err(eof)? as u64;
                if v < 0xfd {
                    return Err(DecodeError::VarIntNonCanonical);
                }
                Ok(v)
            }
            0xfe => {
                let v = self.read_u32_le().map_err(eof)? as u64;
                if v <= 0xffff {
                    return Err(DecodeError::VarIntNonCanonical);
                }
                Ok(v)
            }
            0xff => {
                let v = self.read_u64_le().map_err(eof)?;
                if v <= 0xffff_ffff {
                    return Err(DecodeError::VarIntNonCanonical);
                }
                Ok(v)
            }
            small => Ok(small as u64),
        }
    }

    /// Require that the entire buffer has been consumed.
    pub fn finish(self) -> Result<(), DecodeError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(DecodeError::TrailingBytes(n)),
        }
    }
}

/// Append a ledger varint to `out`.
pub fn write_varint(out: &mut Vec<u8>, value: u64) {
    match value {
        0..=0xfc => out.push(value as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(value as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(0xfe);
            out.extend_from_slice(&(value as u32).to_le_bytes());
        }
        _ => {
            out.push(0xff);
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
}

// ---------------------------------------------------------------------
// Base58Check
// ---------------------------------------------------------------------

/// Encode `version ∥ payload` with a double-SHA-256 checksum.
pub fn base58check_encode(version: u8, payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(1 + payload.len());
    data.push(version);
    data.extend_from_slice(payload);
    bs58::encode(data).with_check().into_string()
}

/// Decode a Base58Check string into its version byte and payload.
pub fn base58check_decode(s: &str) -> Result<(u8, Vec<u8>), DecodeError> {
    let raw = bs58::decode(s)
        .with_check(None)
        .into_vec()
        .map_err(|e| match e {
            bs58::decode::Error::InvalidCharacter { .. }
            | bs58::decode::Error::NonAsciiCharacter { .. } => DecodeError::Base58Char,
            bs58::decode::Error::InvalidChecksum { .. } => DecodeError::Base58Checksum,
            bs58::decode::Error::NoChecksum => DecodeError::Base58TooShort(s.len()),
            _ => DecodeError::Base58Checksum,
        })?;
    // `raw` is version ∥ payload with the checksum verified and stripped.
    if raw.is_empty() {
        return Err(DecodeError::Base58TooShort(s.len()));
    }
    Ok((raw[0], raw[1..].to_vec()))
}

// ---------------------------------------------------------------------
// Constant-time comparison
// ---------------------------------------------------------------------

/// Constant-time byte equality. Length mismatch returns `false` without
/// inspecting contents.
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
