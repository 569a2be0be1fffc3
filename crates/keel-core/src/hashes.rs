//! Hash primitives: SHA-256, RIPEMD-160, HMAC-SHA-256 and the two derived
//! ledger digests `hash256 = SHA-256 ∘ SHA-256` and
//! `hash160 = RIPEMD-160 ∘ SHA-256`.
//!
//! Inputs are byte slices; the largest message hashed anywhere in the
//! toolkit is a signature preimage of a few hundred bytes, so there is no
//! streaming surface.

use hmac::{Hmac, Mac};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::types::Hash256;

/// Single SHA-256.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Double SHA-256, the ledger's transaction/header digest.
pub fn hash256(data: &[u8]) -> Hash256 {
    Hash256(Sha256::digest(Sha256::digest(data)).into())
}

/// RIPEMD-160.
pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(data).into()
}

/// RIPEMD-160 of SHA-256, the ledger's public-key digest.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(Sha256::digest(data)).into()
}

/// HMAC-SHA-256 with an arbitrary-length key.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}
