//! Deterministic ECDSA over secp256k1.
//!
//! Nonces come from RFC 6979 (HMAC-SHA-256 expansion with rejection
//! sampling into `[1, n-1]`), so signing the same message with the same key
//! is bit-reproducible. Emitted signatures are low-S normalized and DER
//! encoded in minimal form, and every signature is verified against the
//! derived public key before it leaves the signer.

use num_bigint::BigUint;
use num_traits::Zero;

use crate::curve::{self, Point, curve_order, generator, half_order};
use crate::error::{CryptoError, DecodeError};
use crate::hashes::hmac_sha256;
use crate::keys::SecretKey;

/// Upper bound on nonce candidates per signature. RFC 6979 rejection is
/// astronomically unlikely to recur; this only bounds the loop.
const MAX_NONCE_ATTEMPTS: usize = 128;

/// An ECDSA signature as a scalar pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub r: BigUint,
    pub s: BigUint,
}

impl Signature {
    /// Whether `s` is in the lower half of the group order (BIP-146).
    pub fn is_low_s(&self) -> bool {
        self.s <= *half_order()
    }

    /// DER encoding: `30 len 02 rlen r 02 slen s`, minimal integers.
    pub fn to_der(&self) -> Vec<u8> {
        let r = der_integer(&self.r);
        let s = der_integer(&self.s);
        let mut out = Vec::with_capacity(6 + r.len() + s.len());
        out.push(0x30);
        out.push((4 + r.len() + s.len()) as u8);
        out.push(0x02);
        out.push(r.len() as u8);
        out.extend_from_slice(&r);
        out.push(0x02);
        out.push(s.len() as u8);
        out.extend_from_slice(&s);
        out
    }

    /// Strict DER parse: exact length, minimal non-negative integers.
    pub fn from_der(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < 6 {
            return Err(DecodeError::Der("too short"));
        }
        if bytes[0] != 0x30 {
            return Err(DecodeError::Der("missing sequence tag"));
        }
        if bytes[1] as usize != bytes.len() - 2 {
            return Err(DecodeError::Der("sequence length mismatch"));
        }
        let (r, rest) = der_read_integer(&bytes[2..])?;
        let (s, rest) = der_read_integer(rest)?;
        if !rest.is_empty() {
            return Err(DecodeError::Der("trailing bytes"));
        }
        Ok(Self { r, s })
    }
}

/// Minimal big-endian DER integer body: no leading zero unless the high bit
/// would flip the sign.
fn der_integer(value: &BigUint) -> Vec<u8> {
    let mut bytes = value.to_bytes_be();
    if bytes[0] & 0x80 != 0 {
        bytes.insert(0, 0x00);
    }
    bytes
}

fn der_read_integer(bytes: &[u8]) -> Result<(BigUint, &[u8]), DecodeError> {
    if bytes.len() < 2 {
        return Err(DecodeError::Der("truncated integer"));
    }
    if bytes[0] != 0x02 {
        return Err(DecodeError::Der("missing integer tag"));
    }
    let len = bytes[1] as usize;
    if len == 0 {
        return Err(DecodeError::Der("empty integer"));
    }
    let body = bytes.get(2..2 + len).ok_or(DecodeError::Der("truncated integer"))?;
    if body[0] & 0x80 != 0 {
        return Err(DecodeError::Der("negative integer"));
    }
    if len > 1 && body[0] == 0x00 && body[1] & 0x80 == 0 {
        return Err(DecodeError::Der("non-minimal integer"));
    }
    Ok((BigUint::from_bytes_be(body), &bytes[2 + len..]))
}

/// RFC 6979 §3.2 nonce stream for one `(key, message)` pair.
///
/// Successive calls continue the same HMAC chain, which is what the RFC
/// prescribes when a candidate is rejected further up (`r = 0` or `s = 0`).
struct NonceGenerator {
    k: [u8; 32],
    v: [u8; 32],
    fresh: bool,
}

impl NonceGenerator {
    fn new(secret: &[u8; 32], z: &[u8; 32]) -> Self {
        // bits2octets: reduce the message mod n, re-pad to 32 bytes.
        let z_red = BigUint::from_bytes_be(z) % curve_order();
        let h1 = curve::to_32_bytes(&z_red);

        let mut k = [0u8; 32];
        let mut v = [0x01u8; 32];

        let mut seed = Vec::with_capacity(32 + 1 + 32 + 32);
        seed.extend_from_slice(&v);
        seed.push(0x00);
        seed.extend_from_slice(secret);
        seed.extend_from_slice(&h1);
        k = hmac_sha256(&k, &seed);
        v = hmac_sha256(&k, &v);

        seed.clear();
        seed.extend_from_slice(&v);
        seed.push(0x01);
        seed.extend_from_slice(secret);
        seed.extend_from_slice(&h1);
        k = hmac_sha256(&k, &seed);
        v = hmac_sha256(&k, &v);

        Self { k, v, fresh: true }
    }

    /// Next candidate in `[1, n-1]`.
    fn next_nonce(&mut self) -> BigUint {
        loop {
            if !self.fresh {
                // Previous candidate was rejected: reseed K and V.
                let mut msg = [0u8; 33];
                msg[..32].copy_from_slice(&self.v);
                self.k = hmac_sha256(&self.k, &msg);
                self.v = hmac_sha256(&self.k, &self.v);
            }
            self.fresh = false;
            self.v = hmac_sha256(&self.k, &self.v);
            let candidate = BigUint::from_bytes_be(&self.v);
            if !candidate.is_zero() && candidate < *curve_order() {
                return candidate;
            }
        }
    }
}

/// Sign a 32-byte message hash.
///
/// Low-S normalized, self-verified against the derived public key. Refuses
/// to emit anything it cannot verify.
pub fn sign(z: &[u8; 32], secret: &SecretKey) -> Result<Signature, CryptoError> {
    let n = curve_order();
    let d = secret.scalar();
    let z_int = BigUint::from_bytes_be(z) % n;
    let mut nonces = NonceGenerator::new(secret.bytes(), z);

    for _ in 0..MAX_NONCE_ATTEMPTS {
        let k = nonces.next_nonce();
        let r_point = generator().mul(&k);
        let r = match r_point.x() {
            Some(x) => x % n,
            None => continue,
        };
        if r.is_zero() {
            continue;
        }

        let k_inv = k.modpow(&(n - BigUint::from(2u8)), n);
        let mut s = (k_inv * (&z_int + &r * &d)) % n;
        if s.is_zero() {
            continue;
        }
        if s > *half_order() {
            s = n - s;
        }

        let sig = Signature { r, s };
        let q = generator().mul(&d);
        if !verify(z, &sig, &q) {
            return Err(CryptoError::SelfVerifyFailed);
        }
        return Ok(sig);
    }
    Err(CryptoError::NonceExhausted)
}

/// Standard ECDSA verification.
///
/// Rejects `r, s ∉ [1, n-1]`; accepts iff `(u₁G + u₂Q).x ≡ r (mod n)`.
pub fn verify(z: &[u8; 32], sig: &Signature, pubkey: &Point) -> bool {
    let n = curve_order();
    if sig.r.is_zero() || sig.r >= *n || sig.s.is_zero() || sig.s >= *n {
        return false;
    }
    if pubkey.is_infinity() {
        return false;
    }

    let z_int = BigUint::from_bytes_be(z) % n;
    let s_inv = sig.s.modpow(&(n - BigUint::from(2u8)), n);
    let u1 = (&z_int * &s_inv) % n;
    let u2 = (&sig.r * &s_inv) % n;

    let x_point = generator().mul(&u1).add(&pubkey.mul(&u2));
    match x_point.x() {
        Some(x) => x % n == sig.r,
        None => false,
    }
}
