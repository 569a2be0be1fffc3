//! secp256k1 group arithmetic.
//!
//! The curve is `y² = x³ + 7` over the prime field `F_p`. Points are kept in
//! affine coordinates with an explicit identity; scalar multiplication uses a
//! Montgomery ladder with a fixed 256-iteration schedule so the operation
//! sequence does not depend on the scalar's bit pattern. Field inversion goes
//! through Fermat's little theorem (`a^(p-2) mod p`) rather than the
//! variable-time extended Euclid.

use num_bigint::BigUint;
use num_traits::{One, Zero};
use std::sync::LazyLock;

use crate::error::CryptoError;

const P_HEX: &str = "fffffffffffffffffffffffffffffffffffffffffffffffffffffffefffffc2f";
const N_HEX: &str = "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141";
const GX_HEX: &str = "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
const GY_HEX: &str = "483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8";

struct CurveParams {
    p: BigUint,
    n: BigUint,
    half_n: BigUint,
    /// `(p + 1) / 4`, the square-root exponent for `p ≡ 3 (mod 4)`.
    sqrt_exp: BigUint,
    g: Point,
}

static CURVE: LazyLock<CurveParams> = LazyLock::new(|| {
    let p = from_hex(P_HEX);
    let n = from_hex(N_HEX);
    let half_n = &n >> 1;
    let sqrt_exp = (&p + BigUint::one()) >> 2;
    let g = Point::from_coords(from_hex(GX_HEX), from_hex(GY_HEX));
    CurveParams { p, n, half_n, sqrt_exp, g }
});

fn from_hex(s: &str) -> BigUint {
    BigUint::parse_bytes(s.as_bytes(), 16).expect("curve constants are valid hex")
}

/// The field prime `p`.
pub fn field_prime() -> &'static BigUint {
    &CURVE.p
}

/// The group order `n`.
pub fn curve_order() -> &'static BigUint {
    &CURVE.n
}

/// `⌊n / 2⌋`, the low-S boundary.
pub fn half_order() -> &'static BigUint {
    &CURVE.half_n
}

/// The generator `G`.
pub fn generator() -> &'static Point {
    &CURVE.g
}

/// Left-pad a value to 32 big-endian bytes.
pub fn to_32_bytes(value: &BigUint) -> [u8; 32] {
    let raw = value.to_bytes_be();
    let mut out = [0u8; 32];
    out[32 - raw.len()..].copy_from_slice(&raw);
    out
}

/// Modular inverse in `F_p` via Fermat: `a^(p-2)`.
fn fe_inv(a: &BigUint, p: &BigUint) -> BigUint {
    a.modpow(&(p - BigUint::from(2u8)), p)
}

/// `a - b mod p` without going negative.
fn fe_sub(a: &BigUint, b: &BigUint, p: &BigUint) -> BigUint {
    ((a + p) - b) % p
}

/// A point on secp256k1, or the group identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Point {
    /// `None` encodes the point at infinity.
    coords: Option<(BigUint, BigUint)>,
}

impl Point {
    /// The group identity.
    pub fn infinity() -> Self {
        Self { coords: None }
    }

    fn from_coords(x: BigUint, y: BigUint) -> Self {
        Self { coords: Some((x, y)) }
    }

    /// Construct from affine coordinates, verifying the curve equation.
    pub fn new(x: BigUint, y: BigUint) -> Result<Self, CryptoError> {
        let p = field_prime();
        if x >= *p || y >= *p || !on_curve(&x, &y, p) {
            return Err(CryptoError::NotOnCurve);
        }
        Ok(Self::from_coords(x, y))
    }

    pub fn is_infinity(&self) -> bool {
        self.coords.is_none()
    }

    /// The affine x coordinate, if not the identity.
    pub fn x(&self) -> Option<&BigUint> {
        self.coords.as_ref().map(|(x, _)| x)
    }

    /// The affine y coordinate, if not the identity.
    pub fn y(&self) -> Option<&BigUint> {
        self.coords.as_ref().map(|(_, y)| y)
    }

    /// Group addition with all affine special cases.
    pub fn add(&self, other: &Point) -> Point {
        let (x1, y1) = match &self.coords {
            None => return other.clone(),
            Some(c) => c,
        };
        let (x2, y2) = match &other.coords {
            None => return self.clone(),
            Some(c) => c,
        };
        let p = field_prime();

        if x1 == x2 {
            if y1 == y2 {
                return self.double();
            }
            // x1 == x2, y1 == -y2: vertical line.
            return Point::infinity();
        }

        let lambda = (fe_sub(y2, y1, p) * fe_inv(&fe_sub(x2, x1, p), p)) % p;
        let x3 = fe_sub(&fe_sub(&(&lambda * &lambda % p), x1, p), x2, p);
        let y3 = fe_sub(&(&lambda * fe_sub(x1, &x3, p) % p), y1, p);
        Point::from_coords(x3, y3)
    }

    /// Point doubling.
    pub fn double(&self) -> Point {
        let (x, y) = match &self.coords {
            None => return Point::infinity(),
            Some(c) => c,
        };
        let p = field_prime();
        if y.is_zero() {
            return Point::infinity();
        }

        let three = BigUint::from(3u8);
        let two = BigUint::from(2u8);
        let lambda = (three * x * x % p) * fe_inv(&(two * y % p), p) % p;
        let x3 = fe_sub(&fe_sub(&(&lambda * &lambda % p), x, p), x, p);
        let y3 = fe_sub(&(&lambda * fe_sub(x, &x3, p) % p), y, p);
        Point::from_coords(x3, y3)
    }

    /// Scalar multiplication by Montgomery ladder.
    ///
    /// Always walks 256 bits so the iteration count is independent of the
    /// scalar. The scalar is taken modulo the group order first.
    pub fn mul(&self, k: &BigUint) -> Point {
        let k = k % curve_order();
        let mut r0 = Point::infinity();
        let mut r1 = self.clone();
        for i in (0..256).rev() {
            if k.bit(i) {
                r0 = r0.add(&r1);
                r1 = r1.double();
            } else {
                r1 = r0.add(&r1);
                r0 = r0.double();
            }
        }
        r0
    }

    /// Compressed SEC1 serialization: `02/03 ∥ x`.
    pub fn serialize_compressed(&self) -> Result<[u8; 33], CryptoError> {
        let (x, y) = self.coords.as_ref().ok_or(CryptoError::InvalidPublicKey)?;
        let mut out = [0u8; 33];
        out[0] = if y.bit(0) { 0x03 } else { 0x02 };
        out[1..].copy_from_slice(&to_32_bytes(x));
        Ok(out)
    }

    /// Uncompressed SEC1 serialization: `04 ∥ x ∥ y`.
    pub fn serialize_uncompressed(&self) -> Result<[u8; 65], CryptoError> {
        let (x, y) = self.coords.as_ref().ok_or(CryptoError::InvalidPublicKey)?;
        let mut out = [0u8; 65];
        out[0] = 0x04;
        out[1..33].copy_from_slice(&to_32_bytes(x));
        out[33..].copy_from_slice(&to_32_bytes(y));
        Ok(out)
    }

    /// Parse a SEC1 point, compressed or uncompressed.
    ///
    /// Decompression solves `y² = x³ + 7` and picks the root whose parity
    /// matches the sign byte.
    pub fn parse(bytes: &[u8]) -> Result<Point, CryptoError> {
        let p = field_prime();
        match bytes {
            [sign @ (0x02 | 0x03), x_bytes @ ..] if x_bytes.len() == 32 => {
                let x = BigUint::from_bytes_be(x_bytes);
                if x >= *p {
                    return Err(CryptoError::InvalidPublicKey);
                }
                let rhs = (x.modpow(&BigUint::from(3u8), p) + BigUint::from(7u8)) % p;
                let y = rhs.modpow(&CURVE.sqrt_exp, p);
                // p ≡ 3 (mod 4): the candidate is a root iff rhs is a square.
                if (&y * &y) % p != rhs {
                    return Err(CryptoError::NotOnCurve);
                }
                let y = if y.bit(0) == (*sign == 0x03) { y } else { fe_sub(p, &y, p) };
                Ok(Point::from_coords(x, y))
            }
            [0x04, rest @ ..] if rest.len() == 64 => {
                let x = BigUint::from_bytes_be(&rest[..32]);
                let y = BigUint::from_bytes_be(&rest[32..]);
                Point::new(x, y)
            }
            _ => Err(CryptoError::InvalidPublicKey),
        }
    }
}

fn on_curve(x: &BigUint, y: &BigUint, p: &BigUint) -> bool {
    let lhs = (y * y) % p;
    let rhs = (x.modpow(&BigUint::from(3u8), p) + BigUint::from(7u8)) % p;
    lhs == rhs
}
