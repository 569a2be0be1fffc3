//! # keel-core
//! Deterministic cryptographic foundation for the Keel toolkit: hash
//! primitives, byte encodings, secp256k1 arithmetic, RFC-6979 ECDSA,
//! key and address handling, and raw transaction parsing.

pub mod address;
pub mod constants;
pub mod curve;
pub mod ecdsa;
pub mod encoding;
pub mod error;
pub mod hashes;
pub mod keys;
pub mod schema;
pub mod tx;
pub mod types;
