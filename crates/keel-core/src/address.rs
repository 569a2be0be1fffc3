//! Pay-to-public-key-hash addresses.
//!
//! Addresses are Base58Check with version byte `0x00` over a 20-byte
//! `hash160` of the compressed public key. The only script shape the
//! toolkit understands is the 25-byte P2PKH locking script
//! `OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG`.

use std::fmt;
use std::str::FromStr;

use crate::constants::ADDRESS_VERSION;
use crate::encoding::{base58check_decode, base58check_encode};
use crate::error::{InputError, KeelError, PolicyError};
use crate::keys::PublicKey;

const OP_DUP: u8 = 0x76;
const OP_HASH160: u8 = 0xa9;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_CHECKSIG: u8 = 0xac;

/// Length of a P2PKH locking script.
pub const P2PKH_SCRIPT_LEN: usize = 25;

/// A mainnet P2PKH address wrapping a 20-byte pubkey hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Address {
    pubkey_hash: [u8; 20],
}

impl Address {
    /// Wrap an existing pubkey hash.
    pub fn from_pubkey_hash(pubkey_hash: [u8; 20]) -> Self {
        Self { pubkey_hash }
    }

    /// The address of a public key (hash160 of its compressed form).
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        Self { pubkey_hash: public_key.pubkey_hash() }
    }

    /// Decode a Base58Check address string.
    ///
    /// Any Base58 defect is reported as an invalid destination; a valid
    /// encoding with a non-zero version byte is rejected separately so the
    /// caller can distinguish "garbled" from "not a P2PKH address".
    pub fn decode(s: &str) -> Result<Self, KeelError> {
        let (version, payload) =
            base58check_decode(s).map_err(|e| InputError::BadAddress(e.to_string()))?;
        if version != ADDRESS_VERSION {
            return Err(InputError::AddressVersion(version).into());
        }
        let pubkey_hash: [u8; 20] = payload
            .as_slice()
            .try_into()
            .map_err(|_| InputError::BadAddress(format!("{}-byte payload", payload.len())))?;
        Ok(Self { pubkey_hash })
    }

    /// Base58Check string form.
    pub fn encode(&self) -> String {
        base58check_encode(ADDRESS_VERSION, &self.pubkey_hash)
    }

    /// The 20-byte pubkey hash.
    pub fn pubkey_hash(&self) -> &[u8; 20] {
        &self.pubkey_hash
    }

    /// The 25-byte P2PKH locking script for this address.
    pub fn script_pubkey(&self) -> [u8; P2PKH_SCRIPT_LEN] {
        let mut script = [0u8; P2PKH_SCRIPT_LEN];
        script[0] = OP_DUP;
        script[1] = OP_HASH160;
        script[2] = 20; // push length
        script[3..23].copy_from_slice(&self.pubkey_hash);
        script[23] = OP_EQUALVERIFY;
        script[24] = OP_CHECKSIG;
        script
    }

    /// Recognize a P2PKH locking script and extract its pubkey hash.
    ///
    /// Anything other than the exact 25-byte shape is rejected.
    pub fn from_script_pubkey(script: &[u8]) -> Result<Self, PolicyError> {
        let ok = script.len() == P2PKH_SCRIPT_LEN
            && script[0] == OP_DUP
            && script[1] == OP_HASH160
            && script[2] == 20
            && script[23] == OP_EQUALVERIFY
            && script[24] == OP_CHECKSIG;
        if !ok {
            return Err(PolicyError::NotP2pkh);
        }
        let mut pubkey_hash = [0u8; 20];
        pubkey_hash.copy_from_slice(&script[3..23]);
        Ok(Self { pubkey_hash })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Address {
    type Err = KeelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}
