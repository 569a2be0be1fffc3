//! Error types for the Keel toolkit.
//!
//! Errors are grouped by kind, not by crate: every rejectable condition in
//! the pipeline has a distinct variant with a stable machine-readable reason
//! code. There is no partial success and no silent recovery; each error is
//! fatal for the operation that produced it.
use thiserror::Error;

/// Category of a failure, used by the CLI to pick an exit code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed bytes: hex, Base58, varints, DER, truncated structures.
    Decode,
    /// Envelope or snapshot shape violations: missing fields, wrong types.
    Schema,
    /// Cryptographic binding failures: hashes, proofs, PoW, chain linkage.
    Integrity,
    /// Accepted shapes that violate ledger policy: caps, floors, duplicates.
    Policy,
    /// Key and signature failures.
    Crypto,
    /// Caller-supplied spend parameters that cannot be honored.
    Input,
}

impl ErrorKind {
    /// Process exit code for the enclosing command-line tool.
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::Decode => 2,
            ErrorKind::Schema => 3,
            ErrorKind::Integrity => 4,
            ErrorKind::Policy => 5,
            ErrorKind::Crypto => 6,
            ErrorKind::Input => 7,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("odd-length hex string")] HexOddLength,
    #[error("invalid hex character at offset {0}")] HexInvalidChar(usize),
    #[error("hex length mismatch: expected {expected} bytes, got {got}")] HexLength { expected: usize, got: usize },
    #[error("invalid Base58 character")] Base58Char,
    #[error("Base58Check input too short: {0} bytes")] Base58TooShort(usize),
    #[error("Base58Check checksum mismatch")] Base58Checksum,
    #[error("truncated varint")] VarIntTruncated,
    #[error("non-canonical varint encoding")] VarIntNonCanonical,
    #[error("unexpected end of input: need {need} bytes, {have} remain")] UnexpectedEof { need: usize, have: usize },
    #[error("{0} trailing bytes after structure")] TrailingBytes(usize),
    #[error("malformed DER signature: {0}")] Der(&'static str),
    #[error("unexpected WIF version byte {0:#04x}")] WifVersion(u8),
    #[error("unexpected WIF payload length {0}")] WifLength(usize),
    #[error("block header must be exactly 80 bytes, got {0}")] HeaderLength(usize),
    #[error("truncated header chain file")] ChainFileTruncated,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("missing field: {0}")] MissingField(String),
    #[error("field {field} has wrong type, expected {expected}")] WrongType { field: String, expected: &'static str },
    #[error("unknown format tag: {0:?}")] UnknownFormat(String),
    #[error("unsupported version: {0}")] UnsupportedVersion(u64),
    #[error("envelope is not a JSON object")] NotAnObject,
    #[error("input is not valid JSON")] InvalidJson,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("txid does not match rawTx: declared {declared}, computed {computed}")] TxidMismatch { declared: String, computed: String },
    #[error("blockHash does not match blockHeader")] BlockHashMismatch,
    #[error("vout {vout} out of range: transaction has {count} outputs")] VoutOutOfRange { vout: u64, count: usize },
    #[error("declared {declared} satoshis but output carries {actual}")] ValueMismatch { declared: u64, actual: u64 },
    #[error("Merkle replay does not reach the header root")] MerkleMismatch,
    #[error("proof of work failed: hash above target")] PowFailed,
    #[error("chain link broken at header index {0}")] ChainLinkBroken(usize),
    #[error("chain anchor does not match checkpoint")] AnchorMismatch,
    #[error("cumulative work mismatch: declared {declared}, computed {computed}")] WorkMismatch { declared: String, computed: String },
    #[error("block header not present in the loaded chain")] HeaderNotInChain,
    #[error("snapshot signature does not verify")] SnapshotSignature,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("output script is not pay-to-public-key-hash")] NotP2pkh,
    #[error("satoshi value {0} exceeds the monetary cap")] OverMonetaryCap(u64),
    #[error("zero-value output cannot be spent")] ZeroValue,
    #[error("proof depth {0} exceeds the cap")] ProofTooDeep(usize),
    #[error("adjacent duplicate sibling at proof step {0}")] DuplicateSibling(usize),
    #[error("duplicate outpoint: {0}")] DuplicateOutpoint(String),
    #[error("fee {fee} exceeds {cap} (10% of input value)")] ExcessiveFee { fee: u64, cap: u64 },
    #[error("header target is below the difficulty floor")] BelowDifficultyFloor,
    #[error("header timestamp {0} predates genesis")] TimestampBeforeGenesis(u32),
    #[error("header timestamp {0} too far in the future")] TimestampTooFar(u32),
    #[error("snapshot timestamp {0} too far in the future")] SnapshotTimestampTooFar(u64),
    #[error("snapshot signer is not in the allowed set")] SignerNotAllowed,
    #[error("snapshot height range is inconsistent with header count")] SnapshotRangeMismatch,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid secret key: zero or not below the curve order")] InvalidSecretKey,
    #[error("invalid public key encoding")] InvalidPublicKey,
    #[error("point is not on the curve")] NotOnCurve,
    #[error("signature failed self-verification")] SelfVerifyFailed,
    #[error("nonce generation exhausted")] NonceExhausted,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("invalid destination address: {0}")] BadAddress(String),
    #[error("destination address version {0:#04x} is not pay-to-public-key-hash")] AddressVersion(u8),
    #[error("amount {0} is at or below the dust threshold")] AmountBelowDust(u64),
    #[error("insufficient funds: have {have}, need {need}")] InsufficientFunds { have: u64, need: u64 },
    #[error("no envelopes supplied")] NoEnvelopes,
    #[error("supplied key does not control input {0}")] KeyDoesNotControlInput(String),
    #[error("signing session is {actual}, expected {expected}")] SessionState { expected: &'static str, actual: &'static str },
}

/// Aggregate error for every public Keel operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeelError {
    #[error(transparent)] Decode(#[from] DecodeError),
    #[error(transparent)] Schema(#[from] SchemaError),
    #[error(transparent)] Integrity(#[from] IntegrityError),
    #[error(transparent)] Policy(#[from] PolicyError),
    #[error(transparent)] Crypto(#[from] CryptoError),
    #[error(transparent)] Input(#[from] InputError),
}

impl KeelError {
    /// The category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            KeelError::Decode(_) => ErrorKind::Decode,
            KeelError::Schema(_) => ErrorKind::Schema,
            KeelError::Integrity(_) => ErrorKind::Integrity,
            KeelError::Policy(_) => ErrorKind::Policy,
            KeelError::Crypto(_) => ErrorKind::Crypto,
            KeelError::Input(_) => ErrorKind::Input,
        }
    }

    /// Stable machine-readable reason code for this error.
    ///
    /// Codes are `kind/detail` slugs and never change once released;
    /// callers may branch on them.
    pub fn reason_code(&self) -> &'static str {
        match self {
            KeelError::Decode(e) => match e {
                DecodeError::HexOddLength => "decode/hex-odd-length",
                DecodeError::HexInvalidChar(_) => "decode/hex-invalid-char",
                DecodeError::HexLength { .. } => "decode/hex-length",
                DecodeError::Base58Char => "decode/base58-char",
                DecodeError::Base58TooShort(_) => "decode/base58-short",
                DecodeError::Base58Checksum => "decode/base58-checksum",
                DecodeError::VarIntTruncated => "decode/varint-truncated",
                DecodeError::VarIntNonCanonical => "decode/varint-non-canonical",
                DecodeError::UnexpectedEof { .. } => "decode/eof",
                DecodeError::TrailingBytes(_) => "decode/trailing-bytes",
                DecodeError::Der(_) => "decode/der",
                DecodeError::WifVersion(_) => "decode/wif-version",
                DecodeError::WifLength(_) => "decode/wif-length",
                DecodeError::HeaderLength(_) => "decode/header-length",
                DecodeError::ChainFileTruncated => "decode/chain-file-truncated",
            },
            KeelError::Schema(e) => match e {
                SchemaError::MissingField(_) => "schema/missing-field",
                SchemaError::WrongType { .. } => "schema/wrong-type",
                SchemaError::UnknownFormat(_) => "schema/unknown-format",
                SchemaError::UnsupportedVersion(_) => "schema/unsupported-version",
                SchemaError::NotAnObject => "schema/not-an-object",
                SchemaError::InvalidJson => "schema/invalid-json",
            },
            KeelError::Integrity(e) => match e {
                IntegrityError::TxidMismatch { .. } => "integrity/txid-mismatch",
                IntegrityError::BlockHashMismatch => "integrity/block-hash-mismatch",
                IntegrityError::VoutOutOfRange { .. } => "integrity/vout-out-of-range",
                IntegrityError::ValueMismatch { .. } => "integrity/value-mismatch",
                IntegrityError::MerkleMismatch => "integrity/merkle-mismatch",
                IntegrityError::PowFailed => "integrity/pow-failed",
                IntegrityError::ChainLinkBroken(_) => "integrity/chain-link-broken",
                IntegrityError::AnchorMismatch => "integrity/anchor-mismatch",
                IntegrityError::WorkMismatch { .. } => "integrity/work-mismatch",
                IntegrityError::HeaderNotInChain => "integrity/header-not-in-chain",
                IntegrityError::SnapshotSignature => "integrity/snapshot-signature",
            },
            KeelError::Policy(e) => match e {
                PolicyError::NotP2pkh => "policy/not-p2pkh",
                PolicyError::OverMonetaryCap(_) => "policy/over-monetary-cap",
                PolicyError::ZeroValue => "policy/zero-value",
                PolicyError::ProofTooDeep(_) => "policy/proof-too-deep",
                PolicyError::DuplicateSibling(_) => "policy/duplicate-sibling",
                PolicyError::DuplicateOutpoint(_) => "policy/duplicate-outpoint",
                PolicyError::ExcessiveFee { .. } => "policy/excessive-fee",
                PolicyError::BelowDifficultyFloor => "policy/below-difficulty-floor",
                PolicyError::TimestampBeforeGenesis(_) => "policy/timestamp-before-genesis",
                PolicyError::TimestampTooFar(_) => "policy/timestamp-too-far",
                PolicyError::SnapshotTimestampTooFar(_) => "policy/snapshot-timestamp-too-far",
                PolicyError::SignerNotAllowed => "policy/signer-not-allowed",
                PolicyError::SnapshotRangeMismatch => "policy/snapshot-range-mismatch",
            },
            KeelError::Crypto(e) => match e {
                CryptoError::InvalidSecretKey => "crypto/invalid-secret-key",
                CryptoError::InvalidPublicKey => "crypto/invalid-public-key",
                CryptoError::NotOnCurve => "crypto/not-on-curve",
                CryptoError::SelfVerifyFailed => "crypto/self-verify-failed",
                CryptoError::NonceExhausted => "crypto/nonce-exhausted",
            },
            KeelError::Input(e) => match e {
                InputError::BadAddress(_) => "input/bad-address",
                InputError::AddressVersion(_) => "input/address-version",
                InputError::AmountBelowDust(_) => "input/amount-below-dust",
                InputError::InsufficientFunds { .. } => "input/insufficient-funds",
                InputError::NoEnvelopes => "input/no-envelopes",
                InputError::KeyDoesNotControlInput(_) => "input/key-mismatch",
                InputError::SessionState { .. } => "input/session-state",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_maps_to_distinct_exit_codes() {
        let kinds = [
            ErrorKind::Decode,
            ErrorKind::Schema,
            ErrorKind::Integrity,
            ErrorKind::Policy,
            ErrorKind::Crypto,
            ErrorKind::Input,
        ];
        let mut codes: Vec<u8> = kinds.iter().map(|k| k.exit_code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
        assert!(!codes.contains(&0));
    }

    #[test]
    fn reason_codes_carry_their_kind() {
        let err: KeelError = PolicyError::DuplicateSibling(3).into();
        assert_eq!(err.kind(), ErrorKind::Policy);
        assert!(err.reason_code().starts_with("policy/"));
    }

    #[test]
    fn transparent_display() {
        let err: KeelError = DecodeError::HexOddLength.into();
        assert_eq!(err.to_string(), "odd-length hex string");
    }
}
