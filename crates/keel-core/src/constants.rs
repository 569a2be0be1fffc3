//! Ledger constants. All monetary values are in satoshis.

/// Total monetary cap: no output may exceed this value.
pub const MAX_SATOSHIS: u64 = 2_100_000_000_000_000;

/// Outputs at or below this value are uneconomical to spend.
pub const DUST_THRESHOLD: u64 = 546;

/// Signature hash type used for every input: `SIGHASH_ALL | SIGHASH_FORKID`.
pub const SIGHASH_ALL_FORKID: u32 = 0x41;

/// Transaction version emitted by the builder.
pub const TX_VERSION: u32 = 1;

/// Sequence number for every input (no relative locktime).
pub const SEQUENCE_FINAL: u32 = 0xFFFF_FFFF;

/// Timestamp of the genesis block; no valid header predates it.
pub const GENESIS_TIMESTAMP: u32 = 1_231_006_505;

/// Maximum tolerated clock drift into the future, in seconds.
pub const MAX_FUTURE_DRIFT: u64 = 7_200;

/// Maximum number of steps in a Merkle inclusion proof.
pub const MAX_PROOF_DEPTH: usize = 64;

/// Difficulty floor tolerance: a header's target may be at most this many
/// times easier than the reference target (roughly three maximum downward
/// retargets).
pub const DIFFICULTY_TOLERANCE: u32 = 8;

/// WIF version byte for mainnet secret keys.
pub const WIF_VERSION: u8 = 0x80;

/// Base58Check version byte for mainnet P2PKH addresses.
pub const ADDRESS_VERSION: u8 = 0x00;

/// Fee sanity cap: the fee may not exceed this percentage of input value.
pub const MAX_FEE_PERCENT: u64 = 10;

/// Snapshots older than this many seconds are flagged as stale.
pub const SNAPSHOT_STALE_SECS: u64 = 30 * 24 * 3_600;
