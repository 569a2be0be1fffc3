//! Fork-id signature hash preimages.
//!
//! The preimage follows the BIP-143 shape with the fork-identifier flag in
//! the sighash type: `SIGHASH_ALL | SIGHASH_FORKID = 0x41`. Every input is
//! signed with the final sequence and the full output set, so the
//! aggregate hashes (`hashPrevouts`, `hashSequence`, `hashOutputs`) are
//! fixed per transaction and only the outpoint, script code and value vary
//! per input.

use keel_core::constants::{SEQUENCE_FINAL, SIGHASH_ALL_FORKID};
use keel_core::encoding::write_varint;
use keel_core::hashes::hash256;
use keel_core::tx::TxOutput;
use keel_core::types::Hash256;

use keel_envelope::Envelope;

/// What the signer needs to know about one input: the outpoint, its value,
/// and the pubkey hash its script commits to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputSpec {
    /// Funding txid, internal order.
    pub txid: Hash256,
    pub vout: u32,
    pub satoshis: u64,
    pub pubkey_hash: [u8; 20],
}

impl From<&Envelope> for InputSpec {
    fn from(envelope: &Envelope) -> Self {
        Self {
            txid: *envelope.txid(),
            vout: envelope.vout(),
            satoshis: envelope.satoshis(),
            pubkey_hash: *envelope.locked_address().pubkey_hash(),
        }
    }
}

/// The P2PKH script code for a pubkey hash, varint-length prefixed as it
/// appears in the preimage: `0x19 0x1976a914 ∥ hash ∥ 0x88ac`.
fn script_code(pubkey_hash: &[u8; 20]) -> [u8; 26] {
    let mut out = [0u8; 26];
    out[0] = 25;
    out[1] = 0x76;
    out[2] = 0xa9;
    out[3] = 0x14;
    out[4..24].copy_from_slice(pubkey_hash);
    out[24] = 0x88;
    out[25] = 0xac;
    out
}

/// Build the preimage for `inputs[index]`.
pub fn fork_id_preimage(
    inputs: &[InputSpec],
    index: usize,
    outputs: &[TxOutput],
    version: u32,
    lock_time: u32,
) -> Vec<u8> {
    let signed = &inputs[index];

    let mut prevouts = Vec::with_capacity(inputs.len() * 36);
    for input in inputs {
        prevouts.extend_from_slice(input.txid.as_bytes());
        prevouts.extend_from_slice(&input.vout.to_le_bytes());
    }
    let hash_prevouts = hash256(&prevouts);

    let sequences: Vec<u8> = inputs
        .iter()
        .flat_map(|_| SEQUENCE_FINAL.to_le_bytes())
        .collect();
    let hash_sequence = hash256(&sequences);

    let mut serialized_outputs = Vec::new();
    for output in outputs {
        serialized_outputs.extend_from_slice(&output.value.to_le_bytes());
        write_varint(&mut serialized_outputs, output.script_pubkey.len() as u64);
        serialized_outputs.extend_from_slice(&output.script_pubkey);
    }
    let hash_outputs = hash256(&serialized_outputs);

    let mut preimage = Vec::with_capacity(4 + 32 + 32 + 36 + 26 + 8 + 4 + 32 + 4 + 4);
    preimage.extend_from_slice(&version.to_le_bytes());
    preimage.extend_from_slice(hash_prevouts.as_bytes());
    preimage.extend_from_slice(hash_sequence.as_bytes());
    preimage.extend_from_slice(signed.txid.as_bytes());
    preimage.extend_from_slice(&signed.vout.to_le_bytes());
    preimage.extend_from_slice(&script_code(&signed.pubkey_hash));
    preimage.extend_from_slice(&signed.satoshis.to_le_bytes());
    preimage.extend_from_slice(&SEQUENCE_FINAL.to_le_bytes());
    preimage.extend_from_slice(hash_outputs.as_bytes());
    preimage.extend_from_slice(&lock_time.to_le_bytes());
    preimage.extend_from_slice(&SIGHASH_ALL_FORKID.to_le_bytes());
    preimage
}

/// The message hash fed to ECDSA: `hash256` of the preimage.
pub fn sighash(
    inputs: &[InputSpec],
    index: usize,
    outputs: &[TxOutput],
    version: u32,
    lock_time: u32,
) -> Hash256 {
    hash256(&fork_id_preimage(inputs, index, outputs, version, lock_time))
}
