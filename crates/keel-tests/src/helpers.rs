//! Fixture machinery: deterministic keys, mined easy-target blocks, and
//! fully consistent envelopes to feed the validator and builder.

use keel_chain::checkpoint::Checkpoint;
use keel_chain::header::BlockHeader;
use keel_chain::merkle;
use keel_core::address::Address;
use keel_core::constants::SEQUENCE_FINAL;
use keel_core::hashes::hash256;
use keel_core::keys::SecretKey;
use keel_core::tx::{OutPoint, Transaction, TxInput, TxOutput};
use keel_core::types::Hash256;
use keel_envelope::compose_envelope;

/// Frozen wall clock for every test.
pub const TEST_NOW: u64 = 1_700_000_000;

/// A 255-bit target: roughly every second nonce mines.
pub const EASY_BITS: u32 = 0x207fffff;

/// Deterministic secret key from a tag byte.
pub fn key(tag: u8) -> SecretKey {
    let mut bytes = [0u8; 32];
    bytes[31] = tag;
    SecretKey::from_bytes(bytes, true).expect("nonzero tag scalars are valid")
}

/// P2PKH address of a key.
pub fn address_of(key: &SecretKey) -> Address {
    Address::from_public_key(&key.public_key())
}

/// Checkpoint with an easy reference target so fixtures mine instantly.
pub fn easy_checkpoint() -> Checkpoint {
    Checkpoint { height: 100, hash: hash256(b"keel-test-anchor"), bits: EASY_BITS }
}

/// A confirmed funding transaction paying `satoshis` to `recipient`.
///
/// `salt` varies the spent outpoint so each fixture transaction gets a
/// distinct txid.
pub fn funding_tx(recipient: &Address, satoshis: u64, salt: u8) -> Transaction {
    Transaction {
        version: 1,
        inputs: vec![TxInput {
            prevout: OutPoint { txid: Hash256([salt; 32]), vout: 0 },
            script_sig: vec![0x00],
            sequence: SEQUENCE_FINAL,
        }],
        outputs: vec![TxOutput {
            value: satoshis,
            script_pubkey: recipient.script_pubkey().to_vec(),
        }],
        lock_time: 0,
    }
}

/// Mine a header over a txid set on an easy target.
pub fn mine_block(txids: &[Hash256], prev: Hash256, timestamp: u32) -> BlockHeader {
    let mut header = BlockHeader {
        version: 1,
        prev_block: prev,
        merkle_root: merkle::compute_root(txids).expect("blocks are never empty"),
        timestamp,
        bits: EASY_BITS,
        nonce: 0,
    };
    while header.check_pow().is_err() {
        header.nonce += 1;
    }
    header
}

/// Envelope JSON bytes for `txids[index]` inside a mined block.
pub fn envelope_for(
    tx: &Transaction,
    vout: u32,
    header: &BlockHeader,
    txids: &[Hash256],
    index: usize,
) -> Vec<u8> {
    let proof = merkle::build_path(txids, index).expect("index is in range");
    let value = compose_envelope(&tx.serialize(), vout, header, &proof, Some(6))
        .expect("fixture parts are consistent");
    serde_json::to_vec(&value).expect("envelope JSON serializes")
}

/// Serialize a binary chain file.
pub fn chain_file(anchor_height: u32, anchor_hash: &Hash256, headers: &[BlockHeader]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&anchor_height.to_le_bytes());
    out.extend_from_slice(anchor_hash.as_bytes());
    out.extend_from_slice(&(headers.len() as u32).to_le_bytes());
    for header in headers {
        out.extend_from_slice(&header.serialize());
    }
    out
}

/// One mined block paying each of `values` to `recipient`, with filler
/// transactions around them, plus the envelope bytes for every payment.
pub fn funded_envelopes(
    recipient: &Address,
    values: &[u64],
) -> (Vec<Vec<u8>>, Checkpoint, BlockHeader) {
    let cp = easy_checkpoint();

    let txs: Vec<Transaction> = values
        .iter()
        .enumerate()
        .map(|(i, &v)| funding_tx(recipient, v, 0x10 + i as u8))
        .collect();

    let mut txids = vec![Hash256([0xF1; 32])];
    txids.extend(txs.iter().map(Transaction::txid));
    txids.push(Hash256([0xF2; 32]));

    let header = mine_block(&txids, cp.hash, 1_690_000_000);

    let envelopes = txs
        .iter()
        .enumerate()
        .map(|(i, tx)| envelope_for(tx, 0, &header, &txids, i + 1))
        .collect();

    (envelopes, cp, header)
}
