//! Hostile-input coverage: every tampered fixture must fail with the
//! documented reason, and nothing may partially succeed.

use serde_json::{Value, json};

use keel_chain::chainfile::ChainView;
use keel_chain::checkpoint::{Checkpoint, VerifierContext};
use keel_core::encoding::{decode_hex, encode_hex};
use keel_core::error::{ErrorKind, InputError, IntegrityError, KeelError, PolicyError};
use keel_core::hashes::hash256;
use keel_core::types::Hash256;
use keel_envelope::Envelope;
use keel_wallet::builder::{FeePolicy, build_and_sign};

use keel_tests::helpers::{
    EASY_BITS, TEST_NOW, address_of, chain_file, funded_envelopes, key, mine_block,
};

fn ctx_for(cp: Checkpoint) -> VerifierContext {
    VerifierContext::new(cp)
}

fn validate(bytes: &[u8], cp: Checkpoint) -> Result<Envelope, KeelError> {
    Envelope::parse_and_validate(bytes, &ctx_for(cp), TEST_NOW)
}

fn as_value(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap()
}

// ----------------------------------------------------------------------
// Proof mutations
// ----------------------------------------------------------------------

#[test]
fn every_mutated_sibling_byte_is_rejected() {
    let signer = key(1);
    let (raw, cp, _) = funded_envelopes(&address_of(&signer), &[60_000]);
    let mut v = as_value(&raw[0]);

    let hex = v["proof"][0]["hash"].as_str().unwrap().to_string();
    let original = decode_hex(&hex).unwrap();
    for byte in [0usize, 13, 31] {
        let mut tampered = original.clone();
        tampered[byte] ^= 0x40;
        v["proof"][0]["hash"] = json!(encode_hex(&tampered));
        let err = validate(&serde_json::to_vec(&v).unwrap(), cp).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity, "byte {byte}");
        assert_eq!(err.reason_code(), "integrity/merkle-mismatch");
    }
}

#[test]
fn duplicated_adjacent_step_is_policy_rejected() {
    let signer = key(1);
    let (raw, cp, _) = funded_envelopes(&address_of(&signer), &[60_000]);
    let mut v = as_value(&raw[0]);

    let step = v["proof"][0].clone();
    v["proof"].as_array_mut().unwrap().insert(0, step);

    let err = validate(&serde_json::to_vec(&v).unwrap(), cp).unwrap_err();
    assert_eq!(err.reason_code(), "policy/duplicate-sibling");
    assert_eq!(err.kind(), ErrorKind::Policy);
}

#[test]
fn oversized_proof_is_policy_rejected() {
    let signer = key(1);
    let (raw, cp, _) = funded_envelopes(&address_of(&signer), &[60_000]);
    let mut v = as_value(&raw[0]);

    let steps: Vec<Value> = (0..=64u8)
        .map(|i| json!({"hash": encode_hex(&[i; 32]), "pos": "R"}))
        .collect();
    v["proof"] = Value::Array(steps);

    assert_eq!(
        validate(&serde_json::to_vec(&v).unwrap(), cp).unwrap_err(),
        PolicyError::ProofTooDeep(65).into()
    );
}

// ----------------------------------------------------------------------
// Binding mutations
// ----------------------------------------------------------------------

#[test]
fn raw_tx_mutation_breaks_txid_binding() {
    let signer = key(1);
    let (raw, cp, _) = funded_envelopes(&address_of(&signer), &[60_000]);
    let mut v = as_value(&raw[0]);

    let mut tx_bytes = decode_hex(v["rawTx"].as_str().unwrap()).unwrap();
    let last = tx_bytes.len() - 1;
    tx_bytes[last] ^= 0x01; // flips locktime
    v["rawTx"] = json!(encode_hex(&tx_bytes));

    let err = validate(&serde_json::to_vec(&v).unwrap(), cp).unwrap_err();
    assert_eq!(err.reason_code(), "integrity/txid-mismatch");
}

#[test]
fn inflated_satoshis_rejected() {
    let signer = key(1);
    let (raw, cp, _) = funded_envelopes(&address_of(&signer), &[60_000]);
    let mut v = as_value(&raw[0]);
    v["satoshis"] = json!(600_000);

    assert_eq!(
        validate(&serde_json::to_vec(&v).unwrap(), cp).unwrap_err(),
        IntegrityError::ValueMismatch { declared: 600_000, actual: 60_000 }.into()
    );
}

#[test]
fn substituted_header_rejected() {
    // A validly mined header whose merkle root has nothing to do with the
    // transaction: PoW passes, replay must not.
    let signer = key(1);
    let (raw, cp, _) = funded_envelopes(&address_of(&signer), &[60_000]);
    let mut v = as_value(&raw[0]);

    let foreign = mine_block(&[Hash256([0x99; 32])], cp.hash, 1_690_000_000);
    v["blockHeader"] = json!(encode_hex(&foreign.serialize()));
    v["blockHash"] = json!(foreign.block_hash().display_hex());

    let err = validate(&serde_json::to_vec(&v).unwrap(), cp).unwrap_err();
    assert_eq!(err.reason_code(), "integrity/merkle-mismatch");
}

// ----------------------------------------------------------------------
// Difficulty floor
// ----------------------------------------------------------------------

#[test]
fn trivially_easy_header_rejected_by_floor() {
    // Reference checkpoint at real mainnet difficulty; the fixture block is
    // mined on a 255-bit target and must fall below the floor.
    let signer = key(1);
    let (raw, mut cp, _) = funded_envelopes(&address_of(&signer), &[60_000]);
    cp.bits = 0x1d00ffff;

    let err = validate(&raw[0], cp).unwrap_err();
    assert_eq!(err.reason_code(), "policy/below-difficulty-floor");
}

// ----------------------------------------------------------------------
// Chain membership and chain files
// ----------------------------------------------------------------------

#[test]
fn block_absent_from_chain_rejected() {
    let signer = key(1);
    let (raw, cp, _) = funded_envelopes(&address_of(&signer), &[60_000]);

    // The chain extends the anchor with an unrelated block.
    let other = mine_block(&[Hash256([0x77; 32])], cp.hash, 1_690_000_000);
    let chain = ChainView::verify(&chain_file(cp.height, &cp.hash, &[other]), &cp, TEST_NOW)
        .unwrap();
    let ctx = VerifierContext::with_chain(cp, chain);

    assert_eq!(
        Envelope::parse_and_validate(&raw[0], &ctx, TEST_NOW).unwrap_err(),
        IntegrityError::HeaderNotInChain.into()
    );
}

#[test]
fn chain_with_reordered_headers_rejected() {
    let cp = Checkpoint { height: 5, hash: hash256(b"cp"), bits: EASY_BITS };
    let a = mine_block(&[Hash256([0x01; 32])], cp.hash, 1_690_000_000);
    let b = mine_block(&[Hash256([0x02; 32])], a.block_hash(), 1_690_000_600);

    let swapped = chain_file(cp.height, &cp.hash, &[b, a]);
    assert_eq!(
        ChainView::verify(&swapped, &cp, TEST_NOW).unwrap_err(),
        IntegrityError::ChainLinkBroken(0).into()
    );
}

#[test]
fn header_chain_rejects_header_level_tampering() {
    let cp = Checkpoint { height: 5, hash: hash256(b"cp"), bits: EASY_BITS };
    let a = mine_block(&[Hash256([0x01; 32])], cp.hash, 1_690_000_000);
    let b = mine_block(&[Hash256([0x02; 32])], a.block_hash(), 1_690_000_600);

    let mut file = chain_file(cp.height, &cp.hash, &[a, b]);
    // Flip one byte inside the first header's merkle root: its hash moves,
    // so either its PoW or the next link must fail.
    file[40 + 36] ^= 0x01;
    let err = ChainView::verify(&file, &cp, TEST_NOW).unwrap_err();
    assert!(
        matches!(
            err,
            KeelError::Integrity(
                IntegrityError::PowFailed | IntegrityError::ChainLinkBroken(_)
            )
        ),
        "unexpected error: {err:?}"
    );
}

// ----------------------------------------------------------------------
// Spend-side policy
// ----------------------------------------------------------------------

fn validated_pair() -> (Vec<Envelope>, Checkpoint) {
    let signer = key(1);
    let (raw, cp, _) = funded_envelopes(&address_of(&signer), &[60_000, 80_000]);
    let ctx = ctx_for(cp);
    let envelopes = raw
        .iter()
        .map(|b| Envelope::parse_and_validate(b, &ctx, TEST_NOW).unwrap())
        .collect();
    (envelopes, cp)
}

#[test]
fn duplicate_outpoint_rejected() {
    let (envelopes, _) = validated_pair();
    let doubled = vec![envelopes[0].clone(), envelopes[0].clone()];
    let err = build_and_sign(
        &doubled,
        &key(1),
        &address_of(&key(2)),
        70_000,
        FeePolicy::PerByte(1),
    )
    .unwrap_err();
    assert_eq!(err.reason_code(), "policy/duplicate-outpoint");
}

#[test]
fn excessive_fee_rejected() {
    let (envelopes, _) = validated_pair();
    let err = build_and_sign(
        &envelopes,
        &key(1),
        &address_of(&key(2)),
        100_000,
        FeePolicy::Explicit(20_000), // > 10% of 140_000
    )
    .unwrap_err();
    assert_eq!(
        err,
        PolicyError::ExcessiveFee { fee: 20_000, cap: 14_000 }.into()
    );
}

#[test]
fn dust_payment_rejected() {
    let (envelopes, _) = validated_pair();
    let err = build_and_sign(
        &envelopes,
        &key(1),
        &address_of(&key(2)),
        546,
        FeePolicy::PerByte(1),
    )
    .unwrap_err();
    assert_eq!(err, InputError::AmountBelowDust(546).into());
}

#[test]
fn insufficient_funds_rejected() {
    let (envelopes, _) = validated_pair();
    let err = build_and_sign(
        &envelopes,
        &key(1),
        &address_of(&key(2)),
        200_000,
        FeePolicy::Explicit(1_000),
    )
    .unwrap_err();
    assert_eq!(
        err,
        InputError::InsufficientFunds { have: 140_000, need: 201_000 }.into()
    );
}

#[test]
fn foreign_key_cannot_sign() {
    let (envelopes, _) = validated_pair();
    // Envelopes pay key(1); key(3) tries to spend them.
    let err = build_and_sign(
        &envelopes,
        &key(3),
        &address_of(&key(2)),
        100_000,
        FeePolicy::PerByte(1),
    )
    .unwrap_err();
    assert_eq!(err.reason_code(), "input/key-mismatch");
}

#[test]
fn wrong_destination_version_rejected() {
    use keel_core::address::Address;
    use keel_core::encoding::base58check_encode;

    let p2sh_style = base58check_encode(0x05, &[0x42; 20]);
    assert_eq!(
        Address::decode(&p2sh_style).unwrap_err(),
        InputError::AddressVersion(0x05).into()
    );
}

// ----------------------------------------------------------------------
// Header edge cases
// ----------------------------------------------------------------------

#[test]
fn future_dated_envelope_header_rejected() {
    let signer = key(1);
    let cp = keel_tests::helpers::easy_checkpoint();
    let tx = keel_tests::helpers::funding_tx(&address_of(&signer), 60_000, 0x20);
    let txids = vec![tx.txid()];
    let header = mine_block(&txids, cp.hash, (TEST_NOW + 100_000) as u32);
    let bytes = keel_tests::helpers::envelope_for(&tx, 0, &header, &txids, 0);

    let err = validate(&bytes, cp).unwrap_err();
    assert_eq!(err.reason_code(), "policy/timestamp-too-far");
}

#[test]
fn pre_genesis_envelope_header_rejected() {
    let signer = key(1);
    let cp = keel_tests::helpers::easy_checkpoint();
    let tx = keel_tests::helpers::funding_tx(&address_of(&signer), 60_000, 0x21);
    let txids = vec![tx.txid()];
    let header = mine_block(&txids, cp.hash, 1_000_000_000);
    let bytes = keel_tests::helpers::envelope_for(&tx, 0, &header, &txids, 0);

    let err = validate(&bytes, cp).unwrap_err();
    assert_eq!(err.reason_code(), "policy/timestamp-before-genesis");
}

#[test]
fn single_transaction_block_envelope_verifies() {
    let signer = key(1);
    let cp = keel_tests::helpers::easy_checkpoint();
    let tx = keel_tests::helpers::funding_tx(&address_of(&signer), 60_000, 0x22);
    let txids = vec![tx.txid()];
    let header = mine_block(&txids, cp.hash, 1_690_000_000);
    let bytes = keel_tests::helpers::envelope_for(&tx, 0, &header, &txids, 0);

    let envelope = validate(&bytes, cp).unwrap();
    assert!(envelope.proof().is_empty());
    assert_eq!(envelope.header(), &header);
}

// ----------------------------------------------------------------------
// Nothing partial: a rejected batch signs nothing
// ----------------------------------------------------------------------

#[test]
fn one_bad_envelope_fails_the_whole_session() {
    use keel_wallet::session::{SessionState, SigningSession};

    let signer = key(1);
    let (mut raw, cp, _) = funded_envelopes(&address_of(&signer), &[60_000, 80_000]);
    let mut v = as_value(&raw[1]);
    v["txid"] = json!(Hash256([0xAB; 32]).display_hex());
    raw[1] = serde_json::to_vec(&v).unwrap();

    let mut session = SigningSession::load(ctx_for(cp), raw);
    assert!(session.validate(TEST_NOW).is_err());
    assert!(matches!(session.state(), SessionState::Rejected(_)));
    assert!(session.envelopes().is_empty());
    assert!(session.signed_transaction().is_none());
}
