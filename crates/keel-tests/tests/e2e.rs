//! End-to-end flows: envelope bytes in, broadcastable hex out.

use keel_chain::chainfile::ChainView;
use keel_chain::checkpoint::VerifierContext;
use keel_core::constants::{SEQUENCE_FINAL, SIGHASH_ALL_FORKID};
use keel_core::ecdsa::{self, Signature};
use keel_core::encoding::decode_hex;
use keel_core::tx::Transaction;
use keel_envelope::Envelope;
use keel_wallet::builder::{FeePolicy, build_and_sign};
use keel_wallet::session::{SessionState, SigningSession};
use keel_wallet::sighash::{InputSpec, sighash};

use keel_tests::helpers::{
    TEST_NOW, address_of, chain_file, funded_envelopes, key,
};

fn validate_all(raw: &[Vec<u8>], ctx: &VerifierContext) -> Vec<Envelope> {
    raw.iter()
        .map(|bytes| Envelope::parse_and_validate(bytes, ctx, TEST_NOW).unwrap())
        .collect()
}

// ----------------------------------------------------------------------
// Consolidation: two inputs, payment plus change
// ----------------------------------------------------------------------

#[test]
fn consolidates_two_envelopes_with_change() {
    let signer = key(1);
    let (raw, cp, _) = funded_envelopes(&address_of(&signer), &[60_000, 80_000]);
    let ctx = VerifierContext::new(cp);
    let envelopes = validate_all(&raw, &ctx);

    let recipient = address_of(&key(2));
    let signed =
        build_and_sign(&envelopes, &signer, &recipient, 100_000, FeePolicy::PerByte(1)).unwrap();

    // 10 overhead + 2×148 inputs + 2×34 outputs at 1 sat/byte.
    let expected_fee = 10 + 2 * 148 + 2 * 34;
    assert_eq!(signed.fee, expected_fee);
    assert_eq!(signed.change, 140_000 - 100_000 - expected_fee);

    // The emitted hex decodes back to exactly those inputs and outputs.
    let decoded = Transaction::parse(&decode_hex(&signed.to_hex()).unwrap()).unwrap();
    assert_eq!(decoded.inputs.len(), 2);
    assert_eq!(decoded.outputs.len(), 2);
    for (input, envelope) in decoded.inputs.iter().zip(&envelopes) {
        assert_eq!(input.prevout, envelope.outpoint());
        assert_eq!(input.sequence, SEQUENCE_FINAL);
    }
    assert_eq!(decoded.outputs[0].value, 100_000);
    assert_eq!(
        decoded.outputs[0].script_pubkey,
        recipient.script_pubkey().to_vec()
    );
    assert_eq!(decoded.outputs[1].value, signed.change);
    assert_eq!(
        decoded.outputs[1].script_pubkey,
        address_of(&signer).script_pubkey().to_vec()
    );
}

#[test]
fn both_signatures_verify_and_are_low_s() {
    let signer = key(1);
    let (raw, cp, _) = funded_envelopes(&address_of(&signer), &[60_000, 80_000]);
    let ctx = VerifierContext::new(cp);
    let envelopes = validate_all(&raw, &ctx);

    let recipient = address_of(&key(2));
    let signed =
        build_and_sign(&envelopes, &signer, &recipient, 100_000, FeePolicy::PerByte(1)).unwrap();

    let specs: Vec<InputSpec> = envelopes.iter().map(InputSpec::from).collect();
    for (index, input) in signed.tx.inputs.iter().enumerate() {
        let script = &input.script_sig;
        let sig_len = script[0] as usize;
        assert_eq!(script[sig_len], SIGHASH_ALL_FORKID as u8);
        let sig = Signature::from_der(&script[1..sig_len]).unwrap();
        assert!(sig.is_low_s());

        let z = sighash(&specs, index, &signed.tx.outputs, 1, 0);
        assert!(
            ecdsa::verify(z.as_bytes(), &sig, signer.public_key().point()),
            "input {index} signature does not verify"
        );
    }
}

#[test]
fn dust_change_folds_into_fee() {
    let signer = key(1);
    let (raw, cp, _) = funded_envelopes(&address_of(&signer), &[60_000]);
    let ctx = VerifierContext::new(cp);
    let envelopes = validate_all(&raw, &ctx);

    // Leave exactly 300 satoshis of would-be change: below dust.
    let fee = 2_000;
    let amount = 60_000 - fee - 300;
    let signed = build_and_sign(
        &envelopes,
        &signer,
        &address_of(&key(2)),
        amount,
        FeePolicy::Explicit(fee),
    )
    .unwrap();

    assert_eq!(signed.change, 0);
    assert_eq!(signed.fee, fee + 300);
    assert_eq!(signed.tx.outputs.len(), 1);
    assert_eq!(signed.tx.outputs[0].value, amount);
}

#[test]
fn deterministic_end_to_end() {
    let signer = key(1);
    let (raw, cp, _) = funded_envelopes(&address_of(&signer), &[60_000, 80_000]);
    let ctx = VerifierContext::new(cp);

    let run = || {
        let envelopes = validate_all(&raw, &ctx);
        build_and_sign(
            &envelopes,
            &signer,
            &address_of(&key(2)),
            100_000,
            FeePolicy::PerByte(1),
        )
        .unwrap()
        .to_hex()
    };
    assert_eq!(run(), run());
}

// ----------------------------------------------------------------------
// Chain-anchored validation
// ----------------------------------------------------------------------

#[test]
fn envelopes_validate_against_loaded_chain() {
    let signer = key(1);
    let (raw, cp, header) = funded_envelopes(&address_of(&signer), &[60_000, 80_000]);

    let file = chain_file(cp.height, &cp.hash, &[header]);
    let chain = ChainView::verify(&file, &cp, TEST_NOW).unwrap();
    assert_eq!(chain.tip_height(), cp.height + 1);
    let ctx = VerifierContext::with_chain(cp, chain);

    let envelopes = validate_all(&raw, &ctx);
    assert_eq!(envelopes.len(), 2);
}

// ----------------------------------------------------------------------
// Session walk
// ----------------------------------------------------------------------

#[test]
fn session_walks_all_states() {
    let signer = key(1);
    let (raw, cp, _) = funded_envelopes(&address_of(&signer), &[60_000, 80_000]);

    let mut session = SigningSession::load(VerifierContext::new(cp), raw);
    assert_eq!(session.state(), &SessionState::Loaded);

    session.validate(TEST_NOW).unwrap();
    assert_eq!(session.state(), &SessionState::Validated);
    assert_eq!(session.envelopes().len(), 2);

    session
        .compose(&signer, &address_of(&key(2)), 100_000, FeePolicy::PerByte(1))
        .unwrap();
    assert_eq!(session.state(), &SessionState::Composed);
    let (fee, change) = session.plan_summary().unwrap();
    assert_eq!(fee, 374);
    assert_eq!(change, 140_000 - 100_000 - 374);

    session.sign(&signer).unwrap();
    assert_eq!(session.state(), &SessionState::Signed);

    let hex = session.emit().unwrap();
    assert_eq!(session.state(), &SessionState::Emitted);
    assert!(Transaction::parse(&decode_hex(&hex).unwrap()).is_ok());

    // Emission is one-shot.
    assert!(session.emit().is_err());
}

#[test]
fn session_rejects_on_bad_envelope_and_stays_rejected() {
    let signer = key(1);
    let (mut raw, cp, _) = funded_envelopes(&address_of(&signer), &[60_000]);
    // Corrupt the declared value.
    let mut v: serde_json::Value = serde_json::from_slice(&raw[0]).unwrap();
    v["satoshis"] = serde_json::json!(61_000);
    raw[0] = serde_json::to_vec(&v).unwrap();

    let mut session = SigningSession::load(VerifierContext::new(cp), raw);
    assert!(session.validate(TEST_NOW).is_err());
    assert_eq!(session.rejection(), Some("integrity/value-mismatch"));
    assert!(session.sign(&signer).is_err());
}

// ----------------------------------------------------------------------
// Envelope round-trip through its own JSON
// ----------------------------------------------------------------------

#[test]
fn validated_envelope_roundtrips_through_json() {
    let signer = key(1);
    let (raw, cp, _) = funded_envelopes(&address_of(&signer), &[60_000]);
    let ctx = VerifierContext::new(cp);

    let envelope = Envelope::parse_and_validate(&raw[0], &ctx, TEST_NOW).unwrap();
    let rebuilt = serde_json::to_vec(&envelope.to_json()).unwrap();
    let again = Envelope::parse_and_validate(&rebuilt, &ctx, TEST_NOW).unwrap();
    assert_eq!(again.txid(), envelope.txid());
    assert_eq!(again.satoshis(), envelope.satoshis());
    assert_eq!(again.proof().len(), envelope.proof().len());
}
