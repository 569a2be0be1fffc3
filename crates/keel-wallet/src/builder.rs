//! Spend construction over validated envelopes.
//!
//! Building happens in two phases. [`plan_spend`] turns a set of envelopes
//! plus destination, amount and fee policy into a [`SpendPlan`]: an
//! unsigned skeleton with placeholder unlocking scripts and a fixed fee and
//! change split. [`sign_plan`] then signs every input with one key and
//! reserializes. The split exists so a session can hold a composed,
//! reviewable plan before any secret material is touched.

use std::collections::HashSet;

use tracing::debug;

use keel_core::address::Address;
use keel_core::constants::{
    DUST_THRESHOLD, MAX_FEE_PERCENT, SEQUENCE_FINAL, SIGHASH_ALL_FORKID, TX_VERSION,
};
use keel_core::ecdsa;
use keel_core::error::{InputError, KeelError, PolicyError};
use keel_core::keys::SecretKey;
use keel_core::tx::{OutPoint, Transaction, TxInput, TxOutput};
use keel_core::types::Hash256;

use keel_envelope::Envelope;

use crate::sighash::{InputSpec, sighash};

/// Serialized size of one signed P2PKH input: outpoint, varint, a
/// worst-case unlocking script (73-byte signature push + 33-byte key push),
/// and the sequence.
const INPUT_SIZE: u64 = 148;

/// Serialized size of one P2PKH output.
const OUTPUT_SIZE: u64 = 34;

/// Version, two varint counts, locktime.
const TX_OVERHEAD: u64 = 10;

/// How the caller wants the fee chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeePolicy {
    /// Flat satoshis per estimated byte.
    PerByte(u64),
    /// An explicit total fee.
    Explicit(u64),
}

/// A composed, unsigned spend.
#[derive(Clone, Debug)]
pub struct SpendPlan {
    pub(crate) inputs: Vec<InputSpec>,
    pub(crate) unsigned: Transaction,
    /// Fee actually paid (dust change is folded in here).
    pub fee: u64,
    /// Change returned to the signer; zero when folded.
    pub change: u64,
}

/// A finalized spend ready for broadcast elsewhere.
#[derive(Clone, Debug)]
pub struct SignedTransaction {
    pub tx: Transaction,
    pub fee: u64,
    pub change: u64,
}

impl SignedTransaction {
    /// The broadcastable hex blob.
    pub fn to_hex(&self) -> String {
        self.tx.to_hex()
    }

    /// TXID of the finalized transaction, internal order.
    pub fn txid(&self) -> Hash256 {
        self.tx.txid()
    }
}

/// Compose an unsigned consolidation spend.
///
/// All envelopes are consumed as inputs; outputs are the payment and, when
/// above dust, change to `change_address`. Rejects duplicate outpoints,
/// dust payments, insufficient funds, and fees above ten percent of the
/// input value.
pub fn plan_spend(
    envelopes: &[Envelope],
    change_address: &Address,
    destination: &Address,
    amount: u64,
    fee_policy: FeePolicy,
) -> Result<SpendPlan, KeelError> {
    if envelopes.is_empty() {
        return Err(InputError::NoEnvelopes.into());
    }
    if amount <= DUST_THRESHOLD {
        return Err(InputError::AmountBelowDust(amount).into());
    }

    let mut seen = HashSet::new();
    for envelope in envelopes {
        if !seen.insert(envelope.outpoint()) {
            return Err(PolicyError::DuplicateOutpoint(envelope.outpoint().to_string()).into());
        }
    }

    let mut total: u64 = 0;
    for envelope in envelopes {
        total = total
            .checked_add(envelope.satoshis())
            .ok_or(PolicyError::OverMonetaryCap(u64::MAX))?;
    }

    // Fee over the two-output estimate; a folded change output only makes
    // the estimate conservative.
    let estimated_size =
        TX_OVERHEAD + INPUT_SIZE * envelopes.len() as u64 + OUTPUT_SIZE * 2;
    let fee = match fee_policy {
        FeePolicy::PerByte(rate) => rate.saturating_mul(estimated_size),
        FeePolicy::Explicit(fee) => fee,
    };

    let need = amount
        .checked_add(fee)
        .ok_or(InputError::InsufficientFunds { have: total, need: u64::MAX })?;
    if total < need {
        return Err(InputError::InsufficientFunds { have: total, need }.into());
    }

    let mut change = total - amount - fee;
    let mut fee = fee;
    if change <= DUST_THRESHOLD {
        // Dust change is not worth an output; the miner keeps it.
        fee += change;
        change = 0;
    }

    let cap = (u128::from(total) * u128::from(MAX_FEE_PERCENT) / 100) as u64;
    if fee > cap {
        return Err(PolicyError::ExcessiveFee { fee, cap }.into());
    }

    let inputs: Vec<InputSpec> = envelopes.iter().map(InputSpec::from).collect();
    let skeleton_inputs = inputs
        .iter()
        .map(|spec| TxInput {
            prevout: OutPoint { txid: spec.txid, vout: spec.vout },
            script_sig: Vec::new(),
            sequence: SEQUENCE_FINAL,
        })
        .collect();

    let mut outputs = vec![TxOutput {
        value: amount,
        script_pubkey: destination.script_pubkey().to_vec(),
    }];
    if change > 0 {
        outputs.push(TxOutput {
            value: change,
            script_pubkey: change_address.script_pubkey().to_vec(),
        });
    }

    debug!(
        inputs = inputs.len(),
        amount, fee, change, "spend plan composed"
    );

    Ok(SpendPlan {
        inputs,
        unsigned: Transaction {
            version: TX_VERSION,
            inputs: skeleton_inputs,
            outputs,
            lock_time: 0,
        },
        fee,
        change,
    })
}

/// Sign every input of a plan with one key and finalize the transaction.
///
/// The key must control every input (its pubkey hash must match each
/// envelope's locking script). Each signature is produced deterministically
/// and self-verified by the signing primitive before it is accepted.
pub fn sign_plan(plan: &SpendPlan, key: &SecretKey) -> Result<SignedTransaction, KeelError> {
    let pubkey = key.public_key();
    let pubkey_bytes = pubkey.serialize_compressed();
    let pubkey_hash = pubkey.pubkey_hash();

    for spec in &plan.inputs {
        if spec.pubkey_hash != pubkey_hash {
            let outpoint = OutPoint { txid: spec.txid, vout: spec.vout };
            return Err(InputError::KeyDoesNotControlInput(outpoint.to_string()).into());
        }
    }

    let mut tx = plan.unsigned.clone();
    for index in 0..plan.inputs.len() {
        let z = sighash(
            &plan.inputs,
            index,
            &tx.outputs,
            tx.version,
            tx.lock_time,
        );
        let signature = ecdsa::sign(z.as_bytes(), key)?;

        let mut sig_push = signature.to_der();
        sig_push.push(SIGHASH_ALL_FORKID as u8);

        let mut script_sig = Vec::with_capacity(2 + sig_push.len() + pubkey_bytes.len());
        script_sig.push(sig_push.len() as u8);
        script_sig.extend_from_slice(&sig_push);
        script_sig.push(pubkey_bytes.len() as u8);
        script_sig.extend_from_slice(&pubkey_bytes);

        tx.inputs[index].script_sig = script_sig;
    }

    Ok(SignedTransaction { tx, fee: plan.fee, change: plan.change })
}

/// One-shot convenience: change goes back to the signing key's own address.
pub fn build_and_sign(
    envelopes: &[Envelope],
    key: &SecretKey,
    destination: &Address,
    amount: u64,
    fee_policy: FeePolicy,
) -> Result<SignedTransaction, KeelError> {
    let change_address = Address::from_public_key(&key.public_key());
    let plan = plan_spend(envelopes, &change_address, destination, amount, fee_policy)?;
    sign_plan(&plan, key)
}
