//! Stage two: semantic validation and the frozen [`Envelope`].
//!
//! Validation short-circuits in a fixed order so every failure mode has one
//! distinct reason: schema, hex and sizes, txid binding, output shape and
//! value, proof of work with the difficulty floor, Merkle replay, and
//! finally chain membership when a header chain is loaded. After
//! validation the envelope is immutable; downstream code reads, never
//! mutates.

use serde_json::{Value, json};
use tracing::debug;

use keel_core::address::Address;
use keel_core::constants::MAX_SATOSHIS;
use keel_core::encoding::{decode_hex, encode_hex};
use keel_core::error::{IntegrityError, KeelError, PolicyError, SchemaError};
use keel_core::hashes::hash256;
use keel_core::tx::{OutPoint, Transaction};
use keel_core::types::Hash256;

use keel_chain::checkpoint::VerifierContext;
use keel_chain::header::BlockHeader;
use keel_chain::merkle::{self, ProofStep, Sibling, Side};

use crate::raw::{RawEnvelope, RawProofStep};

/// A fully validated envelope. Construction goes through
/// [`Envelope::parse_and_validate`] only; every accessor returns data that
/// has already been bound to the block.
#[derive(Clone, Debug)]
pub struct Envelope {
    txid: Hash256,
    vout: u32,
    satoshis: u64,
    tx: Transaction,
    block_hash: Option<Hash256>,
    header: BlockHeader,
    proof: Vec<ProofStep>,
    confirmations: Option<u64>,
    locked_address: Address,
}

impl Envelope {
    /// Parse and validate envelope bytes against a verifier context.
    ///
    /// `now` is the caller's wall clock, kept explicit so the core stays a
    /// pure function of its inputs.
    pub fn parse_and_validate(
        bytes: &[u8],
        ctx: &VerifierContext,
        now: u64,
    ) -> Result<Self, KeelError> {
        // 1. Schema.
        let raw = RawEnvelope::parse(bytes)?;

        // 2. Hex well-formedness and size constraints.
        let txid = Hash256::from_display_hex(&raw.txid)?;
        let tx_bytes = decode_hex(&raw.raw_tx)?;
        let block_hash = raw
            .block_hash
            .as_deref()
            .map(Hash256::from_display_hex)
            .transpose()?;
        let header_bytes = decode_hex(&raw.block_header)?;
        let header = BlockHeader::parse(&header_bytes)?;
        let proof = convert_proof(&raw.proof)?;

        // 3. The raw transaction must hash to the declared txid.
        let tx = Transaction::parse(&tx_bytes)?;
        let computed_txid = hash256(&tx_bytes);
        if !computed_txid.ct_eq(&txid) {
            return Err(IntegrityError::TxidMismatch {
                declared: txid.display_hex(),
                computed: computed_txid.display_hex(),
            }
            .into());
        }

        // 4. The referenced output must exist and be P2PKH.
        let output = tx
            .outputs
            .get(usize::try_from(raw.vout).unwrap_or(usize::MAX))
            .ok_or(IntegrityError::VoutOutOfRange {
                vout: raw.vout,
                count: tx.outputs.len(),
            })?;
        let locked_address = Address::from_script_pubkey(&output.script_pubkey)?;

        // 5. The declared value must match the output, and sit in range.
        if output.value != raw.satoshis {
            return Err(IntegrityError::ValueMismatch {
                declared: raw.satoshis,
                actual: output.value,
            }
            .into());
        }
        if raw.satoshis == 0 {
            return Err(PolicyError::ZeroValue.into());
        }
        if raw.satoshis > MAX_SATOSHIS {
            return Err(PolicyError::OverMonetaryCap(raw.satoshis).into());
        }

        // 6. The header must carry proof of work above the floor, inside
        //    the timestamp window, and match the optional blockHash.
        if let Some(declared_hash) = &block_hash {
            if !header.block_hash().ct_eq(declared_hash) {
                return Err(IntegrityError::BlockHashMismatch.into());
            }
        }
        header.check_pow()?;
        ctx.check_difficulty_floor(&header)?;
        header.check_timestamp(now)?;

        // 7. Merkle replay from the txid to the header root.
        merkle::verify(&txid, &proof, &header.merkle_root)?;

        // 8. With a chain loaded, the block must be on it.
        ctx.check_chain_membership(&header.block_hash())?;

        debug!(txid = %txid, vout = raw.vout, "envelope validated");

        Ok(Self {
            txid,
            vout: raw.vout as u32,
            satoshis: raw.satoshis,
            tx,
            block_hash,
            header,
            proof,
            confirmations: raw.confirmations,
            locked_address,
        })
    }

    /// Transaction ID (internal order).
    pub fn txid(&self) -> &Hash256 {
        &self.txid
    }

    /// Index of the proven output.
    pub fn vout(&self) -> u32 {
        self.vout
    }

    /// Value of the proven output.
    pub fn satoshis(&self) -> u64 {
        self.satoshis
    }

    /// The full funding transaction.
    pub fn tx(&self) -> &Transaction {
        &self.tx
    }

    /// The block header the proof lands in.
    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    /// The validated inclusion proof.
    pub fn proof(&self) -> &[ProofStep] {
        &self.proof
    }

    /// Advisory confirmation count, if the fetcher supplied one.
    pub fn confirmations(&self) -> Option<u64> {
        self.confirmations
    }

    /// The address the output is locked to.
    pub fn locked_address(&self) -> &Address {
        &self.locked_address
    }

    /// The outpoint this envelope proves.
    pub fn outpoint(&self) -> OutPoint {
        OutPoint { txid: self.txid, vout: self.vout }
    }

    /// Serialize back to envelope JSON. Round-trips through
    /// [`Envelope::parse_and_validate`].
    pub fn to_json(&self) -> Value {
        let mut obj = json!({
            "format": crate::raw::FORMAT_TAG,
            "version": crate::raw::ENVELOPE_VERSION,
            "txid": self.txid.display_hex(),
            "vout": self.vout,
            "satoshis": self.satoshis,
            "rawTx": encode_hex(&self.tx.serialize()),
            "blockHeader": encode_hex(&self.header.serialize()),
            "proof": proof_to_json(&self.proof),
        });
        if let Some(hash) = &self.block_hash {
            obj["blockHash"] = json!(hash.display_hex());
        }
        if let Some(confirmations) = self.confirmations {
            obj["confirmations"] = json!(confirmations);
        }
        obj
    }
}

/// Assemble an envelope JSON from verified parts.
///
/// The txid and block hash are derived, never caller-supplied, so a bundle
/// produced here always satisfies the hash bindings. The result still goes
/// through full validation before signing.
pub fn compose_envelope(
    raw_tx: &[u8],
    vout: u32,
    header: &BlockHeader,
    proof: &[ProofStep],
    confirmations: Option<u64>,
) -> Result<Value, KeelError> {
    let tx = Transaction::parse(raw_tx)?;
    let output = tx.outputs.get(vout as usize).ok_or(IntegrityError::VoutOutOfRange {
        vout: u64::from(vout),
        count: tx.outputs.len(),
    })?;
    Ok(json!({
        "format": crate::raw::FORMAT_TAG,
        "version": crate::raw::ENVELOPE_VERSION,
        "txid": hash256(raw_tx).display_hex(),
        "vout": vout,
        "satoshis": output.value,
        "rawTx": encode_hex(raw_tx),
        "blockHash": header.block_hash().display_hex(),
        "blockHeader": encode_hex(&header.serialize()),
        "proof": proof_to_json(proof),
    }))
}

fn proof_to_json(proof: &[ProofStep]) -> Value {
    Value::Array(
        proof
            .iter()
            .map(|step| {
                let hash = match step.sibling {
                    Sibling::Hash(h) => encode_hex(h.as_bytes()),
                    Sibling::Duplicate => "*".to_string(),
                };
                let pos = match step.side {
                    Side::Left => "L",
                    Side::Right => "R",
                };
                json!({"hash": hash, "pos": pos})
            })
            .collect(),
    )
}

/// Decode wire proof steps: `"*"` folds, 64-hex siblings, `L`/`R` sides.
fn convert_proof(raw: &[RawProofStep]) -> Result<Vec<ProofStep>, KeelError> {
    let mut steps = Vec::with_capacity(raw.len());
    for (i, step) in raw.iter().enumerate() {
        let sibling = if step.hash == "*" {
            Sibling::Duplicate
        } else {
            Sibling::Hash(Hash256::from_internal_hex(&step.hash)?)
        };
        let side = match step.pos.as_str() {
            "L" => Side::Left,
            "R" => Side::Right,
            _ => {
                return Err(SchemaError::WrongType {
                    field: format!("proof[{i}].pos"),
                    expected: r#""L" or "R""#,
                }
                .into());
            }
        };
        steps.push(ProofStep { sibling, side });
    }
    Ok(steps)
}
