//! Stage one: untyped JSON into a shape-checked raw record.
//!
//! Only presence and JSON types are verified here, plus the two fixed
//! constants (`format`, `version`). Hex decoding, size constraints and all
//! semantic binding happen in stage two.

use serde_json::Value;

use keel_core::error::{KeelError, SchemaError};
use keel_core::schema::{as_object, get_array, get_str, get_u64, opt_str, opt_u64};

/// The required `format` tag.
pub const FORMAT_TAG: &str = "merkle-envelope";

/// The only supported envelope version.
pub const ENVELOPE_VERSION: u64 = 1;

/// One proof step as it appears on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawProofStep {
    /// 64 hex characters, or `"*"` for the odd-row fold.
    pub hash: String,
    /// `"L"` or `"R"`.
    pub pos: String,
}

/// A shape-checked envelope, fields still in wire encoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawEnvelope {
    pub txid: String,
    pub vout: u64,
    pub satoshis: u64,
    pub raw_tx: String,
    pub block_hash: Option<String>,
    pub block_header: String,
    pub proof: Vec<RawProofStep>,
    pub confirmations: Option<u64>,
}

impl RawEnvelope {
    /// Parse envelope bytes as JSON and check the schema.
    pub fn parse(bytes: &[u8]) -> Result<Self, KeelError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|_| SchemaError::InvalidJson)?;
        let obj = as_object(&value)?;

        let format = get_str(obj, "format")?;
        if format != FORMAT_TAG {
            return Err(SchemaError::UnknownFormat(format.to_string()).into());
        }
        let version = get_u64(obj, "version")?;
        if version != ENVELOPE_VERSION {
            return Err(SchemaError::UnsupportedVersion(version).into());
        }

        let mut proof = Vec::new();
        for (i, step) in get_array(obj, "proof")?.iter().enumerate() {
            let step_obj = step.as_object().ok_or(SchemaError::WrongType {
                field: format!("proof[{i}]"),
                expected: "object",
            })?;
            let hash = match step_obj.get("hash") {
                None => {
                    return Err(SchemaError::MissingField(format!("proof[{i}].hash")).into());
                }
                Some(Value::String(s)) => s.clone(),
                Some(_) => {
                    return Err(SchemaError::WrongType {
                        field: format!("proof[{i}].hash"),
                        expected: "string",
                    }
                    .into());
                }
            };
            let pos = match step_obj.get("pos") {
                None => {
                    return Err(SchemaError::MissingField(format!("proof[{i}].pos")).into());
                }
                Some(Value::String(s)) => s.clone(),
                Some(_) => {
                    return Err(SchemaError::WrongType {
                        field: format!("proof[{i}].pos"),
                        expected: "string",
                    }
                    .into());
                }
            };
            proof.push(RawProofStep { hash, pos });
        }

        Ok(Self {
            txid: get_str(obj, "txid")?.to_string(),
            vout: get_u64(obj, "vout")?,
            satoshis: get_u64(obj, "satoshis")?,
            raw_tx: get_str(obj, "rawTx")?.to_string(),
            block_hash: opt_str(obj, "blockHash")?.map(str::to_string),
            block_header: get_str(obj, "blockHeader")?.to_string(),
            proof,
            confirmations: opt_u64(obj, "confirmations")?,
        })
    }
}
