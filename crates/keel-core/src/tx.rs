//! Raw transaction codec.
//!
//! Transactions use the ledger's wire format: `version(4 LE) ∥
//! varint(inputs) ∥ inputs ∥ varint(outputs) ∥ outputs ∥ locktime(4 LE)`.
//! Parsing is strict: every byte of the buffer must be consumed.

use std::fmt;

use crate::encoding::{ByteReader, encode_hex, write_varint};
use crate::error::DecodeError;
use crate::hashes::hash256;
use crate::types::Hash256;

/// Reference to a specific output of a previous transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OutPoint {
    /// Transaction ID in internal byte order.
    pub txid: Hash256,
    /// Index of the output within the transaction.
    pub vout: u32,
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

/// A transaction input, spending a previous output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxInput {
    pub prevout: OutPoint,
    /// Unlocking script; empty in unsigned skeletons.
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

/// A transaction output, creating a new UTXO.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxOutput {
    /// Value in satoshis.
    pub value: u64,
    /// Locking script.
    pub script_pubkey: Vec<u8>,
}

/// A complete transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub lock_time: u32,
}

impl Transaction {
    /// Parse from wire bytes, consuming the entire buffer.
    pub fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut r = ByteReader::new(bytes);
        let tx = Self::read(&mut r)?;
        r.finish()?;
        Ok(tx)
    }

    fn read(r: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let version = r.read_u32_le()?;

        let input_count = r.read_varint()?;
        let mut inputs = Vec::with_capacity(input_count.min(1024) as usize);
        for _ in 0..input_count {
            let txid = r.read_hash()?;
            let vout = r.read_u32_le()?;
            let script_len = r.read_varint()? as usize;
            let script_sig = r.take(script_len)?.to_vec();
            let sequence = r.read_u32_le()?;
            inputs.push(TxInput {
                prevout: OutPoint { txid, vout },
                script_sig,
                sequence,
            });
        }

        let output_count = r.read_varint()?;
        let mut outputs = Vec::with_capacity(output_count.min(1024) as usize);
        for _ in 0..output_count {
            let value = r.read_u64_le()?;
            let script_len = r.read_varint()? as usize;
            let script_pubkey = r.take(script_len)?.to_vec();
            outputs.push(TxOutput { value, script_pubkey });
        }

        let lock_time = r.read_u32_le()?;
        Ok(Self { version, inputs, outputs, lock_time })
    }

    /// Serialize to wire bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.estimated_size());
        out.extend_from_slice(&self.version.to_le_bytes());

        write_varint(&mut out, self.inputs.len() as u64);
        for input in &self.inputs {
            out.extend_from_slice(input.prevout.txid.as_bytes());
            out.extend_from_slice(&input.prevout.vout.to_le_bytes());
            write_varint(&mut out, input.script_sig.len() as u64);
            out.extend_from_slice(&input.script_sig);
            out.extend_from_slice(&input.sequence.to_le_bytes());
        }

        write_varint(&mut out, self.outputs.len() as u64);
        for output in &self.outputs {
            out.extend_from_slice(&output.value.to_le_bytes());
            write_varint(&mut out, output.script_pubkey.len() as u64);
            out.extend_from_slice(&output.script_pubkey);
        }

        out.extend_from_slice(&self.lock_time.to_le_bytes());
        out
    }

    /// Transaction ID: `hash256` of the serialization, internal order.
    pub fn txid(&self) -> Hash256 {
        hash256(&self.serialize())
    }

    /// Serialized form as hex.
    pub fn to_hex(&self) -> String {
        encode_hex(&self.serialize())
    }

    /// Rough serialized size used for buffer pre-allocation.
    fn estimated_size(&self) -> usize {
        10 + self.inputs.iter().map(|i| 41 + i.script_sig.len()).sum::<usize>()
            + self.outputs.iter().map(|o| 9 + o.script_pubkey.len()).sum::<usize>()
    }

    /// Sum of output values, saturating on (invalid) overflow.
    pub fn total_output_value(&self) -> u64 {
        self.outputs.iter().fold(0u64, |acc, o| acc.saturating_add(o.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::decode_hex;

    fn sample_tx() -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxInput {
                prevout: OutPoint { txid: Hash256([0x11; 32]), vout: 0 },
                script_sig: vec![0xAB, 0xCD],
                sequence: 0xFFFF_FFFF,
            }],
            outputs: vec![TxOutput {
                value: 50_000,
                script_pubkey: vec![0x76, 0xa9],
            }],
            lock_time: 0,
        }
    }

    // ------------------------------------------------------------------
    // Roundtrip
    // ------------------------------------------------------------------

    #[test]
    fn serialize_parse_roundtrip() {
        let tx = sample_tx();
        assert_eq!(Transaction::parse(&tx.serialize()).unwrap(), tx);
    }

    #[test]
    fn roundtrip_multiple_inputs_outputs() {
        let mut tx = sample_tx();
        tx.inputs.push(TxInput {
            prevout: OutPoint { txid: Hash256([0x22; 32]), vout: 7 },
            script_sig: vec![],
            sequence: 0,
        });
        tx.outputs.push(TxOutput { value: 1, script_pubkey: vec![0x00; 25] });
        assert_eq!(Transaction::parse(&tx.serialize()).unwrap(), tx);
    }

    #[test]
    fn empty_tx_roundtrip() {
        let tx = Transaction { version: 2, inputs: vec![], outputs: vec![], lock_time: 99 };
        assert_eq!(Transaction::parse(&tx.serialize()).unwrap(), tx);
    }

    // ------------------------------------------------------------------
    // Strictness
    // ------------------------------------------------------------------

    #[test]
    fn trailing_bytes_rejected() {
        let mut bytes = sample_tx().serialize();
        bytes.push(0x00);
        assert_eq!(Transaction::parse(&bytes), Err(DecodeError::TrailingBytes(1)));
    }

    #[test]
    fn truncated_rejected() {
        let bytes = sample_tx().serialize();
        for cut in [1, 5, 10, bytes.len() - 1] {
            assert!(
                Transaction::parse(&bytes[..cut]).is_err(),
                "accepted a transaction cut to {cut} bytes"
            );
        }
    }

    #[test]
    fn script_length_beyond_buffer_rejected() {
        // version + 1 input with a script length claiming more bytes than exist.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.push(1); // one input
        bytes.extend_from_slice(&[0x11; 32]);
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.push(0xfc); // claims a 252-byte script
        bytes.extend_from_slice(&[0x00; 4]);
        assert!(matches!(
            Transaction::parse(&bytes),
            Err(DecodeError::UnexpectedEof { .. })
        ));
    }

    // ------------------------------------------------------------------
    // TXID
    // ------------------------------------------------------------------

    #[test]
    fn txid_is_hash256_of_serialization() {
        let tx = sample_tx();
        assert_eq!(tx.txid(), hash256(&tx.serialize()));
    }

    #[test]
    fn txid_changes_with_content() {
        let a = sample_tx();
        let mut b = sample_tx();
        b.outputs[0].value += 1;
        assert_ne!(a.txid(), b.txid());
    }

    #[test]
    fn parse_known_hex_shape() {
        // Hand-assembled single-input single-output transaction.
        let hex = concat!(
            "01000000",                                                           // version
            "01",                                                                 // 1 input
            "1111111111111111111111111111111111111111111111111111111111111111",   // prev txid
            "00000000",                                                           // vout
            "00",                                                                 // empty scriptSig
            "ffffffff",                                                           // sequence
            "01",                                                                 // 1 output
            "50c3000000000000",                                                   // 50000 sats
            "02",                                                                 // script len
            "76a9",                                                               // script
            "00000000",                                                           // locktime
        );
        let tx = Transaction::parse(&decode_hex(hex).unwrap()).unwrap();
        assert_eq!(tx.version, 1);
        assert_eq!(tx.inputs.len(), 1);
        assert_eq!(tx.outputs[0].value, 50_000);
        assert_eq!(tx.lock_time, 0);
    }

    #[test]
    fn total_output_value_sums() {
        let mut tx = sample_tx();
        tx.outputs.push(TxOutput { value: 25_000, script_pubkey: vec![] });
        assert_eq!(tx.total_output_value(), 75_000);
    }
}
