//! Transaction wire format: legacy and segwit serialization
//!
//! Legacy:  version ‖ CS(|ins|) ‖ ins ‖ CS(|outs|) ‖ outs ‖ locktime
//! Segwit:  version ‖ 0x00 ‖ 0x01 ‖ CS(|ins|) ‖ ins ‖ CS(|outs|) ‖ outs ‖ witnesses ‖ locktime

use crate::constants::*;
use crate::encoding::{compact_size_len, write_compact_size, write_var_bytes, Reader};
use crate::error::{MultisigError, Result};
use crate::hash::double_sha256;
use crate::types::*;

/// Serialization mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// No marker, flag or witness data; the form hashed for the txid
    Legacy,
    /// Marker, flag and per-input witness stacks; the broadcast form
    Segwit,
}

/// Outpoint bytes: txid(32) ‖ index(4 LE)
pub fn write_outpoint(outpoint: &OutPoint, out: &mut Vec<u8>) {
    out.extend_from_slice(&outpoint.txid);
    out.extend_from_slice(&outpoint.index.to_le_bytes());
}

/// Output bytes: value(8 LE) ‖ CS(len) ‖ scriptPubKey
pub fn write_output(output: &TransactionOutput, out: &mut Vec<u8>) {
    out.extend_from_slice(&output.value.to_le_bytes());
    write_var_bytes(&output.script_pubkey, out);
}

/// Witness bytes: CS(#items) ‖ (CS(len) ‖ item)*
pub fn write_witness(witness: &Witness, out: &mut Vec<u8>) {
    write_compact_size(witness.len() as u64, out);
    for item in witness {
        write_var_bytes(item, out);
    }
}

fn write_input(input: &TransactionInput, out: &mut Vec<u8>) {
    write_outpoint(&input.prevout, out);
    write_var_bytes(&input.script_sig, out);
    out.extend_from_slice(&input.sequence.to_le_bytes());
}

/// Serialize `tx` in the requested mode
pub fn serialize(tx: &Transaction, encoding: Encoding) -> Vec<u8> {
    let mut out = Vec::with_capacity(estimate_size(tx));
    out.extend_from_slice(&tx.version.to_le_bytes());

    if encoding == Encoding::Segwit {
        out.push(SEGWIT_MARKER);
        out.push(SEGWIT_FLAG);
    }

    write_compact_size(tx.inputs.len() as u64, &mut out);
    for input in &tx.inputs {
        write_input(input, &mut out);
    }

    write_compact_size(tx.outputs.len() as u64, &mut out);
    for output in &tx.outputs {
        write_output(output, &mut out);
    }

    if encoding == Encoding::Segwit {
        for input in &tx.inputs {
            write_witness(&input.witness, &mut out);
        }
    }

    out.extend_from_slice(&tx.lock_time.to_le_bytes());
    out
}

/// Legacy bytes, used for the txid and the base size
pub fn serialize_legacy(tx: &Transaction) -> Vec<u8> {
    serialize(tx, Encoding::Legacy)
}

/// Broadcast bytes: segwit form when any witness is present, legacy otherwise
pub fn serialize_for_broadcast(tx: &Transaction) -> Vec<u8> {
    if tx.has_witness() {
        serialize(tx, Encoding::Segwit)
    } else {
        serialize(tx, Encoding::Legacy)
    }
}

/// Lowercase hex of the broadcast bytes
pub fn to_hex(tx: &Transaction) -> String {
    hex::encode(serialize_for_broadcast(tx))
}

fn estimate_size(tx: &Transaction) -> usize {
    let inputs: usize = tx
        .inputs
        .iter()
        .map(|i| {
            40 + compact_size_len(i.script_sig.len() as u64)
                + i.script_sig.len()
                + compact_size_len(i.witness.len() as u64)
                + i.witness
                    .iter()
                    .map(|w| compact_size_len(w.len() as u64) + w.len())
                    .sum::<usize>()
        })
        .sum();
    let outputs: usize = tx
        .outputs
        .iter()
        .map(|o| 8 + compact_size_len(o.script_pubkey.len() as u64) + o.script_pubkey.len())
        .sum();
    4 + 2 + compact_size_len(tx.inputs.len() as u64)
        + inputs
        + compact_size_len(tx.outputs.len() as u64)
        + outputs
        + 4
}

/// Parse a transaction in either mode; the whole input must be consumed
pub fn deserialize(bytes: &[u8]) -> Result<Transaction> {
    let mut reader = Reader::new(bytes);
    let version = reader.read_u32_le()?;

    // A zero input count is indistinguishable from the segwit marker; like
    // every node we read it as the marker
    let segwit = reader.peek_u8() == Some(SEGWIT_MARKER);
    if segwit {
        reader.read_u8()?;
        let flag = reader.read_u8()?;
        if flag != SEGWIT_FLAG {
            return Err(MultisigError::InvalidEncoding(format!(
                "unknown segwit flag {:#04x}",
                flag
            )));
        }
    }

    let input_count = read_count(&mut reader, 41)?;
    let mut inputs = Vec::with_capacity(input_count);
    for _ in 0..input_count {
        let txid = reader.read_array::<32>()?;
        let index = reader.read_u32_le()?;
        let script_sig = reader.read_var_bytes()?;
        let sequence = reader.read_u32_le()?;
        inputs.push(TransactionInput {
            prevout: OutPoint { txid, index },
            script_sig,
            sequence,
            witness: Vec::new(),
        });
    }

    let output_count = read_count(&mut reader, 9)?;
    let mut outputs = Vec::with_capacity(output_count);
    for _ in 0..output_count {
        let value = reader.read_u64_le()?;
        let script_pubkey = reader.read_var_bytes()?;
        outputs.push(TransactionOutput { value, script_pubkey });
    }

    if segwit {
        for input in inputs.iter_mut() {
            let item_count = read_count(&mut reader, 1)?;
            let mut witness = Vec::with_capacity(item_count);
            for _ in 0..item_count {
                witness.push(reader.read_var_bytes()?);
            }
            input.witness = witness;
        }
        // Marker and flag with no witness data would not re-serialize to the same bytes
        if !inputs.iter().any(|input| !input.witness.is_empty()) {
            return Err(MultisigError::InvalidEncoding(
                "segwit marker present but every witness is empty".to_string(),
            ));
        }
    }

    let lock_time = reader.read_u32_le()?;
    reader.finish()?;

    Ok(Transaction {
        version,
        inputs,
        outputs,
        lock_time,
    })
}

/// Parse lowercase or uppercase hex
pub fn from_hex(hex_str: &str) -> Result<Transaction> {
    deserialize(&hex::decode(hex_str.trim())?)
}

/// Read a vector count, bounded by the bytes left so a forged count cannot
/// trigger a huge allocation
fn read_count(reader: &mut Reader<'_>, min_item_size: usize) -> Result<usize> {
    let count = reader.read_compact_size()?;
    let limit = (reader.remaining() / min_item_size) as u64;
    if count > limit {
        return Err(MultisigError::TruncatedInput {
            offset: reader.position(),
            needed: usize::try_from(count)
                .unwrap_or(usize::MAX)
                .saturating_mul(min_item_size),
        });
    }
    Ok(count as usize)
}

/// txid: HASH256 of the legacy bytes, in internal byte order
pub fn txid(tx: &Transaction) -> Hash {
    double_sha256(&serialize_legacy(tx))
}

/// wtxid: HASH256 of the broadcast bytes, in internal byte order
pub fn wtxid(tx: &Transaction) -> Hash {
    double_sha256(&serialize_for_broadcast(tx))
}

/// Display form of a hash: byte-reversed hex
pub fn hash_to_display_hex(hash: &Hash) -> String {
    let mut reversed = *hash;
    reversed.reverse();
    hex::encode(reversed)
}

/// Weight(tx) = 3 × |Serialize(tx ∖ witness)| + |Serialize(tx)|
pub fn weight(tx: &Transaction) -> u64 {
    let base_size = serialize_legacy(tx).len() as u64;
    let total_size = serialize_for_broadcast(tx).len() as u64;
    3 * base_size + total_size
}

/// Virtual size: ⌈weight / 4⌉
pub fn vsize(tx: &Transaction) -> u64 {
    weight(tx).div_ceil(4)
}
