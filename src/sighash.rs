//! BIP143 signature digest for version-0 witness inputs
//!
//! preimage = nVersion ‖ hashPrevouts ‖ hashSequence ‖ outpoint ‖ scriptCode ‖
//!            amount ‖ nSequence ‖ hashOutputs ‖ nLockTime ‖ nHashType
//! digest   = HASH256(preimage)

use crate::encoding::write_var_bytes;
use crate::error::{MultisigError, Result};
use crate::hash::double_sha256;
use crate::transaction::{write_outpoint, write_output};
use crate::types::*;
use serde::{Deserialize, Serialize};

/// Signature hash type: base mode plus the ANYONECANPAY modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SighashType {
    pub base: SighashBase,
    pub anyone_can_pay: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SighashBase {
    All,
    None,
    Single,
}

const SIGHASH_ANYONECANPAY: u8 = 0x80;

impl SighashType {
    /// SIGHASH_ALL (0x01)
    pub const ALL: SighashType = SighashType {
        base: SighashBase::All,
        anyone_can_pay: false,
    };

    /// The byte appended to signatures
    pub fn to_byte(self) -> u8 {
        let base = match self.base {
            SighashBase::All => 0x01,
            SighashBase::None => 0x02,
            SighashBase::Single => 0x03,
        };
        if self.anyone_can_pay {
            base | SIGHASH_ANYONECANPAY
        } else {
            base
        }
    }

    /// Parse a sighash byte; undefined base types are rejected
    pub fn from_byte(byte: u8) -> Result<Self> {
        let base = match byte & !SIGHASH_ANYONECANPAY {
            0x01 => SighashBase::All,
            0x02 => SighashBase::None,
            0x03 => SighashBase::Single,
            other => {
                return Err(MultisigError::InvalidEncoding(format!(
                    "undefined sighash type {:#04x}",
                    other
                )))
            }
        };
        Ok(SighashType {
            base,
            anyone_can_pay: byte & SIGHASH_ANYONECANPAY != 0,
        })
    }
}

impl Default for SighashType {
    fn default() -> Self {
        SighashType::ALL
    }
}

/// Per-transaction aggregate hashes, computed once and shared read-only by
/// every input's digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SighashMidstate {
    pub hash_prevouts: Hash,
    pub hash_sequence: Hash,
    pub hash_outputs: Hash,
}

impl SighashMidstate {
    pub fn new(tx: &Transaction) -> Self {
        let mut prevouts = Vec::with_capacity(36 * tx.inputs.len());
        let mut sequences = Vec::with_capacity(4 * tx.inputs.len());
        for input in &tx.inputs {
            write_outpoint(&input.prevout, &mut prevouts);
            sequences.extend_from_slice(&input.sequence.to_le_bytes());
        }

        let mut outputs = Vec::new();
        for output in &tx.outputs {
            write_output(output, &mut outputs);
        }

        Self {
            hash_prevouts: double_sha256(&prevouts),
            hash_sequence: double_sha256(&sequences),
            hash_outputs: double_sha256(&outputs),
        }
    }
}

/// Build the BIP143 preimage for input `index` spending `value` satoshis
/// locked by `script_code` (the witness script itself, not its program)
pub fn sighash_preimage(
    tx: &Transaction,
    midstate: &SighashMidstate,
    index: usize,
    script_code: &[u8],
    value: u64,
    sighash_type: SighashType,
) -> Result<Vec<u8>> {
    let input = tx.inputs.get(index).ok_or(MultisigError::InputIndexOutOfRange {
        index,
        count: tx.inputs.len(),
    })?;

    let zero = [0u8; 32];
    let hash_prevouts = if sighash_type.anyone_can_pay {
        &zero
    } else {
        &midstate.hash_prevouts
    };
    let hash_sequence = if sighash_type.anyone_can_pay || sighash_type.base != SighashBase::All {
        &zero
    } else {
        &midstate.hash_sequence
    };
    let single_output_hash;
    let hash_outputs = match sighash_type.base {
        SighashBase::All => &midstate.hash_outputs,
        SighashBase::Single if index < tx.outputs.len() => {
            let mut output = Vec::new();
            write_output(&tx.outputs[index], &mut output);
            single_output_hash = double_sha256(&output);
            &single_output_hash
        }
        _ => &zero,
    };

    let mut preimage = Vec::with_capacity(156 + script_code.len());
    preimage.extend_from_slice(&tx.version.to_le_bytes());
    preimage.extend_from_slice(hash_prevouts);
    preimage.extend_from_slice(hash_sequence);
    write_outpoint(&input.prevout, &mut preimage);
    write_var_bytes(script_code, &mut preimage);
    preimage.extend_from_slice(&value.to_le_bytes());
    preimage.extend_from_slice(&input.sequence.to_le_bytes());
    preimage.extend_from_slice(hash_outputs);
    preimage.extend_from_slice(&tx.lock_time.to_le_bytes());
    preimage.extend_from_slice(&u32::from(sighash_type.to_byte()).to_le_bytes());
    Ok(preimage)
}

/// Digest to sign for input `index`, reusing a precomputed midstate
pub fn segwit_v0_sighash_with_midstate(
    tx: &Transaction,
    midstate: &SighashMidstate,
    index: usize,
    script_code: &[u8],
    value: u64,
    sighash_type: SighashType,
) -> Result<Hash> {
    let preimage = sighash_preimage(tx, midstate, index, script_code, value, sighash_type)?;
    Ok(double_sha256(&preimage))
}

/// Digest to sign for input `index`
pub fn segwit_v0_sighash(
    tx: &Transaction,
    index: usize,
    script_code: &[u8],
    value: u64,
    sighash_type: SighashType,
) -> Result<Hash> {
    let midstate = SighashMidstate::new(tx);
    segwit_v0_sighash_with_midstate(tx, &midstate, index, script_code, value, sighash_type)
}
