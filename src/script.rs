//! Script derivation for P2SH-wrapped P2WSH multisig
//!
//! For a multisig witness script ws:
//! - witness program  wp  = OP_0 ‖ 0x20 ‖ SHA256(ws)
//! - redeem script    rs  = wp
//! - scriptPubKey     spk = OP_HASH160 ‖ 0x14 ‖ HASH160(rs) ‖ OP_EQUAL
//! - scriptSig        ss  = push(rs)

use crate::address::{self, Network};
use crate::constants::*;
use crate::error::{MultisigError, Result};
use crate::hash::{hash160, sha256};
use crate::types::*;
use serde::{Deserialize, Serialize};

/// Append a minimal data push of `data` to `script`
pub fn push_data(data: &[u8], script: &mut ByteString) {
    let len = data.len();
    if len <= OP_PUSHBYTES_MAX as usize {
        script.push(len as u8);
    } else if len <= 0xff {
        script.push(OP_PUSHDATA1);
        script.push(len as u8);
    } else if len <= 0xffff {
        script.push(OP_PUSHDATA2);
        script.extend_from_slice(&(len as u16).to_le_bytes());
    } else {
        script.push(OP_PUSHDATA4);
        script.extend_from_slice(&(len as u32).to_le_bytes());
    }
    script.extend_from_slice(data);
}

/// Opcode pushing the small integer n (1..=16)
fn small_int_opcode(n: usize) -> u8 {
    OP_1 + (n as u8) - 1
}

/// Value pushed by OP_1..OP_16, if `opcode` is one
fn small_int_value(opcode: u8) -> Option<usize> {
    (OP_1..=OP_16)
        .contains(&opcode)
        .then(|| (opcode - OP_1 + 1) as usize)
}

/// Fail with `ScriptTooLong` above the 520-byte element limit
pub fn check_script_size(script: &[u8]) -> Result<()> {
    if script.len() > MAX_SCRIPT_ELEMENT_SIZE {
        return Err(MultisigError::ScriptTooLong {
            len: script.len(),
            max: MAX_SCRIPT_ELEMENT_SIZE,
        });
    }
    Ok(())
}

/// m-of-n policy: OP_m <pubkey_1> … <pubkey_n> OP_n OP_CHECKMULTISIG
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultisigPolicy {
    required: usize,
    pubkeys: Vec<PublicKey>,
    script: ByteString,
}

impl MultisigPolicy {
    /// Build the policy script from `required` and the ordered key list
    pub fn new(required: usize, pubkeys: Vec<PublicKey>) -> Result<Self> {
        validate_counts(required, pubkeys.len())?;

        let mut script = Vec::with_capacity(3 + pubkeys.len() * (1 + COMPRESSED_PUBKEY_SIZE));
        script.push(small_int_opcode(required));
        for key in &pubkeys {
            push_data(key.as_bytes(), &mut script);
        }
        script.push(small_int_opcode(pubkeys.len()));
        script.push(OP_CHECKMULTISIG);
        check_script_size(&script)?;

        Ok(Self { required, pubkeys, script })
    }

    /// Parse a raw multisig script, accepting only the canonical template
    /// with compressed keys
    pub fn parse(script: &[u8]) -> Result<Self> {
        check_script_size(script)?;

        let invalid = |msg: &str| MultisigError::InvalidPolicy(msg.to_string());
        let (&first, rest) = script.split_first().ok_or_else(|| invalid("empty script"))?;
        let required = small_int_value(first).ok_or_else(|| invalid("missing OP_m"))?;

        let mut pubkeys = Vec::new();
        let mut cursor = rest;
        while let Some((&len, tail)) = cursor.split_first() {
            if len as usize != COMPRESSED_PUBKEY_SIZE {
                break;
            }
            if tail.len() < COMPRESSED_PUBKEY_SIZE {
                return Err(invalid("truncated public key push"));
            }
            let (key, next) = tail.split_at(COMPRESSED_PUBKEY_SIZE);
            if key[0] != 0x02 && key[0] != 0x03 {
                return Err(invalid("public key is not compressed"));
            }
            let mut bytes = [0u8; COMPRESSED_PUBKEY_SIZE];
            bytes.copy_from_slice(key);
            pubkeys.push(PublicKey(bytes));
            cursor = next;
        }

        match cursor {
            [op_n, OP_CHECKMULTISIG] if small_int_value(*op_n) == Some(pubkeys.len()) => {}
            [op_n, OP_CHECKMULTISIG] if small_int_value(*op_n).is_some() => {
                return Err(invalid("OP_n does not match the number of keys"));
            }
            _ => return Err(invalid("expected OP_n OP_CHECKMULTISIG after the keys")),
        }
        validate_counts(required, pubkeys.len())?;

        Ok(Self {
            required,
            pubkeys,
            script: script.to_vec(),
        })
    }

    /// m: signatures required
    pub fn required(&self) -> usize {
        self.required
    }

    /// Public keys in script order
    pub fn pubkeys(&self) -> &[PublicKey] {
        &self.pubkeys
    }

    /// Position of `key` in the script's key list
    pub fn key_position(&self, key: &PublicKey) -> Option<usize> {
        self.pubkeys.iter().position(|k| k == key)
    }

    pub fn script(&self) -> &[u8] {
        &self.script
    }
}

fn validate_counts(required: usize, total: usize) -> Result<()> {
    if total == 0 || total > MAX_MULTISIG_KEYS {
        return Err(MultisigError::InvalidPolicy(format!(
            "key count {} outside 1..={}",
            total, MAX_MULTISIG_KEYS
        )));
    }
    if required == 0 || required > total {
        return Err(MultisigError::InvalidPolicy(format!(
            "required signatures {} outside 1..={}",
            required, total
        )));
    }
    Ok(())
}

/// wp = OP_0 ‖ 0x20 ‖ SHA256(ws)
///
/// Single SHA-256, not the double hash used for transaction digests.
pub fn witness_program(witness_script: &[u8]) -> Result<ByteString> {
    check_script_size(witness_script)?;
    let mut program = Vec::with_capacity(P2WSH_PROGRAM_SIZE);
    program.push(OP_0);
    program.push(0x20);
    program.extend_from_slice(&sha256(witness_script));
    Ok(program)
}

/// True for OP_0 <32 bytes>
pub fn is_p2wsh_program(script: &[u8]) -> bool {
    script.len() == P2WSH_PROGRAM_SIZE && script[0] == OP_0 && script[1] == 0x20
}

/// spk = OP_HASH160 ‖ 0x14 ‖ h ‖ OP_EQUAL
pub fn p2sh_script_pubkey(script_hash: &Hash160) -> ByteString {
    let mut script = Vec::with_capacity(23);
    script.push(OP_HASH160);
    push_data(script_hash, &mut script);
    script.push(OP_EQUAL);
    script
}

/// True for OP_HASH160 <20 bytes> OP_EQUAL
pub fn is_p2sh_script_pubkey(script: &[u8]) -> bool {
    script.len() == 23 && script[0] == OP_HASH160 && script[1] == 0x14 && script[22] == OP_EQUAL
}

/// ss = push(rs): the only scriptSig a P2SH-wrapped witness input may carry
pub fn script_sig_for(redeem_script: &[u8]) -> Result<ByteString> {
    check_script_size(redeem_script)?;
    let mut script = Vec::with_capacity(redeem_script.len() + 3);
    push_data(redeem_script, &mut script);
    Ok(script)
}

/// Every script and the address derived from one multisig policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct P2shP2wsh {
    pub multisig_script: Script,
    pub witness_program: Script,
    pub redeem_script: Script,
    pub script_pubkey: Script,
    pub script_sig: Script,
    pub script_hash: Hash160,
    pub address: String,
}

impl P2shP2wsh {
    /// Derive all artifacts for `multisig_script` on `network`
    pub fn derive(multisig_script: &[u8], network: Network) -> Result<Self> {
        let program = witness_program(multisig_script)?;
        let script_hash = hash160(&program);
        let script_pubkey = p2sh_script_pubkey(&script_hash);
        let script_sig = script_sig_for(&program)?;
        let address = address::encode_p2sh(network, &script_hash);

        Ok(Self {
            multisig_script: Script::new(ScriptRole::MultisigScript, multisig_script.to_vec()),
            witness_program: Script::new(ScriptRole::WitnessProgram, program.clone()),
            redeem_script: Script::new(ScriptRole::RedeemScript, program),
            script_pubkey: Script::new(ScriptRole::ScriptPubKey, script_pubkey),
            script_sig: Script::new(ScriptRole::ScriptSig, script_sig),
            script_hash,
            address,
        })
    }
}
