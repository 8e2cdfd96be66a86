//! Reference script evaluator for self-checking built spends
//!
//! Covers the opcodes that P2SH, P2WSH and multisig templates use, with
//! real BIP143 signature checks: pushes, OP_VERIFY, OP_RETURN, OP_DROP,
//! OP_EQUAL(VERIFY), the hash opcodes, OP_CHECKSIG(VERIFY) and
//! OP_CHECKMULTISIG(VERIFY). Anything else fails the script. It is not a
//! general consensus engine.

use crate::constants::*;
use crate::error::{MultisigError, Result};
use crate::hash::{double_sha256, hash160, sha256};
use crate::script::{is_p2sh_script_pubkey, is_p2wsh_program, script_sig_for};
use crate::sighash::{segwit_v0_sighash_with_midstate, SighashMidstate};
use crate::signer::{SignatureBlob, Signer};
use crate::types::*;

/// Maximum script length accepted for execution
pub const MAX_SCRIPT_SIZE: usize = 10_000;

/// Seam between script execution and transaction context
pub trait SignatureChecker {
    /// Check `sig_blob` (DER ‖ sighash byte) against `pubkey` for `script_code`
    fn check_sig(&self, sig_blob: &[u8], pubkey: &[u8], script_code: &[u8]) -> bool;
}

/// Checker for scripts evaluated outside any transaction: every signature fails
pub struct NoSignatureChecker;

impl SignatureChecker for NoSignatureChecker {
    fn check_sig(&self, _sig_blob: &[u8], _pubkey: &[u8], _script_code: &[u8]) -> bool {
        false
    }
}

/// BIP143 checker for one input of a transaction
pub struct TransactionSignatureChecker<'a> {
    tx: &'a Transaction,
    midstate: SighashMidstate,
    index: usize,
    value: u64,
    signer: Signer,
}

impl<'a> TransactionSignatureChecker<'a> {
    pub fn new(tx: &'a Transaction, index: usize, value: u64) -> Self {
        Self {
            tx,
            midstate: SighashMidstate::new(tx),
            index,
            value,
            signer: Signer::new(),
        }
    }
}

impl SignatureChecker for TransactionSignatureChecker<'_> {
    fn check_sig(&self, sig_blob: &[u8], pubkey: &[u8], script_code: &[u8]) -> bool {
        let Ok(blob) = SignatureBlob::parse(sig_blob) else {
            return false;
        };
        let Ok(digest) = segwit_v0_sighash_with_midstate(
            self.tx,
            &self.midstate,
            self.index,
            script_code,
            self.value,
            blob.sighash_type,
        ) else {
            return false;
        };
        self.signer.verify(pubkey, &digest, &blob.signature)
    }
}

/// One parsed script element
#[derive(Debug, Clone, PartialEq, Eq)]
enum Instruction<'a> {
    Push(&'a [u8]),
    Op(u8),
}

/// Decode the instruction at `pos`, returning it and the next position
fn next_instruction(script: &[u8], pos: usize) -> Result<(Instruction<'_>, usize)> {
    let opcode = script[pos];
    let truncated = || MultisigError::ScriptExecution(format!("truncated push at {}", pos));

    let (len_bytes, data_len) = match opcode {
        0x01..=OP_PUSHBYTES_MAX => (0, opcode as usize),
        OP_PUSHDATA1 => {
            let len = *script.get(pos + 1).ok_or_else(truncated)?;
            (1, len as usize)
        }
        OP_PUSHDATA2 => {
            let bytes = script.get(pos + 1..pos + 3).ok_or_else(truncated)?;
            (2, u16::from_le_bytes([bytes[0], bytes[1]]) as usize)
        }
        OP_PUSHDATA4 => {
            let bytes = script.get(pos + 1..pos + 5).ok_or_else(truncated)?;
            (4, u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize)
        }
        _ => return Ok((Instruction::Op(opcode), pos + 1)),
    };

    let start = pos + 1 + len_bytes;
    let data = script
        .get(start..start.saturating_add(data_len))
        .ok_or_else(truncated)?;
    Ok((Instruction::Push(data), start + data_len))
}

/// True when the script holds only data pushes (and small-integer opcodes)
pub fn is_push_only(script: &[u8]) -> bool {
    let mut pos = 0;
    while pos < script.len() {
        match next_instruction(script, pos) {
            Ok((Instruction::Push(_), next)) => pos = next,
            Ok((Instruction::Op(op), next)) if is_small_int_push(op) => pos = next,
            _ => return false,
        }
    }
    true
}

fn is_small_int_push(opcode: u8) -> bool {
    opcode == OP_0 || opcode == OP_1NEGATE || (OP_1..=OP_16).contains(&opcode)
}

/// Script truthiness: any non-zero byte, except negative zero
pub fn cast_to_bool(item: &[u8]) -> bool {
    match item.split_last() {
        None => false,
        Some((&last, rest)) => rest.iter().any(|&b| b != 0) || (last != 0 && last != 0x80),
    }
}

/// Decode a script number of at most 4 bytes
fn decode_num(item: &[u8]) -> Option<i64> {
    if item.len() > 4 {
        return None;
    }
    let Some((&last, _)) = item.split_last() else {
        return Some(0);
    };
    let mut value = 0i64;
    for (i, &byte) in item.iter().enumerate() {
        value |= (byte as i64) << (8 * i);
    }
    if last & 0x80 != 0 {
        let mask = !(0x80i64 << (8 * (item.len() - 1)));
        Some(-(value & mask))
    } else {
        Some(value)
    }
}

fn push_bool(stack: &mut Vec<ByteString>, value: bool) {
    stack.push(if value { vec![1] } else { vec![] });
}

/// EvalScript: 𝒮𝒞 × 𝒮𝒯 → {true, false}
///
/// Executes `script` against `stack`. Returns `Ok(false)` when execution
/// fails (bad opcode, failed VERIFY, stack underflow) and `Err` when a
/// resource limit is exceeded. The final stack is left for the caller to judge.
pub fn eval_script<C: SignatureChecker>(
    script: &[u8],
    stack: &mut Vec<ByteString>,
    checker: &C,
) -> Result<bool> {
    if script.len() > MAX_SCRIPT_SIZE {
        return Err(MultisigError::ScriptExecution(format!(
            "script of {} bytes exceeds {}",
            script.len(),
            MAX_SCRIPT_SIZE
        )));
    }

    let mut op_count = 0;
    let mut pos = 0;
    while pos < script.len() {
        let (instruction, next) = next_instruction(script, pos)?;
        pos = next;

        match instruction {
            Instruction::Push(data) => {
                if data.len() > MAX_SCRIPT_ELEMENT_SIZE {
                    return Err(MultisigError::ScriptExecution(format!(
                        "push of {} bytes exceeds {}",
                        data.len(),
                        MAX_SCRIPT_ELEMENT_SIZE
                    )));
                }
                stack.push(data.to_vec());
            }
            Instruction::Op(opcode) => {
                if opcode > OP_16 {
                    op_count += 1;
                    if op_count > MAX_SCRIPT_OPS {
                        return Err(MultisigError::ScriptExecution(
                            "Operation limit exceeded".to_string(),
                        ));
                    }
                }
                if !execute_opcode(opcode, stack, script, checker, &mut op_count)? {
                    return Ok(false);
                }
            }
        }

        if stack.len() > MAX_STACK_SIZE {
            return Err(MultisigError::ScriptExecution("Stack overflow".to_string()));
        }
    }

    Ok(true)
}

/// Execute a single opcode
fn execute_opcode<C: SignatureChecker>(
    opcode: u8,
    stack: &mut Vec<ByteString>,
    script_code: &[u8],
    checker: &C,
    op_count: &mut usize,
) -> Result<bool> {
    match opcode {
        // OP_0 - push empty array
        OP_0 => {
            stack.push(vec![]);
            Ok(true)
        }

        // OP_1NEGATE - push -1
        OP_1NEGATE => {
            stack.push(vec![0x81]);
            Ok(true)
        }

        // OP_1 to OP_16 - push numbers 1-16
        OP_1..=OP_16 => {
            stack.push(vec![opcode - OP_1 + 1]);
            Ok(true)
        }

        // OP_VERIFY - fail unless top stack item is true
        OP_VERIFY => Ok(stack.pop().map_or(false, |item| cast_to_bool(&item))),

        // OP_RETURN - always fail
        OP_RETURN => Ok(false),

        // OP_DROP - remove top stack item
        OP_DROP => Ok(stack.pop().is_some()),

        // OP_EQUAL / OP_EQUALVERIFY - compare top two stack items
        OP_EQUAL | OP_EQUALVERIFY => {
            let (Some(a), Some(b)) = (stack.pop(), stack.pop()) else {
                return Ok(false);
            };
            if opcode == OP_EQUALVERIFY {
                return Ok(a == b);
            }
            push_bool(stack, a == b);
            Ok(true)
        }

        // OP_SHA256 / OP_HASH160 / OP_HASH256 - hash top stack item
        OP_SHA256 | OP_HASH160 | OP_HASH256 => {
            let Some(item) = stack.pop() else {
                return Ok(false);
            };
            stack.push(match opcode {
                OP_SHA256 => sha256(&item).to_vec(),
                OP_HASH160 => hash160(&item).to_vec(),
                _ => double_sha256(&item).to_vec(),
            });
            Ok(true)
        }

        // OP_CHECKSIG / OP_CHECKSIGVERIFY - verify one signature
        OP_CHECKSIG | OP_CHECKSIGVERIFY => {
            let (Some(pubkey), Some(signature)) = (stack.pop(), stack.pop()) else {
                return Ok(false);
            };
            let valid =
                !signature.is_empty() && checker.check_sig(&signature, &pubkey, script_code);
            if opcode == OP_CHECKSIGVERIFY {
                return Ok(valid);
            }
            push_bool(stack, valid);
            Ok(true)
        }

        // OP_CHECKMULTISIG / OP_CHECKMULTISIGVERIFY - verify m of n signatures
        OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => {
            let Some(valid) = check_multisig(stack, script_code, checker, op_count)? else {
                return Ok(false);
            };
            if opcode == OP_CHECKMULTISIGVERIFY {
                return Ok(valid);
            }
            push_bool(stack, valid);
            Ok(true)
        }

        // Unknown or unsupported opcode
        _ => Ok(false),
    }
}

/// Pop n, n keys, m, m signatures and the extra placeholder, then match
/// signatures to keys from the top of the stack downward.
///
/// Returns `None` when the stack shape itself is invalid.
fn check_multisig<C: SignatureChecker>(
    stack: &mut Vec<ByteString>,
    script_code: &[u8],
    checker: &C,
    op_count: &mut usize,
) -> Result<Option<bool>> {
    let Some(key_count) = stack.pop().and_then(|item| decode_num(&item)) else {
        return Ok(None);
    };
    if key_count < 0 || key_count as usize > 20 {
        return Ok(None);
    }
    let key_count = key_count as usize;
    *op_count += key_count;
    if *op_count > MAX_SCRIPT_OPS {
        return Err(MultisigError::ScriptExecution(
            "Operation limit exceeded".to_string(),
        ));
    }
    if stack.len() < key_count {
        return Ok(None);
    }
    // Top of stack first: the last listed key comes out first
    let keys: Vec<ByteString> = stack.drain(stack.len() - key_count..).rev().collect();

    let Some(sig_count) = stack.pop().and_then(|item| decode_num(&item)) else {
        return Ok(None);
    };
    if sig_count < 0 || sig_count as usize > key_count {
        return Ok(None);
    }
    let sig_count = sig_count as usize;
    if stack.len() < sig_count {
        return Ok(None);
    }
    let sigs: Vec<ByteString> = stack.drain(stack.len() - sig_count..).rev().collect();

    // The off-by-one: one more item is consumed, and it must be empty
    match stack.pop() {
        Some(placeholder) if placeholder.is_empty() => {}
        _ => return Ok(None),
    }

    let mut key_iter = keys.iter();
    let mut keys_left = key_count;
    for (consumed, signature) in sigs.iter().enumerate() {
        loop {
            let sigs_left = sig_count - consumed;
            if sigs_left > keys_left {
                return Ok(Some(false));
            }
            let Some(key) = key_iter.next() else {
                return Ok(Some(false));
            };
            keys_left -= 1;
            if !signature.is_empty() && checker.check_sig(signature, key, script_code) {
                break;
            }
        }
    }

    Ok(Some(true))
}

/// Final-stack rule: exactly one item, and it is true
fn clean_true(stack: &[ByteString]) -> bool {
    stack.len() == 1 && cast_to_bool(&stack[0])
}

/// Execute a version-0 P2WSH program against its witness
fn verify_witness_program<C: SignatureChecker>(
    program: &[u8],
    witness: &Witness,
    checker: &C,
) -> Result<bool> {
    let Some((witness_script, items)) = witness.split_last() else {
        return Ok(false);
    };
    if sha256(witness_script)[..] != program[2..] {
        return Ok(false);
    }
    if items.iter().any(|item| item.len() > MAX_SCRIPT_ELEMENT_SIZE) {
        return Ok(false);
    }

    let mut stack = items.to_vec();
    if !eval_script(witness_script, &mut stack, checker)? {
        return Ok(false);
    }
    Ok(clean_true(&stack))
}

/// VerifyScript: 𝒮𝒞 × 𝒮𝒞 × 𝒲 → {true, false}
///
/// 1. Execute scriptSig (push-only) on an empty stack
/// 2. Execute scriptPubKey on the result; top must be true
/// 3. Native P2WSH: scriptSig empty, run the witness program
/// 4. P2SH: the last scriptSig push is the redeem script; if it is a P2WSH
///    program the scriptSig must be exactly that push, then run the witness
/// 5. Otherwise no witness may be present
pub fn verify_script<C: SignatureChecker>(
    script_sig: &[u8],
    script_pubkey: &[u8],
    witness: &Witness,
    checker: &C,
) -> Result<bool> {
    if !is_push_only(script_sig) {
        return Ok(false);
    }

    let mut stack = Vec::new();
    if !eval_script(script_sig, &mut stack, checker)? {
        return Ok(false);
    }
    let script_sig_stack = stack.clone();

    if !eval_script(script_pubkey, &mut stack, checker)? {
        return Ok(false);
    }
    if !stack.last().map_or(false, |top| cast_to_bool(top)) {
        return Ok(false);
    }

    if is_p2wsh_program(script_pubkey) {
        if !script_sig.is_empty() {
            return Ok(false);
        }
        return verify_witness_program(script_pubkey, witness, checker);
    }

    if is_p2sh_script_pubkey(script_pubkey) {
        let Some(redeem_script) = script_sig_stack.last() else {
            return Ok(false);
        };
        if !is_p2wsh_program(redeem_script) {
            return Err(MultisigError::ScriptExecution(
                "non-witness P2SH redeem scripts are not supported".to_string(),
            ));
        }
        if script_sig != script_sig_for(redeem_script)?.as_slice() {
            return Ok(false);
        }
        return verify_witness_program(redeem_script, witness, checker);
    }

    if !witness.is_empty() {
        return Ok(false);
    }
    Ok(true)
}

/// Verify input `index` of `tx` against the output it spends
pub fn verify_input(
    tx: &Transaction,
    index: usize,
    script_pubkey: &[u8],
    value: u64,
) -> Result<bool> {
    let input = tx.inputs.get(index).ok_or(MultisigError::InputIndexOutOfRange {
        index,
        count: tx.inputs.len(),
    })?;
    let checker = TransactionSignatureChecker::new(tx, index, value);
    verify_script(&input.script_sig, script_pubkey, &input.witness, &checker)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(script: &[u8]) -> (bool, Vec<ByteString>) {
        let mut stack = Vec::new();
        let ok = eval_script(script, &mut stack, &NoSignatureChecker).unwrap();
        (ok, stack)
    }

    #[test]
    fn test_push_opcodes() {
        let (ok, stack) = run(&[OP_0, 0x02, 0xab, 0xcd, OP_1NEGATE, 0x53]);
        assert!(ok);
        assert_eq!(stack, vec![vec![], vec![0xab, 0xcd], vec![0x81], vec![3]]);
    }

    #[test]
    fn test_pushdata_variants() {
        let mut script = vec![OP_PUSHDATA1, 2, 0x01, 0x02, OP_PUSHDATA2, 1, 0, 0x03];
        script.extend_from_slice(&[OP_PUSHDATA4, 1, 0, 0, 0, 0x04]);
        let (ok, stack) = run(&script);
        assert!(ok);
        assert_eq!(stack, vec![vec![1, 2], vec![3], vec![4]]);
    }

    #[test]
    fn test_truncated_push_is_error() {
        let mut stack = Vec::new();
        assert!(eval_script(&[0x05, 0x01], &mut stack, &NoSignatureChecker).is_err());
    }

    #[test]
    fn test_op_equal() {
        let (ok, stack) = run(&[OP_1, OP_1, OP_EQUAL]);
        assert!(ok);
        assert_eq!(stack, vec![vec![1]]);

        let (ok, stack) = run(&[OP_1, 0x52, OP_EQUAL]);
        assert!(ok);
        assert_eq!(stack, vec![Vec::<u8>::new()]);
    }

    #[test]
    fn test_op_equalverify_false() {
        let (ok, _) = run(&[OP_1, 0x52, OP_EQUALVERIFY]);
        assert!(!ok);
    }

    #[test]
    fn test_op_hash160() {
        let (ok, stack) = run(&[OP_1, OP_HASH160]);
        assert!(ok);
        assert_eq!(stack[0], hash160(&[1]).to_vec());
    }

    #[test]
    fn test_stack_underflow() {
        assert!(!run(&[OP_VERIFY]).0);
        assert!(!run(&[OP_1, OP_EQUAL]).0);
        assert!(!run(&[OP_HASH160]).0);
        assert!(!run(&[OP_DROP]).0);
    }

    #[test]
    fn test_op_return_and_unknown() {
        assert!(!run(&[OP_1, OP_RETURN]).0);
        assert!(!run(&[OP_1, 0xff]).0);
    }

    #[test]
    fn test_operation_limit() {
        let script = [OP_1, OP_VERIFY].repeat(MAX_SCRIPT_OPS + 1);
        let mut stack = Vec::new();
        assert!(eval_script(&script, &mut stack, &NoSignatureChecker).is_err());
    }

    #[test]
    fn test_stack_limit() {
        let script = vec![OP_1; MAX_STACK_SIZE + 1];
        let mut stack = Vec::new();
        assert!(eval_script(&script, &mut stack, &NoSignatureChecker).is_err());
    }

    #[test]
    fn test_cast_to_bool() {
        assert!(!cast_to_bool(&[]));
        assert!(!cast_to_bool(&[0x00, 0x00]));
        assert!(!cast_to_bool(&[0x00, 0x80]));
        assert!(cast_to_bool(&[0x01]));
        assert!(cast_to_bool(&[0x80, 0x00]));
    }

    #[test]
    fn test_script_numbers() {
        let cases: [(&[u8], i64); 7] = [
            (&[], 0),
            (&[0x01], 1),
            (&[0x81], -1),
            (&[0x80, 0x00], 128),
            (&[0x80, 0x80], -128),
            (&[0xff, 0xff, 0xff, 0x7f], 0x7fff_ffff),
            (&[0xff, 0xff, 0xff, 0xff], -0x7fff_ffff),
        ];
        for (bytes, n) in cases {
            assert_eq!(decode_num(bytes), Some(n));
        }
        assert_eq!(decode_num(&[1, 2, 3, 4, 5]), None);
    }

    #[test]
    fn test_is_push_only() {
        assert!(is_push_only(&[0x02, 0xaa, 0xbb, OP_0, OP_1]));
        assert!(!is_push_only(&[0x01, 0xaa, OP_DROP]));
        assert!(!is_push_only(&[0x05, 0xaa]));
    }

    fn zero_of_one_multisig() -> Vec<u8> {
        let mut script = vec![OP_0, 0x21];
        script.extend_from_slice(&[0x02; 33]);
        script.extend_from_slice(&[OP_1, OP_CHECKMULTISIG]);
        script
    }

    #[test]
    fn test_checkmultisig_requires_placeholder() {
        let (ok, _) = run(&zero_of_one_multisig());
        assert!(!ok);

        let mut with_placeholder = vec![OP_0];
        with_placeholder.extend_from_slice(&zero_of_one_multisig());
        let (ok, stack) = run(&with_placeholder);
        assert!(ok);
        assert_eq!(stack, vec![vec![1]]);
    }

    #[test]
    fn test_checkmultisig_rejects_non_empty_placeholder() {
        let mut script = vec![OP_1];
        script.extend_from_slice(&zero_of_one_multisig());
        let (ok, _) = run(&script);
        assert!(!ok);
    }

    #[test]
    fn test_verify_script_plain() {
        let ok = verify_script(&[OP_1], &[OP_1, OP_EQUAL], &vec![], &NoSignatureChecker).unwrap();
        assert!(ok);
        let ok = verify_script(&[OP_1], &[0x52, OP_EQUAL], &vec![], &NoSignatureChecker).unwrap();
        assert!(!ok);
    }

    #[test]
    fn test_verify_script_rejects_non_push_script_sig() {
        let script_sig = [OP_1, OP_1, OP_DROP];
        let ok = verify_script(&script_sig, &[OP_1], &vec![], &NoSignatureChecker).unwrap();
        assert!(!ok);
    }

    #[test]
    fn test_verify_native_p2wsh_hash_lock() {
        // Witness script: OP_SHA256 <h> OP_EQUAL, satisfied by the preimage
        let preimage = b"open sesame".to_vec();
        let mut witness_script = vec![OP_SHA256, 0x20];
        witness_script.extend_from_slice(&sha256(&preimage));
        witness_script.push(OP_EQUAL);

        let mut program = vec![OP_0, 0x20];
        program.extend_from_slice(&sha256(&witness_script));

        let witness = vec![preimage, witness_script.clone()];
        assert!(verify_script(&[], &program, &witness, &NoSignatureChecker).unwrap());

        let wrong = vec![b"wrong".to_vec(), witness_script];
        assert!(!verify_script(&[], &program, &wrong, &NoSignatureChecker).unwrap());
    }
}
