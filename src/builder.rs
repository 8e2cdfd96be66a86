//! Build pipeline: derive → unsigned tx → sighash → sign → witness → self-check
//!
//! Every stage is a pure function of its inputs. The unsigned and signed
//! transactions are separate values; signing never mutates the unsigned one.

use crate::address;
use crate::config::{BuildConfig, SpendPlan};
use crate::error::{MultisigError, Result};
use crate::interpreter;
use crate::script::{MultisigPolicy, P2shP2wsh};
use crate::sighash::{segwit_v0_sighash_with_midstate, SighashMidstate, SighashType};
use crate::signer::{PrivateKey, Signer};
use crate::transaction;
use crate::types::*;
use crate::witness::{self, KeyedSignature};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Everything a finished build produces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltTransaction {
    pub derived: P2shP2wsh,
    pub unsigned: Transaction,
    pub signed: Transaction,
    /// One digest per input, in input order
    pub sighashes: Vec<Hash>,
    /// Broadcast bytes of the signed transaction
    pub bytes: ByteString,
    pub hex: String,
    /// Display-order txid
    pub txid: String,
    /// Display-order wtxid
    pub wtxid: String,
    pub weight: u64,
    pub vsize: u64,
}

/// Derive the scripts and address, failing hard when they disagree with
/// `expected_address`
pub fn derive_checked(
    multisig_script: &[u8],
    network: address::Network,
    expected_address: Option<&str>,
) -> Result<P2shP2wsh> {
    let derived = P2shP2wsh::derive(multisig_script, network)?;
    debug!("witness program: {}", hex::encode(derived.witness_program.as_bytes()));
    debug!("script hash: {}", hex::encode(derived.script_hash));
    debug!("scriptPubKey: {}", hex::encode(derived.script_pubkey.as_bytes()));
    debug!("address: {}", derived.address);

    if let Some(expected) = expected_address {
        if expected != derived.address {
            warn!(
                "derived address {} does not match expected {}",
                derived.address, expected
            );
            return Err(MultisigError::AddressMismatch {
                expected: expected.to_string(),
                derived: derived.address.clone(),
            });
        }
    }
    Ok(derived)
}

/// Unsigned spend of `inputs` to a single output.
///
/// Each input carries the P2SH scriptSig already: it is part of the txid and
/// does not depend on any signature.
pub fn build_unsigned(
    derived: &P2shP2wsh,
    inputs: &[SpendInput],
    output_script: ByteString,
    amount: u64,
    sequence: u32,
    lock_time: u32,
    version: u32,
) -> Transaction {
    Transaction {
        version,
        inputs: inputs
            .iter()
            .map(|input| TransactionInput {
                prevout: input.prevout,
                script_sig: derived.script_sig.bytes.clone(),
                sequence,
                witness: Vec::new(),
            })
            .collect(),
        outputs: vec![TransactionOutput {
            value: amount,
            script_pubkey: output_script,
        }],
        lock_time,
    }
}

/// Choose the signing keys: every key must belong to the policy, and the
/// first m supplied are used
pub fn select_signers<'k>(
    signer: &Signer,
    policy: &MultisigPolicy,
    keys: &'k [PrivateKey],
) -> Result<Vec<(PublicKey, &'k PrivateKey)>> {
    let mut selected = Vec::with_capacity(policy.required());
    for key in keys {
        let pubkey = signer.public_key(key);
        if policy.key_position(&pubkey).is_none() {
            return Err(MultisigError::InvalidPolicy(format!(
                "private key for {} is not part of the multisig script",
                hex::encode(pubkey.as_bytes())
            )));
        }
        if selected.len() < policy.required() {
            selected.push((pubkey, key));
        }
    }

    if selected.len() < policy.required() {
        return Err(MultisigError::InvalidPolicy(format!(
            "policy requires {} signers, got {}",
            policy.required(),
            selected.len()
        )));
    }
    if keys.len() > selected.len() {
        debug!("{} extra signing keys ignored", keys.len() - selected.len());
    }
    Ok(selected)
}

/// Sign every input of `unsigned` and return the signed copy plus the
/// per-input digests.
///
/// `inputs` must line up with `unsigned.inputs`; their values are what the
/// digests commit to.
pub fn sign_transaction(
    unsigned: &Transaction,
    policy: &MultisigPolicy,
    keys: &[PrivateKey],
    inputs: &[SpendInput],
    sighash_type: SighashType,
) -> Result<(Transaction, Vec<Hash>)> {
    if inputs.len() != unsigned.inputs.len() {
        return Err(MultisigError::InputIndexOutOfRange {
            index: inputs.len(),
            count: unsigned.inputs.len(),
        });
    }

    let signer = Signer::new();
    let signers = select_signers(&signer, policy, keys)?;
    let midstate = SighashMidstate::new(unsigned);

    let mut signed = unsigned.clone();
    let mut sighashes = Vec::with_capacity(inputs.len());
    for (index, input) in inputs.iter().enumerate() {
        let digest = segwit_v0_sighash_with_midstate(
            unsigned,
            &midstate,
            index,
            policy.script(),
            input.value,
            sighash_type,
        )?;
        debug!("input {} sighash: {}", index, hex::encode(digest));

        let mut signatures = Vec::with_capacity(signers.len());
        for (pubkey, key) in &signers {
            let blob = signer.sign_blob(key, &digest, sighash_type)?;
            debug!(
                "input {} signature by {}: {}",
                index,
                hex::encode(pubkey.as_bytes()),
                hex::encode(&blob)
            );
            signatures.push(KeyedSignature {
                pubkey: *pubkey,
                blob,
            });
        }

        signed.inputs[index].witness = witness::assemble(policy, &signatures)?;
        sighashes.push(digest);
    }

    Ok((signed, sighashes))
}

/// Run the reference evaluator over every input of `tx`
pub fn verify_transaction(
    tx: &Transaction,
    script_pubkey: &[u8],
    inputs: &[SpendInput],
) -> Result<()> {
    for (index, input) in inputs.iter().enumerate() {
        match interpreter::verify_input(tx, index, script_pubkey, input.value) {
            Ok(true) => {}
            Ok(false) => {
                return Err(MultisigError::WitnessVerificationFailed(format!(
                    "input {} does not satisfy its script",
                    index
                )))
            }
            Err(e) => {
                return Err(MultisigError::WitnessVerificationFailed(format!(
                    "input {}: {}",
                    index, e
                )))
            }
        }
    }
    Ok(())
}

/// Run the whole pipeline over a validated plan
pub fn build_plan(plan: &SpendPlan) -> Result<BuiltTransaction> {
    let derived = derive_checked(
        &plan.multisig_script,
        plan.network,
        plan.expected_address.as_deref(),
    )?;
    let policy = MultisigPolicy::parse(&plan.multisig_script)?;

    let output_script = match &plan.destination {
        Some(destination) => address::script_pubkey_for_address(plan.network, destination)?,
        None => derived.script_pubkey.bytes.clone(),
    };

    let unsigned = build_unsigned(
        &derived,
        &plan.inputs,
        output_script,
        plan.amount,
        plan.sequence,
        plan.lock_time,
        plan.version,
    );
    debug!("unsigned transaction: {}", transaction::to_hex(&unsigned));

    let (signed, sighashes) = sign_transaction(
        &unsigned,
        &policy,
        &plan.private_keys,
        &plan.inputs,
        plan.sighash_type,
    )?;

    if plan.verify {
        verify_transaction(&signed, derived.script_pubkey.as_bytes(), &plan.inputs)?;
        debug!("reference evaluator accepted all {} inputs", signed.inputs.len());
    }

    let bytes = transaction::serialize_for_broadcast(&signed);
    let hex = hex::encode(&bytes);
    let txid = transaction::hash_to_display_hex(&transaction::txid(&signed));
    let wtxid = transaction::hash_to_display_hex(&transaction::wtxid(&signed));
    debug!("final transaction: {}", hex);
    info!(
        "built {}-of-{} spend from {}: txid {} ({} bytes)",
        policy.required(),
        policy.pubkeys().len(),
        derived.address,
        txid,
        bytes.len()
    );

    Ok(BuiltTransaction {
        weight: transaction::weight(&signed),
        vsize: transaction::vsize(&signed),
        derived,
        unsigned,
        signed,
        sighashes,
        bytes,
        hex,
        txid,
        wtxid,
    })
}

/// Resolve `config` and build
pub fn build(config: &BuildConfig) -> Result<BuiltTransaction> {
    build_plan(&config.resolve()?)
}
