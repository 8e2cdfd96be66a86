//! Witness stack assembly for P2WSH multisig inputs
//!
//! OP_CHECKMULTISIG pops one item more than it uses (the historical
//! off-by-one), and it walks signatures and keys from the top of the stack
//! down, advancing through the keys until each signature finds its key. A
//! satisfying stack therefore holds, bottom to top:
//!
//! ```text
//! [ <empty>, sig(key_a), sig(key_b), ..., witness_script ]   with a < b < ...
//! ```
//!
//! where a, b, ... are positions of the signers' keys in the script.

use crate::error::{MultisigError, Result};
use crate::script::MultisigPolicy;
use crate::types::{ByteString, PublicKey, Witness};

/// The placeholder consumed by the CHECKMULTISIG off-by-one; must be empty
/// under the NULLDUMMY rule
pub const MULTISIG_PLACEHOLDER: &[u8] = &[];

/// A signature together with the public key it was made with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedSignature {
    pub pubkey: PublicKey,
    pub blob: ByteString,
}

/// CHECKMULTISIG ordering rule: signatures sorted by the position of their
/// public key in the script, independent of the order signers were supplied.
///
/// Signers are often listed in a different order than their keys; with the
/// reference 2-of-2 policy the first configured signer owns the second listed
/// key, so its signature lands after the other signer's.
///
/// Fails with `InvalidPolicy` if the count differs from m, a key is not part
/// of the policy, or a key signs twice.
#[doc(alias = "CHECKMULTISIG_ORDER")]
pub fn order_signatures(
    policy: &MultisigPolicy,
    signatures: &[KeyedSignature],
) -> Result<Vec<ByteString>> {
    if signatures.len() != policy.required() {
        return Err(MultisigError::InvalidPolicy(format!(
            "policy requires {} signatures, got {}",
            policy.required(),
            signatures.len()
        )));
    }

    let mut positioned = Vec::with_capacity(signatures.len());
    for signature in signatures {
        let position = policy.key_position(&signature.pubkey).ok_or_else(|| {
            MultisigError::InvalidPolicy(format!(
                "public key {} is not part of the multisig script",
                hex::encode(signature.pubkey.as_bytes())
            ))
        })?;
        positioned.push((position, signature.blob.clone()));
    }

    positioned.sort_by_key(|(position, _)| *position);
    if positioned.windows(2).any(|pair| pair[0].0 == pair[1].0) {
        return Err(MultisigError::InvalidPolicy(
            "the same key signed more than once".to_string(),
        ));
    }

    Ok(positioned.into_iter().map(|(_, blob)| blob).collect())
}

/// Build the m + 2 item witness: placeholder, ordered signatures, script
pub fn assemble(policy: &MultisigPolicy, signatures: &[KeyedSignature]) -> Result<Witness> {
    let ordered = order_signatures(policy, signatures)?;

    let mut witness = Vec::with_capacity(ordered.len() + 2);
    witness.push(MULTISIG_PLACEHOLDER.to_vec());
    witness.extend(ordered);
    witness.push(policy.script().to_vec());
    Ok(witness)
}
