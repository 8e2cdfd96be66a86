//! Build configuration
//!
//! Key material, the policy script and the coins to spend are supplied by the
//! caller as a `BuildConfig`, typically loaded from JSON, and validated into a
//! typed `SpendPlan` before anything is derived or signed.

use crate::address::Network;
use crate::constants::*;
use crate::error::{MultisigError, Result};
use crate::sighash::SighashType;
use crate::signer::PrivateKey;
use crate::types::*;
use serde::{Deserialize, Serialize};

/// A coin to spend, as reported by a node: display-order txid, output index, value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputConfig {
    pub txid: String,
    pub vout: u32,
    /// Value of the spent output in satoshis; committed to by the sighash
    pub value: u64,
}

/// Raw build configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Hex-encoded 32-byte private keys, at least m of them
    pub private_keys: Vec<String>,
    /// Hex-encoded multisig witness script
    pub multisig_script: String,
    pub inputs: Vec<InputConfig>,
    /// Satoshis paid to the single output
    pub amount: u64,
    /// P2SH address to pay; the derived address when absent
    #[serde(default)]
    pub destination: Option<String>,
    /// Address the derived one must equal
    #[serde(default)]
    pub expected_address: Option<String>,
    #[serde(default = "default_sequence")]
    pub sequence: u32,
    #[serde(default = "default_lock_time")]
    pub lock_time: u32,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub network: Network,
    #[serde(default = "default_sighash_type")]
    pub sighash_type: u8,
    /// Run the reference evaluator over the signed transaction
    #[serde(default = "default_verify")]
    pub verify: bool,
}

fn default_sequence() -> u32 {
    SEQUENCE_FINAL
}

fn default_lock_time() -> u32 {
    DEFAULT_LOCK_TIME
}

fn default_version() -> u32 {
    DEFAULT_TX_VERSION
}

fn default_sighash_type() -> u8 {
    SighashType::ALL.to_byte()
}

fn default_verify() -> bool {
    true
}

/// Validated, typed form of a `BuildConfig`
#[derive(Debug, Clone)]
pub struct SpendPlan {
    pub private_keys: Vec<PrivateKey>,
    pub multisig_script: ByteString,
    pub inputs: Vec<SpendInput>,
    pub amount: u64,
    pub destination: Option<String>,
    pub expected_address: Option<String>,
    pub sequence: u32,
    pub lock_time: u32,
    pub version: u32,
    pub network: Network,
    pub sighash_type: SighashType,
    pub verify: bool,
}

impl BuildConfig {
    /// Config with defaults for everything but keys, script, coins and amount
    pub fn new(
        private_keys: Vec<String>,
        multisig_script: String,
        inputs: Vec<InputConfig>,
        amount: u64,
    ) -> Self {
        Self {
            private_keys,
            multisig_script,
            inputs,
            amount,
            destination: None,
            expected_address: None,
            sequence: default_sequence(),
            lock_time: default_lock_time(),
            version: default_version(),
            network: Network::default(),
            sighash_type: default_sighash_type(),
            verify: default_verify(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decode and validate every field
    pub fn resolve(&self) -> Result<SpendPlan> {
        if self.private_keys.is_empty() {
            return Err(MultisigError::Config("no private keys supplied".to_string()));
        }
        let private_keys = self
            .private_keys
            .iter()
            .map(|key| PrivateKey::from_hex(key))
            .collect::<Result<Vec<_>>>()?;

        let multisig_script = hex::decode(self.multisig_script.trim())?;
        if multisig_script.is_empty() {
            return Err(MultisigError::Config("multisig script is empty".to_string()));
        }

        if self.inputs.is_empty() {
            return Err(MultisigError::Config("no inputs supplied".to_string()));
        }
        let inputs = self
            .inputs
            .iter()
            .map(resolve_input)
            .collect::<Result<Vec<_>>>()?;

        let total = inputs
            .iter()
            .try_fold(0u64, |acc, input| acc.checked_add(input.value))
            .ok_or_else(|| MultisigError::Config("input values overflow".to_string()))?;
        if self.amount > total {
            return Err(MultisigError::Config(format!(
                "amount {} exceeds input total {}",
                self.amount, total
            )));
        }

        Ok(SpendPlan {
            private_keys,
            multisig_script,
            inputs,
            amount: self.amount,
            destination: self.destination.clone(),
            expected_address: self.expected_address.clone(),
            sequence: self.sequence,
            lock_time: self.lock_time,
            version: self.version,
            network: self.network,
            sighash_type: SighashType::from_byte(self.sighash_type)?,
            verify: self.verify,
        })
    }
}

/// The txid arrives in display order and is stored reversed (internal order)
fn resolve_input(input: &InputConfig) -> Result<SpendInput> {
    let bytes = hex::decode(input.txid.trim())?;
    let mut txid: Hash = bytes.as_slice().try_into().map_err(|_| {
        MultisigError::Config(format!("txid must be 32 bytes, got {}", bytes.len()))
    })?;
    txid.reverse();
    Ok(SpendInput {
        prevout: OutPoint {
            txid,
            index: input.vout,
        },
        value: input.value,
    })
}
