//! # Segwit-Multisig
//!
//! Deterministic construction of P2SH-wrapped P2WSH multisig spends.
//!
//! This crate derives the address and scripts for an m-of-n multisig policy,
//! builds the spending transaction, computes BIP143 signature digests, signs
//! with deterministic low-S ECDSA and assembles the witness stack the
//! CHECKMULTISIG opcode expects. The finished transaction is checked against a
//! reference script evaluator before it is returned.
//!
//! ## Architecture
//!
//! Leaf modules first:
//! - `hash`, `address`, `encoding` (primitives and wire helpers)
//! - `script` (policy, witness program, P2SH wrapping)
//! - `transaction`, `sighash`, `signer`, `witness` (the signing protocol)
//! - `interpreter` (self-check)
//! - `config`, `builder` (the pipeline)
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: every stage is deterministic; the same configuration
//!    always yields the same bytes
//! 2. **Immutable Stages**: signing returns a new transaction instead of
//!    patching the unsigned one
//! 3. **Exact Version Pinning**: cryptographic dependencies are pinned to exact versions
//! 4. **Fail Closed**: address mismatches and failed self-checks are hard errors
//!
//! ## Usage
//!
//! ```rust
//! use segwit_multisig::SegwitMultisig;
//! use segwit_multisig::address::Network;
//!
//! let multisig = SegwitMultisig::new(Network::Mainnet);
//! let script = hex::decode(
//!     "5221032ff8c5df0bc00fe1ac2319c3b8070d6d1e04cfbf4fedda499ae7b775185ad53b\
//!      21039bbc8d24f89e5bc44c5b0d1980d6658316a6b2440023117c3c03a4975b04dd5652ae",
//! )
//! .unwrap();
//! let derived = multisig.derive(&script).unwrap();
//! assert_eq!(derived.address, "325UUecEQuyrTd28Xs2hvAxdAjHM7XzqVF");
//! ```

pub mod types;
pub mod constants;
pub mod error;
pub mod hash;
pub mod address;
pub mod encoding;
pub mod script;
pub mod transaction;
pub mod sighash;
pub mod signer;
pub mod witness;
pub mod interpreter;
pub mod config;
pub mod builder;

// Re-export commonly used types
pub use types::*;
pub use error::{MultisigError, Result};
pub use address::Network;
pub use builder::BuiltTransaction;
pub use config::{BuildConfig, InputConfig, SpendPlan};
pub use script::{MultisigPolicy, P2shP2wsh};
pub use sighash::SighashType;
pub use signer::{PrivateKey, Signer};

/// Entry point bound to one network
///
/// # Examples
///
/// ```
/// use segwit_multisig::{BuildConfig, InputConfig, Network, SegwitMultisig};
///
/// let multisig = SegwitMultisig::new(Network::Mainnet);
/// let config = BuildConfig::new(
///     vec![
///         "39dc0a9f0b185a2ee56349691f34716e6e0cda06a7f9707742ac113c4e2317bf".to_string(),
///         "5077ccd9c558b7d04a81920d38aa11b4a9f9de3b23fab45c3ef28039920fdd6d".to_string(),
///     ],
///     "5221032ff8c5df0bc00fe1ac2319c3b8070d6d1e04cfbf4fedda499ae7b775185ad53b\
///      21039bbc8d24f89e5bc44c5b0d1980d6658316a6b2440023117c3c03a4975b04dd5652ae"
///         .to_string(),
///     vec![InputConfig { txid: "00".repeat(32), vout: 0, value: 100_000 }],
///     100_000,
/// );
///
/// let built = multisig.build(&config).unwrap();
/// assert_eq!(built.signed.inputs[0].witness.len(), 4);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SegwitMultisig {
    network: Network,
}

impl SegwitMultisig {
    /// Create an instance for `network`
    ///
    /// # Examples
    ///
    /// ```
    /// use segwit_multisig::{Network, SegwitMultisig};
    ///
    /// let multisig = SegwitMultisig::new(Network::Testnet);
    /// assert_eq!(multisig.network(), Network::Testnet);
    /// ```
    pub fn new(network: Network) -> Self {
        Self { network }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Derive witness program, redeem script, scriptPubKey, scriptSig and address
    pub fn derive(&self, multisig_script: &[u8]) -> Result<P2shP2wsh> {
        P2shP2wsh::derive(multisig_script, self.network)
    }

    /// Build an m-of-n policy script from ordered public keys
    ///
    /// # Examples
    ///
    /// ```
    /// use segwit_multisig::{Network, PrivateKey, SegwitMultisig, Signer};
    ///
    /// let signer = Signer::new();
    /// let keys: Vec<_> = [[1u8; 32], [2u8; 32], [3u8; 32]]
    ///     .iter()
    ///     .map(|k| signer.public_key(&PrivateKey::from_slice(k).unwrap()))
    ///     .collect();
    ///
    /// let multisig = SegwitMultisig::new(Network::Mainnet);
    /// let policy = multisig.policy(2, keys).unwrap();
    /// assert_eq!(policy.script().len(), 3 + 3 * 34);
    /// ```
    pub fn policy(&self, required: usize, pubkeys: Vec<PublicKey>) -> Result<MultisigPolicy> {
        MultisigPolicy::new(required, pubkeys)
    }

    /// Build, sign and self-check a spend. The configuration's own network
    /// is replaced by this instance's.
    pub fn build(&self, config: &BuildConfig) -> Result<BuiltTransaction> {
        let mut plan = config.resolve()?;
        plan.network = self.network;
        builder::build_plan(&plan)
    }

    /// Build from a JSON configuration
    pub fn build_from_json(&self, json: &str) -> Result<BuiltTransaction> {
        self.build(&BuildConfig::from_json(json)?)
    }

    /// BIP143 digest of input `index`
    pub fn sighash(
        &self,
        tx: &Transaction,
        index: usize,
        script_code: &[u8],
        value: u64,
        sighash_type: SighashType,
    ) -> Result<Hash> {
        sighash::segwit_v0_sighash(tx, index, script_code, value, sighash_type)
    }

    /// Verify input `index` of `tx` against the output it spends
    pub fn verify_input(
        &self,
        tx: &Transaction,
        index: usize,
        script_pubkey: &[u8],
        value: u64,
    ) -> Result<bool> {
        interpreter::verify_input(tx, index, script_pubkey, value)
    }

    /// Broadcast serialization
    pub fn serialize(&self, tx: &Transaction) -> Vec<u8> {
        transaction::serialize_for_broadcast(tx)
    }

    /// Parse a transaction in either serialization
    pub fn deserialize(&self, bytes: &[u8]) -> Result<Transaction> {
        transaction::deserialize(bytes)
    }

    /// P2SH address for a 20-byte script hash on this network
    pub fn address_for(&self, script_hash: &Hash160) -> String {
        address::encode_p2sh(self.network, script_hash)
    }
}
