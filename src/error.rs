//! Error types for building and signing multisig spends

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MultisigError {
    #[error("Script too long: {len} bytes exceeds {max}")]
    ScriptTooLong { len: usize, max: usize },

    #[error("Invalid key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid multisig policy: {0}")]
    InvalidPolicy(String),

    #[error("Address checksum mismatch")]
    ChecksumMismatch,

    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    #[error("Malformed DER signature: {0}")]
    DerMalformed(String),

    #[error("Truncated input: needed {needed} bytes at offset {offset}")]
    TruncatedInput { offset: usize, needed: usize },

    #[error("Trailing bytes: {0} unread bytes after transaction")]
    TrailingBytes(usize),

    #[error("Non-canonical CompactSize encoding of {0}")]
    NonCanonicalCompactSize(u64),

    #[error("Input index {index} out of range for {count} inputs")]
    InputIndexOutOfRange { index: usize, count: usize },

    #[error("Address mismatch: expected {expected}, derived {derived}")]
    AddressMismatch { expected: String, derived: String },

    #[error("Script execution failed: {0}")]
    ScriptExecution(String),

    #[error("Witness verification failed: {0}")]
    WitnessVerificationFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, MultisigError>;

impl From<hex::FromHexError> for MultisigError {
    fn from(err: hex::FromHexError) -> Self {
        MultisigError::InvalidEncoding(err.to_string())
    }
}

impl From<serde_json::Error> for MultisigError {
    fn from(err: serde_json::Error) -> Self {
        MultisigError::Config(err.to_string())
    }
}
