//! Base58check address encoding for P2SH destinations
//!
//! address = Base58(version ‖ payload ‖ HASH256(version ‖ payload)[0..4])

use crate::constants::*;
use crate::error::{MultisigError, Result};
use crate::hash::double_sha256;
use crate::script::p2sh_script_pubkey;
use crate::types::{ByteString, Hash160};
use serde::{Deserialize, Serialize};

const CHECKSUM_LEN: usize = 4;

/// Network a P2SH address is valid on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
    Regtest,
}

impl Network {
    /// Base58check version byte for P2SH on this network
    pub fn p2sh_version(self) -> u8 {
        match self {
            Network::Mainnet => P2SH_VERSION_MAINNET,
            Network::Testnet | Network::Regtest => P2SH_VERSION_TESTNET,
        }
    }
}

/// Encode(v, p) = Base58(v ‖ p ‖ checksum(v ‖ p))
pub fn encode(version: u8, payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(1 + payload.len() + CHECKSUM_LEN);
    data.push(version);
    data.extend_from_slice(payload);
    let checksum = double_sha256(&data);
    data.extend_from_slice(&checksum[..CHECKSUM_LEN]);
    bs58::encode(data).into_string()
}

/// Decode(a) = (v, p), rejecting bad alphabet and bad checksums
pub fn decode(address: &str) -> Result<(u8, ByteString)> {
    let data = bs58::decode(address)
        .into_vec()
        .map_err(|e| MultisigError::InvalidEncoding(e.to_string()))?;
    if data.len() < 1 + CHECKSUM_LEN {
        return Err(MultisigError::InvalidEncoding(format!(
            "decoded address too short: {} bytes",
            data.len()
        )));
    }

    let (body, checksum) = data.split_at(data.len() - CHECKSUM_LEN);
    if double_sha256(body)[..CHECKSUM_LEN] != *checksum {
        return Err(MultisigError::ChecksumMismatch);
    }

    Ok((body[0], body[1..].to_vec()))
}

/// P2SH address for a 20-byte script hash
pub fn encode_p2sh(network: Network, script_hash: &Hash160) -> String {
    encode(network.p2sh_version(), script_hash)
}

/// Decode a P2SH address into its script hash, checking the network version byte
pub fn decode_p2sh(network: Network, address: &str) -> Result<Hash160> {
    let (version, payload) = decode(address)?;
    if version != network.p2sh_version() {
        return Err(MultisigError::InvalidEncoding(format!(
            "version byte {:#04x} is not P2SH on {:?}",
            version, network
        )));
    }
    let script_hash: Hash160 = payload.as_slice().try_into().map_err(|_| {
        MultisigError::InvalidEncoding(format!(
            "P2SH payload must be 20 bytes, got {}",
            payload.len()
        ))
    })?;
    Ok(script_hash)
}

/// Locking script (OP_HASH160 <20> OP_EQUAL) that pays a P2SH address
pub fn script_pubkey_for_address(network: Network, address: &str) -> Result<ByteString> {
    let script_hash = decode_p2sh(network, address)?;
    Ok(p2sh_script_pubkey(&script_hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_zero_payload_p2pkh() {
        assert_eq!(encode(0x00, &[0u8; 20]), "1111111111111111111114oLvT2");
    }

    #[test]
    fn test_encode_known_p2sh() {
        let script_hash = hex::decode("043f512301b66ffa8d73e71907e2b0b809895215").unwrap();
        assert_eq!(encode(0x05, &script_hash), "325UUecEQuyrTd28Xs2hvAxdAjHM7XzqVF");
    }

    #[test]
    fn test_decode_known_p2sh() {
        let (version, payload) = decode("325UUecEQuyrTd28Xs2hvAxdAjHM7XzqVF").unwrap();
        assert_eq!(version, P2SH_VERSION_MAINNET);
        assert_eq!(hex::encode(payload), "043f512301b66ffa8d73e71907e2b0b809895215");
    }

    #[test]
    fn test_decode_checksum_mismatch() {
        // Last character altered
        let result = decode("325UUecEQuyrTd28Xs2hvAxdAjHM7XzqVG");
        assert_eq!(result, Err(MultisigError::ChecksumMismatch));
    }

    #[test]
    fn test_decode_invalid_alphabet() {
        // '0', 'O', 'I' and 'l' are not in the base58 alphabet
        let result = decode("325UUecEQuyrTd28Xs2hvAxdAjHM7XzqV0");
        assert!(matches!(result, Err(MultisigError::InvalidEncoding(_))));
    }

    #[test]
    fn test_decode_too_short() {
        let result = decode("1111");
        assert!(matches!(result, Err(MultisigError::InvalidEncoding(_))));
    }

    #[test]
    fn test_decode_p2sh_wrong_network() {
        let result = decode_p2sh(Network::Testnet, "325UUecEQuyrTd28Xs2hvAxdAjHM7XzqVF");
        assert!(matches!(result, Err(MultisigError::InvalidEncoding(_))));
    }

    #[test]
    fn test_testnet_round_trip() {
        let script_hash = [0x42u8; 20];
        let address = encode_p2sh(Network::Testnet, &script_hash);
        assert!(address.starts_with('2'));
        assert_eq!(decode_p2sh(Network::Regtest, &address).unwrap(), script_hash);
    }

    #[test]
    fn test_script_pubkey_for_address() {
        let script = script_pubkey_for_address(
            Network::Mainnet,
            "325UUecEQuyrTd28Xs2hvAxdAjHM7XzqVF",
        )
        .unwrap();
        assert_eq!(
            hex::encode(script),
            "a914043f512301b66ffa8d73e71907e2b0b80989521587"
        );
    }
}
