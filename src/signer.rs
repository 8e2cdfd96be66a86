//! Deterministic ECDSA signing with low-S canonicalization and strict DER
//!
//! Nonces follow RFC6979, so Sign(k, h) is a pure function of key and digest.

use crate::constants::*;
use crate::error::{MultisigError, Result};
use crate::sighash::SighashType;
use crate::types::{ByteString, Hash, PublicKey, Signature};
use secp256k1::{ecdsa, All, Message, Secp256k1, SecretKey};

/// Private key wrapper that validates length and scalar range on construction
#[derive(Clone)]
pub struct PrivateKey(SecretKey);

impl PrivateKey {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PRIVATE_KEY_SIZE {
            return Err(MultisigError::InvalidKeyLength(bytes.len()));
        }
        SecretKey::from_slice(bytes)
            .map(PrivateKey)
            .map_err(|e| MultisigError::InvalidPrivateKey(e.to_string()))
    }

    pub fn from_hex(hex_str: &str) -> Result<Self> {
        Self::from_slice(&hex::decode(hex_str.trim())?)
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

/// Stateless signer holding a secp256k1 context
pub struct Signer {
    secp: Secp256k1<All>,
}

impl Default for Signer {
    fn default() -> Self {
        Self::new()
    }
}

impl Signer {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
        }
    }

    /// Compressed public key P = k·G
    pub fn public_key(&self, key: &PrivateKey) -> PublicKey {
        PublicKey(secp256k1::PublicKey::from_secret_key(&self.secp, &key.0).serialize())
    }

    /// Sign(k, h) → (r, s) with s ≤ n/2
    pub fn sign(&self, key: &PrivateKey, digest: &Hash) -> Result<Signature> {
        let message = Message::from_digest_slice(digest)
            .map_err(|e| MultisigError::InvalidEncoding(e.to_string()))?;
        let compact = self.secp.sign_ecdsa(&message, &key.0).serialize_compact();

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&compact[..32]);
        s.copy_from_slice(&compact[32..]);
        Ok(canonicalize(Signature { r, s }))
    }

    /// Sign and serialize as DER ‖ sighash byte, the form pushed in a witness
    pub fn sign_blob(
        &self,
        key: &PrivateKey,
        digest: &Hash,
        sighash_type: SighashType,
    ) -> Result<ByteString> {
        let signature = self.sign(key, digest)?;
        Ok(SignatureBlob {
            signature,
            sighash_type,
        }
        .serialize())
    }

    /// Verify(P, h, (r, s)); high-S signatures are rejected
    pub fn verify(&self, pubkey: &[u8], digest: &Hash, signature: &Signature) -> bool {
        let Ok(pubkey) = secp256k1::PublicKey::from_slice(pubkey) else {
            return false;
        };
        let Ok(message) = Message::from_digest_slice(digest) else {
            return false;
        };
        let mut compact = [0u8; 64];
        compact[..32].copy_from_slice(&signature.r);
        compact[32..].copy_from_slice(&signature.s);
        let Ok(sig) = ecdsa::Signature::from_compact(&compact) else {
            return false;
        };
        self.secp.verify_ecdsa(&message, &sig, &pubkey).is_ok()
    }
}

/// s ≤ n/2
pub fn is_low_s(signature: &Signature) -> bool {
    signature.s <= HALF_CURVE_ORDER
}

/// Low-S rule: if s > n/2 then s := n − s
pub fn canonicalize(signature: Signature) -> Signature {
    if is_low_s(&signature) {
        signature
    } else {
        Signature {
            r: signature.r,
            s: subtract_from_order(&signature.s),
        }
    }
}

/// n − v for 32-byte big-endian v < n
fn subtract_from_order(v: &[u8; 32]) -> [u8; 32] {
    let mut result = [0u8; 32];
    let mut borrow = 0i16;
    for i in (0..32).rev() {
        let mut diff = CURVE_ORDER[i] as i16 - v[i] as i16 - borrow;
        borrow = 0;
        if diff < 0 {
            diff += 256;
            borrow = 1;
        }
        result[i] = diff as u8;
    }
    result
}

/// Minimal DER INTEGER body: leading zeros stripped, 0x00 prepended when the
/// high bit would otherwise mark the value negative
fn der_integer(value: &[u8; 32]) -> Vec<u8> {
    let start = value.iter().position(|&b| b != 0).unwrap_or(31);
    let trimmed = &value[start..];
    let mut out = Vec::with_capacity(trimmed.len() + 1);
    if trimmed[0] & 0x80 != 0 {
        out.push(0x00);
    }
    out.extend_from_slice(trimmed);
    out
}

/// 0x30 ‖ len ‖ 0x02 ‖ len(r) ‖ r ‖ 0x02 ‖ len(s) ‖ s
pub fn encode_der(signature: &Signature) -> ByteString {
    let r = der_integer(&signature.r);
    let s = der_integer(&signature.s);
    let body_len = 4 + r.len() + s.len();

    let mut out = Vec::with_capacity(2 + body_len);
    out.push(0x30);
    out.push(body_len as u8);
    out.push(0x02);
    out.push(r.len() as u8);
    out.extend_from_slice(&r);
    out.push(0x02);
    out.push(s.len() as u8);
    out.extend_from_slice(&s);
    out
}

/// Read one strict DER INTEGER (tag, length, minimal non-negative body)
fn read_der_integer<'a>(bytes: &'a [u8], name: &str) -> Result<(&'a [u8], &'a [u8])> {
    let malformed = |msg: &str| MultisigError::DerMalformed(format!("{}: {}", name, msg));

    match bytes.first() {
        Some(0x02) => {}
        Some(tag) => return Err(malformed(&format!("expected INTEGER tag, found {:#04x}", tag))),
        None => return Err(malformed("missing")),
    }
    let len = *bytes.get(1).ok_or_else(|| malformed("missing length"))? as usize;
    if len == 0 {
        return Err(malformed("zero length"));
    }
    if bytes.len() < 2 + len {
        return Err(malformed("truncated"));
    }
    let body = &bytes[2..2 + len];
    if body[0] & 0x80 != 0 {
        return Err(malformed("negative"));
    }
    if len > 1 && body[0] == 0x00 && body[1] & 0x80 == 0 {
        return Err(malformed("excess padding"));
    }
    Ok((body, &bytes[2 + len..]))
}

fn integer_to_scalar(body: &[u8], name: &str) -> Result<[u8; 32]> {
    let trimmed = match body {
        [0x00, rest @ ..] if !rest.is_empty() => rest,
        _ => body,
    };
    if trimmed.len() > 32 {
        return Err(MultisigError::DerMalformed(format!("{}: wider than 32 bytes", name)));
    }
    let mut scalar = [0u8; 32];
    scalar[32 - trimmed.len()..].copy_from_slice(trimmed);
    if scalar == [0u8; 32] {
        return Err(MultisigError::DerMalformed(format!("{}: zero", name)));
    }
    if scalar >= CURVE_ORDER {
        return Err(MultisigError::DerMalformed(format!("{}: not below the curve order", name)));
    }
    Ok(scalar)
}

/// Exact inverse of `encode_der`
pub fn decode_der(bytes: &[u8]) -> Result<Signature> {
    match bytes.first() {
        Some(0x30) => {}
        Some(tag) => {
            return Err(MultisigError::DerMalformed(format!(
                "expected SEQUENCE tag, found {:#04x}",
                tag
            )))
        }
        None => return Err(MultisigError::DerMalformed("empty input".to_string())),
    }
    let total = *bytes
        .get(1)
        .ok_or_else(|| MultisigError::DerMalformed("missing sequence length".to_string()))?
        as usize;
    if total != bytes.len() - 2 {
        return Err(MultisigError::DerMalformed(format!(
            "sequence length {} does not match {} content bytes",
            total,
            bytes.len() - 2
        )));
    }

    let (r_body, rest) = read_der_integer(&bytes[2..], "r")?;
    let (s_body, rest) = read_der_integer(rest, "s")?;
    if !rest.is_empty() {
        return Err(MultisigError::DerMalformed(format!(
            "{} bytes after s",
            rest.len()
        )));
    }

    Ok(Signature {
        r: integer_to_scalar(r_body, "r")?,
        s: integer_to_scalar(s_body, "s")?,
    })
}

/// Signature as consumed by script: DER ‖ sighash byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureBlob {
    pub signature: Signature,
    pub sighash_type: SighashType,
}

impl SignatureBlob {
    pub fn serialize(&self) -> ByteString {
        let mut out = encode_der(&self.signature);
        out.push(self.sighash_type.to_byte());
        out
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let (&sighash_byte, der) = bytes
            .split_last()
            .ok_or_else(|| MultisigError::DerMalformed("empty signature".to_string()))?;
        Ok(Self {
            signature: decode_der(der)?,
            sighash_type: SighashType::from_byte(sighash_byte)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY1: &str = "39dc0a9f0b185a2ee56349691f34716e6e0cda06a7f9707742ac113c4e2317bf";
    const KEY2: &str = "5077ccd9c558b7d04a81920d38aa11b4a9f9de3b23fab45c3ef28039920fdd6d";
    const SIGHASH: &str = "5ef430728099efb90dfda0a177aefcc14ed06e470a93dd54e1c4d4c8f7a0aea1";

    fn digest() -> Hash {
        hex::decode(SIGHASH).unwrap().try_into().unwrap()
    }

    #[test]
    fn test_public_keys() {
        let signer = Signer::new();
        let key1 = PrivateKey::from_hex(KEY1).unwrap();
        let key2 = PrivateKey::from_hex(KEY2).unwrap();
        assert_eq!(
            hex::encode(signer.public_key(&key1).as_bytes()),
            "039bbc8d24f89e5bc44c5b0d1980d6658316a6b2440023117c3c03a4975b04dd56"
        );
        assert_eq!(
            hex::encode(signer.public_key(&key2).as_bytes()),
            "032ff8c5df0bc00fe1ac2319c3b8070d6d1e04cfbf4fedda499ae7b775185ad53b"
        );
    }

    #[test]
    fn test_sign_reference_vectors() {
        let signer = Signer::new();
        let blob1 = signer
            .sign_blob(&PrivateKey::from_hex(KEY1).unwrap(), &digest(), SighashType::ALL)
            .unwrap();
        let blob2 = signer
            .sign_blob(&PrivateKey::from_hex(KEY2).unwrap(), &digest(), SighashType::ALL)
            .unwrap();
        assert_eq!(
            hex::encode(blob1),
            "30450221009c5be27daa6a90db8b5e1d266078a0adc43fdfc11feb11e13a683763770b4494022072df4e7e0d767bb5ba2059d5f6114b519ffc072042d2a4a6ba8c00cb937edde301"
        );
        assert_eq!(
            hex::encode(blob2),
            "304402203e64841a39986e3d684752888ee17110e7877313c67d2c47391d70ec3a791e9002205342af2be9d4385bfa5bf24498f1a57d7a893bba088a931f9ae2065e898c3e6c01"
        );
    }

    #[test]
    fn test_sign_is_deterministic() {
        let signer = Signer::new();
        let key = PrivateKey::from_hex(KEY1).unwrap();
        assert_eq!(signer.sign(&key, &digest()).unwrap(), signer.sign(&key, &digest()).unwrap());
    }

    #[test]
    fn test_sign_verify() {
        let signer = Signer::new();
        let key = PrivateKey::from_hex(KEY2).unwrap();
        let sig = signer.sign(&key, &digest()).unwrap();
        assert!(is_low_s(&sig));
        assert!(signer.verify(signer.public_key(&key).as_bytes(), &digest(), &sig));

        let mut other = digest();
        other[0] ^= 1;
        assert!(!signer.verify(signer.public_key(&key).as_bytes(), &other, &sig));
    }

    #[test]
    fn test_invalid_keys() {
        assert_eq!(
            PrivateKey::from_slice(&[1u8; 31]).unwrap_err(),
            MultisigError::InvalidKeyLength(31)
        );
        assert!(matches!(
            PrivateKey::from_slice(&[0u8; 32]),
            Err(MultisigError::InvalidPrivateKey(_))
        ));
        assert!(matches!(
            PrivateKey::from_slice(&CURVE_ORDER),
            Err(MultisigError::InvalidPrivateKey(_))
        ));
    }

    #[test]
    fn test_canonicalize_high_s() {
        let mut s = CURVE_ORDER;
        s[31] -= 1; // n - 1
        let sig = canonicalize(Signature { r: [1u8; 32], s });
        let mut one = [0u8; 32];
        one[31] = 1;
        assert_eq!(sig.s, one);

        let half = Signature { r: [1u8; 32], s: HALF_CURVE_ORDER };
        assert_eq!(canonicalize(half), half);
    }

    #[test]
    fn test_encode_der_padding_and_trimming() {
        let mut r = [0u8; 32];
        r[31] = 0x80;
        let mut s = [0u8; 32];
        s[31] = 0x01;
        let der = encode_der(&Signature { r, s });
        assert_eq!(der, vec![0x30, 0x07, 0x02, 0x02, 0x00, 0x80, 0x02, 0x01, 0x01]);
        assert_eq!(decode_der(&der).unwrap(), Signature { r, s });
    }

    #[test]
    fn test_decode_der_rejects_malformed() {
        let good = encode_der(&Signature { r: [0x11; 32], s: [0x22; 32] });
        assert!(decode_der(&good).is_ok());

        let cases: Vec<Vec<u8>> = vec![
            vec![],
            {
                let mut b = good.clone();
                b[0] = 0x31;
                b
            },
            {
                let mut b = good.clone();
                b[1] += 1;
                b
            },
            {
                let mut b = good.clone();
                b[2] = 0x03;
                b
            },
            good[..good.len() - 1].to_vec(),
            {
                let mut b = good.clone();
                b.push(0x00);
                b
            },
            // negative r
            vec![0x30, 0x06, 0x02, 0x01, 0x80, 0x02, 0x01, 0x01],
            // zero-padded r without need
            vec![0x30, 0x07, 0x02, 0x02, 0x00, 0x01, 0x02, 0x01, 0x01],
            // zero r
            vec![0x30, 0x06, 0x02, 0x01, 0x00, 0x02, 0x01, 0x01],
            // empty s
            vec![0x30, 0x05, 0x02, 0x01, 0x01, 0x02, 0x00],
        ];
        for case in cases {
            assert!(
                matches!(decode_der(&case), Err(MultisigError::DerMalformed(_))),
                "accepted {}",
                hex::encode(&case)
            );
        }
    }

    #[test]
    fn test_decode_der_rejects_order() {
        let mut body = vec![0x00];
        body.extend_from_slice(&CURVE_ORDER);
        let mut der = vec![0x30, (2 + body.len() + 3) as u8, 0x02, body.len() as u8];
        der.extend_from_slice(&body);
        der.extend_from_slice(&[0x02, 0x01, 0x01]);
        assert!(matches!(decode_der(&der), Err(MultisigError::DerMalformed(_))));
    }

    #[test]
    fn test_signature_blob_round_trip() {
        let blob = SignatureBlob {
            signature: Signature { r: [0x7f; 32], s: [0x01; 32] },
            sighash_type: SighashType::ALL,
        };
        let bytes = blob.serialize();
        assert_eq!(*bytes.last().unwrap(), 0x01);
        assert_eq!(SignatureBlob::parse(&bytes).unwrap(), blob);
        assert!(SignatureBlob::parse(&[]).is_err());
    }
}
