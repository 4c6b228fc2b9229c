use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{Signature as K256Signature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use thiserror::Error;

use super::Hash;

#[derive(Debug, Error)]
pub enum EcdsaError {
    #[error("public key is not a valid secp256k1 point: {0}")]
    InvalidPublicKey(String),
    #[error("signature components are malformed: {0}")]
    InvalidSignature(String),
    #[error("signature does not verify against the supplied public key")]
    VerificationFailed,
}

/// Verifies a secp256k1 ECDSA signature over a 32-byte message hash.
///
/// `public_key` may be SEC1 compressed (33 bytes) or uncompressed (65 bytes);
/// compressed keys are decompressed before verification.
pub fn verify_ecdsa(msg_hash: &Hash, r: &[u8], s: &[u8], public_key: &[u8]) -> Result<(), EcdsaError> {
    let verifying_key = VerifyingKey::from_sec1_bytes(public_key)
        .map_err(|e| EcdsaError::InvalidPublicKey(e.to_string()))?;

    let mut sig_bytes = Vec::with_capacity(64);
    sig_bytes.extend_from_slice(&left_pad_32(r));
    sig_bytes.extend_from_slice(&left_pad_32(s));
    let signature = K256Signature::from_slice(&sig_bytes)
        .map_err(|e| EcdsaError::InvalidSignature(e.to_string()))?;

    verifying_key
        .verify_prehash(msg_hash.as_bytes(), &signature)
        .map_err(|_| EcdsaError::VerificationFailed)
}

/// Returns the uncompressed SEC1 encoding of a possibly-compressed public key,
/// for address schemes that are defined over the uncompressed point.
pub fn decompress_public_key(public_key: &[u8]) -> Result<Vec<u8>, EcdsaError> {
    let verifying_key = VerifyingKey::from_sec1_bytes(public_key)
        .map_err(|e| EcdsaError::InvalidPublicKey(e.to_string()))?;
    Ok(verifying_key
        .as_affine()
        .to_encoded_point(false)
        .as_bytes()
        .to_vec())
}

fn left_pad_32(bytes: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let start = 32usize.saturating_sub(bytes.len());
    let take = bytes.len().min(32);
    out[start..].copy_from_slice(&bytes[bytes.len() - take..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::sha256;
    use k256::ecdsa::signature::hazmat::PrehashSigner;
    use k256::ecdsa::SigningKey;
    use rand_core::OsRng;

    fn sign(signing_key: &SigningKey, msg: &Hash) -> (Vec<u8>, Vec<u8>) {
        let sig: K256Signature = signing_key.sign_prehash(msg.as_bytes()).unwrap();
        let bytes = sig.to_bytes();
        (bytes[..32].to_vec(), bytes[32..].to_vec())
    }

    #[test]
    fn verifies_a_freshly_signed_hash() {
        let signing_key = SigningKey::random(&mut OsRng);
        let verifying_key = VerifyingKey::from(&signing_key);
        let msg = sha256(b"hello ferrochain");
        let (r, s) = sign(&signing_key, &msg);
        let pubkey = verifying_key.to_encoded_point(false);
        verify_ecdsa(&msg, &r, &s, pubkey.as_bytes()).unwrap();
    }

    #[test]
    fn rejects_tampered_hash() {
        let signing_key = SigningKey::random(&mut OsRng);
        let verifying_key = VerifyingKey::from(&signing_key);
        let msg = sha256(b"hello ferrochain");
        let other = sha256(b"goodbye ferrochain");
        let (r, s) = sign(&signing_key, &msg);
        let pubkey = verifying_key.to_encoded_point(false);
        assert!(verify_ecdsa(&other, &r, &s, pubkey.as_bytes()).is_err());
    }
}
