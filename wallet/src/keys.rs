//! Local keypair generation and signing (§6 "Wallet (external)" collaborator
//! contract, SPEC_FULL §1). The node never sees this module's private key —
//! only the public key and the signature components it produces.

use anyhow::{bail, Context, Result};
use ferrochain_common::crypto::Address;
use ferrochain_common::transaction::{Signature, Transaction, TxPayload};
use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{Signature as K256Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand_core::OsRng;
use rust_decimal::Decimal;

pub struct Keypair {
    signing_key: SigningKey,
    pub address: Address,
}

impl Keypair {
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        Self::from_signing_key(signing_key)
    }

    pub fn from_private_key_hex(hex_str: &str) -> Result<Self> {
        let stripped = hex_str.strip_prefix("0x").unwrap_or(hex_str);
        let bytes = hex::decode(stripped).context("private key is not valid hex")?;
        let signing_key = SigningKey::from_slice(&bytes).context("invalid secp256k1 private key")?;
        Ok(Self::from_signing_key(signing_key))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let verifying_key = VerifyingKey::from(&signing_key);
        let uncompressed = verifying_key.to_encoded_point(false);
        let address = Address::derive_standard_evm(uncompressed.as_bytes());
        Keypair { signing_key, address }
    }

    pub fn private_key_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    /// Uncompressed SEC1 public key, the form the three address-derivation
    /// schemes of §4.2 expect.
    pub fn public_key_bytes(&self) -> Vec<u8> {
        let verifying_key = VerifyingKey::from(&self.signing_key);
        verifying_key.to_encoded_point(false).as_bytes().to_vec()
    }

    /// Builds and signs the canonical payload of §3, returning the
    /// signature the node's pipeline expects in `POST /api/transaction`.
    /// `timestamp` must be carried alongside the signature unchanged — the
    /// node re-stamping it would invalidate this signature (§4.4).
    pub fn sign_transfer(
        &self,
        to: Address,
        amount: Decimal,
        timestamp: u64,
        data: TxPayload,
    ) -> Result<Signature> {
        if amount <= Decimal::ZERO {
            bail!("amount must be positive");
        }
        let hash = Transaction::hash_for_signing(Some(self.address), to, amount, timestamp, &data);
        let signature: K256Signature = self
            .signing_key
            .sign_prehash(hash.as_bytes())
            .context("failed to sign transaction hash")?;
        let bytes = signature.to_bytes();
        Ok(Signature {
            r: bytes[..32].to_vec(),
            s: bytes[32..].to_vec(),
            public_key: self.public_key_bytes(),
            recovery_param: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_round_trips_through_hex() {
        let keypair = Keypair::generate();
        let hex_key = keypair.private_key_hex();
        let reloaded = Keypair::from_private_key_hex(&hex_key).unwrap();
        assert_eq!(keypair.address, reloaded.address);
    }

    #[test]
    fn sign_transfer_rejects_zero_amount() {
        let keypair = Keypair::generate();
        let to: Address = "0xdddddddddddddddddddddddddddddddddddddddd".parse().unwrap();
        let err = keypair.sign_transfer(to, Decimal::ZERO, 1, TxPayload::Transfer);
        assert!(err.is_err());
    }
}
