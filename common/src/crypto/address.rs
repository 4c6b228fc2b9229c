use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sha3::Keccak256;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const ADDRESS_SIZE: usize = 20;

#[derive(Debug, Error)]
pub enum AddressError {
    #[error("address must be 0x-prefixed hex: {0}")]
    MissingPrefix(String),
    #[error("invalid hex in address: {0}")]
    InvalidHex(String),
    #[error("address must decode to {ADDRESS_SIZE} bytes, got {0}")]
    WrongLength(usize),
}

/// A 20-byte account identifier, rendered as lowercase `0x`-prefixed hex.
///
/// Comparisons and hashing are case-insensitive by construction: the bytes
/// are the canonical form, the hex string is only ever a rendering of them.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; ADDRESS_SIZE]);

impl Address {
    pub const fn new(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Address(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    /// Scheme 1: uncompressed public key -> Keccak-256 -> last 20 bytes.
    pub fn derive_standard_evm(uncompressed_pubkey: &[u8]) -> Self {
        // Ethereum hashes the 64-byte point (x || y), dropping the 0x04 tag
        // if present, matching wallets that submit the tagged SEC1 form.
        let body = if uncompressed_pubkey.len() == 65 && uncompressed_pubkey[0] == 0x04 {
            &uncompressed_pubkey[1..]
        } else {
            uncompressed_pubkey
        };
        let digest = Keccak256::digest(body);
        let mut bytes = [0u8; ADDRESS_SIZE];
        bytes.copy_from_slice(&digest[12..32]);
        Address(bytes)
    }

    /// Scheme 2: SHA-256 of the ASCII hex string of the public key, first 20 bytes.
    pub fn derive_legacy_hex_sha256(pubkey_bytes: &[u8]) -> Self {
        let hex_string = hex::encode(pubkey_bytes);
        let digest = Sha256::digest(hex_string.as_bytes());
        let mut bytes = [0u8; ADDRESS_SIZE];
        bytes.copy_from_slice(&digest[..ADDRESS_SIZE]);
        Address(bytes)
    }

    /// Scheme 3: SHA-256 of the UTF-8 byte encoding of the public key string,
    /// first 20 bytes. The "public key string" is the same lowercase hex
    /// rendering used by scheme 2, but encoded as UTF-8 text rather than
    /// hashed as the raw key bytes' hex digits — kept distinct because the
    /// source wallets disagreed on which string they signed over.
    pub fn derive_wallet_utf8_sha256(pubkey_hex_string: &str) -> Self {
        let digest = Sha256::digest(pubkey_hex_string.as_bytes());
        let mut bytes = [0u8; ADDRESS_SIZE];
        bytes.copy_from_slice(&digest[..ADDRESS_SIZE]);
        Address(bytes)
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| AddressError::MissingPrefix(s.to_string()))?;
        let bytes = hex::decode(stripped).map_err(|_| AddressError::InvalidHex(s.to_string()))?;
        if bytes.len() != ADDRESS_SIZE {
            return Err(AddressError::WrongLength(bytes.len()));
        }
        let mut arr = [0u8; ADDRESS_SIZE];
        arr.copy_from_slice(&bytes);
        Ok(Address(arr))
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.to_hex()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_renders_lowercase() {
        let addr: Address = "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".parse().unwrap();
        assert_eq!(addr.to_hex(), "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    }

    #[test]
    fn rejects_missing_prefix() {
        assert!("aaaa".parse::<Address>().is_err());
    }

    #[test]
    fn rejects_wrong_length() {
        assert!("0xaaaa".parse::<Address>().is_err());
    }

    #[test]
    fn derivation_schemes_are_independent() {
        let pubkey = vec![0x04; 65];
        let a1 = Address::derive_standard_evm(&pubkey);
        let a2 = Address::derive_legacy_hex_sha256(&pubkey);
        assert_ne!(a1, a2);
    }
}
