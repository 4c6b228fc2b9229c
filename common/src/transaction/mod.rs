mod payload;

pub use payload::TxPayload;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::crypto::{sha256, Address, Hash};
use crate::serializer::canonical_bytes;

/// ECDSA signature components, carried alongside the raw public key so the
/// verifier never has to guess which of the three address schemes the
/// sender used.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    #[serde(with = "hex_bytes")]
    pub r: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub s: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub public_key: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_param: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// `None` for coinbase, premine and other system-issued transactions.
    pub from: Option<Address>,
    pub to: Address,
    pub amount: Decimal,
    /// Milliseconds since epoch, supplied by the signer and reused verbatim
    /// — re-stamping it would invalidate the signature.
    pub timestamp: u64,
    #[serde(default)]
    pub data: TxPayload,
    /// `None` only when `from` is `None`.
    pub signature: Option<Signature>,
    /// Assigned by storage once persisted; never part of the signed payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

impl Transaction {
    pub fn is_system(&self) -> bool {
        self.from.is_none()
    }

    /// SHA-256 over the canonical JSON payload `{amount, data, from,
    /// timestamp, to}`. This is exactly what the wallet signs.
    pub fn hash_for_signing(
        from: Option<Address>,
        to: Address,
        amount: Decimal,
        timestamp: u64,
        data: &TxPayload,
    ) -> Hash {
        let value = json!({
            "amount": amount.to_string(),
            "data": data,
            "from": from.map(|a| a.to_hex()),
            "timestamp": timestamp,
            "to": to.to_hex(),
        });
        sha256(&canonical_bytes(&value))
    }

    pub fn signing_hash(&self) -> Hash {
        Self::hash_for_signing(self.from, self.to, self.amount, self.timestamp, &self.data)
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn signing_hash_is_deterministic() {
        let to: Address = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".parse().unwrap();
        let h1 = Transaction::hash_for_signing(None, to, Decimal::from_str("1.5").unwrap(), 1000, &TxPayload::Transfer);
        let h2 = Transaction::hash_for_signing(None, to, Decimal::from_str("1.5").unwrap(), 1000, &TxPayload::Transfer);
        assert_eq!(h1, h2);
    }

    #[test]
    fn signing_hash_changes_with_timestamp() {
        let to: Address = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".parse().unwrap();
        let h1 = Transaction::hash_for_signing(None, to, Decimal::from_str("1.5").unwrap(), 1000, &TxPayload::Transfer);
        let h2 = Transaction::hash_for_signing(None, to, Decimal::from_str("1.5").unwrap(), 1001, &TxPayload::Transfer);
        assert_ne!(h1, h2);
    }
}
