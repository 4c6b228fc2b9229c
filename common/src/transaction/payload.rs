use serde::de::Error as DeError;
use serde::ser::Error as SerError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::config::PremineTag;
use crate::crypto::Address;

/// A closed, tagged alternative to an open string-keyed `data` map.
/// `Transfer` serializes to the same empty object a plain transfer's `data`
/// defaults to; every other variant round-trips through a `type` key.
#[derive(Debug, Clone, PartialEq)]
pub enum TxPayload {
    Transfer,
    MiningReward { height: u64, era: u32 },
    Premine { recipient: PremineTag },
    BridgeIn { chain: String, token_symbol: String },
    /// Stored verbatim, never executed — there is no VM here. `args` is an
    /// opaque blob the heuristic contract scanner inspects.
    ContractExecution {
        contract: Address,
        method: String,
        args: Value,
    },
}

impl Default for TxPayload {
    fn default() -> Self {
        TxPayload::Transfer
    }
}

impl Serialize for TxPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = Map::new();
        match self {
            TxPayload::Transfer => {}
            TxPayload::MiningReward { height, era } => {
                map.insert("type".into(), Value::String("mining_reward".into()));
                map.insert("height".into(), Value::from(*height));
                map.insert("era".into(), Value::from(*era));
            }
            TxPayload::Premine { recipient } => {
                map.insert("type".into(), Value::String("premine".into()));
                map.insert("recipient".into(), Value::String(recipient.as_str().into()));
            }
            TxPayload::BridgeIn { chain, token_symbol } => {
                map.insert("type".into(), Value::String("bridge_in".into()));
                map.insert("chain".into(), Value::String(chain.clone()));
                map.insert("tokenSymbol".into(), Value::String(token_symbol.clone()));
            }
            TxPayload::ContractExecution { contract, method, args } => {
                map.insert("type".into(), Value::String("contract_execution".into()));
                map.insert("contract".into(), Value::String(contract.to_hex()));
                map.insert("method".into(), Value::String(method.clone()));
                map.insert("args".into(), args.clone());
            }
        }
        Value::Object(map).serialize(serializer).map_err(S::Error::custom)
    }
}

impl<'de> Deserialize<'de> for TxPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let map = match value {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => return Err(D::Error::custom(format!("data must be an object, got {other}"))),
        };
        let tag = map.get("type").and_then(Value::as_str);
        match tag {
            None => Ok(TxPayload::Transfer),
            Some("mining_reward") => {
                let height = map.get("height").and_then(Value::as_u64).unwrap_or(0);
                let era = map
                    .get("era")
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as u32;
                Ok(TxPayload::MiningReward { height, era })
            }
            Some("premine") => {
                let recipient = match map.get("recipient").and_then(Value::as_str) {
                    Some("founder") => PremineTag::Founder,
                    Some("treasury") => PremineTag::Treasury,
                    Some("liquidity_pool") => PremineTag::LiquidityPool,
                    other => return Err(D::Error::custom(format!("unknown premine recipient {other:?}"))),
                };
                Ok(TxPayload::Premine { recipient })
            }
            Some("bridge_in") => {
                let chain = map
                    .get("chain")
                    .and_then(Value::as_str)
                    .ok_or_else(|| D::Error::custom("bridge_in requires chain"))?
                    .to_string();
                let token_symbol = map
                    .get("tokenSymbol")
                    .and_then(Value::as_str)
                    .ok_or_else(|| D::Error::custom("bridge_in requires tokenSymbol"))?
                    .to_string();
                Ok(TxPayload::BridgeIn { chain, token_symbol })
            }
            Some("contract_execution") => {
                let contract = map
                    .get("contract")
                    .and_then(Value::as_str)
                    .ok_or_else(|| D::Error::custom("contract_execution requires contract"))?
                    .parse::<Address>()
                    .map_err(D::Error::custom)?;
                let method = map
                    .get("method")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let args = map.get("args").cloned().unwrap_or(Value::Null);
                Ok(TxPayload::ContractExecution { contract, method, args })
            }
            Some(other) => Err(D::Error::custom(format!(
                "unrecognized data.type `{other}`"
            ))),
        }
    }
}

impl TxPayload {
    pub fn type_tag(&self) -> Option<&'static str> {
        match self {
            TxPayload::Transfer => None,
            TxPayload::MiningReward { .. } => Some("mining_reward"),
            TxPayload::Premine { .. } => Some("premine"),
            TxPayload::BridgeIn { .. } => Some("bridge_in"),
            TxPayload::ContractExecution { .. } => Some("contract_execution"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_round_trips_as_empty_object() {
        let value = serde_json::to_value(TxPayload::Transfer).unwrap();
        assert_eq!(value, serde_json::json!({}));
        let back: TxPayload = serde_json::from_value(value).unwrap();
        assert_eq!(back, TxPayload::Transfer);
    }

    #[test]
    fn premine_round_trips() {
        let payload = TxPayload::Premine { recipient: PremineTag::Treasury };
        let value = serde_json::to_value(payload.clone()).unwrap();
        let back: TxPayload = serde_json::from_value(value).unwrap();
        assert_eq!(back, payload);
    }
}
