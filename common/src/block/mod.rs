use serde::{Deserialize, Serialize};

use crate::crypto::{sha256, Hash};
use crate::serializer::canonical_bytes;
use crate::transaction::Transaction;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub index: u64,
    pub timestamp: u64,
    pub previous_hash: Hash,
    /// Ordered; the coinbase transaction, if any, is always last (§4.5 step 7).
    pub transactions: Vec<Transaction>,
    pub nonce: u64,
    pub difficulty: u32,
    pub hash: Hash,
}

impl Block {
    /// `"0"` rendered as a hash, used as `previousHash` for genesis (§3).
    pub fn genesis_previous_hash() -> Hash {
        Hash::zero()
    }

    /// SHA-256 of `index || previousHash || timestamp || JSON(transactions) || nonce`.
    ///
    /// Computed over the block's *current* `nonce` field — callers mining a
    /// block set `nonce` before each call rather than passing it separately.
    pub fn compute_hash(
        index: u64,
        previous_hash: &Hash,
        timestamp: u64,
        transactions: &[Transaction],
        nonce: u64,
    ) -> Hash {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(index.to_string().as_bytes());
        bytes.extend_from_slice(previous_hash.to_hex().as_bytes());
        bytes.extend_from_slice(timestamp.to_string().as_bytes());
        let tx_value = serde_json::to_value(transactions).expect("transactions always serialize");
        bytes.extend_from_slice(&canonical_bytes(&tx_value));
        bytes.extend_from_slice(nonce.to_string().as_bytes());
        sha256(&bytes)
    }

    pub fn rehash(&self) -> Hash {
        Self::compute_hash(
            self.index,
            &self.previous_hash,
            self.timestamp,
            &self.transactions,
            self.nonce,
        )
    }

    /// True if `hash` begins with `difficulty` leading hex-zero characters.
    pub fn satisfies_difficulty(hash: &Hash, difficulty: u32) -> bool {
        hash.leading_hex_zeros() >= difficulty as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rehash_matches_compute_hash() {
        let block = Block {
            index: 0,
            timestamp: 1000,
            previous_hash: Hash::zero(),
            transactions: vec![],
            nonce: 0,
            difficulty: 2,
            hash: Hash::zero(),
        };
        let expected = Block::compute_hash(0, &Hash::zero(), 1000, &[], 0);
        assert_eq!(block.rehash(), expected);
    }

    #[test]
    fn changing_nonce_changes_hash() {
        let h1 = Block::compute_hash(0, &Hash::zero(), 1000, &[], 0);
        let h2 = Block::compute_hash(0, &Hash::zero(), 1000, &[], 1);
        assert_ne!(h1, h2);
    }
}
