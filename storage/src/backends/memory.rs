use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use ferrochain_common::crypto::{Address, Hash};
use ferrochain_common::{Block, Transaction};
use log::warn;

use crate::{BackendKind, Storage, StorageError};

/// Plain in-memory maps, no durability. Warns loudly at construction so an
/// operator who fell through the selection policy (§4.1) notices.
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    blocks: Vec<Block>,
    pending: Vec<Transaction>,
    next_tx_id: i64,
    wallets: HashMap<Address, Vec<u8>>,
    contracts: HashMap<Address, Vec<u8>>,
    miner_history: Vec<(Address, u64, Hash)>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        warn!(
            "InMemoryStore active (pid {}): no data will survive a restart",
            std::process::id()
        );
        InMemoryStore {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for InMemoryStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    async fn save_block(&self, block: &Block) -> Result<(), StorageError> {
        let mut inner = self.inner.write().unwrap();
        let mut stored = block.clone();
        for tx in &mut stored.transactions {
            if tx.id.is_none() {
                inner.next_tx_id += 1;
                tx.id = Some(inner.next_tx_id);
            }
        }
        if let Some(slot) = inner.blocks.iter_mut().find(|b| b.index == block.index) {
            *slot = stored;
        } else {
            inner.blocks.push(stored);
            inner.blocks.sort_by_key(|b| b.index);
        }
        Ok(())
    }

    async fn delete_block(&self, index: u64) -> Result<(), StorageError> {
        let mut inner = self.inner.write().unwrap();
        inner.blocks.retain(|b| b.index != index);
        Ok(())
    }

    async fn get_block(&self, index: u64) -> Result<Option<Block>, StorageError> {
        let inner = self.inner.read().unwrap();
        Ok(inner.blocks.iter().find(|b| b.index == index).cloned())
    }

    async fn get_all_blocks(&self) -> Result<Vec<Block>, StorageError> {
        let inner = self.inner.read().unwrap();
        let mut blocks = inner.blocks.clone();
        blocks.sort_by_key(|b| b.index);
        Ok(blocks)
    }

    async fn get_latest_block(&self) -> Result<Option<Block>, StorageError> {
        let inner = self.inner.read().unwrap();
        Ok(inner.blocks.iter().max_by_key(|b| b.index).cloned())
    }

    async fn save_transaction(
        &self,
        tx: &Transaction,
        block_index: Option<u64>,
    ) -> Result<Transaction, StorageError> {
        let mut inner = self.inner.write().unwrap();
        let mut stored = tx.clone();
        if stored.id.is_none() {
            inner.next_tx_id += 1;
            stored.id = Some(inner.next_tx_id);
        }
        if block_index.is_none() {
            inner.pending.push(stored.clone());
        }
        Ok(stored)
    }

    async fn get_pending_transactions(&self) -> Result<Vec<Transaction>, StorageError> {
        let inner = self.inner.read().unwrap();
        Ok(inner.pending.clone())
    }

    async fn clear_pending_transactions(&self) -> Result<(), StorageError> {
        let mut inner = self.inner.write().unwrap();
        inner.pending.clear();
        Ok(())
    }

    async fn get_transactions_by_block(&self, index: u64) -> Result<Vec<Transaction>, StorageError> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .blocks
            .iter()
            .find(|b| b.index == index)
            .map(|b| b.transactions.clone())
            .unwrap_or_default())
    }

    async fn get_transaction_history(&self, address: &Address) -> Result<Vec<Transaction>, StorageError> {
        let inner = self.inner.read().unwrap();
        let mut history = Vec::new();
        for block in &inner.blocks {
            for tx in &block.transactions {
                if tx.from.as_ref() == Some(address) || &tx.to == address {
                    history.push(tx.clone());
                }
            }
        }
        Ok(history)
    }

    async fn save_wallet(&self, address: &Address, public_key: &[u8]) -> Result<(), StorageError> {
        let mut inner = self.inner.write().unwrap();
        inner.wallets.insert(*address, public_key.to_vec());
        Ok(())
    }

    async fn get_wallet(&self, address: &Address) -> Result<Option<Vec<u8>>, StorageError> {
        let inner = self.inner.read().unwrap();
        Ok(inner.wallets.get(address).cloned())
    }

    async fn save_smart_contract(&self, address: &Address, blob: &[u8]) -> Result<(), StorageError> {
        let mut inner = self.inner.write().unwrap();
        inner.contracts.insert(*address, blob.to_vec());
        Ok(())
    }

    async fn get_smart_contract(&self, address: &Address) -> Result<Option<Vec<u8>>, StorageError> {
        let inner = self.inner.read().unwrap();
        Ok(inner.contracts.get(address).cloned())
    }

    async fn get_all_smart_contracts(&self) -> Result<Vec<(Address, Vec<u8>)>, StorageError> {
        let inner = self.inner.read().unwrap();
        Ok(inner.contracts.iter().map(|(a, b)| (*a, b.clone())).collect())
    }

    async fn save_miner_block_history(
        &self,
        miner: &Address,
        block_index: u64,
        block_hash: &Hash,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.write().unwrap();
        inner.miner_history.push((*miner, block_index, *block_hash));
        Ok(())
    }

    async fn get_miner_block_history(&self) -> Result<Vec<(Address, u64, Hash)>, StorageError> {
        let inner = self.inner.read().unwrap();
        Ok(inner.miner_history.clone())
    }

    async fn backup(&self) -> Result<(), StorageError> {
        warn!("InMemoryStore.backup() is a no-op: there is nothing durable to back up");
        Ok(())
    }

    async fn close(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrochain_common::transaction::TxPayload;
    use rust_decimal::Decimal;

    fn addr(n: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = n;
        Address::new(bytes)
    }

    #[tokio::test]
    async fn save_and_fetch_block_round_trips() {
        let store = InMemoryStore::new();
        let block = Block {
            index: 0,
            timestamp: 1,
            previous_hash: Hash::zero(),
            transactions: vec![],
            nonce: 0,
            difficulty: 2,
            hash: Hash::zero(),
        };
        store.save_block(&block).await.unwrap();
        let fetched = store.get_block(0).await.unwrap().unwrap();
        assert_eq!(fetched.index, 0);
        assert_eq!(store.get_latest_block().await.unwrap().unwrap().index, 0);
    }

    #[tokio::test]
    async fn pending_transactions_clear() {
        let store = InMemoryStore::new();
        let tx = Transaction {
            from: None,
            to: addr(1),
            amount: Decimal::from(10),
            timestamp: 1,
            data: TxPayload::Transfer,
            signature: None,
            id: None,
        };
        store.save_transaction(&tx, None).await.unwrap();
        assert_eq!(store.get_pending_transactions().await.unwrap().len(), 1);
        store.clear_pending_transactions().await.unwrap();
        assert_eq!(store.get_pending_transactions().await.unwrap().len(), 0);
    }
}
