//! The Storage Backend contract (§4.1) and its three implementations.
//!
//! `core` depends only on the [`Storage`] trait object; it never branches on
//! which backend is in use (REDESIGN FLAGS, §9). [`select_backend`] is the
//! only place backend identity is decided, at process startup.

pub mod backends;
pub mod error;
mod selection;

pub use error::StorageError;
pub use selection::{select_backend, StorageSelectionConfig};

use async_trait::async_trait;
use ferrochain_common::crypto::{Address, Hash};
use ferrochain_common::{Block, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Remote,
    Sql,
    Memory,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Remote => "remote_document_store",
            BackendKind::Sql => "embedded_sql_store",
            BackendKind::Memory => "in_memory_store",
        }
    }
}

/// Durable storage for blocks, transactions, wallets, contracts and miner
/// history. Every operation is fail-fast: errors bubble to the caller rather
/// than being retried silently inside the trait impl (§4.1).
#[async_trait]
pub trait Storage: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn save_block(&self, block: &Block) -> Result<(), StorageError>;
    async fn delete_block(&self, index: u64) -> Result<(), StorageError>;
    async fn get_block(&self, index: u64) -> Result<Option<Block>, StorageError>;
    async fn get_all_blocks(&self) -> Result<Vec<Block>, StorageError>;
    async fn get_latest_block(&self) -> Result<Option<Block>, StorageError>;

    /// `block_index = None` records a pending (mempool) transaction.
    /// Returns the transaction with `id` populated.
    async fn save_transaction(
        &self,
        tx: &Transaction,
        block_index: Option<u64>,
    ) -> Result<Transaction, StorageError>;
    async fn get_pending_transactions(&self) -> Result<Vec<Transaction>, StorageError>;
    async fn clear_pending_transactions(&self) -> Result<(), StorageError>;
    async fn get_transactions_by_block(&self, index: u64) -> Result<Vec<Transaction>, StorageError>;
    async fn get_transaction_history(&self, address: &Address) -> Result<Vec<Transaction>, StorageError>;

    async fn save_wallet(&self, address: &Address, public_key: &[u8]) -> Result<(), StorageError>;
    async fn get_wallet(&self, address: &Address) -> Result<Option<Vec<u8>>, StorageError>;

    async fn save_smart_contract(&self, address: &Address, blob: &[u8]) -> Result<(), StorageError>;
    async fn get_smart_contract(&self, address: &Address) -> Result<Option<Vec<u8>>, StorageError>;
    async fn get_all_smart_contracts(&self) -> Result<Vec<(Address, Vec<u8>)>, StorageError>;

    async fn save_miner_block_history(
        &self,
        miner: &Address,
        block_index: u64,
        block_hash: &Hash,
    ) -> Result<(), StorageError>;
    async fn get_miner_block_history(&self) -> Result<Vec<(Address, u64, Hash)>, StorageError>;

    async fn backup(&self) -> Result<(), StorageError>;
    async fn close(&self) -> Result<(), StorageError>;
}
