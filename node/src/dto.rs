use ferrochain_common::block::Block;
use ferrochain_common::crypto::Address;
use ferrochain_common::transaction::{Signature, Transaction, TxPayload};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// `POST /api/transaction` body (§6). Field names match [`Transaction`]'s
/// own wire convention, since the signed payload and the submission body
/// share the same shape up to the missing `id`.
#[derive(Deserialize)]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Address,
    pub amount: Decimal,
    #[serde(default)]
    pub timestamp: Option<u64>,
    #[serde(default)]
    pub data: TxPayload,
    pub signature: Signature,
}

#[derive(Deserialize)]
pub struct MineRequest {
    pub miner_address: Address,
}

#[derive(Deserialize)]
pub struct ChainQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub ready: bool,
    pub chain_length: u64,
    pub pending_transactions: usize,
    pub backend: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockchainResponse {
    pub chain: Vec<Block>,
    pub mempool: Vec<Transaction>,
    pub difficulty: u32,
    pub mining_reward: Decimal,
    pub last_block: Option<Block>,
}

/// A block summary for `GET /api/chain`, omitting the full transaction list
/// the spec calls out as unnecessary at that level (§6).
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSummary {
    pub index: u64,
    pub timestamp: u64,
    pub hash: String,
    pub previous_hash: String,
    pub transaction_count: usize,
    pub difficulty: u32,
    pub nonce: u64,
}

impl From<&Block> for BlockSummary {
    fn from(block: &Block) -> Self {
        BlockSummary {
            index: block.index,
            timestamp: block.timestamp,
            hash: block.hash.to_hex(),
            previous_hash: block.previous_hash.to_hex(),
            transaction_count: block.transactions.len(),
            difficulty: block.difficulty,
            nonce: block.nonce,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainPage {
    pub blocks: Vec<BlockSummary>,
    pub total: u64,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub address: String,
    pub balance: Decimal,
}

#[derive(Serialize)]
pub struct SupplyResponse {
    pub supply: Decimal,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Holder {
    pub address: String,
    pub balance: Decimal,
}

#[derive(Serialize)]
pub struct HoldersResponse {
    pub holders: Vec<Holder>,
}

#[derive(Serialize)]
pub struct TransactionSuccess {
    pub success: bool,
    pub transaction: Transaction,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MineSuccess {
    pub success: bool,
    pub block: Block,
}
