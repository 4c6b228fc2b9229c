use std::sync::Arc;

use ferrochain_common::block::Block;
use ferrochain_common::config::{PremineAllocation, PremineConfig};
use ferrochain_common::error::EngineError;
use ferrochain_common::time::now_millis;
use ferrochain_common::transaction::{Transaction, TxPayload};
use ferrochain_storage::Storage;
use log::{info, warn};
use rust_decimal::Decimal;

use crate::miner::{pow_search, CancellationToken};
use crate::state::LedgerState;

/// How a single premine record compares against what's actually committed
/// in the genesis block (§4.6).
#[derive(Debug, PartialEq, Eq)]
enum PremineStatus {
    PresentCorrect,
    PresentWrongAddress,
    Missing,
}

/// Runs the startup genesis/premine procedure (§4.6) against an empty,
/// freshly-constructed [`LedgerState`] that has not yet loaded anything from
/// storage. Called once, inside the same write lock used by `submit`/`mine`,
/// before the HTTP listener binds (SPEC_FULL §4.6 [AMBIENT]).
pub async fn reconcile(
    state: &mut LedgerState,
    storage: &Arc<dyn Storage>,
    premine: &PremineConfig,
    difficulty: u32,
) -> Result<(), EngineError> {
    let mut chain = storage
        .get_all_blocks()
        .await
        .map_err(|e| EngineError::StorageUnavailable(e.to_string()))?;
    chain.sort_by_key(|b| b.index);

    if chain.is_empty() {
        let genesis = build_genesis_block(premine);
        storage
            .save_block(&genesis)
            .await
            .map_err(|e| EngineError::StorageUnavailable(e.to_string()))?;
        info!("genesis block committed with {} premine allocations", premine.allocations().len());
        state.commit_system_block(genesis);
        return Ok(());
    }

    let genesis = chain[0].clone();
    let allocations = premine.allocations();
    let statuses: Vec<(PremineAllocation, PremineStatus)> = allocations
        .into_iter()
        .map(|allocation| {
            let status = classify(&genesis, &allocation);
            (allocation, status)
        })
        .collect();

    for (allocation, status) in &statuses {
        info!("premine {:?} classified as {:?}", allocation.tag, status);
    }

    let has_user_data = chain_has_user_data(&chain);

    if !has_user_data {
        let needs_rebuild = statuses.iter().any(|(_, status)| *status != PremineStatus::PresentCorrect);
        if needs_rebuild {
            warn!("no user data present, rebuilding genesis block to correct premine allocations");
            storage
                .delete_block(genesis.index)
                .await
                .map_err(|e| EngineError::StorageUnavailable(e.to_string()))?;
            let rebuilt = build_genesis_block(premine);
            storage
                .save_block(&rebuilt)
                .await
                .map_err(|e| EngineError::StorageUnavailable(e.to_string()))?;
            chain[0] = rebuilt;
        }
        for block in chain {
            state.commit_system_block(block);
        }
        return Ok(());
    }

    // User data exists: the genesis block is frozen. Missing or
    // wrong-address premines are corrected by appending a new block, never
    // by touching history (§4.6).
    for block in &chain {
        state.commit_system_block(block.clone());
    }

    let corrections: Vec<Transaction> = statuses
        .iter()
        .filter(|(_, status)| *status != PremineStatus::PresentCorrect)
        .map(|(allocation, _)| correction_transaction(allocation))
        .collect();

    if corrections.is_empty() {
        return Ok(());
    }

    info!("user data present, appending correction block for {} premine allocation(s)", corrections.len());
    let correction_block = mine_correction_block(state, corrections, difficulty);
    storage
        .save_block(&correction_block)
        .await
        .map_err(|e| EngineError::StorageUnavailable(e.to_string()))?;
    state.commit_system_block(correction_block);
    Ok(())
}

fn classify(genesis: &Block, allocation: &PremineAllocation) -> PremineStatus {
    for tx in &genesis.transactions {
        if let TxPayload::Premine { recipient } = &tx.data {
            if *recipient == allocation.tag {
                if tx.to == allocation.address && tx.amount == Decimal::from(allocation.amount) {
                    return PremineStatus::PresentCorrect;
                }
                return PremineStatus::PresentWrongAddress;
            }
        }
    }
    PremineStatus::Missing
}

/// §4.6: user data exists once the chain holds more than genesis, or any
/// transaction anywhere is non-system (signed, or system but not a premine).
fn chain_has_user_data(chain: &[Block]) -> bool {
    if chain.len() > 1 {
        return true;
    }
    chain.iter().any(|block| {
        block
            .transactions
            .iter()
            .any(|tx| tx.from.is_some() || !matches!(tx.data, TxPayload::Premine { .. }))
    })
}

/// The genesis block a fresh node would produce at block 0 for the given
/// premine configuration — exposed so the `genesis` operator tool can render
/// it out-of-band, without standing up a full engine (SPEC_FULL §1).
pub fn build_genesis_block(premine: &PremineConfig) -> Block {
    let transactions: Vec<Transaction> = premine
        .allocations()
        .into_iter()
        .map(|allocation| premine_transaction(&allocation, 0))
        .collect();
    let previous_hash = Block::genesis_previous_hash();
    let timestamp = 0;
    let nonce = 0;
    let hash = Block::compute_hash(0, &previous_hash, timestamp, &transactions, nonce);
    Block {
        index: 0,
        timestamp,
        previous_hash,
        transactions,
        nonce,
        difficulty: 0,
        hash,
    }
}

fn premine_transaction(allocation: &PremineAllocation, timestamp: u64) -> Transaction {
    Transaction {
        from: None,
        to: allocation.address,
        amount: Decimal::from(allocation.amount),
        timestamp,
        data: TxPayload::Premine { recipient: allocation.tag },
        signature: None,
        id: None,
    }
}

fn correction_transaction(allocation: &PremineAllocation) -> Transaction {
    premine_transaction(allocation, now_millis())
}

/// Appends a correction block the same way the miner would, minus a
/// coinbase: premine corrections are never counted toward `totalMined`
/// (SPEC_FULL §9).
fn mine_correction_block(state: &LedgerState, transactions: Vec<Transaction>, difficulty: u32) -> Block {
    let index = state.next_index();
    let previous_hash = state.latest_block().map(|b| b.hash).unwrap_or_else(Block::genesis_previous_hash);
    let timestamp = now_millis();
    let cancellation = CancellationToken::new();
    pow_search(index, previous_hash, timestamp, transactions, difficulty, &cancellation)
        .expect("correction block PoW search is never cancelled")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenomics::Tokenomics;
    use ferrochain_common::config::TokenomicsConfig;
    use ferrochain_common::config::PremineTag;
    use ferrochain_common::crypto::Address;
    use ferrochain_storage::backends::memory::InMemoryStore;

    fn premine_config() -> PremineConfig {
        PremineConfig {
            founder_address: "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".parse().unwrap(),
            founder_premine: 1_000_000,
            treasury_address: "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb".parse().unwrap(),
            treasury_premine: 2_000_000,
            liquidity_pool_address: "0xcccccccccccccccccccccccccccccccccccccccc".parse().unwrap(),
            liquidity_pool_premine: 1_000_000,
        }
    }

    fn fresh_state() -> LedgerState {
        LedgerState::new(Tokenomics::new(TokenomicsConfig::default()), 1)
    }

    #[tokio::test]
    async fn fresh_start_commits_all_three_premines() {
        let mut state = fresh_state();
        let storage = Arc::new(InMemoryStore::new()) as Arc<dyn Storage>;
        let premine = premine_config();
        reconcile(&mut state, &storage, &premine, 1).await.unwrap();

        assert_eq!(state.chain.len(), 1);
        assert_eq!(state.total_mined, Decimal::ZERO);
        let founder: Address = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".parse().unwrap();
        let treasury: Address = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb".parse().unwrap();
        assert_eq!(state.balance_of(&founder), Decimal::from(1_000_000));
        assert_eq!(state.balance_of(&treasury), Decimal::from(2_000_000));
    }

    #[tokio::test]
    async fn restart_with_user_data_appends_correction_without_touching_genesis() {
        let storage = Arc::new(InMemoryStore::new()) as Arc<dyn Storage>;
        let premine = premine_config();

        // First boot: fresh genesis.
        let mut state = fresh_state();
        reconcile(&mut state, &storage, &premine, 1).await.unwrap();

        // Simulate user activity: a second block gets mined on top.
        let user_block = Block {
            index: 1,
            timestamp: 1,
            previous_hash: state.latest_block().unwrap().hash,
            transactions: vec![],
            nonce: 0,
            difficulty: 1,
            hash: ferrochain_common::crypto::Hash::zero(),
        };
        storage.save_block(&user_block).await.unwrap();

        // Second boot: the on-disk genesis is missing the liquidity premine.
        let liquidity: Address = "0xcccccccccccccccccccccccccccccccccccccccc".parse().unwrap();
        let mut rebuilt_genesis = storage.get_block(0).await.unwrap().unwrap();
        rebuilt_genesis.transactions.retain(|tx| !matches!(&tx.data, TxPayload::Premine { recipient } if *recipient == PremineTag::LiquidityPool));
        storage.delete_block(0).await.unwrap();
        storage.save_block(&rebuilt_genesis).await.unwrap();

        let mut state2 = fresh_state();
        reconcile(&mut state2, &storage, &premine, 1).await.unwrap();

        // Genesis itself is untouched (still missing the premine on disk)...
        let genesis_on_disk = storage.get_block(0).await.unwrap().unwrap();
        assert!(!genesis_on_disk
            .transactions
            .iter()
            .any(|tx| matches!(&tx.data, TxPayload::Premine { recipient } if *recipient == PremineTag::LiquidityPool)));

        // ...but the in-memory balance is restored via a correction block.
        assert_eq!(state2.balance_of(&liquidity), Decimal::from(1_000_000));
        assert_eq!(state2.chain.len(), 3);
    }
}
