use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ferrochain_common::block::Block;
use ferrochain_common::config::POW_BATCH_SIZE;
use ferrochain_common::crypto::Address;
use ferrochain_common::error::EngineError;
use ferrochain_common::time::now_millis;
use ferrochain_common::transaction::{Transaction, TxPayload};
use ferrochain_storage::Storage;
use log::{info, warn};

use crate::state::LedgerState;

/// Cooperative cancellation handle for [`mine`]'s PoW loop (§5). A plain
/// atomic flag, since nothing else in this workspace needs the richer
/// `tokio-util` cancellation token.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The nine-step mining algorithm (§4.5). Revalidates the mempool against
/// confirmed balances before assembling the block, then runs a cancellable
/// batched proof-of-work search.
pub async fn mine(
    state: &mut LedgerState,
    storage: &Arc<dyn Storage>,
    miner: Address,
    cancellation: &CancellationToken,
) -> Result<Block, EngineError> {
    // 1. Idempotence: a concurrent caller already committed this index.
    let next_index = state.next_index();
    if state.mined_indices.contains(&next_index) {
        return state
            .chain
            .get(next_index as usize)
            .cloned()
            .ok_or(EngineError::UnknownBlock(next_index));
    }

    // 2. A miner may not claim the same index twice.
    if state
        .miner_history
        .get(&miner)
        .is_some_and(|indices| indices.contains(&next_index))
    {
        return Err(EngineError::AlreadyMined { miner, index: next_index });
    }

    // 3. Nothing to mine.
    if state.mempool.is_empty() {
        return Err(EngineError::NoPendingTransactions);
    }

    // 4. Revalidate mempool transactions against confirmed-chain balance, in
    // insertion order, before committing to them in this block.
    revalidate_mempool(state)?;

    // 5. Reward, clamped to the remaining supply.
    let height = next_index;
    let halving_era = state.tokenomics.halving_era(height);
    let reward = state.tokenomics.clamped_reward(height, state.total_mined);
    if reward.is_zero() {
        return Err(EngineError::MaxSupplyReached);
    }

    // 6. Coinbase, always constructed last so it sorts last in the block.
    let reward_tx = Transaction {
        from: None,
        to: miner,
        amount: reward,
        timestamp: now_millis(),
        data: TxPayload::MiningReward { height, era: halving_era },
        signature: None,
        id: None,
    };

    // 7. Assemble: mempool order preserved, coinbase last.
    let mut transactions = state.mempool.clone();
    transactions.push(reward_tx);

    // 8. Proof of work.
    let previous_hash = state.latest_block().map(|b| b.hash).unwrap_or_else(Block::genesis_previous_hash);
    let difficulty = state.difficulty;
    let timestamp = now_millis();
    let block = match pow_search(next_index, previous_hash, timestamp, transactions, difficulty, cancellation) {
        Some(block) => block,
        None => return Err(EngineError::Cancelled),
    };

    // 9. Atomic commit: storage first, then in-memory state, mirroring the
    // source algorithm's "same commit transaction" requirement as closely as
    // a trait-object backend allows — a storage failure here leaves the
    // in-memory mempool untouched so the caller can retry.
    if let Err(e) = storage.save_block(&block).await {
        warn!("failed to persist mined block {next_index}: {e}");
        return Err(EngineError::StorageUnavailable(e.to_string()));
    }
    if let Some(coinbase) = block.transactions.last() {
        if let Err(e) = storage.save_miner_block_history(&miner, next_index, &block.hash).await {
            warn!("failed to persist miner history for block {next_index}: {e}");
            return Err(EngineError::StorageUnavailable(e.to_string()));
        }
        debug_assert!(matches!(coinbase.data, TxPayload::MiningReward { .. }));
    }
    if let Err(e) = storage.clear_pending_transactions().await {
        warn!("failed to clear pending transactions after mining block {next_index}: {e}");
        return Err(EngineError::StorageUnavailable(e.to_string()));
    }

    state.commit_block(block.clone(), reward);
    info!("mined block {next_index} (difficulty {difficulty}, reward {reward}, miner {miner})");
    Ok(block)
}

fn revalidate_mempool(state: &LedgerState) -> Result<(), EngineError> {
    let mut running = std::collections::HashMap::<Address, rust_decimal::Decimal>::new();
    for tx in &state.mempool {
        let Some(from) = tx.from else { continue };
        let confirmed = state.confirmed_balance_of(&from);
        let spent_so_far = running.entry(from).or_insert(rust_decimal::Decimal::ZERO);
        let required = *spent_so_far + tx.amount;
        if confirmed < required {
            return Err(EngineError::InvalidMempoolTransaction {
                from,
                current: confirmed,
                required,
            });
        }
        *spent_so_far = required;
    }
    Ok(())
}

/// Iterates `nonce` in batches no larger than [`POW_BATCH_SIZE`], checking
/// `cancellation` between batches (§5). Returns `None` if cancelled.
///
/// Exposed beyond this module so the genesis reconciler's correction blocks
/// (§4.6) can satisfy the same §4.8 difficulty invariant as mined blocks.
pub(crate) fn pow_search(
    index: u64,
    previous_hash: ferrochain_common::crypto::Hash,
    timestamp: u64,
    transactions: Vec<Transaction>,
    difficulty: u32,
    cancellation: &CancellationToken,
) -> Option<Block> {
    let mut nonce: u64 = 0;
    loop {
        if cancellation.is_cancelled() {
            return None;
        }
        for _ in 0..POW_BATCH_SIZE {
            let hash = Block::compute_hash(index, &previous_hash, timestamp, &transactions, nonce);
            if Block::satisfies_difficulty(&hash, difficulty) {
                return Some(Block {
                    index,
                    timestamp,
                    previous_hash,
                    transactions,
                    nonce,
                    difficulty,
                    hash,
                });
            }
            nonce += 1;
        }
        if cancellation.is_cancelled() {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenomics::Tokenomics;
    use ferrochain_common::config::TokenomicsConfig;
    use ferrochain_storage::backends::memory::InMemoryStore;
    use rust_decimal::Decimal;

    fn state_with_mempool_tx(to: Address, amount: Decimal) -> LedgerState {
        let tokenomics = Tokenomics::new(TokenomicsConfig::default());
        let mut state = LedgerState::new(tokenomics, 1);
        let genesis_tx = Transaction {
            from: None,
            to: "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".parse().unwrap(),
            amount: Decimal::from(1_000),
            timestamp: 0,
            data: TxPayload::Premine { recipient: ferrochain_common::config::PremineTag::Founder },
            signature: None,
            id: None,
        };
        let genesis = Block {
            index: 0,
            timestamp: 0,
            previous_hash: Block::genesis_previous_hash(),
            transactions: vec![genesis_tx],
            nonce: 0,
            difficulty: 0,
            hash: ferrochain_common::crypto::Hash::zero(),
        };
        state.commit_system_block(genesis);
        state.admit_to_mempool(Transaction {
            from: Some("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".parse().unwrap()),
            to,
            amount,
            timestamp: 1,
            data: TxPayload::Transfer,
            signature: None,
            id: None,
        });
        state
    }

    #[tokio::test]
    async fn mines_a_block_from_a_non_empty_mempool() {
        let miner: Address = "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee".parse().unwrap();
        let mut state = state_with_mempool_tx("0xdddddddddddddddddddddddddddddddddddddddd".parse().unwrap(), Decimal::from(10));
        let storage = Arc::new(InMemoryStore::new()) as Arc<dyn Storage>;
        let cancellation = CancellationToken::new();
        let block = mine(&mut state, &storage, miner, &cancellation).await.unwrap();
        assert_eq!(block.index, 1);
        assert_eq!(block.transactions.len(), 2);
        assert!(Block::satisfies_difficulty(&block.hash, 1));
        assert_eq!(state.total_mined, Decimal::from(100));
        assert!(state.mempool.is_empty());
    }

    #[tokio::test]
    async fn fails_on_empty_mempool() {
        let miner: Address = "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee".parse().unwrap();
        let tokenomics = Tokenomics::new(TokenomicsConfig::default());
        let mut state = LedgerState::new(tokenomics, 1);
        let genesis = Block {
            index: 0,
            timestamp: 0,
            previous_hash: Block::genesis_previous_hash(),
            transactions: vec![],
            nonce: 0,
            difficulty: 0,
            hash: ferrochain_common::crypto::Hash::zero(),
        };
        state.commit_system_block(genesis);
        let storage = Arc::new(InMemoryStore::new()) as Arc<dyn Storage>;
        let cancellation = CancellationToken::new();
        let err = mine(&mut state, &storage, miner, &cancellation).await.unwrap_err();
        assert!(matches!(err, EngineError::NoPendingTransactions));
    }

    #[tokio::test]
    async fn rejects_a_miner_reclaiming_the_same_index() {
        let miner: Address = "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee".parse().unwrap();
        let mut state = state_with_mempool_tx("0xdddddddddddddddddddddddddddddddddddddddd".parse().unwrap(), Decimal::from(10));
        state.miner_history.entry(miner).or_default().insert(1);
        let storage = Arc::new(InMemoryStore::new()) as Arc<dyn Storage>;
        let cancellation = CancellationToken::new();
        let err = mine(&mut state, &storage, miner, &cancellation).await.unwrap_err();
        assert!(matches!(err, EngineError::AlreadyMined { .. }));
    }

    #[tokio::test]
    async fn halving_boundary_emits_half_reward() {
        let miner: Address = "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee".parse().unwrap();
        let tokenomics = Tokenomics::new(TokenomicsConfig { initial_reward: 100, halving_interval: 2, max_supply: 21_000_000 });
        let mut state = LedgerState::new(tokenomics, 1);
        let genesis_tx = Transaction {
            from: None,
            to: "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".parse().unwrap(),
            amount: Decimal::from(1_000),
            timestamp: 0,
            data: TxPayload::Premine { recipient: ferrochain_common::config::PremineTag::Founder },
            signature: None,
            id: None,
        };
        let genesis = Block {
            index: 0,
            timestamp: 0,
            previous_hash: Block::genesis_previous_hash(),
            transactions: vec![genesis_tx],
            nonce: 0,
            difficulty: 0,
            hash: ferrochain_common::crypto::Hash::zero(),
        };
        state.commit_system_block(genesis);
        let storage = Arc::new(InMemoryStore::new()) as Arc<dyn Storage>;
        let cancellation = CancellationToken::new();

        // Block 1 (no halving yet).
        state.admit_to_mempool(Transaction {
            from: Some("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".parse().unwrap()),
            to: "0xdddddddddddddddddddddddddddddddddddddddd".parse().unwrap(),
            amount: Decimal::from(1),
            timestamp: 1,
            data: TxPayload::Transfer,
            signature: None,
            id: None,
        });
        let block1 = mine(&mut state, &storage, miner, &cancellation).await.unwrap();
        assert_eq!(block1.index, 1);

        // Block 2 sits at the halving boundary: reward should drop to 50.
        state.admit_to_mempool(Transaction {
            from: Some("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".parse().unwrap()),
            to: "0xdddddddddddddddddddddddddddddddddddddddd".parse().unwrap(),
            amount: Decimal::from(1),
            timestamp: 2,
            data: TxPayload::Transfer,
            signature: None,
            id: None,
        });
        let miner2: Address = "0xffffffffffffffffffffffffffffffffffffffff".parse().unwrap();
        let block2 = mine(&mut state, &storage, miner2, &cancellation).await.unwrap();
        let coinbase = block2.transactions.last().unwrap();
        assert_eq!(coinbase.amount, Decimal::from(50));
    }
}
