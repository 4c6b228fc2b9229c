use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use ferrochain_common::block::Block;
use ferrochain_common::config::{PremineConfig, TokenomicsConfig};
use ferrochain_common::crypto::Address;
use ferrochain_common::error::EngineError;
use ferrochain_common::transaction::Transaction;
use ferrochain_storage::Storage;
use log::{error, info, warn};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::miner::{self, CancellationToken};
use crate::pipeline::{self, SubmitRequest};
use crate::risk::{NoOpRiskAdvisor, RiskAdvisor};
use crate::state::LedgerState;
use crate::tokenomics::Tokenomics;

/// Everything [`Engine::new`] needs that isn't the storage backend itself.
pub struct EngineConfig {
    pub tokenomics: TokenomicsConfig,
    pub difficulty: u32,
    pub premine: PremineConfig,
    /// §4.4 step 8: schedule a `Mine` after every accepted submission.
    pub auto_mine: bool,
}

/// The single owned value replacing the source system's global singletons
/// (§9 REDESIGN FLAGS). Constructed once at process start and shared via
/// `Arc`/`web::Data`; never re-created for the process lifetime.
pub struct Engine {
    storage: Arc<dyn Storage>,
    state: Mutex<LedgerState>,
    advisor: Box<dyn RiskAdvisor>,
    premine: PremineConfig,
    auto_mine: bool,
    ready: AtomicBool,
    /// Lets [`Engine::submit`] hand a follow-up auto-mine off to
    /// `tokio::spawn` without the caller waiting on it (§4.4 step 8, §5,
    /// §9): the spawned task needs its own owned handle to the engine, and
    /// `&self` alone can't produce one.
    self_handle: Weak<Engine>,
}

impl Engine {
    pub fn new(storage: Arc<dyn Storage>, config: EngineConfig) -> Arc<Self> {
        let tokenomics = Tokenomics::new(config.tokenomics);
        Arc::new_cyclic(|weak| Engine {
            storage,
            state: Mutex::new(LedgerState::new(tokenomics, config.difficulty)),
            advisor: Box::new(NoOpRiskAdvisor),
            premine: config.premine,
            auto_mine: config.auto_mine,
            ready: AtomicBool::new(false),
            self_handle: weak.clone(),
        })
    }

    /// Loads the chain and runs the genesis/premine reconciler (§4.6) before
    /// the HTTP listener binds, so no request races reconciliation. Marks the
    /// engine ready only on success; `/api/health` reports `NotReady` until
    /// this completes.
    pub async fn initialize(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        let difficulty = state.difficulty;
        crate::genesis::reconcile(&mut state, &self.storage, &self.premine, difficulty).await?;
        drop(state);
        self.ready.store(true, Ordering::SeqCst);
        info!("engine ready");
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn storage_kind(&self) -> ferrochain_storage::BackendKind {
        self.storage.kind()
    }

    /// Runs the transaction pipeline (§4.4). Returns `NotReady` before
    /// [`Engine::initialize`] has completed.
    pub async fn submit(&self, request: SubmitRequest) -> Result<Transaction, EngineError> {
        if !self.is_ready() {
            return Err(EngineError::NotReady);
        }
        let to = request.to;
        let mut state = self.state.lock().await;
        let tx = pipeline::submit(&mut state, &self.storage, self.advisor.as_ref(), request).await?;
        drop(state);

        if self.auto_mine {
            // §4.4 step 8 / §9: scheduled on its own task, never blocks the
            // caller — `mine` re-acquires `self.state`'s lock, so awaiting it
            // inline here would hold up every other request for the full PoW
            // search. Failures are logged and swallowed; the submission
            // above has already succeeded regardless.
            if let Some(engine) = self.self_handle.upgrade() {
                tokio::spawn(async move {
                    let cancellation = CancellationToken::new();
                    match engine.mine(to, &cancellation).await {
                        Ok(block) => info!("auto-mine succeeded, committed block {}", block.index),
                        Err(e) => warn!("auto-mine after submission failed: {e}"),
                    }
                });
            }
        }

        Ok(tx)
    }

    /// Runs the miner (§4.5). `cancellation` lets a caller abort a long PoW
    /// search between nonce batches (§5).
    pub async fn mine(&self, miner_address: Address, cancellation: &CancellationToken) -> Result<Block, EngineError> {
        if !self.is_ready() {
            return Err(EngineError::NotReady);
        }
        let mut state = self.state.lock().await;
        miner::mine(&mut state, &self.storage, miner_address, cancellation).await
    }

    pub async fn balance(&self, address: Address) -> Decimal {
        let state = self.state.lock().await;
        state.balance_of(&address)
    }

    pub async fn chain_snapshot(&self) -> Vec<Block> {
        let state = self.state.lock().await;
        state.chain.clone()
    }

    pub async fn pending_snapshot(&self) -> Vec<Transaction> {
        let state = self.state.lock().await;
        state.mempool.clone()
    }

    pub async fn chain_length(&self) -> u64 {
        let state = self.state.lock().await;
        state.next_index()
    }

    pub async fn difficulty(&self) -> u32 {
        let state = self.state.lock().await;
        state.difficulty
    }

    pub async fn current_mining_reward(&self) -> Decimal {
        let state = self.state.lock().await;
        state.tokenomics.reward_at_height(state.next_index())
    }

    pub async fn last_block(&self) -> Option<Block> {
        let state = self.state.lock().await;
        state.latest_block().cloned()
    }

    pub async fn total_mined(&self) -> Decimal {
        let state = self.state.lock().await;
        state.total_mined
    }

    pub async fn max_supply(&self) -> Decimal {
        let state = self.state.lock().await;
        state.tokenomics.max_supply()
    }

    /// `totalMined + Σ premines actually committed` (SPEC_FULL §9): supply
    /// figures are always derived, never a separate configuration constant.
    /// Uses the sum of premine transaction amounts ever committed, not the
    /// current balance of premine addresses — coins a founder later spends
    /// are still circulating, just held by someone else.
    pub async fn circulating_supply(&self) -> Decimal {
        let state = self.state.lock().await;
        state.total_mined + state.total_premined()
    }

    pub async fn transaction_history(&self, address: &Address) -> Result<Vec<Transaction>, EngineError> {
        self.storage
            .get_transaction_history(address)
            .await
            .map_err(|e| EngineError::StorageUnavailable(e.to_string()))
    }

    /// Exposed for tests and an optional admin endpoint (SPEC_FULL §4.8);
    /// not part of the minimal HTTP surface in §6.
    pub async fn is_chain_valid(&self) -> Result<(), EngineError> {
        let state = self.state.lock().await;
        state.is_chain_valid()
    }

    pub async fn close(&self) -> Result<(), EngineError> {
        self.storage
            .close()
            .await
            .map_err(|e| {
                error!("failed to close storage backend cleanly: {e}");
                EngineError::StorageUnavailable(e.to_string())
            })
    }
}
