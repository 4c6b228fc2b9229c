use std::collections::{HashMap, HashSet};

use ferrochain_common::block::Block;
use ferrochain_common::crypto::{is_legacy_allowlisted, owns_address, verify_ecdsa, Address};
use ferrochain_common::error::EngineError;
use ferrochain_common::transaction::{Transaction, TxPayload};
use rust_decimal::Decimal;

use crate::tokenomics::Tokenomics;

/// The in-memory chain, mempool, and mining bookkeeping (§4.3). Storage owns
/// the durable copy; this struct is the authoritative view `core` mutates
/// and `node` reads from, always behind the engine's single writer lock.
pub struct LedgerState {
    pub chain: Vec<Block>,
    pub mempool: Vec<Transaction>,
    pub mined_indices: HashSet<u64>,
    pub miner_history: HashMap<Address, HashSet<u64>>,
    pub total_mined: Decimal,
    /// Incremental balance cache (§4.7 SHOULD); always re-derivable from
    /// `chain` + `mempool` via [`LedgerState::balance_of`].
    balances: HashMap<Address, Decimal>,
    pub tokenomics: Tokenomics,
    pub difficulty: u32,
}

impl LedgerState {
    pub fn new(tokenomics: Tokenomics, difficulty: u32) -> Self {
        LedgerState {
            chain: Vec::new(),
            mempool: Vec::new(),
            mined_indices: HashSet::new(),
            miner_history: HashMap::new(),
            total_mined: Decimal::ZERO,
            balances: HashMap::new(),
            tokenomics,
            difficulty,
        }
    }

    pub fn next_index(&self) -> u64 {
        self.chain.len() as u64
    }

    pub fn latest_block(&self) -> Option<&Block> {
        self.chain.last()
    }

    /// §4.7: scans committed chain plus mempool, crediting `to` and
    /// debiting `from` for every transaction the address appears in.
    pub fn balance_of(&self, address: &Address) -> Decimal {
        let mut balance = self.confirmed_balance_of(address);
        for tx in &self.mempool {
            apply_tx_to_balance(&mut balance, tx, address);
        }
        balance
    }

    /// Committed-chain-only balance, used by the miner to revalidate mempool
    /// transactions against ground truth rather than against each other
    /// (§4.5 step 4).
    pub fn confirmed_balance_of(&self, address: &Address) -> Decimal {
        let mut balance = Decimal::ZERO;
        for block in &self.chain {
            for tx in &block.transactions {
                apply_tx_to_balance(&mut balance, tx, address);
            }
        }
        balance
    }

    /// Fast-path balance using the incremental cache; callers that need the
    /// spec-defined ground truth should use [`LedgerState::balance_of`].
    pub fn cached_balance_of(&self, address: &Address) -> Decimal {
        *self.balances.get(address).unwrap_or(&Decimal::ZERO)
    }

    fn bump_cache(&mut self, tx: &Transaction) {
        if let Some(from) = tx.from {
            let entry = self.balances.entry(from).or_insert(Decimal::ZERO);
            *entry -= tx.amount;
        }
        let entry = self.balances.entry(tx.to).or_insert(Decimal::ZERO);
        *entry += tx.amount;
    }

    pub fn admit_to_mempool(&mut self, tx: Transaction) {
        self.bump_cache(&tx);
        self.mempool.push(tx);
    }

    /// Rebuilds the cache for a fresh load from storage, or after a
    /// reconciliation that touched blocks out of band.
    pub fn rebuild_balance_cache(&mut self) {
        self.balances.clear();
        let chain = std::mem::take(&mut self.chain);
        let mempool = std::mem::take(&mut self.mempool);
        for block in &chain {
            for tx in &block.transactions {
                self.bump_cache(tx);
            }
        }
        for tx in &mempool {
            self.bump_cache(tx);
        }
        self.chain = chain;
        self.mempool = mempool;
    }

    pub fn commit_block(&mut self, block: Block, reward: Decimal) {
        self.mined_indices.insert(block.index);
        if let Some(coinbase) = block.transactions.last() {
            if matches!(coinbase.data, TxPayload::MiningReward { .. }) {
                self.miner_history
                    .entry(coinbase.to)
                    .or_default()
                    .insert(block.index);
            }
        }
        self.total_mined += reward;
        self.mempool.clear();
        self.chain.push(block);
    }

    /// Appends a correction/genesis block outside of mining (premine or
    /// bridge-in), without touching `total_mined` — only coinbase rewards
    /// count toward it (§9 open question on reconciler overshoot).
    pub fn commit_system_block(&mut self, block: Block) {
        for tx in &block.transactions {
            self.bump_cache(tx);
        }
        self.chain.push(block);
    }

    /// §4.8: every block's hash matches its contents, links to its
    /// predecessor, and satisfies its declared difficulty.
    pub fn is_chain_valid(&self) -> Result<(), EngineError> {
        for i in 1..self.chain.len() {
            let prev = &self.chain[i - 1];
            let curr = &self.chain[i];
            if curr.rehash() != curr.hash {
                return Err(ferrochain_common::error::invalid_block(curr.index, "hash does not match contents"));
            }
            if curr.previous_hash != prev.hash {
                return Err(ferrochain_common::error::invalid_block(curr.index, "previous_hash does not link to prior block"));
            }
            if !Block::satisfies_difficulty(&curr.hash, curr.difficulty) {
                return Err(ferrochain_common::error::invalid_block(curr.index, "hash does not satisfy declared difficulty"));
            }
            for tx in &curr.transactions {
                if Self::is_system_transaction(tx) {
                    continue;
                }
                verify_committed_transaction(tx)
                    .map_err(|_| ferrochain_common::error::invalid_block(curr.index, "contains a transaction with an invalid signature"))?;
            }
        }
        Ok(())
    }

    /// Sum of every `Premine` transaction amount ever committed (genesis plus
    /// any reconciler corrections). Used for circulating supply, which must
    /// not shrink just because a premined address later spends its coins.
    pub fn total_premined(&self) -> Decimal {
        let mut total = Decimal::ZERO;
        for block in &self.chain {
            for tx in &block.transactions {
                if matches!(tx.data, TxPayload::Premine { .. }) {
                    total += tx.amount;
                }
            }
        }
        total
    }

    /// Signature-or-system check used by [`LedgerState::is_chain_valid`]'s
    /// stricter sibling in `core::pipeline`, which also re-verifies ECDSA;
    /// kept here as the structural half of §4.8.
    pub fn is_system_transaction(tx: &Transaction) -> bool {
        tx.from.is_none()
            && matches!(
                tx.data,
                TxPayload::MiningReward { .. } | TxPayload::Premine { .. } | TxPayload::BridgeIn { .. }
            )
    }
}

/// §4.8's per-transaction half: a committed non-system transaction must
/// carry a signature that verifies against its signing hash, by a public
/// key that derives to `from` under one of the three schemes (or sits on
/// the legacy allowlist).
fn verify_committed_transaction(tx: &Transaction) -> Result<(), ()> {
    let from = tx.from.ok_or(())?;
    let signature = tx.signature.as_ref().ok_or(())?;
    verify_ecdsa(&tx.signing_hash(), &signature.r, &signature.s, &signature.public_key).map_err(|_| ())?;
    if owns_address(&signature.public_key, &from) || is_legacy_allowlisted(&from) {
        Ok(())
    } else {
        Err(())
    }
}

fn apply_tx_to_balance(balance: &mut Decimal, tx: &Transaction, address: &Address) {
    if tx.from.as_ref() == Some(address) {
        *balance -= tx.amount;
    }
    if &tx.to == address {
        *balance += tx.amount;
    }
}
