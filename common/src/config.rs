use serde::{Deserialize, Serialize};

use crate::crypto::Address;

/// Default block subsidy before any halving, in whole coins.
pub const DEFAULT_INITIAL_REWARD: u64 = 100;
/// Blocks between each halving of the subsidy.
pub const DEFAULT_HALVING_INTERVAL: u64 = 210_000;
/// Hard cap on total coins that will ever be minted via coinbase.
pub const DEFAULT_MAX_SUPPLY: u64 = 21_000_000;
/// Number of halvings after which the subsidy rounds to zero.
pub const MAX_HALVINGS: u32 = 32;
/// Fractional digits carried by every amount/balance figure.
pub const DECIMAL_SCALE: u32 = 8;
/// Lowest difficulty the miner will accept, regardless of configuration.
pub const MIN_DIFFICULTY: u32 = 2;
/// Difficulty new deployments are advised to run at.
pub const RECOMMENDED_DIFFICULTY: u32 = 4;
/// Upper bound on nonces tried per PoW batch before checking cancellation (§5).
pub const POW_BATCH_SIZE: u64 = 10_000;

/// One of the three fixed genesis allocations (§3 "Premine allocations").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Copy)]
pub enum PremineTag {
    Founder,
    Treasury,
    LiquidityPool,
}

impl PremineTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            PremineTag::Founder => "founder",
            PremineTag::Treasury => "treasury",
            PremineTag::LiquidityPool => "liquidity_pool",
        }
    }

    pub const ALL: [PremineTag; 3] = [
        PremineTag::Founder,
        PremineTag::Treasury,
        PremineTag::LiquidityPool,
    ];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PremineAllocation {
    pub tag: PremineTag,
    pub address: Address,
    pub amount: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PremineConfig {
    pub founder_address: Address,
    pub founder_premine: u64,
    pub treasury_address: Address,
    pub treasury_premine: u64,
    pub liquidity_pool_address: Address,
    pub liquidity_pool_premine: u64,
}

impl PremineConfig {
    pub fn allocations(&self) -> [PremineAllocation; 3] {
        [
            PremineAllocation {
                tag: PremineTag::Founder,
                address: self.founder_address,
                amount: self.founder_premine,
            },
            PremineAllocation {
                tag: PremineTag::Treasury,
                address: self.treasury_address,
                amount: self.treasury_premine,
            },
            PremineAllocation {
                tag: PremineTag::LiquidityPool,
                address: self.liquidity_pool_address,
                amount: self.liquidity_pool_premine,
            },
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenomicsConfig {
    pub initial_reward: u64,
    pub halving_interval: u64,
    pub max_supply: u64,
}

impl Default for TokenomicsConfig {
    fn default() -> Self {
        TokenomicsConfig {
            initial_reward: DEFAULT_INITIAL_REWARD,
            halving_interval: DEFAULT_HALVING_INTERVAL,
            max_supply: DEFAULT_MAX_SUPPLY,
        }
    }
}
