//! The Ferrochain ledger engine: transaction pipeline, miner, genesis
//! reconciler, and the single-writer state they share.
//!
//! Everything here is reachable only through [`Engine`]; no module exposes a
//! global or lazily-initialized instance (§9 REDESIGN FLAGS).

pub mod engine;
pub mod genesis;
pub mod miner;
pub mod pipeline;
pub mod risk;
pub mod state;
pub mod tokenomics;

pub use engine::{Engine, EngineConfig};
pub use genesis::build_genesis_block;
pub use miner::CancellationToken;
pub use pipeline::SubmitRequest;
pub use state::LedgerState;
pub use tokenomics::Tokenomics;
