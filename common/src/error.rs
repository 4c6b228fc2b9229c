use rust_decimal::Decimal;
use thiserror::Error;

use crate::crypto::Address;

/// The error vocabulary surfaced by the core engine (§7). `node` maps every
/// variant to an HTTP status and reason string in one exhaustive match; no
/// variant here is allowed to fall through to a generic 500.
#[derive(Debug, Error, Clone)]
pub enum EngineError {
    #[error("bad request: missing or invalid field `{field}`")]
    BadRequest { field: String },

    #[error("signature does not verify: {reason}")]
    InvalidSignature { reason: String },

    #[error("public key does not derive to `from` address {from} under any recognized scheme")]
    AddressMismatch { from: Address },

    #[error("insufficient balance: have {current}, need {required}")]
    InsufficientBalance { current: Decimal, required: Decimal },

    #[error("block index {0} has already been committed")]
    ReplayedBlockIndex(u64),

    #[error("miner {miner} has already mined block {index}")]
    AlreadyMined { miner: Address, index: u64 },

    #[error("no pending transactions to mine")]
    NoPendingTransactions,

    #[error("mempool transaction from {from} is no longer funded: have {current}, need {required}")]
    InvalidMempoolTransaction {
        from: Address,
        current: Decimal,
        required: Decimal,
    },

    #[error("maximum supply reached, no further reward to mint")]
    MaxSupplyReached,

    #[error("storage backend unavailable: {0}")]
    StorageUnavailable(String),

    #[error("storage backend rejected credentials")]
    StoragePermissionDenied,

    #[error("storage operation timed out")]
    StorageTimeout,

    #[error("operation cancelled")]
    Cancelled,

    #[error("engine is not ready yet")]
    NotReady,

    #[error("block {index} failed validation: {reason}")]
    InvalidBlock { index: u64, reason: String },

    #[error("unknown block index {0}")]
    UnknownBlock(u64),

    #[error("unknown address {0}")]
    UnknownAddress(Address),
}

impl EngineError {
    /// A stable machine-readable code, independent of the `Display` message,
    /// for clients that want to branch on error kind rather than parse text.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::BadRequest { .. } => "BAD_REQUEST",
            EngineError::InvalidSignature { .. } => "INVALID_SIGNATURE",
            EngineError::AddressMismatch { .. } => "ADDRESS_MISMATCH",
            EngineError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            EngineError::ReplayedBlockIndex(_) => "REPLAYED_BLOCK_INDEX",
            EngineError::AlreadyMined { .. } => "ALREADY_MINED",
            EngineError::NoPendingTransactions => "NO_PENDING_TRANSACTIONS",
            EngineError::InvalidMempoolTransaction { .. } => "INVALID_MEMPOOL_TRANSACTION",
            EngineError::MaxSupplyReached => "MAX_SUPPLY_REACHED",
            EngineError::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            EngineError::StoragePermissionDenied => "STORAGE_PERMISSION_DENIED",
            EngineError::StorageTimeout => "STORAGE_TIMEOUT",
            EngineError::Cancelled => "CANCELLED",
            EngineError::NotReady => "NOT_READY",
            EngineError::InvalidBlock { .. } => "INVALID_BLOCK",
            EngineError::UnknownBlock(_) => "UNKNOWN_BLOCK",
            EngineError::UnknownAddress(_) => "UNKNOWN_ADDRESS",
        }
    }
}

/// Marker so callers that only have a hash (e.g. genesis diffing) can build
/// an [`EngineError::InvalidBlock`] without threading an `Address` through.
pub fn invalid_block(index: u64, reason: impl Into<String>) -> EngineError {
    EngineError::InvalidBlock {
        index,
        reason: reason.into(),
    }
}
