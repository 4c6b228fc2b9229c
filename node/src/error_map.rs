use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use ferrochain_common::error::EngineError;
use serde_json::{json, Value};

/// `{success: false, reason}` shape for every non-2xx response (§6).
pub fn error_body(code: &str, reason: &str) -> Value {
    json!({ "success": false, "code": code, "reason": reason })
}

/// Exhaustive `EngineError` -> `(StatusCode, reason)` mapping (SPEC_FULL §7
/// [AMBIENT]); every variant is named so a newly added one fails to compile
/// here rather than falling through to a generic 500.
pub fn status_for(error: &EngineError) -> StatusCode {
    match error {
        // Shape, signature, ownership, balance and replay failures are all
        // caller mistakes: HTTP 400 (§7 "Signature, ownership, balance, and
        // replay failures return HTTP 400 with a specific reason code").
        EngineError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        EngineError::InvalidSignature { .. } => StatusCode::BAD_REQUEST,
        EngineError::AddressMismatch { .. } => StatusCode::BAD_REQUEST,
        EngineError::InsufficientBalance { .. } => StatusCode::BAD_REQUEST,
        EngineError::ReplayedBlockIndex(_) => StatusCode::BAD_REQUEST,
        EngineError::AlreadyMined { .. } => StatusCode::BAD_REQUEST,
        EngineError::NoPendingTransactions => StatusCode::BAD_REQUEST,
        EngineError::InvalidMempoolTransaction { .. } => StatusCode::BAD_REQUEST,
        EngineError::MaxSupplyReached => StatusCode::BAD_REQUEST,
        // Generic storage unavailability and cancellation are retryable.
        EngineError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
        // Permission/timeout surface as a redacted 500; detail stays in logs.
        EngineError::StoragePermissionDenied => StatusCode::INTERNAL_SERVER_ERROR,
        EngineError::StorageTimeout => StatusCode::INTERNAL_SERVER_ERROR,
        EngineError::InvalidBlock { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        EngineError::UnknownBlock(_) => StatusCode::NOT_FOUND,
        EngineError::UnknownAddress(_) => StatusCode::NOT_FOUND,
    }
}

pub fn response_for(error: &EngineError) -> HttpResponse {
    HttpResponse::build(status_for(error)).json(error_body(error.code(), &error.to_string()))
}
