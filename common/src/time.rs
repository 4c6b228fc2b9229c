use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch, matching the wallet's clock convention
/// for the transaction `timestamp` field (§3).
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the epoch")
        .as_millis() as u64
}
