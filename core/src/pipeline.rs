use std::sync::Arc;

use ferrochain_common::crypto::{is_legacy_allowlisted, owns_address, verify_ecdsa, Address};
use ferrochain_common::error::EngineError;
use ferrochain_common::time::now_millis;
use ferrochain_common::transaction::{Signature, Transaction, TxPayload};
use ferrochain_storage::Storage;
use log::{info, warn};
use rust_decimal::Decimal;

use crate::risk::RiskAdvisor;
use crate::state::LedgerState;

/// Everything a caller supplies to [`submit`]; mirrors the wire body of
/// `POST /api/transaction` (§6) before it becomes a [`Transaction`].
pub struct SubmitRequest {
    pub from: Address,
    pub to: Address,
    pub amount: Decimal,
    pub timestamp: Option<u64>,
    pub data: TxPayload,
    pub signature: Signature,
}

/// The eight-step verification pipeline (§4.4). Holds the engine's write
/// lock for its entire duration — storage calls included — since submission
/// and mining must never interleave (§5).
pub async fn submit(
    state: &mut LedgerState,
    storage: &Arc<dyn Storage>,
    advisor: &dyn RiskAdvisor,
    request: SubmitRequest,
) -> Result<Transaction, EngineError> {
    // 1. Shape.
    if request.amount <= Decimal::ZERO {
        return Err(EngineError::BadRequest { field: "amount".into() });
    }
    if request.signature.r.is_empty() {
        return Err(EngineError::BadRequest { field: "signature.r".into() });
    }
    if request.signature.s.is_empty() {
        return Err(EngineError::BadRequest { field: "signature.s".into() });
    }
    if request.signature.public_key.is_empty() {
        return Err(EngineError::BadRequest { field: "signature.publicKey".into() });
    }

    // 2. Canonical hash — the client-supplied timestamp is reused verbatim;
    // re-stamping it would invalidate the signature the wallet produced.
    let timestamp = request.timestamp.unwrap_or_else(now_millis);
    let hash = Transaction::hash_for_signing(Some(request.from), request.to, request.amount, timestamp, &request.data);

    // 3. Signature verification.
    verify_ecdsa(&hash, &request.signature.r, &request.signature.s, &request.signature.public_key)
        .map_err(|e| EngineError::InvalidSignature { reason: e.to_string() })?;

    // 4. Address ownership: try all three derivations before falling back to
    // the legacy allowlist (§4.2).
    if !owns_address(&request.signature.public_key, &request.from) && !is_legacy_allowlisted(&request.from) {
        return Err(EngineError::AddressMismatch { from: request.from });
    }

    // 5. Balance sufficiency against committed chain plus mempool (§4.7;
    // this is the gate the reconciler's open question in §9 concerns —
    // a sender can grief their own mempool-view balance by sending to an
    // address they control, and this implementation does not work around it).
    let current = state.balance_of(&request.from);
    if current < request.amount {
        return Err(EngineError::InsufficientBalance { current, required: request.amount });
    }

    let tx = Transaction {
        from: Some(request.from),
        to: request.to,
        amount: request.amount,
        timestamp,
        data: request.data,
        signature: Some(request.signature),
        id: None,
    };

    // 6. Risk advisory — informational only, cannot veto a valid transaction.
    if let Some(annotation) = advisor.annotate(&tx) {
        info!("risk advisory for tx from {}: {}", request.from, annotation.note);
    }

    // 7. Admit: mempool first, then persist. Storage failure here surfaces
    // to the caller as-is; the mempool entry is rolled back so the two stay
    // consistent.
    let persisted = match storage.save_transaction(&tx, None).await {
        Ok(persisted) => persisted,
        Err(e) => {
            warn!("failed to persist pending transaction from {}: {e}", request.from);
            return Err(EngineError::StorageUnavailable(e.to_string()));
        }
    };
    state.admit_to_mempool(persisted.clone());

    Ok(persisted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenomics::Tokenomics;
    use ferrochain_common::config::TokenomicsConfig;
    use ferrochain_storage::backends::memory::InMemoryStore;
    use k256::ecdsa::signature::hazmat::PrehashSigner;
    use k256::ecdsa::{Signature as K256Signature, SigningKey, VerifyingKey};
    use rand_core::OsRng;

    fn signed_request(to: Address, amount: Decimal, timestamp: u64) -> (SigningKey, SubmitRequest) {
        let signing_key = SigningKey::random(&mut OsRng);
        let verifying_key = VerifyingKey::from(&signing_key);
        let pubkey = verifying_key.to_encoded_point(false);
        let from = Address::derive_standard_evm(pubkey.as_bytes());
        let data = TxPayload::Transfer;
        let hash = Transaction::hash_for_signing(Some(from), to, amount, timestamp, &data);
        let sig: K256Signature = signing_key.sign_prehash(hash.as_bytes()).unwrap();
        let bytes = sig.to_bytes();
        let signature = Signature {
            r: bytes[..32].to_vec(),
            s: bytes[32..].to_vec(),
            public_key: pubkey.as_bytes().to_vec(),
            recovery_param: None,
        };
        (
            signing_key,
            SubmitRequest { from, to, amount, timestamp: Some(timestamp), data, signature },
        )
    }

    fn state_with_genesis_credit(to: Address, amount: Decimal) -> LedgerState {
        let tokenomics = Tokenomics::new(TokenomicsConfig::default());
        let mut state = LedgerState::new(tokenomics, 2);
        let credit = Transaction {
            from: None,
            to,
            amount,
            timestamp: 0,
            data: TxPayload::Premine { recipient: ferrochain_common::config::PremineTag::Founder },
            signature: None,
            id: None,
        };
        let block = ferrochain_common::block::Block {
            index: 0,
            timestamp: 0,
            previous_hash: ferrochain_common::block::Block::genesis_previous_hash(),
            transactions: vec![credit],
            nonce: 0,
            difficulty: 0,
            hash: ferrochain_common::crypto::Hash::zero(),
        };
        state.commit_system_block(block);
        state
    }

    #[tokio::test]
    async fn accepts_a_well_formed_transfer() {
        let to: Address = "0xdddddddddddddddddddddddddddddddddddddddd".parse().unwrap();
        let (_key, request) = signed_request(to, Decimal::from(10), 1_000);
        let mut state = state_with_genesis_credit(request.from, Decimal::from(100));
        let storage = Arc::new(InMemoryStore::new()) as Arc<dyn ferrochain_storage::Storage>;
        let advisor = crate::risk::NoOpRiskAdvisor;
        let tx = submit(&mut state, &storage, &advisor, request).await.unwrap();
        assert_eq!(tx.amount, Decimal::from(10));
        assert_eq!(state.mempool.len(), 1);
    }

    #[tokio::test]
    async fn rejects_zero_amount() {
        let to: Address = "0xdddddddddddddddddddddddddddddddddddddddd".parse().unwrap();
        let (_key, request) = signed_request(to, Decimal::ZERO, 1_000);
        let mut state = state_with_genesis_credit(request.from, Decimal::from(100));
        let storage = Arc::new(InMemoryStore::new()) as Arc<dyn ferrochain_storage::Storage>;
        let advisor = crate::risk::NoOpRiskAdvisor;
        let err = submit(&mut state, &storage, &advisor, request).await.unwrap_err();
        assert!(matches!(err, EngineError::BadRequest { .. }));
    }

    #[tokio::test]
    async fn rejects_insufficient_balance() {
        let to: Address = "0xdddddddddddddddddddddddddddddddddddddddd".parse().unwrap();
        let (_key, request) = signed_request(to, Decimal::from(10), 1_000);
        let mut state = state_with_genesis_credit(request.from, Decimal::from(5));
        let storage = Arc::new(InMemoryStore::new()) as Arc<dyn ferrochain_storage::Storage>;
        let advisor = crate::risk::NoOpRiskAdvisor;
        let err = submit(&mut state, &storage, &advisor, request).await.unwrap_err();
        assert!(matches!(err, EngineError::InsufficientBalance { .. }));
    }

    #[tokio::test]
    async fn rejects_address_mismatch() {
        // A valid signature, but the signing key does not derive (under any
        // scheme) to the declared `from` — the signer does not own the
        // claimed sending address.
        let to: Address = "0xdddddddddddddddddddddddddddddddddddddddd".parse().unwrap();
        let claimed_from: Address = "0xffffffffffffffffffffffffffffffffffffffff".parse().unwrap();
        let amount = Decimal::from(10);
        let timestamp = 1_000u64;
        let signing_key = SigningKey::random(&mut OsRng);
        let verifying_key = VerifyingKey::from(&signing_key);
        let pubkey = verifying_key.to_encoded_point(false);
        let data = TxPayload::Transfer;
        let hash = Transaction::hash_for_signing(Some(claimed_from), to, amount, timestamp, &data);
        let sig: K256Signature = signing_key.sign_prehash(hash.as_bytes()).unwrap();
        let bytes = sig.to_bytes();
        let request = SubmitRequest {
            from: claimed_from,
            to,
            amount,
            timestamp: Some(timestamp),
            data,
            signature: Signature {
                r: bytes[..32].to_vec(),
                s: bytes[32..].to_vec(),
                public_key: pubkey.as_bytes().to_vec(),
                recovery_param: None,
            },
        };
        let mut state = state_with_genesis_credit(claimed_from, Decimal::from(100));
        let storage = Arc::new(InMemoryStore::new()) as Arc<dyn ferrochain_storage::Storage>;
        let advisor = crate::risk::NoOpRiskAdvisor;
        let err = submit(&mut state, &storage, &advisor, request).await.unwrap_err();
        assert!(matches!(err, EngineError::AddressMismatch { .. }));
    }
}
