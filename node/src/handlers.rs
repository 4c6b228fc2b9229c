use std::collections::HashSet;
use std::sync::Arc;

use actix_web::{web, HttpResponse, Responder};
use ferrochain_common::crypto::Address;
use ferrochain_core::{CancellationToken, Engine, SubmitRequest};

use crate::dto::{
    BalanceResponse, BlockSummary, BlockchainResponse, ChainPage, ChainQuery, HealthResponse, Holder,
    HoldersResponse, MineRequest, MineSuccess, SupplyResponse, TransactionRequest, TransactionSuccess,
};
use crate::error_map::response_for;

const DEFAULT_CHAIN_PAGE: usize = 50;

/// Never rate-limited or authenticated (§6) — mounted outside both
/// middlewares in [`crate::build_app`].
pub async fn health(engine: web::Data<Arc<Engine>>) -> impl Responder {
    let ready = engine.is_ready();
    HttpResponse::Ok().json(HealthResponse {
        status: if ready { "ok" } else { "initializing" },
        ready,
        chain_length: engine.chain_length().await,
        pending_transactions: engine.pending_snapshot().await.len(),
        backend: engine.storage_kind().as_str(),
        error: None,
    })
}

pub async fn blockchain(engine: web::Data<Arc<Engine>>) -> impl Responder {
    HttpResponse::Ok().json(BlockchainResponse {
        chain: engine.chain_snapshot().await,
        mempool: engine.pending_snapshot().await,
        difficulty: engine.difficulty().await,
        mining_reward: engine.current_mining_reward().await,
        last_block: engine.last_block().await,
    })
}

pub async fn chain(engine: web::Data<Arc<Engine>>, query: web::Query<ChainQuery>) -> impl Responder {
    let snapshot = engine.chain_snapshot().await;
    let total = snapshot.len() as u64;
    let limit = query.limit.unwrap_or(DEFAULT_CHAIN_PAGE).max(1);
    let offset = query.offset.unwrap_or(0);
    let blocks = snapshot.iter().skip(offset).take(limit).map(BlockSummary::from).collect();
    HttpResponse::Ok().json(ChainPage { blocks, total, limit, offset })
}

pub async fn balance(engine: web::Data<Arc<Engine>>, path: web::Path<Address>) -> impl Responder {
    let address = path.into_inner();
    let balance = engine.balance(address).await;
    HttpResponse::Ok().json(BalanceResponse { address: address.to_hex(), balance })
}

pub async fn transactions_for(engine: web::Data<Arc<Engine>>, path: web::Path<Address>) -> impl Responder {
    match engine.transaction_history(&path.into_inner()).await {
        Ok(history) => HttpResponse::Ok().json(history),
        Err(e) => response_for(&e),
    }
}

pub async fn pending_transactions(engine: web::Data<Arc<Engine>>) -> impl Responder {
    HttpResponse::Ok().json(engine.pending_snapshot().await)
}

pub async fn submit_transaction(engine: web::Data<Arc<Engine>>, body: web::Json<TransactionRequest>) -> impl Responder {
    let body = body.into_inner();
    let request = SubmitRequest {
        from: body.from,
        to: body.to,
        amount: body.amount,
        timestamp: body.timestamp,
        data: body.data,
        signature: body.signature,
    };
    match engine.submit(request).await {
        Ok(transaction) => HttpResponse::Ok().json(TransactionSuccess { success: true, transaction }),
        Err(e) => response_for(&e),
    }
}

pub async fn mine(engine: web::Data<Arc<Engine>>, body: web::Json<MineRequest>) -> impl Responder {
    let cancellation = CancellationToken::new();
    match engine.mine(body.miner_address, &cancellation).await {
        Ok(block) => HttpResponse::Ok().json(MineSuccess { success: true, block }),
        Err(e) => response_for(&e),
    }
}

pub async fn supply(engine: web::Data<Arc<Engine>>) -> impl Responder {
    HttpResponse::Ok().json(SupplyResponse { supply: engine.circulating_supply().await })
}

pub async fn total_supply(engine: web::Data<Arc<Engine>>) -> impl Responder {
    HttpResponse::Ok().json(SupplyResponse { supply: engine.total_mined().await })
}

pub async fn circulating_supply(engine: web::Data<Arc<Engine>>) -> impl Responder {
    HttpResponse::Ok().json(SupplyResponse { supply: engine.circulating_supply().await })
}

pub async fn max_supply(engine: web::Data<Arc<Engine>>) -> impl Responder {
    HttpResponse::Ok().json(SupplyResponse { supply: engine.max_supply().await })
}

/// Every address ever seen as a sender or recipient, chain plus mempool,
/// with a strictly positive current balance. Not in the spec's minimal
/// table of example payloads but named in its HTTP surface (§6); there is
/// no cheaper way to enumerate holders than scanning the snapshot, since
/// `core` does not index balances by address beyond the incremental cache.
pub async fn holders(engine: web::Data<Arc<Engine>>) -> impl Responder {
    let chain = engine.chain_snapshot().await;
    let mempool = engine.pending_snapshot().await;

    let mut seen: HashSet<Address> = HashSet::new();
    for tx in chain.iter().flat_map(|b| b.transactions.iter()).chain(mempool.iter()) {
        if let Some(from) = tx.from {
            seen.insert(from);
        }
        seen.insert(tx.to);
    }

    let mut holders = Vec::with_capacity(seen.len());
    for address in seen {
        let balance = engine.balance(address).await;
        if balance > rust_decimal::Decimal::ZERO {
            holders.push(Holder { address: address.to_hex(), balance });
        }
    }
    holders.sort_by(|a, b| b.balance.cmp(&a.balance));

    HttpResponse::Ok().json(HoldersResponse { holders })
}
