//! Ferrochain HTTP adapter: binds the engine to `/api/*`, wrapping it with
//! auth, rate limiting and CORS the way the source system's daemon wraps
//! its own RPC surface (SPEC_FULL §6 [AMBIENT]).

mod auth;
mod config;
mod dto;
mod error_map;
mod handlers;
mod logging;
mod rate_limit;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::middleware::from_fn;
use actix_web::{web, App, HttpServer};
use clap::Parser;
use ferrochain_core::{Engine, EngineConfig};
use ferrochain_storage::{select_backend, StorageSelectionConfig};
use log::{info, warn};

use config::{Cli, NodeConfig};
use rate_limit::RateLimiter;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = NodeConfig::resolve(cli)?;
    logging::init(&config.log_level, &config.logs_path)?;

    if config.bind_address.starts_with("0.0.0.0") {
        warn!("security warning: binding to 0.0.0.0 exposes the node to the network");
        warn!("the API key is the only barrier between the network and mutating this ledger");
        warn!("recommended: bind to 127.0.0.1 unless remote access is genuinely required");
    }
    if config.api_key.is_empty() {
        warn!("no api key configured: every /api/* route other than /api/health is wide open");
    }

    let storage = select_backend(StorageSelectionConfig {
        use_remote_store: config.use_remote_store,
        remote: config.remote,
        db_path: config.db_path.clone(),
    })
    .await;

    let engine = Engine::new(
        storage,
        EngineConfig {
            tokenomics: config.tokenomics,
            difficulty: config.difficulty,
            premine: config.premine,
            auto_mine: config.auto_mine,
        },
    );
    engine.initialize().await?;
    info!("engine ready on backend {:?}", engine.storage_kind());

    let api_key = Arc::new(config.api_key.clone());
    let rate_limiter = RateLimiter::new();
    let bind_address = config.bind_address.clone();
    let threads = config.threads;

    let engine_for_server = engine.clone();
    let server = HttpServer::new(move || {
        let api_scope = web::scope("/api")
            .app_data(web::Data::new((*api_key).clone()))
            .app_data(web::Data::new(rate_limiter.clone()))
            .wrap(from_fn(rate_limit::enforce))
            .wrap(from_fn(auth::require_api_key))
            .route("/blockchain", web::get().to(handlers::blockchain))
            .route("/chain", web::get().to(handlers::chain))
            .route("/balance/{address}", web::get().to(handlers::balance))
            .route("/transactions/pending", web::get().to(handlers::pending_transactions))
            .route("/transactions/{address}", web::get().to(handlers::transactions_for))
            .route("/transaction", web::post().to(handlers::submit_transaction))
            .route("/mine", web::post().to(handlers::mine))
            .route("/supply", web::get().to(handlers::supply))
            .route("/total-supply", web::get().to(handlers::total_supply))
            .route("/circulating-supply", web::get().to(handlers::circulating_supply))
            .route("/max-supply", web::get().to(handlers::max_supply))
            .route("/holders", web::get().to(handlers::holders));

        App::new()
            .app_data(web::Data::new(engine_for_server.clone()))
            .wrap(Cors::permissive())
            .route("/api/health", web::get().to(handlers::health))
            .service(api_scope)
    })
    .disable_signals()
    .bind(&bind_address)?
    .workers(threads)
    .run();

    let handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, draining connections");
    handle.stop(true).await;
    server_task.await??;

    if let Err(e) = engine.close().await {
        warn!("error closing storage backend during shutdown: {e}");
    }

    Ok(())
}
