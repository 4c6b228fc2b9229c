use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};

use crate::backends::memory::InMemoryStore;
use crate::backends::remote::{RemoteDocumentStore, RemoteDocumentStoreConfig};
use crate::backends::sql::SqlStore;
use crate::Storage;

const REMOTE_ATTEMPTS: u32 = 3;
const REMOTE_BACKOFF: Duration = Duration::from_secs(3);

pub struct StorageSelectionConfig {
    pub use_remote_store: bool,
    pub remote: Option<RemoteDocumentStoreConfig>,
    pub db_path: String,
}

/// Startup selection policy (§4.1): try the Remote Document Store up to
/// three times with ≥ 3 s backoff, fall back to the Embedded SQL Store, and
/// finally the In-Memory Store. The chosen backend is fixed for the process
/// lifetime — callers never re-run this after startup.
pub async fn select_backend(config: StorageSelectionConfig) -> Arc<dyn Storage> {
    if config.use_remote_store {
        if let Some(remote_config) = config.remote {
            match try_remote(remote_config).await {
                Some(store) => return store,
                None => warn!("remote document store unavailable after {REMOTE_ATTEMPTS} attempts, falling back"),
            }
        } else {
            warn!("useRemoteStore was set but no remote configuration was supplied, falling back");
        }
    }

    match SqlStore::open(&config.db_path) {
        Ok(store) => {
            info!("selected embedded SQL store at {}", config.db_path);
            let store = Arc::new(store);
            store.spawn_checkpoint_task();
            return store;
        }
        Err(e) => error!("embedded SQL store unavailable ({e}), falling back to in-memory store"),
    }

    info!("selected in-memory store: restarts will lose all chain state");
    Arc::new(InMemoryStore::new())
}

async fn try_remote(config: RemoteDocumentStoreConfig) -> Option<Arc<dyn Storage>> {
    let store = match RemoteDocumentStore::new(config) {
        Ok(store) => store,
        Err(e) => {
            error!("failed to construct remote document store client: {e}");
            return None;
        }
    };

    for attempt in 1..=REMOTE_ATTEMPTS {
        match store.probe().await {
            Ok(()) => {
                info!("selected remote document store (probe succeeded on attempt {attempt})");
                return Some(Arc::new(store));
            }
            Err(e) => {
                warn!("remote document store probe failed (attempt {attempt}/{REMOTE_ATTEMPTS}): {e}");
                if attempt < REMOTE_ATTEMPTS {
                    tokio::time::sleep(REMOTE_BACKOFF).await;
                }
            }
        }
    }
    None
}
