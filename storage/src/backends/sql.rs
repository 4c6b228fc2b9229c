use std::sync::Mutex as StdMutex;
use std::time::Duration;

use async_trait::async_trait;
use ferrochain_common::crypto::{Address, Hash};
use ferrochain_common::{Block, Transaction};
use log::{debug, error, info};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex as AsyncMutex;

use crate::{BackendKind, Storage, StorageError};

/// Embedded SQL store over a single on-disk file (§4.1). Reads and writes run
/// on a blocking-pool thread via `spawn_blocking`; a background task issues
/// a WAL checkpoint on a ≤ 30 s cadence, with a final flush on `close()`.
pub struct SqlStore {
    conn: std::sync::Arc<StdMutex<Connection>>,
    checkpoint_guard: AsyncMutex<()>,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS blocks (
    idx INTEGER PRIMARY KEY,
    hash TEXT NOT NULL,
    previous_hash TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    nonce INTEGER NOT NULL,
    difficulty INTEGER NOT NULL,
    data TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    from_address TEXT,
    to_address TEXT NOT NULL,
    amount TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    block_index INTEGER,
    signature TEXT,
    data TEXT NOT NULL,
    pending INTEGER NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS smart_contracts (
    address TEXT PRIMARY KEY,
    blob BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS wallets (
    address TEXT PRIMARY KEY,
    public_key BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS miner_block_history (
    miner_address TEXT NOT NULL,
    block_index INTEGER NOT NULL,
    block_hash TEXT NOT NULL,
    UNIQUE(miner_address, block_index)
);
"#;

impl SqlStore {
    pub fn open(db_path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA)?;
        info!("SqlStore opened at {db_path}");
        Ok(SqlStore {
            conn: std::sync::Arc::new(StdMutex::new(conn)),
            checkpoint_guard: AsyncMutex::new(()),
        })
    }

    /// Spawns the periodic WAL checkpoint task (§4.1: auto-flush ≤ 30 s).
    pub fn spawn_checkpoint_task(self: &std::sync::Arc<Self>) {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(30));
            loop {
                ticker.tick().await;
                let _guard = store.checkpoint_guard.lock().await;
                let conn = store.conn.clone();
                let result = tokio::task::spawn_blocking(move || {
                    let conn = conn.lock().unwrap();
                    conn.pragma_update(None, "wal_checkpoint", "PASSIVE")
                })
                .await;
                match result {
                    Ok(Ok(())) => debug!("SqlStore periodic WAL checkpoint completed"),
                    Ok(Err(e)) => error!("SqlStore WAL checkpoint failed: {e}"),
                    Err(e) => error!("SqlStore checkpoint task panicked: {e}"),
                }
            }
        });
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            f(&conn)
        })
        .await
        .map_err(|e| StorageError::Unavailable(format!("blocking task panicked: {e}")))?
    }
}

fn row_to_block(conn: &Connection, index: u64) -> Result<Option<Block>, StorageError> {
    let header: Option<(String, String, u64, u64, u32)> = conn
        .query_row(
            "SELECT hash, previous_hash, timestamp, nonce, difficulty FROM blocks WHERE idx = ?1",
            params![index as i64],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get::<_, i64>(2)? as u64,
                    row.get::<_, i64>(3)? as u64,
                    row.get::<_, i64>(4)? as u32,
                ))
            },
        )
        .optional()?;
    let Some((hash, previous_hash, timestamp, nonce, difficulty)) = header else {
        return Ok(None);
    };
    let transactions = load_transactions_for_block(conn, index)?;
    Ok(Some(Block {
        index,
        timestamp,
        previous_hash: previous_hash.parse().map_err(|_| StorageError::Encoding("bad previous_hash".into()))?,
        transactions,
        nonce,
        difficulty,
        hash: hash.parse().map_err(|_| StorageError::Encoding("bad hash".into()))?,
    }))
}

fn load_transactions_for_block(conn: &Connection, index: u64) -> Result<Vec<Transaction>, StorageError> {
    let mut stmt = conn.prepare(
        "SELECT id, from_address, to_address, amount, timestamp, signature, data \
         FROM transactions WHERE block_index = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![index as i64], row_to_transaction)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn row_to_transaction(row: &rusqlite::Row) -> rusqlite::Result<Transaction> {
    let id: i64 = row.get(0)?;
    let from_address: Option<String> = row.get(1)?;
    let to_address: String = row.get(2)?;
    let amount: String = row.get(3)?;
    let timestamp: i64 = row.get(4)?;
    let signature: Option<String> = row.get(5)?;
    let data: String = row.get(6)?;

    let from = from_address
        .map(|a| a.parse().map_err(|_| rusqlite::Error::InvalidQuery))
        .transpose()?;
    let to = to_address.parse().map_err(|_| rusqlite::Error::InvalidQuery)?;
    let amount = amount
        .parse()
        .map_err(|_| rusqlite::Error::InvalidQuery)?;
    let signature = signature
        .map(|s| serde_json::from_str(&s).map_err(|_| rusqlite::Error::InvalidQuery))
        .transpose()?;
    let data = serde_json::from_str(&data).map_err(|_| rusqlite::Error::InvalidQuery)?;

    Ok(Transaction {
        from,
        to,
        amount,
        timestamp: timestamp as u64,
        data,
        signature,
        id: Some(id),
    })
}

#[async_trait]
impl Storage for SqlStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Sql
    }

    async fn save_block(&self, block: &Block) -> Result<(), StorageError> {
        let block = block.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO blocks (idx, hash, previous_hash, timestamp, nonce, difficulty, data, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, '{}', strftime('%s','now')) \
                 ON CONFLICT(idx) DO UPDATE SET hash=excluded.hash, previous_hash=excluded.previous_hash, \
                 timestamp=excluded.timestamp, nonce=excluded.nonce, difficulty=excluded.difficulty",
                params![
                    block.index as i64,
                    block.hash.to_hex(),
                    block.previous_hash.to_hex(),
                    block.timestamp as i64,
                    block.nonce as i64,
                    block.difficulty as i64,
                ],
            )?;
            for tx in &block.transactions {
                insert_transaction(conn, tx, Some(block.index))?;
            }
            Ok(())
        })
        .await
    }

    async fn delete_block(&self, index: u64) -> Result<(), StorageError> {
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM transactions WHERE block_index = ?1", params![index as i64])?;
            conn.execute("DELETE FROM blocks WHERE idx = ?1", params![index as i64])?;
            Ok(())
        })
        .await
    }

    async fn get_block(&self, index: u64) -> Result<Option<Block>, StorageError> {
        self.with_conn(move |conn| row_to_block(conn, index)).await
    }

    async fn get_all_blocks(&self) -> Result<Vec<Block>, StorageError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare("SELECT idx FROM blocks ORDER BY idx ASC")?;
            let indices: Vec<u64> = stmt
                .query_map([], |row| row.get::<_, i64>(0))?
                .map(|r| r.map(|v| v as u64))
                .collect::<rusqlite::Result<_>>()?;
            let mut blocks = Vec::new();
            for idx in indices {
                if let Some(b) = row_to_block(conn, idx)? {
                    blocks.push(b);
                }
            }
            Ok(blocks)
        })
        .await
    }

    async fn get_latest_block(&self) -> Result<Option<Block>, StorageError> {
        self.with_conn(move |conn| {
            let max_idx: Option<i64> = conn
                .query_row("SELECT MAX(idx) FROM blocks", [], |row| row.get(0))
                .optional()?
                .flatten();
            match max_idx {
                Some(idx) => row_to_block(conn, idx as u64),
                None => Ok(None),
            }
        })
        .await
    }

    async fn save_transaction(
        &self,
        tx: &Transaction,
        block_index: Option<u64>,
    ) -> Result<Transaction, StorageError> {
        let tx = tx.clone();
        self.with_conn(move |conn| {
            let id = insert_transaction(conn, &tx, block_index)?;
            let mut stored = tx;
            stored.id = Some(id);
            Ok(stored)
        })
        .await
    }

    async fn get_pending_transactions(&self) -> Result<Vec<Transaction>, StorageError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, from_address, to_address, amount, timestamp, signature, data \
                 FROM transactions WHERE pending = 1 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map([], row_to_transaction)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
    }

    async fn clear_pending_transactions(&self) -> Result<(), StorageError> {
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM transactions WHERE pending = 1", [])?;
            Ok(())
        })
        .await
    }

    async fn get_transactions_by_block(&self, index: u64) -> Result<Vec<Transaction>, StorageError> {
        self.with_conn(move |conn| load_transactions_for_block(conn, index)).await
    }

    async fn get_transaction_history(&self, address: &Address) -> Result<Vec<Transaction>, StorageError> {
        let address = address.to_hex();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, from_address, to_address, amount, timestamp, signature, data \
                 FROM transactions WHERE (from_address = ?1 OR to_address = ?1) AND pending = 0 \
                 ORDER BY block_index ASC, id ASC",
            )?;
            let rows = stmt.query_map(params![address], row_to_transaction)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
    }

    async fn save_wallet(&self, address: &Address, public_key: &[u8]) -> Result<(), StorageError> {
        let address = address.to_hex();
        let public_key = public_key.to_vec();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO wallets (address, public_key) VALUES (?1, ?2) \
                 ON CONFLICT(address) DO UPDATE SET public_key = excluded.public_key",
                params![address, public_key],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_wallet(&self, address: &Address) -> Result<Option<Vec<u8>>, StorageError> {
        let address = address.to_hex();
        self.with_conn(move |conn| {
            Ok(conn
                .query_row("SELECT public_key FROM wallets WHERE address = ?1", params![address], |row| row.get(0))
                .optional()?)
        })
        .await
    }

    async fn save_smart_contract(&self, address: &Address, blob: &[u8]) -> Result<(), StorageError> {
        let address = address.to_hex();
        let blob = blob.to_vec();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO smart_contracts (address, blob) VALUES (?1, ?2) \
                 ON CONFLICT(address) DO UPDATE SET blob = excluded.blob",
                params![address, blob],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_smart_contract(&self, address: &Address) -> Result<Option<Vec<u8>>, StorageError> {
        let address = address.to_hex();
        self.with_conn(move |conn| {
            Ok(conn
                .query_row("SELECT blob FROM smart_contracts WHERE address = ?1", params![address], |row| row.get(0))
                .optional()?)
        })
        .await
    }

    async fn get_all_smart_contracts(&self) -> Result<Vec<(Address, Vec<u8>)>, StorageError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare("SELECT address, blob FROM smart_contracts")?;
            let rows = stmt.query_map([], |row| {
                let address: String = row.get(0)?;
                let blob: Vec<u8> = row.get(1)?;
                Ok((address, blob))
            })?;
            let mut out = Vec::new();
            for row in rows {
                let (address, blob) = row?;
                let address = address.parse().map_err(|_| rusqlite::Error::InvalidQuery)?;
                out.push((address, blob));
            }
            Ok(out)
        })
        .await
    }

    async fn save_miner_block_history(
        &self,
        miner: &Address,
        block_index: u64,
        block_hash: &Hash,
    ) -> Result<(), StorageError> {
        let miner = miner.to_hex();
        let block_hash = block_hash.to_hex();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO miner_block_history (miner_address, block_index, block_hash) VALUES (?1, ?2, ?3)",
                params![miner, block_index as i64, block_hash],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_miner_block_history(&self) -> Result<Vec<(Address, u64, Hash)>, StorageError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare("SELECT miner_address, block_index, block_hash FROM miner_block_history")?;
            let rows = stmt.query_map([], |row| {
                let miner: String = row.get(0)?;
                let index: i64 = row.get(1)?;
                let hash: String = row.get(2)?;
                Ok((miner, index, hash))
            })?;
            let mut out = Vec::new();
            for row in rows {
                let (miner, index, hash) = row?;
                let miner = miner.parse().map_err(|_| rusqlite::Error::InvalidQuery)?;
                let hash: Hash = hash.parse().map_err(|_| rusqlite::Error::InvalidQuery)?;
                out.push((miner, index as u64, hash));
            }
            Ok(out)
        })
        .await
    }

    async fn backup(&self) -> Result<(), StorageError> {
        self.with_conn(move |conn| {
            let backup_path = format!("backup-{}.sqlite", ferrochain_common::time::now_millis());
            conn.execute("VACUUM INTO ?1", params![backup_path])?;
            info!("SqlStore backed up to {backup_path}");
            Ok(())
        })
        .await
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.with_conn(move |conn| {
            conn.pragma_update(None, "wal_checkpoint", "TRUNCATE")?;
            Ok(())
        })
        .await
    }
}

fn insert_transaction(conn: &Connection, tx: &Transaction, block_index: Option<u64>) -> Result<i64, StorageError> {
    let signature = tx
        .signature
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let data = serde_json::to_string(&tx.data)?;
    conn.execute(
        "INSERT INTO transactions (from_address, to_address, amount, timestamp, block_index, signature, data, pending, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, strftime('%s','now'))",
        params![
            tx.from.map(|a| a.to_hex()),
            tx.to.to_hex(),
            tx.amount.to_string(),
            tx.timestamp as i64,
            block_index.map(|i| i as i64),
            signature,
            data,
            block_index.is_none() as i64,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrochain_common::transaction::TxPayload;
    use rust_decimal::Decimal;

    fn addr(n: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = n;
        Address::new(bytes)
    }

    #[tokio::test]
    async fn round_trips_block_and_pending_tx() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.sqlite");
        let store = SqlStore::open(db_path.to_str().unwrap()).unwrap();

        let tx = Transaction {
            from: None,
            to: addr(1),
            amount: Decimal::from(5),
            timestamp: 42,
            data: TxPayload::Transfer,
            signature: None,
            id: None,
        };
        let stored = store.save_transaction(&tx, None).await.unwrap();
        assert!(stored.id.is_some());
        assert_eq!(store.get_pending_transactions().await.unwrap().len(), 1);

        let block = Block {
            index: 0,
            timestamp: 1,
            previous_hash: Hash::zero(),
            transactions: vec![tx],
            nonce: 3,
            difficulty: 2,
            hash: Hash::zero(),
        };
        store.save_block(&block).await.unwrap();
        let fetched = store.get_block(0).await.unwrap().unwrap();
        assert_eq!(fetched.transactions.len(), 1);
        assert_eq!(store.get_latest_block().await.unwrap().unwrap().index, 0);
    }
}
