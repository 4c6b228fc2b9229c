use clap::Parser;
use ferrochain_common::config::{PremineConfig, TokenomicsConfig, DEFAULT_MAX_SUPPLY, RECOMMENDED_DIFFICULTY};
use ferrochain_common::crypto::Address;
use ferrochain_storage::backends::remote::RemoteDocumentStoreConfig;
use serde::Deserialize;

/// Layered configuration: CLI flags override a TOML file, which overrides
/// the defaults below. Mirrors the source system's `projectId`/`dbPath`/
/// `miningReward` style keys (SPEC_FULL §2, §6 [AMBIENT]).
#[derive(Parser, Debug)]
#[command(name = "ferrochain-node", about = "Run a Ferrochain ledger node")]
pub struct Cli {
    /// Path to a TOML config file layered underneath these flags.
    #[arg(long)]
    pub config: Option<String>,

    #[arg(long)]
    pub bind_address: Option<String>,
    #[arg(long)]
    pub api_key: Option<String>,
    #[arg(long)]
    pub threads: Option<usize>,

    #[arg(long)]
    pub use_remote_store: Option<bool>,
    #[arg(long)]
    pub project_id: Option<String>,
    #[arg(long)]
    pub backup_project_id: Option<String>,
    #[arg(long)]
    pub backup_key_filename: Option<String>,
    #[arg(long)]
    pub remote_base_url: Option<String>,
    #[arg(long)]
    pub remote_collection_prefix: Option<String>,
    #[arg(long)]
    pub db_path: Option<String>,

    #[arg(long)]
    pub mining_reward: Option<u64>,
    #[arg(long)]
    pub difficulty: Option<u32>,
    #[arg(long)]
    pub halving_interval: Option<u64>,
    #[arg(long)]
    pub max_supply: Option<u64>,
    #[arg(long)]
    pub auto_mine: Option<bool>,

    #[arg(long)]
    pub founder_address: Option<Address>,
    #[arg(long)]
    pub founder_premine: Option<u64>,
    #[arg(long)]
    pub treasury_address: Option<Address>,
    #[arg(long)]
    pub treasury_premine: Option<u64>,
    #[arg(long)]
    pub liquidity_pool_address: Option<Address>,
    #[arg(long)]
    pub liquidity_pool_premine: Option<u64>,

    #[arg(long)]
    pub log_level: Option<String>,
    #[arg(long)]
    pub logs_path: Option<String>,
}

/// The TOML-file shape. Every field optional so a partial file only
/// overrides what it names; unset fields fall through to [`NodeConfig::defaults`].
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub bind_address: Option<String>,
    pub api_key: Option<String>,
    pub threads: Option<usize>,
    pub use_remote_store: Option<bool>,
    pub project_id: Option<String>,
    pub backup_project_id: Option<String>,
    pub backup_key_filename: Option<String>,
    pub remote_base_url: Option<String>,
    pub remote_collection_prefix: Option<String>,
    pub db_path: Option<String>,
    pub mining_reward: Option<u64>,
    pub difficulty: Option<u32>,
    pub halving_interval: Option<u64>,
    pub max_supply: Option<u64>,
    pub auto_mine: Option<bool>,
    pub founder_address: Option<Address>,
    pub founder_premine: Option<u64>,
    pub treasury_address: Option<Address>,
    pub treasury_premine: Option<u64>,
    pub liquidity_pool_address: Option<Address>,
    pub liquidity_pool_premine: Option<u64>,
    pub log_level: Option<String>,
    pub logs_path: Option<String>,
}

/// The fully-resolved configuration the rest of `node` consumes.
pub struct NodeConfig {
    pub bind_address: String,
    pub api_key: String,
    pub threads: usize,
    pub use_remote_store: bool,
    pub remote: Option<RemoteDocumentStoreConfig>,
    pub db_path: String,
    pub tokenomics: TokenomicsConfig,
    pub difficulty: u32,
    pub auto_mine: bool,
    pub premine: PremineConfig,
    pub log_level: String,
    pub logs_path: String,
}

impl NodeConfig {
    /// Reads `--config` (if given), then layers `cli` on top field-by-field
    /// (CLI always wins), filling anything still unset with a hardcoded
    /// default (SPEC_FULL §2 [AMBIENT]).
    pub fn resolve(cli: Cli) -> anyhow::Result<Self> {
        let file = match &cli.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                toml::from_str(&raw)?
            }
            None => FileConfig::default(),
        };

        macro_rules! pick {
            ($field:ident, $default:expr) => {
                cli.$field.or(file.$field).unwrap_or($default)
            };
        }

        let founder_address = pick!(founder_address, "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".parse().unwrap());
        let treasury_address = pick!(treasury_address, "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb".parse().unwrap());
        let liquidity_pool_address = pick!(liquidity_pool_address, "0xcccccccccccccccccccccccccccccccccccccccc".parse().unwrap());
        let use_remote_store = pick!(use_remote_store, false);
        let project_id = cli.project_id.or(file.project_id);
        let backup_key_filename = cli.backup_key_filename.or(file.backup_key_filename);

        let remote = if use_remote_store {
            match project_id {
                Some(project_id) => {
                    let api_key = std::env::var("FERROCHAIN_REMOTE_API_KEY").unwrap_or_default();
                    let backup_project_id = cli.backup_project_id.or(file.backup_project_id);
                    let backup_api_key = match &backup_key_filename {
                        Some(path) => Some(std::fs::read_to_string(path)?.trim().to_string()),
                        None => None,
                    };
                    Some(RemoteDocumentStoreConfig {
                        base_url: pick!(remote_base_url, "https://firestore.googleapis.com/v1".to_string()),
                        project_id,
                        collection_prefix: pick!(remote_collection_prefix, "ferrochain_".to_string()),
                        api_key,
                        backup_project_id,
                        backup_api_key,
                    })
                }
                None => None,
            }
        } else {
            None
        };

        Ok(NodeConfig {
            bind_address: pick!(bind_address, "127.0.0.1:8080".to_string()),
            api_key: pick!(api_key, String::new()),
            threads: pick!(threads, num_cpus()),
            use_remote_store,
            remote,
            db_path: pick!(db_path, "ferrochain.sqlite".to_string()),
            tokenomics: TokenomicsConfig {
                initial_reward: pick!(mining_reward, 100),
                halving_interval: pick!(halving_interval, 210_000),
                max_supply: pick!(max_supply, DEFAULT_MAX_SUPPLY),
            },
            difficulty: pick!(difficulty, RECOMMENDED_DIFFICULTY),
            auto_mine: pick!(auto_mine, false),
            premine: PremineConfig {
                founder_address,
                founder_premine: pick!(founder_premine, 1_000_000),
                treasury_address,
                treasury_premine: pick!(treasury_premine, 2_000_000),
                liquidity_pool_address,
                liquidity_pool_premine: pick!(liquidity_pool_premine, 1_000_000),
            },
            log_level: pick!(log_level, "info".to_string()),
            logs_path: pick!(logs_path, "logs/".to_string()),
        })
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}
