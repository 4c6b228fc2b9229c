//! Ferrochain reference wallet: a CLI stand-in for the browser wallet named
//! as an external collaborator in §1. Generates a secp256k1 keypair, signs
//! the canonical transfer payload of §3 locally, and submits it to a
//! running node. The node never sees a private key.

mod client;
mod keys;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ferrochain_common::crypto::Address;
use ferrochain_common::time::now_millis;
use ferrochain_common::transaction::TxPayload;
use log::info;
use rust_decimal::Decimal;

use client::NodeClient;
use keys::Keypair;

#[derive(Parser, Debug)]
#[command(name = "ferrochain-wallet", about = "Generate keys, sign, and submit transactions to a Ferrochain node")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a fresh secp256k1 keypair and print its address and private key.
    Keygen,
    /// Query a node for an address's balance.
    Balance {
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        node: String,
        #[arg(long, default_value = "")]
        api_key: String,
        address: Address,
    },
    /// Sign and submit a transfer from a locally-held private key.
    Send {
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        node: String,
        #[arg(long, default_value = "")]
        api_key: String,
        /// Hex-encoded secp256k1 private key (32 bytes, optional `0x` prefix).
        #[arg(long)]
        private_key: String,
        #[arg(long)]
        to: Address,
        #[arg(long)]
        amount: String,
    },
    /// Ask a node to mine a block, crediting the reward to the given address.
    Mine {
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        node: String,
        #[arg(long, default_value = "")]
        api_key: String,
        #[arg(long)]
        miner_address: Address,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Keygen => {
            let keypair = Keypair::generate();
            println!("address:     {}", keypair.address);
            println!("private_key: {}", keypair.private_key_hex());
            println!("public_key:  0x{}", hex::encode(keypair.public_key_bytes()));
        }
        Command::Balance { node, api_key, address } => {
            let client = NodeClient::new(node, api_key);
            let response = client.balance(&address.to_hex()).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Send { node, api_key, private_key, to, amount } => {
            let amount: Decimal = amount.parse().context("amount is not a valid decimal")?;
            let keypair = Keypair::from_private_key_hex(&private_key).context("loading private key")?;
            let timestamp = now_millis();
            let signature = keypair.sign_transfer(to, amount, timestamp, TxPayload::Transfer)?;
            let body = serde_json::json!({
                "from": keypair.address.to_hex(),
                "to": to.to_hex(),
                "amount": amount,
                "timestamp": timestamp,
                "data": TxPayload::Transfer,
                "signature": signature,
            });
            info!("submitting transfer from {} to {} amount {}", keypair.address, to, amount);
            let client = NodeClient::new(node, api_key);
            let response = client.submit_transaction(body).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Mine { node, api_key, miner_address } => {
            let client = NodeClient::new(node, api_key);
            let response = client.mine(&miner_address.to_hex()).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}

/// Stdout-only logging, no date-rotated file sink — unlike `node` (SPEC_FULL
/// §2 [AMBIENT]), this is a short-lived CLI invocation with nothing to rotate.
fn init_logging() {
    let _ = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("[{} {}] {}", chrono::Local::now().format("%H:%M:%S"), record.level(), message))
        })
        .level(log::LevelFilter::Info)
        .chain(std::io::stderr())
        .apply();
}
