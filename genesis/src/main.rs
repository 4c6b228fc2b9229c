//! Renders the genesis block a fresh node would produce for a given premine
//! configuration, so an operator can diff it against what actually lands on
//! disk before pointing real traffic at a node.

use clap::Parser;
use ferrochain_common::config::PremineConfig;
use ferrochain_common::crypto::Address;

#[derive(Parser, Debug)]
#[command(name = "ferrochain-genesis", about = "Render the configured genesis block as JSON")]
struct Cli {
    #[arg(long, default_value = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")]
    founder_address: Address,
    #[arg(long, default_value_t = 1_000_000)]
    founder_premine: u64,

    #[arg(long, default_value = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb")]
    treasury_address: Address,
    #[arg(long, default_value_t = 2_000_000)]
    treasury_premine: u64,

    #[arg(long, default_value = "0xcccccccccccccccccccccccccccccccccccccccc")]
    liquidity_pool_address: Address,
    #[arg(long, default_value_t = 1_000_000)]
    liquidity_pool_premine: u64,
}

fn main() {
    let cli = Cli::parse();
    let premine = PremineConfig {
        founder_address: cli.founder_address,
        founder_premine: cli.founder_premine,
        treasury_address: cli.treasury_address,
        treasury_premine: cli.treasury_premine,
        liquidity_pool_address: cli.liquidity_pool_address,
        liquidity_pool_premine: cli.liquidity_pool_premine,
    };

    let block = ferrochain_core::build_genesis_block(&premine);
    let rendered = serde_json::to_string_pretty(&block).expect("genesis block always serializes");
    println!("{rendered}");
    eprintln!("genesis hash: {}", block.hash);
}
