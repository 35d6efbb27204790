// SPDX-License-Identifier: Apache-2.0

//! Daemon entry point: CLI parsing, tracing setup, and core wiring.
//!
//! The external collaborators (P2P gossip, mempool, RPC surface, the L2
//! provider) plug in around the core built here: the persistent rewards
//! ledger, the BLS signing endpoints, and the pulse worker.

use clap::Parser;
use oxen_config::ChainConfig;
use oxen_rewards::RewardsLedger;
use oxen_storage::RedbDatabase;
use oxen_types::NetworkType;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "oxend", about = "Oxen service-node daemon", version)]
struct Cli {
    /// Network to join.
    #[arg(long, default_value = "mainnet")]
    network: NetworkType,

    /// Data directory for the ledger database.
    #[arg(long, default_value = "oxen-data")]
    data_dir: PathBuf,

    /// Log filter, e.g. `info` or `oxen::ledger=trace,info`.
    #[arg(long, default_value = "info")]
    log: String,
}

fn init_tracing(filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log);

    let config = ChainConfig::for_network(cli.network);
    info!(target: "oxend", network = %config.network, "starting oxend");

    std::fs::create_dir_all(&cli.data_dir)?;
    let db = RedbDatabase::open(cli.data_dir.join("rewards.redb"))?;
    let ledger = RewardsLedger::open(db, config.clone())?;
    info!(target: "oxend", height = ledger.height(), "rewards ledger ready");

    // The pulse worker and BLS endpoints come up once the service-node
    // collaborators (quorum bus, SN list, chain storage) register their
    // seams; until then the daemon idles on the ledger.
    tokio::signal::ctrl_c().await?;
    info!(target: "oxend", "shutting down");
    Ok(())
}
