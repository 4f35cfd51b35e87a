//! Nebulink validator node.
//!
//! Bootstraps the ledger application and the operator RPC: loads the TOML
//! configuration and the validator key, opens storage, builds the
//! application, and serves `/vote` and `/setNebula` until interrupted.
//! The BFT consensus engine attaches through the `Application` trait.
//!
//! # Usage
//!
//! ```bash
//! # Start with a configuration file
//! nebulink-node --config node.toml
//!
//! # Override the data directory and RPC address
//! nebulink-node --config node.toml --data-dir /var/lib/nebulink --rpc-addr 127.0.0.1:2500
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use nebulink_ledger::{Application, LedgerApp, LedgerDb, Scheduler, CODE_OK};
use nebulink_node::rpc::{RpcServer, RpcServerConfig, RpcState};
use nebulink_node::{init_telemetry, NodeConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Nebulink validator node.
#[derive(Parser, Debug)]
#[command(name = "nebulink-node")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long)]
    config: PathBuf,

    /// Data directory for RocksDB (overrides config).
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Operator RPC listen address (overrides config).
    #[arg(long)]
    rpc_addr: Option<SocketAddr>,

    /// Log level filter (overrides RUST_LOG).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_telemetry(&cli.log_level);

    let mut config = NodeConfig::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    if let Some(data_dir) = cli.data_dir {
        config.node.data_dir = data_dir;
    }
    if let Some(rpc_addr) = cli.rpc_addr {
        config.rpc.listen_addr = rpc_addr;
    }

    let keypair = Arc::new(config.load_keypair().context("loading validator key")?);
    let genesis = config.load_genesis().context("loading genesis")?;
    info!(consul = %keypair.public(), "validator identity loaded");

    let db = LedgerDb::open(&config.node.data_dir).context("opening ledger storage")?;
    let cancel = CancellationToken::new();
    let scheduler = Scheduler::new(keypair.public(), None, cancel.child_token());
    let mut app = LedgerApp::new(db, genesis, scheduler);

    let (tx_sender, mut tx_receiver) = mpsc::channel(1024);
    let rpc = RpcServer::start(
        RpcServerConfig {
            listen_addr: config.rpc.listen_addr,
        },
        RpcState::new(Arc::clone(&keypair), tx_sender),
        cancel.child_token(),
    )
    .await
    .context("starting operator RPC")?;

    // Pre-validate operator transactions while they wait for the engine
    // mempool; the engine takes ownership of the application when attached.
    let drain_cancel = cancel.child_token();
    let drain = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = drain_cancel.cancelled() => break,
                received = tx_receiver.recv() => {
                    let Some(tx) = received else { break };
                    let response = app.check_tx(&tx.encode());
                    if response.code == CODE_OK {
                        info!(id = %tx.id, "transaction accepted for the engine mempool");
                    } else {
                        warn!(id = %tx.id, log = %response.log, "transaction rejected");
                    }
                }
            }
        }
    });

    signal::ctrl_c().await.context("waiting for shutdown signal")?;
    info!("shutting down");
    cancel.cancel();
    rpc.stopped().await;
    let _ = drain.await;
    Ok(())
}
