//! tinyledger CLI
//!
//! Runs a standalone mining node with JSON snapshot persistence, or
//! inspects a stored chain.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tinyledger::chain::{ChainStore, MemoryStore, SnapshotFile};
use tinyledger::config::ChainParams;
use tinyledger::crypto::KeyPair;
use tinyledger::mining::{Miner, RewardBlockbase, UnconfirmedPool};
use tinyledger::network::NullNetwork;
use tinyledger::node::{
    BlockVerifier, Node, PoolCoverageRule, PositiveAmountRule, SingleBlockbaseRule,
};

#[derive(Parser)]
#[command(name = "tinyledger")]
#[command(version = "0.1.0")]
#[command(about = "A peer-to-peer proof-of-work ledger node", long_about = None)]
struct Cli {
    /// Data directory for chain snapshots
    #[arg(short, long, default_value = ".ledger_data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a standalone mining node
    Run {
        /// Mine a genesis block if no chain exists yet
        #[arg(long)]
        genesis: bool,

        /// Override the genesis difficulty budget
        #[arg(long)]
        difficulty: Option<u32>,

        /// Override the number of consensus workers
        #[arg(long)]
        workers: Option<usize>,

        /// Coinbase reward per mined block
        #[arg(long, default_value = "50")]
        reward: u64,

        /// Seconds between snapshot saves
        #[arg(long, default_value = "30")]
        save_interval: u64,
    },

    /// Print statistics for the stored chain
    Stats,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();
    let snapshot = SnapshotFile::new(cli.data_dir.join("chain.json"));

    match cli.command {
        Commands::Run {
            genesis,
            difficulty,
            workers,
            reward,
            save_interval,
        } => {
            let mut params = ChainParams::default();
            if let Some(d) = difficulty {
                params.genesis_difficulty = d;
            }
            if let Some(w) = workers {
                params.consensus_workers = w;
            }

            let store = Arc::new(if snapshot.exists() {
                log::info!("loading chain snapshot from {:?}", snapshot.path());
                snapshot.load()?
            } else {
                log::info!("starting with an empty chain");
                MemoryStore::new()
            });

            let pool = Arc::new(UnconfirmedPool::new());
            let verifier = BlockVerifier::new()
                .with_block_rule(Arc::new(SingleBlockbaseRule))
                .with_block_rule(Arc::new(PoolCoverageRule::new(
                    pool.clone(),
                    params.pool_coverage,
                )))
                .with_transaction_rule(Arc::new(PositiveAmountRule));

            let node = Arc::new(Node::new(
                params,
                store.clone() as Arc<dyn ChainStore>,
                pool,
                verifier,
                Arc::new(NullNetwork),
            ));

            let blockbase = Arc::new(RewardBlockbase::new(KeyPair::generate(), reward));
            let miner = Arc::new(Miner::new(node, blockbase, genesis));

            let mining = {
                let miner = miner.clone();
                tokio::spawn(async move { miner.run().await })
            };

            let mut saves = tokio::time::interval(Duration::from_secs(save_interval.max(1)));
            saves.tick().await; // the first tick completes immediately

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    _ = saves.tick() => {
                        if let Err(e) = snapshot.save(&store) {
                            log::warn!("snapshot save failed: {}", e);
                        }
                    }
                }
            }

            log::info!("shutting down");
            miner.stop();
            mining.await?;
            snapshot.save(&store)?;
        }

        Commands::Stats => {
            let store = snapshot.load()?;
            match store.best_header() {
                Some(best) => {
                    println!("height:     {}", best.height);
                    println!("tip:        {}", best.id);
                    println!("difficulty: {}", best.difficulty);
                    println!("timestamp:  {}", best.timestamp);
                }
                None => println!("chain is empty"),
            }
        }
    }

    Ok(())
}
