//! Block-sync experiment CLI.
//!
//! Runs Byzantine block-recovery experiments over localhost TCP with
//! simulated wide-area delay and bandwidth.
//!
//! # Example
//!
//! ```bash
//! # One RS recovery session: 10 nodes, 3 silent Byzantine peers
//! blocksync-sim --nodes 10 --faulty 3 --mode rs
//!
//! # Compare LT at a larger scale with network realism
//! blocksync-sim -n 40 -f 4 --mode lt --delay-ms 50 --bandwidth 1250000
//!
//! # Sweep the (N, f, missing-blocks) grid
//! blocksync-sim --sweep
//! ```

use blocksync_net::NetworkProfile;
use blocksync_node::SyncMode;
use blocksync_simulator::{Experiment, ExperimentConfig, ExperimentError};
use clap::Parser;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Byzantine block synchronization testbed.
#[derive(Parser, Debug)]
#[command(name = "blocksync-sim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Total nodes (node 0 is the lagging requester)
    #[arg(short = 'n', long, default_value = "10")]
    nodes: u32,

    /// Maximum faulty peers f (silent Byzantine)
    #[arg(short = 'f', long, default_value = "3")]
    faulty: u32,

    /// Data shards K; defaults to N - f
    #[arg(short = 'k', long)]
    data_shards: Option<u32>,

    /// Recovery strategy: whole-block | rs | lt
    #[arg(short = 'm', long, default_value = "rs")]
    mode: String,

    /// Number of missing blocks to recover
    #[arg(short = 'b', long, default_value = "1")]
    blocks: u32,

    /// Transactions per block
    #[arg(short = 't', long, default_value = "1000")]
    txns: usize,

    /// Fixed one-way network delay in milliseconds
    #[arg(long, default_value = "0")]
    delay_ms: u64,

    /// Link bandwidth in bytes per second (0 = unlimited)
    #[arg(long, default_value = "0")]
    bandwidth: u64,

    /// Per-request read deadline in seconds
    #[arg(long, default_value = "20")]
    read_deadline: u64,

    /// First TCP port of the cluster
    #[arg(long, default_value = "8000")]
    base_port: u16,

    /// Random seed
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Run the full (N, f, missing-blocks) sweep instead of a single run
    #[arg(long)]
    sweep: bool,
}

fn parse_mode(s: &str) -> SyncMode {
    match s {
        "whole-block" | "wholeblock" | "wb" => SyncMode::WholeBlock,
        "rs" => SyncMode::Rs,
        "lt" => SyncMode::Lt,
        other => {
            eprintln!("unknown mode '{other}', expected whole-block | rs | lt");
            std::process::exit(2);
        }
    }
}

fn base_config(args: &Args) -> ExperimentConfig {
    let mut config = ExperimentConfig::new(args.nodes, args.faulty)
        .with_mode(parse_mode(&args.mode))
        .with_missing_blocks(args.blocks)
        .with_txns_per_block(args.txns)
        .with_network(NetworkProfile::new(
            Duration::from_millis(args.delay_ms),
            args.bandwidth,
        ))
        .with_read_deadline(Duration::from_secs(args.read_deadline))
        .with_base_port(args.base_port)
        .with_seed(args.seed);
    config.data_shards = args.data_shards;
    config
}

async fn run_single(args: &Args) -> Result<(), ExperimentError> {
    let experiment = Experiment::new(base_config(args))?;
    let report = experiment.run().await?;
    report.print_summary();
    Ok(())
}

/// The reference sweep: every mode across a grid of populations, fault
/// budgets, and missing-block runs.
async fn run_sweep(args: &Args) -> Result<(), ExperimentError> {
    let grid_nodes = [10u32, 20, 40];
    let grid_faulty = [1u32, 3];
    let grid_blocks = [1u32, 5];
    let modes = [SyncMode::WholeBlock, SyncMode::Rs, SyncMode::Lt];

    let mut port = args.base_port;
    for &nodes in &grid_nodes {
        for &faulty in &grid_faulty {
            if 3 * faulty + 1 > nodes {
                continue;
            }
            for &blocks in &grid_blocks {
                for &mode in &modes {
                    let config = ExperimentConfig::new(nodes, faulty)
                        .with_mode(mode)
                        .with_missing_blocks(blocks)
                        .with_txns_per_block(args.txns)
                        .with_network(NetworkProfile::new(
                            Duration::from_millis(args.delay_ms),
                            args.bandwidth,
                        ))
                        .with_read_deadline(Duration::from_secs(args.read_deadline))
                        .with_base_port(port)
                        .with_seed(args.seed);
                    // Fresh port range per run so lingering sockets from the
                    // previous cluster cannot collide.
                    port = port.wrapping_add(nodes as u16 + 16);

                    info!(nodes, faulty, blocks, mode = mode.as_str(), "sweep point");
                    let report = Experiment::new(config)?.run().await?;
                    report.print_summary();
                    println!();
                }
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,blocksync_simulator=info")),
        )
        .init();

    let args = Args::parse();

    let result = if args.sweep {
        run_sweep(&args).await
    } else {
        run_single(&args).await
    };

    if let Err(err) = result {
        eprintln!("experiment failed: {err}");
        std::process::exit(1);
    }
}
