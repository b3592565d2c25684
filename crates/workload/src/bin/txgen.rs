//! Transaction set pre-generator.
//!
//! Writes `eth_transactions.json` and `btc_transactions.json` (arrays of
//! realistic transfer records) plus an optional big-integer fixture file.
//!
//! # Example
//!
//! ```bash
//! blocksync-txgen --count 1000000 --out-dir ./data
//! blocksync-txgen --count 1000 --big-integers 64 --big-integer-bits 256
//! ```

use blocksync_workload::records;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Pre-generate transaction record sets for sync experiments.
#[derive(Parser, Debug)]
#[command(name = "blocksync-txgen")]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of records per set
    #[arg(short = 'c', long, default_value = "1000000")]
    count: usize,

    /// Output directory
    #[arg(short = 'o', long, default_value = ".")]
    out_dir: PathBuf,

    /// Random seed
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Also write this many random big integers (0 = skip)
    #[arg(long, default_value = "0")]
    big_integers: usize,

    /// Bit size of each big integer
    #[arg(long, default_value = "256")]
    big_integer_bits: usize,
}

fn main() -> Result<(), records::RecordError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let eth_path = args.out_dir.join("eth_transactions.json");
    info!(count = args.count, path = %eth_path.display(), "Writing ETH records");
    records::write_records(&eth_path, &records::eth_records(args.count, args.seed))?;

    let btc_path = args.out_dir.join("btc_transactions.json");
    info!(count = args.count, path = %btc_path.display(), "Writing BTC records");
    records::write_records(&btc_path, &records::btc_records(args.count, args.seed))?;

    if args.big_integers > 0 {
        let path = args.out_dir.join("big_integers.json");
        info!(
            count = args.big_integers,
            bits = args.big_integer_bits,
            path = %path.display(),
            "Writing big-integer fixtures"
        );
        records::write_big_integers(&path, args.big_integers, args.big_integer_bits, args.seed)?;
    }

    info!("Done");
    Ok(())
}
