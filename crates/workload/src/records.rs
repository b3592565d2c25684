//! Pre-generated transaction record sets.
//!
//! The harness reads realistic payloads from `eth_transactions.json` and
//! `btc_transactions.json`; this module generates them. A separate helper
//! writes N random big integers for cryptographic fixtures.

use rand::distributions::Alphanumeric;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Errors writing record files.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One Ethereum-style transfer record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EthRecord {
    pub from: String,
    pub to: String,
    pub value: f64,
    pub gas_price: f64,
    pub nonce: u64,
}

/// One Bitcoin-style transaction record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BtcRecord {
    pub txid: String,
    pub vin: Vec<BtcInput>,
    pub vout: Vec<BtcOutput>,
    pub fee: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BtcInput {
    pub txid: String,
    pub vout: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BtcOutput {
    pub value: f64,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: String,
}

fn eth_address(rng: &mut impl Rng) -> String {
    format!("0x{:040x}", rng.gen::<u64>() as u128)
}

fn btc_address(rng: &mut impl Rng) -> String {
    let tail: String = rng
        .sample_iter(&Alphanumeric)
        .take(33)
        .map(char::from)
        .collect();
    format!("1{tail}")
}

/// Generate `count` ETH records under a fixed seed.
pub fn eth_records(count: usize, seed: u64) -> Vec<EthRecord> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| EthRecord {
            from: eth_address(&mut rng),
            to: eth_address(&mut rng),
            value: rng.gen::<f64>() * 100.0,
            gas_price: rng.gen::<f64>() * 100.0,
            nonce: rng.gen(),
        })
        .collect()
}

/// Generate `count` BTC records under a fixed seed.
pub fn btc_records(count: usize, seed: u64) -> Vec<BtcRecord> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let vin_count = rng.gen_range(1..=5);
            let vout_count = rng.gen_range(1..=5);
            let vin = (0..vin_count)
                .map(|_| BtcInput {
                    txid: format!("{:016x}", rng.gen::<u64>()),
                    vout: rng.gen_range(0..100),
                })
                .collect();
            let vout = (0..vout_count)
                .map(|_| BtcOutput {
                    value: rng.gen::<f64>() * 10.0,
                    script_pub_key: btc_address(&mut rng),
                })
                .collect();
            BtcRecord {
                txid: format!("{:016x}", rng.gen::<u64>()),
                vin,
                vout,
                fee: rng.gen(),
            }
        })
        .collect()
}

/// Write any serializable record set as a single JSON array.
pub fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<(), RecordError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, records)?;
    writer.flush()?;
    Ok(())
}

/// Write `count` random big integers of `bits` bits as decimal strings.
pub fn write_big_integers(
    path: &Path,
    count: usize,
    bits: usize,
    seed: u64,
) -> Result<(), RecordError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let values: Vec<String> = (0..count)
        .map(|_| {
            // Build the decimal form from 32-bit limbs; exact bit width is
            // not required, only magnitude.
            let limbs = bits.div_ceil(32);
            let mut digits = String::new();
            for _ in 0..limbs {
                digits.push_str(&format!("{:010}", rng.gen::<u32>()));
            }
            digits.trim_start_matches('0').to_string()
        })
        .map(|s| if s.is_empty() { "0".into() } else { s })
        .collect();
    write_records(path, &values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_generation_is_seeded() {
        assert_eq!(eth_records(5, 42), eth_records(5, 42));
        assert_ne!(eth_records(5, 42), eth_records(5, 43));
        assert_eq!(btc_records(5, 42), btc_records(5, 42));
    }

    #[test]
    fn test_eth_file_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("eth_transactions.json");
        let records = eth_records(10, 1);
        write_records(&path, &records).unwrap();

        let parsed: Vec<EthRecord> =
            serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        assert_eq!(parsed, records);
    }

    #[test]
    fn test_btc_record_shape() {
        let records = btc_records(20, 9);
        for r in &records {
            assert!((1..=5).contains(&r.vin.len()));
            assert!((1..=5).contains(&r.vout.len()));
            assert!(r.vout.iter().all(|o| o.script_pub_key.starts_with('1')));
        }
    }

    #[test]
    fn test_big_integers_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bigints.json");
        write_big_integers(&path, 8, 256, 7).unwrap();
        let parsed: Vec<String> =
            serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        assert_eq!(parsed.len(), 8);
        assert!(parsed.iter().all(|s| s.chars().all(|c| c.is_ascii_digit())));
    }
}
