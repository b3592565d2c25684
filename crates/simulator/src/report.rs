//! Experiment results.

use blocksync_node::{SessionOutcome, SessionReport};
use std::time::Duration;

/// Flattened view of one recovery session.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub block_id: i64,
    pub succeeded: bool,
    pub failure: Option<String>,
    pub duration: Duration,
    pub bytes_recovered: u64,
    pub bytes_received: u64,
    pub verified_chunks: u64,
    pub failed_chunks: u64,
    pub retries: u64,
    pub verification_time: Duration,
}

impl From<&SessionReport> for SessionSummary {
    fn from(report: &SessionReport) -> Self {
        let (succeeded, failure, bytes_recovered) = match &report.outcome {
            SessionOutcome::Done { bytes } => (true, None, *bytes as u64),
            SessionOutcome::Failed { kind } => (false, Some(kind.to_string()), 0),
        };
        Self {
            block_id: report.block_id.0,
            succeeded,
            failure,
            duration: report.metrics.total_duration(),
            bytes_recovered,
            bytes_received: report.metrics.bytes_received,
            verified_chunks: report.metrics.verified_chunks,
            failed_chunks: report.metrics.failed_chunks,
            retries: report.metrics.retries,
            verification_time: report.metrics.verification_time,
        }
    }
}

/// Aggregated results of one experiment run.
#[derive(Debug, Clone)]
pub struct ExperimentReport {
    pub num_nodes: u32,
    pub max_faulty: u32,
    pub data_shards: u32,
    pub mode: &'static str,
    pub sessions: Vec<SessionSummary>,
    pub wall_clock: Duration,
}

impl ExperimentReport {
    pub fn succeeded(&self) -> usize {
        self.sessions.iter().filter(|s| s.succeeded).count()
    }

    pub fn total_bytes_received(&self) -> u64 {
        self.sessions.iter().map(|s| s.bytes_received).sum()
    }

    /// Mean session duration across all sessions.
    pub fn mean_session_duration(&self) -> Duration {
        if self.sessions.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.sessions.iter().map(|s| s.duration).sum();
        total / self.sessions.len() as u32
    }

    /// Print a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("=== recovery experiment ===");
        println!(
            "nodes={} faulty={} data_shards={} mode={}",
            self.num_nodes, self.max_faulty, self.data_shards, self.mode
        );
        println!(
            "sessions: {}/{} recovered, mean {:.1} ms, wall clock {:.1} ms",
            self.succeeded(),
            self.sessions.len(),
            self.mean_session_duration().as_secs_f64() * 1e3,
            self.wall_clock.as_secs_f64() * 1e3,
        );
        for s in &self.sessions {
            match &s.failure {
                None => println!(
                    "  block {:>4}: ok    {:>8.1} ms  {:>10} B recovered  {:>10} B on wire  {} verified / {} failed / {} retries",
                    s.block_id,
                    s.duration.as_secs_f64() * 1e3,
                    s.bytes_recovered,
                    s.bytes_received,
                    s.verified_chunks,
                    s.failed_chunks,
                    s.retries,
                ),
                Some(kind) => println!(
                    "  block {:>4}: FAIL  {:>8.1} ms  {kind}",
                    s.block_id,
                    s.duration.as_secs_f64() * 1e3,
                ),
            }
        }
    }
}
