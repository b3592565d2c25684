//! Per-session synchronization metrics.

use std::time::{Duration, Instant};

/// Counters and timings for one recovery session.
///
/// Updated under the session mutex; every update is O(1).
#[derive(Debug, Clone)]
pub struct SyncMetrics {
    started_at: Instant,
    finished_at: Option<Instant>,
    /// Responses received, verified or not.
    pub total_chunks: u64,
    /// Responses that verified and were inserted.
    pub verified_chunks: u64,
    /// Responses rejected (proof, framing, transport, conflict).
    pub failed_chunks: u64,
    /// Failover attempts onto replacement peers.
    pub retries: u64,
    /// Payload bytes received across all peers.
    pub bytes_received: u64,
    /// CPU time spent in proof verification.
    pub verification_time: Duration,
}

impl SyncMetrics {
    pub fn start() -> Self {
        Self {
            started_at: Instant::now(),
            finished_at: None,
            total_chunks: 0,
            verified_chunks: 0,
            failed_chunks: 0,
            retries: 0,
            bytes_received: 0,
            verification_time: Duration::ZERO,
        }
    }

    pub fn record_response(&mut self, bytes: usize) {
        self.total_chunks += 1;
        self.bytes_received += bytes as u64;
    }

    pub fn record_verified(&mut self) {
        self.verified_chunks += 1;
    }

    pub fn record_failed(&mut self) {
        self.failed_chunks += 1;
    }

    pub fn record_retry(&mut self) {
        self.retries += 1;
    }

    pub fn record_verification_time(&mut self, elapsed: Duration) {
        self.verification_time += elapsed;
    }

    /// Stamp the end of the session (idempotent).
    pub fn finish(&mut self) {
        if self.finished_at.is_none() {
            self.finished_at = Some(Instant::now());
        }
    }

    /// Wall-clock duration, up to now if the session is still running.
    pub fn total_duration(&self) -> Duration {
        self.finished_at
            .unwrap_or_else(Instant::now)
            .duration_since(self.started_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let mut m = SyncMetrics::start();
        m.record_response(100);
        m.record_response(50);
        m.record_verified();
        m.record_failed();
        m.record_retry();
        assert_eq!(m.total_chunks, 2);
        assert_eq!(m.bytes_received, 150);
        assert_eq!(m.verified_chunks, 1);
        assert_eq!(m.failed_chunks, 1);
        assert_eq!(m.retries, 1);
    }

    #[test]
    fn test_finish_is_idempotent() {
        let mut m = SyncMetrics::start();
        m.finish();
        let d1 = m.total_duration();
        std::thread::sleep(Duration::from_millis(5));
        m.finish();
        assert_eq!(m.total_duration(), d1);
    }
}
