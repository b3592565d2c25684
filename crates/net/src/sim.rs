//! Simulated network conditions.
//!
//! Experiments run over loopback TCP, which is effectively free; the profile
//! reintroduces wide-area costs as deterministic sleeps: a fixed one-way
//! propagation delay plus a transfer time proportional to bytes/bandwidth.
//! The same profile is applied on both the upload and download side of a
//! transfer.

use std::time::Duration;

/// Delay and bandwidth model for one direction of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkProfile {
    /// Fixed one-way propagation delay.
    pub delay: Duration,
    /// Link bandwidth in bytes per second. Zero disables throttling.
    pub bandwidth_bps: u64,
}

impl NetworkProfile {
    /// A profile with no delay and no bandwidth cap (unit tests).
    pub const UNLIMITED: NetworkProfile = NetworkProfile {
        delay: Duration::ZERO,
        bandwidth_bps: 0,
    };

    pub fn new(delay: Duration, bandwidth_bps: u64) -> Self {
        Self {
            delay,
            bandwidth_bps,
        }
    }

    /// Total simulated time to move `bytes` across the link.
    pub fn transfer_delay(&self, bytes: usize) -> Duration {
        let transfer = if self.bandwidth_bps == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(bytes as f64 / self.bandwidth_bps as f64)
        };
        self.delay + transfer
    }

    /// Sleep for the simulated transfer time of `bytes`.
    pub async fn throttle(&self, bytes: usize) {
        let wait = self.transfer_delay(bytes);
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }
}

impl Default for NetworkProfile {
    fn default() -> Self {
        // 300 ms delay, 1.25 MB/s upload: the reference experiment setup.
        Self {
            delay: Duration::from_millis(300),
            bandwidth_bps: 1_250_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_delay_scales_with_bytes() {
        let profile = NetworkProfile::new(Duration::from_millis(100), 1_000_000);
        assert_eq!(
            profile.transfer_delay(500_000),
            Duration::from_millis(100) + Duration::from_millis(500)
        );
    }

    #[test]
    fn test_zero_bandwidth_means_no_throttle() {
        let profile = NetworkProfile::new(Duration::from_millis(5), 0);
        assert_eq!(profile.transfer_delay(1 << 30), Duration::from_millis(5));
    }

    #[test]
    fn test_unlimited_profile_is_free() {
        assert_eq!(
            NetworkProfile::UNLIMITED.transfer_delay(12345),
            Duration::ZERO
        );
    }
}
