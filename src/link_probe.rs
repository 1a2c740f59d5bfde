//! Link probe collaborator
//!
//! The analysis worker measures the established network through this seam:
//! latency pings, channel-congestion scoring over a scan snapshot, and
//! one-second throughput steps. The measurement internals (ICMP, iPerf wire
//! protocol, scoring math) live behind the trait; the worker only sequences
//! jobs and reports results.
//!
//! [`SyntheticProbe`] is the backend for host demos and tests. Hardware
//! embeddings swap in their own backend here the same way the WiFi device
//! backends are selected.

use heapless::String;
use rand_core::RngCore;
use rand_core::SeedableRng;
use rand_wyrand::WyRand;

use crate::wifi_devices::ScanTable;

/// Probe backend used by the spawned analysis worker task.
pub type ActiveLinkProbe = SyntheticProbe;

#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum ProbeError {
    Unreachable,
    Timeout,
}

impl ProbeError {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeError::Unreachable => "host unreachable",
            ProbeError::Timeout => "probe timeout",
        }
    }
}

/// Round-trip statistics over one latency job.
#[derive(Clone)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct LatencyReport {
    pub host: String<64>,
    pub sent: u8,
    pub received: u8,
    pub min_ms: u32,
    pub avg_ms: u32,
    pub max_ms: u32,
    pub jitter_ms: u32,
}

/// Access points per 2.4 GHz channel plus the least-congested pick.
#[derive(Clone, Copy)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct ChannelReport {
    /// Index 0 is channel 1.
    pub occupancy: [u8; 13],
    pub recommended_channel: u8,
}

#[derive(Clone)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct ThroughputReport {
    pub host: String<64>,
    pub port: u16,
    pub seconds: u8,
    pub total_kbytes: u32,
    pub kbits_per_sec: u32,
}

pub trait LinkProbe {
    /// One echo round trip, microseconds.
    async fn ping(&mut self, host: &str) -> Result<u32, ProbeError>;

    /// Scores a scan snapshot into per-channel occupancy.
    fn score_channels(&mut self, table: &ScanTable) -> ChannelReport;

    /// Transfers for roughly one second, returning the bytes moved.
    async fn throughput_step(&mut self, host: &str, port: u16) -> Result<u32, ProbeError>;
}

/// Deterministic-seed synthetic measurements.
pub struct SyntheticProbe {
    rng: WyRand,
    base_rtt_us: u32,
    unreachable: bool,
}

impl SyntheticProbe {
    pub fn new(rng_seed: u64) -> Self {
        SyntheticProbe {
            rng: WyRand::seed_from_u64(rng_seed),
            base_rtt_us: 4_000,
            unreachable: false,
        }
    }

    /// Scripts every subsequent ping/transfer to fail.
    pub fn set_unreachable(&mut self, unreachable: bool) {
        self.unreachable = unreachable;
    }
}

impl LinkProbe for SyntheticProbe {
    async fn ping(&mut self, _host: &str) -> Result<u32, ProbeError> {
        if self.unreachable {
            return Err(ProbeError::Unreachable);
        }
        Ok(self.base_rtt_us + (self.rng.next_u32() % 3_000))
    }

    fn score_channels(&mut self, table: &ScanTable) -> ChannelReport {
        let mut occupancy = [0u8; 13];
        for entry in table {
            if (1..=13).contains(&entry.channel) {
                occupancy[entry.channel as usize - 1] = occupancy[entry.channel as usize - 1].saturating_add(1);
            }
        }
        // Only the non-overlapping channels are candidates.
        let mut recommended = 1u8;
        for &candidate in &[1u8, 6, 11] {
            if occupancy[candidate as usize - 1] < occupancy[recommended as usize - 1] {
                recommended = candidate;
            }
        }
        ChannelReport {
            occupancy,
            recommended_channel: recommended,
        }
    }

    async fn throughput_step(&mut self, _host: &str, _port: u16) -> Result<u32, ProbeError> {
        if self.unreachable {
            return Err(ProbeError::Unreachable);
        }
        Ok(500_000 + (self.rng.next_u32() % 250_000))
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::wifi_devices::{ScanEntry, Security};
    use futures::executor::block_on;

    #[test]
    fn scoring_recommends_the_quietest_nonoverlapping_channel() {
        let mut probe = SyntheticProbe::new(7);
        let mut table = ScanTable::new();
        for channel in [1u8, 1, 6, 6, 6, 13] {
            let mut ssid = heapless::String::new();
            let _ = ssid.push_str("net");
            let _ = table.push(ScanEntry {
                ssid,
                bssid: [0; 6],
                rssi_dbm: -50,
                channel,
                security: Security::Open,
                hidden: false,
            });
        }
        let report = probe.score_channels(&table);
        assert_eq!(report.occupancy[0], 2);
        assert_eq!(report.occupancy[5], 3);
        assert_eq!(report.occupancy[12], 1);
        assert_eq!(report.recommended_channel, 11);
    }

    #[test]
    fn unreachable_host_fails_pings() {
        let mut probe = SyntheticProbe::new(7);
        block_on(async {
            assert!(probe.ping("10.0.0.1").await.is_ok());
            probe.set_unreachable(true);
            assert_eq!(probe.ping("10.0.0.1").await, Err(ProbeError::Unreachable));
        });
    }
}
