//! WiFi device backends
//!
//! The radio coordinator drives the radio through the [`WifiDevice`] trait;
//! the concrete backend is selected by a cargo feature:
//!
//! - `wifi-device-simulator`: scripted device for host demos and tests,
//!   with injectable failures and link drops
//! - `wifi-device-loopback`: trivially-succeeding device for wiring checks
//!
//! Hardware backends plug in beside these; initialization stays outside the
//! trait because pin and driver setup is implementation-specific.

use heapless::{String, Vec};

use crate::messages::{ApConfig, Credential};

#[cfg(any(feature = "wifi-device-simulator", test))]
pub mod simulator;

#[cfg(any(feature = "wifi-device-simulator", test))]
pub use simulator::SimulatorDevice;

#[cfg(feature = "wifi-device-loopback")]
pub mod loopback;

// The simulator wins when both backend features are enabled, so feature
// unification across a workspace never breaks the build.
#[cfg(feature = "wifi-device-simulator")]
pub use simulator::SimulatorDevice as ActiveWifiDevice;

#[cfg(all(feature = "wifi-device-loopback", not(feature = "wifi-device-simulator")))]
pub use loopback::LoopbackDevice as ActiveWifiDevice;

/// Upper bound on cached scan results, matching typical 2.4 GHz congestion.
pub const MAX_SCAN_ENTRIES: usize = 50;

/// One network seen by a scan.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct ScanEntry {
    pub ssid: String<32>,
    pub bssid: [u8; 6],
    pub rssi_dbm: i8,
    pub channel: u8,
    pub security: Security,
    pub hidden: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum Security {
    Open,
    Wpa2,
    Wpa3,
}

/// Scan cache, replaced wholesale by each completed scan.
pub type ScanTable = Vec<ScanEntry, MAX_SCAN_ENTRIES>;

/// Driver-level failure. Captured as the coordinator's `Error` state and
/// echoed in rejections until an explicit `reset`.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum DeviceFault {
    NetworkNotFound,
    AuthFailed,
    JoinFailed,
    ScanFailed,
    ApStartFailed,
    /// The driver call outlived its timeout.
    Timeout,
    /// An established station link dropped.
    LinkLost,
    Hardware,
}

impl DeviceFault {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceFault::NetworkNotFound => "network not found",
            DeviceFault::AuthFailed => "authentication failed",
            DeviceFault::JoinFailed => "join failed",
            DeviceFault::ScanFailed => "scan failed",
            DeviceFault::ApStartFailed => "AP start failed",
            DeviceFault::Timeout => "driver timeout",
            DeviceFault::LinkLost => "link lost",
            DeviceFault::Hardware => "hardware error",
        }
    }
}

/// Driver seam used by the radio coordinator, the sole caller. One operation
/// runs at a time; the coordinator serializes all access.
pub trait WifiDevice {
    /// Scans for networks. The radio cannot serve an AP while scanning;
    /// mode policing happens in the coordinator, not here.
    async fn scan(&mut self) -> Result<ScanTable, DeviceFault>;

    /// Joins a network, returning the channel on success.
    async fn join(&mut self, ssid: &str, credential: Option<&Credential>) -> Result<u8, DeviceFault>;

    /// Leaves the current network.
    async fn leave(&mut self) -> Result<(), DeviceFault>;

    async fn start_ap(&mut self, config: &ApConfig) -> Result<(), DeviceFault>;

    async fn stop_ap(&mut self) -> Result<(), DeviceFault>;

    /// Non-blocking link probe, polled by the coordinator between commands.
    fn link_up(&self) -> bool;
}
