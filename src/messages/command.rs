//! Structured commands flowing through the task graph.
//!
//! A [`Command`] is one unit of work: a typed verb plus the origin it came
//! from and a correlation id the originator uses to match the eventual
//! response. Commands are constructed only at the trust boundary (command
//! router, analysis worker's internal requests) and are consumed exactly once
//! by the owning task.

use heapless::{String, Vec};
use portable_atomic::{AtomicU32, Ordering};

/// Correlates one submitted command with its single outcome. Never 0; a
/// zeroed id is recognizably invalid.
pub type CorrelationId = u32;

static NEXT_CORRELATION_ID: AtomicU32 = AtomicU32::new(1);

/// Allocates a fresh id. Called wherever a command or a router-local answer
/// is constructed.
pub fn next_correlation_id() -> CorrelationId {
    let mut id = NEXT_CORRELATION_ID.fetch_add(1, Ordering::Relaxed);
    if id == 0 {
        // Wrapped after 2^32 commands; skip the reserved value.
        id = NEXT_CORRELATION_ID.fetch_add(1, Ordering::Relaxed);
    }
    id
}

/// Where a command entered the system. Selects the response channel.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum CommandOrigin {
    /// Serial console line fed in by the embedding.
    Console,
    /// Decoded HTTP request from the web console task.
    Web,
    /// A task requesting work from another task (analysis worker asking the
    /// coordinator for a scan).
    Internal,
}

/// Opaque credential bytes. Encoding and storage hardening are external;
/// this core only bounds the length and keeps the bytes out of logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(Vec<u8, 64>);

impl Credential {
    /// WPA2 passphrase bounds, the only validation this core applies.
    pub fn from_text(text: &str) -> Option<Credential> {
        Credential::from_bytes(text.as_bytes())
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Credential> {
        if bytes.len() < 8 || bytes.len() > 63 {
            return None;
        }
        let mut buffer = Vec::new();
        buffer.extend_from_slice(bytes).ok()?;
        Some(Credential(buffer))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(feature = "std")]
impl core::fmt::Debug for Credential {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Credential(<{} bytes>)", self.0.len())
    }
}

/// Soft-AP parameters. Defaults fill in for `startap` with no arguments.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct ApConfig {
    pub ssid: String<32>,
    pub credential: Option<Credential>,
    /// 2.4 GHz channel, 1..=13.
    pub channel: u8,
    /// Start the AP at boot without an operator command.
    pub auto_start: bool,
}

impl Default for ApConfig {
    fn default() -> Self {
        let mut ssid = String::new();
        let _ = ssid.push_str("wavescan");
        ApConfig {
            ssid,
            credential: None,
            channel: 1,
            auto_start: false,
        }
    }
}

/// Station join parameters, persisted under the station namespace.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct StationProfile {
    pub ssid: String<32>,
    pub credential: Option<Credential>,
}

/// Argument overlay for `startap`. Unset fields fall back to the
/// coordinator's active AP configuration (persisted or boot defaults).
#[derive(Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct ApConfigPatch {
    pub ssid: Option<String<32>>,
    pub credential: Option<Credential>,
    pub channel: Option<u8>,
}

impl ApConfigPatch {
    pub fn is_empty(&self) -> bool {
        self.ssid.is_none() && self.credential.is_none() && self.channel.is_none()
    }
}

/// Operation on a persisted configuration namespace.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum ConfigOp {
    Save,
    Load,
    Show,
    Clear,
}

/// Verbs owned by the radio coordinator.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum RadioCommand {
    Scan,
    SetAutoScan(bool),
    Connect(StationProfile),
    Disconnect,
    StartAp(ApConfigPatch),
    StopAp,
    Reset,
    ApConfigOp(ConfigOp),
    StationConfigOp(ConfigOp),
}

impl RadioCommand {
    pub fn verb(&self) -> &'static str {
        match self {
            RadioCommand::Scan => "scan",
            RadioCommand::SetAutoScan(_) => "scan",
            RadioCommand::Connect(_) => "connect",
            RadioCommand::Disconnect => "disconnect",
            RadioCommand::StartAp(_) => "startap",
            RadioCommand::StopAp => "stopap",
            RadioCommand::Reset => "reset",
            RadioCommand::ApConfigOp(_) => "apcfg",
            RadioCommand::StationConfigOp(_) => "stacfg",
        }
    }
}

/// Verbs owned by the analysis worker.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum AnalysisCommand {
    Latency { host: String<64>, count: u8 },
    ChannelScan,
    Throughput { host: String<64>, port: u16, seconds: u8 },
    Stop,
}

impl AnalysisCommand {
    pub fn verb(&self) -> &'static str {
        match self {
            AnalysisCommand::Latency { .. } => "latency",
            AnalysisCommand::ChannelScan => "chanscan",
            AnalysisCommand::Throughput { .. } => "throughput",
            AnalysisCommand::Stop => "stop",
        }
    }
}

/// Envelope pairing a typed verb with its origin and correlation id.
#[derive(Clone)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct Command<V> {
    pub correlation_id: CorrelationId,
    pub origin: CommandOrigin,
    pub verb: V,
}

impl<V> Command<V> {
    /// Wraps a verb with a freshly assigned correlation id.
    pub fn new(origin: CommandOrigin, verb: V) -> Self {
        Command {
            correlation_id: next_correlation_id(),
            origin,
            verb,
        }
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn correlation_ids_are_nonzero_and_increasing() {
        let a = Command::new(CommandOrigin::Console, RadioCommand::Scan);
        let b = Command::new(CommandOrigin::Web, RadioCommand::Reset);
        assert_ne!(a.correlation_id, 0);
        assert!(b.correlation_id > a.correlation_id);
    }

    #[test]
    fn credential_bounds_are_enforced() {
        assert!(Credential::from_text("short").is_none());
        assert!(Credential::from_text("long-enough").is_some());
        let too_long = [b'x'; 64];
        assert!(Credential::from_bytes(&too_long).is_none());
        let max = [b'x'; 63];
        assert_eq!(Credential::from_bytes(&max).unwrap().as_bytes().len(), 63);
    }

    #[test]
    fn ap_config_default_is_open_on_channel_one() {
        let config = ApConfig::default();
        assert_eq!(config.ssid.as_str(), "wavescan");
        assert!(config.credential.is_none());
        assert_eq!(config.channel, 1);
        assert!(!config.auto_start);
    }
}
