//! Correlated command outcomes.
//!
//! Every accepted command yields exactly one [`CommandResponse`] on its
//! origin's response channel: done, rejected with a reason, or a radio fault.
//! The `Display` impl renders the console line; the web console and tests
//! read the structured fields directly.

use core::fmt;

use heapless::{String, Vec};

use super::command::CorrelationId;
use crate::link_probe::{ChannelReport, LatencyReport, ThroughputReport};
use crate::message_channel::ChannelStats;
use crate::radio_coordinator::WifiState;
use crate::task_supervisor::{TaskReport, MAX_TASKS};
use crate::wifi_devices::DeviceFault;

/// Free-text payload bound, sized for verb listings and config dumps.
pub type ResponseText = String<128>;

/// Why a well-formed command was refused by its owning task.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum RejectReason {
    /// The current mode does not allow the operation.
    InvalidMode(&'static str),
    /// The owning task is occupied with conflicting work.
    Busy(&'static str),
    /// The operation needs an established station link.
    NotConnected,
    /// The persisted-configuration store reported a failure.
    StoreFailure,
    /// The requested persisted configuration does not exist.
    NotFound,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::InvalidMode(detail) => write!(f, "invalid mode: {}", detail),
            RejectReason::Busy(detail) => write!(f, "busy: {}", detail),
            RejectReason::NotConnected => write!(f, "not connected"),
            RejectReason::StoreFailure => write!(f, "config store failure"),
            RejectReason::NotFound => write!(f, "no saved configuration"),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum ResponseStatus {
    Done,
    Rejected(RejectReason),
    /// The coordinator is in its `Error` state; carries the stored fault.
    Fault(DeviceFault),
}

/// Aggregate snapshot served by the `status` verb.
#[derive(Clone)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct StatusReport {
    pub wifi: WifiState,
    pub channels: Vec<(&'static str, ChannelStats), 8>,
    /// Acquire-timeout count per guarded region.
    pub regions: Vec<(&'static str, u32), 4>,
}

/// Typed payload riding with a successful outcome.
#[derive(Clone)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum ResponseDetail {
    None,
    Text(ResponseText),
    Wifi(WifiState),
    ScanSummary { entries: u8 },
    Latency(LatencyReport),
    Channels(ChannelReport),
    Throughput(ThroughputReport),
    Tasks(Vec<TaskReport, MAX_TASKS>),
    Status(StatusReport),
}

#[derive(Clone)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct CommandResponse {
    pub correlation_id: CorrelationId,
    pub verb: &'static str,
    pub status: ResponseStatus,
    pub detail: ResponseDetail,
}

impl CommandResponse {
    pub fn done(correlation_id: CorrelationId, verb: &'static str) -> Self {
        Self::done_with(correlation_id, verb, ResponseDetail::None)
    }

    pub fn done_with(correlation_id: CorrelationId, verb: &'static str, detail: ResponseDetail) -> Self {
        CommandResponse {
            correlation_id,
            verb,
            status: ResponseStatus::Done,
            detail,
        }
    }

    pub fn done_text(correlation_id: CorrelationId, verb: &'static str, text: &str) -> Self {
        let mut buffer = ResponseText::new();
        let _ = buffer.push_str(text);
        Self::done_with(correlation_id, verb, ResponseDetail::Text(buffer))
    }

    pub fn rejected(correlation_id: CorrelationId, verb: &'static str, reason: RejectReason) -> Self {
        CommandResponse {
            correlation_id,
            verb,
            status: ResponseStatus::Rejected(reason),
            detail: ResponseDetail::None,
        }
    }

    pub fn fault(correlation_id: CorrelationId, verb: &'static str, fault: DeviceFault) -> Self {
        CommandResponse {
            correlation_id,
            verb,
            status: ResponseStatus::Fault(fault),
            detail: ResponseDetail::None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == ResponseStatus::Done
    }
}

impl fmt::Display for CommandResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: ", self.correlation_id, self.verb)?;
        match &self.status {
            ResponseStatus::Rejected(reason) => return write!(f, "rejected - {}", reason),
            ResponseStatus::Fault(fault) => {
                return write!(f, "radio fault - {} (reset to clear)", fault.as_str());
            }
            ResponseStatus::Done => {}
        }
        match &self.detail {
            ResponseDetail::None => write!(f, "ok"),
            ResponseDetail::Text(text) => write!(f, "ok - {}", text),
            ResponseDetail::Wifi(wifi) => write!(
                f,
                "ok - mode={} ssid={} ch={}",
                wifi.mode.as_str(),
                wifi.ssid.as_str(),
                wifi.channel
            ),
            ResponseDetail::ScanSummary { entries } => write!(f, "ok - {} networks found", entries),
            ResponseDetail::Latency(report) => write!(
                f,
                "ok - {}/{} replies from {}, min/avg/max {}/{}/{} ms, jitter {} ms",
                report.received, report.sent, report.host, report.min_ms, report.avg_ms, report.max_ms, report.jitter_ms
            ),
            ResponseDetail::Channels(report) => write!(f, "ok - recommended channel {}", report.recommended_channel),
            ResponseDetail::Throughput(report) => write!(
                f,
                "ok - {} kbit/s to {}:{} over {} s",
                report.kbits_per_sec, report.host, report.port, report.seconds
            ),
            ResponseDetail::Tasks(reports) => write!(f, "ok - {} tasks registered", reports.len()),
            ResponseDetail::Status(report) => write!(
                f,
                "ok - mode={} ssid={} ch={} last_error={}",
                report.wifi.mode.as_str(),
                report.wifi.ssid.as_str(),
                report.wifi.channel,
                report.wifi.last_error.map(|e| e.as_str()).unwrap_or("none")
            ),
        }
    }
}
