//! # Status Monitor - Read-Only Indicator Feed
//!
//! Translates connectivity and fault events into a coarse [`StatusPattern`]
//! for whatever indicator the embedding wires in (LED, small display, a log
//! line on hosts). Strictly a consumer: it waits on signal bits, snapshots
//! [`WifiState`], and never submits commands or mutates shared state beyond
//! clearing the transition pulses it consumes.

use embassy_time::Duration;
use log::{log, Level};

use crate::radio_coordinator::{WifiMode, WifiState};
use crate::signal_set::SignalSet;
use crate::task_supervisor::TaskContext;
use crate::{events, WifiStateRegion, REGION_ACQUIRE_TIMEOUT};

/// Re-sample period when no transition event arrives. Bounds how stale the
/// `Analyzing` indication can be, since analysis start/stop is a level bit.
const MONITOR_RECHECK_INTERVAL: Duration = Duration::from_millis(500);

/// Indicator states, ordered by urgency. `Fault` wins over everything,
/// `Analyzing` overlays whichever link mode is active.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum StatusPattern {
    Idle,
    Connecting,
    Station,
    Ap,
    Analyzing,
    Fault,
}

impl StatusPattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusPattern::Idle => "idle",
            StatusPattern::Connecting => "connecting",
            StatusPattern::Station => "station",
            StatusPattern::Ap => "ap",
            StatusPattern::Analyzing => "analyzing",
            StatusPattern::Fault => "fault",
        }
    }
}

/// Indicator backend, resolved at initialization. Synchronous so the
/// embedding can drive a GPIO or a frame buffer directly from the call.
pub trait StatusSink {
    fn apply(&mut self, pattern: StatusPattern);
}

/// Default sink for hosts: one log line per transition.
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn apply(&mut self, pattern: StatusPattern) {
        log!(Level::Info, "Status: {}", pattern.as_str());
    }
}

/// Folds a state snapshot and the current signal bits into one pattern.
pub(crate) fn compute_pattern(state: &WifiState, bits: u32) -> StatusPattern {
    if state.mode == WifiMode::Error || bits & events::TASK_FAULT != 0 {
        return StatusPattern::Fault;
    }
    if bits & events::ANALYSIS_RUNNING != 0 {
        return StatusPattern::Analyzing;
    }
    match state.mode {
        WifiMode::Idle => StatusPattern::Idle,
        WifiMode::Connecting => StatusPattern::Connecting,
        WifiMode::Station => StatusPattern::Station,
        WifiMode::Ap => StatusPattern::Ap,
        WifiMode::Error => StatusPattern::Fault,
    }
}

#[embassy_executor::task]
pub(crate) async fn status_monitor_task(
    context: &'static TaskContext,
    signals: &'static SignalSet,
    wifi_state: &'static WifiStateRegion,
    sink: &'static mut dyn StatusSink,
) {
    log!(Level::Info, "status monitor task started");
    let mut current: Option<StatusPattern> = None;
    loop {
        context.pause_point().await;
        if context.should_stop() {
            break;
        }
        context.blocked();
        let raised = signals
            .wait_any(
                events::CONNECTIVITY_CHANGED | events::TASK_FAULT | events::SHUTDOWN,
                MONITOR_RECHECK_INTERVAL,
            )
            .await
            .unwrap_or(0);
        context.heartbeat();
        if raised & events::SHUTDOWN != 0 {
            break;
        }
        // Consume the transition pulses so the wait blocks again.
        signals.clear(raised & (events::CONNECTIVITY_CHANGED | events::TASK_FAULT));
        let pattern = match wifi_state.snapshot(context.id(), REGION_ACQUIRE_TIMEOUT).await {
            Ok(state) => compute_pattern(&state, signals.value() | raised),
            Err(_) => continue,
        };
        if current != Some(pattern) {
            current = Some(pattern);
            sink.apply(pattern);
        }
    }
    context.shutdown_complete();
    log!(Level::Info, "status monitor task stopped");
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    fn state(mode: WifiMode) -> WifiState {
        let mut state = WifiState::boot();
        state.mode = mode;
        state
    }

    #[test]
    fn patterns_follow_the_mode() {
        assert_eq!(compute_pattern(&state(WifiMode::Idle), 0), StatusPattern::Idle);
        assert_eq!(compute_pattern(&state(WifiMode::Connecting), 0), StatusPattern::Connecting);
        assert_eq!(compute_pattern(&state(WifiMode::Station), 0), StatusPattern::Station);
        assert_eq!(compute_pattern(&state(WifiMode::Ap), 0), StatusPattern::Ap);
    }

    #[test]
    fn fault_wins_over_analysis() {
        let bits = events::ANALYSIS_RUNNING | events::TASK_FAULT;
        assert_eq!(compute_pattern(&state(WifiMode::Station), bits), StatusPattern::Fault);
        assert_eq!(compute_pattern(&state(WifiMode::Error), 0), StatusPattern::Fault);
    }

    #[test]
    fn analysis_overlays_the_link_mode() {
        assert_eq!(
            compute_pattern(&state(WifiMode::Station), events::ANALYSIS_RUNNING),
            StatusPattern::Analyzing
        );
    }
}
