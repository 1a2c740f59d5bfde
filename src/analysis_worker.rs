//! # Analysis Worker - Serial Measurement Jobs
//!
//! Latency, channel-occupancy, and throughput jobs run here, one at a time,
//! through the [`LinkProbe`] seam. The worker never touches the radio: when
//! `chanscan` needs fresh survey data it sends an internal-origin scan
//! command through the coordinator's channel and waits for the correlated
//! response, then scores the shared scan table snapshot. That is the one
//! multi-producer path in the system.
//!
//! `ANALYSIS_RUNNING` is raised around every job. While a job runs, newly
//! arriving commands are drained between probe steps: `stop` cancels the job
//! (partial results are still reported), anything else is rejected busy.

use embassy_time::{Duration, Instant, Timer};
use log::{log, Level};
use rand_core::RngCore;
use rand_core::SeedableRng;
use rand_wyrand::WyRand;

use crate::command_router::ResponsePath;
use crate::link_probe::{LatencyReport, LinkProbe, ThroughputReport};
use crate::message_channel::ReceiveError;
use crate::messages::{
    AnalysisCommand, Command, CommandOrigin, CommandResponse, CorrelationId, RadioCommand, RejectReason,
    ResponseDetail, ResponseStatus,
};
use crate::radio_coordinator::WifiMode;
use crate::signal_set::SignalSet;
use crate::task_supervisor::{TaskContext, TaskId};
use crate::{
    events, AnalysisCommandChannel, RadioCommandChannel, ScanTableRegion, WifiStateRegion, DEFAULT_SEND_TIMEOUT,
    REGION_ACQUIRE_TIMEOUT,
};

#[cfg(any(feature = "wifi-device-simulator", feature = "wifi-device-loopback"))]
use crate::link_probe::ActiveLinkProbe;

/// Tick period of the worker loop while no job is running.
const WORKER_RECEIVE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Base spacing between latency pings; a small random jitter is added so
/// probes do not beat against periodic traffic.
const PING_INTERVAL_MS: u32 = 100;

/// How long a requested scan may take before `chanscan` gives up on the
/// coordinator. Covers the driver scan timeout with margin.
const SCAN_ANSWER_TIMEOUT: Duration = Duration::from_secs(20);

/// Job sequencer. Generic over the probe so the job logic is host-testable;
/// the spawned task instantiates it with [`ActiveLinkProbe`].
pub(crate) struct AnalysisWorker<P: LinkProbe> {
    task_id: TaskId,
    context: &'static TaskContext,
    probe: P,
    commands: &'static AnalysisCommandChannel,
    radio: &'static RadioCommandChannel,
    responses: &'static ResponsePath,
    wifi_state: &'static WifiStateRegion,
    scan_table: &'static ScanTableRegion,
    signals: &'static SignalSet,
    rng: WyRand,
}

impl<P: LinkProbe> AnalysisWorker<P> {
    pub(crate) fn new(
        task_id: TaskId,
        context: &'static TaskContext,
        probe: P,
        commands: &'static AnalysisCommandChannel,
        radio: &'static RadioCommandChannel,
        responses: &'static ResponsePath,
        wifi_state: &'static WifiStateRegion,
        scan_table: &'static ScanTableRegion,
        signals: &'static SignalSet,
        rng_seed: u64,
    ) -> Self {
        AnalysisWorker {
            task_id,
            context,
            probe,
            commands,
            radio,
            responses,
            wifi_state,
            scan_table,
            signals,
            rng: WyRand::seed_from_u64(rng_seed),
        }
    }

    pub(crate) async fn handle_command(&mut self, command: Command<AnalysisCommand>) {
        let id = command.correlation_id;
        let origin = command.origin;
        self.signals.raise(events::ANALYSIS_RUNNING);
        match command.verb {
            AnalysisCommand::Latency { host, count } => self.run_latency(id, origin, &host, count).await,
            AnalysisCommand::ChannelScan => self.run_chanscan(id, origin).await,
            AnalysisCommand::Throughput { host, port, seconds } => {
                self.run_throughput(id, origin, &host, port, seconds).await
            }
            AnalysisCommand::Stop => {
                // Nothing running; still answer so the submission is not left open.
                self.respond(origin, CommandResponse::done_text(id, "stop", "no analysis job running"))
                    .await;
            }
        }
        self.signals.clear(events::ANALYSIS_RUNNING);
    }

    async fn run_latency(&mut self, id: CorrelationId, origin: CommandOrigin, host: &heapless::String<64>, count: u8) {
        if !self.station_link_up().await {
            self.respond(origin, CommandResponse::rejected(id, "latency", RejectReason::NotConnected))
                .await;
            return;
        }
        let mut sent: u8 = 0;
        let mut received: u8 = 0;
        let mut min_us = u32::MAX;
        let mut max_us = 0u32;
        let mut sum_us = 0u32;
        for _ in 0..count {
            sent += 1;
            match self.probe.ping(host.as_str()).await {
                Ok(rtt_us) => {
                    received += 1;
                    min_us = min_us.min(rtt_us);
                    max_us = max_us.max(rtt_us);
                    sum_us = sum_us.saturating_add(rtt_us);
                }
                Err(error) => {
                    log!(Level::Debug, "ping {} of {} lost: {}", sent, count, error.as_str());
                }
            }
            if sent < count {
                // Jobs outlive the supervision budget; tick between pings.
                self.context.heartbeat();
                if self.drain_commands().await {
                    break;
                }
                self.pace().await;
            }
        }
        let report = LatencyReport {
            host: host.clone(),
            sent,
            received,
            min_ms: if received > 0 { min_us / 1000 } else { 0 },
            avg_ms: if received > 0 { sum_us / received as u32 / 1000 } else { 0 },
            max_ms: max_us / 1000,
            jitter_ms: if received > 0 { (max_us - min_us) / 1000 } else { 0 },
        };
        self.respond(origin, CommandResponse::done_with(id, "latency", ResponseDetail::Latency(report)))
            .await;
    }

    /// Requests a scan from the coordinator over its own channel, waits for
    /// the correlated internal response, then scores the scan table.
    async fn run_chanscan(&mut self, id: CorrelationId, origin: CommandOrigin) {
        let request = Command::new(CommandOrigin::Internal, RadioCommand::Scan);
        let request_id = request.correlation_id;
        if self.radio.send(request, DEFAULT_SEND_TIMEOUT).await.is_err() {
            self.respond(origin, CommandResponse::rejected(id, "chanscan", RejectReason::Busy("radio command channel full")))
                .await;
            return;
        }
        let response = match self.await_internal_response(request_id).await {
            Some(response) => response,
            None => {
                self.respond(origin, CommandResponse::rejected(id, "chanscan", RejectReason::Busy("scan not answered")))
                    .await;
                return;
            }
        };
        match response.status {
            ResponseStatus::Done => {
                let report = match self.scan_table.snapshot(self.task_id, REGION_ACQUIRE_TIMEOUT).await {
                    Ok(table) => self.probe.score_channels(&table),
                    Err(_) => {
                        self.respond(origin, CommandResponse::rejected(id, "chanscan", RejectReason::Busy("scan table held")))
                            .await;
                        return;
                    }
                };
                self.respond(origin, CommandResponse::done_with(id, "chanscan", ResponseDetail::Channels(report)))
                    .await;
            }
            ResponseStatus::Rejected(reason) => {
                self.respond(origin, CommandResponse::rejected(id, "chanscan", reason)).await;
            }
            ResponseStatus::Fault(fault) => {
                self.respond(origin, CommandResponse::fault(id, "chanscan", fault)).await;
            }
        }
    }

    async fn run_throughput(&mut self, id: CorrelationId, origin: CommandOrigin, host: &heapless::String<64>, port: u16, seconds: u8) {
        if !self.station_link_up().await {
            self.respond(origin, CommandResponse::rejected(id, "throughput", RejectReason::NotConnected))
                .await;
            return;
        }
        let mut total_bytes: u64 = 0;
        let mut elapsed: u8 = 0;
        for _ in 0..seconds {
            match self.probe.throughput_step(host.as_str(), port).await {
                Ok(bytes) => {
                    total_bytes += bytes as u64;
                    elapsed += 1;
                }
                Err(error) => {
                    // An unreachable server aborts the job; the link itself
                    // is the thing under test.
                    log!(Level::Warn, "throughput step failed: {}", error.as_str());
                    self.respond(origin, CommandResponse::rejected(id, "throughput", RejectReason::NotConnected))
                        .await;
                    return;
                }
            }
            self.context.heartbeat();
            if elapsed < seconds && self.drain_commands().await {
                break;
            }
        }
        let report = ThroughputReport {
            host: host.clone(),
            port,
            seconds: elapsed,
            total_kbytes: (total_bytes / 1024) as u32,
            kbits_per_sec: if elapsed > 0 {
                (total_bytes * 8 / 1000 / elapsed as u64) as u32
            } else {
                0
            },
        };
        self.respond(origin, CommandResponse::done_with(id, "throughput", ResponseDetail::Throughput(report)))
            .await;
    }

    /// Drains commands that arrived mid-job. `stop` cancels the job and is
    /// acknowledged; anything else is rejected busy. Returns true when the
    /// running job should stop.
    async fn drain_commands(&mut self) -> bool {
        let mut stop = false;
        while let Some(command) = self.commands.try_receive() {
            match command.verb {
                AnalysisCommand::Stop => {
                    self.respond(command.origin, CommandResponse::done_text(command.correlation_id, "stop", "job cancelled"))
                        .await;
                    stop = true;
                }
                other => {
                    self.respond(
                        command.origin,
                        CommandResponse::rejected(command.correlation_id, other.verb(), RejectReason::Busy("analysis job running")),
                    )
                    .await;
                }
            }
        }
        stop
    }

    /// Waits for the correlated internal answer. The full wait covers the
    /// driver scan budget, far longer than the supervision budget, so it is
    /// sliced into short receives with a heartbeat between them.
    async fn await_internal_response(&mut self, request_id: CorrelationId) -> Option<CommandResponse> {
        let deadline = Instant::now() + SCAN_ANSWER_TIMEOUT;
        loop {
            match self.responses.internal().receive(WORKER_RECEIVE_TIMEOUT).await {
                Ok(response) if response.correlation_id == request_id => return Some(response),
                // A stale answer from an earlier timed-out request.
                Ok(_) => continue,
                Err(ReceiveError::Closed) => return None,
                Err(ReceiveError::Timeout) => {
                    self.context.heartbeat();
                    if Instant::now() >= deadline {
                        return None;
                    }
                }
            }
        }
    }

    async fn station_link_up(&self) -> bool {
        match self.wifi_state.snapshot(self.task_id, REGION_ACQUIRE_TIMEOUT).await {
            Ok(state) => state.mode == WifiMode::Station,
            Err(_) => false,
        }
    }

    async fn pace(&mut self) {
        let jitter = self.rng.next_u32() % 50;
        Timer::after(Duration::from_millis((PING_INTERVAL_MS + jitter) as u64)).await;
    }

    async fn respond(&self, origin: CommandOrigin, response: CommandResponse) {
        self.responses.deliver(origin, response).await;
    }
}

#[cfg(any(feature = "wifi-device-simulator", feature = "wifi-device-loopback"))]
#[embassy_executor::task]
#[allow(clippy::too_many_arguments)]
pub(crate) async fn analysis_worker_task(
    context: &'static TaskContext,
    probe: ActiveLinkProbe,
    commands: &'static AnalysisCommandChannel,
    radio: &'static RadioCommandChannel,
    responses: &'static ResponsePath,
    wifi_state: &'static WifiStateRegion,
    scan_table: &'static ScanTableRegion,
    signals: &'static SignalSet,
    rng_seed: u64,
) {
    log!(Level::Info, "analysis worker task started");
    let mut worker = AnalysisWorker::new(
        context.id(),
        context,
        probe,
        commands,
        radio,
        responses,
        wifi_state,
        scan_table,
        signals,
        rng_seed,
    );
    loop {
        context.pause_point().await;
        if context.should_stop() {
            break;
        }
        context.blocked();
        match commands.receive(WORKER_RECEIVE_TIMEOUT).await {
            Ok(command) => {
                context.heartbeat();
                worker.handle_command(command).await;
            }
            Err(ReceiveError::Timeout) => context.heartbeat(),
            Err(ReceiveError::Closed) => break,
        }
    }
    context.shutdown_complete();
    log!(Level::Info, "analysis worker task stopped");
}
