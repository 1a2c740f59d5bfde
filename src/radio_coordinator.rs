//! # Radio Coordinator - Sole Owner of Connectivity State
//!
//! The radio is a single exclusive-access resource. This task is its only
//! driver: it drains one command channel serially, so the radio never sees
//! two conflicting operations, and it is the only writer of the shared
//! [`WifiState`]. Everyone else reads snapshots through the guarded region
//! or reacts to signal bits.
//!
//! ## State machine
//!
//! `Idle`, `Connecting`, `Station`, `AP`, `Error`. Driver failures land in
//! `Error` with the fault stored; every command except `reset` is then
//! rejected with that fault echoed, so operators observe the failure instead
//! of the appliance silently retrying. Commands that request the state the
//! radio is already in are idempotent successes.
//!
//! ## Timing
//!
//! The command receive timeout doubles as the supervision tick: each expiry
//! polls the station link and, when auto-scan is enabled, refreshes the scan
//! cache on its cadence. No fixed-delay polling loop exists anywhere.
//!
//! Persisted AP/station configuration is loaded at boot (honoring the saved
//! auto-start flag) and written back after successful configuration changes.

use embassy_time::{with_timeout, Duration, Instant};
use heapless::String;
use log::{log, Level};

use crate::command_router::ResponsePath;
use crate::config_store::{ConfigStore, AP_NAMESPACE, STATION_NAMESPACE};
use crate::message_channel::ReceiveError;
use crate::messages::{
    ApConfig, ApConfigPatch, Command, CommandOrigin, CommandResponse, ConfigOp, CorrelationId, RadioCommand,
    RejectReason, ResponseDetail, ResponseText, StationProfile,
};
use crate::signal_set::SignalSet;
use crate::task_supervisor::{TaskContext, TaskId};
use crate::wifi_devices::{DeviceFault, WifiDevice};
use crate::{events, RadioCommandChannel, ScanTableRegion, WifiStateRegion, REGION_ACQUIRE_TIMEOUT};

#[cfg(any(feature = "wifi-device-simulator", feature = "wifi-device-loopback"))]
use crate::wifi_devices::ActiveWifiDevice;

/// Tick period of the coordinator loop; also the link-supervision cadence.
pub(crate) const COORDINATOR_RECEIVE_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum WifiMode {
    Idle,
    Connecting,
    Station,
    Ap,
    Error,
}

impl WifiMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WifiMode::Idle => "idle",
            WifiMode::Connecting => "connecting",
            WifiMode::Station => "station",
            WifiMode::Ap => "ap",
            WifiMode::Error => "error",
        }
    }
}

/// Shared connectivity state. Mutated only by the coordinator; everyone else
/// snapshots it through its guarded region.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct WifiState {
    pub mode: WifiMode,
    pub ssid: String<32>,
    pub channel: u8,
    pub last_error: Option<DeviceFault>,
}

impl WifiState {
    pub const fn boot() -> Self {
        WifiState {
            mode: WifiMode::Idle,
            ssid: String::new(),
            channel: 0,
            last_error: None,
        }
    }
}

/// Upper bounds on driver calls. Defaults follow the appliance's driver
/// budget; tests shrink them.
#[derive(Clone, Copy)]
pub struct DriverTimeouts {
    pub connect: Duration,
    pub scan: Duration,
    pub control: Duration,
}

impl Default for DriverTimeouts {
    fn default() -> Self {
        DriverTimeouts {
            connect: Duration::from_secs(10),
            scan: Duration::from_secs(15),
            control: Duration::from_secs(5),
        }
    }
}

/// The transition table, kept executor-free so it is host-testable without
/// spawning the task wrapper.
pub(crate) struct RadioCoordinator<D: WifiDevice> {
    task_id: TaskId,
    device: D,
    store: &'static mut dyn ConfigStore,
    wifi_state: &'static WifiStateRegion,
    scan_table: &'static ScanTableRegion,
    signals: &'static SignalSet,
    responses: &'static ResponsePath,
    state: WifiState,
    ap_config: ApConfig,
    // Exactly what the device is serving right now, credential included.
    // `state` alone cannot answer whether a startap is truly idempotent.
    active_ap: Option<ApConfig>,
    station_profile: Option<StationProfile>,
    auto_scan: bool,
    auto_scan_interval: Duration,
    last_scan: Instant,
    timeouts: DriverTimeouts,
}

impl<D: WifiDevice> RadioCoordinator<D> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        task_id: TaskId,
        device: D,
        store: &'static mut dyn ConfigStore,
        wifi_state: &'static WifiStateRegion,
        scan_table: &'static ScanTableRegion,
        signals: &'static SignalSet,
        responses: &'static ResponsePath,
        ap_defaults: ApConfig,
        auto_scan: bool,
        auto_scan_interval: Duration,
    ) -> Self {
        RadioCoordinator {
            task_id,
            device,
            store,
            wifi_state,
            scan_table,
            signals,
            responses,
            state: WifiState::boot(),
            ap_config: ap_defaults,
            active_ap: None,
            station_profile: None,
            auto_scan,
            auto_scan_interval,
            last_scan: Instant::now(),
            timeouts: DriverTimeouts::default(),
        }
    }

    /// Loads persisted configuration and honors a saved auto-start AP before
    /// the command loop begins.
    pub(crate) async fn boot(&mut self) {
        if let Some(records) = self.store.load(AP_NAMESPACE) {
            match ApConfig::from_records(&records) {
                Some(config) => {
                    log!(Level::Info, "loaded persisted AP config '{}'", config.ssid.as_str());
                    self.ap_config = config;
                }
                None => log!(Level::Warn, "persisted AP config does not decode, keeping defaults"),
            }
        }
        if let Some(records) = self.store.load(STATION_NAMESPACE) {
            match StationProfile::from_records(&records) {
                Some(profile) => self.station_profile = Some(profile),
                None => log!(Level::Warn, "persisted station profile does not decode"),
            }
        }
        if self.ap_config.auto_start {
            let config = self.ap_config.clone();
            if let Err(fault) = self.apply_start_ap(&config).await {
                log!(Level::Error, "auto-start AP failed: {}", fault.as_str());
                self.enter_error(fault).await;
            }
        }
    }

    /// Supervision tick, run on every command receive timeout.
    pub(crate) async fn on_tick(&mut self) {
        if self.state.mode == WifiMode::Station && !self.device.link_up() {
            log!(Level::Warn, "station link to '{}' lost", self.state.ssid.as_str());
            self.state.mode = WifiMode::Idle;
            self.state.channel = 0;
            self.state.last_error = Some(DeviceFault::LinkLost);
            self.publish_state().await;
        }
        let scannable = matches!(self.state.mode, WifiMode::Idle | WifiMode::Station);
        if self.auto_scan && scannable && self.last_scan.elapsed() >= self.auto_scan_interval {
            if let Err(fault) = self.run_scan().await {
                log!(Level::Error, "auto-scan failed: {}", fault.as_str());
                self.enter_error(fault).await;
            }
        }
    }

    pub(crate) async fn handle_command(&mut self, command: Command<RadioCommand>) {
        let Command {
            correlation_id: id,
            origin,
            verb,
        } = command;
        let name = verb.verb();

        // Terminal fault state: only reset is serviced, so the fault stays
        // observable until an operator acknowledges it.
        if self.state.mode == WifiMode::Error && !matches!(verb, RadioCommand::Reset) {
            let fault = self.state.last_error.unwrap_or(DeviceFault::Hardware);
            self.respond(origin, CommandResponse::fault(id, name, fault)).await;
            return;
        }

        match verb {
            RadioCommand::Scan => self.cmd_scan(id, origin, name).await,
            RadioCommand::SetAutoScan(enabled) => {
                self.auto_scan = enabled;
                let text = if enabled { "auto-scan enabled" } else { "auto-scan disabled" };
                self.respond(origin, CommandResponse::done_text(id, name, text)).await;
            }
            RadioCommand::Connect(profile) => self.cmd_connect(id, origin, name, profile).await,
            RadioCommand::Disconnect => self.cmd_disconnect(id, origin, name).await,
            RadioCommand::StartAp(patch) => self.cmd_start_ap(id, origin, name, patch).await,
            RadioCommand::StopAp => self.cmd_stop_ap(id, origin, name).await,
            RadioCommand::Reset => self.cmd_reset(id, origin, name).await,
            RadioCommand::ApConfigOp(op) => self.cmd_ap_config(id, origin, name, op).await,
            RadioCommand::StationConfigOp(op) => self.cmd_station_config(id, origin, name, op).await,
        }
    }

    async fn cmd_scan(&mut self, id: CorrelationId, origin: CommandOrigin, name: &'static str) {
        if self.state.mode == WifiMode::Ap {
            let reason = RejectReason::InvalidMode("single radio cannot scan while the AP is active");
            self.respond(origin, CommandResponse::rejected(id, name, reason)).await;
            return;
        }
        match self.run_scan().await {
            Ok(entries) => {
                let detail = ResponseDetail::ScanSummary { entries };
                self.respond(origin, CommandResponse::done_with(id, name, detail)).await;
            }
            Err(fault) => {
                self.enter_error(fault).await;
                self.respond(origin, CommandResponse::fault(id, name, fault)).await;
            }
        }
    }

    async fn cmd_connect(&mut self, id: CorrelationId, origin: CommandOrigin, name: &'static str, profile: StationProfile) {
        match self.state.mode {
            WifiMode::Ap => {
                let reason = RejectReason::InvalidMode("stop the AP before joining a network");
                self.respond(origin, CommandResponse::rejected(id, name, reason)).await;
            }
            WifiMode::Station if self.state.ssid == profile.ssid => {
                // Already joined to the requested network.
                let detail = ResponseDetail::Wifi(self.state.clone());
                self.respond(origin, CommandResponse::done_with(id, name, detail)).await;
            }
            WifiMode::Station => {
                let reason = RejectReason::InvalidMode("disconnect before joining another network");
                self.respond(origin, CommandResponse::rejected(id, name, reason)).await;
            }
            _ => {
                self.state.mode = WifiMode::Connecting;
                self.state.ssid = profile.ssid.clone();
                self.state.channel = 0;
                self.publish_state().await;

                let join = self.device.join(profile.ssid.as_str(), profile.credential.as_ref());
                let outcome = match with_timeout(self.timeouts.connect, join).await {
                    Ok(result) => result,
                    Err(_) => Err(DeviceFault::Timeout),
                };
                match outcome {
                    Ok(channel) => {
                        self.state.mode = WifiMode::Station;
                        self.state.channel = channel;
                        self.state.last_error = None;
                        self.publish_state().await;
                        if self.store.save(STATION_NAMESPACE, &profile.to_records()).is_err() {
                            log!(Level::Warn, "persisting station profile failed");
                        }
                        self.station_profile = Some(profile);
                        let detail = ResponseDetail::Wifi(self.state.clone());
                        self.respond(origin, CommandResponse::done_with(id, name, detail)).await;
                    }
                    Err(fault) => {
                        self.enter_error(fault).await;
                        self.respond(origin, CommandResponse::fault(id, name, fault)).await;
                    }
                }
            }
        }
    }

    async fn cmd_disconnect(&mut self, id: CorrelationId, origin: CommandOrigin, name: &'static str) {
        match self.state.mode {
            WifiMode::Station => {
                let leave = self.device.leave();
                if let Ok(Err(fault)) = with_timeout(self.timeouts.control, leave).await {
                    log!(Level::Warn, "leave reported {}", fault.as_str());
                }
                self.state.mode = WifiMode::Idle;
                self.state.ssid = String::new();
                self.state.channel = 0;
                self.publish_state().await;
                self.respond(origin, CommandResponse::done(id, name)).await;
            }
            WifiMode::Ap => {
                let reason = RejectReason::InvalidMode("use stopap to leave AP mode");
                self.respond(origin, CommandResponse::rejected(id, name, reason)).await;
            }
            // Not connected; disconnecting is a no-op success.
            _ => self.respond(origin, CommandResponse::done(id, name)).await,
        }
    }

    async fn cmd_start_ap(&mut self, id: CorrelationId, origin: CommandOrigin, name: &'static str, patch: ApConfigPatch) {
        let mut config = self.ap_config.clone();
        let changed = !patch.is_empty();
        if let Some(ssid) = patch.ssid {
            config.ssid = ssid;
        }
        if let Some(credential) = patch.credential {
            config.credential = Some(credential);
        }
        if let Some(channel) = patch.channel {
            config.channel = channel;
        }

        match self.state.mode {
            WifiMode::Ap if self.active_ap.as_ref() == Some(&config) => {
                // Identical request while serving: idempotent success.
                let detail = ResponseDetail::Wifi(self.state.clone());
                self.respond(origin, CommandResponse::done_with(id, name, detail)).await;
            }
            // Any difference from what is actually being served, credential
            // changes included, restarts the AP with the new configuration.
            _ => match self.apply_start_ap(&config).await {
                Ok(()) => {
                    self.ap_config = config;
                    if changed && self.store.save(AP_NAMESPACE, &self.ap_config.to_records()).is_err() {
                        log!(Level::Warn, "persisting AP config failed");
                    }
                    let detail = ResponseDetail::Wifi(self.state.clone());
                    self.respond(origin, CommandResponse::done_with(id, name, detail)).await;
                }
                Err(fault) => {
                    self.enter_error(fault).await;
                    self.respond(origin, CommandResponse::fault(id, name, fault)).await;
                }
            },
        }
    }

    async fn cmd_stop_ap(&mut self, id: CorrelationId, origin: CommandOrigin, name: &'static str) {
        if self.state.mode != WifiMode::Ap {
            // No AP running; stopping is a no-op success.
            self.respond(origin, CommandResponse::done(id, name)).await;
            return;
        }
        let stop = self.device.stop_ap();
        let outcome = match with_timeout(self.timeouts.control, stop).await {
            Ok(result) => result,
            Err(_) => Err(DeviceFault::Timeout),
        };
        match outcome {
            Ok(()) => {
                self.state.mode = WifiMode::Idle;
                self.state.ssid = String::new();
                self.state.channel = 0;
                self.active_ap = None;
                self.publish_state().await;
                self.respond(origin, CommandResponse::done(id, name)).await;
            }
            Err(fault) => {
                self.enter_error(fault).await;
                self.respond(origin, CommandResponse::fault(id, name, fault)).await;
            }
        }
    }

    async fn cmd_reset(&mut self, id: CorrelationId, origin: CommandOrigin, name: &'static str) {
        if self.state.mode == WifiMode::Error {
            log!(Level::Info, "operator cleared radio fault");
            self.state = WifiState::boot();
            self.active_ap = None;
            self.publish_state().await;
            self.respond(origin, CommandResponse::done_text(id, name, "fault cleared")).await;
        } else {
            self.respond(origin, CommandResponse::done_text(id, name, "no fault to clear")).await;
        }
    }

    async fn cmd_ap_config(&mut self, id: CorrelationId, origin: CommandOrigin, name: &'static str, op: ConfigOp) {
        let response = match op {
            ConfigOp::Save => match self.store.save(AP_NAMESPACE, &self.ap_config.to_records()) {
                Ok(()) => CommandResponse::done_text(id, name, "AP config saved"),
                Err(_) => CommandResponse::rejected(id, name, RejectReason::StoreFailure),
            },
            ConfigOp::Load => match self.store.load(AP_NAMESPACE).as_ref().and_then(ApConfig::from_records) {
                Some(config) => {
                    self.ap_config = config;
                    CommandResponse::done_text(id, name, "AP config loaded")
                }
                None => CommandResponse::rejected(id, name, RejectReason::NotFound),
            },
            ConfigOp::Show => {
                let mut text = ResponseText::new();
                let _ = core::fmt::Write::write_fmt(
                    &mut text,
                    format_args!(
                        "ssid={} ch={} secured={} auto={}",
                        self.ap_config.ssid.as_str(),
                        self.ap_config.channel,
                        self.ap_config.credential.is_some(),
                        self.ap_config.auto_start
                    ),
                );
                CommandResponse::done_with(id, name, ResponseDetail::Text(text))
            }
            ConfigOp::Clear => match self.store.clear(AP_NAMESPACE) {
                Ok(()) => CommandResponse::done_text(id, name, "AP config cleared"),
                Err(_) => CommandResponse::rejected(id, name, RejectReason::StoreFailure),
            },
        };
        self.respond(origin, response).await;
    }

    async fn cmd_station_config(&mut self, id: CorrelationId, origin: CommandOrigin, name: &'static str, op: ConfigOp) {
        let response = match op {
            ConfigOp::Save => match &self.station_profile {
                Some(profile) => match self.store.save(STATION_NAMESPACE, &profile.to_records()) {
                    Ok(()) => CommandResponse::done_text(id, name, "station profile saved"),
                    Err(_) => CommandResponse::rejected(id, name, RejectReason::StoreFailure),
                },
                None => CommandResponse::rejected(id, name, RejectReason::NotFound),
            },
            ConfigOp::Load => match self.store.load(STATION_NAMESPACE).as_ref().and_then(StationProfile::from_records) {
                Some(profile) => {
                    self.station_profile = Some(profile);
                    CommandResponse::done_text(id, name, "station profile loaded")
                }
                None => CommandResponse::rejected(id, name, RejectReason::NotFound),
            },
            ConfigOp::Show => match &self.station_profile {
                Some(profile) => {
                    let mut text = ResponseText::new();
                    let _ = core::fmt::Write::write_fmt(
                        &mut text,
                        format_args!("ssid={} secured={}", profile.ssid.as_str(), profile.credential.is_some()),
                    );
                    CommandResponse::done_with(id, name, ResponseDetail::Text(text))
                }
                None => CommandResponse::rejected(id, name, RejectReason::NotFound),
            },
            ConfigOp::Clear => match self.store.clear(STATION_NAMESPACE) {
                Ok(()) => {
                    self.station_profile = None;
                    CommandResponse::done_text(id, name, "station profile cleared")
                }
                Err(_) => CommandResponse::rejected(id, name, RejectReason::StoreFailure),
            },
        };
        self.respond(origin, response).await;
    }

    /// Runs one scan and replaces the cache wholesale. Returns the entry
    /// count; the scan-complete pulse fires even for an empty neighborhood.
    async fn run_scan(&mut self) -> Result<u8, DeviceFault> {
        let scan = self.device.scan();
        let table = match with_timeout(self.timeouts.scan, scan).await {
            Ok(result) => result?,
            Err(_) => return Err(DeviceFault::Timeout),
        };
        self.last_scan = Instant::now();
        let entries = table.len() as u8;
        match self.scan_table.acquire(self.task_id, REGION_ACQUIRE_TIMEOUT).await {
            Ok(mut guard) => *guard = table,
            Err(_) => log!(Level::Error, "scan table region held too long, dropping scan results"),
        }
        self.signals.raise(events::SCAN_COMPLETE);
        log!(Level::Debug, "scan complete, {} networks", entries);
        Ok(entries)
    }

    async fn apply_start_ap(&mut self, config: &ApConfig) -> Result<(), DeviceFault> {
        if self.state.mode == WifiMode::Station {
            // The single radio drops the station link when serving an AP.
            let leave = self.device.leave();
            if let Ok(Err(fault)) = with_timeout(self.timeouts.control, leave).await {
                log!(Level::Warn, "leave before AP start reported {}", fault.as_str());
            }
        }
        let start = self.device.start_ap(config);
        match with_timeout(self.timeouts.control, start).await {
            Ok(Ok(())) => {
                self.state.mode = WifiMode::Ap;
                self.state.ssid = config.ssid.clone();
                self.state.channel = config.channel;
                self.state.last_error = None;
                self.active_ap = Some(config.clone());
                self.publish_state().await;
                log!(
                    Level::Info,
                    "AP '{}' serving on channel {}",
                    config.ssid.as_str(),
                    config.channel
                );
                Ok(())
            }
            Ok(Err(fault)) => Err(fault),
            Err(_) => Err(DeviceFault::Timeout),
        }
    }

    async fn enter_error(&mut self, fault: DeviceFault) {
        log!(Level::Error, "radio fault: {}", fault.as_str());
        self.state.mode = WifiMode::Error;
        self.state.last_error = Some(fault);
        self.active_ap = None;
        self.publish_state().await;
    }

    /// Writes the local state into the shared region and raises the
    /// connectivity pulse plus the station/AP level bits.
    async fn publish_state(&mut self) {
        match self.wifi_state.acquire(self.task_id, REGION_ACQUIRE_TIMEOUT).await {
            Ok(mut guard) => *guard = self.state.clone(),
            Err(_) => log!(Level::Error, "wifi state region held too long, snapshot is stale"),
        }
        match self.state.mode {
            WifiMode::Station => {
                self.signals.raise(events::STATION_ACTIVE);
                self.signals.clear(events::AP_ACTIVE);
            }
            WifiMode::Ap => {
                self.signals.raise(events::AP_ACTIVE);
                self.signals.clear(events::STATION_ACTIVE);
            }
            _ => self.signals.clear(events::STATION_ACTIVE | events::AP_ACTIVE),
        }
        self.signals.raise(events::CONNECTIVITY_CHANGED);
    }

    async fn respond(&self, origin: CommandOrigin, response: CommandResponse) {
        self.responses.deliver(origin, response).await;
    }
}

#[cfg(any(feature = "wifi-device-simulator", feature = "wifi-device-loopback"))]
#[embassy_executor::task]
#[allow(clippy::too_many_arguments)]
pub(crate) async fn radio_coordinator_task(
    context: &'static TaskContext,
    commands: &'static RadioCommandChannel,
    device: ActiveWifiDevice,
    store: &'static mut dyn ConfigStore,
    wifi_state: &'static WifiStateRegion,
    scan_table: &'static ScanTableRegion,
    signals: &'static SignalSet,
    responses: &'static ResponsePath,
    ap_defaults: ApConfig,
    auto_scan: bool,
    auto_scan_interval: Duration,
) {
    log!(Level::Info, "radio coordinator task started");
    let mut coordinator = RadioCoordinator::new(
        context.id(),
        device,
        store,
        wifi_state,
        scan_table,
        signals,
        responses,
        ap_defaults,
        auto_scan,
        auto_scan_interval,
    );
    coordinator.boot().await;
    loop {
        context.pause_point().await;
        if context.should_stop() {
            break;
        }
        context.blocked();
        match commands.receive(COORDINATOR_RECEIVE_TIMEOUT).await {
            Ok(command) => {
                context.heartbeat();
                coordinator.handle_command(command).await;
            }
            Err(ReceiveError::Timeout) => {
                context.heartbeat();
                coordinator.on_tick().await;
            }
            Err(ReceiveError::Closed) => break,
        }
    }
    context.shutdown_complete();
    log!(Level::Info, "radio coordinator task stopped");
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::config_store::MemoryConfigStore;
    use crate::messages::{Credential, ResponseStatus};
    use crate::wifi_devices::{Security, SimulatorDevice};
    use crate::test_support::run;
    use crate::{
        ConsoleResponseChannel, InternalResponseChannel, ScanTableRegion, WebCommandResponseChannel, WifiStateRegion,
    };

    const OWNER: TaskId = TaskId(1);
    const READER: TaskId = TaskId(7);

    struct Fixture {
        coordinator: RadioCoordinator<SimulatorDevice>,
        console: &'static ConsoleResponseChannel,
        wifi_state: &'static WifiStateRegion,
        scan_table: &'static ScanTableRegion,
        signals: &'static SignalSet,
    }

    fn fixture(device: SimulatorDevice) -> Fixture {
        fixture_with_store(device, Box::leak(Box::new(MemoryConfigStore::new())))
    }

    fn fixture_with_store(device: SimulatorDevice, store: &'static mut MemoryConfigStore) -> Fixture {
        let wifi_state: &'static WifiStateRegion = Box::leak(Box::new(WifiStateRegion::new("wifi-state", WifiState::boot())));
        let scan_table: &'static ScanTableRegion =
            Box::leak(Box::new(ScanTableRegion::new("scan-table", crate::wifi_devices::ScanTable::new())));
        let signals: &'static SignalSet = Box::leak(Box::new(SignalSet::new()));
        let console: &'static ConsoleResponseChannel = Box::leak(Box::new(ConsoleResponseChannel::new("console-responses")));
        let web: &'static WebCommandResponseChannel = Box::leak(Box::new(WebCommandResponseChannel::new("web-cmd-responses")));
        let internal: &'static InternalResponseChannel = Box::leak(Box::new(InternalResponseChannel::new("internal-responses")));
        let responses: &'static ResponsePath = Box::leak(Box::new(ResponsePath::new(console, web, internal)));
        let coordinator = RadioCoordinator::new(
            OWNER,
            device,
            store,
            wifi_state,
            scan_table,
            signals,
            responses,
            ApConfig::default(),
            false,
            Duration::from_secs(30),
        );
        Fixture {
            coordinator,
            console,
            wifi_state,
            scan_table,
            signals,
        }
    }

    fn console_cmd(verb: RadioCommand) -> Command<RadioCommand> {
        Command::new(CommandOrigin::Console, verb)
    }

    fn connect_cmd(ssid: &str, credential: Option<Credential>) -> Command<RadioCommand> {
        let mut profile = StationProfile {
            ssid: String::new(),
            credential,
        };
        let _ = profile.ssid.push_str(ssid);
        console_cmd(RadioCommand::Connect(profile))
    }

    #[test]
    fn connect_reaches_station_and_raises_bits() {
        run(|| async {
            let device = SimulatorDevice::new().with_network("lab", 6, -40, Security::Open);
            let mut fx = fixture(device);
            fx.coordinator.handle_command(connect_cmd("lab", None)).await;

            let state = fx.wifi_state.snapshot(READER, Duration::from_millis(10)).await.expect("free");
            assert_eq!(state.mode, WifiMode::Station);
            assert_eq!(state.ssid.as_str(), "lab");
            assert_eq!(state.channel, 6);
            assert!(state.last_error.is_none());
            assert_ne!(fx.signals.value() & events::STATION_ACTIVE, 0);

            let response = fx.console.try_receive().expect("one outcome");
            assert!(response.is_done());
        });
    }

    #[test]
    fn failed_connect_lands_in_error_with_the_fault_stored() {
        run(|| async {
            let device = SimulatorDevice::new(); // requested network does not exist
            let mut fx = fixture(device);
            fx.coordinator.handle_command(connect_cmd("ghost", None)).await;

            let state = fx.wifi_state.snapshot(READER, Duration::from_millis(10)).await.expect("free");
            assert_eq!(state.mode, WifiMode::Error);
            assert_eq!(state.last_error, Some(DeviceFault::NetworkNotFound));

            let response = fx.console.try_receive().expect("one outcome");
            assert_eq!(response.status, ResponseStatus::Fault(DeviceFault::NetworkNotFound));
        });
    }

    #[test]
    fn error_state_rejects_everything_except_reset() {
        run(|| async {
            let mut device = SimulatorDevice::new().with_network("lab", 1, -50, Security::Open);
            device.fail_next(DeviceFault::ScanFailed);
            let mut fx = fixture(device);
            fx.coordinator.handle_command(console_cmd(RadioCommand::Scan)).await;
            assert_eq!(fx.coordinator.state.mode, WifiMode::Error);
            let _ = fx.console.try_receive();

            fx.coordinator.handle_command(connect_cmd("lab", None)).await;
            let response = fx.console.try_receive().expect("fault echo");
            assert_eq!(response.status, ResponseStatus::Fault(DeviceFault::ScanFailed));
            assert_eq!(fx.coordinator.state.mode, WifiMode::Error);

            fx.coordinator.handle_command(console_cmd(RadioCommand::Reset)).await;
            let response = fx.console.try_receive().expect("reset outcome");
            assert!(response.is_done());
            assert_eq!(fx.coordinator.state.mode, WifiMode::Idle);
            assert!(fx.coordinator.state.last_error.is_none());
        });
    }

    #[test]
    fn start_ap_twice_with_identical_config_is_idempotent_success() {
        run(|| async {
            let mut fx = fixture(SimulatorDevice::new());
            let mut patch = ApConfigPatch::default();
            patch.channel = Some(6);
            fx.coordinator.handle_command(console_cmd(RadioCommand::StartAp(patch.clone()))).await;
            let first = fx.console.try_receive().expect("outcome");
            assert!(first.is_done());
            assert_eq!(fx.coordinator.state.mode, WifiMode::Ap);
            assert_eq!(fx.coordinator.state.channel, 6);

            fx.coordinator.handle_command(console_cmd(RadioCommand::StartAp(patch))).await;
            let second = fx.console.try_receive().expect("outcome");
            assert!(second.is_done());
            assert_eq!(fx.coordinator.state.mode, WifiMode::Ap);
        });
    }

    #[test]
    fn start_ap_with_new_credential_reconfigures_the_running_ap() {
        run(|| async {
            let mut fx = fixture(SimulatorDevice::new());
            let mut open = ApConfigPatch::default();
            open.channel = Some(6);
            fx.coordinator.handle_command(console_cmd(RadioCommand::StartAp(open))).await;
            assert!(fx.console.try_receive().expect("outcome").is_done());
            assert!(fx.coordinator.active_ap.as_ref().expect("serving").credential.is_none());

            // Same ssid and channel, new credential: must be applied, not
            // swallowed as an idempotent repeat.
            let mut secured = ApConfigPatch::default();
            secured.channel = Some(6);
            secured.credential = Some(Credential::from_text("hunter22").expect("8..63 chars"));
            fx.coordinator.handle_command(console_cmd(RadioCommand::StartAp(secured))).await;
            assert!(fx.console.try_receive().expect("outcome").is_done());
            assert_eq!(fx.coordinator.state.mode, WifiMode::Ap);
            let serving = fx.coordinator.active_ap.as_ref().expect("serving");
            assert!(serving.credential.is_some());
            assert_eq!(fx.coordinator.ap_config.credential, serving.credential);
        });
    }

    #[test]
    fn scan_refreshes_the_cache_and_pulses_scan_complete() {
        run(|| async {
            let device = SimulatorDevice::new()
                .with_network("one", 1, -40, Security::Open)
                .with_network("two", 6, -60, Security::Wpa2);
            let mut fx = fixture(device);
            fx.coordinator.handle_command(console_cmd(RadioCommand::Scan)).await;
            let table = fx.scan_table.snapshot(READER, Duration::from_millis(10)).await.expect("free");
            assert_eq!(table.len(), 2);
            assert_ne!(fx.signals.value() & events::SCAN_COMPLETE, 0);
            let response = fx.console.try_receive().expect("outcome");
            assert!(matches!(response.detail, ResponseDetail::ScanSummary { entries: 2 }));
        });
    }

    #[test]
    fn scan_is_rejected_while_the_ap_is_active() {
        run(|| async {
            let mut fx = fixture(SimulatorDevice::new());
            fx.coordinator
                .handle_command(console_cmd(RadioCommand::StartAp(ApConfigPatch::default())))
                .await;
            let _ = fx.console.try_receive();
            fx.coordinator.handle_command(console_cmd(RadioCommand::Scan)).await;
            let response = fx.console.try_receive().expect("outcome");
            assert!(matches!(response.status, ResponseStatus::Rejected(RejectReason::InvalidMode(_))));
            // Rejection, not a fault: the AP keeps serving.
            assert_eq!(fx.coordinator.state.mode, WifiMode::Ap);
        });
    }

    #[test]
    fn link_loss_returns_to_idle_on_the_next_tick() {
        run(|| async {
            let device = SimulatorDevice::new().with_network("lab", 11, -45, Security::Open);
            let mut fx = fixture(device);
            fx.coordinator.handle_command(connect_cmd("lab", None)).await;
            let _ = fx.console.try_receive();
            fx.signals.clear(events::CONNECTIVITY_CHANGED);

            fx.coordinator.device.drop_link();
            fx.coordinator.on_tick().await;

            let state = fx.wifi_state.snapshot(READER, Duration::from_millis(10)).await.expect("free");
            assert_eq!(state.mode, WifiMode::Idle);
            assert_eq!(state.last_error, Some(DeviceFault::LinkLost));
            assert_ne!(fx.signals.value() & events::CONNECTIVITY_CHANGED, 0);
            assert_eq!(fx.signals.value() & events::STATION_ACTIVE, 0);
        });
    }

    #[test]
    fn disconnect_and_stopap_are_noop_successes_when_already_idle() {
        run(|| async {
            let mut fx = fixture(SimulatorDevice::new());
            fx.coordinator.handle_command(console_cmd(RadioCommand::Disconnect)).await;
            assert!(fx.console.try_receive().expect("outcome").is_done());
            fx.coordinator.handle_command(console_cmd(RadioCommand::StopAp)).await;
            assert!(fx.console.try_receive().expect("outcome").is_done());
            assert_eq!(fx.coordinator.state.mode, WifiMode::Idle);
        });
    }

    #[test]
    fn persisted_auto_start_brings_the_ap_up_at_boot() {
        run(|| async {
            let store: &'static mut MemoryConfigStore = Box::leak(Box::new(MemoryConfigStore::new()));
            let mut saved = ApConfig::default();
            saved.channel = 11;
            saved.auto_start = true;
            store.save(AP_NAMESPACE, &saved.to_records()).expect("save");

            let mut fx = fixture_with_store(SimulatorDevice::new(), store);
            fx.coordinator.boot().await;
            assert_eq!(fx.coordinator.state.mode, WifiMode::Ap);
            assert_eq!(fx.coordinator.state.channel, 11);
            assert_ne!(fx.signals.value() & events::AP_ACTIVE, 0);
        });
    }

    #[test]
    fn successful_connect_persists_the_station_profile() {
        run(|| async {
            let device = SimulatorDevice::new().with_network("lab", 3, -42, Security::Open);
            let mut fx = fixture(device);
            fx.coordinator.handle_command(connect_cmd("lab", None)).await;
            let _ = fx.console.try_receive();

            // Drop the in-memory copy, then reload from the store.
            fx.coordinator.station_profile = None;
            fx.coordinator
                .handle_command(console_cmd(RadioCommand::StationConfigOp(ConfigOp::Load)))
                .await;
            assert!(fx.console.try_receive().expect("outcome").is_done());
            let profile = fx.coordinator.station_profile.as_ref().expect("reloaded");
            assert_eq!(profile.ssid.as_str(), "lab");
        });
    }
}
