#![cfg_attr(not(feature = "std"), no_std)]
#![allow(async_fn_in_trait)] // We control the usage of these traits

#[cfg(all(not(test), not(any(feature = "wifi-device-simulator", feature = "wifi-device-loopback"))))]
compile_error!("At least one WiFi device implementation feature must be enabled");

mod analysis_worker;
pub mod command_router;
pub mod config_store;
pub mod guarded_region;
pub mod link_probe;
pub mod message_channel;
pub mod messages;
pub mod radio_coordinator;
pub mod signal_set;
pub mod status_monitor;
pub mod task_supervisor;
pub mod web_console;
pub mod wifi_devices;

#[cfg(all(test, feature = "std"))]
mod test_support;

use embassy_executor::Spawner;
use embassy_time::Duration;
use log::log;
use rand_core::RngCore;
use rand_core::SeedableRng;
use rand_wyrand::WyRand;

use crate::command_router::{CommandRouter, ResponsePath, SubmitError};
use crate::config_store::ConfigStore;
use crate::guarded_region::GuardedRegion;
use crate::message_channel::{MessageChannel, ReceiveError};
use crate::messages::{AnalysisCommand, ApConfig, Command, CommandOrigin, CommandResponse, CorrelationId, RadioCommand};
use crate::radio_coordinator::WifiState;
use crate::signal_set::{SignalSet, WaitError};
use crate::status_monitor::StatusSink;
use crate::task_supervisor::{CoreAffinity, TaskId, TaskPriority, TaskReport, TaskSpec, TaskSupervisor, MAX_TASKS};
use crate::web_console::{WebRequest, WebResponse};
use crate::wifi_devices::ScanTable;

#[cfg(any(feature = "wifi-device-simulator", feature = "wifi-device-loopback"))]
use crate::analysis_worker::analysis_worker_task;
#[cfg(any(feature = "wifi-device-simulator", feature = "wifi-device-loopback"))]
use crate::link_probe::ActiveLinkProbe;
#[cfg(any(feature = "wifi-device-simulator", feature = "wifi-device-loopback"))]
use crate::radio_coordinator::radio_coordinator_task;
use crate::status_monitor::status_monitor_task;
use crate::task_supervisor::health_monitor_task;
use crate::web_console::web_console_task;
#[cfg(any(feature = "wifi-device-simulator", feature = "wifi-device-loopback"))]
use crate::wifi_devices::ActiveWifiDevice;

/// Signal bits shared across the whole task graph. The first two are pulses
/// consumed by whoever waited on them; the rest are level bits maintained by
/// their owning task.
pub mod events {
    /// WiFi mode changed; raised on every coordinator state transition.
    pub const CONNECTIVITY_CHANGED: u32 = 1 << 0;
    /// A scan finished and the scan table was replaced.
    pub const SCAN_COMPLETE: u32 = 1 << 1;
    /// A station link is established.
    pub const STATION_ACTIVE: u32 = 1 << 2;
    /// The soft AP is serving.
    pub const AP_ACTIVE: u32 = 1 << 3;
    /// An analysis job is running.
    pub const ANALYSIS_RUNNING: u32 = 1 << 4;
    /// The web console adapter is up.
    pub const WEB_CONSOLE_ACTIVE: u32 = 1 << 5;
    /// The health monitor found a task that stopped heartbeating.
    pub const TASK_FAULT: u32 = 1 << 6;
    /// Orderly shutdown requested; wakes every waiting task.
    pub const SHUTDOWN: u32 = 1 << 7;
}

/// Producer-side bound on how long a send may park before reporting `Full`.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(100);

/// Bound on every guarded-region acquire. Holders are required to finish
/// well inside this; an expiry means someone broke the hold-time contract.
pub const REGION_ACQUIRE_TIMEOUT: Duration = Duration::from_millis(100);

pub const RADIO_COMMAND_QUEUE_SIZE: usize = 10;
pub type RadioCommandChannel = MessageChannel<Command<RadioCommand>, RADIO_COMMAND_QUEUE_SIZE>;

#[cfg(feature = "embedded")]
static RADIO_COMMAND_QUEUE: RadioCommandChannel = RadioCommandChannel::new("radio-commands");

pub const ANALYSIS_COMMAND_QUEUE_SIZE: usize = 5;
pub type AnalysisCommandChannel = MessageChannel<Command<AnalysisCommand>, ANALYSIS_COMMAND_QUEUE_SIZE>;

#[cfg(feature = "embedded")]
static ANALYSIS_COMMAND_QUEUE: AnalysisCommandChannel = AnalysisCommandChannel::new("analysis-commands");

pub const CONSOLE_RESPONSE_QUEUE_SIZE: usize = 15;
pub type ConsoleResponseChannel = MessageChannel<CommandResponse, CONSOLE_RESPONSE_QUEUE_SIZE>;

#[cfg(feature = "embedded")]
static CONSOLE_RESPONSE_QUEUE: ConsoleResponseChannel = ConsoleResponseChannel::new("console-responses");

pub const WEB_COMMAND_RESPONSE_QUEUE_SIZE: usize = 8;
pub type WebCommandResponseChannel = MessageChannel<CommandResponse, WEB_COMMAND_RESPONSE_QUEUE_SIZE>;

#[cfg(feature = "embedded")]
static WEB_COMMAND_RESPONSE_QUEUE: WebCommandResponseChannel = WebCommandResponseChannel::new("web-cmd-responses");

/// Sized for one in-flight internal request plus one stale leftover.
pub const INTERNAL_RESPONSE_QUEUE_SIZE: usize = 2;
pub type InternalResponseChannel = MessageChannel<CommandResponse, INTERNAL_RESPONSE_QUEUE_SIZE>;

#[cfg(feature = "embedded")]
static INTERNAL_RESPONSE_QUEUE: InternalResponseChannel = InternalResponseChannel::new("internal-responses");

pub const WEB_REQUEST_QUEUE_SIZE: usize = 8;
pub type WebRequestChannel = MessageChannel<WebRequest, WEB_REQUEST_QUEUE_SIZE>;

#[cfg(feature = "embedded")]
static WEB_REQUEST_QUEUE: WebRequestChannel = WebRequestChannel::new("web-requests");

pub const WEB_RESPONSE_QUEUE_SIZE: usize = 8;
pub type WebResponseChannel = MessageChannel<WebResponse, WEB_RESPONSE_QUEUE_SIZE>;

#[cfg(feature = "embedded")]
static WEB_RESPONSE_QUEUE: WebResponseChannel = WebResponseChannel::new("web-responses");

pub type WifiStateRegion = GuardedRegion<WifiState>;

#[cfg(feature = "embedded")]
static WIFI_STATE_REGION: WifiStateRegion = GuardedRegion::new("wifi-state", WifiState::boot());

pub type ScanTableRegion = GuardedRegion<ScanTable>;

#[cfg(feature = "embedded")]
static SCAN_TABLE_REGION: ScanTableRegion = GuardedRegion::new("scan-table", ScanTable::new());

#[cfg(feature = "embedded")]
static SIGNALS: SignalSet = SignalSet::new();

#[cfg(feature = "embedded")]
static SUPERVISOR: TaskSupervisor = TaskSupervisor::new();

#[cfg(feature = "embedded")]
static RESPONSE_PATH: ResponsePath = ResponsePath::new(&CONSOLE_RESPONSE_QUEUE, &WEB_COMMAND_RESPONSE_QUEUE, &INTERNAL_RESPONSE_QUEUE);

#[cfg(feature = "embedded")]
static ROUTER: CommandRouter = CommandRouter::new(
    &RADIO_COMMAND_QUEUE,
    &ANALYSIS_COMMAND_QUEUE,
    &RESPONSE_PATH,
    &SUPERVISOR,
    &WIFI_STATE_REGION,
    &SCAN_TABLE_REGION,
);

/// Boot-time capability and tuning knobs. Features that the original design
/// compiled in or out are runtime flags here, so one binary serves every
/// appliance variant.
pub struct CoreConfiguration {
    /// Register the status monitor task and drive the indicator sink.
    pub enable_status_monitor: bool,
    /// Register the web console adapter task.
    pub enable_web_console: bool,
    /// Start with periodic auto-scan enabled (`scan on` at boot).
    pub auto_scan: bool,
    pub auto_scan_interval: Duration,
    /// A task is stale after `liveness_multiple` missed heartbeats.
    pub liveness_multiple: u32,
    pub health_sweep_interval: Duration,
    /// Active AP parameters until a persisted config overrides them.
    pub ap_defaults: ApConfig,
    pub rng_seed: u64,
}

impl Default for CoreConfiguration {
    fn default() -> Self {
        CoreConfiguration {
            enable_status_monitor: true,
            enable_web_console: false,
            auto_scan: false,
            auto_scan_interval: Duration::from_secs(30),
            liveness_multiple: 3,
            health_sweep_interval: Duration::from_secs(5),
            ap_defaults: ApConfig::default(),
            rng_seed: 0,
        }
    }
}

/// Startup failure; names the task that could not be created so the boot
/// diagnostic identifies the exhausted resource.
#[cfg_attr(feature = "std", derive(Debug))]
pub enum InitError {
    ResourceExhausted(&'static str),
}

#[cfg_attr(feature = "std", derive(Debug))]
pub enum SubmitCommandError {
    NotInited,
    Rejected(SubmitError),
}

#[cfg_attr(feature = "std", derive(Debug))]
pub enum ReceiveResponseError {
    NotInited,
    Timeout,
    Closed,
}

#[cfg_attr(feature = "std", derive(Debug))]
pub enum WebRequestError {
    NotInited,
    ChannelFull,
    Closed,
}

#[cfg_attr(feature = "std", derive(Debug))]
pub enum SnapshotError {
    NotInited,
    /// The region could not be acquired within the timeout.
    Busy,
}

#[cfg_attr(feature = "std", derive(Debug))]
pub enum EventWaitError {
    NotInited,
    Timeout,
    ResourceExhausted,
}

#[cfg_attr(feature = "std", derive(Debug))]
pub enum AccessError {
    NotInited,
}

struct Wiring {
    router: &'static CommandRouter,
    console_responses: &'static ConsoleResponseChannel,
    web_requests: &'static WebRequestChannel,
    web_responses: &'static WebResponseChannel,
    wifi_state: &'static WifiStateRegion,
    scan_table: &'static ScanTableRegion,
    signals: &'static SignalSet,
    supervisor: &'static TaskSupervisor,
    radio_commands: &'static RadioCommandChannel,
    analysis_commands: &'static AnalysisCommandChannel,
}

enum DiagnosticsManagerState {
    Uninitialized,
    Initialized(Wiring),
}

/// Boot-time facade: wires queues, regions, signals and tasks together and
/// fronts the embedding API. Construct once, initialize once, then submit
/// commands and read responses/snapshots through it.
pub struct DiagnosticsManager {
    state: DiagnosticsManagerState,
}

impl DiagnosticsManager {
    pub const fn new() -> Self {
        DiagnosticsManager {
            state: DiagnosticsManagerState::Uninitialized,
        }
    }

    fn wiring(&self) -> Result<&Wiring, AccessError> {
        match &self.state {
            DiagnosticsManagerState::Uninitialized => Err(AccessError::NotInited),
            DiagnosticsManagerState::Initialized(wiring) => Ok(wiring),
        }
    }

    #[cfg(all(feature = "embedded", any(feature = "wifi-device-simulator", feature = "wifi-device-loopback")))]
    pub fn initialize(
        &mut self,
        config: CoreConfiguration,
        spawner: Spawner,
        device: ActiveWifiDevice,
        probe: ActiveLinkProbe,
        store: &'static mut dyn ConfigStore,
        status_sink: &'static mut dyn StatusSink,
    ) -> Result<(), InitError> {
        self.initialize_common(
            config,
            spawner,
            device,
            probe,
            store,
            status_sink,
            &ROUTER,
            &RESPONSE_PATH,
            &SUPERVISOR,
            &SIGNALS,
            &RADIO_COMMAND_QUEUE,
            &ANALYSIS_COMMAND_QUEUE,
            &CONSOLE_RESPONSE_QUEUE,
            &WEB_COMMAND_RESPONSE_QUEUE,
            &WEB_REQUEST_QUEUE,
            &WEB_RESPONSE_QUEUE,
            &WIFI_STATE_REGION,
            &SCAN_TABLE_REGION,
        )
    }

    #[cfg(all(feature = "std", any(feature = "wifi-device-simulator", feature = "wifi-device-loopback")))]
    pub fn initialize(
        &mut self,
        config: CoreConfiguration,
        spawner: Spawner,
        device: ActiveWifiDevice,
        probe: ActiveLinkProbe,
        store: &'static mut dyn ConfigStore,
        status_sink: &'static mut dyn StatusSink,
    ) -> Result<(), InitError> {
        let radio_commands: &'static RadioCommandChannel = Box::leak(Box::new(RadioCommandChannel::new("radio-commands")));
        let analysis_commands: &'static AnalysisCommandChannel =
            Box::leak(Box::new(AnalysisCommandChannel::new("analysis-commands")));
        let console_responses: &'static ConsoleResponseChannel =
            Box::leak(Box::new(ConsoleResponseChannel::new("console-responses")));
        let web_command_responses: &'static WebCommandResponseChannel =
            Box::leak(Box::new(WebCommandResponseChannel::new("web-cmd-responses")));
        let internal_responses: &'static InternalResponseChannel =
            Box::leak(Box::new(InternalResponseChannel::new("internal-responses")));
        let web_requests: &'static WebRequestChannel = Box::leak(Box::new(WebRequestChannel::new("web-requests")));
        let web_responses: &'static WebResponseChannel = Box::leak(Box::new(WebResponseChannel::new("web-responses")));
        let wifi_state: &'static WifiStateRegion =
            Box::leak(Box::new(GuardedRegion::new("wifi-state", WifiState::boot())));
        let scan_table: &'static ScanTableRegion = Box::leak(Box::new(GuardedRegion::new("scan-table", ScanTable::new())));
        let signals: &'static SignalSet = Box::leak(Box::new(SignalSet::new()));
        let supervisor: &'static TaskSupervisor = Box::leak(Box::new(TaskSupervisor::new()));
        let responses: &'static ResponsePath =
            Box::leak(Box::new(ResponsePath::new(console_responses, web_command_responses, internal_responses)));
        let router: &'static CommandRouter = Box::leak(Box::new(CommandRouter::new(
            radio_commands,
            analysis_commands,
            responses,
            supervisor,
            wifi_state,
            scan_table,
        )));
        self.initialize_common(
            config,
            spawner,
            device,
            probe,
            store,
            status_sink,
            router,
            responses,
            supervisor,
            signals,
            radio_commands,
            analysis_commands,
            console_responses,
            web_command_responses,
            web_requests,
            web_responses,
            wifi_state,
            scan_table,
        )
    }

    #[cfg(any(feature = "wifi-device-simulator", feature = "wifi-device-loopback"))]
    #[allow(clippy::too_many_arguments)]
    fn initialize_common(
        &mut self,
        config: CoreConfiguration,
        spawner: Spawner,
        device: ActiveWifiDevice,
        probe: ActiveLinkProbe,
        store: &'static mut dyn ConfigStore,
        status_sink: &'static mut dyn StatusSink,
        router: &'static CommandRouter,
        responses: &'static ResponsePath,
        supervisor: &'static TaskSupervisor,
        signals: &'static SignalSet,
        radio_commands: &'static RadioCommandChannel,
        analysis_commands: &'static AnalysisCommandChannel,
        console_responses: &'static ConsoleResponseChannel,
        web_command_responses: &'static WebCommandResponseChannel,
        web_requests: &'static WebRequestChannel,
        web_responses: &'static WebResponseChannel,
        wifi_state: &'static WifiStateRegion,
        scan_table: &'static ScanTableRegion,
    ) -> Result<(), InitError> {
        // Destructure to avoid partial moves later
        let CoreConfiguration {
            enable_status_monitor,
            enable_web_console,
            auto_scan,
            auto_scan_interval,
            liveness_multiple,
            health_sweep_interval,
            ap_defaults,
            rng_seed,
        } = config;
        let mut rng = WyRand::seed_from_u64(rng_seed);

        supervisor
            .create(
                TaskSpec {
                    name: "radio-coordinator",
                    priority: TaskPriority::Medium,
                    affinity: CoreAffinity::Any,
                    stack_words: 4096,
                    // Covers the longest single driver call (the scan budget)
                    // so a legal scan is never flagged stale.
                    expected_heartbeat: Duration::from_secs(20),
                },
                |context| {
                    spawner.spawn(radio_coordinator_task(
                        context,
                        radio_commands,
                        device,
                        store,
                        wifi_state,
                        scan_table,
                        signals,
                        responses,
                        ap_defaults,
                        auto_scan,
                        auto_scan_interval,
                    ))
                },
            )
            .map_err(|_| InitError::ResourceExhausted("radio-coordinator"))?;
        log!(log::Level::Debug, "Radio coordinator task spawned");

        supervisor
            .create(
                TaskSpec {
                    name: "analysis-worker",
                    priority: TaskPriority::Medium,
                    affinity: CoreAffinity::Any,
                    stack_words: 4096,
                    expected_heartbeat: Duration::from_secs(2),
                },
                |context| {
                    spawner.spawn(analysis_worker_task(
                        context,
                        probe,
                        analysis_commands,
                        radio_commands,
                        responses,
                        wifi_state,
                        scan_table,
                        signals,
                        rng.next_u64(),
                    ))
                },
            )
            .map_err(|_| InitError::ResourceExhausted("analysis-worker"))?;
        log!(log::Level::Debug, "Analysis worker task spawned");

        if enable_status_monitor {
            supervisor
                .create(
                    TaskSpec {
                        name: "status-monitor",
                        priority: TaskPriority::Low,
                        affinity: CoreAffinity::Any,
                        stack_words: 2048,
                        expected_heartbeat: Duration::from_secs(2),
                    },
                    |context| spawner.spawn(status_monitor_task(context, signals, wifi_state, status_sink)),
                )
                .map_err(|_| InitError::ResourceExhausted("status-monitor"))?;
            log!(log::Level::Debug, "Status monitor task spawned");
        }

        if enable_web_console {
            supervisor
                .create(
                    TaskSpec {
                        name: "web-console",
                        priority: TaskPriority::High,
                        affinity: CoreAffinity::Any,
                        stack_words: 4096,
                        expected_heartbeat: Duration::from_secs(2),
                    },
                    |context| {
                        spawner.spawn(web_console_task(
                            context,
                            router,
                            web_requests,
                            web_responses,
                            web_command_responses,
                            signals,
                        ))
                    },
                )
                .map_err(|_| InitError::ResourceExhausted("web-console"))?;
            log!(log::Level::Debug, "Web console task spawned");
        }

        supervisor
            .create(
                TaskSpec {
                    name: "health-monitor",
                    priority: TaskPriority::Low,
                    affinity: CoreAffinity::Any,
                    stack_words: 2048,
                    expected_heartbeat: health_sweep_interval,
                },
                |context| {
                    spawner.spawn(health_monitor_task(
                        context,
                        supervisor,
                        signals,
                        health_sweep_interval,
                        liveness_multiple,
                    ))
                },
            )
            .map_err(|_| InitError::ResourceExhausted("health-monitor"))?;
        log!(log::Level::Info, "Diagnostics core initialized");

        self.state = DiagnosticsManagerState::Initialized(Wiring {
            router,
            console_responses,
            web_requests,
            web_responses,
            wifi_state,
            scan_table,
            signals,
            supervisor,
            radio_commands,
            analysis_commands,
        });
        Ok(())
    }

    /// Submits one console line. The returned id correlates the eventual
    /// response from [`next_console_response`](Self::next_console_response).
    pub async fn submit_command(&self, line: &str) -> Result<CorrelationId, SubmitCommandError> {
        let wiring = self.wiring().map_err(|_| SubmitCommandError::NotInited)?;
        wiring
            .router
            .submit(line, CommandOrigin::Console)
            .await
            .map_err(SubmitCommandError::Rejected)
    }

    pub async fn next_console_response(&self, timeout: Duration) -> Result<CommandResponse, ReceiveResponseError> {
        let wiring = self.wiring().map_err(|_| ReceiveResponseError::NotInited)?;
        wiring.console_responses.receive(timeout).await.map_err(|error| match error {
            ReceiveError::Timeout => ReceiveResponseError::Timeout,
            ReceiveError::Closed => ReceiveResponseError::Closed,
        })
    }

    /// Hands a decoded HTTP request to the web console adapter.
    pub fn submit_web_request(&self, request: WebRequest) -> Result<(), WebRequestError> {
        let wiring = self.wiring().map_err(|_| WebRequestError::NotInited)?;
        use crate::message_channel::SendError;
        wiring.web_requests.try_send(request).map_err(|error| match error {
            SendError::Closed(_) => WebRequestError::Closed,
            _ => WebRequestError::ChannelFull,
        })
    }

    pub async fn next_web_response(&self, timeout: Duration) -> Result<WebResponse, ReceiveResponseError> {
        let wiring = self.wiring().map_err(|_| ReceiveResponseError::NotInited)?;
        wiring.web_responses.receive(timeout).await.map_err(|error| match error {
            ReceiveError::Timeout => ReceiveResponseError::Timeout,
            ReceiveError::Closed => ReceiveResponseError::Closed,
        })
    }

    /// Snapshot of the connectivity state. Readers never hold the region.
    pub async fn wifi_state(&self) -> Result<WifiState, SnapshotError> {
        let wiring = self.wiring().map_err(|_| SnapshotError::NotInited)?;
        wiring
            .wifi_state
            .snapshot(TaskId::EMBEDDER, REGION_ACQUIRE_TIMEOUT)
            .await
            .map_err(|_| SnapshotError::Busy)
    }

    /// Snapshot of the latest scan results.
    pub async fn scan_results(&self) -> Result<ScanTable, SnapshotError> {
        let wiring = self.wiring().map_err(|_| SnapshotError::NotInited)?;
        wiring
            .scan_table
            .snapshot(TaskId::EMBEDDER, REGION_ACQUIRE_TIMEOUT)
            .await
            .map_err(|_| SnapshotError::Busy)
    }

    /// Waits for any of the [`events`] bits in `mask`.
    pub async fn wait_events(&self, mask: u32, timeout: Duration) -> Result<u32, EventWaitError> {
        let wiring = self.wiring().map_err(|_| EventWaitError::NotInited)?;
        wiring.signals.wait_any(mask, timeout).await.map_err(|error| match error {
            WaitError::Timeout => EventWaitError::Timeout,
            WaitError::ResourceExhausted => EventWaitError::ResourceExhausted,
        })
    }

    pub fn raise_events(&self, mask: u32) -> Result<(), AccessError> {
        self.wiring()?.signals.raise(mask);
        Ok(())
    }

    pub fn clear_events(&self, mask: u32) -> Result<(), AccessError> {
        self.wiring()?.signals.clear(mask);
        Ok(())
    }

    pub fn task_reports(&self) -> Result<heapless::Vec<TaskReport, MAX_TASKS>, AccessError> {
        Ok(self.wiring()?.supervisor.reports())
    }

    /// Begins cooperative shutdown: raises the shutdown bit, flags every
    /// registered task, and closes the inbound channels so blocked producers
    /// and consumers drain out. Tasks exit at their next blocking point.
    pub fn request_shutdown(&self) -> Result<(), AccessError> {
        let wiring = self.wiring()?;
        wiring.signals.raise(events::SHUTDOWN);
        wiring.supervisor.request_shutdown_all();
        wiring.radio_commands.close();
        wiring.analysis_commands.close();
        wiring.web_requests.close();
        Ok(())
    }
}

impl Default for DiagnosticsManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn manager_submit_command_not_inited() {
        let manager = DiagnosticsManager::new();
        match block_on(manager.submit_command("scan")) {
            Err(SubmitCommandError::NotInited) => {}
            other => panic!("Expected NotInited, got: {:?}", other),
        }
    }

    #[test]
    fn manager_next_console_response_not_inited() {
        let manager = DiagnosticsManager::new();
        match block_on(manager.next_console_response(Duration::from_millis(10))) {
            Err(ReceiveResponseError::NotInited) => {}
            other => panic!("Expected NotInited, got: {:?}", other),
        }
    }

    #[test]
    fn manager_snapshots_not_inited() {
        let manager = DiagnosticsManager::new();
        assert!(matches!(block_on(manager.wifi_state()), Err(SnapshotError::NotInited)));
        assert!(matches!(manager.task_reports(), Err(AccessError::NotInited)));
        assert!(matches!(manager.request_shutdown(), Err(AccessError::NotInited)));
    }

    #[test]
    fn event_bits_are_distinct() {
        let bits = [
            events::CONNECTIVITY_CHANGED,
            events::SCAN_COMPLETE,
            events::STATION_ACTIVE,
            events::AP_ACTIVE,
            events::ANALYSIS_RUNNING,
            events::WEB_CONSOLE_ACTIVE,
            events::TASK_FAULT,
            events::SHUTDOWN,
        ];
        let mut seen = 0u32;
        for bit in bits {
            assert_eq!(seen & bit, 0);
            seen |= bit;
        }
    }

    #[test]
    fn default_configuration_is_consistent() {
        let config = CoreConfiguration::default();
        assert!(config.enable_status_monitor);
        assert!(!config.enable_web_console);
        assert!(config.liveness_multiple >= 1);
        assert!(config.auto_scan_interval > config.health_sweep_interval);
    }
}
