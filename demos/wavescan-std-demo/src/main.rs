// Scripted console session against the simulator device: scan, join a
// network, run analysis jobs, serve an AP, and shut down. Run with
// RUST_LOG-style filtering via the builder below.

use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use env_logger::Builder;
use log::{log, LevelFilter};

use wavescan_core_lib::config_store::MemoryConfigStore;
use wavescan_core_lib::link_probe::SyntheticProbe;
use wavescan_core_lib::status_monitor::LogStatusSink;
use wavescan_core_lib::wifi_devices::{ActiveWifiDevice, Security};
use wavescan_core_lib::{CoreConfiguration, DiagnosticsManager, ReceiveResponseError};

const SCRIPT: [&str; 10] = [
    "help",
    "scan",
    "connect HomeLab hunter2hunter2",
    "status",
    "latency gateway COUNT=3",
    "chanscan",
    "throughput iperf.lab SECS=2",
    "startap SSID=WaveScan CH=6",
    "stopap",
    "tasks",
];

#[embassy_executor::task]
async fn operator_task(manager: &'static DiagnosticsManager) {
    for line in SCRIPT {
        log!(log::Level::Info, "> {}", line);
        if let Err(error) = manager.submit_command(line).await {
            log!(log::Level::Error, "submission refused: {:?}", error);
        }
        // Let each command settle before the next, as a human operator would.
        Timer::after(Duration::from_millis(700)).await;
    }
    Timer::after(Duration::from_secs(2)).await;
    let _ = manager.request_shutdown();
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    Builder::new().filter_level(LevelFilter::Info).init();
    log!(log::Level::Info, "Starting up");

    let device = ActiveWifiDevice::new()
        .with_network("HomeLab", 6, -44, Security::Wpa2)
        .with_network("CoffeeShop", 1, -70, Security::Open)
        .with_network("Office5G", 11, -58, Security::Wpa3);
    let probe = SyntheticProbe::new(42);
    let store: &'static mut MemoryConfigStore = Box::leak(Box::new(MemoryConfigStore::new()));
    let sink: &'static mut LogStatusSink = Box::leak(Box::new(LogStatusSink));

    let mut manager_temp = DiagnosticsManager::new();
    let config = CoreConfiguration {
        rng_seed: 42,
        ..Default::default()
    };
    if let Err(error) = manager_temp.initialize(config, spawner, device, probe, store, sink) {
        log!(log::Level::Error, "initialization failed: {:?}", error);
        return;
    }
    let manager: &'static DiagnosticsManager = Box::leak(Box::new(manager_temp));

    spawner.spawn(operator_task(manager)).unwrap();

    loop {
        match manager.next_console_response(Duration::from_secs(5)).await {
            Ok(response) => log!(log::Level::Info, "{}", response),
            Err(ReceiveResponseError::Timeout) => {
                log!(log::Level::Info, "no more responses, exiting");
                break;
            }
            Err(_) => break,
        }
    }
    log!(log::Level::Info, "Demo finished");
}
