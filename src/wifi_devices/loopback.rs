//! Trivially-succeeding WiFi device.
//!
//! Every operation completes immediately; `join` lands on a fixed channel.
//! Useful for exercising the task wiring on targets without a radio driver.

use super::{DeviceFault, ScanEntry, ScanTable, Security, WifiDevice};
use crate::messages::{ApConfig, Credential};
use heapless::String;

const LOOPBACK_CHANNEL: u8 = 6;

pub struct LoopbackDevice {
    link_up: bool,
}

impl LoopbackDevice {
    pub const fn new() -> Self {
        LoopbackDevice { link_up: false }
    }
}

impl WifiDevice for LoopbackDevice {
    async fn scan(&mut self) -> Result<ScanTable, DeviceFault> {
        let mut table = ScanTable::new();
        let mut ssid = String::new();
        let _ = ssid.push_str("loopback");
        let _ = table.push(ScanEntry {
            ssid,
            bssid: [0x02, 0, 0, 0, 0, 1],
            rssi_dbm: -30,
            channel: LOOPBACK_CHANNEL,
            security: Security::Open,
            hidden: false,
        });
        Ok(table)
    }

    async fn join(&mut self, _ssid: &str, _credential: Option<&Credential>) -> Result<u8, DeviceFault> {
        self.link_up = true;
        Ok(LOOPBACK_CHANNEL)
    }

    async fn leave(&mut self) -> Result<(), DeviceFault> {
        self.link_up = false;
        Ok(())
    }

    async fn start_ap(&mut self, _config: &ApConfig) -> Result<(), DeviceFault> {
        Ok(())
    }

    async fn stop_ap(&mut self) -> Result<(), DeviceFault> {
        Ok(())
    }

    fn link_up(&self) -> bool {
        self.link_up
    }
}
