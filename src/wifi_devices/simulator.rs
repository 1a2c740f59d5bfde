//! Scripted WiFi device for host demos and tests.
//!
//! The device holds a fixed set of simulated networks and a one-shot fault
//! injection slot. Joining an open network succeeds; joining a secured
//! network requires any credential; an injected fault fails exactly the next
//! driver call. Link loss is scripted through [`SimulatorDevice::drop_link`].

use embassy_time::{Duration, Timer};
use heapless::String;

use super::{DeviceFault, ScanEntry, ScanTable, Security, WifiDevice};
use crate::messages::{ApConfig, Credential};

pub struct SimulatorDevice {
    networks: ScanTable,
    fail_next: Option<DeviceFault>,
    /// Simulated driver latency per operation.
    latency: Duration,
    link_up: bool,
    ap_active: bool,
}

impl SimulatorDevice {
    pub fn new() -> Self {
        SimulatorDevice {
            networks: ScanTable::new(),
            fail_next: None,
            latency: Duration::from_millis(0),
            link_up: false,
            ap_active: false,
        }
    }

    /// Adds a visible network to the simulated neighborhood.
    pub fn with_network(mut self, ssid: &str, channel: u8, rssi_dbm: i8, security: Security) -> Self {
        let mut entry_ssid = String::new();
        let _ = entry_ssid.push_str(ssid);
        let index = self.networks.len() as u8;
        let _ = self.networks.push(ScanEntry {
            ssid: entry_ssid,
            bssid: [0x02, 0x00, 0x00, 0x00, 0x00, index],
            rssi_dbm,
            channel,
            security,
            hidden: false,
        });
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fails exactly the next driver call with `fault`.
    pub fn fail_next(&mut self, fault: DeviceFault) {
        self.fail_next = Some(fault);
    }

    /// Scripts a link loss the coordinator will detect on its next poll.
    pub fn drop_link(&mut self) {
        self.link_up = false;
    }

    async fn step(&mut self) -> Result<(), DeviceFault> {
        if self.latency.as_ticks() > 0 {
            Timer::after(self.latency).await;
        }
        match self.fail_next.take() {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }
}

impl WifiDevice for SimulatorDevice {
    async fn scan(&mut self) -> Result<ScanTable, DeviceFault> {
        self.step().await?;
        Ok(self.networks.clone())
    }

    async fn join(&mut self, ssid: &str, credential: Option<&Credential>) -> Result<u8, DeviceFault> {
        self.step().await?;
        let network = self
            .networks
            .iter()
            .find(|entry| entry.ssid.as_str() == ssid)
            .ok_or(DeviceFault::NetworkNotFound)?;
        if network.security != Security::Open && credential.is_none() {
            return Err(DeviceFault::AuthFailed);
        }
        self.link_up = true;
        Ok(network.channel)
    }

    async fn leave(&mut self) -> Result<(), DeviceFault> {
        self.step().await?;
        self.link_up = false;
        Ok(())
    }

    async fn start_ap(&mut self, _config: &ApConfig) -> Result<(), DeviceFault> {
        self.step().await?;
        self.ap_active = true;
        Ok(())
    }

    async fn stop_ap(&mut self) -> Result<(), DeviceFault> {
        self.step().await?;
        self.ap_active = false;
        Ok(())
    }

    fn link_up(&self) -> bool {
        self.link_up
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn join_requires_a_visible_network() {
        let mut device = SimulatorDevice::new().with_network("lab", 6, -40, Security::Open);
        block_on(async {
            assert_eq!(device.join("lab", None).await, Ok(6));
            assert!(device.link_up());
            assert_eq!(device.join("ghost", None).await, Err(DeviceFault::NetworkNotFound));
        });
    }

    #[test]
    fn secured_network_rejects_open_join() {
        let mut device = SimulatorDevice::new().with_network("secure", 11, -55, Security::Wpa2);
        block_on(async {
            assert_eq!(device.join("secure", None).await, Err(DeviceFault::AuthFailed));
            let credential = Credential::from_text("hunter2hunter2").unwrap();
            assert_eq!(device.join("secure", Some(&credential)).await, Ok(11));
        });
    }

    #[test]
    fn injected_fault_fails_exactly_one_call() {
        let mut device = SimulatorDevice::new().with_network("lab", 1, -60, Security::Open);
        device.fail_next(DeviceFault::ScanFailed);
        block_on(async {
            assert_eq!(device.scan().await, Err(DeviceFault::ScanFailed));
            assert_eq!(device.scan().await.map(|t| t.len()), Ok(1));
        });
    }
}
