//! # Config Store - Persisted Configuration Collaborator
//!
//! Namespaced key/value persistence consumed by the radio coordinator: the
//! AP configuration at boot and after `apcfg save`, the station profile
//! after successful joins. Values are opaque byte strings to this core;
//! encoding hardening is the store implementation's concern.
//!
//! [`MemoryConfigStore`] ships for hosts and tests; embedded targets provide
//! an NVS/flash-backed implementation of the same trait.

use heapless::{String, Vec};

use crate::messages::{ApConfig, Credential, StationProfile};

pub const AP_NAMESPACE: &str = "ap-config";
pub const STATION_NAMESPACE: &str = "sta-config";

pub const MAX_CONFIG_RECORDS: usize = 8;

#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct ConfigRecord {
    pub key: String<16>,
    pub value: Vec<u8, 64>,
}

impl ConfigRecord {
    pub fn new(key: &str, value: &[u8]) -> Option<ConfigRecord> {
        let mut record = ConfigRecord {
            key: String::new(),
            value: Vec::new(),
        };
        record.key.push_str(key).ok()?;
        record.value.extend_from_slice(value).ok()?;
        Some(record)
    }
}

pub type KeyValueMap = Vec<ConfigRecord, MAX_CONFIG_RECORDS>;

#[cfg_attr(feature = "std", derive(Debug))]
#[derive(PartialEq, Eq)]
pub enum StoreError {
    WriteError,
}

pub trait ConfigStore {
    /// Loads a namespace; `None` when it was never saved or was cleared.
    fn load(&mut self, namespace: &str) -> Option<KeyValueMap>;

    fn save(&mut self, namespace: &str, records: &KeyValueMap) -> Result<(), StoreError>;

    fn clear(&mut self, namespace: &str) -> Result<(), StoreError>;
}

/// Volatile store for hosts and tests.
pub struct MemoryConfigStore {
    spaces: Vec<(String<16>, KeyValueMap), 4>,
}

impl MemoryConfigStore {
    pub const fn new() -> Self {
        MemoryConfigStore { spaces: Vec::new() }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&mut self, namespace: &str) -> Option<KeyValueMap> {
        self.spaces
            .iter()
            .find(|(name, _)| name.as_str() == namespace)
            .map(|(_, records)| records.clone())
    }

    fn save(&mut self, namespace: &str, records: &KeyValueMap) -> Result<(), StoreError> {
        if let Some((_, existing)) = self.spaces.iter_mut().find(|(name, _)| name.as_str() == namespace) {
            *existing = records.clone();
            return Ok(());
        }
        let mut name = String::new();
        name.push_str(namespace).map_err(|_| StoreError::WriteError)?;
        self.spaces.push((name, records.clone())).map_err(|_| StoreError::WriteError)
    }

    fn clear(&mut self, namespace: &str) -> Result<(), StoreError> {
        self.spaces.retain(|(name, _)| name.as_str() != namespace);
        Ok(())
    }
}

fn record_value<'a>(records: &'a KeyValueMap, key: &str) -> Option<&'a [u8]> {
    records
        .iter()
        .find(|record| record.key.as_str() == key)
        .map(|record| record.value.as_slice())
}

impl ApConfig {
    pub fn to_records(&self) -> KeyValueMap {
        let mut records = KeyValueMap::new();
        // Capacity is 8, four records always fit.
        if let Some(record) = ConfigRecord::new("ssid", self.ssid.as_bytes()) {
            let _ = records.push(record);
        }
        if let Some(credential) = &self.credential {
            if let Some(record) = ConfigRecord::new("cred", credential.as_bytes()) {
                let _ = records.push(record);
            }
        }
        if let Some(record) = ConfigRecord::new("chan", &[self.channel]) {
            let _ = records.push(record);
        }
        if let Some(record) = ConfigRecord::new("auto", &[self.auto_start as u8]) {
            let _ = records.push(record);
        }
        records
    }

    pub fn from_records(records: &KeyValueMap) -> Option<ApConfig> {
        let ssid_bytes = record_value(records, "ssid")?;
        let mut ssid = String::new();
        ssid.push_str(core::str::from_utf8(ssid_bytes).ok()?).ok()?;
        let credential = record_value(records, "cred").and_then(Credential::from_bytes);
        let channel = record_value(records, "chan").and_then(|v| v.first().copied()).unwrap_or(1);
        if !(1..=13).contains(&channel) {
            return None;
        }
        let auto_start = record_value(records, "auto").and_then(|v| v.first().copied()).unwrap_or(0) != 0;
        Some(ApConfig {
            ssid,
            credential,
            channel,
            auto_start,
        })
    }
}

impl StationProfile {
    pub fn to_records(&self) -> KeyValueMap {
        let mut records = KeyValueMap::new();
        if let Some(record) = ConfigRecord::new("ssid", self.ssid.as_bytes()) {
            let _ = records.push(record);
        }
        if let Some(credential) = &self.credential {
            if let Some(record) = ConfigRecord::new("cred", credential.as_bytes()) {
                let _ = records.push(record);
            }
        }
        records
    }

    pub fn from_records(records: &KeyValueMap) -> Option<StationProfile> {
        let ssid_bytes = record_value(records, "ssid")?;
        let mut ssid = String::new();
        ssid.push_str(core::str::from_utf8(ssid_bytes).ok()?).ok()?;
        let credential = record_value(records, "cred").and_then(Credential::from_bytes);
        Some(StationProfile { ssid, credential })
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn save_load_clear_round_trip() {
        let mut store = MemoryConfigStore::new();
        assert!(store.load(AP_NAMESPACE).is_none());

        let mut config = ApConfig::default();
        config.channel = 6;
        config.auto_start = true;
        store.save(AP_NAMESPACE, &config.to_records()).expect("save");

        let loaded = ApConfig::from_records(&store.load(AP_NAMESPACE).expect("saved")).expect("decodes");
        assert_eq!(loaded, config);

        store.clear(AP_NAMESPACE).expect("clear");
        assert!(store.load(AP_NAMESPACE).is_none());
    }

    #[test]
    fn save_overwrites_the_namespace() {
        let mut store = MemoryConfigStore::new();
        let first = ApConfig::default();
        store.save(AP_NAMESPACE, &first.to_records()).expect("save");
        let mut second = ApConfig::default();
        second.channel = 11;
        store.save(AP_NAMESPACE, &second.to_records()).expect("save");
        let loaded = ApConfig::from_records(&store.load(AP_NAMESPACE).expect("saved")).expect("decodes");
        assert_eq!(loaded.channel, 11);
    }

    #[test]
    fn station_profile_keeps_credential_bytes_opaque() {
        let mut ssid = String::new();
        ssid.push_str("lab").unwrap();
        let profile = StationProfile {
            ssid,
            credential: Credential::from_bytes(&[0xff, 0x00, 0x10, 0x20, 0x30, 0x40, 0x50, 0x60]),
        };
        let decoded = StationProfile::from_records(&profile.to_records()).expect("decodes");
        assert_eq!(decoded, profile);
    }

    #[test]
    fn out_of_range_channel_fails_decode() {
        let mut records = KeyValueMap::new();
        records.push(ConfigRecord::new("ssid", b"x").unwrap()).unwrap();
        records.push(ConfigRecord::new("chan", &[14]).unwrap()).unwrap();
        assert!(ApConfig::from_records(&records).is_none());
    }
}
