use crate::constants::MEASURED_POWER_DBM;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Platform address of a peer (MAC on Linux/Windows, UUID on macOS).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceAddress(String);

impl DeviceAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceAddress {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

/// One advertisement seen by the discovery feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    address: DeviceAddress,
    name: String,
    service: Uuid,
    rssi: i16,
}

impl DeviceRecord {
    pub fn new(address: impl Into<DeviceAddress>, name: impl Into<String>, service: Uuid, rssi: i16) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
            service,
            rssi,
        }
    }

    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn service(&self) -> Uuid {
        self.service
    }

    /// Signal strength in dBm
    pub fn rssi(&self) -> i16 {
        self.rssi
    }

    /// Rough distance in metres derived from RSSI.
    ///
    /// Uses the usual log-distance fit with a measured power of -59 dBm at
    /// one metre. Walls and body blocking skew it badly; treat it as a hint
    /// for ordering, not a measurement. An RSSI of 0 means "unknown" and maps
    /// to infinity.
    pub fn approximate_distance_m(&self) -> f64 {
        if self.rssi == 0 {
            return f64::INFINITY;
        }
        let ratio = f64::from(self.rssi) / MEASURED_POWER_DBM;
        if ratio < 1.0 {
            ratio.powi(10)
        } else {
            0.89976 * ratio.powf(7.7095) + 0.111
        }
    }
}

impl fmt::Display for DeviceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {} dBm)", self.name, self.address, self.rssi)
    }
}
