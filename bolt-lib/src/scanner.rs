//! Filtering and ranking of discovered robots.
//!
//! The radio side is not handled here. Callers hand in any stream of
//! [`DeviceRecord`]s (one per advertisement) and get back the ones that look
//! like a BOLT.

use crate::constants::{NAME_PREFIX, NAME_SUFFIX_LEN, SERVICE_UUID};
use crate::device::DeviceRecord;
use crate::error::{BoltError, Result};
use futures_lite::{Stream, StreamExt};
use regex::Regex;
use std::pin::pin;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

const DEFAULT_WINDOW: Duration = Duration::from_secs(5);

static HEX_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^[0-9A-Fa-f]{{{NAME_SUFFIX_LEN}}}$")).expect("hex suffix pattern is valid")
});

/// Which advertisements count as a robot, and how long to listen.
#[derive(Debug, Clone)]
pub struct ScanFilter {
    name_prefix: String,
    service: uuid::Uuid,
    min_rssi: Option<i16>,
    window: Duration,
}

impl Default for ScanFilter {
    fn default() -> Self {
        Self {
            name_prefix: NAME_PREFIX.to_string(),
            service: SERVICE_UUID,
            min_rssi: None,
            window: DEFAULT_WINDOW,
        }
    }
}

impl ScanFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    pub fn with_service(mut self, service: uuid::Uuid) -> Self {
        self.service = service;
        self
    }

    /// Drop records weaker than `rssi` dBm.
    pub fn with_min_rssi(mut self, rssi: i16) -> Self {
        self.min_rssi = Some(rssi);
        self
    }

    /// How long [`scan_for_devices`] and [`find_closest`] observe the feed.
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn matches(&self, record: &DeviceRecord) -> bool {
        let name_ok = record
            .name()
            .strip_prefix(self.name_prefix.as_str())
            .is_some_and(|suffix| HEX_SUFFIX.is_match(suffix));
        name_ok && record.service() == self.service && self.min_rssi.is_none_or(|min| record.rssi() >= min)
    }
}

/// Lazily filter a discovery feed. Runs for as long as the feed does.
pub fn scan<S>(feed: S, filter: ScanFilter) -> impl Stream<Item = DeviceRecord>
where
    S: Stream<Item = DeviceRecord>,
{
    feed.filter(move |record| filter.matches(record))
}

/// Collect every matching robot seen during the filter's window.
///
/// Repeated advertisements from one address keep their first-seen position
/// and the latest signal strength. The result is ordered strongest signal
/// first; equal signals stay in first-seen order.
pub async fn scan_for_devices<S>(feed: S, filter: &ScanFilter) -> Vec<DeviceRecord>
where
    S: Stream<Item = DeviceRecord>,
{
    info!("Scanning for BOLT robots for {:?}...", filter.window);
    let deadline = Instant::now() + filter.window;
    let mut matches = pin!(scan(feed, filter.clone()));
    let mut seen: Vec<DeviceRecord> = Vec::new();

    // Ends on the deadline or when the feed runs dry
    while let Ok(Some(record)) = tokio::time::timeout_at(deadline, matches.next()).await {
        debug!(%record, "Matching advertisement");
        match seen.iter_mut().find(|r| r.address() == record.address()) {
            Some(slot) => *slot = record,
            None => seen.push(record),
        }
    }

    seen.sort_by(|a, b| b.rssi().cmp(&a.rssi()));
    info!("Found {} BOLT robot(s)", seen.len());
    seen
}

/// The matching robot with the strongest signal seen during the window.
pub async fn find_closest<S>(feed: S, filter: &ScanFilter) -> Result<DeviceRecord>
where
    S: Stream<Item = DeviceRecord>,
{
    scan_for_devices(feed, filter)
        .await
        .into_iter()
        .next()
        .ok_or(BoltError::DiscoveryTimeout(filter.window))
}

/// The first matching robot, or `DiscoveryTimeout` if none shows up in time.
pub async fn first_match<S>(feed: S, filter: &ScanFilter, timeout: Duration) -> Result<DeviceRecord>
where
    S: Stream<Item = DeviceRecord>,
{
    let mut matches = pin!(scan(feed, filter.clone()));
    match tokio::time::timeout(timeout, matches.next()).await {
        Ok(Some(record)) => {
            info!(%record, "Found BOLT");
            Ok(record)
        }
        Ok(None) | Err(_) => Err(BoltError::DiscoveryTimeout(timeout)),
    }
}
