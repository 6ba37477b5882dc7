//! Domain models for the fleet poller.
//!
//! Everything here is a cycle-scoped value object: built once from a raw
//! table, handed to the history store and the presentation edge, then
//! dropped.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---

/// Primary activity of a device, decoded from its raw run-status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    OffAndCool,
    Burning,
    Shutdown,
    Unknown,
}

impl RunState {
    pub const ALL: [RunState; 4] = [
        RunState::OffAndCool,
        RunState::Burning,
        RunState::Shutdown,
        RunState::Unknown,
    ];

    /// Operator-facing label.
    pub fn label(&self) -> &'static str {
        match self {
            RunState::OffAndCool => "OFF AND COOL",
            RunState::Burning => "BURNING",
            RunState::Shutdown => "SHUTDOWN",
            RunState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Connectivity classification derived from the recency of the last report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnlineState {
    Online,
    Offline,
    Unknown,
}

impl OnlineState {
    pub const ALL: [OnlineState; 3] = [OnlineState::Online, OnlineState::Offline, OnlineState::Unknown];

    pub fn label(&self) -> &'static str {
        match self {
            OnlineState::Online => "ONLINE",
            OnlineState::Offline => "OFFLINE",
            OnlineState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for OnlineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Network details reported by a device. Each field is independently optional.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkInfo {
    pub ssid: Option<String>,
    pub signal_strength: Option<i64>,
    pub ip_address: Option<String>,
}

impl NetworkInfo {
    /// Returns `None` when none of the parts were present.
    pub fn from_parts(
        ssid: Option<String>,
        signal_strength: Option<i64>,
        ip_address: Option<String>,
    ) -> Option<Self> {
        // ---
        if ssid.is_none() && signal_strength.is_none() && ip_address.is_none() {
            return None;
        }
        Some(Self {
            ssid,
            signal_strength,
            ip_address,
        })
    }
}

/// Normalized status of one device for one poll cycle.
///
/// `online_state`, `network_state` and `activity_state` are the same
/// last-seen timestamp classified at the liveness, staleness and activity
/// thresholds respectively. All three are `Unknown` iff `last_seen` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceStatus {
    // ---
    pub device_id: String,
    pub run_state: RunState,
    pub online_state: OnlineState,
    pub network_state: OnlineState,
    pub activity_state: OnlineState,
    pub last_seen: Option<DateTime<Utc>>,
    /// Whole seconds between `last_seen` and the cycle time, clamped at zero.
    pub since_last_seen: Option<i64>,
    pub temperature: Option<f64>,
    pub setpoint: Option<f64>,
    pub network: Option<NetworkInfo>,
}

impl DeviceStatus {
    /// A status with every decoded field unknown or absent.
    pub fn unknown(device_id: impl Into<String>) -> Self {
        // ---
        Self {
            device_id: device_id.into(),
            run_state: RunState::Unknown,
            online_state: OnlineState::Unknown,
            network_state: OnlineState::Unknown,
            activity_state: OnlineState::Unknown,
            last_seen: None,
            since_last_seen: None,
            temperature: None,
            setpoint: None,
            network: None,
        }
    }

    /// Network fields are only trusted while the device reported within the
    /// staleness window.
    pub fn network_is_current(&self) -> bool {
        self.network_state == OnlineState::Online
    }

    /// Human readable "last seen ... ago" duration.
    pub fn last_seen_ago(&self) -> Option<String> {
        self.since_last_seen.map(format_elapsed)
    }
}

/// Per-state tallies across one snapshot.
///
/// Every variant is present, zero-filled, so serialized counts have a
/// stable shape from cycle to cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FleetCounts {
    pub run: BTreeMap<RunState, usize>,
    pub online: BTreeMap<OnlineState, usize>,
    pub activity: BTreeMap<OnlineState, usize>,
}

impl FleetCounts {
    fn zeroed() -> Self {
        Self {
            run: RunState::ALL.iter().map(|s| (*s, 0)).collect(),
            online: OnlineState::ALL.iter().map(|s| (*s, 0)).collect(),
            activity: OnlineState::ALL.iter().map(|s| (*s, 0)).collect(),
        }
    }

    pub fn tally(devices: &[DeviceStatus]) -> Self {
        // ---
        let mut counts = Self::zeroed();
        for device in devices {
            *counts.run.entry(device.run_state).or_default() += 1;
            *counts.online.entry(device.online_state).or_default() += 1;
            *counts.activity.entry(device.activity_state).or_default() += 1;
        }
        counts
    }

    pub fn run(&self, state: RunState) -> usize {
        self.run.get(&state).copied().unwrap_or(0)
    }

    pub fn online(&self, state: OnlineState) -> usize {
        self.online.get(&state).copied().unwrap_or(0)
    }

    pub fn activity(&self, state: OnlineState) -> usize {
        self.activity.get(&state).copied().unwrap_or(0)
    }

    /// Devices counted in the snapshot.
    pub fn total(&self) -> usize {
        self.run.values().sum()
    }
}

/// Result of one poll cycle across the whole fleet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FleetSnapshot {
    pub taken_at: DateTime<Utc>,
    pub devices: Vec<DeviceStatus>,
    pub counts: FleetCounts,
    /// The store returned no table at all (as opposed to an empty one).
    pub no_data: bool,
}

impl FleetSnapshot {
    pub fn new(taken_at: DateTime<Utc>, devices: Vec<DeviceStatus>) -> Self {
        // ---
        let counts = FleetCounts::tally(&devices);
        Self {
            taken_at,
            devices,
            counts,
            no_data: false,
        }
    }

    pub fn no_data(taken_at: DateTime<Utc>) -> Self {
        Self {
            no_data: true,
            ..Self::new(taken_at, Vec::new())
        }
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn device(&self, device_id: &str) -> Option<&DeviceStatus> {
        self.devices.iter().find(|d| d.device_id == device_id)
    }

    pub fn devices_in(&self, state: RunState) -> impl Iterator<Item = &DeviceStatus> {
        self.devices.iter().filter(move |d| d.run_state == state)
    }

    pub fn devices_online(&self, state: OnlineState) -> impl Iterator<Item = &DeviceStatus> {
        self.devices.iter().filter(move |d| d.online_state == state)
    }
}

/// Render elapsed seconds as `H:MM:SS`, prefixed with a day count once it
/// reaches a full day (`1 day, 2:03:04`).
pub fn format_elapsed(seconds: i64) -> String {
    // ---
    let seconds = seconds.max(0);
    let days = seconds / 86_400;
    let rest = seconds % 86_400;
    let clock = format!("{}:{:02}:{:02}", rest / 3600, (rest % 3600) / 60, rest % 60);

    match days {
        0 => clock,
        1 => format!("1 day, {clock}"),
        n => format!("{n} days, {clock}"),
    }
}
