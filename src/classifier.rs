//! Connectivity classification from last-seen timestamps.

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::ConfigError;
use crate::models::OnlineState;

// ---

pub const DEFAULT_LIVENESS_SECS: u32 = 120;
pub const DEFAULT_STALENESS_SECS: u32 = 3_600;
pub const DEFAULT_ACTIVITY_SECS: u32 = 86_400;

/// Classify a device against one threshold.
///
/// A last-seen time in the future (clock skew between device and poller)
/// counts as zero elapsed, so it is never reported offline.
pub fn classify(last_seen: Option<DateTime<Utc>>, now: DateTime<Utc>, threshold: TimeDelta) -> OnlineState {
    // ---
    let Some(last_seen) = last_seen else {
        return OnlineState::Unknown;
    };

    let delta = (now - last_seen).max(TimeDelta::zero());
    if delta <= threshold {
        OnlineState::Online
    } else {
        OnlineState::Offline
    }
}

/// The three windows a device's last report is judged against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// Network-online detection.
    pub liveness: TimeDelta,
    /// Whether IP/SSID/RSSI are still considered current.
    pub staleness: TimeDelta,
    /// "Has this device reported at all recently".
    pub activity: TimeDelta,
}

impl Thresholds {
    pub fn from_secs(liveness: u32, staleness: u32, activity: u32) -> Result<Self, ConfigError> {
        // ---
        Ok(Self {
            liveness: positive_secs("liveness", liveness)?,
            staleness: positive_secs("staleness", staleness)?,
            activity: positive_secs("activity", activity)?,
        })
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            liveness: TimeDelta::seconds(DEFAULT_LIVENESS_SECS.into()),
            staleness: TimeDelta::seconds(DEFAULT_STALENESS_SECS.into()),
            activity: TimeDelta::seconds(DEFAULT_ACTIVITY_SECS.into()),
        }
    }
}

fn positive_secs(name: &'static str, secs: u32) -> Result<TimeDelta, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::NonPositiveThreshold { name });
    }
    Ok(TimeDelta::seconds(secs.into()))
}
