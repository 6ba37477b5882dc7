//! Normalization of one raw device record into a [`DeviceStatus`].
//!
//! Field locations differ between firmware generations, so they are carried
//! as configuration ([`FieldPaths`]) instead of fixed indices. Every field is
//! read on its own: a missing temperature never prevents the run state or
//! network details from being decoded.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::classifier::{classify, Thresholds};
use crate::codec::{decode_integer, decode_number, decode_run_state, decode_text, parse_timestamp, FieldPath};
use crate::error::BuildError;
use crate::models::{DeviceStatus, NetworkInfo};

// ---

pub const DEFAULT_RUN_STATUS_PATH: &str = "grill/G4/1";
pub const DEFAULT_LAST_SEEN_PATH: &str = "grill/timeStamp";
pub const DEFAULT_TEMPERATURE_PATH: &str = "grill/G4/4";
pub const DEFAULT_SETPOINT_PATH: &str = "grill/G4/3";
pub const DEFAULT_SSID_PATH: &str = "grill/debugData/parmlist/0/ssid";
pub const DEFAULT_RSSI_PATH: &str = "grill/debugData/parmlist/0/rssi";
pub const DEFAULT_IP_ADDRESS_PATH: &str = "grill/ipAddress";

/// Where each decoded field lives inside a device record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPaths {
    pub run_status: FieldPath,
    pub last_seen: FieldPath,
    pub temperature: FieldPath,
    pub setpoint: FieldPath,
    pub ssid: FieldPath,
    pub rssi: FieldPath,
    pub ip_address: FieldPath,
}

impl Default for FieldPaths {
    fn default() -> Self {
        Self {
            run_status: FieldPath::literal(DEFAULT_RUN_STATUS_PATH),
            last_seen: FieldPath::literal(DEFAULT_LAST_SEEN_PATH),
            temperature: FieldPath::literal(DEFAULT_TEMPERATURE_PATH),
            setpoint: FieldPath::literal(DEFAULT_SETPOINT_PATH),
            ssid: FieldPath::literal(DEFAULT_SSID_PATH),
            rssi: FieldPath::literal(DEFAULT_RSSI_PATH),
            ip_address: FieldPath::literal(DEFAULT_IP_ADDRESS_PATH),
        }
    }
}

/// Builds a [`DeviceStatus`] from one raw record.
#[derive(Debug, Clone, Default)]
pub struct DeviceSnapshotBuilder {
    paths: FieldPaths,
    thresholds: Thresholds,
}

impl DeviceSnapshotBuilder {
    pub fn new(paths: FieldPaths, thresholds: Thresholds) -> Self {
        Self { paths, thresholds }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Decode `record` as observed at `now`.
    ///
    /// Malformed or missing fields come back as `Unknown`/`None`. The only
    /// error is a missing record, which is a caller bug.
    pub fn build(
        &self,
        device_id: &str,
        record: Option<&Value>,
        now: DateTime<Utc>,
    ) -> Result<DeviceStatus, BuildError> {
        // ---
        let record = record.ok_or_else(|| BuildError::MissingRecord(device_id.to_string()))?;
        Ok(self.decode(device_id, record, now))
    }

    /// Infallible half of [`build`](Self::build), for callers that always
    /// hold a record.
    pub(crate) fn decode(&self, device_id: &str, record: &Value, now: DateTime<Utc>) -> DeviceStatus {
        // ---
        let paths = &self.paths;
        let field = |path: &FieldPath| path.lookup(record);

        let run_state = decode_run_state(field(&paths.run_status));

        let raw_last_seen = field(&paths.last_seen);
        let last_seen = parse_timestamp(raw_last_seen);
        if last_seen.is_none() {
            debug!(
                device_id,
                path = %paths.last_seen,
                raw = ?raw_last_seen,
                "Last-seen timestamp missing or malformed"
            );
        }

        let network = NetworkInfo::from_parts(
            decode_text(field(&paths.ssid)),
            decode_integer(field(&paths.rssi)),
            decode_text(field(&paths.ip_address)),
        );

        DeviceStatus {
            device_id: device_id.to_string(),
            run_state,
            online_state: classify(last_seen, now, self.thresholds.liveness),
            network_state: classify(last_seen, now, self.thresholds.staleness),
            activity_state: classify(last_seen, now, self.thresholds.activity),
            last_seen,
            since_last_seen: last_seen.map(|t| (now - t).num_seconds().max(0)),
            temperature: decode_number(field(&paths.temperature)),
            setpoint: decode_number(field(&paths.setpoint)),
            network,
        }
    }
}
