//! Configuration loader for the `grillwatch` poller.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Every invalid value is rejected here, at startup,
//! so the poll loop never runs with a zero interval, threshold or capacity.
//!
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::builder::{
    FieldPaths, DEFAULT_IP_ADDRESS_PATH, DEFAULT_LAST_SEEN_PATH, DEFAULT_RSSI_PATH, DEFAULT_RUN_STATUS_PATH,
    DEFAULT_SETPOINT_PATH, DEFAULT_SSID_PATH, DEFAULT_TEMPERATURE_PATH,
};
use crate::classifier::{Thresholds, DEFAULT_ACTIVITY_SECS, DEFAULT_LIVENESS_SECS, DEFAULT_STALENESS_SECS};
use crate::codec::{is_valid_mac, FieldPath};
use crate::error::ConfigError;
use crate::history::DEFAULT_CAPACITY;

/// Parse an optional integer variable with a default value.
macro_rules! parse_env_u32 {
    ($lookup:expr, $var_name:expr, $default:expr) => {
        $lookup($var_name)
            .map(|v| v.trim().parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string variable.
macro_rules! require_env {
    ($lookup:expr, $var_name:expr) => {
        $lookup($var_name).ok_or_else(|| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Read an optional string variable with a default value.
macro_rules! env_or {
    ($lookup:expr, $var_name:expr, $default:expr) => {
        $lookup($var_name).unwrap_or_else(|| $default.to_string())
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Base URL of the remote device store.
    pub db_url: String,

    /// Pre-issued auth token for the store, if it requires one.
    pub auth_token: Option<String>,

    /// Path of the device table below `db_url`.
    pub table_path: String,

    /// Time between poll ticks.
    pub poll_interval: Duration,

    /// Upper bound on a single table fetch.
    pub fetch_timeout: Duration,

    /// Liveness, staleness and activity windows.
    pub thresholds: Thresholds,

    /// Points kept per metric.
    pub history_capacity: usize,

    /// Address of the HTTP presentation API.
    pub listen_addr: SocketAddr,

    /// Devices with per-device temperature/setpoint metrics.
    pub watch_devices: Vec<String>,

    /// Location of each decoded field inside a record.
    pub field_paths: FieldPaths,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `GRILLWATCH_DB_URL` – base URL of the remote store
///
/// Optional:
/// - `GRILLWATCH_AUTH_TOKEN` – store auth token (default: none)
/// - `GRILLWATCH_TABLE_PATH` – device table path (default: `grills`)
/// - `POLL_INTERVAL_SECS` (default: 5), `FETCH_TIMEOUT_SECS` (default: 10)
/// - `LIVENESS_SECS` (120), `STALENESS_SECS` (3600), `ACTIVITY_SECS` (86400)
/// - `HISTORY_CAPACITY` – points per metric (default: 720)
/// - `LISTEN_ADDR` (default: `0.0.0.0:8080`)
/// - `WATCH_DEVICES` – comma separated MAC addresses
/// - `FIELD_RUN_STATUS`, `FIELD_LAST_SEEN`, `FIELD_TEMPERATURE`,
///   `FIELD_SETPOINT`, `FIELD_SSID`, `FIELD_RSSI`, `FIELD_IP_ADDRESS`
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    load_from(|name| env::var(name).ok())
}

/// Same as [`load_from_env`], reading variables through `lookup`.
pub fn load_from<F>(lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    // ---
    let db_url = require_env!(lookup, "GRILLWATCH_DB_URL");
    let auth_token = lookup("GRILLWATCH_AUTH_TOKEN").filter(|t| !t.trim().is_empty());
    let table_path = env_or!(lookup, "GRILLWATCH_TABLE_PATH", "grills");

    let poll_interval_secs = parse_env_u32!(lookup, "POLL_INTERVAL_SECS", 5);
    if poll_interval_secs == 0 {
        return Err(ConfigError::ZeroInterval.into());
    }
    let fetch_timeout_secs = parse_env_u32!(lookup, "FETCH_TIMEOUT_SECS", 10);
    if fetch_timeout_secs == 0 {
        return Err(ConfigError::ZeroTimeout.into());
    }

    let thresholds = Thresholds::from_secs(
        parse_env_u32!(lookup, "LIVENESS_SECS", DEFAULT_LIVENESS_SECS),
        parse_env_u32!(lookup, "STALENESS_SECS", DEFAULT_STALENESS_SECS),
        parse_env_u32!(lookup, "ACTIVITY_SECS", DEFAULT_ACTIVITY_SECS),
    )?;

    let history_capacity = parse_env_u32!(lookup, "HISTORY_CAPACITY", DEFAULT_CAPACITY as u32) as usize;
    if history_capacity == 0 {
        return Err(ConfigError::ZeroCapacity.into());
    }

    let listen_addr = env_or!(lookup, "LISTEN_ADDR", "0.0.0.0:8080")
        .parse::<SocketAddr>()
        .map_err(|e| anyhow!("Invalid LISTEN_ADDR: {}", e))?;

    let watch_devices = parse_watch_devices(&env_or!(lookup, "WATCH_DEVICES", ""))?;

    let path = |field: &'static str, var_name: &str, default: &str| {
        FieldPath::parse(field, &env_or!(lookup, var_name, default))
    };
    let field_paths = FieldPaths {
        run_status: path("run status", "FIELD_RUN_STATUS", DEFAULT_RUN_STATUS_PATH)?,
        last_seen: path("last seen", "FIELD_LAST_SEEN", DEFAULT_LAST_SEEN_PATH)?,
        temperature: path("temperature", "FIELD_TEMPERATURE", DEFAULT_TEMPERATURE_PATH)?,
        setpoint: path("setpoint", "FIELD_SETPOINT", DEFAULT_SETPOINT_PATH)?,
        ssid: path("ssid", "FIELD_SSID", DEFAULT_SSID_PATH)?,
        rssi: path("rssi", "FIELD_RSSI", DEFAULT_RSSI_PATH)?,
        ip_address: path("ip address", "FIELD_IP_ADDRESS", DEFAULT_IP_ADDRESS_PATH)?,
    };

    Ok(Config {
        db_url,
        auth_token,
        table_path,
        poll_interval: Duration::from_secs(poll_interval_secs.into()),
        fetch_timeout: Duration::from_secs(fetch_timeout_secs.into()),
        thresholds,
        history_capacity,
        listen_addr,
        watch_devices,
        field_paths,
    })
}

fn parse_watch_devices(raw: &str) -> Result<Vec<String>, ConfigError> {
    // ---
    raw.split(',')
        .map(str::trim)
        .filter(|mac| !mac.is_empty())
        .map(|mac| {
            if is_valid_mac(mac) {
                Ok(mac.to_string())
            } else {
                Err(ConfigError::InvalidMac(mac.to_string()))
            }
        })
        .collect()
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks the auth token while showing all other configuration values
    /// that were loaded.
    pub fn log_config(&self) {
        // ---
        let masked_token = if self.auth_token.is_some() { "****" } else { "(none)" };

        tracing::info!("Configuration loaded:");
        tracing::info!("  GRILLWATCH_DB_URL     : {}", self.db_url);
        tracing::info!("  GRILLWATCH_AUTH_TOKEN : {}", masked_token);
        tracing::info!("  GRILLWATCH_TABLE_PATH : {}", self.table_path);
        tracing::info!("  POLL_INTERVAL_SECS    : {}", self.poll_interval.as_secs());
        tracing::info!("  FETCH_TIMEOUT_SECS    : {}", self.fetch_timeout.as_secs());
        tracing::info!("  LIVENESS_SECS         : {}", self.thresholds.liveness.num_seconds());
        tracing::info!("  STALENESS_SECS        : {}", self.thresholds.staleness.num_seconds());
        tracing::info!("  ACTIVITY_SECS         : {}", self.thresholds.activity.num_seconds());
        tracing::info!("  HISTORY_CAPACITY      : {}", self.history_capacity);
        tracing::info!("  LISTEN_ADDR           : {}", self.listen_addr);
        tracing::info!("  WATCH_DEVICES         : {:?}", self.watch_devices);
        tracing::info!("  FIELD_RUN_STATUS      : {}", self.field_paths.run_status);
        tracing::info!("  FIELD_LAST_SEEN       : {}", self.field_paths.last_seen);
        tracing::info!("  FIELD_TEMPERATURE     : {}", self.field_paths.temperature);
        tracing::info!("  FIELD_SETPOINT        : {}", self.field_paths.setpoint);
        tracing::info!("  FIELD_SSID            : {}", self.field_paths.ssid);
        tracing::info!("  FIELD_RSSI            : {}", self.field_paths.rssi);
        tracing::info!("  FIELD_IP_ADDRESS      : {}", self.field_paths.ip_address);
    }
}
