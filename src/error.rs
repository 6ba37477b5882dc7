//! Error types shared by the poller core and its remote-store edge.
//!
//! Field-level decode problems are deliberately absent from this module:
//! they degrade to `Unknown`/absent values inside the codec and never
//! surface as errors.

use thiserror::Error;

// ---

/// Errors returned by a [`crate::fetch::TableFetcher`].
///
/// The scheduler treats every variant as transient: the cycle is skipped
/// and the next tick proceeds normally.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Connection to the remote store failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for the remote store.
    #[error("Request timed out")]
    Timeout,

    /// The store answered with a non-success status.
    #[error("Remote store returned status {0}")]
    Status(u16),

    /// The body was valid JSON but not a device table.
    #[error("Malformed device table: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_connect() {
            FetchError::Connection(err.to_string())
        } else if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else if err.is_decode() {
            FetchError::Malformed(err.to_string())
        } else {
            FetchError::Http(err.to_string())
        }
    }
}

/// Caller errors from [`crate::builder::DeviceSnapshotBuilder::build`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    /// No record at all was supplied for the device.
    #[error("no record supplied for device {0}")]
    MissingRecord(String),
}

/// Invalid construction parameters. Fatal at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("history capacity must be greater than zero")]
    ZeroCapacity,

    #[error("{name} threshold must be greater than zero seconds")]
    NonPositiveThreshold { name: &'static str },

    #[error("poll interval must be greater than zero")]
    ZeroInterval,

    #[error("fetch timeout must be greater than zero")]
    ZeroTimeout,

    #[error("invalid MAC address: {0}")]
    InvalidMac(String),

    #[error("field path for {0} is empty")]
    EmptyFieldPath(&'static str),
}
