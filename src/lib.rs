//! Fleet status poller for remote grill telemetry.
//!
//! Each poll cycle fetches the whole device table from the remote store,
//! normalizes every record into a [`DeviceStatus`], classifies connectivity
//! against the liveness/staleness/activity thresholds, aggregates a
//! [`FleetSnapshot`], and records fleet metrics into a bounded
//! [`TimeSeriesStore`].
//!
//! Module layout, leaves first:
//! - `codec` – raw value decoding (run status, timestamps, numbers, MACs)
//! - `classifier` – online/offline/unknown from last-seen time
//! - `builder` – one record → `DeviceStatus`
//! - `aggregator` – whole table → `FleetSnapshot`
//! - `history` – bounded per-metric time series
//! - `scheduler` – periodic fetch/aggregate/record with one poll in flight
//! - `fetch` – the remote-store seam and its Firebase implementation
//! - `routes` – HTTP JSON presentation API

pub mod aggregator;
pub mod builder;
pub mod classifier;
pub mod codec;
pub mod config;
pub mod error;
pub mod fetch;
pub mod history;
pub mod models;
pub mod routes;
pub mod scheduler;

pub use aggregator::FleetAggregator;
pub use builder::{DeviceSnapshotBuilder, FieldPaths};
pub use classifier::Thresholds;
pub use config::Config;
pub use error::{BuildError, ConfigError, FetchError};
pub use fetch::{FirebaseFetcher, RawTable, TableFetcher};
pub use history::{Point, Recorded, TimeSeriesStore};
pub use models::{DeviceStatus, FleetCounts, FleetSnapshot, NetworkInfo, OnlineState, RunState};
pub use scheduler::{CycleOutcome, PollScheduler, PollState, TickOutcome};
