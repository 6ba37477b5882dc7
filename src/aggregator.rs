//! Fleet-wide aggregation of one poll cycle's raw table.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::builder::DeviceSnapshotBuilder;
use crate::fetch::RawTable;
use crate::models::{DeviceStatus, FleetSnapshot};

// ---

/// Turns a raw device table into a [`FleetSnapshot`].
///
/// Pure over `(table, now)`: no state survives between calls.
#[derive(Debug, Clone, Default)]
pub struct FleetAggregator {
    builder: DeviceSnapshotBuilder,
}

impl FleetAggregator {
    pub fn new(builder: DeviceSnapshotBuilder) -> Self {
        Self { builder }
    }

    /// Build a snapshot of every device in `table`.
    ///
    /// `None` means the store had no table at all; the result is an empty
    /// snapshot flagged `no_data`. A record without the expected structure
    /// still counts toward the fleet total, as an all-unknown status.
    pub fn aggregate(&self, table: Option<&RawTable>, now: DateTime<Utc>) -> FleetSnapshot {
        // ---
        let Some(table) = table else {
            warn!("Remote store returned no device table");
            return FleetSnapshot::no_data(now);
        };

        let devices: Vec<DeviceStatus> = table
            .iter()
            .map(|(device_id, record)| {
                debug!(device_id = %device_id, "Checking device");
                self.builder.decode(device_id, record, now)
            })
            .collect();

        let snapshot = FleetSnapshot::new(now, devices);
        debug!(
            total = snapshot.len(),
            counts = ?snapshot.counts,
            "Aggregated fleet snapshot"
        );
        snapshot
    }
}
