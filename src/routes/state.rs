//! Shared state behind the HTTP routes.
//!
//! The poll loop writes the latest snapshot through the scheduler's
//! `on_snapshot` callback; handlers only read.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::history::TimeSeriesStore;
use crate::models::FleetSnapshot;

// ---

/// Last snapshot worth showing.
///
/// A `no_data` snapshot never replaces a real one: stale-but-present beats
/// blanking the display.
#[derive(Debug, Clone, Default)]
pub struct LatestSnapshot {
    inner: Arc<RwLock<Option<Arc<FleetSnapshot>>>>,
}

impl LatestSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the snapshot was ignored in favour of the
    /// previous one.
    pub fn update(&self, snapshot: &FleetSnapshot) -> bool {
        // ---
        let mut latest = self.inner.write();
        if snapshot.no_data && latest.is_some() {
            return false;
        }
        *latest = Some(Arc::new(snapshot.clone()));
        true
    }

    pub fn get(&self) -> Option<Arc<FleetSnapshot>> {
        self.inner.read().clone()
    }
}

/// State handed to every route.
#[derive(Debug, Clone)]
pub struct AppState {
    pub latest: LatestSnapshot,
    pub store: TimeSeriesStore,
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::DeviceStatus;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_no_data_keeps_previous_snapshot() {
        // ---
        let latest = LatestSnapshot::new();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 5).unwrap();

        assert!(latest.get().is_none());
        assert!(latest.update(&FleetSnapshot::new(t0, vec![DeviceStatus::unknown("AA:AA:AA:AA:AA:AA")])));
        assert!(!latest.update(&FleetSnapshot::no_data(t1)));

        let shown = latest.get().unwrap();
        assert_eq!(shown.taken_at, t0);
        assert_eq!(shown.len(), 1);
    }

    #[test]
    fn test_first_no_data_is_shown() {
        // ---
        let latest = LatestSnapshot::new();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(latest.update(&FleetSnapshot::no_data(t0)));
        assert!(latest.get().unwrap().no_data);
    }
}
