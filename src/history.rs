//! Bounded per-metric history for charting and later querying.
//!
//! Each metric keeps at most `capacity` points; once full, the oldest point
//! is evicted on every append. Long-horizon history has to be persisted
//! elsewhere.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::ConfigError;

// ---

pub const DEFAULT_CAPACITY: usize = 720;

/// One recorded sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Whether an appended point kept its metric in timestamp order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    InOrder,
    /// Earlier than the previous point (clock adjustment). Stored anyway.
    OutOfOrder,
}

impl Recorded {
    pub fn is_out_of_order(&self) -> bool {
        matches!(self, Recorded::OutOfOrder)
    }
}

/// Process-wide metric history. Cloning shares the same buffers.
///
/// `record` and `query` are serialized by one lock; callers only ever get
/// copies of the stored points.
#[derive(Debug, Clone)]
pub struct TimeSeriesStore {
    capacity: usize,
    series: Arc<Mutex<HashMap<String, VecDeque<Point>>>>,
}

impl TimeSeriesStore {
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        // ---
        if capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(Self {
            capacity,
            series: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a point to `metric`, evicting the oldest one when full.
    pub fn record(&self, metric: &str, timestamp: DateTime<Utc>, value: f64) -> Recorded {
        // ---
        let mut series = self.series.lock();
        let points = series
            .entry(metric.to_string())
            .or_default();

        let recorded = match points.back() {
            Some(last) if timestamp < last.timestamp => Recorded::OutOfOrder,
            _ => Recorded::InOrder,
        };

        points.push_back(Point { timestamp, value });
        if points.len() > self.capacity {
            points.pop_front();
        }
        recorded
    }

    /// Copy of the metric's points, oldest first. Empty for unknown metrics.
    pub fn query(&self, metric: &str) -> Vec<Point> {
        self.series
            .lock()
            .get(metric)
            .map(|points| points.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Most recent point of a metric.
    pub fn latest(&self, metric: &str) -> Option<Point> {
        self.series.lock().get(metric).and_then(|points| points.back().copied())
    }

    pub fn contains(&self, metric: &str) -> bool {
        self.series.lock().contains_key(metric)
    }

    /// Recorded metric names, sorted.
    pub fn metric_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.series.lock().keys().cloned().collect();
        names.sort();
        names
    }
}
