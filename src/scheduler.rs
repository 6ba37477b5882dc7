//! Periodic fetch → aggregate → record loop.
//!
//! The scheduler moves between `Idle` and `Polling`, with `Cancelled` as a
//! terminal state. A tick that arrives while a cycle is still `Polling` is
//! dropped, never queued, so a slow store can not stack up overlapping
//! fetches. Snapshots are therefore delivered and recorded in strict
//! temporal order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::aggregator::FleetAggregator;
use crate::error::ConfigError;
use crate::fetch::TableFetcher;
use crate::history::TimeSeriesStore;
use crate::models::{FleetSnapshot, OnlineState, RunState};

// ---

pub const METRIC_FLEET_TOTAL: &str = "fleet.total";
pub const METRIC_FLEET_ONLINE: &str = "fleet.online";
pub const METRIC_FLEET_BURNING: &str = "fleet.burning";
pub const METRIC_FLEET_RECENTLY_ACTIVE: &str = "fleet.recently_active";

/// Metric name for one field of a watched device, e.g.
/// `device.AA:BB:CC:DD:EE:FF.temperature`.
pub fn device_metric(device_id: &str, field: &str) -> String {
    format!("device.{device_id}.{field}")
}

type SnapshotCallback = Box<dyn Fn(&FleetSnapshot) + Send + Sync>;
type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Polling,
    Cancelled,
}

/// What a single call to [`PollScheduler::tick`] did.
#[derive(Debug)]
pub enum TickOutcome {
    /// A cycle was started; the handle resolves when it finishes.
    Started(JoinHandle<CycleOutcome>),
    /// A previous cycle is still in flight.
    Skipped,
    /// The scheduler has been cancelled.
    Refused,
}

/// How a started cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Delivered,
    FetchFailed,
    /// Finished after `cancel()`; the result was dropped.
    Discarded,
}

struct Inner {
    state: Mutex<PollState>,
    cycles: AtomicU64,
    fetcher: Arc<dyn TableFetcher>,
    aggregator: FleetAggregator,
    store: TimeSeriesStore,
    watched: Vec<String>,
    clock: Clock,
    on_snapshot: SnapshotCallback,
    stop_tx: watch::Sender<bool>,
}

/// Drives poll cycles. Cloning yields another handle to the same scheduler.
#[derive(Clone)]
pub struct PollScheduler {
    inner: Arc<Inner>,
}

impl PollScheduler {
    pub fn builder(
        fetcher: Arc<dyn TableFetcher>,
        aggregator: FleetAggregator,
        store: TimeSeriesStore,
    ) -> PollSchedulerBuilder {
        PollSchedulerBuilder {
            fetcher,
            aggregator,
            store,
            watched: Vec::new(),
            clock: None,
        }
    }

    pub fn state(&self) -> PollState {
        *self.inner.state.lock()
    }

    /// Number of cycles started so far.
    pub fn cycles(&self) -> u64 {
        self.inner.cycles.load(Ordering::Relaxed)
    }

    pub fn store(&self) -> &TimeSeriesStore {
        &self.inner.store
    }

    /// Spawn the periodic ticker. The first tick fires immediately.
    ///
    /// The returned task ends once the scheduler is cancelled.
    pub fn start(&self, interval: Duration) -> Result<JoinHandle<()>, ConfigError> {
        // ---
        if interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }

        let scheduler = self.clone();
        let mut stop_rx = self.inner.stop_tx.subscribe();

        info!("Starting poll loop every {:?}", interval);

        Ok(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let TickOutcome::Refused = scheduler.tick() {
                            break;
                        }
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Poll loop stopped after {} cycles", scheduler.cycles());
        }))
    }

    /// Start one cycle unless one is already in flight.
    pub fn tick(&self) -> TickOutcome {
        // ---
        {
            let mut state = self.inner.state.lock();
            match *state {
                PollState::Polling => {
                    debug!("Previous poll still in flight; skipping tick");
                    return TickOutcome::Skipped;
                }
                PollState::Cancelled => return TickOutcome::Refused,
                PollState::Idle => *state = PollState::Polling,
            }
        }

        let cycle = self.inner.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        let inner = Arc::clone(&self.inner);
        let span = info_span!("poll_cycle", cycle);

        TickOutcome::Started(tokio::spawn(async move { inner.run_cycle().await }.instrument(span)))
    }

    /// Stop ticking. An in-flight fetch is allowed to finish, but its
    /// result is never delivered.
    pub fn cancel(&self) {
        // ---
        *self.inner.state.lock() = PollState::Cancelled;
        self.inner.stop_tx.send_replace(true);
        info!("Poll scheduler cancelled");
    }
}

impl Inner {
    async fn run_cycle(&self) -> CycleOutcome {
        // ---
        let _in_flight = InFlight(self);
        let result = self.fetcher.fetch_table().await;

        // Held through delivery so cancel() can not interleave with it.
        let state = self.state.lock();
        if *state == PollState::Cancelled {
            debug!("Scheduler cancelled during fetch; discarding result");
            return CycleOutcome::Discarded;
        }

        let outcome = match result {
            Ok(table) => {
                let snapshot = self.aggregator.aggregate(table.as_ref(), (self.clock)());
                if !snapshot.no_data {
                    self.record(&snapshot);
                }
                (self.on_snapshot)(&snapshot);

                info!(
                    total = snapshot.counts.total(),
                    online = snapshot.counts.online(OnlineState::Online),
                    burning = snapshot.counts.run(RunState::Burning),
                    no_data = snapshot.no_data,
                    "Poll cycle complete"
                );
                CycleOutcome::Delivered
            }
            Err(e) => {
                warn!("Fetch failed, keeping last snapshot: {}", e);
                CycleOutcome::FetchFailed
            }
        };

        drop(state);
        outcome
    }

    fn record(&self, snapshot: &FleetSnapshot) {
        // ---
        let taken_at = snapshot.taken_at;
        let counts = &snapshot.counts;

        let fleet = [
            (METRIC_FLEET_TOTAL, counts.total()),
            (METRIC_FLEET_ONLINE, counts.online(OnlineState::Online)),
            (METRIC_FLEET_BURNING, counts.run(RunState::Burning)),
            (METRIC_FLEET_RECENTLY_ACTIVE, counts.activity(OnlineState::Online)),
        ];
        for (metric, value) in fleet {
            self.record_point(metric, taken_at, value as f64);
        }

        for device_id in &self.watched {
            let Some(device) = snapshot.device(device_id) else {
                debug!(device_id = %device_id, "Watched device absent from table");
                continue;
            };
            if let Some(temperature) = device.temperature {
                self.record_point(&device_metric(device_id, "temperature"), taken_at, temperature);
            }
            if let Some(setpoint) = device.setpoint {
                self.record_point(&device_metric(device_id, "setpoint"), taken_at, setpoint);
            }
        }
    }

    fn record_point(&self, metric: &str, timestamp: DateTime<Utc>, value: f64) {
        if self.store.record(metric, timestamp, value).is_out_of_order() {
            warn!(metric, %timestamp, "Metric point recorded out of timestamp order");
        }
    }
}

/// Returns the scheduler to `Idle` when a cycle ends, including by panic.
struct InFlight<'a>(&'a Inner);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.0.state.lock();
        if *state == PollState::Polling {
            *state = PollState::Idle;
        }
    }
}

/// Builder for [`PollScheduler`].
pub struct PollSchedulerBuilder {
    fetcher: Arc<dyn TableFetcher>,
    aggregator: FleetAggregator,
    store: TimeSeriesStore,
    watched: Vec<String>,
    clock: Option<Clock>,
}

impl PollSchedulerBuilder {
    /// Devices whose temperature and setpoint get their own metrics.
    pub fn watch(mut self, devices: Vec<String>) -> Self {
        self.watched = devices;
        self
    }

    /// Replace the wall clock used to stamp snapshots.
    pub fn clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Some(Box::new(clock));
        self
    }

    /// Finish with the callback that receives every delivered snapshot.
    ///
    /// The callback runs while the scheduler's state is locked and must not
    /// call back into the scheduler.
    pub fn build<F>(self, on_snapshot: F) -> PollScheduler
    where
        F: Fn(&FleetSnapshot) + Send + Sync + 'static,
    {
        // ---
        let (stop_tx, _) = watch::channel(false);
        PollScheduler {
            inner: Arc::new(Inner {
                state: Mutex::new(PollState::Idle),
                cycles: AtomicU64::new(0),
                fetcher: self.fetcher,
                aggregator: self.aggregator,
                store: self.store,
                watched: self.watched,
                clock: self.clock.unwrap_or_else(|| Box::new(Utc::now)),
                on_snapshot: Box::new(on_snapshot),
                stop_tx,
            }),
        }
    }
}
