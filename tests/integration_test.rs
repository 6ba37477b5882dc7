use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::extract::Query;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use grillwatch::routes::{self, AppState, LatestSnapshot};
use grillwatch::scheduler::{device_metric, METRIC_FLEET_ONLINE, METRIC_FLEET_TOTAL};
use grillwatch::{
    CycleOutcome, FetchError, FirebaseFetcher, FleetAggregator, OnlineState, PollScheduler, RawTable, RunState,
    TableFetcher, TickOutcome, TimeSeriesStore,
};

const MAC: &str = "AA:AA:AA:AA:AA:AA";

// ---

/// Stand-in for the remote store: replays queued responses, then repeats
/// the fallback table.
struct FakeStore {
    queued: Mutex<VecDeque<Result<Option<RawTable>, FetchError>>>,
    fallback: RawTable,
    calls: AtomicUsize,
}

impl FakeStore {
    fn new(queued: Vec<Result<Option<RawTable>, FetchError>>, fallback: RawTable) -> Arc<Self> {
        Arc::new(Self {
            queued: Mutex::new(queued.into()),
            fallback,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl TableFetcher for FakeStore {
    async fn fetch_table(&self) -> Result<Option<RawTable>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queued
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(Some(self.fallback.clone())))
    }
}

fn table(value: Value) -> RawTable {
    match value {
        Value::Object(map) => map,
        other => panic!("fixture must be a JSON object, got {other}"),
    }
}

fn burning_grill() -> RawTable {
    table(json!({
        MAC: { "grill": { "G4": ["x", "1", "", "225", "231"], "timeStamp": "2024-01-01 00:00:00" } }
    }))
}

fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, h, m, s).unwrap()
}

async fn run_cycle(scheduler: &PollScheduler) -> CycleOutcome {
    match scheduler.tick() {
        TickOutcome::Started(handle) => handle.await.expect("cycle task panicked"),
        other => panic!("expected a started cycle, got {other:?}"),
    }
}

#[test]
fn burning_device_reported_online() {
    // ---
    let snapshot = FleetAggregator::default().aggregate(Some(&burning_grill()), at(0, 0, 30));

    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot.devices[0].run_state, RunState::Burning);
    assert_eq!(snapshot.devices[0].online_state, OnlineState::Online);
}

#[test]
fn day_old_report_offline_at_short_and_long_thresholds() {
    // ---
    let now = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 1).unwrap();
    let snapshot = FleetAggregator::default().aggregate(Some(&burning_grill()), now);

    let device = &snapshot.devices[0];
    assert_eq!(device.online_state, OnlineState::Offline);
    assert_eq!(device.activity_state, OnlineState::Offline);
    assert_eq!(snapshot.counts.activity(OnlineState::Online), 0);
}

#[test]
fn missing_timestamp_counts_as_unknown() {
    // ---
    let fleet = table(json!({ MAC: { "grill": { "G4": ["x", "1"] } } }));
    let snapshot = FleetAggregator::default().aggregate(Some(&fleet), at(0, 0, 30));

    assert_eq!(snapshot.counts.total(), 1);
    assert_eq!(snapshot.devices[0].online_state, OnlineState::Unknown);
    assert_eq!(snapshot.devices[0].last_seen, None);
}

#[tokio::test]
async fn failed_fetches_skip_delivery_until_store_recovers() -> Result<()> {
    // ---
    let store = FakeStore::new(
        vec![Err(FetchError::Timeout), Err(FetchError::Connection("refused".into()))],
        burning_grill(),
    );
    let history = TimeSeriesStore::new(32)?;
    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = delivered.clone();

    let scheduler = PollScheduler::builder(store.clone(), FleetAggregator::default(), history.clone())
        .clock(|| at(0, 0, 30))
        .build(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

    assert_eq!(run_cycle(&scheduler).await, CycleOutcome::FetchFailed);
    assert_eq!(run_cycle(&scheduler).await, CycleOutcome::FetchFailed);
    assert_eq!(delivered.load(Ordering::SeqCst), 0);
    assert!(history.query(METRIC_FLEET_ONLINE).is_empty());

    assert_eq!(run_cycle(&scheduler).await, CycleOutcome::Delivered);
    assert_eq!(delivered.load(Ordering::SeqCst), 1);
    assert_eq!(store.calls.load(Ordering::SeqCst), 3);

    let online = history.query(METRIC_FLEET_ONLINE);
    assert_eq!(online.len(), 1);
    assert_eq!(online[0].value, 1.0);
    Ok(())
}

#[tokio::test]
async fn http_api_serves_latest_snapshot_and_history() -> Result<()> {
    // ---
    let store = FakeStore::new(vec![Ok(Some(burning_grill())), Ok(None)], burning_grill());
    let history = TimeSeriesStore::new(32)?;
    let latest = LatestSnapshot::new();
    let sink = latest.clone();

    let scheduler = PollScheduler::builder(store, FleetAggregator::default(), history.clone())
        .watch(vec![MAC.to_string()])
        .clock(|| at(0, 0, 30))
        .build(move |snapshot| {
            sink.update(snapshot);
        });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let base = format!("http://{}", listener.local_addr()?);
    let app = routes::router(AppState {
        latest,
        store: history,
    });
    tokio::spawn(async move { axum::serve(listener, app).await });

    let client = Client::new();

    // Nothing polled yet.
    let response = client.get(format!("{base}/fleet")).send().await?;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    assert_eq!(run_cycle(&scheduler).await, CycleOutcome::Delivered);
    // Store answers with no table; the previous snapshot stays visible.
    assert_eq!(run_cycle(&scheduler).await, CycleOutcome::Delivered);

    let health: Value = client.get(format!("{base}/health")).send().await?.json().await?;
    assert_eq!(health["status"], "ok");
    assert!(health["last_snapshot_at"].is_string());

    let fleet: Value = client.get(format!("{base}/fleet")).send().await?.json().await?;
    assert_eq!(fleet["no_data"], false);
    assert_eq!(fleet["counts"]["run"]["burning"], 1);
    assert_eq!(fleet["counts"]["online"]["online"], 1);
    assert_eq!(fleet["devices"][0]["device_id"], MAC);
    assert_eq!(fleet["devices"][0]["last_seen_ago"], "0:00:30");

    let filtered: Value = client
        .get(format!("{base}/fleet?run_state=off_and_cool"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(filtered["devices"].as_array().map(Vec::len), Some(0));

    let device: Value = client.get(format!("{base}/fleet/{MAC}")).send().await?.json().await?;
    assert_eq!(device["run_state"], "burning");
    assert_eq!(device["temperature"], 231.0);

    let missing = client.get(format!("{base}/fleet/00:00:00:00:00:00")).send().await?;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let metrics: Value = client.get(format!("{base}/metrics")).send().await?.json().await?;
    let names: Vec<&str> = metrics["metrics"]
        .as_array()
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    assert!(names.contains(&METRIC_FLEET_TOTAL));
    assert!(names.contains(&device_metric(MAC, "temperature").as_str()));

    let total: Value = client
        .get(format!("{base}/metrics/{METRIC_FLEET_TOTAL}"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(total["points"].as_array().map(Vec::len), Some(1));
    assert_eq!(total["points"][0]["value"], 1.0);

    let unknown = client.get(format!("{base}/metrics/fleet.nope")).send().await?;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    scheduler.cancel();
    Ok(())
}

/// Serves a fake store on an ephemeral port and returns its base URL.
async fn serve_store(app: Router) -> Result<String> {
    // ---
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let base = format!("http://{}", listener.local_addr()?);
    tokio::spawn(async move { axum::serve(listener, app).await });
    Ok(base)
}

#[tokio::test]
async fn firebase_fetcher_maps_store_responses() -> Result<()> {
    // ---
    let app = Router::new()
        .route("/locked/grills.json", get(|| async { StatusCode::UNAUTHORIZED }))
        .route("/empty/grills.json", get(|| async { Json(Value::Null) }))
        .route("/list/grills.json", get(|| async { Json(json!([MAC])) }))
        .route(
            "/echo/grills.json",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                Json(json!({ MAC: { "auth": params.get("auth") } }))
            }),
        );
    let base = serve_store(app).await?;
    let fetcher = |path: &str, token: Option<&str>| {
        FirebaseFetcher::new(&format!("{base}/{path}"), "grills", token.map(String::from), Duration::from_secs(5))
    };

    let locked = fetcher("locked", None)?.fetch_table().await;
    assert!(matches!(locked, Err(FetchError::Status(401))), "got {locked:?}");

    let empty = fetcher("empty", None)?.fetch_table().await;
    assert!(matches!(empty, Ok(None)), "got {empty:?}");

    let list = fetcher("list", None)?.fetch_table().await;
    assert!(matches!(list, Err(FetchError::Malformed(_))), "got {list:?}");

    let echoed = fetcher("echo", Some("tok en"))?.fetch_table().await?.expect("echo route returns a table");
    assert_eq!(echoed[MAC]["auth"], "tok en");

    let anonymous = fetcher("echo", None)?.fetch_table().await?.expect("echo route returns a table");
    assert_eq!(anonymous[MAC]["auth"], Value::Null);
    Ok(())
}
