//! Remote device-table access.
//!
//! The poller only needs one operation from the store: fetch the whole
//! table once per cycle. [`TableFetcher`] is that seam; [`FirebaseFetcher`]
//! is the production implementation over the store's REST interface.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::FetchError;

// ---

/// Device records keyed by MAC address, exactly as the store returned them.
pub type RawTable = Map<String, Value>;

#[async_trait]
pub trait TableFetcher: Send + Sync {
    /// Fetch the full device table.
    ///
    /// `Ok(None)` means the store holds no table at all, which is distinct
    /// from an empty one.
    async fn fetch_table(&self) -> Result<Option<RawTable>, FetchError>;
}

/// Reads `{base_url}/{table_path}.json` from a Firebase Realtime Database.
///
/// Authentication is limited to passing a pre-issued token; obtaining and
/// renewing it is someone else's job.
#[derive(Debug, Clone)]
pub struct FirebaseFetcher {
    client: reqwest::Client,
    url: String,
    auth_token: Option<String>,
}

impl FirebaseFetcher {
    pub fn new(
        base_url: &str,
        table_path: &str,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        // ---
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: table_url(base_url, table_path),
            auth_token,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TableFetcher for FirebaseFetcher {
    async fn fetch_table(&self) -> Result<Option<RawTable>, FetchError> {
        // ---
        let mut request = self.client.get(&self.url);
        if let Some(token) = &self.auth_token {
            request = request.query(&[("auth", token)]);
        }

        tracing::debug!("Fetching device table from: {}", self.url);

        let response = request.send().await?.error_for_status()?;
        let body: Value = response.json().await?;
        table_from_body(body)
    }
}

/// Join base URL and table path into the `.json` REST endpoint.
fn table_url(base_url: &str, table_path: &str) -> String {
    format!(
        "{}/{}.json",
        base_url.trim_end_matches('/'),
        table_path.trim_matches('/')
    )
}

/// Interpret a response body as a device table.
fn table_from_body(body: Value) -> Result<Option<RawTable>, FetchError> {
    // ---
    match body {
        Value::Null => Ok(None),
        Value::Object(table) => {
            tracing::debug!("Device table has {} entries", table.len());
            Ok(Some(table))
        }
        other => Err(FetchError::Malformed(format!(
            "expected an object keyed by device, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
