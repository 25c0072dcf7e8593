//! A store reachable through a small JSON-over-HTTP key-value protocol.
//!
//! The protocol consists of three endpoints below the configured base URL:
//!
//! - `GET /health` must succeed for a connection to be established.
//! - `POST /v1/{database}/{namespace}/batch` upserts a batch of records. The body is
//!   `{"atomic": bool, "upserts": [{"key": u64, "value": u64}, ...]}`.
//! - `GET /v1/{database}/{namespace}/keys/{key}` returns `{"records": [...]}`. A `404` response
//!   counts as zero records.
//!
//! Any other non-success status is reported as an error of the respective operation.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{BoxedStore, Connector, PreparedBatch, Store, StoreError, StoreResult};

/// User agent string used for outgoing requests.
pub const USER_AGENT: &str = concat!("kvload/", env!("CARGO_PKG_VERSION"));

/// A single record as exchanged with the HTTP store.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Record {
    /// The record key.
    pub key: u64,
    /// The record value.
    pub value: u64,
}

/// Body of a batched upsert request.
#[derive(Debug, Deserialize, Serialize)]
pub struct BatchRequest {
    /// Whether the store should apply the batch all-or-nothing.
    pub atomic: bool,
    /// The records to insert or overwrite.
    pub upserts: Vec<Record>,
}

/// Body of a point read response.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ReadResponse {
    /// All records matching the requested key.
    pub records: Vec<Record>,
}

/// Opens [`HttpStore`] sessions against a base URL.
#[derive(Clone, Debug)]
pub struct HttpConnector {
    endpoint: String,
    database: String,
    namespace: String,
}

impl HttpConnector {
    /// Creates a connector for the given base URL, database and namespace.
    pub fn new(
        endpoint: impl Into<String>,
        database: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_owned(),
            database: database.into(),
            namespace: namespace.into(),
        }
    }
}

#[async_trait::async_trait]
impl Connector for HttpConnector {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn connect(&self) -> StoreResult<BoxedStore> {
        // Request timeouts are enforced per store call by the workload loops.
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|cause| StoreError::connection("failed to build HTTP client", cause))?;

        let health_url = format!("{}/health", self.endpoint);
        client
            .get(&health_url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|cause| {
                StoreError::connection(format!("health check against `{health_url}` failed"), cause)
            })?;

        tracing::debug!(endpoint = %self.endpoint, "connected to HTTP store");

        let base = format!("{}/v1/{}/{}", self.endpoint, self.database, self.namespace);
        Ok(Box::new(HttpStore { client, base }))
    }
}

/// A session against an HTTP key-value store.
#[derive(Debug)]
pub struct HttpStore {
    client: reqwest::Client,
    base: String,
}

impl HttpStore {
    fn batch_request(&self, entries: &[(u64, u64)], atomic: bool) -> StoreResult<reqwest::Request> {
        let body = BatchRequest {
            atomic,
            upserts: entries
                .iter()
                .map(|&(key, value)| Record { key, value })
                .collect(),
        };

        self.client
            .post(format!("{}/batch", self.base))
            .json(&body)
            .build()
            .map_err(|cause| {
                StoreError::write(format!("failed to build batch of {} upserts", entries.len()), cause)
            })
    }
}

#[async_trait::async_trait]
impl Store for HttpStore {
    fn build_batch(&mut self, entries: &[(u64, u64)], atomic: bool) -> StoreResult<PreparedBatch> {
        self.batch_request(entries, atomic).map(PreparedBatch::Http)
    }

    async fn execute_batch(&mut self, batch: PreparedBatch) -> StoreResult<()> {
        let request = match batch {
            PreparedBatch::Http(request) => request,
            PreparedBatch::Entries { entries, atomic } => self.batch_request(&entries, atomic)?,
        };

        self.client
            .execute(request)
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|cause| StoreError::write("batch upsert failed", cause))?;

        Ok(())
    }

    async fn point_read(&mut self, key: u64) -> StoreResult<u64> {
        let response = self
            .client
            .get(format!("{}/keys/{key}", self.base))
            .send()
            .await
            .map_err(|cause| StoreError::read(format!("lookup of key {key} failed"), cause))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(0);
        }

        let body: ReadResponse = response
            .error_for_status()
            .map_err(|cause| StoreError::read(format!("lookup of key {key} failed"), cause))?
            .json()
            .await
            .map_err(|cause| StoreError::read(format!("invalid response for key {key}"), cause))?;

        Ok(body.records.len() as u64)
    }
}
