//! Exposes an in-process key-value server for use in integration tests.
//!
//! ```
//! use kvload_test::server::TestServer;
//!
//! #[tokio::main]
//! async fn main() {
//!    let server = TestServer::new().await;
//!    let url = server.url("/health");
//!    // use the URL in tests...
//! }
//! ```
//!
//! The server speaks the JSON protocol of the harness's HTTP store: `GET /health`,
//! `POST /v1/{database}/{namespace}/batch` and `GET /v1/{database}/{namespace}/keys/{key}`.

use std::collections::HashMap;
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
struct Record {
    key: u64,
    value: u64,
}

#[derive(Debug, Deserialize)]
struct BatchRequest {
    atomic: bool,
    upserts: Vec<Record>,
}

#[derive(Debug, Serialize)]
struct ReadResponse {
    records: Vec<Record>,
}

/// A batch as received by the [`TestServer`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivedBatch {
    /// Database the batch was addressed to.
    pub database: String,
    /// Namespace the batch was addressed to.
    pub namespace: String,
    /// The `atomic` flag of the request.
    pub atomic: bool,
    /// Keys in request order.
    pub keys: Vec<u64>,
}

#[derive(Debug, Default)]
struct ServerState {
    tables: Mutex<HashMap<(String, String), HashMap<u64, u64>>>,
    batches: Mutex<Vec<ReceivedBatch>>,
    unavailable: AtomicBool,
}

type SharedState = Arc<ServerState>;

/// An in-process key-value server for use in integration tests.
///
/// All data lives in memory and is dropped with the server. It listens on a random available port
/// on localhost.
#[derive(Debug)]
pub struct TestServer {
    handle: tokio::task::JoinHandle<()>,
    socket: SocketAddr,
    state: SharedState,
}

impl TestServer {
    /// Starts a new server on a random port.
    pub async fn new() -> Self {
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = TcpListener::bind(addr).unwrap();
        listener.set_nonblocking(true).unwrap();
        let socket = listener.local_addr().unwrap();

        let state = SharedState::default();
        let app = Router::new()
            .route("/health", get(health))
            .route("/v1/{database}/{namespace}/batch", post(write_batch))
            .route("/v1/{database}/{namespace}/keys/{key}", get(read_key))
            .with_state(state.clone());

        let handle = tokio::spawn(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            handle,
            socket,
            state,
        }
    }

    /// Returns a full URL pointing to the given path.
    ///
    /// This URL uses `localhost` as hostname.
    pub fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("http://localhost:{}/{}", self.socket.port(), path)
    }

    /// Returns the base URL to configure a store endpoint with.
    pub fn endpoint(&self) -> String {
        format!("http://localhost:{}", self.socket.port())
    }

    /// Returns the value stored for `key` in the given table.
    pub fn get(&self, database: &str, namespace: &str, key: u64) -> Option<u64> {
        let tables = self.state.tables.lock().unwrap();
        let table = tables.get(&(database.to_owned(), namespace.to_owned()))?;
        table.get(&key).copied()
    }

    /// Returns the number of records stored across all tables.
    pub fn len(&self) -> usize {
        let tables = self.state.tables.lock().unwrap();
        tables.values().map(HashMap::len).sum()
    }

    /// Returns `true` if no record has been stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns every batch received so far.
    pub fn batches(&self) -> Vec<ReceivedBatch> {
        self.state.batches.lock().unwrap().clone()
    }

    /// Makes every endpoint respond with `503 Service Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.unavailable.store(unavailable, Ordering::Relaxed);
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn unavailable(state: &ServerState) -> Option<Response> {
    state
        .unavailable
        .load(Ordering::Relaxed)
        .then(|| StatusCode::SERVICE_UNAVAILABLE.into_response())
}

async fn health(State(state): State<SharedState>) -> Response {
    if let Some(response) = unavailable(&state) {
        return response;
    }
    "OK".into_response()
}

async fn write_batch(
    State(state): State<SharedState>,
    Path((database, namespace)): Path<(String, String)>,
    Json(request): Json<BatchRequest>,
) -> Response {
    if let Some(response) = unavailable(&state) {
        return response;
    }

    let keys = request.upserts.iter().map(|record| record.key).collect();
    state
        .tables
        .lock()
        .unwrap()
        .entry((database.clone(), namespace.clone()))
        .or_default()
        .extend(request.upserts.iter().map(|record| (record.key, record.value)));

    state.batches.lock().unwrap().push(ReceivedBatch {
        database,
        namespace,
        atomic: request.atomic,
        keys,
    });

    StatusCode::NO_CONTENT.into_response()
}

async fn read_key(
    State(state): State<SharedState>,
    Path((database, namespace, key)): Path<(String, String, u64)>,
) -> Response {
    if let Some(response) = unavailable(&state) {
        return response;
    }

    let value = state
        .tables
        .lock()
        .unwrap()
        .get(&(database, namespace))
        .and_then(|table| table.get(&key).copied());

    match value {
        Some(value) => Json(ReadResponse {
            records: vec![Record { key, value }],
        })
        .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
