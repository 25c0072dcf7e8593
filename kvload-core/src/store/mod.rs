//! The store capability set driven by the workload loops.
//!
//! A [`Connector`] opens independent sessions ([`Store`] instances) to the target data store.
//! Every workload role connects on its own, so no session is ever shared between the writer and
//! the reader.

use std::fmt::Debug;
use std::time::Duration;

use thiserror::Error;

pub mod http;
pub mod in_memory;

pub use self::http::HttpConnector;
pub use self::in_memory::InMemoryStore;

/// A type-erased [`Store`] session.
pub type BoxedStore = Box<dyn Store>;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// The statements a workload role prepares before it starts measuring.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StatementKind {
    /// Idempotent upsert of a `(key, value)` pair.
    Upsert,
    /// Lookup of a single key.
    PointRead,
}

/// A batched write built ahead of the timed store call.
///
/// Building a batch covers everything a client does before handing the request to the store,
/// such as collecting records and serializing the request body.
#[derive(Debug)]
pub enum PreparedBatch {
    /// Raw entries, for stores without a separate request representation.
    Entries {
        /// The `(key, value)` upserts.
        entries: Vec<(u64, u64)>,
        /// Whether the batch is applied all-or-nothing.
        atomic: bool,
    },
    /// A fully built HTTP request.
    Http(reqwest::Request),
}

/// Opens new sessions against a store.
#[async_trait::async_trait]
pub trait Connector: Debug + Send + Sync + 'static {
    /// The connector name, used for diagnostics.
    fn name(&self) -> &'static str;

    /// Establishes a new session.
    async fn connect(&self) -> StoreResult<BoxedStore>;
}

/// A session against the store under test.
#[async_trait::async_trait]
pub trait Store: Debug + Send + Sync + 'static {
    /// Prepares a statement ahead of time.
    ///
    /// Stores without server-side statement preparation keep the default no-op.
    async fn prepare(&mut self, _statement: StatementKind) -> StoreResult<()> {
        Ok(())
    }

    /// Builds the request upserting all `(key, value)` pairs, without submitting it.
    ///
    /// With `atomic` set, the store is asked to apply the batch all-or-nothing.
    fn build_batch(&mut self, entries: &[(u64, u64)], atomic: bool) -> StoreResult<PreparedBatch> {
        Ok(PreparedBatch::Entries {
            entries: entries.to_vec(),
            atomic,
        })
    }

    /// Submits a batch built by [`build_batch`](Self::build_batch) as a single request.
    async fn execute_batch(&mut self, batch: PreparedBatch) -> StoreResult<()>;

    /// Builds and submits a batch in one step.
    async fn write_batch(&mut self, entries: &[(u64, u64)], atomic: bool) -> StoreResult<()> {
        let batch = self.build_batch(entries, atomic)?;
        self.execute_batch(batch).await
    }

    /// Looks up a single key and returns the number of records found.
    async fn point_read(&mut self, key: u64) -> StoreResult<u64>;
}

/// Errors reported by a store session.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The session could not be established.
    #[error("connection error: {context}")]
    Connection {
        context: String,
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A statement could not be prepared.
    #[error("prepare error: {context}")]
    Prepare {
        context: String,
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The store rejected or failed a batched write.
    #[error("write error: {context}")]
    Write {
        context: String,
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The store failed a point read.
    #[error("read error: {context}")]
    Read {
        context: String,
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A store call did not complete within the configured operation timeout.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },
}

impl StoreError {
    pub(crate) fn connection(
        context: impl Into<String>,
        cause: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Connection {
            context: context.into(),
            cause: cause.into(),
        }
    }

    pub(crate) fn write(
        context: impl Into<String>,
        cause: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Write {
            context: context.into(),
            cause: cause.into(),
        }
    }

    pub(crate) fn read(
        context: impl Into<String>,
        cause: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Read {
            context: context.into(),
            cause: cause.into(),
        }
    }
}
