//! The measurement loops driving load against a store.
//!
//! A [`Writer`] upserts batches of unique keys and reports one event per iteration. A [`Reader`]
//! performs point lookups and reports one event per completed [`StatsWindow`]. Both open their
//! own session and own all of their state, so they can run as fully independent tasks.
//!
//! [`StatsWindow`]: crate::window::StatsWindow

use std::future::Future;
use std::time::Duration;

use crate::error::Result;
use crate::store::{BoxedStore, Connector, StatementKind, StoreError, StoreResult};

mod reader;
mod writer;

pub use self::reader::{Reader, ReaderOptions, ReaderReport};
pub use self::writer::{Writer, WriterOptions, WriterReport};

/// Awaits a store operation, failing with [`StoreError::Timeout`] once `timeout` has passed.
async fn bounded<T>(
    operation: &'static str,
    timeout: Option<Duration>,
    future: impl Future<Output = StoreResult<T>>,
) -> StoreResult<T> {
    match timeout {
        Some(timeout) => tokio::time::timeout(timeout, future)
            .await
            .map_err(|_| StoreError::Timeout { operation, timeout })?,
        None => future.await,
    }
}

/// Connects a new session and prepares the statement the calling role will execute.
async fn open_session(
    connector: &dyn Connector,
    statement: StatementKind,
    timeout: Option<Duration>,
) -> Result<BoxedStore> {
    let mut store = bounded("connect", timeout, connector.connect()).await?;
    bounded("prepare", timeout, store.prepare(statement)).await?;

    tracing::debug!(store = connector.name(), ?statement, "session ready");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bounded_passes_results_through() {
        let result = bounded("read", Some(Duration::from_secs(1)), async { Ok(3) }).await;
        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn bounded_times_out() {
        let result: StoreResult<()> = bounded(
            "read",
            Some(Duration::from_millis(10)),
            std::future::pending(),
        )
        .await;

        assert!(matches!(
            result,
            Err(StoreError::Timeout {
                operation: "read",
                ..
            })
        ));
    }
}
