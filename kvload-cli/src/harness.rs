//! Spawns the writer and reader roles and supervises them until they finish.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use kvload_core::report::MetricsReporter;
use kvload_core::store::{Connector, HttpConnector, InMemoryStore};
use kvload_core::{Reader, ReaderReport, WorkloadError, Writer, WriterReport};
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, Storage};

/// The roles started by a run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Roles {
    /// Writer and reader concurrently.
    Both,
    /// Only the writer.
    Writer,
    /// Only the reader.
    Reader,
}

impl Roles {
    fn writer(self) -> bool {
        matches!(self, Self::Both | Self::Writer)
    }

    fn reader(self) -> bool {
        matches!(self, Self::Both | Self::Reader)
    }
}

/// Results of all roles of a finished run.
#[derive(Debug, Default)]
pub struct RunOutcome {
    /// Report of the writer, if it ran to completion or was cancelled.
    pub writer: Option<WriterReport>,
    /// Report of the reader, if it ran to completion or was cancelled.
    pub reader: Option<ReaderReport>,
    /// Fatal errors of failed roles.
    pub errors: Vec<anyhow::Error>,
}

impl RunOutcome {
    /// Converts the outcome into the process result, failing with the first fatal error.
    pub fn into_result(self) -> Result<()> {
        match self.errors.into_iter().next() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Creates the connector for the configured store.
pub fn connector(storage: &Storage) -> Arc<dyn Connector> {
    match storage {
        Storage::Memory => Arc::new(InMemoryStore::new()),
        Storage::Http {
            endpoint,
            database,
            namespace,
        } => Arc::new(HttpConnector::new(endpoint, database, namespace)),
    }
}

fn reporter(path: Option<&Path>) -> Result<MetricsReporter> {
    match path {
        Some(path) => MetricsReporter::append_to(path)
            .with_context(|| format!("failed to open metrics sink `{}`", path.display())),
        None => Ok(MetricsReporter::disabled()),
    }
}

/// Runs the requested roles against `connector` until they finish, fail, or are interrupted.
///
/// SIGINT and SIGTERM cancel all roles. A role failing with an error cancels the others. Errors
/// of the roles are collected in the outcome; only setup failures are returned directly.
pub async fn run(
    config: &Config,
    roles: Roles,
    connector: Arc<dyn Connector>,
) -> Result<RunOutcome> {
    let writer = if roles.writer() {
        let sink = reporter(config.writer.stats.as_deref())?;
        Some(Writer::new(config.writer_options()?).with_reporter(sink))
    } else {
        None
    };
    let reader = if roles.reader() {
        let sink = reporter(config.reader.stats.as_deref())?;
        Some(Reader::new(config.reader_options()).with_reporter(sink))
    } else {
        None
    };

    let cancel = CancellationToken::new();
    let writer = writer.map(|writer| {
        let (connector, cancel) = (connector.clone(), cancel.clone());
        tokio::spawn(async move {
            let result = writer.run(connector.as_ref(), cancel.clone()).await;
            if result.is_err() {
                cancel.cancel();
            }
            result
        })
    });
    let reader = reader.map(|reader| {
        let (connector, cancel) = (connector.clone(), cancel.clone());
        tokio::spawn(async move {
            let result = reader.run(connector.as_ref(), cancel.clone()).await;
            if result.is_err() {
                cancel.cancel();
            }
            result
        })
    });

    tokio::spawn(cancel_on_shutdown(cancel.clone()));

    let mut outcome = RunOutcome::default();
    if let Some(task) = writer {
        if let Some(report) = join("writer", task, &cancel, &mut outcome.errors).await? {
            outcome.writer = Some(report);
        }
    }
    if let Some(task) = reader {
        if let Some(report) = join("reader", task, &cancel, &mut outcome.errors).await? {
            outcome.reader = Some(report);
        }
    }

    // Stops the signal listener.
    cancel.cancel();
    Ok(outcome)
}

async fn join<T>(
    role: &'static str,
    task: JoinHandle<Result<T, WorkloadError>>,
    cancel: &CancellationToken,
    errors: &mut Vec<anyhow::Error>,
) -> Result<Option<T>> {
    let result = task.await.with_context(|| format!("{role} task panicked"));
    if result.is_err() {
        // Nothing waits for the remaining roles after a panic.
        cancel.cancel();
    }

    match result? {
        Ok(report) => Ok(Some(report)),
        Err(error) => {
            tracing::error!(
                role,
                error = &error as &dyn std::error::Error,
                "workload failed"
            );
            errors.push(anyhow::Error::new(error).context(format!("{role} failed")));
            Ok(None)
        }
    }
}

async fn cancel_on_shutdown(cancel: CancellationToken) {
    tokio::select! {
        _ = cancel.cancelled() => {}
        result = shutdown_signal() => match result {
            Ok(()) => {
                tracing::info!("received shutdown signal, stopping workloads");
                cancel.cancel();
            }
            Err(error) => {
                tracing::warn!(
                    error = &error as &dyn std::error::Error,
                    "failed to listen for shutdown signals"
                );
            }
        },
    }
}

async fn shutdown_signal() -> std::io::Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = terminate.recv() => {}
        _ = interrupt.recv() => {}
    }

    Ok(())
}
