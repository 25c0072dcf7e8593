use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use sketches_ddsketch::DDSketch;
use tokio_util::sync::CancellationToken;

use super::{bounded, open_session};
use crate::clock::{Clock, SystemClock};
use crate::digest::DEFAULT_COMPRESSION;
use crate::error::Result;
use crate::keyset::{KeySpace, KeyStream};
use crate::report::MetricsReporter;
use crate::store::{Connector, StatementKind};
use crate::window::{DEFAULT_WINDOW_SIZE, StatsWindow};

/// Configuration of a [`Reader`].
#[derive(Clone, Debug)]
pub struct ReaderOptions {
    /// Seed of the key stream. Must match the writer's seed to read back its keys.
    pub seed: u64,
    /// The range keys are drawn from.
    pub key_space: KeySpace,
    /// Number of samples per reported window.
    pub window_size: u64,
    /// Compression of the per-window latency digest.
    pub compression: usize,
    /// Stop after this many lookups. Runs until cancelled if unset.
    pub max_reads: Option<u64>,
    /// Upper bound for every store call.
    pub operation_timeout: Option<Duration>,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            key_space: KeySpace::default(),
            window_size: DEFAULT_WINDOW_SIZE,
            compression: DEFAULT_COMPRESSION,
            max_reads: None,
            operation_timeout: None,
        }
    }
}

/// Outcome of a reader run.
pub struct ReaderReport {
    /// Number of completed lookups.
    pub reads: u64,
    /// Lookups that did not return exactly one record.
    pub anomalies: u64,
    /// Number of windows reported.
    pub windows: u64,
    /// Whether the run stopped because it was cancelled.
    pub cancelled: bool,
    /// Wall time from the first lookup to the end of the run.
    pub elapsed: Duration,
    /// Lookup latencies, in seconds.
    pub latencies: DDSketch,
}

impl fmt::Debug for ReaderReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderReport")
            .field("reads", &self.reads)
            .field("anomalies", &self.anomalies)
            .field("windows", &self.windows)
            .field("cancelled", &self.cancelled)
            .field("elapsed", &self.elapsed)
            .finish_non_exhaustive()
    }
}

/// Reads back keys in the writer's order and reports latency windows.
///
/// The reader replays the same key stream as a writer with the same seed. As long as it trails
/// the writer, every lookup finds exactly one record. When a lookup returns any other count, the
/// reader has overtaken the writer: the sample is still recorded and the stream rewinds to its
/// first key.
#[derive(Debug)]
pub struct Reader {
    options: ReaderOptions,
    clock: Arc<dyn Clock>,
    reporter: MetricsReporter,
}

impl Reader {
    /// Creates a reader using the system clock and no metrics sink.
    pub fn new(options: ReaderOptions) -> Self {
        Self {
            options,
            clock: Arc::new(SystemClock),
            reporter: MetricsReporter::disabled(),
        }
    }

    /// Replaces the clock used for timing.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets where window events are reported.
    pub fn with_reporter(mut self, reporter: MetricsReporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Connects to the store and reads until cancelled or `max_reads` is reached.
    ///
    /// Cancellation is observed between lookups. Any store error ends the run immediately.
    pub async fn run(
        self,
        connector: &dyn Connector,
        cancel: CancellationToken,
    ) -> Result<ReaderReport> {
        let Self {
            options,
            clock,
            mut reporter,
        } = self;

        let mut window = StatsWindow::new(options.window_size, options.compression)?;
        let mut store =
            open_session(connector, StatementKind::PointRead, options.operation_timeout).await?;
        tracing::info!(
            store = connector.name(),
            seed = options.seed,
            window = window.size(),
            max_reads = options.max_reads,
            "starting reader"
        );

        let mut stream = KeyStream::new(options.seed, options.key_space);
        let mut latencies = DDSketch::default();
        let mut reads = 0;
        let mut anomalies = 0;
        let mut windows = 0;
        let mut cancelled = false;

        let started = clock.now();
        loop {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            if options.max_reads.is_some_and(|max| reads >= max) {
                break;
            }

            let key = stream.next_key();
            let start = clock.now();
            let records = bounded(
                "read",
                options.operation_timeout,
                store.point_read(key),
            )
            .await?;
            let latency = clock.now().saturating_duration_since(start);
            reads += 1;

            if records != 1 {
                anomalies += 1;
                tracing::debug!(key, records, "lookup did not find exactly one record, rewinding");
                stream.reset();
            }

            latencies.add(latency.as_secs_f64());
            let latency_ns = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
            if let Some(summary) = window.add(latency_ns) {
                reporter.report_window(clock.epoch_micros(), &summary);
                windows += 1;
                tracing::debug!(
                    p99 = summary.p99,
                    max = summary.max,
                    "completed read window"
                );
            }
        }

        let elapsed = clock.now().saturating_duration_since(started);
        tracing::info!(reads, anomalies, windows, ?elapsed, cancelled, "reader finished");

        Ok(ReaderReport {
            reads,
            anomalies,
            windows,
            cancelled,
            elapsed,
            latencies,
        })
    }
}
