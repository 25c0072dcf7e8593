use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use sketches_ddsketch::DDSketch;
use tokio_util::sync::CancellationToken;

use super::{bounded, open_session};
use crate::clock::{Clock, SystemClock, sleep_at_least};
use crate::error::{Result, WorkloadError};
use crate::keyset::{KeyBatch, KeySetGenerator, KeySpace};
use crate::pacer::{Pacer, Pacing};
use crate::report::MetricsReporter;
use crate::store::{Connector, StatementKind, Store};

/// Configuration of a [`Writer`].
#[derive(Clone, Debug)]
pub struct WriterOptions {
    /// Seed of the key generator. Equal seeds produce equal key sequences.
    pub seed: u64,
    /// The range keys are drawn from.
    pub key_space: KeySpace,
    /// Number of batches to write.
    pub iterations: u64,
    /// Number of unique keys per batch.
    pub keys: usize,
    /// Maximum number of upserts per store call. `0` submits each batch in a single call.
    pub batch_size: usize,
    /// Requests all-or-nothing application of every store call.
    pub atomic: bool,
    /// Spacing between iterations.
    pub pacing: Pacing,
    /// Upper bound for every store call.
    pub operation_timeout: Option<Duration>,
}

impl WriterOptions {
    fn validate(&self) -> Result<()> {
        if self.keys == 0 {
            return Err(WorkloadError::InvalidOptions(
                "writer needs at least one key per batch".into(),
            ));
        }

        if !self.key_space.can_hold(self.keys) {
            return Err(WorkloadError::InvalidOptions(format!(
                "cannot draw {} unique keys from a key space of {}",
                self.keys,
                self.key_space.max() as u128 + 1
            )));
        }

        Ok(())
    }
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            key_space: KeySpace::default(),
            iterations: 40_000,
            keys: 5_000,
            batch_size: 10,
            atomic: false,
            pacing: Pacing::Unlimited,
            operation_timeout: None,
        }
    }
}

/// Outcome of a writer run.
pub struct WriterReport {
    /// Number of completed iterations.
    pub iterations: u64,
    /// Total number of keys upserted.
    pub keys_written: u64,
    /// Whether the run stopped early because it was cancelled.
    pub cancelled: bool,
    /// Wall time from the first iteration to the end of the run.
    pub elapsed: Duration,
    /// Iteration latencies, in seconds.
    pub latencies: DDSketch,
}

impl fmt::Debug for WriterReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterReport")
            .field("iterations", &self.iterations)
            .field("keys_written", &self.keys_written)
            .field("cancelled", &self.cancelled)
            .field("elapsed", &self.elapsed)
            .finish_non_exhaustive()
    }
}

/// Upserts batches of unique keys and measures how long each batch takes.
///
/// Every iteration draws a fresh [`KeyBatch`], submits it in sub-batches of at most
/// [`batch_size`](WriterOptions::batch_size) upserts, and reports the summed duration of those
/// store calls. Key generation, reporting and pacing happen outside the timed section.
#[derive(Debug)]
pub struct Writer {
    options: WriterOptions,
    clock: Arc<dyn Clock>,
    reporter: MetricsReporter,
}

impl Writer {
    /// Creates a writer using the system clock and no metrics sink.
    pub fn new(options: WriterOptions) -> Self {
        Self {
            options,
            clock: Arc::new(SystemClock),
            reporter: MetricsReporter::disabled(),
        }
    }

    /// Replaces the clock used for timing and pacing.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets where iteration events are reported.
    pub fn with_reporter(mut self, reporter: MetricsReporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Connects to the store and runs all iterations.
    ///
    /// Cancellation is observed between iterations and during pacing sleeps. Any store error
    /// ends the run immediately.
    pub async fn run(
        self,
        connector: &dyn Connector,
        cancel: CancellationToken,
    ) -> Result<WriterReport> {
        let Self {
            options,
            clock,
            mut reporter,
        } = self;
        options.validate()?;

        let mut store = open_session(connector, StatementKind::Upsert, options.operation_timeout)
            .await?;
        tracing::info!(
            store = connector.name(),
            seed = options.seed,
            iterations = options.iterations,
            keys = options.keys,
            batch_size = options.batch_size,
            pacing = ?options.pacing,
            "starting writer"
        );

        let mut generator = KeySetGenerator::new(options.seed, options.key_space);
        let mut pacer = Pacer::new(options.pacing);
        let mut latencies = DDSketch::default();
        let mut completed = 0;
        let mut cancelled = false;

        let started = clock.now();
        pacer.start(started);

        for iteration in 0..options.iterations {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let batch = generator.next_batch(options.keys);
            let latency = write_iteration(&options, clock.as_ref(), store.as_mut(), &batch).await?;

            let latency_ns = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
            reporter.report_write(clock.epoch_micros(), batch.len(), latency_ns);
            latencies.add(latency.as_secs_f64());
            completed += 1;

            let delay = pacer.record(batch.len() as u64, clock.now());
            if delay.is_zero() || iteration + 1 == options.iterations {
                continue;
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                _ = sleep_at_least(clock.as_ref(), delay) => {}
            }
        }

        let elapsed = clock.now().saturating_duration_since(started);
        tracing::info!(iterations = completed, ?elapsed, cancelled, "writer finished");

        Ok(WriterReport {
            iterations: completed,
            keys_written: pacer.units_completed(),
            cancelled,
            elapsed,
            latencies,
        })
    }
}

/// Submits one batch and returns the time spent executing store calls.
///
/// Requests are built before the clock starts.
async fn write_iteration(
    options: &WriterOptions,
    clock: &dyn Clock,
    store: &mut dyn Store,
    batch: &KeyBatch,
) -> Result<Duration> {
    let mut cursor = batch.cursor();
    let mut latency = Duration::ZERO;

    while let Some(keys) = cursor.next_sub_batch(options.batch_size) {
        let entries: Vec<_> = keys.into_iter().map(|key| (key, key)).collect();
        let prepared = store.build_batch(&entries, options.atomic)?;

        let start = clock.now();
        bounded(
            "write",
            options.operation_timeout,
            store.execute_batch(prepared),
        )
        .await?;
        latency += clock.now().saturating_duration_since(start);
    }

    Ok(latency)
}
