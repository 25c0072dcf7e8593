//! Line-oriented emission of measurement events.
//!
//! Every event becomes one comma-separated line without a header:
//!
//! - writer iterations: `epoch_micros,batch_size,iteration_latency_ns`
//! - reader windows: `epoch_micros,window_count,window_sum_ns,p99,p99_9999,window_max_ns`
//!
//! The sink is flushed after every line so that a process tailing the output sees each event
//! right away.

use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use crate::window::WindowSummary;

/// Formats a writer iteration event, including the trailing newline.
pub fn format_write_event(epoch_micros: u64, batch_size: usize, latency_ns: u64) -> String {
    format!("{epoch_micros},{batch_size},{latency_ns}\n")
}

/// Formats a reader window event, including the trailing newline.
pub fn format_window_event(epoch_micros: u64, summary: &WindowSummary) -> String {
    format!(
        "{},{},{},{:.2},{:.2},{}\n",
        epoch_micros, summary.count, summary.sum, summary.p99, summary.p99_9999, summary.max
    )
}

/// Writes measurement events to an optional sink.
///
/// Without a sink, reporting is a no-op. Failures to write are logged and otherwise ignored, so
/// callers always report unconditionally and never branch on the outcome.
pub struct MetricsReporter {
    sink: Option<Box<dyn Write + Send>>,
}

impl MetricsReporter {
    /// Creates a reporter writing to `sink`.
    pub fn new(sink: impl Write + Send + 'static) -> Self {
        Self {
            sink: Some(Box::new(sink)),
        }
    }

    /// Creates a reporter that discards all events.
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    /// Creates a reporter appending to the file at `path`, creating it if necessary.
    pub fn append_to(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(file))
    }

    /// Returns `true` if events are written anywhere.
    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Reports a completed writer iteration.
    pub fn report_write(&mut self, epoch_micros: u64, batch_size: usize, latency_ns: u64) {
        if self.sink.is_some() {
            self.emit(&format_write_event(epoch_micros, batch_size, latency_ns));
        }
    }

    /// Reports a completed reader window.
    pub fn report_window(&mut self, epoch_micros: u64, summary: &WindowSummary) {
        if self.sink.is_some() {
            self.emit(&format_window_event(epoch_micros, summary));
        }
    }

    fn emit(&mut self, line: &str) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };

        let result = sink
            .write_all(line.as_bytes())
            .and_then(|()| sink.flush());
        if let Err(error) = result {
            tracing::warn!(
                error = &error as &dyn std::error::Error,
                "failed to write metrics event"
            );
        }
    }
}

impl fmt::Debug for MetricsReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsReporter")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
