//! Fixed-size accumulation windows of latency samples.

use crate::digest::{DigestError, LatencyDigest};

/// Default number of samples per window.
pub const DEFAULT_WINDOW_SIZE: u64 = 10_000;

/// Summary of a completed [`StatsWindow`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowSummary {
    /// Number of samples in the window.
    pub count: u64,
    /// Sum of all samples, in nanoseconds.
    pub sum: u64,
    /// Smallest sample, in nanoseconds.
    pub min: u64,
    /// Largest sample, in nanoseconds.
    pub max: u64,
    /// Estimated 99th percentile, in nanoseconds.
    pub p99: f64,
    /// Estimated value at quantile `0.9999` (p99.99), in nanoseconds.
    pub p99_9999: f64,
}

/// Accumulates exactly `size` latency samples before emitting a [`WindowSummary`].
///
/// Once full, the window resets itself in place, reusing the digest's storage. `min` and `max`
/// hold sentinel values (`u64::MAX` and `0`) until the first sample of a window arrives.
#[derive(Debug)]
pub struct StatsWindow {
    size: u64,
    digest: LatencyDigest,
    count: u64,
    sum: u64,
    min: u64,
    max: u64,
}

impl StatsWindow {
    /// Creates an empty window holding `size` samples.
    ///
    /// A `size` of `0` is treated as `1`.
    pub fn new(size: u64, compression: usize) -> Result<Self, DigestError> {
        Ok(Self {
            size: size.max(1),
            digest: LatencyDigest::new(compression)?,
            count: 0,
            sum: 0,
            min: u64::MAX,
            max: 0,
        })
    }

    /// Adds a sample in nanoseconds.
    ///
    /// Returns the window's summary if this sample completed it. The window is empty again when
    /// this returns `Some`.
    pub fn add(&mut self, sample_ns: u64) -> Option<WindowSummary> {
        self.digest.add(sample_ns as f64);
        self.count += 1;
        self.sum = self.sum.saturating_add(sample_ns);
        self.min = self.min.min(sample_ns);
        self.max = self.max.max(sample_ns);

        if self.count < self.size {
            return None;
        }

        let summary = self.summary();
        self.reset();
        Some(summary)
    }

    /// Summarizes the samples collected so far without resetting.
    pub fn summary(&mut self) -> WindowSummary {
        WindowSummary {
            count: self.count,
            sum: self.sum,
            min: self.min,
            max: self.max,
            p99: self.digest.value_at(0.99).unwrap_or_default(),
            p99_9999: self.digest.value_at(0.9999).unwrap_or_default(),
        }
    }

    /// Discards all samples of the current window.
    pub fn reset(&mut self) {
        self.digest.reset();
        self.count = 0;
        self.sum = 0;
        self.min = u64::MAX;
        self.max = 0;
    }

    /// Returns the number of samples in the current window.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Returns the number of samples after which the window completes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns the smallest sample, or `u64::MAX` if the window is empty.
    pub fn min(&self) -> u64 {
        self.min
    }

    /// Returns the largest sample, or `0` if the window is empty.
    pub fn max(&self) -> u64 {
        self.max
    }
}
