//! A bounded-memory streaming quantile estimator.
//!
//! [`LatencyDigest`] wraps a merging t-digest with the `K1` (arcsine) scale function
//!
//! ```text
//! k(q) = compression / (2π) · asin(2q − 1)
//! ```
//!
//! which allows large centroids around the median and forces centroids near `q = 0` and `q = 1`
//! to stay tiny. This keeps estimates of extreme quantiles such as p99.99 accurate while memory
//! stays bounded by the compression parameter, regardless of how many samples are added.

use pdatastructs::tdigest::{K1, TDigest};
use thiserror::Error;

/// Default compression, which also bounds the number of retained centroids.
pub const DEFAULT_COMPRESSION: usize = 1000;

/// Number of buffered samples per unit of compression before a merge is forced.
const BACKLOG_FACTOR: usize = 5;

/// Errors creating a [`LatencyDigest`].
#[derive(Debug, Error)]
pub enum DigestError {
    /// The compression parameter must be positive.
    #[error("digest compression must be positive")]
    InvalidCompression,
}

/// Streaming estimator of latency quantiles with bounded memory.
#[derive(Debug)]
pub struct LatencyDigest {
    inner: TDigest<K1>,
    count: u64,
    min: f64,
    max: f64,
}

impl LatencyDigest {
    /// Creates an empty digest.
    pub fn new(compression: usize) -> Result<Self, DigestError> {
        if compression == 0 {
            return Err(DigestError::InvalidCompression);
        }

        Ok(Self {
            inner: Self::empty(compression),
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        })
    }

    fn empty(compression: usize) -> TDigest<K1> {
        TDigest::new(
            K1::new(compression as f64),
            compression.saturating_mul(BACKLOG_FACTOR),
        )
    }

    /// Adds a single observation. Non-finite samples are ignored.
    pub fn add(&mut self, sample: f64) {
        if !sample.is_finite() {
            return;
        }

        self.inner.insert(sample);
        self.count += 1;
        self.min = self.min.min(sample);
        self.max = self.max.max(sample);
    }

    /// Returns the number of samples added since creation or the last [`reset`](Self::reset).
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Returns `true` if no samples have been added.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns the number of merged centroids currently retained.
    pub fn centroid_count(&self) -> usize {
        self.inner.n_centroids()
    }

    /// Estimates the value at quantile `q` (clamped to `0.0..=1.0`).
    ///
    /// Returns `None` if the digest is empty. The extremes are exact.
    pub fn value_at(&self, q: f64) -> Option<f64> {
        if self.is_empty() {
            return None;
        }

        let q = q.clamp(0.0, 1.0);
        if q == 0.0 || self.min == self.max {
            return Some(self.min);
        }
        if q == 1.0 {
            return Some(self.max);
        }

        Some(self.inner.quantile(q).clamp(self.min, self.max))
    }

    /// Discards all samples.
    pub fn reset(&mut self) {
        self.inner.clear();
        self.count = 0;
        self.min = f64::INFINITY;
        self.max = f64::NEG_INFINITY;
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn exact_quantile(sorted: &[f64], q: f64) -> f64 {
        let rank = ((q * sorted.len() as f64).ceil() as usize).clamp(1, sorted.len());
        sorted[rank - 1]
    }

    fn relative_error(estimate: f64, exact: f64) -> f64 {
        ((estimate - exact) / exact).abs()
    }

    #[test]
    fn rejects_zero_compression() {
        assert!(matches!(
            LatencyDigest::new(0),
            Err(DigestError::InvalidCompression)
        ));
    }

    #[test]
    fn empty_digest_has_no_quantiles() {
        let digest = LatencyDigest::new(DEFAULT_COMPRESSION).unwrap();
        assert!(digest.is_empty());
        assert_eq!(digest.value_at(0.99), None);
    }

    #[test]
    fn single_sample() {
        let mut digest = LatencyDigest::new(DEFAULT_COMPRESSION).unwrap();
        digest.add(42.0);
        assert_eq!(digest.value_at(0.0), Some(42.0));
        assert_eq!(digest.value_at(0.5), Some(42.0));
        assert_eq!(digest.value_at(1.0), Some(42.0));
    }

    #[test]
    fn non_finite_samples_are_ignored() {
        let mut digest = LatencyDigest::new(DEFAULT_COMPRESSION).unwrap();
        digest.add(f64::NAN);
        digest.add(f64::INFINITY);
        assert!(digest.is_empty());
    }

    #[test]
    fn extremes_are_exact() {
        let mut digest = LatencyDigest::new(100).unwrap();
        for sample in 0..10_000 {
            digest.add(sample as f64);
        }
        assert_eq!(digest.value_at(0.0), Some(0.0));
        assert_eq!(digest.value_at(1.0), Some(9999.0));
    }

    #[test]
    fn uniform_distribution_accuracy() {
        let mut rng = SmallRng::seed_from_u64(0);
        let mut digest = LatencyDigest::new(DEFAULT_COMPRESSION).unwrap();

        let mut samples: Vec<f64> = (0..100_000)
            .map(|_| rng.random_range(0..1_000_000u64) as f64)
            .collect();
        for &sample in &samples {
            digest.add(sample);
        }
        samples.sort_by(f64::total_cmp);

        for (q, bound) in [(0.5, 0.01), (0.99, 0.01), (0.9999, 0.05)] {
            let exact = exact_quantile(&samples, q);
            let estimate = digest.value_at(q).unwrap();
            let error = relative_error(estimate, exact);
            assert!(
                error <= bound,
                "q={q}: estimate {estimate}, exact {exact}, error {error}"
            );
        }
    }

    #[test]
    fn long_tail_accuracy() {
        // Mostly fast operations with a small fraction of very slow outliers.
        let mut rng = SmallRng::seed_from_u64(1);
        let mut digest = LatencyDigest::new(DEFAULT_COMPRESSION).unwrap();

        let mut samples: Vec<f64> = (0..200_000)
            .map(|_| {
                if rng.random_bool(0.005) {
                    rng.random_range(5_000_000..50_000_000u64) as f64
                } else {
                    rng.random_range(100_000..300_000u64) as f64
                }
            })
            .collect();
        for &sample in &samples {
            digest.add(sample);
        }
        samples.sort_by(f64::total_cmp);

        for (q, bound) in [(0.99, 0.05), (0.999, 0.05), (0.9999, 0.05)] {
            let exact = exact_quantile(&samples, q);
            let estimate = digest.value_at(q).unwrap();
            let error = relative_error(estimate, exact);
            assert!(
                error <= bound,
                "q={q}: estimate {estimate}, exact {exact}, error {error}"
            );
        }
    }

    #[test]
    fn memory_stays_bounded() {
        let mut digest = LatencyDigest::new(DEFAULT_COMPRESSION).unwrap();
        for sample in 0..1_000_000u64 {
            digest.add((sample % 7919) as f64);
        }
        assert_eq!(digest.count(), 1_000_000);
        assert!(digest.centroid_count() <= DEFAULT_COMPRESSION);
    }

    #[test]
    fn reset_discards_samples() {
        let mut digest = LatencyDigest::new(DEFAULT_COMPRESSION).unwrap();
        for sample in 0..10_000 {
            digest.add(sample as f64);
        }
        digest.reset();

        assert!(digest.is_empty());
        assert_eq!(digest.value_at(0.5), None);

        digest.add(7.0);
        assert_eq!(digest.value_at(0.99), Some(7.0));
    }
}
