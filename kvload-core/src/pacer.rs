//! Throughput control for the writer loop.
//!
//! In [`Pacing::TargetRate`] mode the pacer is closed-loop: after every iteration it compares the
//! time the completed units *should* have taken at the target rate with the time they actually
//! took, and asks the caller to sleep off any lead. A run that has fallen behind is never slowed
//! down further.

use std::time::{Duration, Instant};

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// How the writer spaces out its iterations.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Pacing {
    /// Run iterations back to back.
    #[default]
    Unlimited,
    /// Sleep a fixed duration after every iteration.
    FixedDelay(Duration),
    /// Track an aggregate rate in units (keys) per second.
    TargetRate(u64),
}

/// Computes how long to wait so that `units_completed` units are not done ahead of `target_rate`.
///
/// A `target_rate` of `0` disables pacing and always yields a zero delay.
pub fn next_delay(target_rate: u64, units_completed: u64, elapsed: Duration) -> Duration {
    if target_rate == 0 {
        return Duration::ZERO;
    }

    let ideal_nanos = units_completed as u128 * NANOS_PER_SEC / target_rate as u128;
    let delay_nanos = ideal_nanos.saturating_sub(elapsed.as_nanos());

    Duration::from_nanos(delay_nanos.min(u64::MAX as u128) as u64)
}

/// Tracks progress of a paced loop.
#[derive(Clone, Debug)]
pub struct Pacer {
    pacing: Pacing,
    started: Option<Instant>,
    units_completed: u64,
}

impl Pacer {
    /// Creates a pacer that has not started yet.
    pub fn new(pacing: Pacing) -> Self {
        Self {
            pacing,
            started: None,
            units_completed: 0,
        }
    }

    /// Marks the start of the paced loop.
    ///
    /// Only the first call has an effect, so the reference point never moves.
    pub fn start(&mut self, now: Instant) {
        self.started.get_or_insert(now);
    }

    /// Records `units` more completed units and returns the delay before the next iteration.
    pub fn record(&mut self, units: u64, now: Instant) -> Duration {
        self.units_completed += units;
        let started = *self.started.get_or_insert(now);

        match self.pacing {
            Pacing::Unlimited => Duration::ZERO,
            Pacing::FixedDelay(delay) => delay,
            Pacing::TargetRate(rate) => {
                next_delay(rate, self.units_completed, now.saturating_duration_since(started))
            }
        }
    }

    /// Returns the total number of units recorded.
    pub fn units_completed(&self) -> u64 {
        self.units_completed
    }

    /// Returns the configured pacing mode.
    pub fn pacing(&self) -> Pacing {
        self.pacing
    }
}
