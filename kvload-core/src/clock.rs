//! Time sources for measuring and pacing workloads.
//!
//! All measurements use a monotonic [`Instant`]. Reported event timestamps use wall-clock
//! microseconds since the Unix epoch. Workloads access both through the [`Clock`] trait so tests
//! can drive time manually with a [`ManualClock`].

use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// A source of monotonic and wall-clock time.
#[async_trait::async_trait]
pub trait Clock: Debug + Send + Sync + 'static {
    /// Returns the current monotonic instant.
    fn now(&self) -> Instant;

    /// Returns the current wall-clock time in microseconds since the Unix epoch.
    fn epoch_micros(&self) -> u64;

    /// Suspends the caller for up to `duration`.
    ///
    /// Implementations may wake up early. Use [`sleep_at_least`] to sleep for a guaranteed
    /// minimum duration.
    async fn sleep(&self, duration: Duration);
}

/// Sleeps until at least `duration` has elapsed on `clock`.
///
/// Every wake-up re-checks the monotonic clock and sleeps again for whatever remains, so early
/// wake-ups never shorten the total. Returns the time actually slept.
pub async fn sleep_at_least(clock: &dyn Clock, duration: Duration) -> Duration {
    let start = clock.now();
    let deadline = start + duration;

    loop {
        let now = clock.now();
        if now >= deadline {
            return now - start;
        }
        clock.sleep(deadline - now).await;
    }
}

/// The operating system's clocks, sleeping on the tokio timer.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

#[async_trait::async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_micros(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_micros() as u64)
            .unwrap_or_default()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Default)]
struct ManualState {
    elapsed: Duration,
    early_wakes: VecDeque<Duration>,
    sleeps: Vec<Duration>,
}

/// A clock that only moves when told to.
///
/// Sleeping advances the clock by the requested duration, unless an early wake-up was scheduled
/// with [`wake_early_after`](Self::wake_early_after).
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    epoch_origin: Duration,
    state: Mutex<ManualState>,
}

impl ManualClock {
    /// Creates a clock standing at its origin.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            epoch_origin: Duration::from_secs(1_700_000_000),
            state: Mutex::default(),
        }
    }

    /// Moves the clock forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        self.state.lock().unwrap().elapsed += duration;
    }

    /// Returns the time elapsed since the clock's origin.
    pub fn elapsed(&self) -> Duration {
        self.state.lock().unwrap().elapsed
    }

    /// Makes the next pending sleep call return after only `partial` has passed.
    ///
    /// Calls queue up: each scheduled wake-up interrupts one sleep call, in order.
    pub fn wake_early_after(&self, partial: Duration) {
        self.state.lock().unwrap().early_wakes.push_back(partial);
    }

    /// Returns the durations requested by every call to [`Clock::sleep`] so far.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.state.lock().unwrap().sleeps.clone()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn epoch_micros(&self) -> u64 {
        (self.epoch_origin + self.elapsed()).as_micros() as u64
    }

    async fn sleep(&self, duration: Duration) {
        let mut state = self.state.lock().unwrap();
        state.sleeps.push(duration);
        let step = match state.early_wakes.pop_front() {
            Some(partial) => partial.min(duration),
            None => duration,
        };
        state.elapsed += step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sleeps_through_early_wakes() {
        let clock = ManualClock::new();
        clock.wake_early_after(Duration::from_millis(10));
        clock.wake_early_after(Duration::ZERO);
        clock.wake_early_after(Duration::from_millis(25));

        let slept = sleep_at_least(&clock, Duration::from_millis(100)).await;

        assert!(slept >= Duration::from_millis(100));
        assert_eq!(clock.elapsed(), Duration::from_millis(100));
        assert_eq!(
            clock.sleeps(),
            [
                Duration::from_millis(100),
                Duration::from_millis(90),
                Duration::from_millis(90),
                Duration::from_millis(65),
            ]
        );
    }

    #[tokio::test]
    async fn zero_duration_does_not_sleep() {
        let clock = ManualClock::new();
        let slept = sleep_at_least(&clock, Duration::ZERO).await;

        assert_eq!(slept, Duration::ZERO);
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn manual_clock_tracks_wall_time() {
        let clock = ManualClock::new();
        let before = clock.epoch_micros();
        clock.advance(Duration::from_millis(3));
        assert_eq!(clock.epoch_micros() - before, 3_000);
    }

    #[tokio::test]
    async fn system_clock_sleeps_at_least() {
        let clock = SystemClock;
        let start = Instant::now();
        sleep_at_least(&clock, Duration::from_millis(20)).await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
