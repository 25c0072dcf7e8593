//! Deterministic, seed-driven generation of unique keys.
//!
//! All key generation is built on a [`KeyStream`]: a seeded PRNG drawing uniformly from a
//! [`KeySpace`]. The writer wraps one stream in a [`KeySetGenerator`] to produce batches of unique
//! keys, while the reader draws single keys from an identically seeded stream. As long as both
//! roles use the same seed and key space, the reader's first draws are the writer's first keys.

use std::collections::BTreeSet;
use std::collections::btree_set;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// The range of keys `0..=max` a [`KeyStream`] draws from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct KeySpace {
    max: u64,
}

impl KeySpace {
    /// The full 64-bit key space.
    pub const FULL: Self = Self { max: u64::MAX };

    /// Creates a key space covering `0..=max`.
    pub const fn up_to(max: u64) -> Self {
        Self { max }
    }

    /// Returns the largest key in this space.
    pub const fn max(&self) -> u64 {
        self.max
    }

    /// Returns `true` if this space contains at least `count` distinct keys.
    pub fn can_hold(&self, count: usize) -> bool {
        // `max + 1` keys, without overflowing for the full space.
        count as u128 <= self.max as u128 + 1
    }
}

impl Default for KeySpace {
    /// Keys drawn from the 32-bit unsigned range.
    fn default() -> Self {
        Self::up_to(u32::MAX as u64)
    }
}

/// A resettable stream of uniformly distributed keys.
#[derive(Clone, Debug)]
pub struct KeyStream {
    seed: u64,
    space: KeySpace,
    rng: SmallRng,
}

impl KeyStream {
    /// Creates a stream over `space`, seeded with `seed`.
    pub fn new(seed: u64, space: KeySpace) -> Self {
        Self {
            seed,
            space,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Draws the next key.
    pub fn next_key(&mut self) -> u64 {
        self.rng.random_range(0..=self.space.max)
    }

    /// Rewinds the stream to its first key.
    pub fn reset(&mut self) {
        self.rng = SmallRng::seed_from_u64(self.seed);
    }

    /// Returns the seed this stream was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

/// Produces successive [`KeyBatch`]es of unique keys from a single seeded stream.
#[derive(Clone, Debug)]
pub struct KeySetGenerator {
    stream: KeyStream,
}

impl KeySetGenerator {
    /// Creates a generator over `space`, seeded with `seed`.
    pub fn new(seed: u64, space: KeySpace) -> Self {
        Self {
            stream: KeyStream::new(seed, space),
        }
    }

    /// Draws keys until `count` unique ones have been collected.
    ///
    /// Duplicate draws are discarded. There is no bound on the number of redraws, which is fine
    /// as long as `count` is far below the size of the key space.
    ///
    /// # Panics
    ///
    /// Panics if the key space holds fewer than `count` keys, as the batch could never be filled.
    pub fn next_batch(&mut self, count: usize) -> KeyBatch {
        assert!(
            self.stream.space.can_hold(count),
            "cannot draw {count} unique keys from {:?}",
            self.stream.space
        );

        let mut keys = BTreeSet::new();
        while keys.len() != count {
            keys.insert(self.stream.next_key());
        }

        KeyBatch { keys }
    }
}

/// Generates a single batch of `count` unique keys from `seed` over the default key space.
pub fn generate(seed: u64, count: usize) -> KeyBatch {
    KeySetGenerator::new(seed, KeySpace::default()).next_batch(count)
}

/// An ordered set of unique keys, traversed in ascending order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyBatch {
    keys: BTreeSet<u64>,
}

impl KeyBatch {
    /// Returns the number of keys in the batch.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if the batch holds no keys.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns `true` if the batch contains `key`.
    pub fn contains(&self, key: u64) -> bool {
        self.keys.contains(&key)
    }

    /// Returns an iterator over all keys in ascending order.
    pub fn iter(&self) -> btree_set::Iter<'_, u64> {
        self.keys.iter()
    }

    /// Returns a forward-only cursor that hands out the keys in sub-batches.
    pub fn cursor(&self) -> KeyCursor<'_> {
        KeyCursor {
            inner: self.keys.iter(),
        }
    }
}

impl<'a> IntoIterator for &'a KeyBatch {
    type Item = &'a u64;
    type IntoIter = btree_set::Iter<'a, u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A resumable position within a [`KeyBatch`].
#[derive(Clone, Debug)]
pub struct KeyCursor<'a> {
    inner: btree_set::Iter<'a, u64>,
}

impl KeyCursor<'_> {
    /// Takes up to `max` keys from the current position.
    ///
    /// A `max` of `0` takes all remaining keys. Returns `None` once the batch is exhausted.
    pub fn next_sub_batch(&mut self, max: usize) -> Option<Vec<u64>> {
        let max = if max == 0 { usize::MAX } else { max };
        let sub_batch: Vec<u64> = self.inner.by_ref().take(max).copied().collect();
        (!sub_batch.is_empty()).then_some(sub_batch)
    }

    /// Returns the number of keys not yet handed out.
    pub fn remaining(&self) -> usize {
        self.inner.len()
    }
}

impl Iterator for KeyCursor<'_> {
    type Item = u64;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().copied()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn generates_exact_count_of_unique_keys() {
        for seed in [0, 1, 42, u64::MAX] {
            for count in [0, 1, 10, 5000] {
                let batch = generate(seed, count);
                assert_eq!(batch.len(), count);

                let unique: HashSet<_> = batch.iter().collect();
                assert_eq!(unique.len(), count);
            }
        }
    }

    #[test]
    fn same_seed_same_order() {
        let first: Vec<_> = generate(7, 1000).iter().copied().collect();
        let second: Vec<_> = generate(7, 1000).iter().copied().collect();
        assert_eq!(first, second);

        assert!(first.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn different_seeds_differ() {
        assert_ne!(generate(1, 100), generate(2, 100));
    }

    #[test]
    fn generator_continues_the_stream() {
        let mut generator = KeySetGenerator::new(3, KeySpace::default());
        let first = generator.next_batch(50);
        let second = generator.next_batch(50);
        assert_ne!(first, second);

        // A fresh generator replays the same sequence of batches.
        let mut replay = KeySetGenerator::new(3, KeySpace::default());
        assert_eq!(replay.next_batch(50), first);
        assert_eq!(replay.next_batch(50), second);
    }

    #[test]
    fn small_space_is_exhausted_exactly() {
        let mut generator = KeySetGenerator::new(0, KeySpace::up_to(9));
        let batch = generator.next_batch(10);
        assert_eq!(batch.iter().copied().collect::<Vec<_>>(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    #[should_panic(expected = "cannot draw")]
    fn rejects_count_larger_than_space() {
        KeySetGenerator::new(0, KeySpace::up_to(3)).next_batch(5);
    }

    #[test]
    fn full_space_holds_any_count() {
        assert!(KeySpace::FULL.can_hold(usize::MAX));
        assert!(KeySpace::up_to(0).can_hold(1));
        assert!(!KeySpace::up_to(0).can_hold(2));
    }

    #[test]
    fn cursor_resumes_between_sub_batches() {
        let batch = generate(11, 25);
        let mut cursor = batch.cursor();

        let mut collected = Vec::new();
        let mut sizes = Vec::new();
        while let Some(sub_batch) = cursor.next_sub_batch(10) {
            sizes.push(sub_batch.len());
            collected.extend(sub_batch);
        }

        assert_eq!(sizes, [10, 10, 5]);
        assert_eq!(collected, batch.iter().copied().collect::<Vec<_>>());
        assert_eq!(cursor.remaining(), 0);
        assert!(cursor.next_sub_batch(10).is_none());
    }

    #[test]
    fn zero_sized_sub_batch_takes_everything() {
        let batch = generate(5, 12);
        let mut cursor = batch.cursor();
        assert_eq!(cursor.next_sub_batch(0).map(|keys| keys.len()), Some(12));
        assert!(cursor.next_sub_batch(0).is_none());
    }

    #[test]
    fn stream_reset_replays_keys() {
        let mut stream = KeyStream::new(9, KeySpace::default());
        let first: Vec<_> = (0..5).map(|_| stream.next_key()).collect();
        stream.reset();
        let replay: Vec<_> = (0..5).map(|_| stream.next_key()).collect();
        assert_eq!(first, replay);
    }

    #[test]
    fn reader_stream_starts_with_written_keys() {
        let mut stream = KeyStream::new(21, KeySpace::default());
        let batch = generate(21, 100);

        for _ in 0..100 {
            let key = stream.next_key();
            assert!(batch.contains(key), "key {key} was never written");
        }
    }
}
