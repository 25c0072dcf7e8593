use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use kvload_core::clock::ManualClock;
use kvload_core::keyset::{self, KeySetGenerator, KeySpace};
use kvload_core::pacer::Pacing;
use kvload_core::report::MetricsReporter;
use kvload_core::store::InMemoryStore;
use kvload_core::{Reader, ReaderOptions, Writer, WriterOptions};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn writer_submits_unique_sorted_batches() {
    kvload_test::tracing::init();
    let store = InMemoryStore::new();

    let options = WriterOptions {
        seed: 0,
        iterations: 2,
        keys: 5,
        batch_size: 2,
        ..Default::default()
    };
    let report = Writer::new(options)
        .run(&store, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.iterations, 2);

    let batches = store.batches();
    let sizes: Vec<_> = batches.iter().map(Vec::len).collect();
    assert_eq!(sizes, [2, 2, 1, 2, 2, 1]);

    // Each iteration's sub-batches partition one key set in ascending order.
    for iteration in batches.chunks(3) {
        let keys: Vec<u64> = iteration.iter().flatten().map(|&(key, _)| key).collect();
        let unique: BTreeSet<_> = keys.iter().copied().collect();
        assert_eq!(unique.len(), 5);
        assert!(keys.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(keys.iter().all(|&key| key <= u32::MAX as u64));
    }

    // Both iterations write exactly the key sets a generator with the same seed yields.
    let expected: Vec<u64> = keyset::generate(0, 5).iter().copied().collect();
    let first: Vec<u64> = batches[..3].iter().flatten().map(|&(key, _)| key).collect();
    assert_eq!(first, expected);

    let mut generator = KeySetGenerator::new(0, KeySpace::default());
    assert_eq!(generator.next_batch(5).iter().copied().collect::<Vec<_>>(), expected);
    let expected: Vec<u64> = generator.next_batch(5).iter().copied().collect();
    let second: Vec<u64> = batches[3..].iter().flatten().map(|&(key, _)| key).collect();
    assert_eq!(second, expected);
}

#[tokio::test]
async fn equal_seeds_write_equal_keys() {
    let first = InMemoryStore::new();
    let second = InMemoryStore::new();
    let options = WriterOptions {
        seed: 42,
        iterations: 3,
        keys: 50,
        ..Default::default()
    };

    for store in [&first, &second] {
        Writer::new(options.clone())
            .run(store, CancellationToken::new())
            .await
            .unwrap();
    }

    assert_eq!(first.batches(), second.batches());
}

#[tokio::test]
async fn reader_trails_writer_without_anomalies() {
    let store = InMemoryStore::new();
    let writer = WriterOptions {
        seed: 9,
        key_space: KeySpace::up_to(1_000_000),
        iterations: 4,
        keys: 250,
        ..Default::default()
    };
    Writer::new(writer)
        .run(&store, CancellationToken::new())
        .await
        .unwrap();

    // The first 1000 draws of the stream were all written, give or take duplicates skipped
    // within a batch, so reading fewer keys than that never misses.
    let reader = ReaderOptions {
        seed: 9,
        key_space: KeySpace::up_to(1_000_000),
        window_size: 100,
        max_reads: Some(900),
        ..Default::default()
    };
    let report = Reader::new(reader)
        .run(&store, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.reads, 900);
    assert_eq!(report.windows, 9);
    assert_eq!(report.anomalies, 0);
}

#[tokio::test]
async fn reader_ahead_of_writer_rewinds() {
    let store = InMemoryStore::new();
    let reader = ReaderOptions {
        window_size: 10,
        max_reads: Some(30),
        ..Default::default()
    };

    let report = Reader::new(reader)
        .run(&store, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.anomalies, 30);
    assert_eq!(report.windows, 3);
}

#[tokio::test]
async fn concurrent_run_stops_on_cancel() {
    let store = InMemoryStore::new();
    let cancel = CancellationToken::new();
    let stats = tempfile::tempdir().unwrap();
    let reader_stats = stats.path().join("reader.csv");

    let writer = Writer::new(WriterOptions {
        iterations: 1_000_000,
        keys: 100,
        pacing: Pacing::FixedDelay(Duration::from_millis(1)),
        ..Default::default()
    });
    let reader = Reader::new(ReaderOptions {
        window_size: 50,
        ..Default::default()
    })
    .with_reporter(MetricsReporter::append_to(&reader_stats).unwrap());

    let writer = tokio::spawn({
        let (store, cancel) = (store.clone(), cancel.clone());
        async move { writer.run(&store, cancel).await }
    });
    let reader = tokio::spawn({
        let (store, cancel) = (store.clone(), cancel.clone());
        async move { reader.run(&store, cancel).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();

    let writer = writer.await.unwrap().unwrap();
    let reader = reader.await.unwrap().unwrap();
    assert!(writer.cancelled);
    assert!(reader.cancelled);
    assert!(writer.iterations > 0);
    assert!(reader.reads > 0);

    let lines = std::fs::read_to_string(&reader_stats).unwrap();
    assert_eq!(lines.lines().count() as u64, reader.windows);
}

#[tokio::test]
async fn paced_writer_on_manual_clock() {
    let clock = Arc::new(ManualClock::new());
    let options = WriterOptions {
        iterations: 10,
        keys: 100,
        pacing: Pacing::TargetRate(10_000),
        ..Default::default()
    };

    let report = Writer::new(options)
        .with_clock(clock.clone())
        .run(&InMemoryStore::new(), CancellationToken::new())
        .await
        .unwrap();

    // 1000 keys at 10k keys/s take 100ms, minus the final sleep that is skipped.
    assert_eq!(report.elapsed, Duration::from_millis(90));
    assert_eq!(clock.sleeps().len(), 9);
}
