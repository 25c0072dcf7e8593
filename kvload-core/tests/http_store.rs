use std::time::Duration;

use kvload_core::store::{Connector, HttpConnector, Store, StoreError};
use kvload_core::{Reader, ReaderOptions, WorkloadError, Writer, WriterOptions};
use kvload_test::server::TestServer;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn upserts_and_reads_back() {
    kvload_test::tracing::init();
    let server = TestServer::new().await;
    let connector = HttpConnector::new(server.endpoint(), "bench", "kv");

    let mut session = connector.connect().await.unwrap();
    session.write_batch(&[(1, 1), (2, 2)], true).await.unwrap();

    assert_eq!(session.point_read(2).await.unwrap(), 1);
    assert_eq!(session.point_read(3).await.unwrap(), 0);
    assert_eq!(server.get("bench", "kv", 1), Some(1));

    let batches = server.batches();
    assert_eq!(batches.len(), 1);
    assert!(batches[0].atomic);
    assert_eq!(batches[0].keys, [1, 2]);
}

#[tokio::test]
async fn built_batches_are_sent_on_execute() {
    let server = TestServer::new().await;
    let connector = HttpConnector::new(server.endpoint(), "bench", "kv");
    let mut session = connector.connect().await.unwrap();

    let batch = session.build_batch(&[(4, 4), (6, 6)], true).unwrap();
    assert!(server.batches().is_empty());

    session.execute_batch(batch).await.unwrap();
    let batches = server.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].keys, [4, 6]);
    assert_eq!(server.get("bench", "kv", 6), Some(6));
}

#[tokio::test]
async fn namespaces_are_isolated() {
    let server = TestServer::new().await;
    let mut first = HttpConnector::new(server.endpoint(), "bench", "a")
        .connect()
        .await
        .unwrap();
    let mut second = HttpConnector::new(format!("{}/", server.endpoint()), "bench", "b")
        .connect()
        .await
        .unwrap();

    first.write_batch(&[(5, 5)], false).await.unwrap();

    assert_eq!(first.point_read(5).await.unwrap(), 1);
    assert_eq!(second.point_read(5).await.unwrap(), 0);
}

#[tokio::test]
async fn failed_health_check_refuses_connection() {
    let server = TestServer::new().await;
    server.set_unavailable(true);

    let result = HttpConnector::new(server.endpoint(), "bench", "kv")
        .connect()
        .await;

    assert!(matches!(result, Err(StoreError::Connection { .. })));
}

#[tokio::test]
async fn server_errors_end_the_writer() {
    let server = TestServer::new().await;
    let connector = HttpConnector::new(server.endpoint(), "bench", "kv");
    let mut session = connector.connect().await.unwrap();

    server.set_unavailable(true);
    let result = session.write_batch(&[(1, 1)], false).await;
    assert!(matches!(result, Err(StoreError::Write { .. })));

    let result = session.point_read(1).await;
    assert!(matches!(result, Err(StoreError::Read { .. })));
}

#[tokio::test]
async fn workloads_over_http() {
    let server = TestServer::new().await;
    let connector = HttpConnector::new(server.endpoint(), "bench", "kv");

    let writer = WriterOptions {
        seed: 3,
        iterations: 2,
        keys: 40,
        batch_size: 16,
        atomic: true,
        operation_timeout: Some(Duration::from_secs(5)),
        ..Default::default()
    };
    let report = Writer::new(writer)
        .run(&connector, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.keys_written, 80);
    assert_eq!(server.len(), 80);

    let sizes: Vec<_> = server.batches().iter().map(|batch| batch.keys.len()).collect();
    assert_eq!(sizes, [16, 16, 8, 16, 16, 8]);

    let reader = ReaderOptions {
        seed: 3,
        window_size: 10,
        max_reads: Some(60),
        operation_timeout: Some(Duration::from_secs(5)),
        ..Default::default()
    };
    let report = Reader::new(reader)
        .run(&connector, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.anomalies, 0);
    assert_eq!(report.windows, 6);
}

#[tokio::test]
async fn unreachable_endpoint_is_fatal() {
    // Nothing listens on the discard port.
    let connector = HttpConnector::new("http://127.0.0.1:9", "bench", "kv");

    let result = Writer::new(WriterOptions::default())
        .run(&connector, CancellationToken::new())
        .await;

    assert!(matches!(
        result,
        Err(WorkloadError::Store(StoreError::Connection { .. }))
    ));
}
