//! Tests for the delivery loop: every delivery is consumed, failures are
//! counted but never stop the loop.

use std::sync::Arc;
use std::time::Duration;

use avail_adapters::MemoryPublisher;
use avail_creator::subscribe::{run_deliveries, DeliverySummary};
use avail_creator::MetricTransformer;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn status_payload(tenant: &str, code: f64) -> Vec<u8> {
    format!(
        r#"{{"metricData":{{"tenantId":"{tenant}","data":[{{"source":"web.status.code","value":{code},"timestamp":1.0}}]}}}}"#
    )
    .into_bytes()
}

async fn run_with(
    publisher: &MemoryPublisher,
    payloads: Vec<Vec<u8>>,
    concurrency: usize,
) -> DeliverySummary {
    let (tx, rx) = mpsc::channel(16);
    let transformer = Arc::new(MetricTransformer::new(Arc::new(publisher.clone())));

    let handle = tokio::spawn(run_deliveries(
        rx,
        transformer,
        concurrency,
        CancellationToken::new(),
    ));

    for payload in payloads {
        tx.send(payload).await.unwrap();
    }
    drop(tx);

    handle.await.unwrap()
}

#[tokio::test]
async fn test_mixed_deliveries_are_all_consumed() {
    let publisher = MemoryPublisher::new("avail");

    let summary = run_with(
        &publisher,
        vec![
            status_payload("t1", 200.0),
            b"garbage".to_vec(),
            vec![0xff, 0xfe],
            status_payload("t2", 503.0),
        ],
        1,
    )
    .await;

    assert_eq!(
        summary,
        DeliverySummary {
            received: 4,
            published: 2,
            skipped_empty: 0,
            no_destination: 0,
            failed: 2,
        }
    );
    assert_eq!(publisher.sent().len(), 2);
}

#[tokio::test]
async fn test_missing_destination_is_counted_not_failed() {
    let publisher = MemoryPublisher::unconfigured();

    let summary = run_with(
        &publisher,
        vec![status_payload("t1", 200.0), status_payload("t1", 404.0)],
        2,
    )
    .await;

    assert_eq!(summary.received, 2);
    assert_eq!(summary.no_destination, 2);
    assert_eq!(summary.failed, 0);
    assert!(publisher.sent().is_empty());
}

#[tokio::test]
async fn test_send_failures_do_not_stop_the_loop() {
    let publisher = MemoryPublisher::new("avail");
    publisher.fail_sends(true);

    let payloads = (0..10).map(|i| status_payload("t1", i as f64)).collect();
    let summary = run_with(&publisher, payloads, 4).await;

    assert_eq!(summary.received, 10);
    assert_eq!(summary.failed, 10);
    assert_eq!(publisher.open_contexts(), 0);
    assert_eq!(publisher.releases(), 10);
}

#[tokio::test]
async fn test_concurrent_loop_publishes_everything() {
    let publisher = MemoryPublisher::new("avail");

    let payloads = (0..50)
        .map(|i| status_payload(&format!("tenant-{i}"), 200.0))
        .collect();
    let summary = run_with(&publisher, payloads, 8).await;

    assert_eq!(summary.received, 50);
    assert_eq!(summary.published, 50);
    assert_eq!(publisher.sent().len(), 50);
}

#[tokio::test]
async fn test_shutdown_stops_an_idle_loop() {
    let publisher = MemoryPublisher::new("avail");
    let (tx, rx) = mpsc::channel::<Vec<u8>>(4);
    let shutdown = CancellationToken::new();
    let transformer = Arc::new(MetricTransformer::new(Arc::new(publisher.clone())));

    let handle = tokio::spawn(run_deliveries(rx, transformer, 1, shutdown.clone()));

    tx.send(status_payload("t1", 200.0)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.cancel();

    let summary = tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(summary.received, 1);
    assert_eq!(summary.published, 1);
    drop(tx);
}

#[tokio::test]
async fn test_shutdown_processes_buffered_deliveries() {
    let publisher = MemoryPublisher::new("avail");
    let (tx, rx) = mpsc::channel(16);
    let shutdown = CancellationToken::new();
    let transformer = Arc::new(MetricTransformer::new(Arc::new(publisher.clone())));

    for i in 0..10 {
        tx.send(status_payload(&format!("tenant-{i}"), 200.0))
            .await
            .unwrap();
    }
    shutdown.cancel();

    let summary = tokio::time::timeout(
        Duration::from_secs(1),
        run_deliveries(rx, transformer, 3, shutdown),
    )
    .await
    .unwrap();

    assert_eq!(summary.received, 10);
    assert_eq!(summary.published, 10);
    assert_eq!(publisher.sent().len(), 10);

    // Nothing is accepted once the loop has returned
    assert!(tx.send(status_payload("late", 200.0)).await.is_err());
}
