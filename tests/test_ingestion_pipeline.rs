//! End-to-end tests of the ingestion pipeline counter semantics
//!
//! Drives the pipeline through its public API with fake sinks: arrival is
//! always counted, persistence only on success, and a store that is not
//! ready degrades to a per-message failure rather than a fault.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use iotbridge::observability::CounterRegistry;
use iotbridge::pipeline::IngestionPipeline;
use iotbridge::store::{MessageSink, MessageStore, StoreError};
use iotbridge::testing::mocks::{FailingSink, RecordingSink};
use iotbridge::transport::InboundMessage;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

fn message(payload: &str) -> InboundMessage {
    InboundMessage {
        topic: "iot/data".to_string(),
        payload: Bytes::from(payload.as_bytes().to_vec()),
        received_at: Utc::now(),
    }
}

/// Sink that fails every other persist, for mixed-outcome runs.
struct FlakySink {
    calls: AtomicU64,
}

impl FlakySink {
    fn new() -> Self {
        Self {
            calls: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl MessageSink for FlakySink {
    async fn persist(&self, _payload: &str) -> Result<i64, StoreError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call % 2 == 0 {
            Ok(call as i64 + 1)
        } else {
            Err(StoreError::InsertFailed("flaky".to_string().into()))
        }
    }
}

#[tokio::test]
async fn test_message_on_ready_store_is_counted_and_persisted() {
    // Scenario: local broker delivers "temp=21.5" on iot/data with the store
    // ready - one row, both counters at 1.
    let sink = Arc::new(RecordingSink::new());
    let counters = Arc::new(CounterRegistry::new());
    let pipeline = IngestionPipeline::new(sink.clone(), counters.clone());

    let (sender, receiver) = mpsc::channel(8);
    sender.send(message("temp=21.5")).await.unwrap();
    drop(sender);

    pipeline.run(receiver).await;

    let snapshot = counters.snapshot();
    assert_eq!(snapshot.messages_received, 1);
    assert_eq!(snapshot.records_persisted, 1);
    assert_eq!(sink.payloads(), vec!["temp=21.5".to_string()]);
}

#[tokio::test]
async fn test_message_before_store_ready_counts_arrival_only() {
    // Scenario: "temp=22.0" arrives while the pool is uninitialized - the
    // arrival counts, nothing is persisted, the process does not fault.
    let store = Arc::new(MessageStore::new());
    let counters = Arc::new(CounterRegistry::new());
    let sink: Arc<dyn MessageSink> = store;
    let pipeline = IngestionPipeline::new(sink, counters.clone());

    let (sender, receiver) = mpsc::channel(8);
    sender.send(message("temp=22.0")).await.unwrap();
    drop(sender);

    pipeline.run(receiver).await;

    let snapshot = counters.snapshot();
    assert_eq!(snapshot.messages_received, 1);
    assert_eq!(snapshot.records_persisted, 0);
}

#[tokio::test]
async fn test_store_reports_not_ready_before_initialization() {
    let store = MessageStore::new();

    assert!(!store.is_ready().await);
    let result = store.persist("temp=22.0").await;
    assert!(matches!(result, Err(StoreError::NotReady)));
}

#[tokio::test]
async fn test_mixed_outcomes_diverge_counters() {
    let counters = Arc::new(CounterRegistry::new());
    let pipeline = IngestionPipeline::new(Arc::new(FlakySink::new()), counters.clone());

    let (sender, receiver) = mpsc::channel(8);
    for i in 0..6 {
        sender.send(message(&format!("reading-{i}"))).await.unwrap();
    }
    drop(sender);

    pipeline.run(receiver).await;

    let snapshot = counters.snapshot();
    assert_eq!(snapshot.messages_received, 6);
    assert_eq!(snapshot.records_persisted, 3);
}

#[tokio::test]
async fn test_persist_failures_never_stop_the_pipeline() {
    let counters = Arc::new(CounterRegistry::new());
    let pipeline = IngestionPipeline::new(Arc::new(FailingSink::insert_error()), counters.clone());

    let (sender, receiver) = mpsc::channel(16);
    for i in 0..10 {
        sender.send(message(&format!("reading-{i}"))).await.unwrap();
    }
    drop(sender);

    pipeline.run(receiver).await;

    let snapshot = counters.snapshot();
    assert_eq!(snapshot.messages_received, 10);
    assert_eq!(snapshot.records_persisted, 0);
}

#[tokio::test]
async fn test_counters_render_divergence_in_exposition() {
    let counters = Arc::new(CounterRegistry::new());
    let pipeline = IngestionPipeline::new(Arc::new(FailingSink::not_ready()), counters.clone());

    let (sender, receiver) = mpsc::channel(8);
    sender.send(message("temp=22.0")).await.unwrap();
    drop(sender);

    pipeline.run(receiver).await;

    let exposition = counters.render_prometheus();
    assert!(exposition.contains("mqtt_messages_total 1"));
    assert!(exposition.contains("db_inserts_total 0"));
}
