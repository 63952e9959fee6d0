//! Ingestion pipeline
//!
//! Consumes inbound messages from the transport channel and moves each one
//! into the durable sink. Arrival is always counted before the persist
//! attempt; the persisted counter moves only on success. A failed persist is
//! logged and the message dropped - no retry, no buffering, and no
//! backpressure toward the transport.

use crate::error::sanitize_for_log;
use crate::observability::metrics::CounterRegistry;
use crate::store::MessageSink;
use crate::transport::InboundMessage;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Wires the transport channel to the durable sink and the counters.
pub struct IngestionPipeline {
    sink: Arc<dyn MessageSink>,
    counters: Arc<CounterRegistry>,
}

impl IngestionPipeline {
    pub fn new(sink: Arc<dyn MessageSink>, counters: Arc<CounterRegistry>) -> Self {
        Self { sink, counters }
    }

    /// Drain the channel until the transport side closes it.
    pub async fn run(&self, mut receiver: mpsc::Receiver<InboundMessage>) {
        while let Some(message) = receiver.recv().await {
            self.ingest(message).await;
        }
        debug!("Inbound channel closed, ingestion pipeline stopping");
    }

    /// Process one message: count arrival, then attempt persistence.
    async fn ingest(&self, message: InboundMessage) {
        // Arrival counts regardless of the downstream outcome.
        self.counters.message_received();

        let payload = String::from_utf8_lossy(&message.payload);
        debug!(topic = %message.topic, "Received message: {}", payload);

        match self.sink.persist(&payload).await {
            Ok(id) => {
                self.counters.record_persisted();
                debug!(id = id, "Message persisted");
            }
            Err(e) => {
                // The message is dropped; the counter divergence is the
                // observable signal.
                warn!(
                    topic = %message.topic,
                    "Failed to persist message: {}",
                    sanitize_for_log(&e.to_string())
                );
            }
        }
    }
}
