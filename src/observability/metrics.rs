//! Process-wide ingestion counters
//!
//! Two monotonic counters track the delivery pipeline: messages received from
//! the transport and rows persisted to the store. The registry is injected as
//! an `Arc` wherever counting happens so tests can substitute their own
//! instance; there is no hidden global.
//!
//! Counters never decrement and never reset within a process lifetime. A
//! divergence between the two is the observable signal of persistence
//! failures.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe registry of the bridge's ingestion counters.
#[derive(Debug, Default)]
pub struct CounterRegistry {
    messages_received: AtomicU64,
    records_persisted: AtomicU64,
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub messages_received: u64,
    pub records_persisted: u64,
}

impl CounterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one message handed off by the transport. Incremented before any
    /// persist attempt, regardless of its outcome.
    pub fn message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one successfully persisted record.
    pub fn record_persisted(&self) {
        self.records_persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            records_persisted: self.records_persisted.load(Ordering::Relaxed),
        }
    }

    /// Render the counters in the Prometheus text exposition format.
    pub fn render_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = String::new();
        out.push_str("# HELP mqtt_messages_total Total number of MQTT messages received\n");
        out.push_str("# TYPE mqtt_messages_total counter\n");
        out.push_str(&format!(
            "mqtt_messages_total {}\n",
            snapshot.messages_received
        ));
        out.push_str("# HELP db_inserts_total Total number of DB inserts\n");
        out.push_str("# TYPE db_inserts_total counter\n");
        out.push_str(&format!(
            "db_inserts_total {}\n",
            snapshot.records_persisted
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_counters_start_at_zero() {
        let registry = CounterRegistry::new();
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.messages_received, 0);
        assert_eq!(snapshot.records_persisted, 0);
    }

    #[test]
    fn test_counters_increment_independently() {
        let registry = CounterRegistry::new();

        registry.message_received();
        registry.message_received();
        registry.record_persisted();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.messages_received, 2);
        assert_eq!(snapshot.records_persisted, 1);
    }

    #[test]
    fn test_prometheus_rendering() {
        let registry = CounterRegistry::new();
        registry.message_received();
        registry.record_persisted();

        let text = registry.render_prometheus();

        assert!(text.contains("# TYPE mqtt_messages_total counter"));
        assert!(text.contains("mqtt_messages_total 1"));
        assert!(text.contains("# TYPE db_inserts_total counter"));
        assert!(text.contains("db_inserts_total 1"));
        // HELP lines precede their sample lines
        let help_idx = text.find("# HELP mqtt_messages_total").unwrap();
        let sample_idx = text.find("mqtt_messages_total 1").unwrap();
        assert!(help_idx < sample_idx);
    }

    #[test]
    fn test_thread_safety() {
        let registry = Arc::new(CounterRegistry::new());

        let mut handles = vec![];

        for _ in 0..10 {
            let registry_clone = Arc::clone(&registry);
            let handle = thread::spawn(move || {
                for _ in 0..100 {
                    registry_clone.message_received();
                    registry_clone.record_persisted();
                }
            });
            handles.push(handle);
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.messages_received, 1000);
        assert_eq!(snapshot.records_persisted, 1000);
    }
}
