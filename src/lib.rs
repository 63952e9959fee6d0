//! iotbridge - MQTT to PostgreSQL ingestion bridge
//!
//! Subscribes to a publish/subscribe transport, persists every received
//! message durably, and exposes health and counters to an external
//! monitoring system.
//!
//! # Overview
//!
//! - Credential/config resolution for two transport backends: a plain local
//!   broker, and a managed endpoint reachable only over an authenticated
//!   websocket
//! - A supervised subscription that re-establishes itself on disconnect, or
//!   degrades to a safe no-op stub when credentials cannot be resolved
//! - A Postgres-backed sink with idempotent schema bootstrap and a typed
//!   not-ready signal for persists that race ahead of pool initialization
//! - Ingestion counters exposed in the Prometheus text exposition format
//!
//! # Quick Start
//!
//! ```rust
//! use iotbridge::observability::CounterRegistry;
//! use std::sync::Arc;
//!
//! // The counter registry is injected wherever counting happens.
//! let counters = Arc::new(CounterRegistry::new());
//! counters.message_received();
//!
//! let exposition = counters.render_prometheus();
//! assert!(exposition.contains("mqtt_messages_total 1"));
//! assert!(exposition.contains("db_inserts_total 0"));
//! ```

pub mod config;
pub mod credentials;
pub mod error;
pub mod observability;
pub mod pipeline;
pub mod store;
pub mod testing;
pub mod transport;

pub use config::{BridgeSettings, HttpSettings, StoreSettings, TransportSettings};
pub use error::{BridgeError, BridgeResult};
pub use pipeline::IngestionPipeline;
pub use store::{MessageSink, MessageStore, StoreError};
pub use transport::{
    build_subscriber, InboundMessage, SubscriberHandle, TransportConfig, TransportError,
};
