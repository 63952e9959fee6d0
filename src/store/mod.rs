//! Durable store layer
//!
//! The `MessageSink` trait is the seam between the ingestion pipeline and the
//! concrete store so the pipeline can be tested with in-memory fakes. The
//! production implementation is the Postgres-backed [`MessageStore`].

use async_trait::async_trait;
use thiserror::Error;

pub mod postgres;

pub use postgres::{MessageStore, StoreConfig, StoreSecurity};

/// Store operation errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// The pool has not been initialized yet. Persist attempts racing ahead
    /// of store readiness get this as an ordinary error, not a crash.
    #[error("Store not ready - pool not initialized")]
    NotReady,
    #[error("Connection failed")]
    ConnectionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Schema bootstrap failed")]
    BootstrapFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Insert failed")]
    InsertFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Durable sink for received message payloads.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Persist one payload, returning the server-assigned identity.
    ///
    /// A single attempt: errors are reported to the caller, never retried
    /// internally, and never fatal to the process.
    async fn persist(&self, payload: &str) -> Result<i64, StoreError>;
}
