//! Observability system: structured logging, ingestion counters, and the
//! operational HTTP surface.

pub mod health;
pub mod logging;
pub mod metrics;

// Re-export for convenience
pub use health::HealthServer;
pub use logging::{init_default_logging, init_logging, LogFormat};
pub use metrics::{CounterRegistry, CounterSnapshot};
