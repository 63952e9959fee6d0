//! Operational HTTP surface for monitoring and orchestration
//!
//! Serves the health check and the Prometheus scrape endpoint, plus
//! readiness/liveness probes for container platforms. `/health` reports 200
//! for as long as the process is alive; actual ingestion health is visible
//! through `/ready` and through divergence of the two counters on
//! `/metrics`.

use crate::observability::metrics::CounterRegistry;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use warp::Filter;

/// HTTP server exposing health, readiness and metrics endpoints.
pub struct HealthServer {
    port: u16,
    counters: Arc<CounterRegistry>,
    mqtt_connected: Arc<AtomicBool>,
    store_ready: Arc<AtomicBool>,
}

impl HealthServer {
    pub fn new(port: u16, counters: Arc<CounterRegistry>) -> Self {
        Self {
            port,
            counters,
            mqtt_connected: Arc::new(AtomicBool::new(false)),
            store_ready: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Update transport connection status
    pub fn set_mqtt_connected(&self, connected: bool) {
        self.mqtt_connected.store(connected, Ordering::Relaxed);
    }

    /// Update store readiness status
    pub fn set_store_ready(&self, ready: bool) {
        self.store_ready.store(ready, Ordering::Relaxed);
    }

    fn is_ready(&self) -> bool {
        self.mqtt_connected.load(Ordering::Relaxed) && self.store_ready.load(Ordering::Relaxed)
    }

    /// Start the HTTP server. Runs until the process exits.
    pub async fn start(self: Arc<Self>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let metrics_server = self.clone();
        let ready_server = self.clone();

        // GET /health - process liveness, always 200 while alive
        let health_route = warp::path("health").and(warp::get()).and_then(|| async {
            let response = HealthResponse {
                status: "healthy".to_string(),
                timestamp: Utc::now().to_rfc3339(),
            };
            Ok::<_, Infallible>(warp::reply::json(&response))
        });

        // GET /metrics - Prometheus text exposition of the ingestion counters
        let metrics_route = warp::path("metrics").and(warp::get()).and_then(move || {
            let server = metrics_server.clone();
            async move {
                let body = server.counters.render_prometheus();
                Ok::<_, Infallible>(warp::reply::with_header(
                    body,
                    "content-type",
                    "text/plain; version=0.0.4; charset=utf-8",
                ))
            }
        });

        // GET /ready - readiness probe: transport subscribed and store pool up
        let ready_route = warp::path("ready").and(warp::get()).and_then(move || {
            let server = ready_server.clone();
            async move {
                let ready = server.is_ready();
                let response = ReadinessResponse {
                    ready,
                    timestamp: Utc::now().to_rfc3339(),
                };
                let status_code = if ready { 200 } else { 503 };
                Ok::<_, Infallible>(warp::reply::with_status(
                    warp::reply::json(&response),
                    warp::http::StatusCode::from_u16(status_code).unwrap(),
                ))
            }
        });

        // GET /live - liveness probe
        let live_route = warp::path("live").and(warp::get()).and_then(|| async {
            let response = LivenessResponse {
                alive: true,
                timestamp: Utc::now().to_rfc3339(),
            };
            Ok::<_, Infallible>(warp::reply::json(&response))
        });

        // GET / - endpoint listing
        let root_route = warp::path::end().and(warp::get()).and_then(|| async {
            let mut endpoints = HashMap::new();
            endpoints.insert("/health".to_string(), "Process health status".to_string());
            endpoints.insert(
                "/metrics".to_string(),
                "Prometheus text exposition of ingestion counters".to_string(),
            );
            endpoints.insert("/ready".to_string(), "Readiness probe".to_string());
            endpoints.insert("/live".to_string(), "Liveness probe".to_string());
            Ok::<_, Infallible>(warp::reply::json(&endpoints))
        });

        let routes = health_route
            .or(metrics_route)
            .or(ready_route)
            .or(live_route)
            .or(root_route)
            .with(warp::cors().allow_any_origin());

        tracing::info!("Starting operational HTTP server on port {}", self.port);

        warp::serve(routes).run(([0, 0, 0, 0], self.port)).await;

        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct ReadinessResponse {
    ready: bool,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct LivenessResponse {
    alive: bool,
    timestamp: String,
}
