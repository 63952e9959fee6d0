//! iotbridge - Main Entry Point
//!
//! Wires the resolver, store manager, transport supervisor, ingestion
//! pipeline and operational HTTP surface together. Store initialization and
//! transport supervision proceed concurrently; neither blocks the other or
//! the HTTP surface.

use clap::{Parser, Subcommand};
use iotbridge::config::{BridgeSettings, HttpSettings, StoreSettings, TransportSettings};
use iotbridge::credentials::aws::{AmbientIdentityProvider, SecretsManagerSource};
use iotbridge::credentials::{resolve_store, resolve_transport};
use iotbridge::error::{sanitize_for_log, BridgeError, BridgeResult};
use iotbridge::observability::{init_default_logging, CounterRegistry, HealthServer};
use iotbridge::pipeline::IngestionPipeline;
use iotbridge::store::{MessageSink, MessageStore};
use iotbridge::transport::{build_subscriber, InboundMessage};
use std::process;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Capacity of the transport-to-pipeline handoff channel.
const INBOUND_CHANNEL_CAPACITY: usize = 256;

/// MQTT to PostgreSQL ingestion bridge
#[derive(Parser)]
#[command(name = "iotbridge")]
#[command(about = "MQTT to PostgreSQL ingestion bridge")]
#[command(version)]
struct Cli {
    /// MQTT broker host: a bare hostname or a managed IoT endpoint
    #[arg(long, env = "MQTT_HOST", default_value = "mqtt")]
    mqtt_host: String,

    /// Store host, optionally with a :port suffix
    #[arg(long, env = "DB_HOST", default_value = "db")]
    db_host: String,

    /// Store user
    #[arg(long, env = "DB_USER", default_value = "iotuser")]
    db_user: String,

    /// Store database name
    #[arg(long, env = "DB_NAME", default_value = "iotdb")]
    db_name: String,

    /// Store password; superseded by the secret store when a secret ARN is set
    #[arg(long, env = "DB_PASSWORD", hide_env_values = true)]
    db_password: Option<String>,

    /// Secret-store reference for the store password
    #[arg(long, env = "DB_SECRET_ARN")]
    db_secret_arn: Option<String>,

    /// AWS region for managed endpoints and the secret store
    #[arg(long, env = "AWS_REGION", default_value = "eu-west-1")]
    region: String,

    /// Operational HTTP port
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge (default)
    Run,
    /// Validate configuration
    Config {
        /// Show the resolved settings
        #[arg(long)]
        show: bool,
    },
}

impl Cli {
    fn settings(&self) -> BridgeSettings {
        BridgeSettings {
            transport: TransportSettings {
                host: self.mqtt_host.clone(),
                region: self.region.clone(),
            },
            store: StoreSettings {
                host: self.db_host.clone(),
                user: self.db_user.clone(),
                database: self.db_name.clone(),
                password: self.db_password.clone(),
                secret_arn: self.db_secret_arn.clone(),
                region: self.region.clone(),
            },
            http: HttpSettings { port: self.port },
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!("Starting iotbridge v{}", env!("CARGO_PKG_VERSION"));

    let settings = cli.settings();
    if let Err(e) = settings.validate() {
        error!("Invalid configuration: {}", e);
        process::exit(1);
    }

    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_bridge(settings).await,
        Commands::Config { show } => handle_config_command(settings, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Application shutdown complete");
}

async fn run_bridge(settings: BridgeSettings) -> BridgeResult<()> {
    let counters = Arc::new(CounterRegistry::new());
    let store = Arc::new(MessageStore::new());

    // Operational surface comes up first: /health answers while the
    // connections are still being established.
    let health_server = Arc::new(HealthServer::new(settings.http.port, counters.clone()));
    {
        let server = health_server.clone();
        tokio::spawn(async move {
            if let Err(e) = server.start().await {
                error!("Operational HTTP server error: {}", e);
            }
        });
    }

    // Store resolution and initialization, concurrent with the transport.
    let store_task = {
        let store = store.clone();
        let store_settings = settings.store.clone();
        let health = health_server.clone();
        tokio::spawn(async move {
            let secrets = SecretsManagerSource::new(store_settings.region.clone());
            let config = resolve_store(&store_settings, &secrets).await;
            match store.initialize(&config).await {
                Ok(()) => health.set_store_ready(true),
                Err(e) => error!(
                    "Store initialization failed: {}",
                    sanitize_for_log(&e.to_string())
                ),
            }
        })
    };

    // Transport resolution and supervision. The supervisor always hands back
    // a usable handle, degraded or not.
    let (sender, receiver) = mpsc::channel::<InboundMessage>(INBOUND_CHANNEL_CAPACITY);
    let identity = AmbientIdentityProvider::new(settings.transport.region.clone());
    let transport_config = resolve_transport(&settings.transport, &identity).await;
    let mut subscriber = build_subscriber(transport_config, sender);

    if let Err(e) = subscriber.subscribe().await {
        // The process continues without messages; only the probes show it.
        error!("Subscription request failed: {}", e);
    }

    // Mirror the link state into the readiness probe.
    if let Some(mut state_rx) = subscriber.state_watch() {
        let health = health_server.clone();
        tokio::spawn(async move {
            loop {
                health.set_mqtt_connected(state_rx.borrow().is_live());
                if state_rx.changed().await.is_err() {
                    break;
                }
            }
        });
    }

    let sink: Arc<dyn MessageSink> = store.clone();
    let pipeline = IngestionPipeline::new(sink, counters.clone());

    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .map_err(|e| BridgeError::internal(format!("failed to install SIGINT handler: {e}")))?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .map_err(|e| BridgeError::internal(format!("failed to install SIGTERM handler: {e}")))?;

    info!("Bridge is running and waiting for messages...");

    tokio::select! {
        _ = pipeline.run(receiver) => {
            warn!("Ingestion pipeline stopped: inbound channel closed");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down gracefully...");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }

    subscriber.shutdown().await;
    if !store_task.is_finished() {
        store_task.abort();
    }

    Ok(())
}

fn handle_config_command(settings: BridgeSettings, show: bool) -> BridgeResult<()> {
    if show {
        println!("Current bridge configuration:");
        println!("{settings:#?}");
    }

    info!("Configuration validation complete");
    Ok(())
}
