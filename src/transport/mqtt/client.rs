//! Impure I/O for the MQTT subscriber
//!
//! Owns the rumqttc client and its event loop, runs the supervisor task that
//! keeps the subscription alive across disconnects, and hands every received
//! message off to the ingestion pipeline over an mpsc channel.

use super::connection::{configure_mqtt_options, LinkState, ReconnectConfig};
use crate::transport::{InboundMessage, SubscriberHandle, TransportConfig, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use rumqttc::v5::mqttbytes::v5::Packet;
use rumqttc::v5::{mqttbytes::QoS, AsyncClient, Event, EventLoop};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Live MQTT subscription with a reconnection supervisor.
pub struct MqttSubscriber {
    config: TransportConfig,
    client: Arc<Mutex<AsyncClient>>,
    state_rx: watch::Receiver<LinkState>,
    shutdown_tx: watch::Sender<bool>,
    supervisor_handle: Option<JoinHandle<()>>,
}

impl MqttSubscriber {
    /// Build the client and spawn the supervisor task.
    ///
    /// Construction does not wait for the broker: the link comes up (or keeps
    /// retrying) in the background while the rest of the process starts.
    pub fn start(
        config: TransportConfig,
        sender: mpsc::Sender<InboundMessage>,
    ) -> Result<Self, TransportError> {
        let options = configure_mqtt_options(&config)?;
        let (client, event_loop) = AsyncClient::new(options, 10);
        let client = Arc::new(Mutex::new(client));

        let (state_tx, state_rx) = watch::channel(LinkState::Connecting);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(Self::supervise(
            config.clone(),
            client.clone(),
            event_loop,
            sender,
            state_tx,
            shutdown_rx,
        ));

        Ok(Self {
            config,
            client,
            state_rx,
            shutdown_tx,
            supervisor_handle: Some(handle),
        })
    }

    /// Event-loop supervisor: polls the connection, re-subscribes on every
    /// handshake, forwards messages, and re-establishes the link with backoff
    /// after disconnects. Runs until the shutdown signal.
    async fn supervise(
        config: TransportConfig,
        shared_client: Arc<Mutex<AsyncClient>>,
        mut event_loop: EventLoop,
        sender: mpsc::Sender<InboundMessage>,
        state_tx: watch::Sender<LinkState>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let reconnect = ReconnectConfig::default();
        let mut reconnect_attempts = 0u32;

        info!("Starting MQTT supervisor for {}", config.host);

        loop {
            tokio::select! {
                // Check for shutdown signal first (higher priority)
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping MQTT supervisor");
                        break;
                    }
                }

                event = event_loop.poll() => {
                    match event {
                        Ok(Event::Incoming(Packet::ConnAck(_))) => {
                            info!("Connected to MQTT broker");
                            reconnect_attempts = 0;
                            Self::subscribe_on_connect(&config, &shared_client, &state_tx).await;
                        }
                        Ok(Event::Incoming(Packet::Publish(publish))) => {
                            let _ = state_tx.send(LinkState::Receiving);
                            let message = InboundMessage {
                                topic: String::from_utf8_lossy(&publish.topic).to_string(),
                                payload: Bytes::from(publish.payload.to_vec()),
                                received_at: Utc::now(),
                            };
                            // A rejected handoff is a per-message failure,
                            // not a supervisor fault.
                            if let Err(e) = sender.send(message).await {
                                error!("Failed to hand message off to pipeline: {}", e);
                            }
                        }
                        Ok(Event::Incoming(Packet::SubAck(suback))) => {
                            debug!("Subscription confirmed: {:?}", suback.return_codes);
                        }
                        Ok(Event::Incoming(Packet::Disconnect(_))) => {
                            warn!("Broker disconnected the link");
                            let _ = state_tx.send(LinkState::Disconnected(
                                "broker disconnect".to_string(),
                            ));
                            if !Self::reestablish(
                                &config,
                                &shared_client,
                                &mut event_loop,
                                &mut reconnect_attempts,
                                &reconnect,
                                shutdown_rx.clone(),
                                &state_tx,
                            )
                            .await
                            {
                                break;
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            error!("MQTT event loop error: {}", e);
                            let _ = state_tx.send(LinkState::Disconnected(e.to_string()));
                            if !Self::reestablish(
                                &config,
                                &shared_client,
                                &mut event_loop,
                                &mut reconnect_attempts,
                                &reconnect,
                                shutdown_rx.clone(),
                                &state_tx,
                            )
                            .await
                            {
                                break;
                            }
                        }
                    }
                }
            }
        }

        info!("MQTT supervisor stopped for {}", config.host);
    }

    /// Issue the single fixed topic subscription and log the outcome. Runs on
    /// every ConnAck so reconnects re-subscribe automatically.
    async fn subscribe_on_connect(
        config: &TransportConfig,
        client: &Arc<Mutex<AsyncClient>>,
        state_tx: &watch::Sender<LinkState>,
    ) {
        let client_guard = client.lock().await;
        match client_guard.subscribe(&config.topic, QoS::AtLeastOnce).await {
            Ok(()) => {
                info!("Subscribed to topic {}", config.topic);
                let _ = state_tx.send(LinkState::Subscribed);
            }
            Err(e) => {
                // The process continues without messages; readiness stays
                // false because the link never reaches Subscribed.
                error!("Subscription to {} failed: {}", config.topic, e);
            }
        }
    }

    /// Backoff, rebuild client and event loop, and continue polling.
    /// Returns false when a shutdown request or attempt limit ends the
    /// supervisor.
    #[allow(clippy::too_many_arguments)]
    async fn reestablish(
        config: &TransportConfig,
        shared_client: &Arc<Mutex<AsyncClient>>,
        event_loop: &mut EventLoop,
        attempts: &mut u32,
        reconnect: &ReconnectConfig,
        shutdown_rx: watch::Receiver<bool>,
        state_tx: &watch::Sender<LinkState>,
    ) -> bool {
        if *shutdown_rx.borrow() {
            return false;
        }

        if let Some(max_attempts) = reconnect.max_attempts {
            if *attempts >= max_attempts {
                error!("Max reconnection attempts ({}) exceeded", max_attempts);
                return false;
            }
        }

        *attempts += 1;
        let delay_ms = reconnect.calculate_backoff_delay(*attempts);
        let _ = state_tx.send(LinkState::Reconnecting(*attempts));
        info!("Attempting reconnection {} after {}ms delay", attempts, delay_ms);

        if !Self::interruptible_sleep(shutdown_rx, delay_ms).await {
            return false;
        }

        match configure_mqtt_options(config) {
            Ok(options) => {
                let (new_client, new_event_loop) = AsyncClient::new(options, 10);
                *event_loop = new_event_loop;
                *shared_client.lock().await = new_client;
                let _ = state_tx.send(LinkState::Connecting);
                true
            }
            Err(e) => {
                error!("Failed to rebuild connection: {}", e);
                true // Continue the loop to try again
            }
        }
    }

    /// Sleep that a shutdown request can cut short. Returns true if the sleep
    /// completed, false if shutdown was requested.
    async fn interruptible_sleep(mut shutdown_rx: watch::Receiver<bool>, delay_ms: u64) -> bool {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!("Shutdown signal received during reconnection delay");
                    return false;
                }
                true
            }
            _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => {
                true
            }
        }
    }
}

#[async_trait]
impl SubscriberHandle for MqttSubscriber {
    async fn subscribe(&self) -> Result<(), TransportError> {
        // The supervisor subscribes on every handshake; this explicit call
        // covers a link that connected before the caller was wired up.
        let client = self.client.lock().await;
        client
            .subscribe(&self.config.topic, QoS::AtLeastOnce)
            .await
            .map_err(|e| TransportError::SubscriptionFailed(Box::new(e)))
    }

    fn state_watch(&self) -> Option<watch::Receiver<LinkState>> {
        Some(self.state_rx.clone())
    }

    async fn shutdown(&mut self) {
        let _ = self.shutdown_tx.send(true);

        {
            let client = self.client.lock().await;
            let _ = client.disconnect().await;
        }

        if let Some(handle) = self.supervisor_handle.take() {
            match tokio::time::timeout(Duration::from_secs(2), handle).await {
                Ok(_) => info!("MQTT supervisor shut down gracefully"),
                Err(_) => warn!("MQTT supervisor did not stop in time, aborting"),
            }
        }
    }
}

impl Drop for MqttSubscriber {
    fn drop(&mut self) {
        // Signal shutdown to the supervisor if it is still running; graceful
        // disconnect needs shutdown() since Drop cannot await.
        let _ = self.shutdown_tx.send(true);

        if let Some(handle) = self.supervisor_handle.take() {
            handle.abort();
        }
    }
}
