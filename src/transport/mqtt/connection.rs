//! Pure connection state management for the MQTT subscriber
//!
//! Contains the link state machine, reconnection backoff policy, and MQTT
//! option construction for both connection variants.

use crate::transport::{TransportConfig, TransportError, TransportSecurity};
use rumqttc::v5::MqttOptions;
use rumqttc::Transport as RumqttcTransport;
use std::time::Duration;
use uuid::Uuid;

/// State of the subscription link. Owned by the supervisor task; everyone
/// else observes it through a watch channel.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkState {
    /// Attempting to reach the broker.
    Connecting,
    /// Handshake complete and topic subscription issued.
    Subscribed,
    /// At least one message has arrived on the subscription.
    Receiving,
    /// Link lost, with reason.
    Disconnected(String),
    /// Re-establishing the link (attempt count).
    Reconnecting(u32),
}

impl LinkState {
    /// Whether the subscription is currently able to deliver messages.
    pub fn is_live(&self) -> bool {
        matches!(self, LinkState::Subscribed | LinkState::Receiving)
    }
}

/// Reconnection policy
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum number of reconnection attempts (None = unlimited)
    pub max_attempts: Option<u32>,
    /// Backoff pattern in milliseconds
    pub backoff_pattern: Vec<u64>,
    /// Delay to use after the pattern is exhausted
    pub sustained_delay: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: None, // Unlimited retries by default
            backoff_pattern: vec![25, 50, 100, 250],
            sustained_delay: 250,
        }
    }
}

impl ReconnectConfig {
    /// Calculate backoff delay for the given attempt.
    pub fn calculate_backoff_delay(&self, attempt: u32) -> u64 {
        if self.backoff_pattern.is_empty() {
            self.sustained_delay
        } else {
            let index = (attempt.saturating_sub(1)) as usize;
            if index < self.backoff_pattern.len() {
                self.backoff_pattern[index]
            } else {
                // Pattern exhausted, use sustained delay
                self.sustained_delay
            }
        }
    }
}

/// Build MQTT options for the resolved transport config.
///
/// Degraded configs are rejected here; the supervisor never gets as far as
/// constructing a client for them.
pub fn configure_mqtt_options(config: &TransportConfig) -> Result<MqttOptions, TransportError> {
    let client_id = generate_client_id();

    let mut options = match &config.security {
        TransportSecurity::Plain => MqttOptions::new(client_id, &config.host, config.port),
        TransportSecurity::AuthenticatedWebsocket { credentials, .. } => {
            let endpoint = format!("wss://{}/mqtt", config.host);
            let mut options = MqttOptions::new(client_id, endpoint, config.port);
            options.set_transport(RumqttcTransport::wss_with_default_config());
            options.set_credentials(
                credentials.access_key_id.clone(),
                credentials.secret_access_key.clone(),
            );
            options
        }
        TransportSecurity::Degraded { reason } => {
            return Err(TransportError::InvalidEndpoint(format!(
                "degraded transport config: {reason}"
            )));
        }
    };

    options.set_keep_alive(Duration::from_secs(60));
    options.set_max_packet_size(Some(256 * 1024));

    Ok(options)
}

/// Unique client id per connection attempt to prevent broker-side conflicts.
fn generate_client_id() -> String {
    format!("iot-bridge-{}", Uuid::new_v4().simple())
}
