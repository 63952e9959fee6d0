//! Connection-config resolution
//!
//! Pure classification and parsing helpers plus the two resolve operations.
//! Both operations are infallible: the store resolver exhausts its fallback
//! chain down to the static default password, and the transport resolver
//! degrades to a config the supervisor answers with a stub handle.

use crate::config::{StoreSettings, TransportSettings};
use crate::credentials::{Credential, CredentialOrigin, IdentityProvider, SecretError, SecretSource};
use crate::store::{StoreConfig, StoreSecurity};
use crate::transport::{TransportConfig, TransportSecurity, INGEST_TOPIC};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

/// Static fallback at the end of the store password chain.
pub const DEFAULT_STORE_PASSWORD: &str = "iotpassword";

/// Upper bound on any single external call during resolution.
const EXTERNAL_CALL_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_STORE_PORT: u16 = 5432;
const PLAIN_BROKER_PORT: u16 = 1883;
const WEBSOCKET_BROKER_PORT: u16 = 443;

/// Split an optional `host:port` suffix, defaulting the port.
pub fn split_host_port(host: &str, default_port: u16) -> (String, u16) {
    match host.rsplit_once(':') {
        Some((hostname, port)) => match port.parse::<u16>() {
            Ok(port) => (hostname.to_string(), port),
            Err(_) => (host.to_string(), default_port),
        },
        None => (host.to_string(), default_port),
    }
}

/// Managed-database naming pattern (AWS RDS endpoints).
pub fn is_managed_database(hostname: &str) -> bool {
    hostname.contains(".rds.amazonaws.com")
}

/// Managed-IoT naming pattern (AWS IoT Core endpoints).
pub fn is_managed_iot_endpoint(host: &str) -> bool {
    host.contains(".iot.") && host.contains(".amazonaws.com")
}

/// Resolve the final store connection config. Never fails.
pub async fn resolve_store(settings: &StoreSettings, secrets: &dyn SecretSource) -> StoreConfig {
    let credential = resolve_store_password(settings, secrets).await;
    let (host, port) = split_host_port(&settings.host, DEFAULT_STORE_PORT);

    let security = if is_managed_database(&host) {
        // Managed databases require TLS but present certs we do not pin.
        StoreSecurity::EncryptedUnverified
    } else {
        StoreSecurity::Plain
    };

    info!(
        host = %host,
        port = port,
        security = ?security,
        origin = ?credential.origin,
        "Resolved store connection config"
    );

    StoreConfig {
        host,
        port,
        user: settings.user.clone(),
        database: settings.database.clone(),
        credential,
        security,
    }
}

async fn resolve_store_password(
    settings: &StoreSettings,
    secrets: &dyn SecretSource,
) -> Credential {
    if let Some(secret_arn) = &settings.secret_arn {
        match timeout(EXTERNAL_CALL_TIMEOUT, secrets.fetch(secret_arn)).await {
            Ok(Ok(raw)) => match parse_secret_password(&raw) {
                Ok(password) => {
                    return Credential {
                        value: password,
                        origin: CredentialOrigin::SecretStore,
                    };
                }
                Err(e) => warn!("Secret payload unusable, falling back: {}", e),
            },
            Ok(Err(e)) => warn!("Secret fetch failed, falling back: {}", e),
            Err(_) => warn!(
                "Secret fetch timed out after {:?}, falling back",
                EXTERNAL_CALL_TIMEOUT
            ),
        }
    }
    fallback_password(settings)
}

/// The secret string is JSON carrying a `password` field.
fn parse_secret_password(raw: &str) -> Result<String, SecretError> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| SecretError::InvalidPayload(format!("not valid JSON: {e}")))?;
    value
        .get("password")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| SecretError::InvalidPayload("missing password field".to_string()))
}

fn fallback_password(settings: &StoreSettings) -> Credential {
    match &settings.password {
        Some(password) => Credential {
            value: password.clone(),
            origin: CredentialOrigin::Environment,
        },
        None => Credential {
            value: DEFAULT_STORE_PASSWORD.to_string(),
            origin: CredentialOrigin::Fallback,
        },
    }
}

/// Resolve the final transport connection config. Never fails.
///
/// For a managed endpoint the identity resolution must complete before any
/// connection attempt; failure or timeout yields a degraded config and the
/// supervisor answers with a stub handle instead of a live connection.
pub async fn resolve_transport(
    settings: &TransportSettings,
    identity: &dyn IdentityProvider,
) -> TransportConfig {
    if !is_managed_iot_endpoint(&settings.host) {
        info!("Resolved plain broker config: {}", settings.host);
        return TransportConfig {
            host: settings.host.clone(),
            port: PLAIN_BROKER_PORT,
            topic: INGEST_TOPIC.to_string(),
            security: TransportSecurity::Plain,
        };
    }

    info!("Managed IoT endpoint detected: {}", settings.host);
    let security = match timeout(EXTERNAL_CALL_TIMEOUT, identity.resolve()).await {
        Ok(Ok(credentials)) => {
            info!("Ambient identity resolved successfully");
            TransportSecurity::AuthenticatedWebsocket {
                region: settings.region.clone(),
                credentials,
            }
        }
        Ok(Err(e)) => {
            warn!("Identity resolution failed, transport degraded: {}", e);
            TransportSecurity::Degraded {
                reason: e.to_string(),
            }
        }
        Err(_) => {
            warn!(
                "Identity resolution timed out after {:?}, transport degraded",
                EXTERNAL_CALL_TIMEOUT
            );
            TransportSecurity::Degraded {
                reason: "identity resolution timed out".to_string(),
            }
        }
    };

    TransportConfig {
        host: settings.host.clone(),
        port: WEBSOCKET_BROKER_PORT,
        topic: INGEST_TOPIC.to_string(),
        security,
    }
}
