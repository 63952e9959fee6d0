//! Bridge configuration
//!
//! Raw process settings for the bridge, sourced from environment-backed CLI
//! flags in `main`. These are the inputs to the credential/config resolver;
//! the resolver turns them into final connection configs.

use std::fmt;
use thiserror::Error;

/// Top-level settings for one bridge process.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeSettings {
    pub transport: TransportSettings,
    pub store: StoreSettings,
    pub http: HttpSettings,
}

/// MQTT transport settings.
///
/// `host` is either a bare hostname (local broker, e.g. `mqtt`) or a managed
/// AWS IoT endpoint (`*.iot.<region>.amazonaws.com`). The resolver decides
/// which connection variant applies.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportSettings {
    pub host: String,
    /// AWS region used when the host is a managed endpoint.
    pub region: String,
}

/// Durable store settings.
///
/// `host` may carry a port suffix (`host:5432`); the resolver splits it and
/// defaults the port. The password is resolved through the fallback chain:
/// secret store (if `secret_arn` is set), then `password`, then the static
/// default.
#[derive(Clone, PartialEq)]
pub struct StoreSettings {
    pub host: String,
    pub user: String,
    pub database: String,
    pub password: Option<String>,
    pub secret_arn: Option<String>,
    pub region: String,
}

impl fmt::Debug for StoreSettings {
    // The password never appears in Debug output or logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreSettings")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("database", &self.database)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("secret_arn", &self.secret_arn)
            .field("region", &self.region)
            .finish()
    }
}

/// Operational HTTP surface settings.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpSettings {
    pub port: u16,
}

/// Configuration validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),
}

impl BridgeSettings {
    /// Validate settings before any connection attempt is made.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transport.host.trim().is_empty() {
            return Err(ConfigError::InvalidSetting(
                "transport host must not be empty".to_string(),
            ));
        }
        if self.store.host.trim().is_empty() {
            return Err(ConfigError::InvalidSetting(
                "store host must not be empty".to_string(),
            ));
        }
        if self.store.user.trim().is_empty() || self.store.database.trim().is_empty() {
            return Err(ConfigError::InvalidSetting(
                "store user and database must not be empty".to_string(),
            ));
        }
        if self.http.port == 0 {
            return Err(ConfigError::InvalidSetting(
                "http port must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_settings() -> Self {
        Self {
            transport: TransportSettings {
                host: "mqtt".to_string(),
                region: "eu-west-1".to_string(),
            },
            store: StoreSettings {
                host: "db".to_string(),
                user: "iotuser".to_string(),
                database: "iotdb".to_string(),
                password: None,
                secret_arn: None,
                region: "eu-west-1".to_string(),
            },
            http: HttpSettings { port: 3000 },
        }
    }
}
