//! Postgres-backed message store
//!
//! Owns the connection pool, performs the one-time idempotent schema
//! bootstrap, and exposes the single `persist` operation. Pool sizing and
//! acquisition are bounded; hanging forever on store failures is not an
//! option for an ingestion path. Connection parameters may carry credentials
//! and are never logged verbatim.

use super::{MessageSink, StoreError};
use crate::credentials::resolver::DEFAULT_STORE_PASSWORD;
use crate::credentials::Credential;
use crate::error::sanitize_for_log;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

const MAX_CONNECTIONS: u32 = 5;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Create-if-absent shape of the durable table. Safe to execute on every
/// process start.
const CREATE_MESSAGES_TABLE: &str = "\
CREATE TABLE IF NOT EXISTS messages (
    id BIGSERIAL PRIMARY KEY,
    payload TEXT NOT NULL,
    timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW()
)";

/// Transport security for the store connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreSecurity {
    /// Unencrypted connection to a local/plain database.
    Plain,
    /// TLS required but peer not verified (managed databases).
    EncryptedUnverified,
}

/// Final, resolved store connection config. Built once by the resolver and
/// immutable afterwards.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub database: String,
    pub credential: Credential,
    pub security: StoreSecurity,
}

/// Pool owner and durable sink for the ingestion pipeline.
///
/// The pool slot starts empty; `persist` reports `StoreError::NotReady`
/// until `initialize` has installed a pool.
#[derive(Default)]
pub struct MessageStore {
    pool: RwLock<Option<PgPool>>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a pool has been installed.
    pub async fn is_ready(&self) -> bool {
        self.pool.read().await.is_some()
    }

    /// Connect the pool and bootstrap the schema. Idempotent: a second call
    /// with a pool already installed is a no-op.
    ///
    /// If the resolved credential cannot connect, a lazily-connecting pool
    /// with the static default credential is installed instead, so a store
    /// handle always exists; persist calls against it fail per-call if that
    /// fallback is also unreachable. A bootstrap failure is reported but
    /// leaves the pool installed.
    pub async fn initialize(&self, config: &StoreConfig) -> Result<(), StoreError> {
        if self.is_ready().await {
            return Ok(());
        }

        let pool = match Self::connect(config, &config.credential.value).await {
            Ok(pool) => {
                info!(
                    "Connected to PostgreSQL at {}:{}",
                    config.host, config.port
                );
                pool
            }
            Err(e) => {
                warn!(
                    "Store connection failed (credential origin {:?}), falling back to default credential: {}",
                    config.credential.origin,
                    sanitize_for_log(&format!("{e:?}"))
                );
                Self::fallback_pool(config)
            }
        };

        let bootstrap_result = Self::bootstrap(&pool).await;
        *self.pool.write().await = Some(pool);
        bootstrap_result
    }

    fn connect_options(config: &StoreConfig, password: &str) -> PgConnectOptions {
        let ssl_mode = match config.security {
            StoreSecurity::Plain => PgSslMode::Disable,
            StoreSecurity::EncryptedUnverified => PgSslMode::Require,
        };

        PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(password)
            .database(&config.database)
            .ssl_mode(ssl_mode)
    }

    async fn connect(config: &StoreConfig, password: &str) -> Result<PgPool, StoreError> {
        PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(Self::connect_options(config, password))
            .await
            .map_err(|e| StoreError::ConnectionFailed(Box::new(e)))
    }

    /// Pool that connects on first use, with the static default credential.
    fn fallback_pool(config: &StoreConfig) -> PgPool {
        PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_lazy_with(Self::connect_options(config, DEFAULT_STORE_PASSWORD))
    }

    async fn bootstrap(pool: &PgPool) -> Result<(), StoreError> {
        // Scoped acquisition: the connection returns to the pool on every
        // exit path, success or error.
        let mut conn = pool
            .acquire()
            .await
            .map_err(|e| StoreError::BootstrapFailed(Box::new(e)))?;

        sqlx::query(CREATE_MESSAGES_TABLE)
            .execute(&mut *conn)
            .await
            .map_err(|e| StoreError::BootstrapFailed(Box::new(e)))?;

        info!("Messages table ready");
        Ok(())
    }
}

#[async_trait]
impl MessageSink for MessageStore {
    async fn persist(&self, payload: &str) -> Result<i64, StoreError> {
        let guard = self.pool.read().await;
        let pool = guard.as_ref().ok_or(StoreError::NotReady)?;

        // Payload is bound as a parameter, never interpolated.
        let (id,): (i64,) =
            sqlx::query_as("INSERT INTO messages (payload) VALUES ($1) RETURNING id")
                .bind(payload)
                .fetch_one(pool)
                .await
                .map_err(|e| StoreError::InsertFailed(Box::new(e)))?;

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialOrigin;

    fn test_config(security: StoreSecurity) -> StoreConfig {
        StoreConfig {
            host: "db".to_string(),
            port: 5432,
            user: "iotuser".to_string(),
            database: "iotdb".to_string(),
            credential: Credential {
                value: "iotpassword".to_string(),
                origin: CredentialOrigin::Fallback,
            },
            security,
        }
    }

    #[tokio::test]
    async fn test_persist_before_initialize_reports_not_ready() {
        let store = MessageStore::new();

        let result = store.persist("temp=22.0").await;

        assert!(matches!(result, Err(StoreError::NotReady)));
    }

    #[tokio::test]
    async fn test_store_starts_not_ready() {
        let store = MessageStore::new();
        assert!(!store.is_ready().await);
    }

    #[test]
    fn test_connect_options_carry_resolved_parameters() {
        let config = test_config(StoreSecurity::Plain);

        let options = MessageStore::connect_options(&config, "pw");

        assert_eq!(options.get_host(), "db");
        assert_eq!(options.get_port(), 5432);
        assert_eq!(options.get_username(), "iotuser");
        assert_eq!(options.get_database(), Some("iotdb"));
    }

    #[test]
    fn test_bootstrap_statement_is_create_if_absent() {
        assert!(CREATE_MESSAGES_TABLE.contains("IF NOT EXISTS"));
        assert!(CREATE_MESSAGES_TABLE.contains("payload TEXT NOT NULL"));
        assert!(CREATE_MESSAGES_TABLE.contains("DEFAULT NOW()"));
    }

    #[tokio::test]
    async fn test_fallback_pool_installs_a_handle() {
        // The lazy fallback pool never touches the network at construction
        // time, so a handle exists even when the store is unreachable.
        let config = test_config(StoreSecurity::Plain);
        let pool = MessageStore::fallback_pool(&config);
        assert!(!pool.is_closed());
    }
}
