//! Fake implementations of the collaborator traits
//!
//! Deterministic stand-ins for the secret store, the identity provider, and
//! the durable sink, so resolution and pipeline behavior can be tested
//! without AWS or PostgreSQL.

use crate::credentials::{
    IdentityError, IdentityProvider, SecretError, SecretSource, SessionCredentials,
};
use crate::store::{MessageSink, StoreError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

/// Secret source whose every fetch fails with a network error.
pub struct FailingSecretSource;

#[async_trait]
impl SecretSource for FailingSecretSource {
    async fn fetch(&self, _secret_id: &str) -> Result<String, SecretError> {
        Err(SecretError::Fetch("network error".to_string()))
    }
}

/// Secret source returning a fixed payload.
pub struct FixedSecretSource {
    payload: String,
}

impl FixedSecretSource {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
        }
    }
}

#[async_trait]
impl SecretSource for FixedSecretSource {
    async fn fetch(&self, _secret_id: &str) -> Result<String, SecretError> {
        Ok(self.payload.clone())
    }
}

/// Identity provider that is always unavailable.
pub struct FailingIdentityProvider;

#[async_trait]
impl IdentityProvider for FailingIdentityProvider {
    async fn resolve(&self) -> Result<SessionCredentials, IdentityError> {
        Err(IdentityError::ProviderUnavailable(
            "no credentials available".to_string(),
        ))
    }
}

/// Identity provider returning fixed session credentials.
pub struct FixedIdentityProvider;

#[async_trait]
impl IdentityProvider for FixedIdentityProvider {
    async fn resolve(&self) -> Result<SessionCredentials, IdentityError> {
        Ok(SessionCredentials {
            access_key_id: "AKIATEST".to_string(),
            secret_access_key: "test-secret".to_string(),
            session_token: Some("test-token".to_string()),
        })
    }
}

/// Sink that records every persisted payload and assigns incrementing ids.
pub struct RecordingSink {
    payloads: Mutex<Vec<String>>,
    next_id: AtomicI64,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            payloads: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn payloads(&self) -> Vec<String> {
        self.payloads.lock().unwrap().clone()
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn persist(&self, payload: &str) -> Result<i64, StoreError> {
        self.payloads.lock().unwrap().push(payload.to_string());
        Ok(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

/// Sink whose every persist fails with a configurable error.
pub struct FailingSink {
    kind: FailureKind,
}

enum FailureKind {
    NotReady,
    Insert,
}

impl FailingSink {
    /// Fails as if the pool has not been initialized yet.
    pub fn not_ready() -> Self {
        Self {
            kind: FailureKind::NotReady,
        }
    }

    /// Fails as if the insert itself errored.
    pub fn insert_error() -> Self {
        Self {
            kind: FailureKind::Insert,
        }
    }
}

#[async_trait]
impl MessageSink for FailingSink {
    async fn persist(&self, _payload: &str) -> Result<i64, StoreError> {
        match self.kind {
            FailureKind::NotReady => Err(StoreError::NotReady),
            FailureKind::Insert => Err(StoreError::InsertFailed(
                "forced insert failure".to_string().into(),
            )),
        }
    }
}
