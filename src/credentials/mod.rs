//! Credential and connection-config resolution
//!
//! The resolver turns raw process settings into final connection configs for
//! the store and the transport. Resolution never fails: every fallible step
//! (secret fetch, ambient identity resolution) degrades to a fallback
//! credential or a degraded transport config, and every external call is
//! bounded by a timeout. Downstream consumers always receive a config that
//! is valid to attempt a connection with.

pub mod aws;
pub mod resolver;

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub use resolver::{resolve_store, resolve_transport, DEFAULT_STORE_PASSWORD};

/// Where a resolved credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialOrigin {
    /// Fetched from the external secret store.
    SecretStore,
    /// Taken from process configuration.
    Environment,
    /// The static fallback at the end of the chain.
    Fallback,
}

/// A secret value with its provenance.
///
/// The fallback chain always terminates at a usable value; no code path
/// produces "no credential".
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub value: String,
    pub origin: CredentialOrigin,
}

impl fmt::Debug for Credential {
    // The value never appears in Debug output or logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("value", &"***")
            .field("origin", &self.origin)
            .finish()
    }
}

/// Short-lived token material from the ambient identity provider.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .field("session_token", &self.session_token.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Secret-store fetch errors. NotFound, AccessDenied and network faults are
/// all treated identically by the resolver: fall back to the default.
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("Secret fetch failed: {0}")]
    Fetch(String),
    #[error("Secret payload invalid: {0}")]
    InvalidPayload(String),
}

/// Ambient identity provider errors. Terminal for that connection attempt;
/// the transport supervisor keeps a stub handle instead.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Identity provider unavailable: {0}")]
    ProviderUnavailable(String),
}

/// External secret store collaborator.
#[async_trait]
pub trait SecretSource: Send + Sync {
    async fn fetch(&self, secret_id: &str) -> Result<String, SecretError>;
}

/// Ambient identity provider collaborator (workload-identity style: the
/// process obtains short-lived credentials without static configuration).
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve(&self) -> Result<SessionCredentials, IdentityError>;
}
