//! AWS-backed implementations of the credential collaborators
//!
//! Secrets Manager provides the store password; the default credential
//! provider chain (environment, profile, IMDS, IRSA) provides short-lived
//! session credentials for the managed IoT endpoint.

use super::{IdentityError, IdentityProvider, SecretError, SecretSource, SessionCredentials};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::provider::ProvideCredentials;

/// Secret source backed by AWS Secrets Manager.
pub struct SecretsManagerSource {
    region: String,
}

impl SecretsManagerSource {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }
}

#[async_trait]
impl SecretSource for SecretsManagerSource {
    async fn fetch(&self, secret_id: &str) -> Result<String, SecretError> {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()))
            .load()
            .await;
        let client = aws_sdk_secretsmanager::Client::new(&sdk_config);

        let output = client
            .get_secret_value()
            .secret_id(secret_id)
            .send()
            .await
            .map_err(|e| SecretError::Fetch(e.to_string()))?;

        output
            .secret_string()
            .map(str::to_string)
            .ok_or_else(|| SecretError::InvalidPayload("secret has no string payload".to_string()))
    }
}

/// Identity provider backed by the AWS default credential provider chain.
pub struct AmbientIdentityProvider {
    region: String,
}

impl AmbientIdentityProvider {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }
}

#[async_trait]
impl IdentityProvider for AmbientIdentityProvider {
    async fn resolve(&self) -> Result<SessionCredentials, IdentityError> {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()))
            .load()
            .await;

        let provider = sdk_config.credentials_provider().ok_or_else(|| {
            IdentityError::ProviderUnavailable("no provider in credential chain".to_string())
        })?;

        let credentials = provider
            .provide_credentials()
            .await
            .map_err(|e| IdentityError::ProviderUnavailable(e.to_string()))?;

        Ok(SessionCredentials {
            access_key_id: credentials.access_key_id().to_string(),
            secret_access_key: credentials.secret_access_key().to_string(),
            session_token: credentials.session_token().map(str::to_string),
        })
    }
}
