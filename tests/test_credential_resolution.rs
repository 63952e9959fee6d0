//! Tests of credential resolution fallbacks and degraded transport handling
//!
//! Resolution never fails: a failing secret store falls back to the default
//! password, and a failing identity provider leaves the transport with a
//! stub handle whose operations are safe no-ops.

use iotbridge::config::{StoreSettings, TransportSettings};
use iotbridge::credentials::{resolve_store, resolve_transport, CredentialOrigin};
use iotbridge::credentials::resolver::DEFAULT_STORE_PASSWORD;
use iotbridge::store::StoreSecurity;
use iotbridge::testing::mocks::{FailingIdentityProvider, FailingSecretSource, FixedSecretSource};
use iotbridge::transport::{build_subscriber, TransportSecurity};
use tokio::sync::mpsc;

fn store_settings() -> StoreSettings {
    StoreSettings {
        host: "db".to_string(),
        user: "iotuser".to_string(),
        database: "iotdb".to_string(),
        password: None,
        secret_arn: None,
        region: "eu-west-1".to_string(),
    }
}

#[tokio::test]
async fn test_failing_secret_fetch_yields_fallback_password() {
    // Scenario: the secret fetch throws a network error - the resolver still
    // returns a usable config carrying the fallback password.
    let mut settings = store_settings();
    settings.secret_arn = Some("arn:aws:secretsmanager:eu-west-1:1:secret:db".to_string());

    let config = resolve_store(&settings, &FailingSecretSource).await;

    assert_eq!(config.credential.value, DEFAULT_STORE_PASSWORD);
    assert_eq!(config.credential.origin, CredentialOrigin::Fallback);
    assert_eq!(config.host, "db");
    assert_eq!(config.port, 5432);
}

#[tokio::test]
async fn test_secret_store_password_wins_when_available() {
    let mut settings = store_settings();
    settings.secret_arn = Some("arn:aws:secretsmanager:eu-west-1:1:secret:db".to_string());
    settings.password = Some("env-pw".to_string());

    let source = FixedSecretSource::new(r#"{"password":"vault-pw"}"#);
    let config = resolve_store(&settings, &source).await;

    assert_eq!(config.credential.value, "vault-pw");
    assert_eq!(config.credential.origin, CredentialOrigin::SecretStore);
}

#[tokio::test]
async fn test_garbled_secret_payload_falls_back_to_env_password() {
    let mut settings = store_settings();
    settings.secret_arn = Some("arn:aws:secretsmanager:eu-west-1:1:secret:db".to_string());
    settings.password = Some("env-pw".to_string());

    let source = FixedSecretSource::new("definitely not json");
    let config = resolve_store(&settings, &source).await;

    assert_eq!(config.credential.value, "env-pw");
    assert_eq!(config.credential.origin, CredentialOrigin::Environment);
}

#[tokio::test]
async fn test_managed_database_host_gets_encrypted_mode() {
    let mut settings = store_settings();
    settings.host = "iotdb.c1a2b3.eu-west-1.rds.amazonaws.com".to_string();

    let config = resolve_store(&settings, &FailingSecretSource).await;

    assert_eq!(config.security, StoreSecurity::EncryptedUnverified);
}

#[tokio::test]
async fn test_failed_identity_resolution_leaves_a_safe_stub() {
    // Scenario: managed IoT endpoint, identity provider fails - the handle
    // stays a no-op stub and calling subscribe on it does not error.
    let settings = TransportSettings {
        host: "abc.iot.eu-west-1.amazonaws.com".to_string(),
        region: "eu-west-1".to_string(),
    };

    let config = resolve_transport(&settings, &FailingIdentityProvider).await;
    assert!(matches!(
        config.security,
        TransportSecurity::Degraded { .. }
    ));

    let (sender, _receiver) = mpsc::channel(8);
    let mut handle = build_subscriber(config, sender);

    assert!(handle.subscribe().await.is_ok());
    assert!(handle.subscribe().await.is_ok());
    assert!(handle.state_watch().is_none());
    handle.shutdown().await;
}

#[tokio::test]
async fn test_local_host_resolves_to_plain_broker() {
    let settings = TransportSettings {
        host: "mqtt".to_string(),
        region: "eu-west-1".to_string(),
    };

    let config = resolve_transport(&settings, &FailingIdentityProvider).await;

    // No identity fetch happens for the plain variant, so the failing
    // provider never degrades it.
    assert!(matches!(config.security, TransportSecurity::Plain));
    assert_eq!(config.port, 1883);
    assert_eq!(config.topic, "iot/data");
}
