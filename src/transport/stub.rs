//! Inert subscriber handle
//!
//! Stands in for the live subscription when the managed endpoint's
//! credentials cannot be resolved. Code racing ahead of resolution can
//! operate this handle freely: every operation is a safe no-op.

use super::{LinkState, SubscriberHandle, TransportError};
use async_trait::async_trait;
use tokio::sync::watch;
use tracing::debug;

/// No-op implementation of [`SubscriberHandle`].
pub struct StubSubscriber {
    reason: String,
}

impl StubSubscriber {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl SubscriberHandle for StubSubscriber {
    async fn subscribe(&self) -> Result<(), TransportError> {
        debug!(
            "Stub transport handle: subscribe is a no-op ({})",
            self.reason
        );
        Ok(())
    }

    fn state_watch(&self) -> Option<watch::Receiver<LinkState>> {
        None
    }

    async fn shutdown(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_operations_never_error() {
        let mut stub = StubSubscriber::new("identity provider unavailable");

        assert!(stub.subscribe().await.is_ok());
        // Repeated calls stay safe
        assert!(stub.subscribe().await.is_ok());
        assert!(stub.state_watch().is_none());
        stub.shutdown().await;
        assert!(stub.subscribe().await.is_ok());
    }
}
